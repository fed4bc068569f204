//! The single public engine façade (§4.E). An `Engine` is a plain owned
//! value constructed explicitly by its host (the CLI binary, or a future
//! embedding application) — not a process-wide singleton (§9): nothing
//! here reaches for a global, so nothing needs guarding against a second
//! instance; exclusive access to the audio device is left to the
//! operating system.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use groovecraft_audio::AudioCommand;
use groovecraft_audio::AudioDevice;
use groovecraft_dsl::parse;
use groovecraft_types::{Diagnostics, OverflowMode, Pattern};

use crate::config::Config;
use crate::error::EngineError;
use crate::scheduler::Scheduler;

const PARAMETER_HISTORY_CAPACITY: usize = 100;

/// Which observable the engine changed, for `parameterHistory` bookkeeping
/// (§3.2, §8 property 12).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Tempo,
    Sequence,
    Effects,
    Eq,
    Volume,
}

#[derive(Debug, Clone)]
pub struct ParameterHistoryEntry {
    pub kind: ParameterKind,
    pub value: String,
    pub timestamp_s: f32,
}

/// Snapshot returned by `getState()`. Never fails to produce.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub is_initialized: bool,
    pub is_playing: bool,
    pub is_paused: bool,
    pub tempo: Option<u16>,
    pub volume_db: f32,
    pub current_time_s: f32,
    pub effects_enabled: bool,
    pub overflow_mode: OverflowMode,
    pub error: Option<String>,
}

pub struct Engine {
    config: Config,
    device: Option<AudioDevice>,
    scheduler: Scheduler,
    pattern: Option<Arc<Pattern>>,
    overflow_mode: OverflowMode,
    volume: f32,
    parameter_history: VecDeque<ParameterHistoryEntry>,
    start_instant: Option<Instant>,
    last_error: Option<String>,
    /// Overrides `config.strict_parsing()` for every subsequent
    /// `load_pattern` call, e.g. a CLI `--strict` flag. `None` defers to
    /// the loaded config.
    strict_override: Option<bool>,
}

impl Engine {
    /// Construct an uninitialized engine. Loads configuration (embedded
    /// defaults merged with any user override) but does not touch the
    /// audio device yet — that's `initialize()`'s job.
    pub fn new() -> Self {
        let config = Config::load();
        let overflow_mode = config.default_overflow();
        let volume = config.master_volume();
        Self {
            config,
            device: None,
            scheduler: Scheduler::new(overflow_mode),
            pattern: None,
            overflow_mode,
            volume,
            parameter_history: VecDeque::new(),
            start_instant: None,
            last_error: None,
            strict_override: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.device.is_some()
    }

    /// Override the parser's strict-step-count mode for every subsequent
    /// `load_pattern` call (§9 Open Question: strict is a parser-level
    /// flag, not a fixed mode). Pass the CLI's `--strict` flag (or any
    /// other host-level toggle) through here before loading a pattern;
    /// calling `load_pattern` before this has no effect on patterns
    /// already committed.
    pub fn set_strict_parsing(&mut self, strict: bool) {
        self.strict_override = Some(strict);
    }

    /// Open the audio output device and preload the sample bank.
    /// Idempotent: calling it again while already initialized is a no-op.
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        if self.device.is_some() {
            return Ok(());
        }
        let device = AudioDevice::open(self.pattern.clone())?;
        device.send_command(AudioCommand::SetVolume(self.volume));
        self.start_instant = Some(Instant::now());
        self.device = Some(device);
        log::info!(target: "engine", "audio device initialized");
        Ok(())
    }

    /// Parse `text`; if it's valid, commit it as the current pattern and
    /// live-reschedule (§4.D). An invalid parse leaves `currentPattern`
    /// untouched (§8 invariant 9) — inspect the returned `Diagnostics`.
    pub fn load_pattern(&mut self, text: &str) -> Diagnostics {
        let strict = self.strict_override.unwrap_or_else(|| self.config.strict_parsing());
        let (parsed, diagnostics) = parse(text, strict);
        if diagnostics.is_valid() {
            if let Some(pattern) = parsed {
                let pattern = Arc::new(pattern);
                let now = self.audio_clock_s();
                self.scheduler.load_pattern(&pattern, now);
                if let Some(device) = &self.device {
                    device.set_pattern(Some(pattern.clone()));
                }
                self.pattern = Some(pattern);
                self.push_history(ParameterKind::Sequence, "loaded new pattern".to_string());
            }
        }
        diagnostics
    }

    pub fn current_pattern(&self) -> Option<&Pattern> {
        self.pattern.as_deref()
    }

    /// Start or resume playback. The very first call after `initialize()`
    /// opens the device already happened in `initialize()`, not here — by
    /// the time `play()` runs the device is already open, so this call
    /// never itself blocks on system resources (§4.D initialization
    /// ordering).
    pub fn play(&mut self) -> Result<(), EngineError> {
        if self.device.is_none() {
            return Err(EngineError::NotInitialized);
        }
        if self.pattern.is_none() {
            return Err(EngineError::NoPattern);
        }
        let now = self.audio_clock_s();
        self.scheduler.play(now);
        Ok(())
    }

    /// Pause the transport. A no-op if not currently playing.
    pub fn pause(&mut self) {
        let now = self.audio_clock_s();
        self.scheduler.pause(now);
    }

    /// Stop and reset the loop position to 0, silencing any sounding
    /// voices immediately.
    pub fn stop(&mut self) {
        self.scheduler.stop();
        if let Some(device) = &self.device {
            device.send_command(AudioCommand::AllNotesOff);
        }
    }

    /// Advance the transport and dispatch any events now due. The host
    /// binary calls this in a short polling loop while playing; it is a
    /// no-op when stopped or paused.
    pub fn tick(&mut self) {
        let now = self.audio_clock_s();
        let due = self.scheduler.tick(now);
        let Some(device) = &self.device else {
            return;
        };
        for event in due {
            device.send_command(AudioCommand::TriggerHit {
                instrument: event.instrument,
                velocity: event.velocity,
            });
        }
        for diagnostic in device.drain_diagnostics() {
            log::warn!(target: "engine", "audio diagnostic: {diagnostic:?}");
        }
    }

    /// Apply a targeted update. `tempo`/`sequence`/`effects`/`eq` updates
    /// flow through `load_pattern` with new DSL text; this call handles
    /// `volume` directly and always records the attempt in
    /// `parameterHistory`, including attempts it can't apply.
    pub fn update_parameter(&mut self, kind: ParameterKind, value: &str) {
        match kind {
            ParameterKind::Volume => {
                if let Ok(v) = value.parse::<f32>() {
                    self.volume = v.clamp(0.0, 2.0);
                    if let Some(device) = &self.device {
                        device.send_command(AudioCommand::SetVolume(self.volume));
                    }
                } else {
                    log::warn!(target: "engine", "ignoring unparseable volume value: {value}");
                }
            }
            ParameterKind::Tempo | ParameterKind::Sequence | ParameterKind::Effects | ParameterKind::Eq => {
                log::warn!(
                    target: "engine",
                    "parameter kind {kind:?} is applied via load_pattern, not update_parameter"
                );
            }
        }
        self.push_history(kind, value.to_string());
    }

    /// Change the short-instrument overflow policy, rescheduling in place
    /// if a pattern is loaded and currently playing.
    pub fn set_overflow_mode(&mut self, mode: OverflowMode) {
        self.overflow_mode = mode;
        let now = self.audio_clock_s();
        let pattern = self.pattern.clone();
        self.scheduler.set_overflow(mode, pattern.as_deref(), now);
    }

    pub fn get_state(&self) -> EngineState {
        let now = self.audio_clock_s();
        EngineState {
            is_initialized: self.device.is_some(),
            is_playing: self.scheduler.is_playing(),
            is_paused: self.scheduler.is_paused(),
            tempo: self.pattern.as_ref().map(|p| p.tempo),
            volume_db: 20.0 * self.volume.max(1e-6).log10(),
            current_time_s: self.scheduler.current_time_s(now),
            effects_enabled: true,
            overflow_mode: self.overflow_mode,
            error: self.last_error.clone(),
        }
    }

    /// Stop playback, release the audio device, and mark uninitialized.
    pub fn dispose(&mut self) {
        self.stop();
        self.device = None;
        self.pattern = None;
        self.start_instant = None;
        log::info!(target: "engine", "engine disposed");
    }

    fn audio_clock_s(&self) -> f32 {
        self.start_instant
            .map(|t| t.elapsed().as_secs_f32())
            .unwrap_or(0.0)
    }

    fn push_history(&mut self, kind: ParameterKind, value: String) {
        if self.parameter_history.len() >= PARAMETER_HISTORY_CAPACITY {
            self.parameter_history.pop_front();
        }
        self.parameter_history.push_back(ParameterHistoryEntry {
            kind,
            value,
            timestamp_s: self.audio_clock_s(),
        });
    }

    pub fn parameter_history(&self) -> &VecDeque<ParameterHistoryEntry> {
        &self.parameter_history
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_before_initialize_fails_with_not_initialized() {
        let mut engine = Engine::new();
        assert!(matches!(engine.play(), Err(EngineError::NotInitialized)));
    }

    #[test]
    fn invalid_pattern_leaves_current_pattern_untouched() {
        let mut engine = Engine::new();
        let diagnostics = engine.load_pattern("TEMPO 120\nseq kick: x...\n");
        assert!(diagnostics.is_valid());
        assert!(engine.current_pattern().is_some());

        let diagnostics = engine.load_pattern("bogus_keyword foo\n");
        assert!(!diagnostics.is_valid());
        assert!(engine.current_pattern().is_some());
        assert_eq!(engine.current_pattern().unwrap().tempo, 120);
    }

    #[test]
    fn parameter_history_never_exceeds_its_cap() {
        let mut engine = Engine::new();
        for i in 0..(PARAMETER_HISTORY_CAPACITY + 20) {
            engine.update_parameter(ParameterKind::Volume, &i.to_string());
        }
        assert_eq!(engine.parameter_history().len(), PARAMETER_HISTORY_CAPACITY);
    }

    #[test]
    fn get_state_never_fails_even_before_initialize() {
        let engine = Engine::new();
        let state = engine.get_state();
        assert!(!state.is_initialized);
        assert!(!state.is_playing);
        assert_eq!(state.current_time_s, 0.0);
    }
}
