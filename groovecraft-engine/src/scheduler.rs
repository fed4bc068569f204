//! Look-ahead event scheduler and transport clock (§4.D).
//!
//! A `Part` is the full set of timestamped events for one loop, built once
//! from a `Pattern` and re-emitted identically on every loop iteration.
//! `Scheduler` owns the transport clock (`transportStart`/`pausePos`) and a
//! forward-scanning high-water mark (`last_scheduled_step`) so that a host
//! thread calling `tick` at irregular intervals schedules every step
//! exactly once, even across the loop boundary, without double-firing or
//! skipping.
//!
//! Unlike a transport with an arbitrary `loopStart`/`loopEnd` window, a
//! `Part` here always starts at absolute step 0, so the loop wraparound
//! that would otherwise need splitting a scan range into a pre-wrap and a
//! post-wrap segment collapses to a single `mod total_steps` on the
//! absolute step counter.

use groovecraft_types::{
    GrooveModule, GrooveStepsTarget, GrooveSubdivision, GrooveType, ModuleScope, OverflowMode,
    Pattern,
};

/// One scheduled hit, timestamped relative to the start of its loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent {
    pub time_s: f32,
    pub instrument: String,
    pub velocity: f32,
    pub step: u32,
}

/// One loop's worth of events, rebuilt whenever the pattern or the
/// overflow mode changes.
#[derive(Debug, Clone)]
pub struct Part {
    pub events: Vec<ScheduledEvent>,
    pub step_interval_s: f32,
    pub total_steps: u32,
    pub loop_duration_s: f32,
}

impl Part {
    pub fn empty() -> Self {
        Self {
            events: Vec::new(),
            step_interval_s: 0.125,
            total_steps: 16,
            loop_duration_s: 2.0,
        }
    }

    /// Generate events for every hit in `pattern`, per §4.D's generation
    /// rules: overflow handling, then groove offset/velocity-scale applied
    /// per instrument's effective groove (instrument overrides master).
    pub fn from_pattern(pattern: &Pattern, overflow: OverflowMode) -> Self {
        let step_interval_s = pattern.step_interval_s();
        let mut events = Vec::new();

        for (name, instrument) in &pattern.instruments {
            let scope = ModuleScope::Instrument(name.clone());
            let groove = pattern.effective_groove(&scope);
            for s in 0..pattern.total_steps {
                let Some(velocity) = instrument.hit_at(s, overflow) else {
                    continue;
                };
                let base_time = s as f32 * step_interval_s;
                let (groove_offset, velocity_scale) = match groove {
                    Some(g) => groove_offset_and_velocity(g, name, s, step_interval_s),
                    None => (0.0, 1.0),
                };
                events.push(ScheduledEvent {
                    time_s: base_time + groove_offset,
                    instrument: name.clone(),
                    velocity: (velocity * velocity_scale).clamp(0.0, 1.0),
                    step: s,
                });
            }
        }

        events.sort_by(|a, b| a.time_s.partial_cmp(&b.time_s).unwrap_or(std::cmp::Ordering::Equal));

        Self {
            events,
            step_interval_s,
            total_steps: pattern.total_steps.max(1),
            loop_duration_s: pattern.loop_duration_s(),
        }
    }

    fn events_at_step(&self, step: u32) -> impl Iterator<Item = &ScheduledEvent> {
        self.events.iter().filter(move |e| e.step == step)
    }
}

/// A cheap deterministic hash of (instrument, step), used to seed the
/// humanize jitter so a given step gets the same jitter every loop instead
/// of a fresh random value each repetition (a `Part` is built once and
/// re-emitted identically, per §4.D).
fn event_seed(instrument: &str, step: u32) -> u64 {
    let mut state = step as u64 ^ 0x9e3779b97f4a7c15;
    for byte in instrument.bytes() {
        state = state.wrapping_mul(31).wrapping_add(byte as u64);
    }
    state
}

/// PCG-style mix applied once per event rather than threaded across ticks,
/// so a step's jitter stays fixed for the life of the `Part` instead of
/// changing on every loop repetition.
fn deterministic_unit_random(seed: u64) -> f32 {
    let mixed = seed
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    ((mixed >> 33) as f32) / (u32::MAX as f32)
}

fn groove_offset_and_velocity(
    groove: &GrooveModule,
    instrument: &str,
    step: u32,
    step_interval_s: f32,
) -> (f32, f32) {
    match groove.groove_type {
        GrooveType::Swing => {
            let subdivision = groove.subdivision.unwrap_or(GrooveSubdivision::Eighth);
            let steps_per_subdiv = subdivision.steps_per_subdiv();
            let targeted = match &groove.steps {
                Some(target) => target.targets(step),
                None => (step / steps_per_subdiv) % 2 == 1,
            };
            if targeted {
                let offset = groove.amount * step_interval_s * steps_per_subdiv as f32 * 0.33;
                (offset, 1.0)
            } else {
                (0.0, 1.0)
            }
        }
        GrooveType::Humanize => {
            let unit = deterministic_unit_random(event_seed(instrument, step)) - 0.5;
            (unit * groove.amount * 0.05, 1.0)
        }
        GrooveType::Rush => (-groove.amount * 0.03, 1.0),
        GrooveType::Drag => (groove.amount * 0.03, 1.0),
        GrooveType::Template => {
            match groove
                .template_name
                .as_deref()
                .and_then(groovecraft_types::groove::get)
            {
                Some(template) => {
                    let applied = groovecraft_types::groove::apply(template, step, groove.amount);
                    (applied.timing_offset * step_interval_s, applied.velocity_scale)
                }
                None => (0.0, 1.0),
            }
        }
    }
}

/// Transport clock plus forward-scanning dispatcher. Owned by the engine
/// façade; the host thread calls `tick` at whatever cadence it polls at.
pub struct Scheduler {
    part: Part,
    tempo: u16,
    overflow: OverflowMode,
    playing: bool,
    paused: bool,
    transport_start_s: f32,
    pause_pos_s: f32,
    /// Absolute (unbounded, not wrapped to the loop) index of the last step
    /// dispatched. `None` means nothing has been scheduled yet this run.
    last_scheduled_step: Option<u64>,
}

impl Scheduler {
    pub fn new(overflow: OverflowMode) -> Self {
        Self {
            part: Part::empty(),
            tempo: 120,
            overflow,
            playing: false,
            paused: false,
            transport_start_s: 0.0,
            pause_pos_s: 0.0,
            last_scheduled_step: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn tempo(&self) -> u16 {
        self.tempo
    }

    pub fn loop_duration_s(&self) -> f32 {
        self.part.loop_duration_s
    }

    /// Load a freshly parsed pattern, live-rescheduling if currently
    /// playing. A tempo change preserves the current beat position by
    /// shifting `transportStart` (§4.D).
    pub fn load_pattern(&mut self, pattern: &Pattern, now_s: f32) {
        let old_tempo = self.tempo;
        self.tempo = pattern.tempo;
        if self.playing && old_tempo != pattern.tempo {
            let elapsed = (now_s - self.transport_start_s).max(0.0);
            self.transport_start_s = now_s - elapsed * (old_tempo as f32 / pattern.tempo as f32);
        }
        self.rebuild_part(pattern, now_s);
    }

    /// Change the overflow-short-instrument policy, rescheduling if a
    /// pattern is loaded and currently playing.
    pub fn set_overflow(&mut self, overflow: OverflowMode, pattern: Option<&Pattern>, now_s: f32) {
        self.overflow = overflow;
        if let Some(pattern) = pattern {
            self.rebuild_part(pattern, now_s);
        }
    }

    fn rebuild_part(&mut self, pattern: &Pattern, now_s: f32) {
        self.part = Part::from_pattern(pattern, self.overflow);
        if self.playing {
            // Cancel pending (not-yet-fired) look-ahead from the old part
            // by resuming the scan from the current position; voices
            // already triggered before this edit are untouched since they
            // live in the audio graph, not here.
            let elapsed = (now_s - self.transport_start_s).max(0.0);
            let current_step = (elapsed / self.part.step_interval_s.max(1e-6)).floor() as u64;
            self.last_scheduled_step = current_step.checked_sub(1);
        }
    }

    /// Current loop position in seconds (§4.E's observable `currentTime_s`).
    pub fn current_time_s(&self, now_s: f32) -> f32 {
        if self.playing {
            let loop_duration = self.part.loop_duration_s.max(1e-6);
            (now_s - self.transport_start_s).rem_euclid(loop_duration)
        } else if self.paused {
            self.pause_pos_s
        } else {
            0.0
        }
    }

    /// Start or resume playback. `now_s` is the current audio-clock time.
    pub fn play(&mut self, now_s: f32) {
        if self.playing {
            return;
        }
        self.transport_start_s = now_s - self.pause_pos_s;
        self.playing = true;
        self.paused = false;
        let current_step = (self.pause_pos_s / self.part.step_interval_s.max(1e-6)).floor() as u64;
        self.last_scheduled_step = current_step.checked_sub(1);
    }

    /// Pause the transport, recording the current loop position. Does not
    /// disturb any already-sounding voice.
    pub fn pause(&mut self, now_s: f32) {
        if !self.playing {
            return;
        }
        self.pause_pos_s = self.current_time_s(now_s);
        self.playing = false;
        self.paused = true;
    }

    /// Stop and reset the loop position to 0.
    pub fn stop(&mut self) {
        self.playing = false;
        self.paused = false;
        self.pause_pos_s = 0.0;
        self.last_scheduled_step = None;
    }

    /// Scan forward from the last dispatched step up to the step containing
    /// `now_s`, returning every event now due. Caps the catch-up span to
    /// one loop length so a host-thread stall can't build an unbounded
    /// backlog (§5 backpressure).
    pub fn tick(&mut self, now_s: f32) -> Vec<ScheduledEvent> {
        if !self.playing || self.part.total_steps == 0 {
            return Vec::new();
        }
        let elapsed = (now_s - self.transport_start_s).max(0.0);
        let current_step = (elapsed / self.part.step_interval_s.max(1e-6)).floor() as u64;

        let start_step = match self.last_scheduled_step {
            Some(last) => last + 1,
            None => current_step,
        };
        if current_step < start_step {
            return Vec::new();
        }

        let span = current_step - start_step + 1;
        let cap = self.part.total_steps as u64;
        let (start_step, span) = if span > cap {
            (current_step + 1 - cap, cap)
        } else {
            (start_step, span)
        };

        let mut due = Vec::new();
        for abs_step in start_step..start_step + span {
            let local_step = (abs_step % self.part.total_steps as u64) as u32;
            due.extend(self.part.events_at_step(local_step).cloned());
        }

        self.last_scheduled_step = Some(start_step + span - 1);
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groovecraft_dsl::parse;

    fn pattern(text: &str) -> Pattern {
        let (pattern, diagnostics) = parse(text, false);
        assert!(diagnostics.is_valid(), "{:?}", diagnostics.errors);
        pattern.unwrap()
    }

    const FOUR_ON_THE_FLOOR: &str = "\
TEMPO 120
seq kick:  x...x...x...x...
seq snare: ....x.......x...
seq hihat: x.x.x.x.x.x.x.x.
";

    #[test]
    fn four_on_the_floor_has_no_groove_offset() {
        let p = pattern(FOUR_ON_THE_FLOOR);
        assert_eq!(p.total_steps, 16);
        assert!((p.step_interval_s() - 0.125).abs() < 1e-6);

        let part = Part::from_pattern(&p, OverflowMode::Loop);
        let kick_times: Vec<f32> = part
            .events
            .iter()
            .filter(|e| e.instrument == "kick")
            .map(|e| e.time_s)
            .collect();
        assert_eq!(kick_times, vec![0.0, 0.5, 1.0, 1.5]);

        let snare_times: Vec<f32> = part
            .events
            .iter()
            .filter(|e| e.instrument == "snare")
            .map(|e| e.time_s)
            .collect();
        assert_eq!(snare_times, vec![0.5, 1.5]);

        assert!(part.events.iter().all(|e| {
            let nearest_step_time = e.step as f32 * 0.125;
            (e.time_s - nearest_step_time).abs() < 1e-6
        }));
    }

    #[test]
    fn eighth_note_swing_targets_expected_steps() {
        let text = format!("{FOUR_ON_THE_FLOOR}groove master: type=swing amount=0.6 subdivision=8n\n");
        let p = pattern(&text);
        let part = Part::from_pattern(&p, OverflowMode::Loop);
        let hihat_offsets: Vec<(u32, f32)> = part
            .events
            .iter()
            .filter(|e| e.instrument == "hihat")
            .map(|e| (e.step, e.time_s - e.step as f32 * 0.125))
            .collect();
        let targeted_steps: Vec<u32> = hihat_offsets
            .iter()
            .filter(|(_, offset)| *offset > 0.0)
            .map(|(s, _)| *s)
            .collect();
        assert_eq!(targeted_steps, vec![2, 6, 10, 14]);
        for (_, offset) in hihat_offsets.iter().filter(|(s, _)| *s == 2) {
            assert!((offset - 0.0495).abs() < 1e-4);
        }
    }

    #[test]
    fn sixteenth_note_swing_targets_odd_steps() {
        let text = "\
TEMPO 120
seq kick: xxxxxxxxxxxxxxxx
groove master: type=swing amount=0.6 subdivision=16n
";
        let p = pattern(text);
        let part = Part::from_pattern(&p, OverflowMode::Loop);
        let kick_offsets: Vec<(u32, f32)> = part
            .events
            .iter()
            .filter(|e| e.instrument == "kick")
            .map(|e| (e.step, e.time_s - e.step as f32 * 0.125))
            .collect();
        for (step, offset) in &kick_offsets {
            if step % 2 == 1 {
                assert!((offset - 0.02475).abs() < 1e-4, "step {step}: {offset}");
            } else {
                assert_eq!(*offset, 0.0);
            }
        }
    }

    #[test]
    fn mpc_66_template_groove_applies_catalog_offsets() {
        let text = "\
TEMPO 120
seq kick: xxxxxxxxxxxxxxxx
groove master: type=template template=mpc-swing-66 amount=1
";
        let p = pattern(text);
        let part = Part::from_pattern(&p, OverflowMode::Loop);
        let step_interval = p.step_interval_s();
        for event in &part.events {
            let offset = event.time_s - event.step as f32 * step_interval;
            if event.step % 2 == 0 {
                assert!((offset - 0.0).abs() < 1e-6, "step {}", event.step);
            } else {
                assert!(
                    (offset - 0.16 * step_interval).abs() < 1e-4,
                    "step {}: {}",
                    event.step,
                    offset
                );
            }
        }
    }

    #[test]
    fn live_tempo_change_keeps_current_time_monotonic() {
        let p1 = pattern(FOUR_ON_THE_FLOOR);
        let mut scheduler = Scheduler::new(OverflowMode::Loop);
        scheduler.load_pattern(&p1, 0.0);
        scheduler.play(0.0);

        let before = scheduler.current_time_s(0.7);

        let p2_text = FOUR_ON_THE_FLOOR.replace("TEMPO 120", "TEMPO 140");
        let p2 = pattern(&p2_text);
        scheduler.load_pattern(&p2, 0.7);

        let after = scheduler.current_time_s(0.7);
        assert!((before - after).abs() < 0.02, "before={before} after={after}");
        assert!((p2.step_interval_s() - (60.0 / 140.0 / 4.0)).abs() < 1e-6);
    }

    #[test]
    fn overflow_modes_affect_short_instrument_only() {
        let text = "\
TEMPO 120
seq kick: x...
seq hihat: x.x.x.x.x.x.x.x.
";
        let p = pattern(text);
        assert_eq!(p.total_steps, 16);

        let loop_part = Part::from_pattern(&p, OverflowMode::Loop);
        let mut kick_steps: Vec<u32> = loop_part
            .events
            .iter()
            .filter(|e| e.instrument == "kick")
            .map(|e| e.step)
            .collect();
        kick_steps.sort_unstable();
        assert_eq!(kick_steps, vec![0, 4, 8, 12]);

        let rest_part = Part::from_pattern(&p, OverflowMode::Rest);
        let kick_steps: Vec<u32> = rest_part
            .events
            .iter()
            .filter(|e| e.instrument == "kick")
            .map(|e| e.step)
            .collect();
        assert_eq!(kick_steps, vec![0]);
    }

    #[test]
    fn tick_dispatches_each_step_exactly_once_across_a_loop_wrap() {
        let p = pattern(FOUR_ON_THE_FLOOR);
        let mut scheduler = Scheduler::new(OverflowMode::Loop);
        scheduler.load_pattern(&p, 0.0);
        scheduler.play(0.0);

        let mut seen_steps = Vec::new();
        // 17 ticks of one step each walks one full loop (16 steps) plus one.
        for i in 0..17 {
            let now = i as f32 * 0.125 + 0.001;
            for event in scheduler.tick(now) {
                seen_steps.push(event.step);
            }
        }
        // Every kick hit (steps 0,4,8,12) should appear exactly twice: once
        // in the first lap, once after the wrap.
        let kick_hits = seen_steps.iter().filter(|&&s| s == 0).count();
        assert_eq!(kick_hits, 2);
    }

    #[test]
    fn pause_then_play_resumes_without_rewinding() {
        let p = pattern(FOUR_ON_THE_FLOOR);
        let mut scheduler = Scheduler::new(OverflowMode::Loop);
        scheduler.load_pattern(&p, 0.0);
        scheduler.play(0.0);
        scheduler.pause(0.73);
        assert!((scheduler.current_time_s(5.0) - 0.73).abs() < 1e-6);
        scheduler.play(5.0);
        assert!((scheduler.current_time_s(5.0) - 0.73).abs() < 1e-6);
    }

    #[test]
    fn stop_resets_position_to_zero() {
        let p = pattern(FOUR_ON_THE_FLOOR);
        let mut scheduler = Scheduler::new(OverflowMode::Loop);
        scheduler.load_pattern(&p, 0.0);
        scheduler.play(0.0);
        scheduler.stop();
        assert_eq!(scheduler.current_time_s(99.0), 0.0);
    }
}
