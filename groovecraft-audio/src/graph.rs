//! The software audio graph (§4.C): a master effect chain, a per-instrument
//! chain per sounding instrument, and LFO modulation routing between them.
//!
//! There is no Web Audio API node graph to mirror here, so each chain is a
//! plain struct holding its stages in series and a `process` method that
//! runs a sample through them. Stages are inserted lazily the first time a
//! pattern configures them (chorus/phaser in the master chain) and torn
//! down by being reset to a fully-dry passthrough rather than removed,
//! matching the "set wet=0 rather than detach" rule in §9.

use std::collections::BTreeMap;

use groovecraft_types::{
    LfoKey, LfoModule, LfoTarget, LfoWave, ModuleScope, Pattern,
};

use crate::effects::{Amp, Chorus, Compressor, Delay, Distort, Eq, Filter, Phaser, Reverb, pan_stereo};
use crate::envelope::{Envelope, VoiceKind};
use crate::synth::{self, SampleBuffer};

/// A currently sounding instrument's DSP chain, rebuilt whenever its
/// configuration changes but kept across pattern edits that don't touch it
/// so its filter/delay/reverb state survives (§9: live edits must not cut
/// sounding voices).
pub struct InstrumentChain {
    pub pre_gain: Option<Amp>,
    pub filter: Option<Filter>,
    pub comp: Option<Compressor>,
    pub eq: Option<Eq>,
    pub pan: f32,
    pub delay_send: Option<Delay>,
    pub reverb_send: Option<Reverb>,
}

impl InstrumentChain {
    pub fn from_pattern(pattern: &Pattern, instrument: &str) -> Self {
        let scope = ModuleScope::Instrument(instrument.to_string());
        Self {
            pre_gain: pattern.amp_modules.get(&scope).map(Amp::new),
            filter: pattern.filter_modules.get(instrument).copied().map(Filter::new),
            comp: pattern.comp_modules.get(&scope).copied().map(Compressor::new),
            eq: pattern.eq_modules.get(&scope).map(Eq::new),
            pan: pattern.pan_modules.get(instrument).map(|p| p.pan).unwrap_or(0.0),
            delay_send: pattern.delay_modules.get(&scope).copied().map(Delay::new),
            reverb_send: pattern.reverb_modules.get(&scope).copied().map(Reverb::new),
        }
    }

    /// Reconfigure in place from a new pattern, keeping stage state (delay
    /// buffers, filter history) for stages that persist across the edit.
    pub fn reconfigure(&mut self, pattern: &Pattern, instrument: &str) {
        let scope = ModuleScope::Instrument(instrument.to_string());

        match (pattern.amp_modules.get(&scope), &mut self.pre_gain) {
            (Some(cfg), Some(stage)) => stage.update(cfg),
            (Some(cfg), None) => self.pre_gain = Some(Amp::new(cfg)),
            (None, _) => self.pre_gain = None,
        }
        match (pattern.filter_modules.get(instrument), &mut self.filter) {
            (Some(cfg), Some(stage)) => stage.update(*cfg),
            (Some(cfg), None) => self.filter = Some(Filter::new(*cfg)),
            (None, _) => self.filter = None,
        }
        match (pattern.comp_modules.get(&scope), &mut self.comp) {
            (Some(cfg), Some(stage)) => stage.update(*cfg),
            (Some(cfg), None) => self.comp = Some(Compressor::new(*cfg)),
            (None, _) => self.comp = None,
        }
        match (pattern.eq_modules.get(&scope), &mut self.eq) {
            (Some(cfg), Some(stage)) => stage.update(cfg),
            (Some(cfg), None) => self.eq = Some(Eq::new(cfg)),
            (None, _) => self.eq = None,
        }
        self.pan = pattern.pan_modules.get(instrument).map(|p| p.pan).unwrap_or(0.0);
        match (pattern.delay_modules.get(&scope), &mut self.delay_send) {
            (Some(cfg), Some(stage)) => stage.update(*cfg),
            (Some(cfg), None) => self.delay_send = Some(Delay::new(*cfg)),
            (None, _) => self.delay_send = None,
        }
        match (pattern.reverb_modules.get(&scope), &mut self.reverb_send) {
            (Some(cfg), Some(stage)) => stage.update(*cfg),
            (Some(cfg), None) => self.reverb_send = Some(Reverb::new(*cfg)),
            (None, _) => self.reverb_send = None,
        }
    }

    /// PreGain -> Filter -> Comp -> EQ -> (delay/reverb sends) -> Pan.
    pub fn process(&mut self, input: f32) -> (f32, f32) {
        let mut signal = input;
        if let Some(stage) = &self.pre_gain {
            signal = stage.process(signal);
        }
        if let Some(stage) = &mut self.filter {
            signal = stage.process(signal);
        }
        if let Some(stage) = &mut self.comp {
            signal = stage.process(signal);
        }
        if let Some(stage) = &mut self.eq {
            signal = stage.process(signal);
        }
        if let Some(stage) = &mut self.delay_send {
            signal = stage.process(signal);
        }
        if let Some(stage) = &mut self.reverb_send {
            signal = stage.process(signal);
        }
        pan_stereo(signal, self.pan)
    }
}

/// A stage duplicated once per output channel. Every master-chain stage
/// (delay lines, filter/compressor history, reverb convolution state, LFO
/// phase) carries per-sample state, so running one shared instance on the
/// left sample and then the right sample would interleave the two channels
/// through a single state machine — halving its effective sample rate and
/// bleeding left into right. A real Web Audio node processes each channel
/// of a stereo signal through independent internal state; this mirrors
/// that by keeping one full stage instance per channel.
struct Stereo<T> {
    l: T,
    r: T,
}

impl<T> Stereo<T> {
    fn new(make: impl Fn() -> T) -> Self {
        Self { l: make(), r: make() }
    }
}

/// The master chain: EQ -> Compressor -> Distortion -> Delay -> Reverb ->
/// Chorus -> Phaser -> PreGain -> Volume (§4.C), processed as true stereo.
/// Chorus/Phaser are only constructed the first time the pattern
/// configures them and then kept (set to unity dry) rather than torn down,
/// since building a fresh modulation phase/delay buffer on every edit
/// would produce an audible glitch on the currently playing loop.
pub struct MasterChain {
    eq: Option<Stereo<Eq>>,
    comp: Option<Stereo<Compressor>>,
    distort: Option<Stereo<Distort>>,
    delay: Option<Stereo<Delay>>,
    reverb: Option<Stereo<Reverb>>,
    chorus: Option<Stereo<Chorus>>,
    phaser: Option<Stereo<Phaser>>,
    pre_gain: Option<Amp>,
    pub volume: f32,
}

impl MasterChain {
    pub fn from_pattern(pattern: &Pattern) -> Self {
        let mut chain = Self {
            eq: None,
            comp: None,
            distort: None,
            delay: None,
            reverb: None,
            chorus: None,
            phaser: None,
            pre_gain: None,
            volume: 1.0,
        };
        chain.reconfigure(pattern);
        chain
    }

    pub fn reconfigure(&mut self, pattern: &Pattern) {
        let master = ModuleScope::Master;
        match (pattern.eq_modules.get(&master), &mut self.eq) {
            (Some(cfg), Some(stage)) => {
                stage.l.update(cfg);
                stage.r.update(cfg);
            }
            (Some(cfg), None) => self.eq = Some(Stereo::new(|| Eq::new(cfg))),
            (None, _) => self.eq = None,
        }
        match (pattern.comp_modules.get(&master), &mut self.comp) {
            (Some(cfg), Some(stage)) => {
                stage.l.update(*cfg);
                stage.r.update(*cfg);
            }
            (Some(cfg), None) => self.comp = Some(Stereo::new(|| Compressor::new(*cfg))),
            (None, _) => self.comp = None,
        }
        match (pattern.distort_modules.get(&master), &mut self.distort) {
            (Some(cfg), Some(stage)) => {
                stage.l.update(*cfg);
                stage.r.update(*cfg);
            }
            (Some(cfg), None) => self.distort = Some(Stereo::new(|| Distort::new(*cfg))),
            (None, _) => self.distort = None,
        }
        match (pattern.delay_modules.get(&master), &mut self.delay) {
            (Some(cfg), Some(stage)) => {
                stage.l.update(*cfg);
                stage.r.update(*cfg);
            }
            (Some(cfg), None) => self.delay = Some(Stereo::new(|| Delay::new(*cfg))),
            (None, _) => self.delay = None,
        }
        match (pattern.reverb_modules.get(&master), &mut self.reverb) {
            (Some(cfg), Some(stage)) => {
                stage.l.update(*cfg);
                stage.r.update(*cfg);
            }
            (Some(cfg), None) => self.reverb = Some(Stereo::new(|| Reverb::new(*cfg))),
            (None, _) => self.reverb = None,
        }
        // Chorus/phaser: lazy insert, never torn down once created.
        if let Some(cfg) = pattern.chorus_modules.get(&master) {
            match &mut self.chorus {
                Some(stage) => {
                    stage.l.update(*cfg);
                    stage.r.update(*cfg);
                }
                None => self.chorus = Some(Stereo::new(|| Chorus::new(*cfg))),
            }
        } else if let Some(stage) = &mut self.chorus {
            let dry = groovecraft_types::ChorusModule { mix: 0.0, ..Default::default() };
            stage.l.update(dry);
            stage.r.update(dry);
        }
        if let Some(cfg) = pattern.phaser_modules.get(&master) {
            match &mut self.phaser {
                Some(stage) => {
                    stage.l.update(*cfg);
                    stage.r.update(*cfg);
                }
                None => self.phaser = Some(Stereo::new(|| Phaser::new(*cfg))),
            }
        } else if let Some(stage) = &mut self.phaser {
            let dry = groovecraft_types::PhaserModule { mix: 0.0, ..Default::default() };
            stage.l.update(dry);
            stage.r.update(dry);
        }
        match (pattern.amp_modules.get(&master), &mut self.pre_gain) {
            (Some(cfg), Some(stage)) => stage.update(cfg),
            (Some(cfg), None) => self.pre_gain = Some(Amp::new(cfg)),
            (None, _) => self.pre_gain = None,
        }
    }

    /// Run one stereo frame through the chain. Each stage's left and right
    /// channel are processed through their own state instance, so a delay
    /// line or filter's left-channel history never sees right-channel
    /// samples and vice versa.
    pub fn process(&mut self, input_l: f32, input_r: f32) -> (f32, f32) {
        let (mut l, mut r) = (input_l, input_r);
        if let Some(stage) = &mut self.eq {
            l = stage.l.process(l);
            r = stage.r.process(r);
        }
        if let Some(stage) = &mut self.comp {
            l = stage.l.process(l);
            r = stage.r.process(r);
        }
        if let Some(stage) = &self.distort {
            l = stage.l.process(l);
            r = stage.r.process(r);
        }
        if let Some(stage) = &mut self.delay {
            l = stage.l.process(l);
            r = stage.r.process(r);
        }
        if let Some(stage) = &mut self.reverb {
            l = stage.l.process(l);
            r = stage.r.process(r);
        }
        if let Some(stage) = &mut self.chorus {
            l = stage.l.process(l);
            r = stage.r.process(r);
        }
        if let Some(stage) = &mut self.phaser {
            l = stage.l.process(l);
            r = stage.r.process(r);
        }
        if let Some(stage) = &self.pre_gain {
            l = stage.process(l);
            r = stage.process(r);
        }
        (l * self.volume, r * self.volume)
    }
}

/// Running phase for one LFO, keyed the same way as `Pattern::lfo_modules`.
struct LfoState {
    config: LfoModule,
    phase: f32,
}

impl LfoState {
    fn value(&self) -> f32 {
        let raw = match self.config.wave {
            LfoWave::Sine => (2.0 * std::f32::consts::PI * self.phase).sin(),
            LfoWave::Triangle => 4.0 * (self.phase - (self.phase + 0.5).floor()).abs() - 1.0,
            LfoWave::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            LfoWave::Sawtooth => 2.0 * self.phase - 1.0,
        };
        raw * self.config.depth * self.config.key.target.depth_scale()
    }

    fn advance(&mut self, dt_s: f32) {
        self.phase = (self.phase + self.config.rate_hz * dt_s).rem_euclid(1.0);
    }
}

/// Owns the master chain, one chain per currently-configured instrument,
/// the procedural sample bank, and LFO phase state. This is the unit the
/// scheduler hands triggered hits to and the audio callback pulls frames
/// from every block.
pub struct AudioGraph {
    pub master: MasterChain,
    pub instrument_chains: BTreeMap<String, InstrumentChain>,
    sample_bank: BTreeMap<String, SampleBuffer>,
    lfos: Vec<LfoState>,
}

impl AudioGraph {
    pub fn from_pattern(pattern: &Pattern) -> Self {
        let mut instrument_chains = BTreeMap::new();
        for name in pattern.instruments.keys() {
            instrument_chains.insert(name.clone(), InstrumentChain::from_pattern(pattern, name));
        }
        let lfos = pattern
            .lfo_modules
            .iter()
            .map(|cfg| LfoState {
                config: cfg.clone(),
                phase: 0.0,
            })
            .collect();
        Self {
            master: MasterChain::from_pattern(pattern),
            instrument_chains,
            sample_bank: synth::build_sample_bank(),
            lfos,
        }
    }

    /// Reconfigure every stage from a new pattern without dropping
    /// currently sounding voices: existing instrument chains are updated in
    /// place, new instruments get a fresh chain, and chains for instruments
    /// no longer in the pattern are dropped (their voices are expected to
    /// have been drained by the scheduler before this call).
    pub fn reconfigure(&mut self, pattern: &Pattern) {
        self.master.reconfigure(pattern);
        for (name, chain) in self.instrument_chains.iter_mut() {
            chain.reconfigure(pattern, name);
        }
        for name in pattern.instruments.keys() {
            self.instrument_chains
                .entry(name.clone())
                .or_insert_with(|| InstrumentChain::from_pattern(pattern, name));
        }
        self.instrument_chains
            .retain(|name, _| pattern.instruments.contains_key(name));
        self.lfos = pattern
            .lfo_modules
            .iter()
            .map(|cfg| LfoState {
                config: cfg.clone(),
                phase: 0.0,
            })
            .collect();
    }

    pub fn advance_lfos(&mut self, dt_s: f32) {
        for lfo in self.lfos.iter_mut() {
            lfo.advance(dt_s);
        }
    }

    /// Current modulation value for `key`, or `0.0` if no LFO targets it.
    pub fn lfo_value(&self, key: &LfoKey) -> f32 {
        self.lfos
            .iter()
            .find(|l| l.config.key == *key)
            .map(LfoState::value)
            .unwrap_or(0.0)
    }

    pub fn amp_modulation(&self, scope: &ModuleScope) -> f32 {
        self.lfo_value(&LfoKey {
            scope: scope.clone(),
            target: LfoTarget::Amp,
        })
    }

    pub fn sample(&self, name: &str) -> Option<&SampleBuffer> {
        self.sample_bank.get(name)
    }

    pub fn instrument_chain_mut(&mut self, instrument: &str) -> Option<&mut InstrumentChain> {
        self.instrument_chains.get_mut(instrument)
    }
}

/// Renders one voice, sample by sample, either from a sample buffer or the
/// synthesized fallback, applying its envelope.
pub struct VoiceRenderer {
    pub instrument: String,
    pub envelope: Envelope,
    pub velocity: f32,
    pub gain_linear: f32,
    source: VoiceSource,
    position: usize,
    t_s: f32,
    sample_rate: f32,
}

enum VoiceSource {
    Sample { frames: Vec<f32> },
    Synth { kind: VoiceKind, note_hz: f32 },
}

impl VoiceRenderer {
    pub fn for_sample(instrument: String, frames: Vec<f32>, envelope: Envelope, velocity: f32, gain_linear: f32, sample_rate: f32) -> Self {
        Self {
            instrument,
            envelope,
            velocity,
            gain_linear,
            source: VoiceSource::Sample { frames },
            position: 0,
            t_s: 0.0,
            sample_rate,
        }
    }

    pub fn for_synth(instrument: String, kind: VoiceKind, note_hz: f32, envelope: Envelope, velocity: f32, sample_rate: f32) -> Self {
        Self {
            instrument,
            envelope,
            velocity,
            gain_linear: 1.0,
            source: VoiceSource::Synth { kind, note_hz },
            position: 0,
            t_s: 0.0,
            sample_rate,
        }
    }

    pub fn is_done(&self) -> bool {
        match &self.source {
            VoiceSource::Sample { frames } => self.position >= frames.len() || self.envelope.is_done(),
            VoiceSource::Synth { .. } => self.envelope.is_done(),
        }
    }

    pub fn next_sample(&mut self) -> f32 {
        let raw = match &self.source {
            VoiceSource::Sample { frames } => {
                let v = frames.get(self.position).copied().unwrap_or(0.0);
                self.position += 1;
                v
            }
            VoiceSource::Synth { kind, note_hz } => synth::synth_fallback_sample(*kind, *note_hz, self.t_s),
        };
        self.t_s += 1.0 / self.sample_rate;
        raw * self.envelope.next_sample() * self.velocity * self.gain_linear
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groovecraft_types::{AmpModule, EnvelopeModule};
    use std::collections::BTreeMap;

    #[test]
    fn master_chain_passthrough_with_no_modules_configured() {
        let pattern = Pattern::new(120, BTreeMap::new());
        let mut chain = MasterChain::from_pattern(&pattern);
        let (l, r) = chain.process(0.5, 0.5);
        assert!((l - 0.5).abs() < 1e-6);
        assert!((r - 0.5).abs() < 1e-6);
    }

    #[test]
    fn master_chain_applies_amp_gain() {
        let mut pattern = Pattern::new(120, BTreeMap::new());
        pattern
            .amp_modules
            .insert(ModuleScope::Master, AmpModule { gain: 0 });
        let mut chain = MasterChain::from_pattern(&pattern);
        let (l, r) = chain.process(0.5, 0.5);
        assert!((l - 0.5).abs() < 1e-6);
        assert!((r - 0.5).abs() < 1e-6);
    }

    #[test]
    fn voice_renderer_reports_done_once_sample_and_envelope_finish() {
        let env_config = EnvelopeModule {
            attack_s: 0.0001,
            decay_s: 0.0001,
            sustain: 0.0,
            release_s: 0.0001,
        };
        let envelope = Envelope::new(env_config, 1000.0);
        let mut voice = VoiceRenderer::for_sample(
            "kick".to_string(),
            vec![0.1, 0.2, 0.3],
            envelope,
            1.0,
            1.0,
            1000.0,
        );
        let mut iterations = 0;
        while !voice.is_done() && iterations < 100 {
            voice.next_sample();
            iterations += 1;
        }
        assert!(voice.is_done());
    }

    #[test]
    fn lfo_state_advances_phase_and_wraps() {
        let mut lfo = LfoState {
            config: LfoModule {
                key: LfoKey {
                    scope: ModuleScope::Master,
                    target: LfoTarget::Amp,
                },
                rate_hz: 2.0,
                depth: 1.0,
                wave: LfoWave::Sine,
            },
            phase: 0.9,
        };
        lfo.advance(0.1);
        assert!(lfo.phase < 1.0);
    }
}
