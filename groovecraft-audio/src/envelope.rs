//! Per-hit ADSR envelope and the hard-coded fallback tails used when an
//! instrument has no `env` module (§4.C).

use groovecraft_types::EnvelopeModule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Attack,
    Decay,
    Sustain,
    Release,
    Done,
}

/// Sample-by-sample ADSR envelope generator. `release_s` doubles as the
/// "hard-coded exponential tail" duration when no explicit envelope module
/// is configured for the voice (the fallback envelopes below all set
/// `sustain = 0.0`, which makes the decay stage do the work of an
/// exponential tail and skips the sustain stage entirely).
pub struct Envelope {
    config: EnvelopeModule,
    sample_rate: f32,
    stage: EnvelopeStage,
    level: f32,
    stage_samples_remaining: u32,
}

impl Envelope {
    pub fn new(config: EnvelopeModule, sample_rate: f32) -> Self {
        Self {
            stage_samples_remaining: (config.attack_s * sample_rate).max(1.0) as u32,
            config,
            sample_rate,
            stage: EnvelopeStage::Attack,
            level: 0.0,
        }
    }

    /// Fallback envelope for a given voice kind, used when the pattern has
    /// no explicit `env` module for the instrument.
    pub fn fallback_for_kind(kind: VoiceKind, sample_rate: f32) -> Self {
        let config = match kind {
            VoiceKind::Kick => EnvelopeModule {
                attack_s: 0.001,
                decay_s: 0.25,
                sustain: 0.0,
                release_s: 0.05,
            },
            VoiceKind::Snare => EnvelopeModule {
                attack_s: 0.001,
                decay_s: 0.12,
                sustain: 0.0,
                release_s: 0.05,
            },
            VoiceKind::Hihat => EnvelopeModule {
                attack_s: 0.001,
                decay_s: 0.06,
                sustain: 0.0,
                release_s: 0.02,
            },
            VoiceKind::Tone => EnvelopeModule {
                attack_s: 0.005,
                decay_s: 0.1,
                sustain: 0.3,
                release_s: 0.2,
            },
        };
        Self::new(config, sample_rate)
    }

    pub fn is_done(&self) -> bool {
        self.stage == EnvelopeStage::Done
    }

    /// Transition into the release stage immediately, from wherever the
    /// envelope currently is.
    pub fn release(&mut self) {
        if self.stage != EnvelopeStage::Done && self.stage != EnvelopeStage::Release {
            self.stage = EnvelopeStage::Release;
            self.stage_samples_remaining = (self.config.release_s * self.sample_rate).max(1.0) as u32;
        }
    }

    pub fn remaining_duration_s(&self) -> f32 {
        self.stage_samples_remaining as f32 / self.sample_rate
    }

    /// Advance one sample and return the current gain multiplier.
    pub fn next_sample(&mut self) -> f32 {
        match self.stage {
            EnvelopeStage::Attack => {
                let total = (self.config.attack_s * self.sample_rate).max(1.0);
                self.level = 1.0 - self.stage_samples_remaining as f32 / total;
                self.advance_stage(EnvelopeStage::Decay, self.config.decay_s);
            }
            EnvelopeStage::Decay => {
                let total = (self.config.decay_s * self.sample_rate).max(1.0);
                let progress = 1.0 - self.stage_samples_remaining as f32 / total;
                self.level = 1.0 + (self.config.sustain - 1.0) * progress;
                let next_stage = if self.config.sustain > 0.0 {
                    EnvelopeStage::Sustain
                } else {
                    EnvelopeStage::Done
                };
                self.advance_stage(next_stage, 0.0);
            }
            EnvelopeStage::Sustain => {
                self.level = self.config.sustain;
            }
            EnvelopeStage::Release => {
                let total = (self.config.release_s * self.sample_rate).max(1.0);
                let start_level = self.level.max(self.config.sustain);
                let progress = 1.0 - self.stage_samples_remaining as f32 / total;
                self.level = start_level * (1.0 - progress);
                self.advance_stage(EnvelopeStage::Done, 0.0);
            }
            EnvelopeStage::Done => {
                self.level = 0.0;
            }
        }
        self.level
    }

    fn advance_stage(&mut self, next: EnvelopeStage, next_duration_s: f32) {
        if self.stage_samples_remaining > 0 {
            self.stage_samples_remaining -= 1;
        }
        if self.stage_samples_remaining == 0 && self.stage != EnvelopeStage::Sustain {
            self.stage = next;
            if next != EnvelopeStage::Sustain && next != EnvelopeStage::Done {
                self.stage_samples_remaining = (next_duration_s * self.sample_rate).max(1.0) as u32;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceKind {
    Kick,
    Snare,
    Hihat,
    Tone,
}

impl VoiceKind {
    pub fn for_instrument_name(name: &str) -> Self {
        match name {
            "kick" => VoiceKind::Kick,
            "snare" => VoiceKind::Snare,
            "hihat" => VoiceKind::Hihat,
            _ => VoiceKind::Tone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_reaches_done_eventually_without_sustain() {
        let config = EnvelopeModule {
            attack_s: 0.001,
            decay_s: 0.001,
            sustain: 0.0,
            release_s: 0.001,
        };
        let mut env = Envelope::new(config, 1000.0);
        let mut samples = 0;
        while !env.is_done() && samples < 100 {
            env.next_sample();
            samples += 1;
        }
        assert!(env.is_done());
    }

    #[test]
    fn release_moves_sustained_envelope_toward_done() {
        let config = EnvelopeModule {
            attack_s: 0.001,
            decay_s: 0.001,
            sustain: 0.5,
            release_s: 0.01,
        };
        let mut env = Envelope::new(config, 1000.0);
        for _ in 0..10 {
            env.next_sample();
        }
        assert_eq!(env.stage, EnvelopeStage::Sustain);
        env.release();
        assert_eq!(env.stage, EnvelopeStage::Release);
        let mut samples = 0;
        while !env.is_done() && samples < 1000 {
            env.next_sample();
            samples += 1;
        }
        assert!(env.is_done());
    }

    #[test]
    fn fallback_for_kind_uses_zero_sustain_for_percussive_kinds() {
        let env = Envelope::fallback_for_kind(VoiceKind::Kick, 44100.0);
        assert_eq!(env.config.sustain, 0.0);
    }
}
