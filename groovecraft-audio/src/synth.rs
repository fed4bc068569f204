//! Procedural sample bank and the hard-coded synth fallback (§4.C).
//!
//! All buffers here are generated deterministically (modulo RNG for the
//! noise-based samples) at startup; no external sample assets are loaded.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::envelope::VoiceKind;

pub const SAMPLE_RATE: f32 = 44_100.0;

/// Built-in sample identifiers (§4.C).
pub const BUILTIN_SAMPLE_NAMES: &[&str] = &[
    "kick", "kick808", "snare", "clap", "rim", "tom", "cowbell", "shaker", "crash", "hihat",
    "openhat", "perc",
];

/// A procedurally generated mono sample buffer.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    pub frames: Vec<f32>,
}

impl SampleBuffer {
    pub fn duration_s(&self) -> f32 {
        self.frames.len() as f32 / SAMPLE_RATE
    }
}

/// Deterministic RNG seed per sample name so the bank is reproducible
/// across runs without needing to persist generated audio.
fn rng_for(name: &str) -> StdRng {
    let seed = name.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
    StdRng::seed_from_u64(seed)
}

fn sine_burst(freq_hz: f32, duration_s: f32, glide_to_fraction: f32) -> Vec<f32> {
    let n = (duration_s * SAMPLE_RATE) as usize;
    (0..n)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE;
            let progress = t / duration_s.max(1e-6);
            let instantaneous_freq = freq_hz * (1.0 - progress * (1.0 - glide_to_fraction));
            let phase = 2.0 * std::f32::consts::PI * instantaneous_freq * t;
            let env = (1.0 - progress).max(0.0).powf(1.5);
            phase.sin() * env
        })
        .collect()
}

fn noise_burst(rng: &mut StdRng, duration_s: f32, shape: f32) -> Vec<f32> {
    let n = (duration_s * SAMPLE_RATE) as usize;
    (0..n)
        .map(|i| {
            let t = i as f32 / n.max(1) as f32;
            let env = (1.0 - t).powf(shape);
            rng.gen_range(-1.0f32..=1.0) * env
        })
        .collect()
}

fn square_burst(freq_hz: f32, duration_s: f32) -> Vec<f32> {
    let n = (duration_s * SAMPLE_RATE) as usize;
    (0..n)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE;
            let progress = i as f32 / n.max(1) as f32;
            let env = (1.0 - progress).powf(2.0);
            let phase = (freq_hz * t) % 1.0;
            (if phase < 0.5 { 1.0 } else { -1.0 }) * env
        })
        .collect()
}

/// Build the full procedural sample bank.
pub fn build_sample_bank() -> std::collections::BTreeMap<String, SampleBuffer> {
    let mut bank = std::collections::BTreeMap::new();
    for &name in BUILTIN_SAMPLE_NAMES {
        let mut rng = rng_for(name);
        let frames = match name {
            "kick" => sine_burst(60.0, 0.35, 0.5),
            "kick808" => sine_burst(45.0, 0.9, 0.4),
            "snare" => {
                let mut tone = sine_burst(180.0, 0.15, 0.9);
                let noise = noise_burst(&mut rng, 0.15, 1.2);
                for (t, n) in tone.iter_mut().zip(noise.iter()) {
                    *t = *t * 0.4 + n * 0.6;
                }
                tone
            }
            "clap" => noise_burst(&mut rng, 0.2, 0.8),
            "rim" => square_burst(900.0, 0.04),
            "tom" => sine_burst(140.0, 0.3, 0.5),
            "cowbell" => square_burst(560.0, 0.2),
            "shaker" => noise_burst(&mut rng, 0.08, 2.0),
            "crash" => noise_burst(&mut rng, 1.2, 0.3),
            "hihat" => square_burst(8_000.0, 0.08),
            "openhat" => square_burst(8_000.0, 0.35),
            "perc" => sine_burst(320.0, 0.1, 0.7),
            _ => unreachable!("BUILTIN_SAMPLE_NAMES is the only source of names"),
        };
        bank.insert(name.to_string(), SampleBuffer { frames });
    }
    bank
}

/// One sample of the hard-coded synth fallback for an instrument with no
/// sample binding, at phase/time `t` seconds since the voice started.
pub fn synth_fallback_sample(kind: VoiceKind, note_hz: f32, t: f32) -> f32 {
    match kind {
        VoiceKind::Kick => {
            let glide = (1.0 - (t / 0.1).min(1.0) * 0.5).max(0.5);
            (2.0 * std::f32::consts::PI * note_hz * glide * t).sin()
        }
        VoiceKind::Snare => {
            // White-noise burst; deterministic seeding is unnecessary here
            // since this path renders live, one sample at a time.
            rand::thread_rng().gen_range(-1.0f32..=1.0)
        }
        VoiceKind::Hihat => {
            let phase = (8_000.0 * t) % 1.0;
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        VoiceKind::Tone => (2.0 * std::f32::consts::PI * note_hz * t).sin(),
    }
}

/// Default base pitch for a synthesized instrument with no `note` module
/// (§4.C).
pub fn default_note_hz(kind: VoiceKind) -> f32 {
    match kind {
        VoiceKind::Kick => 60.0,
        VoiceKind::Tone => 440.0,
        VoiceKind::Snare | VoiceKind::Hihat => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_bank_has_every_builtin_name() {
        let bank = build_sample_bank();
        for &name in BUILTIN_SAMPLE_NAMES {
            assert!(bank.contains_key(name), "missing builtin sample '{name}'");
            assert!(!bank[name].frames.is_empty());
        }
    }

    #[test]
    fn kick_sample_is_a_few_hundred_milliseconds() {
        let bank = build_sample_bank();
        let kick = &bank["kick"];
        assert!(kick.duration_s() > 0.1 && kick.duration_s() < 1.0);
    }

    #[test]
    fn default_note_hz_matches_spec_fallbacks() {
        assert_eq!(default_note_hz(VoiceKind::Kick), 60.0);
        assert_eq!(default_note_hz(VoiceKind::Tone), 440.0);
    }
}
