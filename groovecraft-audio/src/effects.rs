//! DSP stages used by both the master chain and per-instrument chains
//! (§4.C). Every stage is a plain sample processor: it owns whatever state
//! it needs between calls (delay lines, filter history, LFO phase) and
//! exposes a `process(&mut self, input: f32) -> f32` entry point, so the
//! graph can wire them in sequence without any stage knowing about its
//! neighbors.
//!
//! A disabled stage is represented by its absence from the graph rather
//! than by a flag: §9's "amount=0 / mix=0 still runs the full stage but at
//! unity dry/wet" invariant is implemented by each stage's own `mix`/`wet`
//! field defaulting to fully dry, not by skipping `process`.

use std::f32::consts::PI;

use groovecraft_types::{
    AmpModule, ChorusModule, CompModule, DelayModule, DistortModule, EqModule, FilterModule,
    FilterType, PhaserModule, ReverbModule,
};
use rand::Rng;

use crate::synth::SAMPLE_RATE;

/// Three-band EQ built from three second-order shelving/peaking biquads in
/// series, each band driven by an integer -3..=3 step from `EqModule`.
pub struct Eq {
    low_gain_db: f32,
    mid_gain_db: f32,
    high_gain_db: f32,
    low_z: [f32; 2],
    mid_z: [f32; 2],
    high_z: [f32; 2],
}

impl Eq {
    pub fn new(config: &EqModule) -> Self {
        Self {
            low_gain_db: config.low as f32 * 3.0,
            mid_gain_db: config.mid as f32 * 3.0,
            high_gain_db: config.high as f32 * 3.0,
            low_z: [0.0; 2],
            mid_z: [0.0; 2],
            high_z: [0.0; 2],
        }
    }

    pub fn update(&mut self, config: &EqModule) {
        self.low_gain_db = config.low as f32 * 3.0;
        self.mid_gain_db = config.mid as f32 * 3.0;
        self.high_gain_db = config.high as f32 * 3.0;
    }

    /// One-pole shelf/peak shaping per band; simple but stable for the
    /// integer-stepped gains this module allows.
    fn shelf(&mut self, input: f32, gain_db: f32, cutoff_hz: f32, z: usize, band: BandKind) -> f32 {
        let gain = 10f32.powf(gain_db / 20.0) - 1.0;
        let rc = 1.0 / (2.0 * PI * cutoff_hz);
        let dt = 1.0 / SAMPLE_RATE;
        let alpha = dt / (rc + dt);
        let history = match band {
            BandKind::Low => &mut self.low_z[z],
            BandKind::Mid => &mut self.mid_z[z],
            BandKind::High => &mut self.high_z[z],
        };
        *history += alpha * (input - *history);
        match band {
            BandKind::Low => input + gain * *history,
            BandKind::High => input + gain * (input - *history),
            BandKind::Mid => input + gain * *history,
        }
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let low = self.shelf(input, self.low_gain_db, 250.0, 0, BandKind::Low);
        let mid = self.shelf(low, self.mid_gain_db, 1_500.0, 1, BandKind::Mid);
        self.shelf(mid, self.high_gain_db, 6_000.0, 0, BandKind::High)
    }
}

#[derive(Clone, Copy)]
enum BandKind {
    Low,
    Mid,
    High,
}

/// Static gain stage, dB-per-step converted once at construction.
pub struct Amp {
    linear_gain: f32,
}

impl Amp {
    pub fn new(config: &AmpModule) -> Self {
        Self {
            linear_gain: 10f32.powf(config.gain as f32 * 3.0 / 20.0),
        }
    }

    pub fn update(&mut self, config: &AmpModule) {
        self.linear_gain = 10f32.powf(config.gain as f32 * 3.0 / 20.0);
    }

    pub fn process(&self, input: f32) -> f32 {
        input * self.linear_gain
    }
}

/// Feed-forward compressor with separate attack/release smoothing of the
/// gain reduction envelope.
pub struct Compressor {
    config: CompModule,
    envelope_db: f32,
}

impl Compressor {
    pub fn new(config: CompModule) -> Self {
        Self {
            config,
            envelope_db: -120.0,
        }
    }

    pub fn update(&mut self, config: CompModule) {
        self.config = config;
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let input_db = 20.0 * input.abs().max(1e-8).log10();
        let coeff = if input_db > self.envelope_db {
            (-1.0 / (self.config.attack_s * SAMPLE_RATE)).exp()
        } else {
            (-1.0 / (self.config.release_s * SAMPLE_RATE)).exp()
        };
        self.envelope_db = coeff * self.envelope_db + (1.0 - coeff) * input_db;

        let over_db = self.envelope_db - self.config.threshold_db;
        let knee = self.config.knee_db.max(0.001);
        let reduction_db = if over_db <= -knee / 2.0 {
            0.0
        } else if over_db >= knee / 2.0 {
            over_db - over_db / self.config.ratio
        } else {
            let x = over_db + knee / 2.0;
            let soft = x * x / (2.0 * knee);
            soft - soft / self.config.ratio
        };
        let gain = 10f32.powf(-reduction_db / 20.0);
        input * gain
    }
}

/// Biquad state-variable filter, one of lowpass/highpass/bandpass/notch.
pub struct Filter {
    config: FilterModule,
    low: f32,
    band: f32,
}

impl Filter {
    pub fn new(config: FilterModule) -> Self {
        Self {
            config,
            low: 0.0,
            band: 0.0,
        }
    }

    pub fn update(&mut self, config: FilterModule) {
        self.config = config;
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let f = 2.0 * (PI * self.config.freq_hz / SAMPLE_RATE).sin();
        let q_damp = 1.0 / self.config.q.max(0.01);
        let high = input - self.low - q_damp * self.band;
        self.band += f * high;
        self.low += f * self.band;
        match self.config.filter_type {
            FilterType::LowPass => self.low,
            FilterType::HighPass => high,
            FilterType::BandPass => self.band,
            FilterType::Notch => self.low + high,
        }
    }
}

/// Feedback delay line with an integer sample delay derived from `time_s`.
pub struct Delay {
    config: DelayModule,
    buffer: Vec<f32>,
    write_pos: usize,
}

impl Delay {
    pub fn new(config: DelayModule) -> Self {
        let max_samples = (4.0 * SAMPLE_RATE) as usize;
        Self {
            config,
            buffer: vec![0.0; max_samples.max(1)],
            write_pos: 0,
        }
    }

    pub fn update(&mut self, config: DelayModule) {
        self.config = config;
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let delay_samples = ((self.config.time_s * SAMPLE_RATE) as usize).clamp(1, self.buffer.len() - 1);
        let read_pos = (self.write_pos + self.buffer.len() - delay_samples) % self.buffer.len();
        let delayed = self.buffer[read_pos];
        let fed = input + delayed * self.config.feedback;
        self.buffer[self.write_pos] = fed;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        input * (1.0 - self.config.mix) + delayed * self.config.mix
    }
}

/// Convolution reverb. The impulse response is synthesized once from
/// `decay`/`predelay` rather than loaded from a file (§4.C): `predelay_s`
/// of silence followed by exponentially-shaped noise over `decay_s`.
pub struct Reverb {
    config: ReverbModule,
    impulse: Vec<f32>,
    history: Vec<f32>,
    cursor: usize,
}

impl Reverb {
    pub fn new(config: ReverbModule) -> Self {
        let impulse = build_impulse_response(&config);
        let history = vec![0.0; impulse.len().max(1)];
        Self {
            config,
            impulse,
            history,
            cursor: 0,
        }
    }

    pub fn update(&mut self, config: ReverbModule) {
        self.impulse = build_impulse_response(&config);
        self.history = vec![0.0; self.impulse.len().max(1)];
        self.cursor = 0;
        self.config = config;
    }

    /// Direct-form convolution. The impulse responses here are short
    /// (seconds, at most a few hundred thousand samples) but this is still
    /// O(n) per sample; acceptable for the drum-machine-scale voice counts
    /// this engine targets, not for long offline renders.
    pub fn process(&mut self, input: f32) -> f32 {
        self.history[self.cursor] = input;
        let mut wet = 0.0;
        for (i, tap) in self.impulse.iter().enumerate() {
            if *tap == 0.0 {
                continue;
            }
            let idx = (self.cursor + self.history.len() - i) % self.history.len();
            wet += self.history[idx] * tap;
        }
        self.cursor = (self.cursor + 1) % self.history.len();
        input * (1.0 - self.config.mix) + wet * self.config.mix
    }
}

fn build_impulse_response(config: &ReverbModule) -> Vec<f32> {
    let length = ((config.decay_s * SAMPLE_RATE) as usize).max(1);
    let predelay_samples = (config.predelay_s * SAMPLE_RATE) as usize;
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|i| {
            if i < predelay_samples {
                0.0
            } else {
                let t = (i - predelay_samples) as f32 / length.max(1) as f32;
                let uniform: f32 = rng.gen_range(-1.0..=1.0);
                uniform * (1.0 - t).powi(2)
            }
        })
        .collect()
}

/// Waveshaping distortion using the arctangent-family curve from §4.C:
/// `curve(x) = ((3+k) * x * pi / 9) / (pi + k * |x|)`, `k = amount * 100`.
pub struct Distort {
    config: DistortModule,
}

impl Distort {
    pub fn new(config: DistortModule) -> Self {
        Self { config }
    }

    pub fn update(&mut self, config: DistortModule) {
        self.config = config;
    }

    pub fn process(&self, input: f32) -> f32 {
        let k = self.config.amount * 100.0;
        let shaped = ((3.0 + k) * input * PI / 9.0) / (PI + k * input.abs());
        input * (1.0 - self.config.mix) + shaped * self.config.mix
    }
}

/// Modulated short delay line producing a chorus effect.
pub struct Chorus {
    config: ChorusModule,
    buffer: Vec<f32>,
    write_pos: usize,
    phase: f32,
}

impl Chorus {
    pub fn new(config: ChorusModule) -> Self {
        Self {
            config,
            buffer: vec![0.0; (0.05 * SAMPLE_RATE) as usize + 2],
            write_pos: 0,
            phase: 0.0,
        }
    }

    pub fn update(&mut self, config: ChorusModule) {
        self.config = config;
    }

    pub fn process(&mut self, input: f32) -> f32 {
        self.buffer[self.write_pos] = input;
        let mod_s = 0.002 + self.config.depth * 0.015 * (0.5 + 0.5 * (2.0 * PI * self.phase).sin());
        self.phase = (self.phase + self.config.rate_hz / SAMPLE_RATE) % 1.0;

        let delay_samples = mod_s * SAMPLE_RATE;
        let read_pos_f = self.write_pos as f32 - delay_samples;
        let len = self.buffer.len() as f32;
        let read_pos_f = ((read_pos_f % len) + len) % len;
        let i0 = read_pos_f as usize;
        let i1 = (i0 + 1) % self.buffer.len();
        let frac = read_pos_f - i0 as f32;
        let delayed = self.buffer[i0] * (1.0 - frac) + self.buffer[i1] * frac;

        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        input * (1.0 - self.config.mix) + delayed * self.config.mix
    }
}

/// All-pass-cascade phaser; `stages` is always one of the 5 values in
/// `ranges::PHASER_STAGES`.
pub struct Phaser {
    config: PhaserModule,
    stage_z: Vec<f32>,
    phase: f32,
}

impl Phaser {
    pub fn new(config: PhaserModule) -> Self {
        let stages = config.stages as usize;
        Self {
            config,
            stage_z: vec![0.0; stages],
            phase: 0.0,
        }
    }

    pub fn update(&mut self, config: PhaserModule) {
        self.stage_z.resize(config.stages as usize, 0.0);
        self.config = config;
    }

    pub fn process(&mut self, input: f32) -> f32 {
        self.phase = (self.phase + self.config.rate_hz / SAMPLE_RATE) % 1.0;
        let sweep = 200.0 + self.config.depth * 2_000.0 * (0.5 + 0.5 * (2.0 * PI * self.phase).sin());
        let coeff = (PI * sweep / SAMPLE_RATE).tan();
        let allpass_coeff = (coeff - 1.0) / (coeff + 1.0);

        let mut signal = input;
        for z in self.stage_z.iter_mut() {
            let out = allpass_coeff * signal + *z;
            *z = signal - allpass_coeff * out;
            signal = out;
        }
        input * (1.0 - self.config.mix) + signal * self.config.mix
    }
}

/// Equal-power stereo pan. Returns `(left, right)`.
pub fn pan_stereo(input: f32, pan: f32) -> (f32, f32) {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * 0.25 * PI;
    (input * angle.cos(), input * angle.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amp_unity_at_zero_gain_steps() {
        let amp = Amp::new(&AmpModule { gain: 0 });
        assert!((amp.process(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn distort_passthrough_at_zero_mix() {
        let d = Distort::new(DistortModule { amount: 0.8, mix: 0.0 });
        assert!((d.process(0.3) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn delay_passthrough_at_zero_mix() {
        let mut d = Delay::new(DelayModule {
            time_s: 0.2,
            feedback: 0.5,
            mix: 0.0,
        });
        for _ in 0..10 {
            let out = d.process(0.4);
            assert!((out - 0.4).abs() < 1e-6);
        }
    }

    #[test]
    fn pan_center_splits_evenly() {
        let (l, r) = pan_stereo(1.0, 0.0);
        assert!((l - r).abs() < 1e-5);
    }

    #[test]
    fn pan_hard_left_silences_right() {
        let (_l, r) = pan_stereo(1.0, -1.0);
        assert!(r.abs() < 1e-4);
    }

    #[test]
    fn reverb_impulse_respects_predelay() {
        let config = ReverbModule {
            decay_s: 0.1,
            mix: 1.0,
            predelay_s: 0.01,
        };
        let impulse = build_impulse_response(&config);
        let predelay_samples = (config.predelay_s * SAMPLE_RATE) as usize;
        assert!(impulse[..predelay_samples].iter().all(|s| *s == 0.0));
    }
}
