//! Per-effect module configs.
//!
//! Each DSL module keyword (`eq`, `amp`, `comp`, ...) gets its own struct
//! here rather than a shared stringly-keyed config bag, so that the
//! audio graph can match exhaustively over module kind.

use serde::{Deserialize, Serialize};

/// Assigns a built-in or procedurally generated sample to an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleModule {
    pub sample: String,
    /// Gain in integer steps, -3..=3 (engine: +/-3 dB per step).
    pub gain: i32,
}

/// Base pitch for a synthesized (non-sampled) instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteModule {
    pub pitch_hz: f32,
}

/// ADSR envelope shape, seconds except `sustain` which is a level 0..=1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeModule {
    pub attack_s: f32,
    pub decay_s: f32,
    pub sustain: f32,
    pub release_s: f32,
}

impl Default for EnvelopeModule {
    fn default() -> Self {
        Self {
            attack_s: 0.005,
            decay_s: 0.08,
            sustain: 0.0,
            release_s: 0.05,
        }
    }
}

/// Three-band EQ, each band in integer steps -3..=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EqModule {
    pub low: i32,
    pub mid: i32,
    pub high: i32,
}

/// Static gain stage, integer steps -3..=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AmpModule {
    pub gain: i32,
}

/// Dynamics compressor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompModule {
    pub threshold_db: f32,
    pub ratio: f32,
    pub attack_s: f32,
    pub release_s: f32,
    pub knee_db: f32,
}

impl Default for CompModule {
    fn default() -> Self {
        Self {
            threshold_db: -24.0,
            ratio: 4.0,
            attack_s: 0.01,
            release_s: 0.25,
            knee_db: 6.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FilterType {
    #[default]
    LowPass,
    HighPass,
    BandPass,
    Notch,
}

/// Per-instrument filter. Instrument-scope only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterModule {
    pub filter_type: FilterType,
    pub freq_hz: f32,
    pub q: f32,
}

impl Default for FilterModule {
    fn default() -> Self {
        Self {
            filter_type: FilterType::LowPass,
            freq_hz: 20_000.0,
            q: 0.707,
        }
    }
}

/// Feedback delay line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayModule {
    pub time_s: f32,
    pub feedback: f32,
    pub mix: f32,
}

impl Default for DelayModule {
    fn default() -> Self {
        Self {
            time_s: 0.25,
            feedback: 0.3,
            mix: 0.3,
        }
    }
}

/// Convolution reverb, impulse response synthesized from `decay`/`predelay`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReverbModule {
    pub decay_s: f32,
    pub mix: f32,
    pub predelay_s: f32,
}

impl Default for ReverbModule {
    fn default() -> Self {
        Self {
            decay_s: 1.5,
            mix: 0.25,
            predelay_s: 0.0,
        }
    }
}

/// Static stereo position. Instrument-scope only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PanModule {
    pub pan: f32,
}

/// Waveshaping distortion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistortModule {
    pub amount: f32,
    pub mix: f32,
}

impl Default for DistortModule {
    fn default() -> Self {
        Self {
            amount: 0.3,
            mix: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChorusModule {
    pub rate_hz: f32,
    pub depth: f32,
    pub mix: f32,
}

impl Default for ChorusModule {
    fn default() -> Self {
        Self {
            rate_hz: 1.5,
            depth: 0.3,
            mix: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaserModule {
    pub rate_hz: f32,
    pub depth: f32,
    pub stages: u8,
    pub mix: f32,
}

impl Default for PhaserModule {
    fn default() -> Self {
        Self {
            rate_hz: 0.5,
            depth: 0.5,
            stages: 4,
            mix: 0.3,
        }
    }
}

/// Where a module target (effect or LFO) lives: the master chain, or a
/// named instrument's own chain. Replaces a stringly-typed `"master"`
/// sentinel with a real variant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModuleScope {
    Master,
    Instrument(String),
}

impl ModuleScope {
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("master") {
            ModuleScope::Master
        } else {
            ModuleScope::Instrument(raw.to_string())
        }
    }

    pub fn instrument_name(&self) -> Option<&str> {
        match self {
            ModuleScope::Master => None,
            ModuleScope::Instrument(name) => Some(name.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LfoWave {
    #[default]
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

/// LFO modulation target. `FilterFreq`/`FilterQ`/`Pan` are instrument-scope
/// only; `DelayTime`/`DelayFeedback` are master-scope only; `Amp` is either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LfoTarget {
    Amp,
    FilterFreq,
    FilterQ,
    Pan,
    DelayTime,
    DelayFeedback,
}

impl LfoTarget {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "amp" => Some(LfoTarget::Amp),
            "filter.freq" => Some(LfoTarget::FilterFreq),
            "filter.q" => Some(LfoTarget::FilterQ),
            "pan" => Some(LfoTarget::Pan),
            "delay.time" => Some(LfoTarget::DelayTime),
            "delay.feedback" => Some(LfoTarget::DelayFeedback),
            _ => None,
        }
    }

    /// Whether this target is legal for the given scope.
    pub fn allowed_in(&self, scope: &ModuleScope) -> bool {
        match self {
            LfoTarget::Amp => true,
            LfoTarget::FilterFreq | LfoTarget::FilterQ | LfoTarget::Pan => {
                matches!(scope, ModuleScope::Instrument(_))
            }
            LfoTarget::DelayTime | LfoTarget::DelayFeedback => matches!(scope, ModuleScope::Master),
        }
    }

    /// Depth-scaling formula from §4.C: the fraction of the current
    /// parameter value that one full swing of the LFO displaces.
    pub fn depth_scale(&self) -> f32 {
        match self {
            LfoTarget::Amp => 1.0,
            LfoTarget::FilterFreq => 1.0,
            LfoTarget::FilterQ => 1.0,
            LfoTarget::Pan => 1.0,
            LfoTarget::DelayTime => 0.1,
            LfoTarget::DelayFeedback => 1.0,
        }
    }
}

/// Structured LFO key, `{scope, name, target}` — the `"name.target"`
/// stringly-typed key only ever exists on the DSL surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LfoKey {
    pub scope: ModuleScope,
    pub target: LfoTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LfoModule {
    pub key: LfoKey,
    pub rate_hz: f32,
    pub depth: f32,
    pub wave: LfoWave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrooveType {
    Swing,
    Humanize,
    Rush,
    Drag,
    Template,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrooveSubdivision {
    Quarter,
    Eighth,
    Sixteenth,
}

impl GrooveSubdivision {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "4n" => Some(GrooveSubdivision::Quarter),
            "8n" => Some(GrooveSubdivision::Eighth),
            "16n" => Some(GrooveSubdivision::Sixteenth),
            _ => None,
        }
    }

    /// Number of 16th-note steps in one subdivision unit.
    pub fn steps_per_subdiv(&self) -> u32 {
        match self {
            GrooveSubdivision::Quarter => 4,
            GrooveSubdivision::Eighth => 2,
            GrooveSubdivision::Sixteenth => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrooveStepsTarget {
    Odd,
    Even,
    All,
    Indices(Vec<u32>),
}

impl GrooveStepsTarget {
    pub fn targets(&self, step: u32) -> bool {
        match self {
            GrooveStepsTarget::Odd => step % 2 == 1,
            GrooveStepsTarget::Even => step % 2 == 0,
            GrooveStepsTarget::All => true,
            GrooveStepsTarget::Indices(idxs) => idxs.contains(&step),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrooveModule {
    pub groove_type: GrooveType,
    pub amount: f32,
    pub steps: Option<GrooveStepsTarget>,
    pub subdivision: Option<GrooveSubdivision>,
    pub template_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_scope_recognizes_master_case_insensitively() {
        assert_eq!(ModuleScope::parse("MASTER"), ModuleScope::Master);
        assert_eq!(ModuleScope::parse("master"), ModuleScope::Master);
        assert_eq!(
            ModuleScope::parse("kick"),
            ModuleScope::Instrument("kick".to_string())
        );
    }

    #[test]
    fn lfo_target_scope_restrictions() {
        let master = ModuleScope::Master;
        let kick = ModuleScope::Instrument("kick".to_string());
        assert!(LfoTarget::Amp.allowed_in(&master));
        assert!(LfoTarget::Amp.allowed_in(&kick));
        assert!(!LfoTarget::FilterFreq.allowed_in(&master));
        assert!(LfoTarget::FilterFreq.allowed_in(&kick));
        assert!(LfoTarget::DelayTime.allowed_in(&master));
        assert!(!LfoTarget::DelayTime.allowed_in(&kick));
    }

    #[test]
    fn groove_subdivision_steps_per_subdiv() {
        assert_eq!(GrooveSubdivision::Quarter.steps_per_subdiv(), 4);
        assert_eq!(GrooveSubdivision::Eighth.steps_per_subdiv(), 2);
        assert_eq!(GrooveSubdivision::Sixteenth.steps_per_subdiv(), 1);
    }

    #[test]
    fn groove_steps_target_matching() {
        assert!(GrooveStepsTarget::Odd.targets(3));
        assert!(!GrooveStepsTarget::Odd.targets(2));
        assert!(GrooveStepsTarget::Even.targets(2));
        assert!(GrooveStepsTarget::All.targets(17));
        assert!(GrooveStepsTarget::Indices(vec![1, 5, 9]).targets(5));
        assert!(!GrooveStepsTarget::Indices(vec![1, 5, 9]).targets(6));
    }
}
