//! The immutable `Pattern` value (§3.1): the parser's sole output, and the
//! only state the scheduler and audio graph read to drive playback.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::modules::{
    AmpModule, ChorusModule, CompModule, DelayModule, DistortModule, EnvelopeModule, EqModule,
    FilterModule, GrooveModule, LfoModule, ModuleScope, NoteModule, PanModule, PhaserModule,
    ReverbModule, SampleModule,
};

/// Scheduling rule for instruments whose step array is shorter than
/// `total_steps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OverflowMode {
    #[default]
    Loop,
    Rest,
}

/// One instrument's step grid: a boolean hit mask and a parallel velocity
/// array, both the same length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub steps: Vec<bool>,
    pub velocities: Vec<f32>,
}

impl Instrument {
    pub fn new(steps: Vec<bool>, velocities: Vec<f32>) -> Self {
        debug_assert_eq!(steps.len(), velocities.len());
        Self { steps, velocities }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Hit state and velocity at absolute step `s`, honoring `overflow`.
    /// Returns `None` when the step is silent (a rest, or past the end of
    /// a `Rest`-mode instrument).
    pub fn hit_at(&self, s: u32, overflow: OverflowMode) -> Option<f32> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        let idx = match overflow {
            OverflowMode::Loop => (s as usize) % len,
            OverflowMode::Rest => {
                if (s as usize) >= len {
                    return None;
                }
                s as usize
            }
        };
        if self.steps[idx] {
            Some(self.velocities[idx])
        } else {
            None
        }
    }
}

/// A fully parsed, validated pattern. Immutable once constructed; a new
/// edit produces a whole new `Pattern` rather than mutating this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub tempo: u16,
    pub total_steps: u32,
    pub instruments: BTreeMap<String, Instrument>,

    pub sample_modules: BTreeMap<String, SampleModule>,
    pub note_modules: BTreeMap<String, NoteModule>,
    pub envelope_modules: BTreeMap<String, EnvelopeModule>,
    pub filter_modules: BTreeMap<String, FilterModule>,
    pub pan_modules: BTreeMap<String, PanModule>,

    pub eq_modules: BTreeMap<ModuleScope, EqModule>,
    pub amp_modules: BTreeMap<ModuleScope, AmpModule>,
    pub comp_modules: BTreeMap<ModuleScope, CompModule>,
    pub delay_modules: BTreeMap<ModuleScope, DelayModule>,
    pub reverb_modules: BTreeMap<ModuleScope, ReverbModule>,
    pub distort_modules: BTreeMap<ModuleScope, DistortModule>,
    pub chorus_modules: BTreeMap<ModuleScope, ChorusModule>,
    pub phaser_modules: BTreeMap<ModuleScope, PhaserModule>,

    pub lfo_modules: Vec<LfoModule>,
    pub groove_modules: BTreeMap<ModuleScope, GrooveModule>,
}

impl Pattern {
    /// `total_steps = max(longest seq row, 16)` (§3.1 invariant).
    pub fn total_steps_for(instruments: &BTreeMap<String, Instrument>) -> u32 {
        instruments
            .values()
            .map(|i| i.len() as u32)
            .max()
            .unwrap_or(0)
            .max(16)
    }

    pub fn new(tempo: u16, instruments: BTreeMap<String, Instrument>) -> Self {
        let total_steps = Self::total_steps_for(&instruments);
        Self {
            tempo,
            total_steps,
            instruments,
            sample_modules: BTreeMap::new(),
            note_modules: BTreeMap::new(),
            envelope_modules: BTreeMap::new(),
            filter_modules: BTreeMap::new(),
            pan_modules: BTreeMap::new(),
            eq_modules: BTreeMap::new(),
            amp_modules: BTreeMap::new(),
            comp_modules: BTreeMap::new(),
            delay_modules: BTreeMap::new(),
            reverb_modules: BTreeMap::new(),
            distort_modules: BTreeMap::new(),
            chorus_modules: BTreeMap::new(),
            phaser_modules: BTreeMap::new(),
            lfo_modules: Vec::new(),
            groove_modules: BTreeMap::new(),
        }
    }

    /// Duration of one 16th-note step, in seconds (`60 / tempo / 4`).
    pub fn step_interval_s(&self) -> f32 {
        60.0 / self.tempo as f32 / 4.0
    }

    /// Duration of one full loop, in seconds.
    pub fn loop_duration_s(&self) -> f32 {
        self.total_steps as f32 * self.step_interval_s()
    }

    /// Groove config for `scope`, falling back to the master groove when
    /// the instrument has none of its own (§4.D: "instrument-scope groove
    /// overrides master groove").
    pub fn effective_groove(&self, scope: &ModuleScope) -> Option<&GrooveModule> {
        self.groove_modules
            .get(scope)
            .or_else(|| self.groove_modules.get(&ModuleScope::Master))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(bits: &str) -> Instrument {
        let steps: Vec<bool> = bits.chars().map(|c| c != '.').collect();
        let velocities = steps.iter().map(|&h| if h { 0.7 } else { 0.0 }).collect();
        Instrument::new(steps, velocities)
    }

    #[test]
    fn total_steps_is_at_least_sixteen() {
        let mut instruments = BTreeMap::new();
        instruments.insert("kick".to_string(), seq("x..."));
        assert_eq!(Pattern::total_steps_for(&instruments), 16);
    }

    #[test]
    fn total_steps_follows_longest_row() {
        let mut instruments = BTreeMap::new();
        instruments.insert("kick".to_string(), seq(&"x...".repeat(8)));
        assert_eq!(Pattern::total_steps_for(&instruments), 32);
    }

    #[test]
    fn step_interval_matches_four_steps_per_beat() {
        let p = Pattern::new(120, BTreeMap::new());
        assert!((p.step_interval_s() - 0.125).abs() < 1e-6);
        assert!((p.loop_duration_s() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn loop_overflow_wraps_short_instrument() {
        let kick = seq("x...");
        assert_eq!(kick.hit_at(0, OverflowMode::Loop), Some(0.7));
        assert_eq!(kick.hit_at(4, OverflowMode::Loop), Some(0.7));
        assert_eq!(kick.hit_at(1, OverflowMode::Loop), None);
    }

    #[test]
    fn rest_overflow_silences_past_end() {
        let kick = seq("x...");
        assert_eq!(kick.hit_at(0, OverflowMode::Rest), Some(0.7));
        assert_eq!(kick.hit_at(4, OverflowMode::Rest), None);
        assert_eq!(kick.hit_at(12, OverflowMode::Rest), None);
    }

    #[test]
    fn instrument_groove_overrides_master() {
        use crate::modules::{GrooveModule, GrooveType};
        let mut p = Pattern::new(120, BTreeMap::new());
        p.groove_modules.insert(
            ModuleScope::Master,
            GrooveModule {
                groove_type: GrooveType::Swing,
                amount: 0.5,
                steps: None,
                subdivision: None,
                template_name: None,
            },
        );
        assert!(p.effective_groove(&ModuleScope::Instrument("hihat".into())).is_some());
        p.groove_modules.insert(
            ModuleScope::Instrument("hihat".into()),
            GrooveModule {
                groove_type: GrooveType::Rush,
                amount: 0.2,
                steps: None,
                subdivision: None,
                template_name: None,
            },
        );
        let g = p
            .effective_groove(&ModuleScope::Instrument("hihat".into()))
            .unwrap();
        assert_eq!(g.groove_type, GrooveType::Rush);
    }
}
