//! Numeric ranges for DSL parameters, used by the parser to clamp
//! out-of-range values (§6.1).

pub const TEMPO_BPM: (i32, i32) = (60, 200);
pub const SEQ_LEN_STEPS: (usize, usize) = (1, 32);
pub const GAIN_STEPS: (i32, i32) = (-3, 3);
pub const COMP_THRESHOLD_DB: (f32, f32) = (-60.0, 0.0);
pub const COMP_RATIO: (f32, f32) = (1.0, 20.0);
pub const COMP_ATTACK_S: (f32, f32) = (0.001, 0.3);
pub const COMP_RELEASE_S: (f32, f32) = (0.02, 1.0);
pub const COMP_KNEE_DB: (f32, f32) = (0.0, 40.0);
pub const FILTER_FREQ_HZ: (f32, f32) = (20.0, 20_000.0);
pub const FILTER_Q: (f32, f32) = (0.1, 30.0);
pub const DELAY_TIME_S: (f32, f32) = (0.01, 2.0);
pub const DELAY_FEEDBACK: (f32, f32) = (0.0, 0.95);
pub const DELAY_MIX: (f32, f32) = (0.0, 1.0);
pub const REVERB_DECAY_S: (f32, f32) = (0.1, 10.0);
pub const REVERB_PREDELAY_S: (f32, f32) = (0.0, 0.1);
pub const CHORUS_PHASER_RATE_HZ: (f32, f32) = (0.1, 10.0);
pub const CHORUS_PHASER_DEPTH: (f32, f32) = (0.0, 1.0);
pub const DISTORT_AMOUNT: (f32, f32) = (0.0, 1.0);
pub const PAN: (f32, f32) = (-1.0, 1.0);
pub const LFO_RATE_HZ: (f32, f32) = (0.1, 20.0);
pub const LFO_DEPTH: (f32, f32) = (0.0, 1.0);
pub const GROOVE_AMOUNT: (f32, f32) = (0.0, 1.0);

pub const PHASER_STAGES: [u8; 5] = [2, 4, 6, 8, 12];

/// Clamp `v` into `[lo, hi]`, reporting whether a clamp actually happened.
pub fn clamp_f32(v: f32, (lo, hi): (f32, f32)) -> (f32, bool) {
    if v < lo {
        (lo, true)
    } else if v > hi {
        (hi, true)
    } else {
        (v, false)
    }
}

pub fn clamp_i32(v: i32, (lo, hi): (i32, i32)) -> (i32, bool) {
    if v < lo {
        (lo, true)
    } else if v > hi {
        (hi, true)
    } else {
        (v, false)
    }
}

/// Snap `stages` to the nearest supported phaser stage count.
pub fn nearest_phaser_stages(stages: u8) -> (u8, bool) {
    if PHASER_STAGES.contains(&stages) {
        return (stages, false);
    }
    let nearest = PHASER_STAGES
        .iter()
        .copied()
        .min_by_key(|s| (*s as i16 - stages as i16).abs())
        .unwrap_or(4);
    (nearest, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_f32_leaves_in_range_values_untouched() {
        assert_eq!(clamp_f32(0.5, (0.0, 1.0)), (0.5, false));
    }

    #[test]
    fn clamp_f32_clamps_and_flags() {
        assert_eq!(clamp_f32(-1.0, (0.0, 1.0)), (0.0, true));
        assert_eq!(clamp_f32(5.0, (0.0, 1.0)), (1.0, true));
    }

    #[test]
    fn nearest_phaser_stages_snaps_to_closest() {
        assert_eq!(nearest_phaser_stages(4), (4, false));
        assert_eq!(nearest_phaser_stages(5), (4, true));
        assert_eq!(nearest_phaser_stages(7), (6, true));
        assert_eq!(nearest_phaser_stages(10), (8, true));
    }
}
