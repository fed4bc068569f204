//! Static groove preset catalog (§4.A, §6.2): named timing templates the
//! scheduler can blend into step times via [`apply`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrooveCategory {
    Swing,
    Latin,
    African,
    Reggae,
    Funk,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrooveTemplate {
    pub name: &'static str,
    pub label: &'static str,
    pub category: GrooveCategory,
    pub offsets: &'static [f32],
    pub velocities: Option<&'static [f32]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrooveApplyResult {
    pub timing_offset: f32,
    pub velocity_scale: f32,
}

/// An MPC-style swing template is a 2-step cycle `[0, (pct-50)/100]`: the
/// downbeat lands on the grid, the upbeat is pushed late by the swing
/// percentage.
const fn mpc_offsets(pct: f32) -> [f32; 2] {
    [0.0, (pct - 50.0) / 100.0]
}

const MPC_54: [f32; 2] = mpc_offsets(54.0);
const MPC_58: [f32; 2] = mpc_offsets(58.0);
const MPC_62: [f32; 2] = mpc_offsets(62.0);
const MPC_66: [f32; 2] = mpc_offsets(66.0);
const MPC_71: [f32; 2] = mpc_offsets(71.0);

const BOSSA_NOVA: [f32; 8] = [0.0, 0.0, 0.08, 0.0, 0.0, -0.05, 0.0, 0.05];
const SON_CLAVE_3_2: [f32; 8] = [0.0, 0.0, 0.06, 0.0, 0.0, 0.0, 0.06, 0.0];
const RUMBA_CLAVE_3_2: [f32; 8] = [0.0, 0.0, 0.08, 0.0, 0.0, 0.0, 0.04, 0.0];
const AFROBEAT_12_8: [f32; 12] = [
    0.0, 0.03, -0.02, 0.0, 0.04, -0.02, 0.0, 0.03, -0.02, 0.0, 0.04, -0.02,
];
const REGGAE_ONE_DROP: [f32; 4] = [0.0, 0.05, 0.0, -0.03];
const SECOND_LINE: [f32; 8] = [0.0, 0.02, 0.07, -0.02, 0.0, 0.03, 0.07, -0.02];
const GO_GO_SWING: [f32; 4] = [0.0, 0.1, 0.02, 0.08];
const DILLA_FEEL: [f32; 8] = [0.0, 0.09, -0.01, 0.06, 0.02, 0.1, -0.02, 0.05];

const REGGAE_ONE_DROP_VEL: [f32; 4] = [0.6, 1.0, 0.7, 0.85];
const DILLA_FEEL_VEL: [f32; 8] = [1.0, 0.7, 0.8, 0.9, 0.75, 1.0, 0.65, 0.85];

const CATALOG: &[GrooveTemplate] = &[
    GrooveTemplate {
        name: "mpc-swing-54",
        label: "MPC Swing 54%",
        category: GrooveCategory::Swing,
        offsets: &MPC_54,
        velocities: None,
    },
    GrooveTemplate {
        name: "mpc-swing-58",
        label: "MPC Swing 58%",
        category: GrooveCategory::Swing,
        offsets: &MPC_58,
        velocities: None,
    },
    GrooveTemplate {
        name: "mpc-swing-62",
        label: "MPC Swing 62%",
        category: GrooveCategory::Swing,
        offsets: &MPC_62,
        velocities: None,
    },
    GrooveTemplate {
        name: "mpc-swing-66",
        label: "MPC Swing 66%",
        category: GrooveCategory::Swing,
        offsets: &MPC_66,
        velocities: None,
    },
    GrooveTemplate {
        name: "mpc-swing-71",
        label: "MPC Swing 71%",
        category: GrooveCategory::Swing,
        offsets: &MPC_71,
        velocities: None,
    },
    GrooveTemplate {
        name: "bossa-nova",
        label: "Bossa Nova",
        category: GrooveCategory::Latin,
        offsets: &BOSSA_NOVA,
        velocities: None,
    },
    GrooveTemplate {
        name: "son-clave-3-2",
        label: "Son Clave 3-2",
        category: GrooveCategory::Latin,
        offsets: &SON_CLAVE_3_2,
        velocities: None,
    },
    GrooveTemplate {
        name: "rumba-clave-3-2",
        label: "Rumba Clave 3-2",
        category: GrooveCategory::Latin,
        offsets: &RUMBA_CLAVE_3_2,
        velocities: None,
    },
    GrooveTemplate {
        name: "afrobeat-12-8",
        label: "Afrobeat 12/8",
        category: GrooveCategory::African,
        offsets: &AFROBEAT_12_8,
        velocities: None,
    },
    GrooveTemplate {
        name: "reggae-one-drop",
        label: "Reggae One Drop",
        category: GrooveCategory::Reggae,
        offsets: &REGGAE_ONE_DROP,
        velocities: Some(&REGGAE_ONE_DROP_VEL),
    },
    GrooveTemplate {
        name: "second-line",
        label: "Second Line",
        category: GrooveCategory::Funk,
        offsets: &SECOND_LINE,
        velocities: None,
    },
    GrooveTemplate {
        name: "go-go-swing",
        label: "Go-Go Swing",
        category: GrooveCategory::Funk,
        offsets: &GO_GO_SWING,
        velocities: None,
    },
    GrooveTemplate {
        name: "dilla-feel",
        label: "Dilla Feel",
        category: GrooveCategory::Funk,
        offsets: &DILLA_FEEL,
        velocities: Some(&DILLA_FEEL_VEL),
    },
];

/// Look up a template by name (case-sensitive, matches the DSL surface).
pub fn get(name: &str) -> Option<&'static GrooveTemplate> {
    CATALOG.iter().find(|t| t.name == name)
}

/// All catalog names, in declaration order.
pub fn get_names() -> Vec<&'static str> {
    CATALOG.iter().map(|t| t.name).collect()
}

/// All templates in a given category, in declaration order.
pub fn get_by_category(category: GrooveCategory) -> Vec<&'static GrooveTemplate> {
    CATALOG.iter().filter(|t| t.category == category).collect()
}

/// The full catalog, in declaration order.
pub fn catalog() -> &'static [GrooveTemplate] {
    CATALOG
}

/// Blend a template's raw per-step offsets/velocities into the step at
/// `step_index`, scaled by `amount` (0 = neutral, 1 = raw template value).
pub fn apply(template: &GrooveTemplate, step_index: u32, amount: f32) -> GrooveApplyResult {
    let i = (step_index as usize) % template.offsets.len();
    let timing_offset = template.offsets[i] * amount;
    let velocity_scale = match template.velocities {
        Some(vels) => 1.0 + (vels[i] - 1.0) * amount,
        None => 1.0,
    };
    GrooveApplyResult {
        timing_offset,
        velocity_scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_thirteen_templates() {
        assert_eq!(CATALOG.len(), 13);
    }

    #[test]
    fn get_finds_known_names() {
        assert!(get("mpc-swing-66").is_some());
        assert!(get("dilla-feel").is_some());
        assert!(get("nonexistent").is_none());
    }

    #[test]
    fn apply_is_neutral_at_zero_amount() {
        let t = get("mpc-swing-66").unwrap();
        for step in 0..8 {
            let r = apply(t, step, 0.0);
            assert_eq!(r.timing_offset, 0.0);
            assert_eq!(r.velocity_scale, 1.0);
        }
    }

    #[test]
    fn apply_returns_raw_offsets_at_full_amount() {
        let t = get("mpc-swing-66").unwrap();
        for step in 0..8u32 {
            let r = apply(t, step, 1.0);
            assert_eq!(r.timing_offset, t.offsets[step as usize % t.offsets.len()]);
        }
    }

    #[test]
    fn mpc_swing_offsets_increase_monotonically_with_percentage() {
        let offset_of = |name: &str| apply(get(name).unwrap(), 1, 1.0).timing_offset;
        let o54 = offset_of("mpc-swing-54");
        let o58 = offset_of("mpc-swing-58");
        let o62 = offset_of("mpc-swing-62");
        let o66 = offset_of("mpc-swing-66");
        let o71 = offset_of("mpc-swing-71");
        assert!(o54 < o58);
        assert!(o58 < o62);
        assert!(o62 < o66);
        assert!(o66 < o71);
    }

    #[test]
    fn mpc_swing_66_even_steps_are_on_grid() {
        let t = get("mpc-swing-66").unwrap();
        let r = apply(t, 0, 1.0);
        assert_eq!(r.timing_offset, 0.0);
    }

    #[test]
    fn velocity_scale_blends_toward_template_value() {
        let t = get("reggae-one-drop").unwrap();
        let half = apply(t, 0, 0.5);
        let raw = t.velocities.unwrap()[0];
        assert_eq!(half.velocity_scale, 1.0 + (raw - 1.0) * 0.5);
    }

    #[test]
    fn get_by_category_filters() {
        let swing = get_by_category(GrooveCategory::Swing);
        assert_eq!(swing.len(), 5);
        assert!(swing.iter().all(|t| t.category == GrooveCategory::Swing));
    }
}
