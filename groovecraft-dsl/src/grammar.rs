//! Argument parsing shared by every statement kind: `key=value` pairs,
//! step characters, and pitch literals.

use std::collections::HashMap;

use regex::Regex;
use std::sync::OnceLock;

use groovecraft_types::Diagnostics;

fn kv_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Za-z_]+)=(\S+)").expect("static regex is valid"))
}

/// Parse a whitespace-separated run of `key=value` tokens into a map.
/// Unrecognized tokens (no `=`) are simply ignored by the regex scan;
/// callers validate which keys they expected to see.
pub fn parse_kv(args: &str) -> HashMap<String, String> {
    kv_regex()
        .captures_iter(args)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

/// Velocity for one step character, or `None` if the character is not a
/// recognized step character (§4.B).
pub fn step_char_velocity(c: char) -> Option<f32> {
    match c {
        'X' => Some(1.0),
        'x' => Some(0.7),
        'o' => Some(0.3),
        '.' => Some(0.0),
        _ => None,
    }
}

/// Parse a `seq` row into `(steps, velocities)`, pushing an error for each
/// unrecognized character. Returns `None` if the row has no recognized
/// characters at all.
pub fn parse_step_row(
    row: &str,
    line: u32,
    diagnostics: &mut Diagnostics,
) -> Option<(Vec<bool>, Vec<f32>)> {
    let mut steps = Vec::new();
    let mut velocities = Vec::new();
    let mut any_error = false;
    for c in row.chars() {
        if c.is_whitespace() {
            continue;
        }
        match step_char_velocity(c) {
            Some(v) => {
                steps.push(v > 0.0);
                velocities.push(v);
            }
            None => {
                any_error = true;
                diagnostics.push_error(Some(line), format!("unrecognized step character '{c}'"));
            }
        }
    }
    if any_error || steps.is_empty() {
        None
    } else {
        Some((steps, velocities))
    }
}

/// Parse a `note` pitch: a bare integer (MIDI note number, converted to
/// Hz) or a float followed by `hz`.
pub fn parse_pitch(raw: &str, line: u32, diagnostics: &mut Diagnostics) -> Option<f32> {
    let raw = raw.trim();
    if let Some(num) = raw.strip_suffix("hz").or_else(|| raw.strip_suffix("Hz")) {
        return num.trim().parse::<f32>().ok().or_else(|| {
            diagnostics.push_error(Some(line), format!("invalid pitch literal '{raw}'"));
            None
        });
    }
    if let Ok(midi) = raw.parse::<i32>() {
        return Some(midi_to_hz(midi));
    }
    diagnostics.push_error(Some(line), format!("invalid pitch literal '{raw}'"));
    None
}

/// Standard MIDI-note-to-frequency conversion, A4 (note 69) = 440 Hz.
pub fn midi_to_hz(note: i32) -> f32 {
    440.0 * 2f32.powf((note - 69) as f32 / 12.0)
}

/// Fetch and parse a required numeric key, pushing an error if absent or
/// unparsable.
pub fn require_f32(
    kv: &HashMap<String, String>,
    key: &str,
    line: u32,
    diagnostics: &mut Diagnostics,
) -> Option<f32> {
    match kv.get(key) {
        Some(v) => v.parse::<f32>().ok().or_else(|| {
            diagnostics.push_error(Some(line), format!("'{key}' is not a valid number: '{v}'"));
            None
        }),
        None => {
            diagnostics.push_error(Some(line), format!("missing required argument '{key}'"));
            None
        }
    }
}

/// Fetch an optional numeric key, falling back to `default` when absent;
/// pushes an error if present but unparsable.
pub fn optional_f32(
    kv: &HashMap<String, String>,
    key: &str,
    default: f32,
    line: u32,
    diagnostics: &mut Diagnostics,
) -> f32 {
    match kv.get(key) {
        Some(v) => v.parse::<f32>().unwrap_or_else(|_| {
            diagnostics.push_error(Some(line), format!("'{key}' is not a valid number: '{v}'"));
            default
        }),
        None => default,
    }
}

pub fn optional_i32(
    kv: &HashMap<String, String>,
    key: &str,
    default: i32,
    line: u32,
    diagnostics: &mut Diagnostics,
) -> i32 {
    match kv.get(key) {
        Some(v) => v.parse::<i32>().unwrap_or_else(|_| {
            diagnostics.push_error(Some(line), format!("'{key}' is not a valid integer: '{v}'"));
            default
        }),
        None => default,
    }
}

/// Clamp a parsed float into `range`, recording a warning when clamped.
pub fn clamp_with_warning(
    value: f32,
    range: (f32, f32),
    key: &str,
    line: u32,
    diagnostics: &mut Diagnostics,
) -> f32 {
    let (clamped, did_clamp) = groovecraft_types::ranges::clamp_f32(value, range);
    if did_clamp {
        diagnostics.push_warning(
            Some(line),
            format!("'{key}' value {value} out of range {range:?}, clamped to {clamped}"),
        );
    }
    clamped
}

pub fn clamp_i32_with_warning(
    value: i32,
    range: (i32, i32),
    key: &str,
    line: u32,
    diagnostics: &mut Diagnostics,
) -> i32 {
    let (clamped, did_clamp) = groovecraft_types::ranges::clamp_i32(value, range);
    if did_clamp {
        diagnostics.push_warning(
            Some(line),
            format!("'{key}' value {value} out of range {range:?}, clamped to {clamped}"),
        );
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_kv_extracts_multiple_pairs() {
        let kv = parse_kv("low=1 mid=-2 high=0");
        assert_eq!(kv.get("low").map(String::as_str), Some("1"));
        assert_eq!(kv.get("mid").map(String::as_str), Some("-2"));
        assert_eq!(kv.get("high").map(String::as_str), Some("0"));
    }

    #[test]
    fn step_char_velocity_matches_spec_table() {
        assert_eq!(step_char_velocity('X'), Some(1.0));
        assert_eq!(step_char_velocity('x'), Some(0.7));
        assert_eq!(step_char_velocity('o'), Some(0.3));
        assert_eq!(step_char_velocity('.'), Some(0.0));
        assert_eq!(step_char_velocity('?'), None);
    }

    #[test]
    fn parse_step_row_builds_steps_and_velocities() {
        let mut d = Diagnostics::new();
        let (steps, vels) = parse_step_row("Xx o.", 1, &mut d).unwrap();
        assert_eq!(steps, vec![true, true, true, false]);
        assert_eq!(vels, vec![1.0, 0.7, 0.3, 0.0]);
        assert!(d.is_valid());
    }

    #[test]
    fn parse_step_row_flags_bad_characters() {
        let mut d = Diagnostics::new();
        assert!(parse_step_row("xz.", 2, &mut d).is_none());
        assert!(!d.is_valid());
    }

    #[test]
    fn parse_pitch_accepts_hz_literal() {
        let mut d = Diagnostics::new();
        assert_eq!(parse_pitch("220hz", 1, &mut d), Some(220.0));
        assert!(d.is_valid());
    }

    #[test]
    fn parse_pitch_converts_midi_note() {
        let mut d = Diagnostics::new();
        let hz = parse_pitch("69", 1, &mut d).unwrap();
        assert!((hz - 440.0).abs() < 1e-3);
    }

    #[test]
    fn midi_to_hz_is_correct_for_a4() {
        assert!((midi_to_hz(69) - 440.0).abs() < 1e-3);
    }
}
