//! Top-level orchestration: turn source text into a `Pattern` plus
//! diagnostics (§4.B). One statement per non-comment line; order of
//! statements in the source does not matter.

use std::collections::BTreeMap;

use groovecraft_types::modules::{
    AmpModule, ChorusModule, CompModule, DelayModule, DistortModule, EnvelopeModule, EqModule,
    FilterModule, FilterType, GrooveModule, GrooveStepsTarget, GrooveSubdivision, GrooveType,
    LfoKey, LfoModule, LfoTarget, LfoWave, ModuleScope, NoteModule, PanModule, PhaserModule,
    ReverbModule, SampleModule,
};
use groovecraft_types::ranges;
use groovecraft_types::{Diagnostics, Instrument, Pattern};

use crate::grammar::{
    clamp_i32_with_warning, clamp_with_warning, optional_f32, optional_i32, parse_kv, parse_pitch,
    parse_step_row, require_f32,
};
use crate::lexer::{lines, split_keyword, split_target};

const GENERIC_MIX: (f32, f32) = (0.0, 1.0);

/// Parse `text` into a `Pattern`, returning `None` when the diagnostics
/// contain at least one error. `strict` controls whether a pattern whose
/// total step count is outside `{16, 32}` is an error (true) or a warning
/// (false) — see SPEC_FULL.md §9.
pub fn parse(text: &str, strict: bool) -> (Option<Pattern>, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let mut tempo: Option<u16> = None;
    let mut instruments: BTreeMap<String, Instrument> = BTreeMap::new();

    let mut sample_modules: BTreeMap<String, SampleModule> = BTreeMap::new();
    let mut note_modules: BTreeMap<String, NoteModule> = BTreeMap::new();
    let mut envelope_modules: BTreeMap<String, EnvelopeModule> = BTreeMap::new();
    let mut filter_modules: BTreeMap<String, FilterModule> = BTreeMap::new();
    let mut pan_modules: BTreeMap<String, PanModule> = BTreeMap::new();

    let mut eq_modules: BTreeMap<ModuleScope, EqModule> = BTreeMap::new();
    let mut amp_modules: BTreeMap<ModuleScope, AmpModule> = BTreeMap::new();
    let mut comp_modules: BTreeMap<ModuleScope, CompModule> = BTreeMap::new();
    let mut delay_modules: BTreeMap<ModuleScope, DelayModule> = BTreeMap::new();
    let mut reverb_modules: BTreeMap<ModuleScope, ReverbModule> = BTreeMap::new();
    let mut distort_modules: BTreeMap<ModuleScope, DistortModule> = BTreeMap::new();
    let mut chorus_modules: BTreeMap<ModuleScope, ChorusModule> = BTreeMap::new();
    let mut phaser_modules: BTreeMap<ModuleScope, PhaserModule> = BTreeMap::new();

    let mut lfo_modules: Vec<LfoModule> = Vec::new();
    let mut groove_modules: BTreeMap<ModuleScope, GrooveModule> = BTreeMap::new();

    for src in lines(text) {
        let (keyword, rest) = split_keyword(&src.text);
        match keyword {
            "TEMPO" => {
                match rest.trim().parse::<i32>() {
                    Ok(bpm) => {
                        let clamped =
                            clamp_i32_with_warning(bpm, ranges::TEMPO_BPM, "TEMPO", src.number, &mut diagnostics);
                        tempo = Some(clamped as u16);
                    }
                    Err(_) => diagnostics
                        .push_error(Some(src.number), format!("invalid TEMPO value '{rest}'")),
                }
            }
            "seq" => {
                let Some((name, args)) = split_target(rest) else {
                    diagnostics.push_error(Some(src.number), "seq statement missing ':'");
                    continue;
                };
                let name = name.to_lowercase();
                match parse_step_row(args, src.number, &mut diagnostics) {
                    Some((steps, velocities)) => {
                        if steps.len() > ranges::SEQ_LEN_STEPS.1 {
                            diagnostics.push_error(
                                Some(src.number),
                                format!(
                                    "seq '{name}' has {} steps, exceeds the {} step maximum",
                                    steps.len(),
                                    ranges::SEQ_LEN_STEPS.1
                                ),
                            );
                            diagnostics.invalid_instruments.push(name);
                        } else {
                            instruments.insert(name.clone(), Instrument::new(steps, velocities));
                            diagnostics.valid_instruments.push(name);
                        }
                    }
                    None => diagnostics.invalid_instruments.push(name),
                }
            }
            "sample" => {
                let Some((name, args)) = split_target(rest) else {
                    diagnostics.push_error(Some(src.number), "sample statement missing ':'");
                    continue;
                };
                let name = name.to_lowercase();
                let mut parts = args.splitn(2, char::is_whitespace);
                let sample_name = parts.next().unwrap_or("").trim().to_string();
                if sample_name.is_empty() {
                    diagnostics.push_error(Some(src.number), "sample statement missing a sample name");
                    continue;
                }
                let kv = parse_kv(parts.next().unwrap_or(""));
                let gain = optional_i32(&kv, "gain", 0, src.number, &mut diagnostics);
                let gain = clamp_i32_with_warning(gain, ranges::GAIN_STEPS, "gain", src.number, &mut diagnostics);
                sample_modules.insert(
                    name,
                    SampleModule {
                        sample: sample_name,
                        gain,
                    },
                );
            }
            "note" => {
                let Some((name, args)) = split_target(rest) else {
                    diagnostics.push_error(Some(src.number), "note statement missing ':'");
                    continue;
                };
                let name = name.to_lowercase();
                if let Some(pitch_hz) = parse_pitch(args, src.number, &mut diagnostics) {
                    note_modules.insert(name, NoteModule { pitch_hz });
                }
            }
            "env" => {
                let Some((name, args)) = split_target(rest) else {
                    diagnostics.push_error(Some(src.number), "env statement missing ':'");
                    continue;
                };
                let name = name.to_lowercase();
                let kv = parse_kv(args);
                let defaults = EnvelopeModule::default();
                let attack_s = optional_f32(&kv, "attack", defaults.attack_s, src.number, &mut diagnostics);
                let decay_s = optional_f32(&kv, "decay", defaults.decay_s, src.number, &mut diagnostics);
                let sustain = optional_f32(&kv, "sustain", defaults.sustain, src.number, &mut diagnostics);
                let sustain = clamp_with_warning(sustain, (0.0, 1.0), "sustain", src.number, &mut diagnostics);
                let release_s = optional_f32(&kv, "release", defaults.release_s, src.number, &mut diagnostics);
                envelope_modules.insert(
                    name,
                    EnvelopeModule {
                        attack_s,
                        decay_s,
                        sustain,
                        release_s,
                    },
                );
            }
            "eq" => {
                let Some((target, args)) = split_target(rest) else {
                    diagnostics.push_error(Some(src.number), "eq statement missing ':'");
                    continue;
                };
                let scope = ModuleScope::parse(target);
                let kv = parse_kv(args);
                let low = optional_i32(&kv, "low", 0, src.number, &mut diagnostics);
                let low = clamp_i32_with_warning(low, ranges::GAIN_STEPS, "low", src.number, &mut diagnostics);
                let mid = optional_i32(&kv, "mid", 0, src.number, &mut diagnostics);
                let mid = clamp_i32_with_warning(mid, ranges::GAIN_STEPS, "mid", src.number, &mut diagnostics);
                let high = optional_i32(&kv, "high", 0, src.number, &mut diagnostics);
                let high = clamp_i32_with_warning(high, ranges::GAIN_STEPS, "high", src.number, &mut diagnostics);
                eq_modules.insert(scope, EqModule { low, mid, high });
            }
            "amp" => {
                let Some((target, args)) = split_target(rest) else {
                    diagnostics.push_error(Some(src.number), "amp statement missing ':'");
                    continue;
                };
                let scope = ModuleScope::parse(target);
                let kv = parse_kv(args);
                let gain = optional_i32(&kv, "gain", 0, src.number, &mut diagnostics);
                let gain = clamp_i32_with_warning(gain, ranges::GAIN_STEPS, "gain", src.number, &mut diagnostics);
                amp_modules.insert(scope, AmpModule { gain });
            }
            "comp" => {
                let Some((target, args)) = split_target(rest) else {
                    diagnostics.push_error(Some(src.number), "comp statement missing ':'");
                    continue;
                };
                let scope = ModuleScope::parse(target);
                let kv = parse_kv(args);
                let defaults = CompModule::default();
                let threshold_db =
                    optional_f32(&kv, "threshold", defaults.threshold_db, src.number, &mut diagnostics);
                let threshold_db = clamp_with_warning(
                    threshold_db,
                    ranges::COMP_THRESHOLD_DB,
                    "threshold",
                    src.number,
                    &mut diagnostics,
                );
                let ratio = optional_f32(&kv, "ratio", defaults.ratio, src.number, &mut diagnostics);
                let ratio = clamp_with_warning(ratio, ranges::COMP_RATIO, "ratio", src.number, &mut diagnostics);
                let attack_s = optional_f32(&kv, "attack", defaults.attack_s, src.number, &mut diagnostics);
                let attack_s =
                    clamp_with_warning(attack_s, ranges::COMP_ATTACK_S, "attack", src.number, &mut diagnostics);
                let release_s = optional_f32(&kv, "release", defaults.release_s, src.number, &mut diagnostics);
                let release_s =
                    clamp_with_warning(release_s, ranges::COMP_RELEASE_S, "release", src.number, &mut diagnostics);
                let knee_db = optional_f32(&kv, "knee", defaults.knee_db, src.number, &mut diagnostics);
                let knee_db =
                    clamp_with_warning(knee_db, ranges::COMP_KNEE_DB, "knee", src.number, &mut diagnostics);
                comp_modules.insert(
                    scope,
                    CompModule {
                        threshold_db,
                        ratio,
                        attack_s,
                        release_s,
                        knee_db,
                    },
                );
            }
            "filter" => {
                let Some((name, args)) = split_target(rest) else {
                    diagnostics.push_error(Some(src.number), "filter statement missing ':'");
                    continue;
                };
                let name = name.to_lowercase();
                let kv = parse_kv(args);
                let filter_type = match kv.get("type").map(String::as_str) {
                    Some("lowpass") => FilterType::LowPass,
                    Some("highpass") => FilterType::HighPass,
                    Some("bandpass") => FilterType::BandPass,
                    Some("notch") => FilterType::Notch,
                    Some(other) => {
                        diagnostics.push_error(
                            Some(src.number),
                            format!("unknown filter type '{other}'"),
                        );
                        FilterType::LowPass
                    }
                    None => {
                        diagnostics.push_error(Some(src.number), "filter statement missing 'type'");
                        FilterType::LowPass
                    }
                };
                let freq_hz = require_f32(&kv, "freq", src.number, &mut diagnostics)
                    .unwrap_or(FilterModule::default().freq_hz);
                let freq_hz =
                    clamp_with_warning(freq_hz, ranges::FILTER_FREQ_HZ, "freq", src.number, &mut diagnostics);
                let q = optional_f32(&kv, "q", FilterModule::default().q, src.number, &mut diagnostics);
                let q = clamp_with_warning(q, ranges::FILTER_Q, "q", src.number, &mut diagnostics);
                filter_modules.insert(
                    name,
                    FilterModule {
                        filter_type,
                        freq_hz,
                        q,
                    },
                );
            }
            "delay" => {
                let Some((target, args)) = split_target(rest) else {
                    diagnostics.push_error(Some(src.number), "delay statement missing ':'");
                    continue;
                };
                let scope = ModuleScope::parse(target);
                let kv = parse_kv(args);
                let defaults = DelayModule::default();
                let time_s =
                    require_f32(&kv, "time", src.number, &mut diagnostics).unwrap_or(defaults.time_s);
                let time_s =
                    clamp_with_warning(time_s, ranges::DELAY_TIME_S, "time", src.number, &mut diagnostics);
                let feedback = optional_f32(&kv, "feedback", defaults.feedback, src.number, &mut diagnostics);
                let feedback = clamp_with_warning(
                    feedback,
                    ranges::DELAY_FEEDBACK,
                    "feedback",
                    src.number,
                    &mut diagnostics,
                );
                let mix = optional_f32(&kv, "mix", defaults.mix, src.number, &mut diagnostics);
                let mix = clamp_with_warning(mix, ranges::DELAY_MIX, "mix", src.number, &mut diagnostics);
                delay_modules.insert(
                    scope,
                    DelayModule {
                        time_s,
                        feedback,
                        mix,
                    },
                );
            }
            "reverb" => {
                let Some((target, args)) = split_target(rest) else {
                    diagnostics.push_error(Some(src.number), "reverb statement missing ':'");
                    continue;
                };
                let scope = ModuleScope::parse(target);
                let kv = parse_kv(args);
                let defaults = ReverbModule::default();
                let decay_s =
                    require_f32(&kv, "decay", src.number, &mut diagnostics).unwrap_or(defaults.decay_s);
                let decay_s =
                    clamp_with_warning(decay_s, ranges::REVERB_DECAY_S, "decay", src.number, &mut diagnostics);
                let mix = optional_f32(&kv, "mix", defaults.mix, src.number, &mut diagnostics);
                let mix = clamp_with_warning(mix, GENERIC_MIX, "mix", src.number, &mut diagnostics);
                let predelay_s =
                    optional_f32(&kv, "predelay", defaults.predelay_s, src.number, &mut diagnostics);
                let predelay_s = clamp_with_warning(
                    predelay_s,
                    ranges::REVERB_PREDELAY_S,
                    "predelay",
                    src.number,
                    &mut diagnostics,
                );
                reverb_modules.insert(
                    scope,
                    ReverbModule {
                        decay_s,
                        mix,
                        predelay_s,
                    },
                );
            }
            "chorus" => {
                let Some((target, args)) = split_target(rest) else {
                    diagnostics.push_error(Some(src.number), "chorus statement missing ':'");
                    continue;
                };
                let scope = ModuleScope::parse(target);
                let kv = parse_kv(args);
                let defaults = ChorusModule::default();
                let rate_hz = optional_f32(&kv, "rate", defaults.rate_hz, src.number, &mut diagnostics);
                let rate_hz = clamp_with_warning(
                    rate_hz,
                    ranges::CHORUS_PHASER_RATE_HZ,
                    "rate",
                    src.number,
                    &mut diagnostics,
                );
                let depth = optional_f32(&kv, "depth", defaults.depth, src.number, &mut diagnostics);
                let depth = clamp_with_warning(
                    depth,
                    ranges::CHORUS_PHASER_DEPTH,
                    "depth",
                    src.number,
                    &mut diagnostics,
                );
                let mix = optional_f32(&kv, "mix", defaults.mix, src.number, &mut diagnostics);
                let mix = clamp_with_warning(mix, GENERIC_MIX, "mix", src.number, &mut diagnostics);
                chorus_modules.insert(scope, ChorusModule { rate_hz, depth, mix });
            }
            "phaser" => {
                let Some((target, args)) = split_target(rest) else {
                    diagnostics.push_error(Some(src.number), "phaser statement missing ':'");
                    continue;
                };
                let scope = ModuleScope::parse(target);
                let kv = parse_kv(args);
                let defaults = PhaserModule::default();
                let rate_hz = optional_f32(&kv, "rate", defaults.rate_hz, src.number, &mut diagnostics);
                let rate_hz = clamp_with_warning(
                    rate_hz,
                    ranges::CHORUS_PHASER_RATE_HZ,
                    "rate",
                    src.number,
                    &mut diagnostics,
                );
                let depth = optional_f32(&kv, "depth", defaults.depth, src.number, &mut diagnostics);
                let depth = clamp_with_warning(
                    depth,
                    ranges::CHORUS_PHASER_DEPTH,
                    "depth",
                    src.number,
                    &mut diagnostics,
                );
                let stages_raw = optional_i32(&kv, "stages", defaults.stages as i32, src.number, &mut diagnostics);
                let (stages, snapped) = ranges::nearest_phaser_stages(stages_raw.clamp(0, 255) as u8);
                if snapped {
                    diagnostics.push_warning(
                        Some(src.number),
                        format!("phaser 'stages' value {stages_raw} snapped to nearest supported value {stages}"),
                    );
                }
                let mix = optional_f32(&kv, "mix", defaults.mix, src.number, &mut diagnostics);
                let mix = clamp_with_warning(mix, GENERIC_MIX, "mix", src.number, &mut diagnostics);
                phaser_modules.insert(
                    scope,
                    PhaserModule {
                        rate_hz,
                        depth,
                        stages,
                        mix,
                    },
                );
            }
            "pan" => {
                let Some((name, args)) = split_target(rest) else {
                    diagnostics.push_error(Some(src.number), "pan statement missing ':'");
                    continue;
                };
                let name = name.to_lowercase();
                match args.trim().parse::<f32>() {
                    Ok(value) => {
                        let value = clamp_with_warning(value, ranges::PAN, "pan", src.number, &mut diagnostics);
                        pan_modules.insert(name, PanModule { pan: value });
                    }
                    Err(_) => diagnostics
                        .push_error(Some(src.number), format!("invalid pan value '{args}'")),
                }
            }
            "distort" => {
                let Some((target, args)) = split_target(rest) else {
                    diagnostics.push_error(Some(src.number), "distort statement missing ':'");
                    continue;
                };
                let scope = ModuleScope::parse(target);
                let kv = parse_kv(args);
                let defaults = DistortModule::default();
                let amount =
                    require_f32(&kv, "amount", src.number, &mut diagnostics).unwrap_or(defaults.amount);
                let amount =
                    clamp_with_warning(amount, ranges::DISTORT_AMOUNT, "amount", src.number, &mut diagnostics);
                let mix = optional_f32(&kv, "mix", defaults.mix, src.number, &mut diagnostics);
                let mix = clamp_with_warning(mix, GENERIC_MIX, "mix", src.number, &mut diagnostics);
                distort_modules.insert(scope, DistortModule { amount, mix });
            }
            "lfo" => {
                let Some((scope_and_target, args)) = split_target(rest) else {
                    diagnostics.push_error(Some(src.number), "lfo statement missing ':'");
                    continue;
                };
                let mut scope_target_parts = scope_and_target.splitn(2, '.');
                let scope_raw = scope_target_parts.next().unwrap_or("");
                let target_raw = scope_target_parts.next().unwrap_or("").to_string();
                if target_raw.is_empty() {
                    diagnostics.push_error(Some(src.number), "lfo statement missing '.<target>'");
                    continue;
                }
                let scope = ModuleScope::parse(scope_raw);
                let Some(target) = LfoTarget::parse(&target_raw) else {
                    diagnostics.push_error(Some(src.number), format!("unknown lfo target '{target_raw}'"));
                    continue;
                };
                if !target.allowed_in(&scope) {
                    diagnostics.push_error(
                        Some(src.number),
                        format!("lfo target '{target_raw}' is not valid for scope '{scope_raw}'"),
                    );
                    continue;
                }
                let kv = parse_kv(args);
                let rate_raw = kv.get("rate").map(|s| s.trim_end_matches("Hz").trim_end_matches("hz"));
                let rate_hz = rate_raw
                    .and_then(|s| s.parse::<f32>().ok())
                    .unwrap_or(1.0);
                let rate_hz = clamp_with_warning(rate_hz, ranges::LFO_RATE_HZ, "rate", src.number, &mut diagnostics);
                let depth = optional_f32(&kv, "depth", 0.5, src.number, &mut diagnostics);
                let depth = clamp_with_warning(depth, ranges::LFO_DEPTH, "depth", src.number, &mut diagnostics);
                let wave = match kv.get("wave").map(String::as_str) {
                    Some("sine") | None => LfoWave::Sine,
                    Some("triangle") => LfoWave::Triangle,
                    Some("square") => LfoWave::Square,
                    Some("sawtooth") => LfoWave::Sawtooth,
                    Some(other) => {
                        diagnostics.push_warning(Some(src.number), format!("unknown lfo wave '{other}', using sine"));
                        LfoWave::Sine
                    }
                };
                lfo_modules.push(LfoModule {
                    key: LfoKey { scope, target },
                    rate_hz,
                    depth,
                    wave,
                });
            }
            "groove" => {
                let Some((target, args)) = split_target(rest) else {
                    diagnostics.push_error(Some(src.number), "groove statement missing ':'");
                    continue;
                };
                let scope = ModuleScope::parse(target);
                let kv = parse_kv(args);
                let groove_type = match kv.get("type").map(String::as_str) {
                    Some("swing") => GrooveType::Swing,
                    Some("humanize") => GrooveType::Humanize,
                    Some("rush") => GrooveType::Rush,
                    Some("drag") => GrooveType::Drag,
                    Some("template") => GrooveType::Template,
                    Some(other) => {
                        diagnostics.push_error(Some(src.number), format!("unknown groove type '{other}'"));
                        continue;
                    }
                    None => {
                        diagnostics.push_error(Some(src.number), "groove statement missing 'type'");
                        continue;
                    }
                };
                let amount = require_f32(&kv, "amount", src.number, &mut diagnostics).unwrap_or(0.0);
                let amount =
                    clamp_with_warning(amount, ranges::GROOVE_AMOUNT, "amount", src.number, &mut diagnostics);
                let steps = kv.get("steps").map(|raw| match raw.as_str() {
                    "odd" => GrooveStepsTarget::Odd,
                    "even" => GrooveStepsTarget::Even,
                    "all" => GrooveStepsTarget::All,
                    list => GrooveStepsTarget::Indices(
                        list.split(',').filter_map(|tok| tok.trim().parse::<u32>().ok()).collect(),
                    ),
                });
                let subdivision = kv.get("subdivision").and_then(|raw| {
                    let parsed = GrooveSubdivision::parse(raw);
                    if parsed.is_none() {
                        diagnostics
                            .push_warning(Some(src.number), format!("unknown groove subdivision '{raw}'"));
                    }
                    parsed
                });
                let template_name = kv.get("template").cloned();
                if groove_type == GrooveType::Template {
                    match &template_name {
                        Some(name) if groovecraft_types::groove::get(name).is_none() => diagnostics
                            .push_warning(Some(src.number), format!("unknown groove template '{name}'")),
                        None => diagnostics
                            .push_error(Some(src.number), "groove type=template requires 'template='"),
                        _ => {}
                    }
                }
                groove_modules.insert(
                    scope,
                    GrooveModule {
                        groove_type,
                        amount,
                        steps,
                        subdivision,
                        template_name,
                    },
                );
            }
            other => {
                diagnostics.push_error(Some(src.number), format!("unknown statement keyword '{other}'"));
            }
        }
    }

    if tempo.is_none() {
        diagnostics.push_warning(None, "missing TEMPO statement, defaulting to 120");
    }
    let tempo = tempo.unwrap_or(120);

    let mut pattern = Pattern::new(tempo, instruments);
    pattern.sample_modules = sample_modules;
    pattern.note_modules = note_modules;
    pattern.envelope_modules = envelope_modules;
    pattern.filter_modules = filter_modules;
    pattern.pan_modules = pan_modules;
    pattern.eq_modules = eq_modules;
    pattern.amp_modules = amp_modules;
    pattern.comp_modules = comp_modules;
    pattern.delay_modules = delay_modules;
    pattern.reverb_modules = reverb_modules;
    pattern.distort_modules = distort_modules;
    pattern.chorus_modules = chorus_modules;
    pattern.phaser_modules = phaser_modules;
    pattern.lfo_modules = lfo_modules;
    pattern.groove_modules = groove_modules;

    if !matches!(pattern.total_steps, 16 | 32) {
        let message = format!(
            "pattern has {} total steps; only 16 or 32 are recommended",
            pattern.total_steps
        );
        if strict {
            diagnostics.push_error(None, message);
        } else {
            diagnostics.push_warning(None, message);
        }
    }

    check_unknown_instrument_refs(&pattern, &mut diagnostics);

    if diagnostics.is_valid() {
        (Some(pattern), diagnostics)
    } else {
        (None, diagnostics)
    }
}

fn check_unknown_instrument_refs(pattern: &Pattern, diagnostics: &mut Diagnostics) {
    let mut warn = |name: &str| {
        diagnostics.push_warning(None, format!("module refers to unknown instrument '{name}'"));
    };
    for name in pattern.sample_modules.keys() {
        if !pattern.instruments.contains_key(name) {
            warn(name);
        }
    }
    for name in pattern.note_modules.keys() {
        if !pattern.instruments.contains_key(name) {
            warn(name);
        }
    }
    for name in pattern.envelope_modules.keys() {
        if !pattern.instruments.contains_key(name) {
            warn(name);
        }
    }
    for name in pattern.filter_modules.keys() {
        if !pattern.instruments.contains_key(name) {
            warn(name);
        }
    }
    for name in pattern.pan_modules.keys() {
        if !pattern.instruments.contains_key(name) {
            warn(name);
        }
    }
    let scoped_maps_unknown = pattern
        .eq_modules
        .keys()
        .chain(pattern.amp_modules.keys())
        .chain(pattern.comp_modules.keys())
        .chain(pattern.delay_modules.keys())
        .chain(pattern.reverb_modules.keys())
        .chain(pattern.distort_modules.keys())
        .chain(pattern.chorus_modules.keys())
        .chain(pattern.phaser_modules.keys())
        .chain(pattern.groove_modules.keys())
        .filter_map(|scope| scope.instrument_name())
        .filter(|name| !pattern.instruments.contains_key(*name))
        .map(|name| name.to_string())
        .collect::<Vec<_>>();
    for name in scoped_maps_unknown {
        warn(&name);
    }
    for lfo in &pattern.lfo_modules {
        if let Some(name) = lfo.key.scope.instrument_name() {
            if !pattern.instruments.contains_key(name) {
                warn(name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_on_the_floor_parses_cleanly() {
        let src = "TEMPO 120\nseq kick:  x...x...x...x...\nseq snare: ....x.......x...\nseq hihat: x.x.x.x.x.x.x.x.\n";
        let (pattern, diagnostics) = parse(src, false);
        assert!(diagnostics.is_valid());
        let pattern = pattern.unwrap();
        assert_eq!(pattern.tempo, 120);
        assert_eq!(pattern.total_steps, 16);
        assert_eq!(pattern.instruments.len(), 3);
        assert!((pattern.step_interval_s() - 0.125).abs() < 1e-6);
    }

    #[test]
    fn master_swing_groove_parses() {
        let src = "TEMPO 120\nseq kick: x...x...x...x...\ngroove master: type=swing amount=0.6 subdivision=8n\n";
        let (pattern, diagnostics) = parse(src, false);
        assert!(diagnostics.is_valid());
        let pattern = pattern.unwrap();
        let groove = pattern.groove_modules.get(&ModuleScope::Master).unwrap();
        assert_eq!(groove.groove_type, GrooveType::Swing);
        assert_eq!(groove.amount, 0.6);
        assert_eq!(groove.subdivision, Some(GrooveSubdivision::Eighth));
    }

    #[test]
    fn unknown_statement_keyword_is_an_error() {
        let (pattern, diagnostics) = parse("fizz buzz", false);
        assert!(pattern.is_none());
        assert!(!diagnostics.is_valid());
    }

    #[test]
    fn missing_tempo_is_only_a_warning() {
        let (pattern, diagnostics) = parse("seq kick: x...x...x...x...", false);
        assert!(pattern.is_some());
        assert!(!diagnostics.warnings.is_empty());
    }

    #[test]
    fn out_of_range_values_are_clamped_with_a_warning() {
        let src = "TEMPO 120\nseq kick: x...\neq kick: low=10\n";
        let (pattern, diagnostics) = parse(src, false);
        let pattern = pattern.unwrap();
        let eq = pattern
            .eq_modules
            .get(&ModuleScope::Instrument("kick".to_string()))
            .unwrap();
        assert_eq!(eq.low, 3);
        assert!(!diagnostics.warnings.is_empty());
    }

    #[test]
    fn strict_mode_rejects_nonstandard_step_counts() {
        let src = "TEMPO 120\nseq kick: x...x...x...\n";
        let (_pattern, diagnostics) = parse(src, true);
        assert!(!diagnostics.is_valid());
    }

    #[test]
    fn permissive_mode_downgrades_step_count_to_warning() {
        let src = "TEMPO 120\nseq kick: x...x...x...x...x...\n";
        let (pattern, diagnostics) = parse(src, false);
        assert!(pattern.is_some());
        assert!(diagnostics.is_valid());
        assert!(!diagnostics.warnings.is_empty());
    }

    #[test]
    fn lfo_target_scoping_is_enforced() {
        let src = "TEMPO 120\nseq kick: x...\nlfo kick.delay.time: rate=1hz depth=0.5\n";
        let (pattern, diagnostics) = parse(src, false);
        assert!(pattern.is_none());
        assert!(!diagnostics.is_valid());
    }

    #[test]
    fn lfo_parses_dotted_target_correctly() {
        let src = "TEMPO 120\nseq kick: x...\nlfo kick.filter.freq: rate=2hz depth=0.3\n";
        let (pattern, diagnostics) = parse(src, false);
        assert!(diagnostics.is_valid());
        let pattern = pattern.unwrap();
        assert_eq!(pattern.lfo_modules.len(), 1);
        assert_eq!(pattern.lfo_modules[0].key.target, LfoTarget::FilterFreq);
    }

    #[test]
    fn unknown_instrument_reference_is_a_warning_not_an_error() {
        let src = "TEMPO 120\nseq kick: x...\neq ghost: low=1\n";
        let (pattern, diagnostics) = parse(src, false);
        assert!(pattern.is_some());
        assert!(diagnostics.is_valid());
        assert!(diagnostics
            .warnings
            .iter()
            .any(|w| w.message.contains("ghost")));
    }

    #[test]
    fn note_module_accepts_midi_and_hz_pitches() {
        let src = "TEMPO 120\nseq kick: x...\nnote kick: 69\nseq snare: x...\nnote snare: 220hz\n";
        let (pattern, diagnostics) = parse(src, false);
        assert!(diagnostics.is_valid());
        let pattern = pattern.unwrap();
        assert!((pattern.note_modules["kick"].pitch_hz - 440.0).abs() < 1e-3);
        assert_eq!(pattern.note_modules["snare"].pitch_hz, 220.0);
    }
}
