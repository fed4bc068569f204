//! `groovecraft`: a thin CLI driver over the engine façade (§6.5, §10.1).
//!
//! Loads a `.groove` DSL file, initializes the engine, plays it for a
//! fixed duration or until Ctrl-C, then releases the audio device cleanly.
//! Every façade error maps to a distinct process exit code so a calling
//! script can tell "bad DSL" apart from "no audio device" from "already
//! running".

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;

use groovecraft_engine::{Engine, EngineError, ParameterKind};
use groovecraft_types::{groove, OverflowMode};

const EXIT_OK: i32 = 0;
const EXIT_PARSE_ERROR: i32 = 2;
const EXIT_IO_ERROR: i32 = 3;
const EXIT_INIT_ERROR: i32 = 4;
const EXIT_NOT_INITIALIZED: i32 = 5;
const EXIT_NO_PATTERN: i32 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OverflowArg {
    Loop,
    Rest,
}

impl From<OverflowArg> for OverflowMode {
    fn from(arg: OverflowArg) -> Self {
        match arg {
            OverflowArg::Loop => OverflowMode::Loop,
            OverflowArg::Rest => OverflowMode::Rest,
        }
    }
}

/// A small generative drum-machine/synth sequencer driven by a text DSL.
#[derive(Parser)]
#[command(name = "groovecraft")]
#[command(about = "Play a .groove pattern file")]
#[command(version)]
struct Cli {
    /// Path to a `.groove` DSL file. Not required with `--list-grooves`.
    path: Option<PathBuf>,

    /// Override the pattern's TEMPO line with this BPM.
    #[arg(long)]
    tempo_override: Option<u16>,

    /// Behavior for instruments whose step array is shorter than the
    /// pattern's total step count.
    #[arg(long, value_enum, default_value = "loop")]
    overflow: OverflowArg,

    /// How long to play before stopping, in seconds. Default: run until
    /// interrupted with Ctrl-C.
    #[arg(long)]
    duration: Option<f32>,

    /// Print the built-in groove preset catalog and exit without loading
    /// a pattern.
    #[arg(long)]
    list_grooves: bool,

    /// Enable strict step-count validation (non-16/32-step sequences
    /// become errors instead of warnings).
    #[arg(long)]
    strict: bool,
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
}

fn print_groove_catalog() {
    for template in groove::catalog() {
        println!("{:<20} {:<24} {:?}", template.name, template.label, template.category);
    }
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    if cli.list_grooves {
        print_groove_catalog();
        std::process::exit(EXIT_OK);
    }

    let Some(path) = cli.path.clone() else {
        eprintln!("a pattern file is required unless --list-grooves is given");
        std::process::exit(EXIT_IO_ERROR);
    };

    let mut text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("could not read {}: {}", path.display(), e);
            std::process::exit(EXIT_IO_ERROR);
        }
    };

    if let Some(bpm) = cli.tempo_override {
        text = apply_tempo_override(&text, bpm);
    }

    let mut engine = Engine::new();

    if let Err(e) = engine.initialize() {
        eprintln!("failed to initialize audio: {e}");
        std::process::exit(exit_code_for(&e));
    }

    if cli.strict {
        engine.set_strict_parsing(true);
    }

    let diagnostics = engine.load_pattern(&text);
    for warning in &diagnostics.warnings {
        eprintln!("warning: {}", warning.message);
    }
    if !diagnostics.is_valid() {
        for error in &diagnostics.errors {
            eprintln!("error: {}", error.message);
        }
        std::process::exit(EXIT_PARSE_ERROR);
    }

    engine.set_overflow_mode(cli.overflow.into());

    if let Err(e) = engine.play() {
        eprintln!("failed to start playback: {e}");
        std::process::exit(exit_code_for(&e));
    }

    run_transport_loop(&mut engine, cli.duration);

    engine.stop();
    engine.dispose();
}

fn run_transport_loop(engine: &mut Engine, duration_s: Option<f32>) {
    const TICK_INTERVAL: Duration = Duration::from_millis(5);

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    if ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst)).is_err() {
        log::warn!(target: "cli", "could not install Ctrl-C handler; relying on --duration only");
    }

    let start = Instant::now();
    while running.load(Ordering::SeqCst) {
        engine.tick();
        if let Some(duration_s) = duration_s {
            if start.elapsed().as_secs_f32() >= duration_s {
                break;
            }
        }
        thread::sleep(TICK_INTERVAL);
    }
}

/// Replace the first `TEMPO` line with `bpm`, or prepend one if the text
/// has none.
fn apply_tempo_override(text: &str, bpm: u16) -> String {
    let mut replaced = false;
    let mut lines: Vec<String> = text
        .lines()
        .map(|line| {
            if !replaced && line.trim_start().to_ascii_uppercase().starts_with("TEMPO") {
                replaced = true;
                format!("TEMPO {bpm}")
            } else {
                line.to_string()
            }
        })
        .collect();
    if !replaced {
        lines.insert(0, format!("TEMPO {bpm}"));
    }
    lines.join("\n")
}

fn exit_code_for(e: &EngineError) -> i32 {
    match e {
        EngineError::Init(_) => EXIT_INIT_ERROR,
        EngineError::NotInitialized => EXIT_NOT_INITIALIZED,
        EngineError::NoPattern => EXIT_NO_PATTERN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tempo_override_replaces_existing_line() {
        let text = "TEMPO 120\nseq kick: x...\n";
        let out = apply_tempo_override(text, 140);
        assert!(out.contains("TEMPO 140"));
        assert!(!out.contains("TEMPO 120"));
    }

    #[test]
    fn tempo_override_prepends_when_absent() {
        let text = "seq kick: x...\n";
        let out = apply_tempo_override(text, 95);
        assert!(out.starts_with("TEMPO 95"));
    }
}
