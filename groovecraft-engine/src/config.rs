//! Engine configuration (§10.3): built-in defaults embedded at compile
//! time, optionally overridden by a user config file found via the
//! platform config directory. A missing or malformed user file is never
//! fatal — it's logged and the embedded defaults are used instead.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

use groovecraft_types::OverflowMode;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    engine: EngineSection,
    #[serde(default)]
    audio: AudioSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EngineSection {
    master_volume: Option<f32>,
    default_overflow: Option<String>,
    strict_parsing: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AudioSection {
    sample_rate_hint: Option<u32>,
    buffer_size_hint: Option<u32>,
}

/// Failure parsing a user config file. Never propagated past `Config::load`
/// as an `Err` — it's logged and the embedded defaults win instead.
#[derive(Debug)]
pub enum ConfigError {
    Read(std::io::Error),
    Parse(toml::de::Error),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Read(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Parse(e)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(e) => write!(f, "could not read user config: {e}"),
            Self::Parse(e) => write!(f, "could not parse user config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Merged configuration: embedded defaults with any present user overrides
/// layered on top.
#[derive(Debug, Clone)]
pub struct Config {
    engine: EngineSection,
    audio: AudioSection,
}

impl Config {
    /// Parse the embedded defaults, then merge a user config file on top
    /// if one exists and parses. Never fails: a missing file is silently
    /// skipped, a malformed one is logged at `warn` and skipped.
    pub fn load() -> Self {
        let base: ConfigFile = toml::from_str(DEFAULT_CONFIG)
            .expect("embedded default config.toml is checked in and must parse");
        let mut engine = base.engine;
        let mut audio = base.audio;

        if let Some(path) = user_config_path() {
            match read_user_config(&path) {
                Ok(Some(user)) => {
                    merge_engine(&mut engine, user.engine);
                    merge_audio(&mut audio, user.audio);
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!(
                        target: "config",
                        "ignoring user config at {}: {}",
                        path.display(),
                        e
                    );
                }
            }
        }

        Self { engine, audio }
    }

    pub fn master_volume(&self) -> f32 {
        self.engine.master_volume.unwrap_or(1.0)
    }

    pub fn default_overflow(&self) -> OverflowMode {
        match self.engine.default_overflow.as_deref() {
            Some(s) if s.eq_ignore_ascii_case("rest") => OverflowMode::Rest,
            _ => OverflowMode::Loop,
        }
    }

    pub fn strict_parsing(&self) -> bool {
        self.engine.strict_parsing.unwrap_or(false)
    }

    pub fn sample_rate_hint(&self) -> u32 {
        self.audio.sample_rate_hint.unwrap_or(44_100)
    }

    pub fn buffer_size_hint(&self) -> u32 {
        self.audio.buffer_size_hint.unwrap_or(512)
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("groovecraft").join("config.toml"))
}

/// `Ok(None)` for a simply-absent file (not an error); `Ok(Some(_))` once
/// it's read and parsed; `Err` for anything else (unreadable, malformed).
fn read_user_config(path: &PathBuf) -> Result<Option<ConfigFile>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(toml::from_str(&text)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn merge_engine(base: &mut EngineSection, user: EngineSection) {
    if user.master_volume.is_some() {
        base.master_volume = user.master_volume;
    }
    if user.default_overflow.is_some() {
        base.default_overflow = user.default_overflow;
    }
    if user.strict_parsing.is_some() {
        base.strict_parsing = user.strict_parsing;
    }
}

fn merge_audio(base: &mut AudioSection, user: AudioSection) {
    if user.sample_rate_hint.is_some() {
        base.sample_rate_hint = user.sample_rate_hint;
    }
    if user.buffer_size_hint.is_some() {
        base.buffer_size_hint = user.buffer_size_hint;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_parse_and_expose_sane_values() {
        let config = Config::load();
        assert_eq!(config.master_volume(), 1.0);
        assert_eq!(config.default_overflow(), OverflowMode::Loop);
        assert!(!config.strict_parsing());
        assert_eq!(config.sample_rate_hint(), 44_100);
        assert_eq!(config.buffer_size_hint(), 512);
    }

    #[test]
    fn missing_user_config_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.toml");
        assert!(read_user_config(&path).unwrap().is_none());
    }

    #[test]
    fn malformed_user_config_file_is_reported_as_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();
        assert!(read_user_config(&path).is_err());
    }

    #[test]
    fn valid_user_config_overrides_only_the_keys_it_sets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[engine]\ndefault_overflow = \"rest\"\n").unwrap();
        let user = read_user_config(&path).unwrap().unwrap();
        let mut engine = EngineSection::default();
        engine.master_volume = Some(0.8);
        merge_engine(&mut engine, user.engine);
        assert_eq!(engine.master_volume, Some(0.8));
        assert_eq!(engine.default_overflow.as_deref(), Some("rest"));
    }
}
