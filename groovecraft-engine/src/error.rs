//! Hand-rolled façade error types (§7, §10.4). One enum per error family,
//! each implementing `Display`/`std::error::Error` by hand rather than
//! pulling in a derive-macro error crate, matching the rest of this
//! workspace.

use std::fmt;

use groovecraft_audio::DeviceError;

/// Errors the engine façade can return. `ParseError`/`ClampWarning` are
/// intentionally absent here: the parser never fails the call, it reports
/// through the returned `Diagnostics` bag instead (§4.B).
#[derive(Debug)]
pub enum EngineError {
    /// The audio runtime refused to start: no output device, or the
    /// output stream could not be built. Surfaced by `initialize()` and
    /// the first `play()`.
    Init(DeviceError),
    /// A façade method that requires `initialize()` first was called
    /// before it.
    NotInitialized,
    /// `play()` was called with no pattern loaded yet.
    NoPattern,
}

impl From<DeviceError> for EngineError {
    fn from(e: DeviceError) -> Self {
        Self::Init(e)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init(e) => write!(f, "engine initialize failed: {e}"),
            Self::NotInitialized => {
                write!(f, "engine operation requires initialize() first")
            }
            Self::NoPattern => write!(f, "play() called with no pattern loaded"),
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_initialized_display_names_the_operation() {
        assert!(EngineError::NotInitialized.to_string().contains("initialize()"));
    }

    #[test]
    fn no_pattern_display_names_the_operation() {
        assert!(EngineError::NoPattern.to_string().contains("play()"));
    }
}
