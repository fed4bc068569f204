//! Parser diagnostics bag (§4.B). The parser never panics on bad input; it
//! always returns one of these alongside whatever `Pattern` it could
//! recover.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseIssue {
    pub severity: Severity,
    /// 1-indexed source line, when the issue can be attributed to one.
    pub line: Option<u32>,
    pub message: String,
}

impl ParseIssue {
    pub fn error(line: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            line,
            message: message.into(),
        }
    }

    pub fn warning(line: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            line,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    pub errors: Vec<ParseIssue>,
    pub warnings: Vec<ParseIssue>,
    pub valid_instruments: Vec<String>,
    pub invalid_instruments: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push_error(&mut self, line: Option<u32>, message: impl Into<String>) {
        self.errors.push(ParseIssue::error(line, message));
    }

    pub fn push_warning(&mut self, line: Option<u32>, message: impl Into<String>) {
        self.warnings.push(ParseIssue::warning(line, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_diagnostics_is_valid() {
        assert!(Diagnostics::new().is_valid());
    }

    #[test]
    fn any_error_makes_it_invalid() {
        let mut d = Diagnostics::new();
        d.push_warning(Some(3), "missing TEMPO, defaulting to 120");
        assert!(d.is_valid());
        d.push_error(Some(5), "unknown keyword 'fizz'");
        assert!(!d.is_valid());
    }
}
