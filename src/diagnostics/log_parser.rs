//! OpenCL build-log parser
//!
//! Turns driver build-log lines such as
//! `<program source>:13:5: warning: no previous prototype for function 'getChannel'`
//! into LSP diagnostic records.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One compiler message: path token, 1-based line, column, severity phrase,
/// message text. Part of the contract with the drivers, pinned here and
/// covered by unit tests.
const DIAGNOSTIC_LINE_PATTERN: &str = r"^(.*):(\d+):(\d+): ((fatal )?error|warning): (.*)$";

// ============================================================================
// LSP Diagnostic Records
// ============================================================================

/// Zero-indexed position inside a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// A single kernel problem in LSP shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub source: String,
    pub range: Range,
    pub severity: i32,
    pub message: String,
}

// ============================================================================
// Parser
// ============================================================================

/// Build-log parser holding the compiled line pattern
pub struct BuildLogParser {
    line_regex: Regex,
}

impl BuildLogParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            line_regex: Regex::new(DIAGNOSTIC_LINE_PATTERN)?,
        })
    }

    /// Parse one log line into a diagnostic.
    ///
    /// Returns `None` for anything that is not a compiler message with a
    /// recognized severity. `source_name` overrides the captured path token
    /// when the caller knows the display name of the document.
    pub fn parse_line(&self, line: &str, source_name: Option<&str>) -> Option<Diagnostic> {
        let captures = self.line_regex.captures(line)?;

        let severity = match captures.get(4)?.as_str() {
            "error" | "fatal error" => 1,
            "warning" => 2,
            _ => return None,
        };

        // Drivers report 1-based lines while LSP is 0-based. Columns are
        // passed through unchanged, matching what editors expect from the
        // drivers observed in the wild.
        let line_number: u32 = captures.get(2)?.as_str().parse().ok()?;
        let character: u32 = captures.get(3)?.as_str().parse().ok()?;
        let position = Position {
            line: line_number.saturating_sub(1),
            character,
        };

        Some(Diagnostic {
            source: source_name.unwrap_or(captures.get(1)?.as_str()).to_string(),
            range: Range {
                start: position,
                end: position,
            },
            severity,
            message: captures.get(6)?.as_str().to_string(),
        })
    }
}

impl Default for BuildLogParser {
    fn default() -> Self {
        Self::new().expect("diagnostic line pattern must compile")
    }
}

// ============================================================================
// Tests
// ============================================================================
