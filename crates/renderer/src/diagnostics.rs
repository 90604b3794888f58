//! Shader diagnostic types and the driver-style error text format.
//!
//! Compile errors render as `ERROR: <col>:<line>: <message>`, one line per
//! problem, with line numbers already mapped into the user's unwrapped
//! source. Hosts that show errors inline only need [`extract_error_line`].

use std::fmt;

/// Which shader stage produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Vertex => f.write_str("vertex"),
            StageKind::Fragment => f.write_str("fragment"),
        }
    }
}

/// A per-stage compile failure. Non-fatal: the previous live program keeps
/// drawing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileDiagnostic {
    stage: StageKind,
    message: String,
}

impl CompileDiagnostic {
    pub(crate) fn new(stage: StageKind, message: String) -> Self {
        Self { stage, message }
    }

    pub fn stage(&self) -> StageKind {
        self.stage
    }

    /// Full diagnostic text, one `ERROR: <col>:<line>: <message>` per line.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 1-based line of the first reported error in the user's source, or 0
    /// when no line information is present.
    pub fn line(&self) -> u32 {
        extract_error_line(&self.message)
    }
}

/// Out-of-band renderer notifications, sent on the channel registered at
/// construction. `test` failures are returned directly and never appear here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererEvent {
    /// A stage failed to compile during setup.
    Compile(CompileDiagnostic),
    /// A swap failed at pipeline creation; no program is live.
    Link(String),
}

pub(crate) fn format_error_line(column: u32, line: u32, message: &str) -> String {
    format!("ERROR: {column}:{line}: {message}")
}

/// Pulls the 1-based source line out of the first `ERROR: <col>:<line>: ...`
/// in `message`. Returns 0 when the pattern is absent or malformed.
pub fn extract_error_line(message: &str) -> u32 {
    for raw in message.lines() {
        let Some(rest) = raw.trim_start().strip_prefix("ERROR: ") else {
            continue;
        };
        let mut parts = rest.splitn(3, ':');
        let _column = parts.next();
        if let Some(line) = parts.next().and_then(|line| line.trim().parse().ok()) {
            return line;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_driver_style() {
        assert_eq!(
            format_error_line(7, 3, "'' : syntax error"),
            "ERROR: 7:3: '' : syntax error"
        );
    }

    #[test]
    fn extracts_line_from_first_error() {
        let message = "ERROR: 0:12: 'vec5' : undeclared identifier\nERROR: 0:14: '' : syntax error";
        assert_eq!(extract_error_line(message), 12);
    }

    #[test]
    fn missing_pattern_yields_zero() {
        assert_eq!(extract_error_line("internal error: exhausted"), 0);
        assert_eq!(extract_error_line(""), 0);
        assert_eq!(extract_error_line("ERROR: not numeric"), 0);
    }

    #[test]
    fn diagnostic_line_reads_through_message() {
        let diag = CompileDiagnostic::new(
            StageKind::Fragment,
            format_error_line(0, 4, "unexpected token"),
        );
        assert_eq!(diag.line(), 4);
        assert_eq!(diag.stage(), StageKind::Fragment);
    }

    #[test]
    fn skips_preamble_lines_before_error() {
        let message = "fragment stage rejected\nERROR: 2:9: bad expression";
        assert_eq!(extract_error_line(message), 9);
    }
}
