//! Editing surface state and recompile debouncing.
//!
//! The surface is deliberately thin: current text, the originally-loaded
//! text for reset, a visibility flag, and the latest diagnostic with its
//! extracted source line. Rendering it is the frame driver's concern.

use std::time::{Duration, Instant};

use renderer::{extract_error_line, CompileDiagnostic};

#[derive(Debug)]
pub struct EditorSurface {
    text: String,
    loaded: String,
    hidden: bool,
    error_line: u32,
    error_message: Option<String>,
}

impl EditorSurface {
    /// Opens the surface on `source`, which also becomes the reset target.
    pub fn new(source: String) -> Self {
        Self {
            text: source.clone(),
            loaded: source,
            hidden: false,
            error_line: 0,
            error_message: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: String) {
        self.text = text;
    }

    /// Records a diagnostic and the 1-based line it points at (0 when the
    /// message carries no line information).
    pub fn set_error(&mut self, diagnostic: &CompileDiagnostic) {
        self.error_line = diagnostic.line();
        self.error_message = Some(diagnostic.message().to_owned());
    }

    /// Records link-level failure text, which has no line to point at.
    pub fn set_error_text(&mut self, message: String) {
        self.error_line = extract_error_line(&message);
        self.error_message = Some(message);
    }

    pub fn clear_error(&mut self) {
        self.error_line = 0;
        self.error_message = None;
    }

    pub fn error_line(&self) -> u32 {
        self.error_line
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Toggles visibility; text and error state are kept either way.
    pub fn toggle_hidden(&mut self) {
        self.hidden = !self.hidden;
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    /// Restores the originally-loaded source and returns it for reuse.
    pub fn reset(&mut self) -> String {
        self.text = self.loaded.clone();
        self.clear_error();
        self.text.clone()
    }
}

/// Coalesces a burst of edits into one recompile after a quiet window.
///
/// Every edit pushes the deadline out; only when the window passes with no
/// further edits does [`Debouncer::take`] fire. Time is passed in explicitly
/// so the policy is testable without sleeping.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Notes an edit at `now`, superseding any pending deadline.
    pub fn note_edit(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    /// True once the quiet window has elapsed with a pending edit.
    pub fn due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Consumes the pending deadline if due. At most one fire per burst.
    pub fn take(&mut self, now: Instant) -> bool {
        if self.due(now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }

    /// Deadline to wake at, if an edit is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
