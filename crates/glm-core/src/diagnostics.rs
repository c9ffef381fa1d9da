//! Diagnostics infrastructure for tracking issues during parsing and
//! model mutation.
//!
//! GLM parsing is deliberately lenient: a malformed attribute, an unknown
//! class, or a reference to a nonexistent object must not abort the parse.
//! Every such anomaly is recorded here instead, with:
//!
//! - Severity levels (Warning, Error)
//! - Categories for grouping (`unrecognized-attribute`, `unparsed-line`,
//!   `dangling-reference`, `identity-clash`, `orphaned-node`, ...)
//! - Optional entity references (e.g., "object meter m1")
//! - Optional line numbers for file-based operations
//! - Serialization for JSON output
//!
//! # Example
//!
//! ```
//! use glm_core::diagnostics::{Diagnostics, Severity};
//!
//! let mut diag = Diagnostics::new();
//! diag.add_warning("dangling-reference", "switch sw1 'to' names missing object 'ghost'");
//! diag.add_error_with_entity("identity-clash", "identity already used by class node", "load n1");
//!
//! assert_eq!(diag.warning_count(), 1);
//! assert_eq!(diag.error_count(), 1);
//! ```

use serde::Serialize;

/// Severity level for diagnostic issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Unusual but the operation continued (e.g., value stored as text)
    Warning,
    /// Could not apply an element or operation (e.g., skipped instance)
    Error,
}

/// A single diagnostic issue encountered during an operation
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    /// Severity of the issue
    pub severity: Severity,
    /// Category for grouping (e.g., "unparsed-line", "dangling-reference")
    pub category: String,
    /// Human-readable description of the issue
    pub message: String,
    /// Optional line number (for file-based operations)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Optional entity reference (e.g., "object meter m1")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl DiagnosticIssue {
    /// Create a new diagnostic issue
    pub fn new(
        severity: Severity,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            line: None,
            entity: None,
        }
    }

    /// Add line number to the issue
    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Add entity reference to the issue
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };

        write!(f, "[{}:{}] {}", severity, self.category, self.message)?;

        if let Some(entity) = &self.entity {
            write!(f, " ({})", entity)?;
        }
        if let Some(line) = self.line {
            write!(f, " at line {}", line)?;
        }

        Ok(())
    }
}

/// Collection of diagnostic issues for an operation
///
/// This is the primary container for tracking warnings and errors during
/// parsing, validation and model mutation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    /// All collected issues
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    /// Create new empty diagnostics
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw issue directly
    pub fn add(&mut self, issue: DiagnosticIssue) {
        self.issues.push(issue);
    }

    /// Add a warning with category and message
    pub fn add_warning(&mut self, category: &str, message: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Warning, category, message));
    }

    /// Add a warning with line number
    pub fn add_warning_at_line(&mut self, category: &str, message: &str, line: usize) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Warning, category, message).with_line(line));
    }

    /// Add a warning with entity reference
    pub fn add_warning_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Warning, category, message).with_entity(entity));
    }

    /// Add an error with category and message
    pub fn add_error(&mut self, category: &str, message: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message));
    }

    /// Add an error with line number
    pub fn add_error_at_line(&mut self, category: &str, message: &str, line: usize) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message).with_line(line));
    }

    /// Add an error with entity reference
    pub fn add_error_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message).with_entity(entity));
    }

    /// Count warning issues
    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    /// Count error issues
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    /// Check if there are any issues
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    /// Check if there are any warnings
    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Warning)
    }

    /// Get issues filtered by category
    pub fn issues_by_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a DiagnosticIssue> {
        self.issues.iter().filter(move |i| i.category == category)
    }

    /// Get only error issues
    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    /// Get only warning issues
    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }

    /// Merge another diagnostics into this one
    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    /// Get summary string
    pub fn summary(&self) -> String {
        let warnings = self.warning_count();
        let errors = self.error_count();

        match (warnings, errors) {
            (0, 0) => "No issues".to_string(),
            (w, 0) => format!("{} warning{}", w, if w == 1 { "" } else { "s" }),
            (0, e) => format!("{} error{}", e, if e == 1 { "" } else { "s" }),
            (w, e) => format!(
                "{} warning{}, {} error{}",
                w,
                if w == 1 { "" } else { "s" },
                e,
                if e == 1 { "" } else { "s" }
            ),
        }
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Diagnostics: {}", self.summary())?;
        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }
        Ok(())
    }
}

/// Statistics about a parse operation
///
/// Tracks counts of parsed blocks and recovery events. Kept separate from
/// [`Diagnostics`] since it contains parse-specific counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseStats {
    /// module/clock blocks consumed
    pub modules: usize,
    /// ad hoc class blocks consumed
    pub classes: usize,
    /// object blocks consumed (including nested)
    pub objects: usize,
    /// schedule blocks captured verbatim
    pub schedules: usize,
    /// #set/#define/#include lines stored
    pub directives: usize,
    /// top-level lines dropped by the best-effort policy
    pub skipped_lines: usize,
}

impl ParseStats {
    /// Summary line for logs
    pub fn summary(&self) -> String {
        format!(
            "{} modules, {} classes, {} objects, {} schedules, {} directives | {} skipped",
            self.modules, self.classes, self.objects, self.schedules, self.directives,
            self.skipped_lines
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_counts() {
        let mut diag = Diagnostics::new();
        diag.add_warning("unparsed-line", "test warning");
        diag.add_error("identity-clash", "test error");
        diag.add_warning_at_line("unparsed-line", "line warning", 42);

        assert_eq!(diag.warning_count(), 2);
        assert_eq!(diag.error_count(), 1);
        assert!(diag.has_issues());
        assert!(diag.has_errors());
        assert!(diag.has_warnings());
    }

    #[test]
    fn test_diagnostics_serialization() {
        let mut diag = Diagnostics::new();
        diag.add_warning_at_line("unparsed-line", "dropped line", 47);
        diag.add_error_with_entity("identity-clash", "identity already in use", "load n1");

        let json = serde_json::to_string_pretty(&diag).unwrap();
        assert!(json.contains("\"warning\""));
        assert!(json.contains("\"line\": 47"));
        assert!(json.contains("\"entity\": \"load n1\""));
    }

    #[test]
    fn test_diagnostic_issue_display() {
        let issue = DiagnosticIssue::new(Severity::Error, "validation", "invalid value")
            .with_entity("meter m1")
            .with_line(42);

        let display = format!("{}", issue);
        assert!(display.contains("error"));
        assert!(display.contains("validation"));
        assert!(display.contains("meter m1"));
        assert!(display.contains("line 42"));
    }

    #[test]
    fn test_diagnostics_summary() {
        let mut diag = Diagnostics::new();
        assert_eq!(diag.summary(), "No issues");

        diag.add_warning("unparsed-line", "warning");
        assert_eq!(diag.summary(), "1 warning");

        diag.add_error("identity-clash", "error");
        assert_eq!(diag.summary(), "1 warning, 1 error");

        diag.add_warning("unparsed-line", "another warning");
        assert_eq!(diag.summary(), "2 warnings, 1 error");
    }

    #[test]
    fn test_issues_by_category() {
        let mut diag = Diagnostics::new();
        diag.add_warning("unparsed-line", "dropped");
        diag.add_warning("dangling-reference", "ghost");
        diag.add_error("unparsed-line", "dropped badly");

        let unparsed: Vec<_> = diag.issues_by_category("unparsed-line").collect();
        assert_eq!(unparsed.len(), 2);

        let dangling: Vec<_> = diag.issues_by_category("dangling-reference").collect();
        assert_eq!(dangling.len(), 1);
    }

    #[test]
    fn test_parse_stats_summary() {
        let stats = ParseStats {
            modules: 2,
            classes: 1,
            objects: 40,
            schedules: 3,
            directives: 4,
            skipped_lines: 1,
        };
        let summary = stats.summary();
        assert!(summary.contains("40 objects"));
        assert!(summary.contains("1 skipped"));
    }
}
