//! JSON report generation.
//!
//! This module provides [`JsonGenerator`] for serializing session reports to JSON.
//! Reports can be generated as compact single-line JSON or pretty-printed for human readability.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::{Report, ReportError, Result};

/// JSON report generator.
///
/// # Example
///
/// ```rust
/// use drill_report::{Report, json::JsonGenerator};
///
/// let report = Report::default();
/// let generator = JsonGenerator::new(&report);
///
/// let json = generator.generate_pretty().unwrap();
/// assert!(json.contains("session_id"));
/// ```
pub struct JsonGenerator<'a> {
    report: &'a Report,
}

impl<'a> JsonGenerator<'a> {
    /// Creates a new JSON generator for the given report.
    #[must_use]
    pub const fn new(report: &'a Report) -> Self {
        Self { report }
    }

    /// Generates compact JSON output (single line, no extra whitespace).
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    pub fn generate(&self) -> Result<String> {
        serde_json::to_string(self.report).map_err(ReportError::from)
    }

    /// Generates pretty-printed JSON output with indentation.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    pub fn generate_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self.report).map_err(ReportError::from)
    }

    /// Writes the JSON report to a file, creating or overwriting it.
    ///
    /// Parent directories must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    /// Returns [`ReportError::Io`] if file creation or writing fails.
    pub fn write_to_file(&self, path: &Path, pretty: bool) -> Result<()> {
        let json = if pretty {
            self.generate_pretty()?
        } else {
            self.generate()?
        };

        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ReportGenerator;

    #[test]
    fn test_generate_compact() {
        let report = ReportGenerator::new(crate::tests::sample_input()).generate();
        let json = JsonGenerator::new(&report).generate().unwrap();

        assert!(!json.contains('\n'));
        assert!(json.contains(r#""total_problems":4"#));
    }

    #[test]
    fn test_round_trip_preserves_summary() {
        let report = ReportGenerator::new(crate::tests::sample_input()).generate();
        let json = JsonGenerator::new(&report).generate_pretty().unwrap();

        let parsed: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.summary.identified_count, 2);
        assert_eq!(parsed.recommendations, report.recommendations);
    }

    #[test]
    fn test_guidance_omitted_when_absent() {
        let report = ReportGenerator::new(crate::tests::sample_input()).generate();
        let json = JsonGenerator::new(&report).generate().unwrap();

        // Only the first attempt carries guidance
        assert_eq!(json.matches(r#""guidance""#).count(), 1);
    }

    #[test]
    fn test_write_to_file() {
        let report = ReportGenerator::new(crate::tests::sample_input()).generate();
        let path = std::env::temp_dir().join(format!("drill-report-{}.json", std::process::id()));

        JsonGenerator::new(&report).write_to_file(&path, true).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(written.contains(r#""session_id": "session-1""#));
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let report = Report::default();
        let path = Path::new("/nonexistent-drill-dir/report.json");

        let result = JsonGenerator::new(&report).write_to_file(path, false);
        assert!(matches!(result, Err(ReportError::Io(_))));
    }
}
