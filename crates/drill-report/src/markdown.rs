//! Markdown report generation for finished practice sessions.
//!
//! This module provides the [`MarkdownGenerator`] struct for converting a [`Report`]
//! into a human-readable Markdown document. The generated report includes:
//!
//! - A summary table with counts and the performance grade
//! - A timeline of review attempts with the guidance offered after each
//! - The problems identified and missed in the final attempt
//! - Prioritized recommendations

use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::{PerformanceBucket, Report};

/// Generates Markdown reports from finished sessions.
///
/// The output follows a fixed structure and contains no generation timestamp,
/// so rendering the same report twice yields identical text.
pub struct MarkdownGenerator<'a> {
    report: &'a Report,
}

impl<'a> MarkdownGenerator<'a> {
    /// Creates a new Markdown generator for the given report.
    #[must_use]
    pub const fn new(report: &'a Report) -> Self {
        Self { report }
    }

    /// Generates the complete Markdown report.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();

        Self::write_title(&mut output);
        self.write_summary(&mut output);
        self.write_attempts(&mut output);
        Self::write_problem_list(&mut output, "Identified Problems", &self.report.identified_problems);
        Self::write_problem_list(&mut output, "Missed Problems", &self.report.missed_problems);
        self.write_recommendations(&mut output);

        output
    }

    fn write_title(output: &mut String) {
        let _ = writeln!(output, "# CodeDrill Review Report\n");
    }

    /// Writes the summary section with metrics table.
    fn write_summary(&self, output: &mut String) {
        let summary = &self.report.summary;

        let _ = writeln!(output, "## Summary\n");
        let _ = writeln!(output, "| Metric | Value |");
        let _ = writeln!(output, "|--------|-------|");
        let _ = writeln!(output, "| Domain | {} |", escape_markdown(&summary.domain));
        let _ = writeln!(
            output,
            "| Difficulty | {} |",
            escape_markdown(&summary.difficulty)
        );
        let _ = writeln!(
            output,
            "| Code Length | {} |",
            escape_markdown(&summary.code_length)
        );
        let _ = writeln!(
            output,
            "| Problems Identified | {} of {} ({:.1}%) |",
            summary.identified_count, summary.total_problems, summary.identified_percentage
        );
        let _ = writeln!(output, "| Performance | {} |", bucket_title(summary.bucket));
        let _ = writeln!(
            output,
            "| Iterations | {} of {} |",
            summary.iterations_used, summary.max_iterations
        );
        let _ = writeln!(
            output,
            "| Review Sufficient | {} |",
            if summary.review_sufficient { "Yes" } else { "No" }
        );
        let _ = writeln!(
            output,
            "| Duration | {} |",
            format_duration(summary.duration_seconds)
        );
        let _ = writeln!(output);
    }

    /// Writes the attempt timeline and any guidance given along the way.
    fn write_attempts(&self, output: &mut String) {
        let _ = writeln!(output, "## Attempts\n");

        if self.report.attempts.is_empty() {
            let _ = writeln!(output, "*No review attempts were analyzed.*\n");
            return;
        }

        let _ = writeln!(output, "| Iteration | Identified | Percentage | Submitted |");
        let _ = writeln!(output, "|-----------|------------|------------|-----------|");
        for attempt in &self.report.attempts {
            let _ = writeln!(
                output,
                "| {} | {} | {:.1}% | {} |",
                attempt.iteration,
                attempt.identified_count,
                attempt.identified_percentage,
                format_timestamp(&attempt.submitted_at)
            );
        }
        let _ = writeln!(output);

        let guided: Vec<_> = self
            .report
            .attempts
            .iter()
            .filter_map(|a| a.guidance.as_deref().map(|g| (a.iteration, g)))
            .collect();
        if guided.is_empty() {
            return;
        }

        let _ = writeln!(output, "### Guidance\n");
        for (iteration, guidance) in guided {
            let _ = writeln!(
                output,
                "- **Iteration {iteration}**: {}",
                escape_markdown(guidance)
            );
        }
        let _ = writeln!(output);
    }

    fn write_problem_list(output: &mut String, title: &str, problems: &[String]) {
        let _ = writeln!(output, "## {title}\n");

        if problems.is_empty() {
            let _ = writeln!(output, "*None*\n");
            return;
        }

        for problem in problems {
            let _ = writeln!(output, "- {}", escape_markdown(problem));
        }
        let _ = writeln!(output);
    }

    /// Writes recommendations ordered by priority.
    fn write_recommendations(&self, output: &mut String) {
        let _ = writeln!(output, "## Recommendations\n");

        if self.report.recommendations.is_empty() {
            let _ = writeln!(output, "*No recommendations.*");
            return;
        }

        let mut recs: Vec<_> = self.report.recommendations.iter().collect();
        recs.sort_by_key(|r| r.priority);

        for (idx, rec) in recs.iter().enumerate() {
            let _ = writeln!(
                output,
                "{}. **[P{}]** {}",
                idx + 1,
                rec.priority,
                escape_markdown(&rec.description)
            );
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

const fn bucket_title(bucket: PerformanceBucket) -> &'static str {
    match bucket {
        PerformanceBucket::Excellent => "Excellent",
        PerformanceBucket::GoodProgress => "Good progress",
        PerformanceBucket::NeedsImprovement => "Needs improvement",
    }
}

/// Formats a duration in seconds to a human-readable string.
///
/// - 65 seconds -> "1m 5s"
/// - 3661 seconds -> "1h 1m 1s"
/// - 45 seconds -> "45s"
fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();

    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{secs}s"));
    }

    parts.join(" ")
}

fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Escapes special Markdown characters in text.
///
/// Problem descriptions come from the catalog and the learner's own words, so
/// they must not be interpreted as Markdown formatting.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for ch in text.chars() {
        match ch {
            '*' | '_' | '`' | '#' | '[' | ']' | '!' | '\\' | '<' | '>' | '|' => {
                result.push('\\');
                result.push(ch);
            }
            '\n' => result.push_str("<br>"),
            _ => result.push(ch),
        }
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
