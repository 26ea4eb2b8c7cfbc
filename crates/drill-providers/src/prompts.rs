//! Prompt templates for the chat backend.
//!
//! Every template that expects structured output asks for a single JSON
//! object with the exact keys the backend parses.

use std::fmt::Write;

use drill_engine::{CodeLength, Difficulty, ErrorSpec, ReviewAnalysis, ReviewAttempt};

/// System prompt shared by all requests.
pub const SYSTEM_PROMPT: &str = "You are an experienced Java instructor who builds code review \
exercises and coaches students through them. Follow the requested output format exactly.";

const fn length_profile(length: CodeLength) -> &'static str {
    match length {
        CodeLength::Short => "a single class with one or two methods and at most three fields",
        CodeLength::Medium => "a single class with three to five methods and a few fields",
        CodeLength::Long => "one or two classes with four to eight methods, a few imports and fields",
    }
}

const fn difficulty_profile(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Easy => "straightforward code where each error is visible on a single line",
        Difficulty::Medium => "moderately realistic code where some errors need a second look",
        Difficulty::Hard => "realistic production-style code where errors are subtle and interact",
    }
}

fn error_list(errors: &[ErrorSpec]) -> String {
    let mut out = String::new();
    for (i, error) in errors.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, error.known_problem());
        if let Some(guide) = &error.implementation_guide {
            let _ = writeln!(out, "   How to implement: {guide}");
        }
    }
    out
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "- (none)\n".to_string();
    }
    items.iter().fold(String::new(), |mut out, item| {
        let _ = writeln!(out, "- {item}");
        out
    })
}

/// Asks for a program with exactly the given errors, in two renditions.
#[must_use]
pub fn generation_prompt(
    length: CodeLength,
    difficulty: Difficulty,
    domain: &str,
    errors: &[ErrorSpec],
) -> String {
    format!(
        "Write a {length} Java program for a {domain} system containing EXACTLY {count} \
intentional errors for a code review exercise.

Shape: {shape}.
Style: {style}.
Correct parts must follow standard Java conventions. Each error must be real code, not a comment.

Errors to implement:
{errors}
Return two fenced code blocks and nothing else:

```java-annotated
// the program, with a comment `// ERROR: <category> - <name>` on each error line
```

```java-clean
// the same program with the same errors and no error comments
```",
        count = errors.len(),
        shape = length_profile(length),
        style = difficulty_profile(difficulty),
        errors = error_list(errors),
    )
}

/// Asks which of the requested errors the annotated code really contains.
#[must_use]
pub fn evaluation_prompt(code: &str, requested: &[ErrorSpec]) -> String {
    let labels: Vec<String> = requested.iter().map(ErrorSpec::label).collect();
    format!(
        "Check whether this Java code implements each of the {count} requested errors.

Code:
```java
{code}
```

Requested errors:
{errors}
Answer with one JSON object using these labels verbatim:
{{\"found\": [\"<label>\", ...], \"missing\": [\"<label>\", ...], \"feedback\": \"<one paragraph>\"}}

Labels: {labels}",
        count = requested.len(),
        errors = error_list(requested),
        labels = labels.join("; "),
    )
}

/// Asks how many of the known problems the learner's review identified.
#[must_use]
pub fn analysis_prompt(code: &str, known_problems: &[String], review: &str) -> String {
    format!(
        "A student reviewed the Java code below. Decide, strictly, which known problems the \
review identifies. A problem counts as identified only if the review names the kind of error, \
points at its location, and explains why it is wrong. Vague remarks count as missed. The \
`// ERROR:` comments mark the known problems; the student saw the code without them.

Code:
```java
{code}
```

Known problems ({count} total):
{known}
Student review:
```
{review}
```

Each known problem goes in exactly one list. Answer with one JSON object:
{{\"identified\": [\"<known problem>\", ...], \"missed\": [\"<known problem>\", ...], \
\"identified_count\": <number>, \"total_problems\": {count}}}",
        count = known_problems.len(),
        known = bullet_list(known_problems),
    )
}

/// Asks for a few sentences of targeted guidance for the next attempt.
#[must_use]
pub fn guidance_prompt(analysis: &ReviewAnalysis, iteration: u32, max_iterations: u32) -> String {
    format!(
        "A student is on review attempt {iteration} of {max_iterations} and found \
{identified} of {total} problems ({percentage:.1}%).

Found:
{found}
Missed:
{missed}
Write 3 or 4 sentences of guidance that point the student at where to look next and what \
pattern to look for, without naming the missed problems outright. Reply with the guidance only.",
        identified = analysis.identified_count,
        total = analysis.total_problems,
        percentage = analysis.identified_percentage,
        found = bullet_list(&analysis.identified),
        missed = bullet_list(&analysis.missed),
    )
}

/// Asks for the final narrative report.
#[must_use]
pub fn report_prompt(history: &[ReviewAttempt], final_analysis: &ReviewAnalysis) -> String {
    let mut attempts = String::new();
    for attempt in history {
        let found = attempt
            .analysis
            .as_ref()
            .map_or(0, |a| a.identified_count);
        let _ = writeln!(
            attempts,
            "- Attempt {}: {} problems found",
            attempt.iteration, found
        );
    }

    format!(
        "Write a short Markdown report for a student who finished a Java code review exercise.

Total problems: {total}
Identified: {identified} ({percentage:.1}%)
Attempts:
{attempts}
Identified problems:
{found}
Missed problems:
{missed}
Cover: an overall assessment, praise for what was found, why each missed problem matters and \
how to spot it next time, and two or three concrete tips. Be encouraging and honest.",
        total = final_analysis.total_problems,
        identified = final_analysis.identified_count,
        percentage = final_analysis.identified_percentage,
        found = bullet_list(&final_analysis.identified),
        missed = bullet_list(&final_analysis.missed),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_prompt_lists_errors() {
        let mut spec = ErrorSpec::new("Logical", "Off-by-one", "Loop bound is one too high");
        spec.implementation_guide = Some("Use <= on the array length".to_string());

        let prompt = generation_prompt(CodeLength::Short, Difficulty::Easy, "library", &[spec]);

        assert!(prompt.contains("short Java program for a library system"));
        assert!(prompt.contains("EXACTLY 1 intentional"));
        assert!(prompt.contains("1. Logical - Off-by-one: Loop bound is one too high"));
        assert!(prompt.contains("How to implement: Use <= on the array length"));
        assert!(prompt.contains("```java-annotated"));
        assert!(prompt.contains("```java-clean"));
    }

    #[test]
    fn test_evaluation_prompt_uses_labels() {
        let specs = vec![
            ErrorSpec::new("Logical", "Off-by-one", "Bound"),
            ErrorSpec::new("Syntax", "Missing semicolon", "No semicolon"),
        ];
        let prompt = evaluation_prompt("int x = 1", &specs);
        assert!(prompt.contains("Labels: Logical - Off-by-one; Syntax - Missing semicolon"));
    }

    #[test]
    fn test_analysis_prompt_states_total() {
        let known = vec!["A - B: c".to_string(), "D - E: f".to_string()];
        let prompt = analysis_prompt("code", &known, "my review");
        assert!(prompt.contains("Known problems (2 total)"));
        assert!(prompt.contains("\"total_problems\": 2"));
        assert!(prompt.contains("my review"));
    }

    #[test]
    fn test_guidance_prompt_handles_empty_lists() {
        let analysis = ReviewAnalysis {
            total_problems: 3,
            ..ReviewAnalysis::default()
        };
        let prompt = guidance_prompt(&analysis, 1, 3);
        assert!(prompt.contains("attempt 1 of 3"));
        assert!(prompt.contains("0 of 3 problems (0.0%)"));
        assert!(prompt.contains("- (none)"));
    }
}
