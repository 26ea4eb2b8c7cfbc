//! Extraction of the annotated and clean code sections from generator output.

use once_cell::sync::Lazy;
use regex::Regex;

/// Fenced block with an optional language tag.
static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"```([A-Za-z0-9_+-]*)[ \t]*\r?\n([\s\S]*?)```").unwrap()
});

/// Three or more consecutive newlines.
static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\n{3,}").unwrap()
});

/// The two renditions of generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedCode {
    /// Code with error markers.
    pub annotated: String,
    /// Code without error markers.
    pub clean: String,
}

/// Extracts the annotated/clean pair from generator output.
///
/// Accepted layouts, in order of preference:
/// 1. a `java-annotated` block and a `java-clean` block
/// 2. two `java` blocks
/// 3. two untagged blocks
/// 4. any single block, used for both renditions
///
/// Returns `None` if no block is found or either rendition is empty.
///
/// # Examples
///
/// ```
/// use drill_engine::extract::extract_code_pair;
///
/// let text = "```java-annotated\nint x; // ERROR\n```\n```java-clean\nint x;\n```";
/// let pair = extract_code_pair(text).unwrap();
/// assert_eq!(pair.annotated, "int x; // ERROR");
/// assert_eq!(pair.clean, "int x;");
/// ```
#[must_use]
pub fn extract_code_pair(text: &str) -> Option<ExtractedCode> {
    let blocks: Vec<(String, &str)> = FENCED_BLOCK
        .captures_iter(text)
        .filter_map(|c| {
            let tag = c.get(1)?.as_str().to_lowercase();
            let body = c.get(2)?.as_str();
            Some((tag, body))
        })
        .collect();

    let (annotated, clean) = if let (Some(a), Some(c)) = (
        first_tagged(&blocks, "java-annotated"),
        first_tagged(&blocks, "java-clean"),
    ) {
        (a, c)
    } else if let [a, c, ..] = all_tagged(&blocks, "java")[..] {
        (a, c)
    } else if let [a, c, ..] = all_tagged(&blocks, "")[..] {
        (a, c)
    } else {
        let (_, only) = blocks.first()?;
        (*only, *only)
    };

    let annotated = normalize_code(annotated);
    let clean = normalize_code(clean);
    if annotated.is_empty() || clean.is_empty() {
        return None;
    }

    Some(ExtractedCode { annotated, clean })
}

fn first_tagged<'a>(blocks: &[(String, &'a str)], tag: &str) -> Option<&'a str> {
    blocks.iter().find(|(t, _)| t == tag).map(|(_, b)| *b)
}

fn all_tagged<'a>(blocks: &[(String, &'a str)], tag: &str) -> Vec<&'a str> {
    blocks
        .iter()
        .filter(|(t, _)| t == tag)
        .map(|(_, b)| *b)
        .collect()
}

/// Trims, converts CRLF to LF and collapses runs of blank lines.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    let unix = code.replace("\r\n", "\n");
    EXCESS_NEWLINES
        .replace_all(unix.trim(), "\n\n")
        .into_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_annotated_and_clean_tags() {
        let text = "Here you go:\n```java\nignored();\n```\n```java-clean\nclean();\n```\n```java-annotated\nannotated(); // ERROR\n```";
        let pair = extract_code_pair(text).unwrap();
        assert_eq!(pair.annotated, "annotated(); // ERROR");
        assert_eq!(pair.clean, "clean();");
    }

    #[test]
    fn test_two_java_blocks() {
        let text = "```java\nfirst();\n```\ntext\n```java\nsecond();\n```";
        let pair = extract_code_pair(text).unwrap();
        assert_eq!(pair.annotated, "first();");
        assert_eq!(pair.clean, "second();");
    }

    #[test]
    fn test_two_untagged_blocks() {
        let text = "```\nfirst();\n```\n```\nsecond();\n```";
        let pair = extract_code_pair(text).unwrap();
        assert_eq!(pair.annotated, "first();");
        assert_eq!(pair.clean, "second();");
    }

    #[test]
    fn test_single_block_used_for_both() {
        let text = "```java\nonly();\n```";
        let pair = extract_code_pair(text).unwrap();
        assert_eq!(pair.annotated, "only();");
        assert_eq!(pair.clean, "only();");
    }

    #[test]
    fn test_no_blocks() {
        assert!(extract_code_pair("no code here").is_none());
    }

    #[test]
    fn test_empty_section_is_rejected() {
        let text = "```java-annotated\ncode();\n```\n```java-clean\n   \n```";
        assert!(extract_code_pair(text).is_none());
    }

    #[test]
    fn test_crlf_input() {
        let text = "```java-annotated\r\na();\r\n```\r\n```java-clean\r\nb();\r\n```";
        let pair = extract_code_pair(text).unwrap();
        assert_eq!(pair.annotated, "a();");
        assert_eq!(pair.clean, "b();");
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  a\r\nb\n\n\n\nc  \n"), "a\nb\n\nc");
        assert_eq!(normalize_code("a\n\nb"), "a\n\nb");
    }
}
