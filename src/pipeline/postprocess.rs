//! Post-processing: deterministic cleanup of LLM answers.
//!
//! Small local models follow instructions loosely. Even with a prompt that
//! ends in `Summary:` they may wrap the answer in a fenced block, echo the
//! label back, emit Windows line endings or pad the text with zero-width
//! characters. The rules below undo those quirks without touching content.
//!
//! ## Rule Order
//!
//! Line endings are normalised before anything inspects lines, fences are
//! stripped before the echoed label so `` ```\nSummary: …``` `` is handled,
//! and the final trim runs last.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a raw LLM answer.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip outer markdown fences
/// 3. Drop an echoed prompt label (`Summary:`, `Answer:`, `Analysis:`)
/// 4. Trim trailing whitespace per line
/// 5. Collapse 3+ consecutive blank lines down to 2
/// 6. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 7. Trim leading and trailing blank space
pub fn clean_response(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_markdown_fences(&s);
    let s = strip_echoed_label(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|md|text)?[ \t]*\n(.*)\n```\s*$").unwrap()
});

fn strip_markdown_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

static RE_ECHOED_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:\*\*)?(?:summary|answer|analysis|description)(?:\*\*)?:(?:\*\*)?[ \t]*\n?")
        .unwrap()
});

fn strip_echoed_label(input: &str) -> String {
    RE_ECHOED_LABEL.replace(input, "").into_owned()
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fences_with_and_without_language() {
        assert_eq!(strip_markdown_fences("```markdown\nA\nB\n```"), "A\nB");
        assert_eq!(strip_markdown_fences("```\nA\n```\n"), "A");
        assert_eq!(strip_markdown_fences("plain ```code``` text"), "plain ```code``` text");
    }

    #[test]
    fn fenced_code_in_the_middle_is_kept() {
        let input = "Intro\n```\nlet x = 1;\n```\nOutro";
        assert_eq!(clean_response(input), input);
    }

    #[test]
    fn echoed_label_removed_only_at_start() {
        assert_eq!(strip_echoed_label("Summary: The paper"), "The paper");
        assert_eq!(strip_echoed_label("**Answer:**\nYes."), "Yes.");
        assert_eq!(
            strip_echoed_label("The answer: yes"),
            "The answer: yes"
        );
    }

    #[test]
    fn whitespace_rules() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
        assert_eq!(trim_trailing_whitespace("  a   \nb  "), "  a\nb");
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn invisible_chars_removed() {
        assert_eq!(
            remove_invisible_chars("self\u{00AD}attention\u{200B} layer\u{FEFF}"),
            "selfattention layer"
        );
    }

    #[test]
    fn full_cleanup() {
        let input = "```markdown\r\nSummary:\r\nThe Transformer   \r\n\r\n\r\n\r\n\r\nrelies on attention.\u{200B}\r\n```";
        assert_eq!(
            clean_response(input),
            "The Transformer\n\n\nrelies on attention."
        );
        assert_eq!(clean_response("   \n\n"), "");
    }
}
