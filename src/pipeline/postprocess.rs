//! Post-processing: deterministic cleanup of model output text.
//!
//! ## Why is post-processing necessary?
//!
//! Even with temperature 0 and explicit "plain text only" instructions,
//! models occasionally wrap their reply in a Markdown code fence, emit
//! Windows line endings, or leak zero-width characters copied from the
//! rendered roster. None of that is content, and all of it breaks either
//! the JSON decoder or the line-per-row assumption of the parse prompt.
//!
//! The rules here are cheap, pure `&str → String` passes that remove those
//! artefacts and nothing else. They never repair content: a reply that is
//! not JSON after fence stripping is still rejected by the orchestrator.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean the stage-1 transcription before it is sent to the parse model.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF/CR → LF)
/// 2. Strip an outer code fence (` ``` ` or ` ```text `)
/// 3. Trim trailing whitespace per line
/// 4. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 5. Drop leading and trailing blank lines
///
/// Returns an empty string when nothing but whitespace remains.
pub fn clean_transcription(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_outer_fence(&s, &RE_TEXT_FENCE);
    let s = trim_trailing_whitespace(&s);
    let s = remove_invisible_chars(&s);
    s.trim_matches('\n').to_string()
}

/// Extract the JSON payload from the stage-2 reply.
///
/// Strips a single outer ` ```json ` / ` ``` ` fence wrapping the whole
/// reply, removes a leading BOM, and trims. Anything else is left for the
/// JSON decoder to accept or reject.
pub fn extract_json_payload(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_outer_fence(&s, &RE_JSON_FENCE);
    s.trim().trim_start_matches('\u{FEFF}').trim().to_string()
}

// ── Rule: Strip outer code fences ────────────────────────────────────────────

static RE_TEXT_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:text|plaintext)?[ \t]*\n(.*)\n```\s*$").unwrap());

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?si)^```(?:json)?[ \t]*\n(.*)\n```\s*$").unwrap());

fn strip_outer_fence(input: &str, fence: &Regex) -> String {
    if let Some(caps) = fence.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule: Normalise line endings ─────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule: Trim trailing whitespace per line ──────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule: Remove invisible Unicode characters ────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fence() {
        let input = "```json\n{\"events\": []}\n```";
        assert_eq!(extract_json_payload(input), "{\"events\": []}");
    }

    #[test]
    fn test_strip_json_fence_uppercase_and_crlf() {
        let input = "```JSON\r\n{\"events\": []}\r\n```\r\n";
        assert_eq!(extract_json_payload(input), "{\"events\": []}");
    }

    #[test]
    fn test_strip_bare_fence() {
        let input = "  ```\n{\"events\": []}\n```  ";
        assert_eq!(extract_json_payload(input), "{\"events\": []}");
    }

    #[test]
    fn test_json_without_fence_passthrough() {
        let input = "\n{\"events\": []}\n";
        assert_eq!(extract_json_payload(input), "{\"events\": []}");
    }

    #[test]
    fn test_prose_is_not_repaired() {
        let input = "Here is the JSON: {\"events\": []}";
        assert_eq!(extract_json_payload(input), input);
    }

    #[test]
    fn test_bom_removed_from_json() {
        assert_eq!(extract_json_payload("\u{FEFF}{}"), "{}");
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(
            trim_trailing_whitespace("  01JAN  FR123   \nSTN DUB  "),
            "  01JAN  FR123\nSTN DUB"
        );
    }

    #[test]
    fn test_remove_invisible() {
        let input = "FR\u{200B}123\u{FEFF} STN\u{00AD}";
        assert_eq!(remove_invisible_chars(input), "FR123 STN");
    }

    #[test]
    fn test_transcription_keeps_inner_lines() {
        let input = "\r\n\r\n01JAN CHECK-IN 05:15Z  \r\nFR123 STN 06:00Z DUB 07:10Z\r\n\r\n";
        assert_eq!(
            clean_transcription(input),
            "01JAN CHECK-IN 05:15Z\nFR123 STN 06:00Z DUB 07:10Z"
        );
    }

    #[test]
    fn test_transcription_fence_stripped() {
        let input = "```text\nHSBY 06:00Z 14:00Z STN\n```";
        assert_eq!(clean_transcription(input), "HSBY 06:00Z 14:00Z STN");
    }

    #[test]
    fn test_transcription_question_marks_preserved() {
        let input = "FR1?3 STN 06:?0Z";
        assert_eq!(clean_transcription(input), input);
    }

    #[test]
    fn test_blank_transcription_is_empty() {
        assert_eq!(clean_transcription(" \r\n\u{200B}\n\t"), "");
    }
}
