//! Hunk parser.
//!
//! Accepts plain `+`/`-`/` ` diffs, unified diffs with git metadata, and
//! Codex-style `*** Begin Patch` envelopes. Wrapper syntax is stripped
//! first; the remaining text is split into [`DiffHunk`]s.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::edit::normalize::normalize_to_lf;
use crate::error::{PatchError, PatchResult};

/// One contiguous block of a diff.
///
/// Context lines appear in both `old_lines` and `new_lines` at the same
/// relative position. The two are never both empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffHunk {
    /// Anchor text from a `@@ context` header.
    pub change_context: Option<String>,
    pub old_start_line: Option<usize>,
    pub new_start_line: Option<usize>,
    pub has_context_lines: bool,
    pub old_lines: Vec<String>,
    pub new_lines: Vec<String>,
    pub is_end_of_file: bool,
}

const END_OF_FILE_MARKER: &str = "*** End of File";

const FILE_OPERATION_MARKERS: &[&str] = &[
    "*** Update File:",
    "*** Add File:",
    "*** Delete File:",
    "diff --git ",
];

const METADATA_PREFIXES: &[&str] = &[
    "*** Update File:",
    "*** Add File:",
    "*** Delete File:",
    MOVE_MARKER,
    "diff --git ",
    "index ",
    "old mode ",
    "new mode ",
    "deleted file mode ",
    "new file mode ",
    "rename from ",
    "rename to ",
    "copy from ",
    "copy to ",
    "similarity index ",
    "dissimilarity index ",
];

#[allow(clippy::expect_used)]
static UNIFIED_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@\s+-(\d+)(?:,(\d+))?\s+\+(\d+)(?:,(\d+))?\s+@@(.*)$")
        .expect("unified hunk header pattern is valid")
});

/// A trailing line that carries no diff content.
///
/// A line starting with a space is a blank context line and is kept.
fn is_blank_noise(line: &str) -> bool {
    line.trim().is_empty() && !line.starts_with(' ')
}

fn is_metadata(line: &str) -> bool {
    if line.starts_with("+++ ") || line.starts_with("--- ") {
        return true;
    }
    if line.starts_with([' ', '+', '-']) || line == END_OF_FILE_MARKER {
        return false;
    }
    METADATA_PREFIXES.iter().any(|p| line.starts_with(p))
}

fn strip_blank_edges(lines: &mut Vec<(usize, &str)>) {
    while lines.last().is_some_and(|(_, l)| is_blank_noise(l)) {
        lines.pop();
    }
    let leading = lines.iter().take_while(|(_, l)| is_blank_noise(l)).count();
    lines.drain(..leading);
}

/// Normalized diff lines paired with their 1-based line in the input.
fn normalized_lines(diff: &str) -> Vec<(usize, String)> {
    let text = normalize_to_lf(diff);
    let mut lines: Vec<(usize, &str)> = text
        .split('\n')
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .collect();

    strip_blank_edges(&mut lines);

    // Markdown fence around the whole diff.
    if lines.first().is_some_and(|(_, l)| l.trim_start().starts_with("```")) {
        lines.remove(0);
        if lines.last().is_some_and(|(_, l)| l.trim() == "```") {
            lines.pop();
        }
        strip_blank_edges(&mut lines);
    }

    if lines.first().is_some_and(|(_, l)| l.trim() == "*** Begin Patch") {
        lines.remove(0);
    }
    if lines.last().is_some_and(|(_, l)| l.trim() == "*** End Patch") {
        lines.pop();
    }
    strip_blank_edges(&mut lines);

    lines
        .into_iter()
        .filter(|(_, l)| !is_metadata(l))
        .map(|(n, l)| (n, l.to_owned()))
        .collect()
}

/// Strip wrapper dialects, leaving only hunk headers and body lines.
pub fn normalize_diff(diff: &str) -> String {
    normalized_lines(diff)
        .into_iter()
        .map(|(_, l)| l)
        .collect::<Vec<_>>()
        .join("\n")
}

const MOVE_MARKER: &str = "*** Move to:";

/// Destination named by a `*** Move to:` line, if the diff carries one.
pub fn move_destination(diff: &str) -> Option<String> {
    diff.lines()
        .filter_map(|l| l.trim_start().strip_prefix(MOVE_MARKER))
        .map(str::trim)
        .find(|dest| !dest.is_empty())
        .map(str::to_owned)
}

fn count_file_markers(diff: &str) -> usize {
    diff.lines()
        .map(str::trim_start)
        .filter(|l| FILE_OPERATION_MARKERS.iter().any(|m| l.starts_with(m)))
        .count()
}

struct Header {
    change_context: Option<String>,
    old_start_line: Option<usize>,
    new_start_line: Option<usize>,
}

/// Anchor text after `@@`, minus the one separating space.
///
/// Leading indentation is kept so an indented anchor can match exactly.
fn header_context(text: &str) -> Option<String> {
    let text = text.strip_prefix(' ').unwrap_or(text).trim_end();
    (!text.trim().is_empty()).then(|| text.to_owned())
}

fn parse_header(line: &str) -> Option<Header> {
    let rest = line.strip_prefix("@@")?;

    if let Some(caps) = UNIFIED_HEADER.captures(line) {
        return Some(Header {
            change_context: caps.get(5).and_then(|m| header_context(m.as_str())),
            old_start_line: caps.get(1).and_then(|m| m.as_str().parse().ok()),
            new_start_line: caps.get(3).and_then(|m| m.as_str().parse().ok()),
        });
    }

    Some(Header {
        change_context: header_context(rest),
        old_start_line: None,
        new_start_line: None,
    })
}

/// Empty lines from `from` on only separate this body from the next header
/// or the end of the diff.
fn separates_hunks(lines: &[(usize, String)], from: usize) -> bool {
    lines[from..]
        .iter()
        .map(|(_, l)| l.as_str())
        .find(|l| !l.is_empty())
        .is_none_or(|l| l.starts_with("@@") || l.trim_end() == END_OF_FILE_MARKER)
}

/// Parse a single-file diff into hunks.
///
/// Only the first hunk may omit its `@@` header.
pub fn parse_hunks(diff: &str) -> PatchResult<Vec<DiffHunk>> {
    let markers = count_file_markers(diff);
    if markers > 1 {
        return Err(PatchError::Structural(format!(
            "patch contains multiple file operations (count={markers}); \
             a single-file patch must not contain multi-file syntax"
        )));
    }

    let lines = normalized_lines(diff);
    if lines.is_empty() {
        return Err(PatchError::Parse {
            line: 1,
            message: "diff contains no hunks".to_owned(),
        });
    }

    let mut hunks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let (header_line, first) = (lines[i].0, lines[i].1.as_str());
        let mut hunk = DiffHunk::default();

        if let Some(header) = parse_header(first) {
            hunk.change_context = header.change_context;
            hunk.old_start_line = header.old_start_line;
            hunk.new_start_line = header.new_start_line;
            i += 1;
        } else if !hunks.is_empty() {
            return Err(PatchError::Parse {
                line: header_line,
                message: format!("expected hunk header starting with '@@', found {first:?}"),
            });
        }

        let mut body_lines = 0;
        while i < lines.len() {
            let (line_no, line) = (lines[i].0, lines[i].1.as_str());

            if line.trim_end() == END_OF_FILE_MARKER {
                hunk.is_end_of_file = true;
                i += 1;
                break;
            }
            if line.starts_with("@@") {
                break;
            }

            match line.chars().next() {
                Some(' ') => {
                    hunk.old_lines.push(line[1..].to_owned());
                    hunk.new_lines.push(line[1..].to_owned());
                    hunk.has_context_lines = true;
                }
                None if separates_hunks(&lines, i) => {
                    i += 1;
                    continue;
                }
                // Blank context line with its leading space dropped.
                None => {
                    hunk.old_lines.push(String::new());
                    hunk.new_lines.push(String::new());
                    hunk.has_context_lines = true;
                }
                Some('+') => hunk.new_lines.push(line[1..].to_owned()),
                Some('-') => hunk.old_lines.push(line[1..].to_owned()),
                // `\ No newline at end of file`
                Some('\\') => {
                    i += 1;
                    continue;
                }
                Some(_) if body_lines == 0 => {
                    return Err(PatchError::Parse {
                        line: line_no,
                        message: format!(
                            "unexpected line in hunk body, expected ' ', '+' or '-' prefix: {line:?}"
                        ),
                    });
                }
                Some(_) => break,
            }
            body_lines += 1;
            i += 1;
        }

        if body_lines == 0 {
            return Err(PatchError::Parse {
                line: header_line,
                message: "hunk has no body lines".to_owned(),
            });
        }
        hunks.push(hunk);
    }

    debug!(hunks = hunks.len(), "parsed diff");
    Ok(hunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_bare_header_hunk() {
        let hunks = parse_hunks("@@\n-beta\n+beta2\n").expect("parse");
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].old_lines, strings(&["beta"]));
        assert_eq!(hunks[0].new_lines, strings(&["beta2"]));
        assert!(!hunks[0].has_context_lines);
        assert_eq!(hunks[0].change_context, None);
    }

    #[test]
    fn test_unified_header_fields() {
        let hunks = parse_hunks("@@ -10,3 +12,4 @@ fn main() {\n a\n-b\n+c\n+d\n e\n").expect("parse");
        let hunk = &hunks[0];
        assert_eq!(hunk.old_start_line, Some(10));
        assert_eq!(hunk.new_start_line, Some(12));
        assert_eq!(hunk.change_context.as_deref(), Some("fn main() {"));
        assert_eq!(hunk.old_lines, strings(&["a", "b", "e"]));
        assert_eq!(hunk.new_lines, strings(&["a", "c", "d", "e"]));
        assert!(hunk.has_context_lines);
    }

    #[test]
    fn test_unified_header_without_counts() {
        let hunks = parse_hunks("@@ -3 +3 @@\n-x\n+y").expect("parse");
        assert_eq!(hunks[0].old_start_line, Some(3));
        assert_eq!(hunks[0].change_context, None);
    }

    #[test]
    fn test_codex_envelope() {
        let diff = "*** Begin Patch\n*** Update File: src/lib.rs\n@@ fn helper()\n ctx\n-old\n+new\n*** End of File\n*** End Patch\n";
        let hunks = parse_hunks(diff).expect("parse");
        assert_eq!(hunks.len(), 1);
        let hunk = &hunks[0];
        assert_eq!(hunk.change_context.as_deref(), Some("fn helper()"));
        assert!(hunk.is_end_of_file);
        assert_eq!(hunk.old_lines, strings(&["ctx", "old"]));
        assert_eq!(hunk.new_lines, strings(&["ctx", "new"]));
    }

    #[test]
    fn test_git_metadata_is_stripped() {
        let diff = "diff --git a/x.rs b/x.rs\nindex 1234567..89abcde 100644\n--- a/x.rs\n+++ b/x.rs\n@@ -1,2 +1,2 @@\n a\n-b\n+c\n";
        assert_eq!(normalize_diff(diff), "@@ -1,2 +1,2 @@\n a\n-b\n+c");
        let hunks = parse_hunks(diff).expect("parse");
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].old_lines, strings(&["a", "b"]));
    }

    #[test]
    fn test_markdown_fence_is_stripped() {
        let diff = "```diff\n@@\n-a\n+b\n```\n";
        assert_eq!(normalize_diff(diff), "@@\n-a\n+b");
    }

    #[test]
    fn test_trailing_blank_context_line_survives() {
        let hunks = parse_hunks("@@\n-a\n+b\n \n\n").expect("parse");
        assert_eq!(hunks[0].old_lines, strings(&["a", ""]));
        assert_eq!(hunks[0].new_lines, strings(&["b", ""]));
        assert!(hunks[0].has_context_lines);
    }

    #[test]
    fn test_empty_line_in_body_is_blank_context() {
        let hunks = parse_hunks("@@\n a\n\n b\n-c\n").expect("parse");
        assert_eq!(hunks[0].old_lines, strings(&["a", "", "b", "c"]));
        assert_eq!(hunks[0].new_lines, strings(&["a", "", "b"]));
    }

    #[test]
    fn test_headerless_first_hunk_and_multiple_hunks() {
        let hunks = parse_hunks(" a\n-b\n+c\n@@ second\n x\n-y\n").expect("parse");
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].change_context, None);
        assert_eq!(hunks[1].change_context.as_deref(), Some("second"));
        assert_eq!(hunks[1].old_lines, strings(&["x", "y"]));
        assert_eq!(hunks[1].new_lines, strings(&["x"]));
    }

    #[test]
    fn test_blank_lines_between_hunks_are_separators() {
        let hunks = parse_hunks("@@\n-a\n+A\n\n@@\n-c\n+C\n").expect("parse");
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].old_lines, strings(&["a"]));
        assert_eq!(hunks[0].new_lines, strings(&["A"]));
        assert!(!hunks[0].has_context_lines);
        assert_eq!(hunks[1].old_lines, strings(&["c"]));
    }

    #[test]
    fn test_blank_line_before_end_of_file_marker_is_dropped() {
        let hunks = parse_hunks("@@\n x\n-a\n\n*** End of File\n").expect("parse");
        assert_eq!(hunks[0].old_lines, strings(&["x", "a"]));
        assert!(hunks[0].is_end_of_file);
    }

    #[test]
    fn test_header_context_keeps_indentation() {
        let hunks = parse_hunks("@@     let x = 1;  \n-a\n+b").expect("parse");
        assert_eq!(hunks[0].change_context.as_deref(), Some("    let x = 1;"));
        let hunks = parse_hunks("@@ -1 +1 @@   if ready {\n-a\n+b").expect("parse");
        assert_eq!(hunks[0].change_context.as_deref(), Some("  if ready {"));
        let hunks = parse_hunks("@@    \n-a\n+b").expect("parse");
        assert_eq!(hunks[0].change_context, None);
    }

    #[test]
    fn test_move_destination() {
        let diff = "*** Begin Patch\n*** Update File: a.rs\n*** Move to: src/b.rs \n@@\n-a\n+b\n*** End Patch";
        assert_eq!(move_destination(diff).as_deref(), Some("src/b.rs"));
        assert_eq!(parse_hunks(diff).expect("parse").len(), 1);
        assert_eq!(move_destination("@@\n-a\n+b\n"), None);
        assert_eq!(move_destination("*** Move to:   \n@@\n-a\n"), None);
    }

    #[test]
    fn test_no_newline_marker_is_ignored() {
        let hunks = parse_hunks("@@\n-a\n\\ No newline at end of file\n+b\n").expect("parse");
        assert_eq!(hunks[0].old_lines, strings(&["a"]));
        assert_eq!(hunks[0].new_lines, strings(&["b"]));
    }

    #[test]
    fn test_end_of_file_marker_is_preserved_by_normalize() {
        assert_eq!(
            normalize_diff("*** Begin Patch\n@@\n-a\n*** End of File\n*** End Patch"),
            "@@\n-a\n*** End of File"
        );
    }

    #[test]
    fn test_multi_file_markers_fail() {
        let diff = "*** Begin Patch\n*** Update File: a.rs\n@@\n-a\n+b\n*** Update File: b.rs\n@@\n-c\n+d\n*** End Patch";
        let err = parse_hunks(diff).expect_err("multi-file patch");
        assert!(matches!(err, PatchError::Structural(_)));
        assert!(err.to_string().contains("count=2"));
    }

    #[test]
    fn test_empty_hunk_is_parse_error() {
        let err = parse_hunks("@@ first\n@@ second\n-a\n").expect_err("empty hunk");
        assert!(matches!(err, PatchError::Parse { line: 1, .. }), "{err:?}");
    }

    #[test]
    fn test_invalid_first_body_line_is_parse_error() {
        let err = parse_hunks("@@\nnot a diff line\n").expect_err("bad body");
        assert!(matches!(err, PatchError::Parse { line: 2, .. }), "{err:?}");
    }

    #[test]
    fn test_stray_line_after_hunk_needs_header() {
        let err = parse_hunks("-a\n+b\nstray\n").expect_err("missing header");
        assert!(matches!(err, PatchError::Parse { line: 3, .. }), "{err:?}");
    }

    #[test]
    fn test_error_line_numbers_refer_to_input() {
        let err = parse_hunks("*** Begin Patch\n*** Update File: a\n@@\n?? broken\n").expect_err("bad body");
        assert!(matches!(err, PatchError::Parse { line: 4, .. }), "{err:?}");
    }

    #[test]
    fn test_empty_diff_is_parse_error() {
        assert!(parse_hunks("\n\n").is_err());
    }
}
