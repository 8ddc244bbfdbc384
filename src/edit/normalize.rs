//! Text canonicalization shared by every matcher.
//!
//! Line endings, byte-order marks, typographic punctuation, and indentation.

/// Line ending convention detected in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    Crlf,
}

impl LineEnding {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::Crlf => "\r\n",
        }
    }
}

const BOM: &str = "\u{FEFF}";

/// Replace `\r\n` and lone `\r` with `\n`.
pub fn normalize_to_lf(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Detect the line ending of `content` from its first line break.
///
/// A file without any `\n` counts as CRLF; otherwise the file is CRLF when the
/// first `\r\n` sits before (i.e. ends) the first `\n`.
pub fn detect_line_ending(content: &str) -> LineEnding {
    let Some(lf_idx) = content.find('\n') else {
        return LineEnding::Crlf;
    };
    match content.find("\r\n") {
        Some(crlf_idx) if crlf_idx < lf_idx => LineEnding::Crlf,
        _ => LineEnding::Lf,
    }
}

/// Re-expand `\n` to `\r\n` when the original file used CRLF.
pub fn restore_line_endings(text: &str, ending: LineEnding) -> String {
    match ending {
        LineEnding::Lf => text.to_owned(),
        LineEnding::Crlf => text.replace('\n', "\r\n"),
    }
}

/// Result of [`strip_bom`]: the BOM (empty when absent) and the remaining text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrippedBom<'a> {
    pub bom: &'static str,
    pub text: &'a str,
}

/// Split a leading U+FEFF off `content`.
///
/// `format!("{}{}", s.bom, s.text)` always reproduces the input.
pub fn strip_bom(content: &str) -> StrippedBom<'_> {
    content.strip_prefix(BOM).map_or(
        StrippedBom {
            bom: "",
            text: content,
        },
        |text| StrippedBom { bom: BOM, text },
    )
}

/// Fold typographic punctuation and exotic spaces to ASCII.
const fn fold_char(c: char) -> char {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => '"',
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
        | '\u{2212}' => '-',
        '\u{00A0}' | '\u{2002}' | '\u{2003}' | '\u{2004}' | '\u{2005}' | '\u{2006}'
        | '\u{2007}' | '\u{2008}' | '\u{2009}' | '\u{200A}' | '\u{202F}' | '\u{205F}'
        | '\u{3000}' => ' ',
        other => other,
    }
}

/// Canonical form for semantic comparison of two lines.
///
/// Trims, folds punctuation, and collapses every run of spaces/tabs to a
/// single space.
pub fn normalize_for_fuzzy(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_run = false;
    for c in line.trim().chars().map(fold_char) {
        if c == ' ' || c == '\t' {
            if !in_run {
                out.push(' ');
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

/// Trim and fold punctuation, keeping internal whitespace runs intact.
pub fn normalize_unicode(line: &str) -> String {
    line.trim().chars().map(fold_char).collect()
}

/// Number of leading spaces/tabs.
pub fn count_leading_whitespace(line: &str) -> usize {
    line.bytes().take_while(|b| *b == b' ' || *b == b'\t').count()
}

/// Smallest indentation over the non-blank lines of `text` (0 if none).
pub fn min_indent(text: &str) -> usize {
    text.split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(count_leading_whitespace)
        .min()
        .unwrap_or(0)
}

/// Indent character used by the first indented line of `text`.
fn detect_indent_char(text: &str) -> char {
    text.split('\n')
        .filter(|line| !line.trim().is_empty())
        .find_map(|line| match line.as_bytes().first() {
            Some(b'\t') => Some('\t'),
            Some(b' ') => Some(' '),
            _ => None,
        })
        .unwrap_or(' ')
}

/// Shift `new_text` by the indentation delta between what the caller asked
/// for (`old_text`) and what was actually matched (`actual_text`).
///
/// Blank lines are untouched. Removal never eats past a line's own leading
/// whitespace.
pub fn adjust_indentation(old_text: &str, actual_text: &str, new_text: &str) -> String {
    if old_text == actual_text {
        return new_text.to_owned();
    }

    let old_min = min_indent(old_text);
    let actual_min = min_indent(actual_text);
    if old_min == actual_min {
        return new_text.to_owned();
    }

    let indent_char = detect_indent_char(actual_text);
    new_text
        .split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.to_owned()
            } else if actual_min > old_min {
                let pad: String =
                    std::iter::repeat_n(indent_char, actual_min - old_min).collect();
                format!("{pad}{line}")
            } else {
                let remove = (old_min - actual_min).min(count_leading_whitespace(line));
                line[remove..].to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
