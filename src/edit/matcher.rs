//! Character-window matcher for replace-style edits.
//!
//! Locates one occurrence of a multi-line block inside full file content.
//! Exact substring search runs first; when that fails, every line window of
//! the target's height is scored by mean per-line similarity over an
//! indent-depth encoding, so a consistently re-indented block still scores
//! as identical.

use serde::Serialize;
use tracing::debug;

use crate::edit::levenshtein;
use crate::edit::normalize::{count_leading_whitespace, normalize_for_fuzzy};

/// Default acceptance threshold for fuzzy window matches.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.95;

/// Below the threshold but at or above this score, the scan is retried
/// without the indent-depth prefix.
pub const FALLBACK_THRESHOLD: f64 = 0.80;

/// One located block of text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FuzzyMatch {
    /// Text as it appears in the content (may differ from the request).
    pub actual_text: String,
    /// Byte offset of `actual_text` in the content.
    pub start_index: usize,
    /// 1-based line of `start_index`.
    pub start_line: usize,
    /// 1.0 for exact hits.
    pub confidence: f64,
}

/// Result of [`find_match`].
///
/// `matched` is only set for an unambiguous hit. Ambiguity is reported
/// through `occurrences` (exact) or `fuzzy_matches` (fuzzy) instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    pub matched: Option<FuzzyMatch>,
    /// Best candidate found, kept for diagnostics even when not accepted.
    pub closest: Option<FuzzyMatch>,
    /// Number of exact occurrences, set only when more than one.
    pub occurrences: Option<usize>,
    /// 1-based start line of every exact occurrence when ambiguous.
    pub occurrence_lines: Vec<usize>,
    /// Number of windows that reached the threshold.
    pub fuzzy_matches: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOptions {
    pub allow_fuzzy: bool,
    pub threshold: f64,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            allow_fuzzy: true,
            threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

/// 1-based line number of byte offset `index` in `content`.
pub(crate) fn line_number_at(content: &str, index: usize) -> usize {
    content[..index].matches('\n').count() + 1
}

/// Find `target` in `content`.
pub fn find_match(content: &str, target: &str, options: MatchOptions) -> MatchOutcome {
    if target.is_empty() {
        return MatchOutcome::default();
    }

    let starts: Vec<usize> = content.match_indices(target).map(|(i, _)| i).collect();
    match starts.as_slice() {
        [] => {}
        [index] => {
            return MatchOutcome {
                matched: Some(FuzzyMatch {
                    actual_text: target.to_owned(),
                    start_index: *index,
                    start_line: line_number_at(content, *index),
                    confidence: 1.0,
                }),
                ..MatchOutcome::default()
            };
        }
        many => {
            debug!(occurrences = many.len(), "exact target is ambiguous");
            return MatchOutcome {
                occurrences: Some(many.len()),
                occurrence_lines: many.iter().map(|&i| line_number_at(content, i)).collect(),
                ..MatchOutcome::default()
            };
        }
    }

    // Whitespace-only targets would fuzzy-match any blank line.
    if target.trim().is_empty() {
        return MatchOutcome::default();
    }

    let scan = best_fuzzy_window(content, target, options.threshold);
    let Some(best) = scan.best else {
        return MatchOutcome::default();
    };

    let accepted = options.allow_fuzzy
        && best.confidence >= options.threshold
        && scan.above_threshold == 1;
    debug!(
        confidence = best.confidence,
        start_line = best.start_line,
        candidates = scan.above_threshold,
        accepted,
        "fuzzy window scan finished"
    );

    MatchOutcome {
        matched: accepted.then(|| best.clone()),
        closest: Some(best),
        fuzzy_matches: Some(scan.above_threshold),
        ..MatchOutcome::default()
    }
}

/// A content or target line, pre-normalized once.
struct PreparedLine {
    indent: usize,
    blank: bool,
    text: String,
}

impl PreparedLine {
    fn new(line: &str) -> Self {
        let trimmed = line.trim();
        Self {
            indent: count_leading_whitespace(line),
            blank: trimmed.is_empty(),
            text: normalize_for_fuzzy(trimmed),
        }
    }
}

/// Encode a block of lines as `"{depth}|{text}"` (or `"|{text}"`).
///
/// Depth is each line's indentation relative to the block minimum, in units
/// of the smallest non-zero step found in the block.
fn encode_block(lines: &[PreparedLine], include_depth: bool) -> Vec<String> {
    if !include_depth {
        return lines
            .iter()
            .map(|l| if l.blank { "|".to_owned() } else { format!("|{}", l.text) })
            .collect();
    }

    let min = lines
        .iter()
        .filter(|l| !l.blank)
        .map(|l| l.indent)
        .min()
        .unwrap_or(0);
    let unit = lines
        .iter()
        .filter(|l| !l.blank && l.indent > min)
        .map(|l| l.indent - min)
        .min()
        .unwrap_or(1);

    lines
        .iter()
        .map(|l| {
            if l.blank {
                return "0|".to_owned();
            }
            // Rounded division.
            let depth = (2 * (l.indent - min) + unit) / (2 * unit);
            format!("{depth}|{}", l.text)
        })
        .collect()
}

struct WindowScan {
    best: Option<FuzzyMatch>,
    above_threshold: usize,
}

fn best_fuzzy_window(content: &str, target: &str, threshold: f64) -> WindowScan {
    let content_lines: Vec<&str> = content.split('\n').collect();
    let target_lines: Vec<&str> = target.split('\n').collect();

    if target_lines.len() > content_lines.len() {
        return WindowScan {
            best: None,
            above_threshold: 0,
        };
    }

    let prepared_content: Vec<PreparedLine> =
        content_lines.iter().map(|l| PreparedLine::new(l)).collect();
    let prepared_target: Vec<PreparedLine> =
        target_lines.iter().map(|l| PreparedLine::new(l)).collect();

    let mut offsets = Vec::with_capacity(content_lines.len());
    let mut offset = 0;
    for line in &content_lines {
        offsets.push(offset);
        offset += line.len() + 1;
    }

    let ctx = WindowContext {
        content_lines: &content_lines,
        prepared_content: &prepared_content,
        prepared_target: &prepared_target,
        offsets: &offsets,
        threshold,
    };

    let with_depth = ctx.scan(true);
    let retry = with_depth.best.as_ref().is_some_and(|b| {
        b.confidence < threshold && b.confidence >= FALLBACK_THRESHOLD
    });
    if !retry {
        return with_depth;
    }

    let without_depth = ctx.scan(false);
    let improved = match (&without_depth.best, &with_depth.best) {
        (Some(flat), Some(deep)) => flat.confidence > deep.confidence,
        _ => false,
    };
    if improved {
        debug!("flat indentation scan beat depth-encoded scan");
        without_depth
    } else {
        with_depth
    }
}

struct WindowContext<'a> {
    content_lines: &'a [&'a str],
    prepared_content: &'a [PreparedLine],
    prepared_target: &'a [PreparedLine],
    offsets: &'a [usize],
    threshold: f64,
}

impl WindowContext<'_> {
    fn scan(&self, include_depth: bool) -> WindowScan {
        let height = self.prepared_target.len();
        let target = encode_block(self.prepared_target, include_depth);

        let mut best: Option<FuzzyMatch> = None;
        let mut best_score = -1.0;
        let mut above_threshold = 0;

        for start in 0..=self.prepared_content.len() - height {
            let window = encode_block(&self.prepared_content[start..start + height], include_depth);
            let total: f64 = target
                .iter()
                .zip(&window)
                .map(|(t, w)| levenshtein::similarity(t, w))
                .sum();
            let score = total / height as f64;

            if score >= self.threshold {
                above_threshold += 1;
            }
            if score > best_score {
                best_score = score;
                best = Some(FuzzyMatch {
                    actual_text: self.content_lines[start..start + height].join("\n"),
                    start_index: self.offsets[start],
                    start_line: start + 1,
                    confidence: score,
                });
            }
        }

        WindowScan {
            best,
            above_threshold,
        }
    }
}
