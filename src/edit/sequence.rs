//! Line-sequence matcher for patch hunks.
//!
//! [`seek_sequence`] finds a block of pattern lines inside a file's line
//! array; [`find_context_line`] finds a single anchor line. Both run a
//! strict-to-loose cascade. Structural passes return the first position that
//! matches. The fuzzy pass scores every position and keeps the best one.

use serde::Serialize;
use tracing::debug;

use crate::edit::levenshtein;
use crate::edit::matcher::{self, FuzzyMatch, MatchOptions};
use crate::edit::normalize::{normalize_for_fuzzy, normalize_unicode};

/// Acceptance threshold for the windowed fuzzy pass.
pub const SEQUENCE_FUZZY_THRESHOLD: f64 = 0.92;

/// Threshold handed to the character-window matcher in the last pass.
pub const CHARACTER_MATCH_THRESHOLD: f64 = 0.92;

/// Acceptance threshold for fuzzy context-line lookup.
pub const CONTEXT_FUZZY_THRESHOLD: f64 = 0.80;

/// Minimum normalized pattern length for substring matches.
const PARTIAL_MATCH_MIN_LENGTH: usize = 6;

/// Minimum pattern/line length ratio for substring matches.
const PARTIAL_MATCH_MIN_RATIO: f64 = 0.30;

/// Where a sequence or context line was found, if anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SequenceSearchResult {
    /// 0-based line index.
    pub index: Option<usize>,
    pub confidence: f64,
}

pub type ContextLineResult = SequenceSearchResult;

impl SequenceSearchResult {
    const fn found(index: usize, confidence: f64) -> Self {
        Self {
            index: Some(index),
            confidence,
        }
    }

    const fn missing(confidence: f64) -> Self {
        Self {
            index: None,
            confidence,
        }
    }
}

/// A line predicate: `(file_line, pattern_line) -> matches`.
type LinePredicate = fn(&str, &str) -> bool;

fn exact(line: &str, pattern: &str) -> bool {
    line == pattern
}

fn trim_end_equal(line: &str, pattern: &str) -> bool {
    line.trim_end() == pattern.trim_end()
}

fn trim_equal(line: &str, pattern: &str) -> bool {
    line.trim() == pattern.trim()
}

fn unicode_equal(line: &str, pattern: &str) -> bool {
    normalize_unicode(line) == normalize_unicode(pattern)
}

fn starts_with_pattern(line: &str, pattern: &str) -> bool {
    let line = normalize_for_fuzzy(line);
    let pattern = normalize_for_fuzzy(pattern);
    if pattern.is_empty() {
        return line.is_empty();
    }
    line.starts_with(&pattern)
}

/// Normalized `pattern` is a long enough, large enough part of `line`.
fn contains_significant(line_norm: &str, pattern_norm: &str) -> bool {
    let pattern_len = pattern_norm.chars().count();
    if pattern_len < PARTIAL_MATCH_MIN_LENGTH || !line_norm.contains(pattern_norm) {
        return false;
    }
    let line_len = line_norm.chars().count().max(1);
    pattern_len as f64 / line_len as f64 >= PARTIAL_MATCH_MIN_RATIO
}

fn includes_pattern(line: &str, pattern: &str) -> bool {
    let line = normalize_for_fuzzy(line);
    let pattern = normalize_for_fuzzy(pattern);
    if pattern.is_empty() {
        return line.is_empty();
    }
    contains_significant(&line, &pattern)
}

/// Structural passes for [`seek_sequence`], strict to loose.
const SEQUENCE_PASSES: &[(&str, f64, LinePredicate)] = &[
    ("exact", 1.0, exact),
    ("trim_end", 0.99, trim_end_equal),
    ("trim", 0.98, trim_equal),
    ("unicode", 0.97, unicode_equal),
    ("prefix", 0.965, starts_with_pattern),
    ("substring", 0.94, includes_pattern),
];

fn matches_at(lines: &[String], pattern: &[String], at: usize, predicate: LinePredicate) -> bool {
    pattern
        .iter()
        .zip(&lines[at..at + pattern.len()])
        .all(|(p, l)| predicate(l, p))
}

fn run_structural_passes(
    lines: &[String],
    pattern: &[String],
    from: usize,
    to: usize,
) -> Option<SequenceSearchResult> {
    for &(name, confidence, predicate) in SEQUENCE_PASSES {
        if let Some(i) = (from..=to).find(|&i| matches_at(lines, pattern, i, predicate)) {
            debug!(pass = name, index = i, confidence, "sequence matched");
            return Some(SequenceSearchResult::found(i, confidence));
        }
    }
    None
}

/// The hit starts and ends on line boundaries, so replacing
/// `pattern.len()` lines at its index replaces exactly the matched text.
fn covers_whole_lines(content: &str, m: &FuzzyMatch) -> bool {
    let bytes = content.as_bytes();
    let end = m.start_index + m.actual_text.len();
    (m.start_index == 0 || bytes[m.start_index - 1] == b'\n')
        && (end == bytes.len() || bytes[end] == b'\n')
}

/// Locate `pattern` in `lines` at or after `start`.
///
/// With `eof` set the structural passes first try the position that ends at
/// the last line, then fall back to `[start, ..]`.
pub fn seek_sequence(
    lines: &[String],
    pattern: &[String],
    start: usize,
    eof: bool,
) -> SequenceSearchResult {
    if pattern.is_empty() {
        return SequenceSearchResult::found(start, 1.0);
    }
    if pattern.len() > lines.len() {
        return SequenceSearchResult::missing(0.0);
    }

    let max_start = lines.len() - pattern.len();
    let search_start = if eof { max_start } else { start };

    if search_start <= max_start {
        if let Some(hit) = run_structural_passes(lines, pattern, search_start, max_start) {
            return hit;
        }
    }
    let skipped_region = eof && search_start > start;
    if skipped_region {
        if let Some(hit) = run_structural_passes(lines, pattern, start, max_start) {
            return hit;
        }
    }

    // Fuzzy pass: best window wins.
    let norm_lines: Vec<String> = lines.iter().map(|l| normalize_for_fuzzy(l)).collect();
    let norm_pattern: Vec<String> = pattern.iter().map(|p| normalize_for_fuzzy(p)).collect();
    let score_at = |i: usize| -> f64 {
        let total: f64 = norm_pattern
            .iter()
            .zip(&norm_lines[i..i + pattern.len()])
            .map(|(p, l)| levenshtein::similarity(l, p))
            .sum();
        total / pattern.len() as f64
    };

    let mut best_index = None;
    let mut best_score = 0.0;
    let mut consider = |i: usize| {
        let score = score_at(i);
        if score > best_score {
            best_score = score;
            best_index = Some(i);
        }
    };
    (search_start..=max_start).for_each(&mut consider);
    if skipped_region {
        (start..search_start).for_each(&mut consider);
    }

    if let Some(i) = best_index {
        if best_score >= SEQUENCE_FUZZY_THRESHOLD {
            debug!(pass = "fuzzy", index = i, confidence = best_score, "sequence matched");
            return SequenceSearchResult::found(i, best_score);
        }
    }

    // Last resort: flatten and use the character-window matcher.
    if start < lines.len() {
        let content = lines[start..].join("\n");
        let target = pattern.join("\n");
        let outcome = matcher::find_match(
            &content,
            &target,
            MatchOptions {
                allow_fuzzy: true,
                threshold: CHARACTER_MATCH_THRESHOLD,
            },
        );
        if let Some(m) = outcome.matched.filter(|m| covers_whole_lines(&content, m)) {
            let index = start + content[..m.start_index].matches('\n').count();
            debug!(pass = "character", index, confidence = m.confidence, "sequence matched");
            return SequenceSearchResult::found(index, m.confidence);
        }
    }

    SequenceSearchResult::missing(best_score)
}

/// Locate a single anchor line at or after `start_from`.
pub fn find_context_line(lines: &[String], context: &str, start_from: usize) -> ContextLineResult {
    let candidates = || lines.iter().enumerate().skip(start_from);
    let first = |predicate: &dyn Fn(&str) -> bool| {
        candidates().find(|(_, l)| predicate(l)).map(|(i, _)| i)
    };

    if let Some(i) = first(&|l| l == context) {
        return ContextLineResult::found(i, 1.0);
    }

    let trimmed = context.trim();
    if let Some(i) = first(&|l| l.trim() == trimmed) {
        return ContextLineResult::found(i, 0.99);
    }

    let unicode = normalize_unicode(context);
    if let Some(i) = first(&|l| normalize_unicode(l) == unicode) {
        return ContextLineResult::found(i, 0.98);
    }

    let norm = normalize_for_fuzzy(context);
    if !norm.is_empty() {
        if let Some(i) = first(&|l| normalize_for_fuzzy(l).starts_with(&norm)) {
            return ContextLineResult::found(i, 0.96);
        }
    }

    if let Some(i) = first(&|l| contains_significant(&normalize_for_fuzzy(l), &norm)) {
        return ContextLineResult::found(i, 0.94);
    }

    let mut best_index = None;
    let mut best_score = 0.0;
    for (i, line) in candidates() {
        let score = levenshtein::similarity(&normalize_for_fuzzy(line), &norm);
        if score > best_score {
            best_score = score;
            best_index = Some(i);
        }
    }

    match best_index {
        Some(i) if best_score >= CONTEXT_FUZZY_THRESHOLD => {
            debug!(index = i, confidence = best_score, "context line matched fuzzily");
            ContextLineResult::found(i, best_score)
        }
        _ => ContextLineResult::missing(best_score),
    }
}
