//! Fuzzy edit engine.
//!
//! Two public edit modes sit on top of a stack of pure text primitives:
//!
//! - **Replace** ([`replace_text`]): the caller supplies old/new text. The old
//!   text is located by the character-window matcher, exact first, then by
//!   indent-aware fuzzy window scoring.
//! - **Patch** ([`patch::apply_patch`]): the caller supplies a diff. It is
//!   parsed into hunks and each hunk is located by the line-sequence matcher.
//!
//! # Layers
//!
//! 1. [`normalize`]: line endings, BOM, punctuation folding, indentation
//! 2. [`levenshtein`]: edit distance and similarity
//! 3. [`matcher`]: character-window matcher (replace mode)
//! 4. [`sequence`]: line-sequence and context-line matcher (patch mode)
//! 5. [`hunk`]: diff dialect normalization and hunk parsing
//! 6. [`diff`]: rendering of the resulting change
//!
//! Every function here is synchronous and stateless. Fuzzy scans cost
//! O(windows × pattern lines × line length²); hosts bound input size.

pub mod diff;
pub mod hunk;
pub mod levenshtein;
pub mod matcher;
pub mod normalize;
pub mod patch;
pub mod sequence;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::edit::matcher::{DEFAULT_FUZZY_THRESHOLD, MatchOptions, MatchOutcome, find_match};
use crate::edit::normalize::adjust_indentation;
use crate::error::{MatchFailure, PatchError, PatchResult};

/// Options for [`replace_text`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplaceOptions {
    /// Replace every occurrence instead of requiring a unique one.
    pub all: bool,
    /// Accept fuzzy matches at or above `threshold`.
    pub fuzzy: bool,
    pub threshold: f64,
}

impl Default for ReplaceOptions {
    fn default() -> Self {
        Self {
            all: false,
            fuzzy: true,
            threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaceResult {
    pub content: String,
    pub count: usize,
}

/// Replace `old_text` with `new_text` in `content`.
///
/// Single mode requires one unambiguous location and fails with a
/// [`PatchError::Match`] describing the closest candidate otherwise. All mode
/// replaces every exact occurrence, or, when there is none, every fuzzy
/// window that clears the threshold. Each replacement is re-indented to the
/// indentation actually found in the file.
pub fn replace_text(
    content: &str,
    old_text: &str,
    new_text: &str,
    options: ReplaceOptions,
) -> PatchResult<ReplaceResult> {
    if old_text.is_empty() {
        return Err(PatchError::Structural(
            "old text must not be empty; provide the text to find".to_owned(),
        ));
    }

    let match_options = MatchOptions {
        allow_fuzzy: options.fuzzy,
        threshold: options.threshold,
    };
    let failure = |outcome: &MatchOutcome| -> PatchError {
        MatchFailure::from_outcome(old_text, outcome, options.fuzzy, options.threshold).into()
    };

    if options.all {
        return replace_all(content, old_text, new_text, options, match_options)
            .map_err(|outcome| failure(&outcome));
    }

    let outcome = find_match(content, old_text, match_options);
    let Some(found) = outcome.matched.as_ref() else {
        debug!(
            occurrences = outcome.occurrences,
            fuzzy_matches = outcome.fuzzy_matches,
            "no unambiguous match for replacement"
        );
        return Err(failure(&outcome));
    };

    let replacement = adjust_indentation(old_text, &found.actual_text, new_text);
    let end = found.start_index + found.actual_text.len();
    let mut result = String::with_capacity(content.len() + replacement.len());
    result.push_str(&content[..found.start_index]);
    result.push_str(&replacement);
    result.push_str(&content[end..]);

    debug!(
        start_line = found.start_line,
        confidence = found.confidence,
        "replaced unique match"
    );
    Ok(ReplaceResult {
        content: result,
        count: 1,
    })
}

/// All-mode replacement. On zero replacements returns the last outcome for
/// diagnostics.
fn replace_all(
    content: &str,
    old_text: &str,
    new_text: &str,
    options: ReplaceOptions,
    match_options: MatchOptions,
) -> Result<ReplaceResult, MatchOutcome> {
    let exact = content.matches(old_text).count();
    if exact > 0 {
        debug!(count = exact, "replace_all exact");
        return Ok(ReplaceResult {
            content: content.replace(old_text, new_text),
            count: exact,
        });
    }

    let mut result = content.to_owned();
    let mut cursor = 0;
    let mut count = 0;

    // Scanning resumes after each replaced region, so replacement text is
    // never matched again.
    let last_outcome = loop {
        if count > 0 && cursor >= result.len() {
            break MatchOutcome::default();
        }
        let outcome = find_match(&result[cursor..], old_text, match_options);
        let candidate = outcome.matched.clone().or_else(|| {
            outcome
                .closest
                .clone()
                .filter(|c| options.fuzzy && c.confidence >= options.threshold)
        });
        // An empty hit consumes nothing and would repeat forever.
        let Some(found) = candidate.filter(|c| !c.actual_text.is_empty()) else {
            break outcome;
        };

        let replacement = adjust_indentation(old_text, &found.actual_text, new_text);
        let start = cursor + found.start_index;
        result.replace_range(start..start + found.actual_text.len(), &replacement);
        count += 1;

        cursor = start + replacement.len();
        if result[cursor..].starts_with('\n') {
            cursor += 1;
        }
        debug!(confidence = found.confidence, count, "replace_all fuzzy hit");
    };

    if count == 0 {
        return Err(last_outcome);
    }
    Ok(ReplaceResult {
        content: result,
        count,
    })
}
