//! Error types for the oa-patch crate.

use std::fmt;
use std::path::PathBuf;

use crate::edit::matcher::{FuzzyMatch, MatchOutcome};

/// Patch engine error types.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// Malformed hunk syntax.
    #[error("invalid diff at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Input that is well-formed but cannot be applied as asked
    /// (multi-file syntax in a single-file patch, empty search text, ...).
    #[error("{0}")]
    Structural(String),

    /// No unambiguous location for the requested text.
    #[error("{0}")]
    Match(Box<MatchFailure>),

    /// Storage adapter failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience result type for oa-patch operations.
pub type PatchResult<T> = Result<T, PatchError>;

/// First line where the requested text and the closest candidate disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDifference {
    /// 1-based line within the requested text.
    pub line: usize,
    pub expected: String,
    pub actual: String,
}

/// Everything known about a failed lookup, rendered as an actionable message.
#[derive(Debug, Clone, Default)]
pub struct MatchFailure {
    pub path: Option<PathBuf>,
    /// Set when the failing lookup was a hunk's `@@` anchor line.
    pub anchor: Option<String>,
    /// 1-based hunk number when the lookup came from a patch.
    pub hunk: Option<usize>,
    pub closest: Option<FuzzyMatch>,
    pub occurrences: Option<usize>,
    pub occurrence_lines: Vec<usize>,
    pub fuzzy_matches: Option<usize>,
    pub fuzzy_enabled: bool,
    pub threshold: f64,
    pub first_difference: Option<LineDifference>,
}

impl MatchFailure {
    pub fn from_outcome(
        target: &str,
        outcome: &MatchOutcome,
        fuzzy_enabled: bool,
        threshold: f64,
    ) -> Self {
        Self {
            path: None,
            anchor: None,
            hunk: None,
            closest: outcome.closest.clone(),
            occurrences: outcome.occurrences,
            occurrence_lines: outcome.occurrence_lines.clone(),
            fuzzy_matches: outcome.fuzzy_matches,
            fuzzy_enabled,
            threshold,
            first_difference: outcome
                .closest
                .as_ref()
                .and_then(|c| first_difference(target, &c.actual_text)),
        }
    }

    pub fn anchor(context: &str, threshold: f64) -> Self {
        Self {
            anchor: Some(context.to_owned()),
            fuzzy_enabled: true,
            threshold,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_hunk(mut self, hunk: usize) -> Self {
        self.hunk = Some(hunk);
        self
    }

    /// Similarity of the closest candidate, in percent.
    pub fn similarity_percent(&self) -> Option<f64> {
        self.closest.as_ref().map(|c| c.confidence * 100.0)
    }

    fn location(&self) -> String {
        let hunk = self
            .hunk
            .map(|n| format!(" for hunk {n}"))
            .unwrap_or_default();
        let path = self
            .path
            .as_ref()
            .map(|p| format!(" in {}", p.display()))
            .unwrap_or_default();
        format!("{hunk}{path}")
    }
}

impl From<MatchFailure> for PatchError {
    fn from(failure: MatchFailure) -> Self {
        Self::Match(Box::new(failure))
    }
}

fn first_difference(expected: &str, actual: &str) -> Option<LineDifference> {
    let expected: Vec<&str> = expected.split('\n').collect();
    let actual: Vec<&str> = actual.split('\n').collect();
    let len = expected.len().max(actual.len());
    (0..len).find_map(|i| {
        let e = expected.get(i).copied().unwrap_or_default();
        let a = actual.get(i).copied().unwrap_or_default();
        (e != a).then(|| LineDifference {
            line: i + 1,
            expected: e.to_owned(),
            actual: a.to_owned(),
        })
    })
}

impl fmt::Display for MatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = self.location();

        if let Some(count) = self.occurrences.filter(|&n| n > 1) {
            let lines = self
                .occurrence_lines
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return write!(
                f,
                "found {count} occurrences of the text{location} (lines {lines}); \
                 the text must be unique. Include more surrounding context to make it \
                 unique, or use replace-all to change every occurrence"
            );
        }

        let ambiguous_fuzzy = self.fuzzy_enabled
            && self.fuzzy_matches.is_some_and(|n| n > 1)
            && self.closest.as_ref().is_some_and(|c| c.confidence >= self.threshold);
        if let Some(count) = self.fuzzy_matches.filter(|_| ambiguous_fuzzy) {
            write!(
                f,
                "found {count} equally plausible fuzzy matches{location}; refusing to guess. \
                 Include more surrounding context to make the text unique"
            )?;
        } else if let Some(anchor) = &self.anchor {
            write!(f, "could not find context line {anchor:?}{location}")?;
        } else {
            write!(f, "could not find the text{location}")?;
        }

        if let (Some(closest), Some(percent)) = (&self.closest, self.similarity_percent()) {
            write!(
                f,
                ". Closest match at line {} is {percent:.0}% similar (threshold {:.0}%)",
                closest.start_line,
                self.threshold * 100.0
            )?;
        }
        if let Some(diff) = &self.first_difference {
            write!(
                f,
                ". First difference at line {}: expected {:?}, found {:?}",
                diff.line, diff.expected, diff.actual
            )?;
        }
        if self.closest.is_some() && !self.fuzzy_enabled {
            write!(f, ". Fuzzy matching is disabled; enable it to accept near matches")?;
        } else if !ambiguous_fuzzy {
            write!(f, ". Re-read the file and copy the target text exactly")?;
        }
        Ok(())
    }
}

impl std::error::Error for MatchFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(text: &str, confidence: f64) -> FuzzyMatch {
        FuzzyMatch {
            actual_text: text.to_owned(),
            start_index: 0,
            start_line: 7,
            confidence,
        }
    }

    #[test]
    fn test_ambiguous_exact_message() {
        let outcome = MatchOutcome {
            occurrences: Some(2),
            occurrence_lines: vec![3, 9],
            ..MatchOutcome::default()
        };
        let failure = MatchFailure::from_outcome("x", &outcome, true, 0.95).with_path("src/a.rs");
        let msg = failure.to_string();
        assert!(msg.contains("found 2 occurrences"));
        assert!(msg.contains("in src/a.rs"));
        assert!(msg.contains("lines 3, 9"));
        assert!(msg.contains("replace-all"));
    }

    #[test]
    fn test_closest_and_first_difference() {
        let outcome = MatchOutcome {
            closest: Some(candidate("let a = 1;\nlet b = 3;", 0.9)),
            fuzzy_matches: Some(0),
            ..MatchOutcome::default()
        };
        let failure = MatchFailure::from_outcome("let a = 1;\nlet b = 2;", &outcome, false, 0.95);
        assert_eq!(
            failure.first_difference,
            Some(LineDifference {
                line: 2,
                expected: "let b = 2;".to_owned(),
                actual: "let b = 3;".to_owned(),
            })
        );
        let msg = failure.to_string();
        assert!(msg.contains("line 7 is 90% similar"), "{msg}");
        assert!(msg.contains("Fuzzy matching is disabled"), "{msg}");
    }

    #[test]
    fn test_ambiguous_fuzzy_message() {
        let outcome = MatchOutcome {
            closest: Some(candidate("a", 0.97)),
            fuzzy_matches: Some(3),
            ..MatchOutcome::default()
        };
        let msg = MatchFailure::from_outcome("b", &outcome, true, 0.95).to_string();
        assert!(msg.contains("3 equally plausible fuzzy matches"), "{msg}");
    }

    #[test]
    fn test_location_names_hunk_and_path() {
        let msg = MatchFailure::default()
            .with_hunk(2)
            .with_path("lib.rs")
            .to_string();
        assert!(msg.starts_with("could not find the text for hunk 2 in lib.rs"), "{msg}");
    }

    #[test]
    fn test_error_wraps_failure() {
        let err: PatchError = MatchFailure::anchor("fn missing()", 0.8).into();
        assert!(err.to_string().contains("could not find context line \"fn missing()\""));
    }
}
