//! Diff rendering using the `similar` crate.
//!
//! [`generate_diff_string`] renders the compact, line-numbered diff shown to
//! the model after an edit. [`unified_diff`] renders a standard unified diff
//! for hosts that want git-style output.

use serde::Serialize;
use similar::{Algorithm, DiffOp, TextDiff};

use crate::edit::normalize::{normalize_to_lf, strip_bom};

/// Context lines kept around each change by default.
pub const DEFAULT_CONTEXT_LINES: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    pub diff: String,
    /// 1-based, in new-file coordinates.
    pub first_changed_line: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunKind {
    Equal,
    Removed,
    Added,
}

struct Run<'a> {
    kind: RunKind,
    lines: Vec<&'a str>,
}

fn strip_eol(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Group the line diff into equal/removed/added runs.
fn diff_runs<'a>(old: &'a str, new: &'a str) -> Vec<Run<'a>> {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Patience)
        .diff_lines(old, new);
    let old_lines = diff.old_slices();
    let new_lines = diff.new_slices();

    let mut runs: Vec<Run<'a>> = Vec::new();
    let mut push = |kind: RunKind, lines: &[&'a str]| {
        if lines.is_empty() {
            return;
        }
        let lines = lines.iter().copied().map(strip_eol);
        match runs.last_mut() {
            Some(run) if run.kind == kind => run.lines.extend(lines),
            _ => runs.push(Run {
                kind,
                lines: lines.collect(),
            }),
        }
    };

    for op in diff.ops() {
        match *op {
            DiffOp::Equal { old_index, len, .. } => {
                push(RunKind::Equal, &old_lines[old_index..old_index + len]);
            }
            DiffOp::Delete {
                old_index, old_len, ..
            } => push(RunKind::Removed, &old_lines[old_index..old_index + old_len]),
            DiffOp::Insert {
                new_index, new_len, ..
            } => push(RunKind::Added, &new_lines[new_index..new_index + new_len]),
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                push(RunKind::Removed, &old_lines[old_index..old_index + old_len]);
                push(RunKind::Added, &new_lines[new_index..new_index + new_len]);
            }
        }
    }

    runs
}

struct Renderer {
    out: Vec<String>,
    width: usize,
    old_no: usize,
    new_no: usize,
}

impl Renderer {
    fn context(&mut self, lines: &[&str]) {
        for line in lines {
            self.out
                .push(format!(" {:>width$} {line}", self.old_no, width = self.width));
            self.old_no += 1;
            self.new_no += 1;
        }
    }

    fn skip(&mut self, count: usize, marker: bool) {
        if count == 0 {
            return;
        }
        if marker {
            self.out.push(format!(" {:>width$} ...", "", width = self.width));
        }
        self.old_no += count;
        self.new_no += count;
    }
}

/// Render a context-windowed, line-numbered diff of `old` against `new`.
///
/// Removed lines carry old-file numbers, added and context lines carry
/// old/new numbers as they advance. Equal runs not adjacent to a change are
/// skipped entirely; adjacent runs keep `context_lines` lines at each edge
/// next to a change, with `...` standing in for the rest.
pub fn generate_diff_string(old: &str, new: &str, context_lines: usize) -> DiffResult {
    let runs = diff_runs(old, new);
    let max_line = old.split('\n').count().max(new.split('\n').count());

    let mut r = Renderer {
        out: Vec::new(),
        width: max_line.to_string().len(),
        old_no: 1,
        new_no: 1,
    };
    let mut first_changed_line = None;
    let mut last_was_change = false;

    for (idx, run) in runs.iter().enumerate() {
        match run.kind {
            RunKind::Removed => {
                first_changed_line.get_or_insert(r.new_no);
                for line in &run.lines {
                    r.out.push(format!("-{:>width$} {line}", r.old_no, width = r.width));
                    r.old_no += 1;
                }
                last_was_change = true;
            }
            RunKind::Added => {
                first_changed_line.get_or_insert(r.new_no);
                for line in &run.lines {
                    r.out.push(format!("+{:>width$} {line}", r.new_no, width = r.width));
                    r.new_no += 1;
                }
                last_was_change = true;
            }
            RunKind::Equal => {
                let next_is_change = runs.get(idx + 1).is_some_and(|n| n.kind != RunKind::Equal);
                let lines = run.lines.as_slice();
                let n = lines.len();
                let keep = context_lines.min(n);

                match (last_was_change, next_is_change) {
                    (false, false) => r.skip(n, false),
                    (true, false) => {
                        r.context(&lines[..keep]);
                        r.skip(n - keep, true);
                    }
                    (false, true) => {
                        r.skip(n - keep, true);
                        r.context(&lines[n - keep..]);
                    }
                    (true, true) if n > 2 * context_lines => {
                        r.context(&lines[..context_lines]);
                        r.skip(n - 2 * context_lines, true);
                        r.context(&lines[n - context_lines..]);
                    }
                    (true, true) => r.context(lines),
                }
                last_was_change = false;
            }
        }
    }

    DiffResult {
        diff: r.out.join("\n"),
        first_changed_line,
    }
}

/// [`generate_diff_string`] over BOM-stripped, LF-normalized inputs.
pub fn compute_diff(old: &str, new: &str, context_lines: usize) -> DiffResult {
    let old = normalize_to_lf(strip_bom(old).text);
    let new = normalize_to_lf(strip_bom(new).text);
    generate_diff_string(&old, &new, context_lines)
}

/// Generate a unified diff between old and new content.
///
/// Uses the Patience diff algorithm which produces cleaner diffs
/// for source code by preserving structure.
pub fn unified_diff(file_name: &str, old: &str, new: &str, context_radius: usize) -> String {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Patience)
        .diff_lines(old, new);

    diff.unified_diff()
        .context_radius(context_radius)
        .header(&format!("a/{file_name}"), &format!("b/{file_name}"))
        .to_string()
}
