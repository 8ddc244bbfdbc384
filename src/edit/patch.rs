//! Patch orchestrator: applies one [`PatchInput`] through a [`Storage`].
//!
//! `update` hunks are located one after another against the partially
//! patched line array, so a later hunk sees the effect of earlier ones.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::edit::hunk::{DiffHunk, move_destination, parse_hunks};
use crate::edit::matcher::{MatchOptions, find_match};
use crate::edit::normalize::{
    StrippedBom, detect_line_ending, normalize_to_lf, restore_line_endings, strip_bom,
};
use crate::edit::sequence::{
    CONTEXT_FUZZY_THRESHOLD, SEQUENCE_FUZZY_THRESHOLD, find_context_line, seek_sequence,
};
use crate::error::{MatchFailure, PatchError, PatchResult};
use crate::storage::Storage;

/// File-level operation requested by a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOperation {
    Create,
    Delete,
    Update,
}

/// One single-file patch request.
///
/// For `create`, `diff` is the literal file content. For `update` it is hunk
/// text in any supported dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchInput {
    pub path: String,
    pub operation: PatchOperation,
    #[serde(default)]
    pub move_to: Option<String>,
    #[serde(default)]
    pub diff: Option<String>,
}

/// The change produced by applying a [`PatchInput`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    #[serde(rename = "type")]
    pub kind: PatchOperation,
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyPatchResult {
    pub change: FileChange,
}

/// Where relative paths resolve and which storage backs the files.
#[derive(Clone, Copy)]
pub struct ApplyContext<'a> {
    pub cwd: &'a Path,
    pub storage: &'a dyn Storage,
}

impl<'a> ApplyContext<'a> {
    pub fn new(cwd: &'a Path, storage: &'a dyn Storage) -> Self {
        Self { cwd, storage }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.storage.exists(path)
    }

    fn read(&self, path: &Path) -> PatchResult<String> {
        self.storage.read(path).map_err(|source| io_error(path, source))
    }

    fn write(&self, path: &Path, content: &str) -> PatchResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !self.storage.exists(parent) {
                self.storage
                    .mkdir(parent)
                    .map_err(|source| io_error(parent, source))?;
            }
        }
        self.storage
            .write(path, content)
            .map_err(|source| io_error(path, source))
    }

    fn delete(&self, path: &Path) -> PatchResult<()> {
        self.storage
            .delete(path)
            .map_err(|source| io_error(path, source))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> PatchError {
    PatchError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Apply a single-file patch.
pub fn apply_patch(input: &PatchInput, ctx: &ApplyContext<'_>) -> PatchResult<ApplyPatchResult> {
    let path = ctx.resolve(&input.path);
    if input.move_to.is_some() && input.operation != PatchOperation::Update {
        return Err(PatchError::Structural(
            "moveTo is only valid for update operations".to_owned(),
        ));
    }

    let change = match input.operation {
        PatchOperation::Create => create(input, ctx, path)?,
        PatchOperation::Delete => delete(ctx, path)?,
        PatchOperation::Update => update(input, ctx, path)?,
    };
    debug!(
        operation = ?change.kind,
        path = %change.path.display(),
        moved = change.new_path.is_some(),
        "applied patch"
    );
    Ok(ApplyPatchResult { change })
}

fn create(input: &PatchInput, ctx: &ApplyContext<'_>, path: PathBuf) -> PatchResult<FileChange> {
    if ctx.exists(&path) {
        return Err(PatchError::Structural(format!(
            "file already exists: {}; use the update operation to modify it",
            path.display()
        )));
    }
    let content = create_content(input.diff.as_deref().unwrap_or_default());
    ctx.write(&path, &content)?;
    Ok(FileChange {
        kind: PatchOperation::Create,
        path,
        new_path: None,
        old_content: None,
        new_content: Some(content),
    })
}

fn delete(ctx: &ApplyContext<'_>, path: PathBuf) -> PatchResult<FileChange> {
    if !ctx.exists(&path) {
        return Err(PatchError::Structural(format!(
            "file not found: {}",
            path.display()
        )));
    }
    let old_content = ctx.read(&path)?;
    ctx.delete(&path)?;
    Ok(FileChange {
        kind: PatchOperation::Delete,
        path,
        new_path: None,
        old_content: Some(old_content),
        new_content: None,
    })
}

fn update(input: &PatchInput, ctx: &ApplyContext<'_>, path: PathBuf) -> PatchResult<FileChange> {
    let Some(diff) = input.diff.as_deref().filter(|d| !d.trim().is_empty()) else {
        return Err(PatchError::Structural(
            "update requires a diff describing the change".to_owned(),
        ));
    };
    if !ctx.exists(&path) {
        return Err(PatchError::Structural(format!(
            "file not found: {}",
            path.display()
        )));
    }

    let new_path =
        move_target(input.move_to.as_deref(), diff, ctx)?.filter(|dest| dest != &path);

    let old_content = ctx.read(&path)?;
    let new_content = apply_diff(&old_content, diff).map_err(|err| match err {
        PatchError::Match(failure) => (*failure).with_path(path.clone()).into(),
        other => other,
    })?;

    if let Some(dest) = &new_path {
        if ctx.exists(dest) {
            return Err(PatchError::Structural(format!(
                "cannot move to {}: file already exists",
                dest.display()
            )));
        }
        ctx.write(dest, &new_content)?;
        ctx.delete(&path)?;
    } else {
        ctx.write(&path, &new_content)?;
    }

    Ok(FileChange {
        kind: PatchOperation::Update,
        path,
        new_path,
        old_content: Some(old_content),
        new_content: Some(new_content),
    })
}

/// Destination from `moveTo` or from a `*** Move to:` line in the diff.
///
/// Both may be given only when they name the same file.
fn move_target(
    move_to: Option<&str>,
    diff: &str,
    ctx: &ApplyContext<'_>,
) -> PatchResult<Option<PathBuf>> {
    let requested = move_to.map(|m| ctx.resolve(m));
    let declared = move_destination(diff).map(|m| ctx.resolve(&m));
    match (requested, declared) {
        (Some(requested), Some(declared)) if requested != declared => {
            Err(PatchError::Structural(format!(
                "conflicting move destinations: moveTo is {} but the diff moves to {}",
                requested.display(),
                declared.display()
            )))
        }
        (requested, declared) => Ok(requested.or(declared)),
    }
}

/// Literal create content, with `*** Add File:` style `+` prefixes removed
/// when every non-empty line carries one.
fn create_content(text: &str) -> String {
    let mut non_empty = text.split('\n').filter(|l| !l.trim().is_empty()).peekable();
    let prefixed = non_empty.peek().is_some() && non_empty.all(|l| l.starts_with('+'));
    if !prefixed {
        return text.to_owned();
    }
    text.split('\n')
        .map(|l| l.strip_prefix('+').unwrap_or(l))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Apply `diff` to file `content`, preserving its BOM and line endings.
pub fn apply_diff(content: &str, diff: &str) -> PatchResult<String> {
    let StrippedBom { bom, text } = strip_bom(content);
    let ending = detect_line_ending(text);
    let hunks = parse_hunks(diff)?;
    let patched = apply_hunks(&normalize_to_lf(text), &hunks)?;
    Ok(format!("{bom}{}", restore_line_endings(&patched, ending)))
}

/// Apply parsed hunks to LF-normalized `content`.
pub fn apply_hunks(content: &str, hunks: &[DiffHunk]) -> PatchResult<String> {
    let had_final_newline = content.ends_with('\n');
    let mut lines: Vec<String> = if content.is_empty() {
        Vec::new()
    } else {
        content.split('\n').map(ToOwned::to_owned).collect()
    };
    if had_final_newline {
        lines.pop();
    }

    let mut line_index = 0;
    for (n, hunk) in hunks.iter().enumerate() {
        let number = n + 1;
        let search_from = line_index;
        let mut anchored = false;

        if let Some(context) = &hunk.change_context {
            let found = find_context_line(&lines, context, line_index);
            match found.index {
                Some(i) => {
                    debug!(hunk = number, line = i + 1, confidence = found.confidence, "context anchor found");
                    line_index = i + 1;
                    anchored = true;
                }
                None if hunk.old_lines.is_empty() => {
                    return Err(MatchFailure::anchor(context, CONTEXT_FUZZY_THRESHOLD)
                        .with_hunk(number)
                        .into());
                }
                None => warn!(hunk = number, context = %context, "context anchor not found, locating hunk by its body"),
            }
        }

        if hunk.old_lines.is_empty() {
            let at = if anchored {
                line_index
            } else if let Some(start) = hunk.old_start_line {
                start.min(lines.len())
            } else {
                lines.len()
            };
            lines.splice(at..at, hunk.new_lines.iter().cloned());
            line_index = at + hunk.new_lines.len();
            debug!(hunk = number, line = at + 1, "inserted lines");
            continue;
        }

        let (at, old_len, new_lines) = locate(&lines, hunk, line_index, search_from, anchored)
            .ok_or_else(|| hunk_failure(&lines, hunk, number))?;
        lines.splice(at..at + old_len, new_lines.iter().cloned());
        line_index = at + new_lines.len();
        debug!(hunk = number, line = at + 1, "applied hunk");
    }

    let mut result = lines.join("\n");
    if had_final_newline || (content.is_empty() && !lines.is_empty()) {
        result.push('\n');
    }
    Ok(result)
}

/// Position, old length and replacement lines for a hunk with old lines.
fn locate<'h>(
    lines: &[String],
    hunk: &'h DiffHunk,
    line_index: usize,
    search_from: usize,
    anchored: bool,
) -> Option<(usize, usize, &'h [String])> {
    let mut old: &[String] = &hunk.old_lines;
    let mut new: &[String] = &hunk.new_lines;

    let seek = |pattern: &[String]| {
        let found = seek_sequence(lines, pattern, line_index, hunk.is_end_of_file);
        // The body may repeat the anchor line itself.
        if found.index.is_none() && anchored {
            seek_sequence(lines, pattern, search_from, hunk.is_end_of_file)
        } else {
            found
        }
    };

    let mut found = seek(old);
    if found.index.is_none() && old.len() > 1 && old.last().is_some_and(String::is_empty) {
        old = &old[..old.len() - 1];
        if new.last().is_some_and(String::is_empty) {
            new = &new[..new.len() - 1];
        }
        found = seek(old);
    }

    let at = found.index?;
    debug!(line = at + 1, confidence = found.confidence, "hunk located");
    Some((at, old.len(), new))
}

fn hunk_failure(lines: &[String], hunk: &DiffHunk, number: usize) -> PatchError {
    let target = hunk.old_lines.join("\n");
    let outcome = find_match(
        &lines.join("\n"),
        &target,
        MatchOptions {
            allow_fuzzy: true,
            threshold: SEQUENCE_FUZZY_THRESHOLD,
        },
    );
    MatchFailure::from_outcome(&target, &outcome, true, SEQUENCE_FUZZY_THRESHOLD)
        .with_hunk(number)
        .into()
}
