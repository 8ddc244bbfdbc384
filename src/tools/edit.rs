//! Edit tool — replace-mode editing with fuzzy location.
//!
//! Finds `oldString` in a file with [`replace_text`] and replaces it with
//! `newString`, re-indenting the replacement to the matched block. Returns
//! the line-numbered diff of the change.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{ToolCallResult, ToolDefinition};
use crate::edit::diff::{DEFAULT_CONTEXT_LINES, compute_diff};
use crate::edit::matcher::DEFAULT_FUZZY_THRESHOLD;
use crate::edit::normalize::{
    StrippedBom, detect_line_ending, normalize_to_lf, restore_line_endings, strip_bom,
};
use crate::edit::{ReplaceOptions, replace_text};
use crate::error::PatchError;
use crate::storage::{LocalStorage, Storage};

/// Parameters for the edit tool.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditParams {
    /// Path to the file to edit (relative to workspace or absolute).
    pub file_path: String,
    pub old_string: String,
    pub new_string: String,
    #[serde(default)]
    pub replace_all: bool,
    #[serde(default = "default_fuzzy")]
    pub fuzzy: bool,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

const fn default_fuzzy() -> bool {
    true
}

const fn default_threshold() -> f64 {
    DEFAULT_FUZZY_THRESHOLD
}

/// Return the tool definition for `edit`.
pub fn tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "edit".to_owned(),
        description: "Edit a file by replacing oldString with newString. Whitespace, \
            indentation and punctuation differences are tolerated; ambiguous matches are \
            rejected. If oldString is empty and the file doesn't exist, creates a new file \
            with newString as content."
            .to_owned(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "filePath": {
                    "type": "string",
                    "description": "Path to the file to edit"
                },
                "oldString": {
                    "type": "string",
                    "description": "The text to find (empty string = create new file)"
                },
                "newString": {
                    "type": "string",
                    "description": "The replacement text"
                },
                "replaceAll": {
                    "type": "boolean",
                    "description": "Replace all occurrences (default: false)",
                    "default": false
                },
                "fuzzy": {
                    "type": "boolean",
                    "description": "Accept near matches (default: true)",
                    "default": true
                },
                "threshold": {
                    "type": "number",
                    "description": "Minimum similarity for a fuzzy match, 0..1",
                    "default": DEFAULT_FUZZY_THRESHOLD
                }
            },
            "required": ["filePath", "oldString", "newString"]
        }),
    }
}

/// Execute the edit tool.
///
/// # Errors
///
/// Returns an error if the parameters are invalid or the file cannot be
/// read or written.
pub fn execute(workspace: &Path, arguments: serde_json::Value) -> Result<ToolCallResult> {
    let params: EditParams =
        serde_json::from_value(arguments).context("invalid edit parameters")?;

    let file_path = match super::validate_path(workspace, &params.file_path) {
        Ok(p) => p,
        Err(e) => return Ok(ToolCallResult::error(e)),
    };
    let storage = LocalStorage;

    if params.old_string.is_empty() {
        if storage.exists(&file_path) {
            return Ok(ToolCallResult::error(format!(
                "oldString cannot be empty for existing file {}. \
                 Provide the text to find and replace.",
                file_path.display()
            )));
        }
        if let Some(parent) = file_path.parent() {
            storage.mkdir(parent).with_context(|| {
                format!("failed to create directories for {}", file_path.display())
            })?;
        }
        storage
            .write(&file_path, &params.new_string)
            .with_context(|| format!("failed to write {}", file_path.display()))?;
        return Ok(ToolCallResult::text(format!(
            "Created new file: {}",
            file_path.display()
        )));
    }

    let original = storage
        .read(&file_path)
        .with_context(|| format!("failed to read {}", file_path.display()))?;
    let StrippedBom { bom, text } = strip_bom(&original);
    let ending = detect_line_ending(text);

    let options = ReplaceOptions {
        all: params.replace_all,
        fuzzy: params.fuzzy,
        threshold: params.threshold,
    };
    let replaced = match replace_text(
        &normalize_to_lf(text),
        &normalize_to_lf(&params.old_string),
        &normalize_to_lf(&params.new_string),
        options,
    ) {
        Ok(r) => r,
        Err(PatchError::Match(failure)) => {
            return Ok(ToolCallResult::error((*failure).with_path(file_path)));
        }
        Err(e) => return Ok(ToolCallResult::error(e)),
    };

    let new_content = format!("{bom}{}", restore_line_endings(&replaced.content, ending));
    let diff = compute_diff(&original, &new_content, DEFAULT_CONTEXT_LINES);

    storage
        .write(&file_path, &new_content)
        .with_context(|| format!("failed to write {}", file_path.display()))?;

    let summary = format!(
        "Replaced {} occurrence{} in {}",
        replaced.count,
        if replaced.count == 1 { "" } else { "s" },
        file_path.display()
    );
    Ok(
        ToolCallResult::text(format!("{summary}\n\n{}", diff.diff)).with_structured(
            serde_json::json!({
                "count": replaced.count,
                "diff": diff.diff,
                "firstChangedLine": diff.first_changed_line,
            }),
        ),
    )
}
