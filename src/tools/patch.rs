//! Patch tool — applies a single-file diff, create or delete.

use std::path::Path;

use anyhow::{Context, Result};

use super::{ToolCallResult, ToolDefinition};
use crate::edit::diff::{DEFAULT_CONTEXT_LINES, compute_diff};
use crate::edit::hunk::move_destination;
use crate::edit::patch::{ApplyContext, PatchInput, PatchOperation, apply_patch};
use crate::error::PatchError;
use crate::storage::LocalStorage;

/// Return the tool definition for `patch`.
pub fn tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "patch".to_owned(),
        description: "Apply a change to one file. For `update`, `diff` holds one or more \
            hunks (`@@` headers with ' ', '+', '-' lines; unified and *** Begin Patch \
            formats are accepted). For `create`, `diff` is the full file content. \
            `moveTo` (or a `*** Move to:` line in the diff) renames the file after an update."
            .to_owned(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file (relative to workspace or absolute)"
                },
                "operation": {
                    "type": "string",
                    "enum": ["create", "delete", "update"]
                },
                "moveTo": {
                    "type": "string",
                    "description": "New path for an update"
                },
                "diff": {
                    "type": "string",
                    "description": "Hunks for update, literal content for create"
                }
            },
            "required": ["path", "operation"]
        }),
    }
}

/// Execute the patch tool.
///
/// # Errors
///
/// Returns an error if the parameters are invalid.
pub fn execute(workspace: &Path, arguments: serde_json::Value) -> Result<ToolCallResult> {
    let mut input: PatchInput =
        serde_json::from_value(arguments).context("invalid patch parameters")?;

    let path = match super::validate_path(workspace, &input.path) {
        Ok(p) => p,
        Err(e) => return Ok(ToolCallResult::error(e)),
    };
    input.path = path.to_string_lossy().into_owned();

    // A `*** Move to:` line is checked against the boundary like `moveTo`.
    if let Some(dest) = input.diff.as_deref().and_then(move_destination) {
        if let Err(e) = super::validate_path(workspace, &dest) {
            return Ok(ToolCallResult::error(e));
        }
    }
    if let Some(dest) = input.move_to.take() {
        match super::validate_path(workspace, &dest) {
            Ok(p) => input.move_to = Some(p.to_string_lossy().into_owned()),
            Err(e) => return Ok(ToolCallResult::error(e)),
        }
    }

    // Relative destinations in the diff resolve against the same root as
    // the validated paths.
    let root = workspace
        .canonicalize()
        .unwrap_or_else(|_| workspace.to_path_buf());
    let storage = LocalStorage;
    let change = match apply_patch(&input, &ApplyContext::new(&root, &storage)) {
        Ok(result) => result.change,
        Err(e @ PatchError::Io { .. }) => {
            return Err(anyhow::Error::new(e).context("patch failed"));
        }
        Err(e) => return Ok(ToolCallResult::error(e)),
    };

    let diff = compute_diff(
        change.old_content.as_deref().unwrap_or_default(),
        change.new_content.as_deref().unwrap_or_default(),
        DEFAULT_CONTEXT_LINES,
    );
    let summary = match (change.kind, &change.new_path) {
        (PatchOperation::Create, _) => format!("Created {}", change.path.display()),
        (PatchOperation::Delete, _) => format!("Deleted {}", change.path.display()),
        (PatchOperation::Update, Some(dest)) => format!(
            "Updated {} and moved it to {}",
            change.path.display(),
            dest.display()
        ),
        (PatchOperation::Update, None) => format!("Updated {}", change.path.display()),
    };
    let text = if diff.diff.is_empty() {
        summary
    } else {
        format!("{summary}\n\n{}", diff.diff)
    };

    Ok(ToolCallResult::text(text).with_structured(serde_json::json!({
        "type": change.kind,
        "path": change.path,
        "newPath": change.new_path,
        "diff": diff.diff,
        "firstChangedLine": diff.first_changed_line,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_update() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), "alpha\nbeta\ngamma\n").expect("fixture");
        let result = execute(
            dir.path(),
            serde_json::json!({"path": "a.txt", "operation": "update", "diff": "@@\n-beta\n+beta2\n"}),
        )
        .expect("execute");

        assert!(!result.is_error, "{}", result.text_content());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).expect("read"),
            "alpha\nbeta2\ngamma\n"
        );
        let details = result.structured_content.expect("details");
        assert_eq!(details["type"], "update");
        assert_eq!(details["firstChangedLine"], 2);
    }

    #[test]
    fn test_patch_parse_error_is_error_result() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), "alpha\n").expect("fixture");
        let result = execute(
            dir.path(),
            serde_json::json!({"path": "a.txt", "operation": "update", "diff": "@@\nnot a diff line\n"}),
        )
        .expect("execute");
        assert!(result.is_error);
        assert!(result.text_content().contains("invalid diff at line 2"));
    }

    #[test]
    fn test_patch_move_outside_workspace() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), "a\n").expect("fixture");
        let result = execute(
            dir.path(),
            serde_json::json!({
                "path": "a.txt",
                "operation": "update",
                "moveTo": "../escaped.txt",
                "diff": "@@\n-a\n+b\n"
            }),
        )
        .expect("execute");
        assert!(result.is_error);
        assert!(dir.path().join("a.txt").exists());
    }

    #[test]
    fn test_patch_declared_move_is_boundary_checked() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), "a\n").expect("fixture");
        let result = execute(
            dir.path(),
            serde_json::json!({
                "path": "a.txt",
                "operation": "update",
                "diff": "*** Move to: ../escaped.txt\n@@\n-a\n+b\n"
            }),
        )
        .expect("execute");
        assert!(result.is_error);
        assert!(result.text_content().contains("workspace boundary"));
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).expect("read"), "a\n");
    }

    #[test]
    fn test_patch_declared_move_inside_workspace() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), "a\n").expect("fixture");
        let result = execute(
            dir.path(),
            serde_json::json!({
                "path": "a.txt",
                "operation": "update",
                "moveTo": "b.txt",
                "diff": "*** Move to: b.txt\n@@\n-a\n+b\n"
            }),
        )
        .expect("execute");
        assert!(!result.is_error, "{}", result.text_content());
        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(std::fs::read_to_string(dir.path().join("b.txt")).expect("read"), "b\n");
    }

    #[test]
    fn test_patch_unknown_operation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = execute(
            dir.path(),
            serde_json::json!({"path": "a.txt", "operation": "rename"}),
        );
        assert!(err.is_err());
    }
}
