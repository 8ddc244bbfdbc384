//! Tool router — JSON tool surface over the edit engine.
//!
//! Each tool takes JSON arguments and returns a [`ToolCallResult`]. Engine
//! failures (no match, malformed diff) come back as results with
//! `is_error` set so the calling agent can read the message and retry;
//! only invalid arguments and I/O failures surface as `Err`.

pub mod edit;
pub mod patch;

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A tool definition with its JSON Schema.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// One text item of a tool result.
#[derive(Debug, Clone, Serialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

/// Result of a tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub content: Vec<ContentItem>,
    /// Machine-readable details (diff, first changed line, change kind).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem {
                content_type: "text".to_owned(),
                text: text.into(),
            }],
            structured_content: None,
            is_error: false,
        }
    }

    pub fn error(text: impl std::fmt::Display) -> Self {
        Self {
            is_error: true,
            ..Self::text(format!("Error: {text}"))
        }
    }

    #[must_use]
    pub fn with_structured(mut self, value: serde_json::Value) -> Self {
        self.structured_content = Some(value);
        self
    }

    /// Concatenated text of all content items.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A tool invocation as read by the binary.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolRequest {
    pub tool: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Resolve a file path and ensure it stays inside the workspace.
///
/// Rejects null bytes, `..` escapes and symlinks resolving outside the
/// workspace. Paths that do not exist yet are resolved through their deepest
/// existing ancestor.
pub fn validate_path(workspace: &Path, file_path: &str) -> Result<PathBuf> {
    if file_path.contains('\0') {
        bail!("path contains null byte");
    }

    let raw = if Path::new(file_path).is_absolute() {
        PathBuf::from(file_path)
    } else {
        workspace.join(file_path)
    };
    let root = workspace
        .canonicalize()
        .unwrap_or_else(|_| workspace.to_path_buf());
    let resolved = resolve_lenient(&raw)?;

    if !resolved.starts_with(&root) {
        bail!("path escapes workspace boundary: {file_path}");
    }
    Ok(resolved)
}

/// Canonicalize the deepest existing ancestor and re-append the rest.
fn resolve_lenient(path: &Path) -> Result<PathBuf> {
    let mut existing = path;
    let mut missing = Vec::new();
    while !existing.exists() {
        // `file_name` is `None` for a trailing `..` below a missing directory.
        let (Some(name), Some(parent)) = (existing.file_name(), existing.parent()) else {
            bail!("cannot resolve path: {}", path.display());
        };
        missing.push(name);
        existing = parent;
    }

    let mut resolved = existing.canonicalize()?;
    for part in missing.iter().rev() {
        resolved.push(part);
    }
    Ok(resolved)
}

/// Dispatches tool calls to the `edit` and `patch` implementations.
pub struct ToolRouter {
    workspace: PathBuf,
}

impl ToolRouter {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }

    /// All available tools with their JSON Schema definitions.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        vec![edit::tool_definition(), patch::tool_definition()]
    }

    /// Call a tool by name with JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments do not deserialize or the file
    /// cannot be read or written.
    pub fn call_tool(&self, name: &str, arguments: serde_json::Value) -> Result<ToolCallResult> {
        debug!(tool = name, "dispatching tool call");

        match name {
            "edit" => edit::execute(&self.workspace, arguments),
            "patch" => patch::execute(&self.workspace, arguments),
            _ => Ok(ToolCallResult::error(format!("unknown tool: {name}"))),
        }
    }

    /// Call the tool named by `request`.
    ///
    /// # Errors
    ///
    /// See [`ToolRouter::call_tool`].
    pub fn dispatch(&self, request: ToolRequest) -> Result<ToolCallResult> {
        self.call_tool(&request.tool, request.arguments)
    }
}
