//! oa-patch -- apply one edit or patch tool request.
//!
//! Usage: oa-patch --workspace <path> < request.json
//!
//! Reads `{"tool": "edit"|"patch", "arguments": {...}}` from stdin and
//! writes the JSON tool result to stdout.

use std::io::Read;
use std::process::ExitCode;

use anyhow::Context;
use oa_patch::tools::{ToolRequest, ToolRouter};

fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr so stdout carries only the result.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let workspace = std::env::args()
        .skip_while(|a| a != "--workspace")
        .nth(1)
        .unwrap_or_else(|| ".".to_string());
    let workspace = std::path::Path::new(&workspace)
        .canonicalize()
        .with_context(|| format!("invalid workspace: {workspace}"))?;

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("failed to read request from stdin")?;
    let request: ToolRequest =
        serde_json::from_str(&input).context("request must be {\"tool\", \"arguments\"} JSON")?;

    let router = ToolRouter::new(workspace);
    let result = router.dispatch(request)?;
    println!("{}", serde_json::to_string(&result)?);

    Ok(if result.is_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
