//! Tool router integration tests.

use oa_patch::tools::{ToolRequest, ToolRouter};
use serde_json::json;

fn router() -> (tempfile::TempDir, ToolRouter) {
    let dir = tempfile::tempdir().expect("tempdir");
    let router = ToolRouter::new(dir.path().to_path_buf());
    (dir, router)
}

#[test]
fn test_request_parsing() {
    let request: ToolRequest = serde_json::from_value(json!({
        "tool": "edit",
        "arguments": {"filePath": "a.rs", "oldString": "a", "newString": "b"}
    }))
    .expect("parse");
    assert_eq!(request.tool, "edit");
    assert_eq!(request.arguments["filePath"], "a.rs");
}

#[test]
fn test_edit_then_patch() {
    let (dir, router) = router();
    std::fs::write(
        dir.path().join("lib.rs"),
        "fn main() {\n    start();\n    finish();\n}\n",
    )
    .expect("fixture");

    let edited = router
        .call_tool(
            "edit",
            json!({
                "filePath": "lib.rs",
                "oldString": "start();\nfinish();",
                "newString": "start();\nwork();\nfinish();"
            }),
        )
        .expect("edit");
    assert!(!edited.is_error, "{}", edited.text_content());

    let patched = router
        .call_tool(
            "patch",
            json!({
                "path": "lib.rs",
                "operation": "update",
                "diff": "@@ fn main() {\n-    work();\n+    work_hard();\n"
            }),
        )
        .expect("patch");
    assert!(!patched.is_error, "{}", patched.text_content());

    assert_eq!(
        std::fs::read_to_string(dir.path().join("lib.rs")).expect("read"),
        "fn main() {\n    start();\n    work_hard();\n    finish();\n}\n"
    );
    let details = patched.structured_content.expect("details");
    assert_eq!(details["firstChangedLine"], 3);
}

#[test]
fn test_patch_create_and_delete() {
    let (dir, router) = router();
    let created = router
        .dispatch(ToolRequest {
            tool: "patch".to_owned(),
            arguments: json!({"path": "notes.md", "operation": "create", "diff": "+# Notes\n+todo\n"}),
        })
        .expect("create");
    assert!(!created.is_error, "{}", created.text_content());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("notes.md")).expect("read"),
        "# Notes\ntodo\n"
    );

    let deleted = router
        .call_tool("patch", json!({"path": "notes.md", "operation": "delete"}))
        .expect("delete");
    assert!(!deleted.is_error);
    assert!(!dir.path().join("notes.md").exists());
}

#[test]
fn test_ambiguous_edit_reports_error() {
    let (dir, router) = router();
    std::fs::write(dir.path().join("a.txt"), "x\ny\nx\n").expect("fixture");
    let result = router
        .call_tool("edit", json!({"filePath": "a.txt", "oldString": "x", "newString": "z"}))
        .expect("edit");
    assert!(result.is_error);
    assert!(result.text_content().contains("found 2 occurrences"));

    let all = router
        .call_tool(
            "edit",
            json!({"filePath": "a.txt", "oldString": "x", "newString": "z", "replaceAll": true}),
        )
        .expect("edit");
    assert!(!all.is_error);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("a.txt")).expect("read"),
        "z\ny\nz\n"
    );
}

#[test]
fn test_result_json_shape() {
    let (dir, router) = router();
    std::fs::write(dir.path().join("a.txt"), "one\n").expect("fixture");
    let result = router
        .call_tool("edit", json!({"filePath": "a.txt", "oldString": "missing", "newString": "x"}))
        .expect("edit");
    let value = serde_json::to_value(&result).expect("serialize");
    assert_eq!(value["isError"], true);
    assert_eq!(value["content"][0]["type"], "text");
}
