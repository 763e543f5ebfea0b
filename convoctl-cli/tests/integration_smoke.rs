//! Smoke tests for the convoctl binary

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const TRANSCRIPT: &str =
    "# Borrowing\n\n## Prompt:\nHi <script>x</script>\n## Response:\nHello <thought>reasoning</thought> world\n";

const EXPORT_WITH_ARTIFACT: &str = r#"{
  "exportedBy": {"tool": "convoctl", "tagline": "x"},
  "conversationId": "conv-1",
  "metadata": {"title": "With files", "model": "GPT-4o", "tags": ["rust"]},
  "messages": [
    {"type": "prompt", "content": "See attached"},
    {"type": "response", "content": "Got it"}
  ],
  "artifacts": [
    {"id": "a1", "fileName": "notes.txt", "fileSize": 5, "mimeType": "text/plain",
     "data": "aGVsbG8=", "uploadedAt": "2025-03-01T12:00:00Z", "insertedAfter": 0}
  ]
}"#;

/// A command isolated from any user config file.
fn convoctl(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("convoctl").unwrap();
    cmd.env("CONVOCTL_CONFIG", dir.path().join("absent.toml"))
        .env_remove("RUST_LOG");
    cmd
}

fn write(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

fn message_count(path: &Path) -> usize {
    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    value["messages"].as_array().unwrap().len()
}

// === Help ===

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    convoctl(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("convert"))
        .stdout(predicate::str::contains("merge"))
        .stdout(predicate::str::contains("skins"))
        .stdout(predicate::str::contains("manifest"));
}

#[test]
fn test_convert_help() {
    let dir = TempDir::new().unwrap();
    convoctl(&dir)
        .args(["convert", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Output format"));
}

// === Convert ===

#[test]
fn test_convert_markdown_to_html_stdout() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "chat.md", TRANSCRIPT);

    convoctl(&dir)
        .args(["convert", "--in", input.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("<!DOCTYPE html>"))
        .stdout(predicate::str::contains("<title>Borrowing</title>"))
        .stdout(predicate::str::contains("Thought process"))
        .stdout(predicate::str::contains("&lt;script&gt;"))
        .stdout(predicate::str::contains("<script>").not());
}

#[test]
fn test_convert_to_markdown_file() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "chat.md", TRANSCRIPT);
    let out = dir.path().join("out/chat.md");

    convoctl(&dir)
        .args(["convert", "--in", input.as_str(), "--to", "md", "--ai-label", "Bot", "--out"])
        .arg(&out)
        .assert()
        .success();

    let text = fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("# Borrowing\n"));
    assert!(text.contains("## Prompt - You"));
    assert!(text.contains("## Response - Bot"));
    assert!(text.contains("```thought\nreasoning\n```"));
    assert!(text.ends_with("*Exported with convoctl*\n"));
}

#[test]
fn test_skin_precedence_flag_over_config() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "chat.md", TRANSCRIPT);
    let config = write(&dir, "config.toml", "[render]\nskin = \"terminal\"\n");

    convoctl(&dir)
        .args(["--config", config.as_str(), "convert", "--in", input.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("skin-terminal"));

    convoctl(&dir)
        .args(["--config", config.as_str(), "convert", "--in", input.as_str(), "--skin", "paper"])
        .assert()
        .success()
        .stdout(predicate::str::contains("skin-paper"));
}

#[test]
fn test_unknown_skin_falls_back_to_default() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "chat.md", TRANSCRIPT);

    convoctl(&dir)
        .args(["convert", "--in", input.as_str(), "--skin", "neon"])
        .assert()
        .success()
        .stdout(predicate::str::contains("skin-classic"));
}

#[test]
fn test_unsupported_format_is_rejected() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "chat.md", TRANSCRIPT);

    convoctl(&dir)
        .args(["convert", "--in", input.as_str(), "--format", "yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported format 'yaml'"));
}

#[test]
fn test_parse_failure_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "notes.md", "just notes, no turns\n");
    let out = dir.path().join("out.html");

    convoctl(&dir)
        .args(["convert", "--in", input.as_str(), "--format", "markdown", "--out"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no turn markers"));
    assert!(!out.exists());
}

#[test]
fn test_html_export_writes_artifacts_and_manifest() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "conv.json", EXPORT_WITH_ARTIFACT);
    let out = dir.path().join("site/index.html");

    convoctl(&dir)
        .args(["convert", "--in", input.as_str(), "--out"])
        .arg(&out)
        .assert()
        .success();

    let html = fs::read_to_string(&out).unwrap();
    assert!(html.contains("href=\"artifacts/a1-notes.txt\""));
    assert_eq!(
        fs::read_to_string(dir.path().join("site/artifacts/a1-notes.txt")).unwrap(),
        "hello"
    );
    let manifest = fs::read_to_string(dir.path().join("site/manifest.json")).unwrap();
    assert!(manifest.contains("\"conversationId\": \"conv-1\""));
    assert!(manifest.contains("\"filePath\": \"artifacts/a1-notes.txt\""));
}

#[test]
fn test_html_export_keeps_same_named_artifacts_apart() {
    let dir = TempDir::new().unwrap();
    let raw = r#"{
      "messages": [{"type": "prompt", "content": "Two screenshots"}],
      "artifacts": [
        {"id": "a1", "fileName": "image.png", "fileSize": 3, "mimeType": "image/png",
         "data": "b25l", "uploadedAt": "2025-03-01T12:00:00Z"},
        {"id": "a2", "fileName": "image.png", "fileSize": 3, "mimeType": "image/png",
         "data": "dHdv", "uploadedAt": "2025-03-01T12:01:00Z"}
      ]
    }"#;
    let input = write(&dir, "conv.json", raw);
    let out = dir.path().join("index.html");

    convoctl(&dir)
        .args(["convert", "--in", input.as_str(), "--out"])
        .arg(&out)
        .assert()
        .success();

    let artifacts = dir.path().join("artifacts");
    assert_eq!(fs::read_to_string(artifacts.join("a1-image.png")).unwrap(), "one");
    assert_eq!(fs::read_to_string(artifacts.join("a2-image.png")).unwrap(), "two");
}

#[test]
fn test_preview_embeds_artifacts() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "conv.json", EXPORT_WITH_ARTIFACT);
    let out = dir.path().join("preview.html");

    convoctl(&dir)
        .args(["convert", "--in", input.as_str(), "--preview", "--out"])
        .arg(&out)
        .assert()
        .success();

    let html = fs::read_to_string(&out).unwrap();
    assert!(html.contains("data-payload=\"aGVsbG8=\""));
    assert!(html.contains("<script>"));
    assert!(!dir.path().join("artifacts").exists());
    assert!(!dir.path().join("manifest.json").exists());
}

// === Merge ===

#[test]
fn test_merge_appends_then_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "chat.md", TRANSCRIPT);
    let stored = dir.path().join("stored.json");

    convoctl(&dir)
        .args(["convert", "--in", input.as_str(), "--to", "json", "--out"])
        .arg(&stored)
        .assert()
        .success();
    assert_eq!(message_count(&stored), 2);

    let longer = write(
        &dir,
        "capture.md",
        &format!("{TRANSCRIPT}## Prompt:\nAnd lifetimes?\n"),
    );
    convoctl(&dir)
        .args(["merge", "--existing"])
        .arg(&stored)
        .args(["--in", longer.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("appended 1 message(s), skipped 2 duplicate(s)"));
    assert_eq!(message_count(&stored), 3);

    convoctl(&dir)
        .args(["merge", "--existing"])
        .arg(&stored)
        .args(["--in", longer.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("appended 0 message(s), skipped 3 duplicate(s)"));
    assert_eq!(message_count(&stored), 3);
}

#[test]
fn test_merge_keeps_metadata_without_new_messages() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "chat.md", TRANSCRIPT);
    let stored = dir.path().join("stored.json");

    convoctl(&dir)
        .args(["convert", "--in", input.as_str(), "--to", "json", "--out"])
        .arg(&stored)
        .assert()
        .success();

    let tagged = write(&dir, "tagged.md", &format!("**Tags:** ownership\n\n{TRANSCRIPT}"));
    convoctl(&dir)
        .args(["merge", "--existing"])
        .arg(&stored)
        .args(["--in", tagged.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("appended 0 message(s)"));

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&stored).unwrap()).unwrap();
    assert_eq!(value["metadata"]["tags"], serde_json::json!(["ownership"]));
    assert_eq!(message_count(&stored), 2);
}

#[test]
fn test_merge_dry_run_leaves_file() {
    let dir = TempDir::new().unwrap();
    let stored = write(&dir, "stored.json", EXPORT_WITH_ARTIFACT);
    let capture = write(&dir, "capture.md", "## Prompt:\nSomething new\n");

    convoctl(&dir)
        .args(["merge", "--existing", stored.as_str(), "--in", capture.as_str(), "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("appended 1 message(s)"));
    assert_eq!(fs::read_to_string(&stored).unwrap(), EXPORT_WITH_ARTIFACT);
}

// === Skins & manifest ===

#[test]
fn test_skins_lists_builtins() {
    let dir = TempDir::new().unwrap();
    convoctl(&dir)
        .arg("skins")
        .assert()
        .success()
        .stdout(predicate::str::contains("classic"))
        .stdout(predicate::str::contains("(default)"))
        .stdout(predicate::str::contains("terminal"))
        .stdout(predicate::str::contains("paper"));
}

#[test]
fn test_manifest_prints_entries() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "conv.json", EXPORT_WITH_ARTIFACT);

    convoctl(&dir)
        .args(["manifest", "--in", input.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"fileName\": \"notes.txt\""))
        .stdout(predicate::str::contains("\"tool\": \"convoctl\""));
}
