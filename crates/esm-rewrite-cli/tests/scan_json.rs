//! Integration tests for `esm-rewrite scan`.

use std::process::Command;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "esm-rewrite-cli", "--bin", "esm-rewrite", "--"]);
    cmd
}

#[test]
fn test_scan_json_lists_occurrences() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("main.js"),
        "import a from 'a';\nconst m = import('./m.js');\nconsole.log(import.meta.url);\n",
    )
    .unwrap();

    let output = cargo_bin()
        .args(["--json", "scan", "main.js", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run scan command");

    assert!(
        output.status.success(),
        "Command should succeed. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON");
    assert_eq!(json["ok"], true);
    assert!(json.get("error").is_none());

    let occurrences = json["occurrences"].as_array().unwrap();
    let kinds: Vec<_> = occurrences.iter().map(|o| o["kind"].as_str().unwrap()).collect();
    let texts: Vec<_> = occurrences.iter().map(|o| o["text"].as_str().unwrap()).collect();
    assert_eq!(kinds, ["static", "dynamic", "import.meta"]);
    assert_eq!(texts, ["a", "'./m.js'", "import.meta"]);
    assert_eq!(occurrences[0]["start"], 15);
    assert_eq!(occurrences[0]["end"], 16);
}

#[test]
fn test_scan_failure_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.js"), "import x from 'unterminated;\n").unwrap();

    let output = cargo_bin()
        .args(["--json", "scan", "broken.js", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run scan command");

    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["ok"], false);
    assert!(json["error"]["message"].as_str().is_some());
}

#[test]
fn test_version() {
    let output = cargo_bin()
        .arg("version")
        .output()
        .expect("Failed to run version command");

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("esm-rewrite "));
}
