//! Integration tests for `esm-rewrite rewrite`.

use serial_test::serial;
use std::path::Path;
use std::process::Command;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "esm-rewrite-cli", "--bin", "esm-rewrite", "--"]);
    cmd
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Project with one installed package and an entry module importing it.
fn fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "node_modules/lodash/package.json", r#"{ "main": "lodash.js" }"#);
    write(root, "node_modules/lodash/lodash.js", "export default {};\n");
    write(
        root,
        "src/main.js",
        "import _ from 'lodash';\nimport './app.css';\nimport('./page.js');\nimport 'left-pad';\n",
    );
    dir
}

fn fs_form(path: &Path) -> String {
    let canonical = dunce::canonicalize(path).unwrap();
    format!("/@fs/{}", canonical.to_string_lossy()).replace('\\', "/")
}

#[test]
#[serial]
fn test_rewrite_json_report() {
    let dir = fixture();

    let output = cargo_bin()
        .args(["--json", "rewrite", "src/main.js", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run rewrite command");

    assert!(
        output.status.success(),
        "Command should succeed. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("stdout should be valid JSON");

    assert_eq!(json["skipped"], false);
    assert_eq!(json["changed"], true);

    let lodash = fs_form(&dir.path().join("node_modules/lodash/lodash.js"));
    let expected = format!(
        "import _ from '{lodash}';\nimport './app.css.js';\nimport('./page.js');\nimport 'left-pad';\n"
    );
    assert_eq!(json["code"].as_str(), Some(expected.as_str()));

    let warnings = json["warnings"].as_array().expect("warnings should be an array");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0]["code"], "UNRESOLVED_BARE_SPECIFIER");
    assert!(warnings[0]["message"]
        .as_str()
        .unwrap()
        .contains("\"left-pad\""));

    assert!(json["resolve_ms"].as_f64().is_some());
    assert!(json["total_ms"].as_f64().is_some());
}

#[test]
#[serial]
fn test_rewrite_prints_code() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "theme.js", "import('./theme.scss');\n");

    let output = cargo_bin()
        .args(["rewrite", "theme.js", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run rewrite command");

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "import('./theme.scss.js');\n"
    );
}

#[test]
#[serial]
fn test_rewrite_skipped_importer() {
    let dir = fixture();
    write(dir.path(), "src/data.json", "{ \"import\": \"lodash\" }");

    let output = cargo_bin()
        .args(["--json", "rewrite", "src/data.json", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run rewrite command");

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["skipped"], true);
    assert_eq!(json["changed"], false);
    assert_eq!(json["code"], "{ \"import\": \"lodash\" }");
}

#[test]
#[serial]
fn test_rewrite_uses_config_file() {
    let dir = fixture();
    write(dir.path(), "esm-rewrite.json", r#"{ "fs_prefix": "/@modules/" }"#);
    write(dir.path(), "src/one.js", "import 'lodash';");

    let output = cargo_bin()
        .args(["--json", "rewrite", "src/one.js", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run rewrite command");

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let code = json["code"].as_str().unwrap();
    assert!(code.starts_with("import '/@modules/"), "unexpected code: {code}");
    assert!(code.ends_with("lodash.js';"));
}

#[test]
#[serial]
fn test_rewrite_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();

    let output = cargo_bin()
        .args(["rewrite", "nope.js", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run rewrite command");

    assert!(!output.status.success());
}

#[test]
#[serial]
fn test_rewrite_verbose_logs_stats() {
    let dir = fixture();

    let output = cargo_bin()
        .args(["-v", "rewrite", "src/main.js", "--cwd"])
        .arg(dir.path())
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run rewrite command");

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("rewrite stats"), "stderr: {stderr}");
}
