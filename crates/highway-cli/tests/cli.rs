//! CLI command integration tests.
//! Each test writes its config and database under its own temp directory.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CONFIG: &str = "[memory]\nvector_dim = 4\n\n[assets]\nsegmenter = \"char\"\n";

const POEM: &str = "上山，下山。\n山水。";

fn config_path(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("highway.toml");
    std::fs::write(&path, content).unwrap();
    path
}

fn highway_cmd(dir: &TempDir, db: &str) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("highway").unwrap();
    cmd.arg("--config")
        .arg(config_path(dir, CONFIG))
        .arg("--db")
        .arg(dir.path().join(db))
        .args(["--seed", "42"]);
    cmd
}

fn stats(dir: &TempDir, db: &str) -> String {
    let output = highway_cmd(dir, db).arg("stats").output().unwrap();
    assert!(output.status.success());
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn extract_stat_value(output: &str, prefix: &str) -> String {
    output
        .lines()
        .find(|l| l.starts_with(prefix))
        .unwrap_or_else(|| panic!("stat line starting with '{prefix}' not found in output:\n{output}"))
        .split_whitespace()
        .last()
        .unwrap()
        .to_string()
}

#[test]
fn stats_fresh_db() {
    let dir = TempDir::new().unwrap();
    highway_cmd(&dir, "mem.db")
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("metas:        0"))
        .stdout(predicate::str::contains("edges:        0"))
        .stdout(predicate::str::contains("vector_dim:   4"));
}

#[test]
fn write_then_stats() {
    let dir = TempDir::new().unwrap();
    highway_cmd(&dir, "mem.db")
        .args(["write", "上山下山"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote 4 units"));

    let out = stats(&dir, "mem.db");
    assert_ne!(extract_stat_value(&out, "metas:"), "0");
    assert_ne!(extract_stat_value(&out, "edges:"), "0");
}

#[test]
fn repeated_writes_crystallize_across_runs() {
    let dir = TempDir::new().unwrap();
    for _ in 0..2 {
        highway_cmd(&dir, "mem.db")
            .args(["write", "上山"])
            .assert()
            .success();
    }

    let out = stats(&dir, "mem.db");
    assert_eq!(extract_stat_value(&out, "crystallized:"), "1");
    assert_eq!(extract_stat_value(&out, "max_level:"), "1");
}

#[test]
fn recite_file_then_query() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("poem.txt");
    std::fs::write(&input, POEM).unwrap();

    highway_cmd(&dir, "mem.db")
        .arg("recite")
        .arg("--file")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("recited 14 units"));

    highway_cmd(&dir, "mem.db")
        .args(["query", "上"])
        .assert()
        .success()
        .stdout(predicate::str::contains("short_sentence"))
        .stdout(predicate::str::contains("上山，"));
}

#[test]
fn query_unknown_word() {
    let dir = TempDir::new().unwrap();
    highway_cmd(&dir, "mem.db")
        .args(["write", "上山"])
        .assert()
        .success();

    highway_cmd(&dir, "mem.db")
        .args(["query", "水"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(no memories found)"));
}

#[test]
fn blank_text_fails() {
    let dir = TempDir::new().unwrap();
    highway_cmd(&dir, "mem.db")
        .args(["write", "，。"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to write text"));
}

#[test]
fn recite_needs_text_or_file() {
    let dir = TempDir::new().unwrap();
    highway_cmd(&dir, "mem.db").arg("recite").assert().failure();
}

#[test]
fn export_import_roundtrip() {
    let dir = TempDir::new().unwrap();
    highway_cmd(&dir, "a.db")
        .args(["recite", POEM])
        .assert()
        .success();

    let export_path = dir.path().join("export.json");
    highway_cmd(&dir, "a.db")
        .arg("export")
        .arg(&export_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("exported to"));
    assert!(export_path.exists(), "export file should exist");

    highway_cmd(&dir, "b.db")
        .arg("import")
        .arg(&export_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("imported from"));

    assert_eq!(stats(&dir, "a.db"), stats(&dir, "b.db"));
}

#[test]
fn import_rejects_garbage() {
    let dir = TempDir::new().unwrap();
    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, "{\"version\": \"1\"").unwrap();

    highway_cmd(&dir, "mem.db")
        .arg("import")
        .arg(&bad)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to import JSON"));
}

#[test]
fn memory_backend_keeps_nothing() {
    let dir = TempDir::new().unwrap();
    let config = config_path(
        &dir,
        "[memory]\nvector_dim = 4\n\n[storage]\nbackend = \"memory\"\n",
    );
    let run = |args: &[&str]| {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("highway").unwrap();
        cmd.arg("--config").arg(&config).args(args).assert().success()
    };

    run(&["write", "上山"]);
    run(&["stats"]).stdout(predicate::str::contains("metas:        0"));
    assert!(!dir.path().join("highway.db").exists());
}

#[test]
fn vector_dim_mismatch_is_rejected() {
    let dir = TempDir::new().unwrap();
    highway_cmd(&dir, "mem.db")
        .args(["write", "上山"])
        .assert()
        .success();

    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("highway").unwrap();
    cmd.arg("--config")
        .arg(config_path(&dir, "[memory]\nvector_dim = 8\n"))
        .arg("--db")
        .arg(dir.path().join("mem.db"))
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("vector_dim 4"));
}

#[test]
fn segmenter_flag_overrides_config() {
    let dir = TempDir::new().unwrap();
    highway_cmd(&dir, "mem.db")
        .args(["--segmenter", "jieba", "write", "我们中出了一个叛徒"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote"));

    highway_cmd(&dir, "mem.db")
        .args(["--segmenter", "jieba", "query", "叛徒"])
        .assert()
        .success()
        .stdout(predicate::str::contains("叛徒"));
}

#[test]
fn unknown_segmenter_is_rejected() {
    let dir = TempDir::new().unwrap();
    highway_cmd(&dir, "mem.db")
        .args(["--segmenter", "ltp", "stats"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown segmenter"));
}
