// End-to-end tests for the sheetmerge binary.
//
// Each test runs with an empty config directory and no API keys, so the
// oracle is always edit distance.
//
// Run with: cargo test -p sheetmerge-cli --test cli_tests

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::{tempdir, TempDir};

const CHUNCHEON: &str = "강원특별자치도춘천교육지원청";

fn sheetmerge(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sheetmerge"));
    cmd.current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env_remove("SHEETMERGE_SETTINGS")
        .env_remove("SHEETMERGE_GEMINI_KEY")
        .env_remove("GEMINI_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn rosters() -> TempDir {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("a.csv"),
        "이름,학교,전공\n김철수,서울대학교,물리학\n이영희,부산대학교,화학\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("b.csv"),
        "성명,대학교,전공분야\n김철수,서울대 학교,물리학\n이영희,부산 대학교,화학과\n박민수,연세대학교,수학\n",
    )
    .unwrap();
    dir
}

fn code(output: &Output) -> Option<i32> {
    output.status.code()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Assert stdout is exactly one JSON value.
fn single_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim())
        .unwrap_or_else(|e| panic!("stdout must be one JSON value: {e}\nstdout:\n{stdout}"))
}

#[test]
fn unify_generic_csv_dedups_on_keys() {
    let dir = rosters();
    let out = dir.path().join("merged.csv");

    let output = sheetmerge(dir.path())
        .args(["unify", "a.csv", "b.csv", "--format", "generic", "-k", "이름,학교", "-o"])
        .arg(&out)
        .output()
        .unwrap();
    assert_eq!(code(&output), Some(0), "stderr: {}", stderr(&output));

    let text = fs::read_to_string(&out).unwrap();
    let text = text.trim_start_matches('\u{feff}');
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "이름,학교,전공");
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("김철수,서울대학교"));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sheetmerge run report"));
    assert!(stdout.contains("rows emitted:    5"));
}

#[test]
fn unify_json_report_is_a_single_value() {
    let dir = rosters();

    let output = sheetmerge(dir.path())
        .args([
            "unify", "a.csv", "b.csv", "--format", "generic", "-k", "성명", "-o", "out.xlsx", "--json",
            "--report", "run.json",
        ])
        .output()
        .unwrap();
    assert_eq!(code(&output), Some(0), "stderr: {}", stderr(&output));

    let report = single_json(&output);
    assert_eq!(report["format"], "generic");
    assert_eq!(report["rows_in"], 5);
    assert_eq!(report["rows_after_dedup"], 3);
    assert_eq!(report["key_columns"], serde_json::json!(["이름"]));
    assert!(dir.path().join("out.xlsx").exists());

    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("run.json")).unwrap()).unwrap();
    assert_eq!(saved["rows_emitted"], report["rows_emitted"]);
}

#[test]
fn columns_lists_merged_groups() {
    let dir = rosters();

    let output = sheetmerge(dir.path())
        .args(["columns", "a.csv", "b.csv", "--json"])
        .output()
        .unwrap();
    assert_eq!(code(&output), Some(0), "stderr: {}", stderr(&output));

    let groups = single_json(&output);
    let groups = groups.as_array().unwrap();
    assert_eq!(groups.len(), 3);
    let name = groups.iter().find(|g| g["canonical"] == "이름").unwrap();
    assert_eq!(name["members"], serde_json::json!(["이름", "성명"]));
}

#[test]
fn school_resolves_region_prefix() {
    let dir = tempdir().unwrap();

    let output = sheetmerge(dir.path())
        .args(["school", "춘천 남산초", "--json"])
        .output()
        .unwrap();
    assert_eq!(code(&output), Some(0), "stderr: {}", stderr(&output));

    let answer = single_json(&output);
    assert_eq!(answer["authority"], CHUNCHEON);
    assert_eq!(answer["strategy"], "region_prefix");
    assert!(answer["school"].as_str().unwrap().ends_with("초등학교"));
}

#[test]
fn no_usable_input_exits_3() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("empty.csv"), "").unwrap();
    fs::write(dir.path().join("notes.pdf"), "%PDF").unwrap();

    let output = sheetmerge(dir.path())
        .args(["unify", "empty.csv", "notes.pdf", "missing.csv"])
        .output()
        .unwrap();
    assert_eq!(code(&output), Some(3));
    assert!(stderr(&output).contains("no usable table"));
    assert!(!dir.path().join("unified.xlsx").exists());
}

#[test]
fn broken_lookup_file_exits_4() {
    let dir = rosters();
    fs::write(dir.path().join("lookup.toml"), "version = [").unwrap();

    let output = sheetmerge(dir.path())
        .args(["unify", "a.csv", "--lookup", "lookup.toml"])
        .output()
        .unwrap();
    assert_eq!(code(&output), Some(4));
    assert!(stderr(&output).contains("lookup.toml"));
}

#[test]
fn forced_ai_without_key_exits_4_with_hint() {
    let dir = tempdir().unwrap();

    let output = sheetmerge(dir.path())
        .args(["school", "춘천공고", "--ai"])
        .output()
        .unwrap();
    assert_eq!(code(&output), Some(4));
    assert!(stderr(&output).contains("GEMINI_API_KEY"));
}

#[test]
fn unwritable_output_exits_5() {
    let dir = rosters();

    let output = sheetmerge(dir.path())
        .args(["unify", "a.csv", "-o", "no/such/dir/out.csv"])
        .output()
        .unwrap();
    assert_eq!(code(&output), Some(5));
}

#[test]
fn bad_settings_file_exits_4() {
    let dir = rosters();
    fs::write(dir.path().join("settings.json"), r#"{ "threshold": 300 }"#).unwrap();

    let output = sheetmerge(dir.path())
        .args(["--settings", "settings.json", "columns", "a.csv"])
        .output()
        .unwrap();
    assert_eq!(code(&output), Some(4));
}

#[test]
fn settings_file_supplies_defaults() {
    let dir = rosters();
    fs::write(
        dir.path().join("settings.json"),
        "{\n  // roster merges\n  \"format\": \"generic\"\n}",
    )
    .unwrap();

    let output = sheetmerge(dir.path())
        .args(["--settings", "settings.json", "unify", "a.csv", "b.csv", "-o", "out.csv", "--json"])
        .output()
        .unwrap();
    assert_eq!(code(&output), Some(0), "stderr: {}", stderr(&output));
    assert_eq!(single_json(&output)["format"], "generic");
}
