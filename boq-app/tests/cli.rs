use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

const SNAPSHOT: &str = r#"{
    "unit": "in",
    "entities": [
        {"kind": "polyline", "layer": "PLANNER", "is_closed": true, "vertices": [
            {"position": [0, 0]}, {"position": [240, 0]},
            {"position": [240, 240]}, {"position": [0, 240]}
        ]},
        {"kind": "placement", "layer": "FURN",
         "block": {"raw_name": "Chair"}, "insert": [24, 24],
         "visibility_state": "ARMLESS",
         "definition": [{"kind": "line", "start": [0, 0], "end": [24, 18], "layer": "0"}]},
        {"kind": "placement", "layer": "FURN",
         "block": {"raw_name": "Chair"}, "insert": [48, 24],
         "visibility_state": "ARMS",
         "definition": [{"kind": "line", "start": [0, 0], "end": [24, 18], "layer": "0"}]}
    ],
    "labels": [{"anchor": [120, 120], "content": "Reception"}]
}"#;

fn boq(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("boq").expect("binary exists");
    cmd.current_dir(workdir).env_remove("BOQ_CONFIG");
    cmd
}

fn items(body: &str) -> Vec<Value> {
    let parsed: Value = serde_json::from_str(body).expect("valid json");
    parsed["items"].as_array().cloned().expect("items array")
}

#[test]
fn prints_records_to_stdout() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let input = dir.path().join("drawing.json");
    fs::write(&input, SNAPSHOT).expect("write snapshot");

    let assert = boq(dir.path()).arg("--input").arg(&input).assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let items = items(&stdout);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["typeName"], "Chair");
    assert_eq!(items[0]["zoneName"], "Reception");
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(items[0]["lengthFt"], "2");
    assert_eq!(items[0]["widthFt"], "1.5");
    assert_eq!(items[1]["typeName"], "PLANNER");
}

#[test]
fn group_by_visibility_splits_chairs() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let input = dir.path().join("drawing.json");
    let output = dir.path().join("records.json");
    fs::write(&input, SNAPSHOT).expect("write snapshot");

    boq(dir.path())
        .args(["--group-by", "visibility", "--compact"])
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let body = fs::read_to_string(&output).expect("read output");
    let chairs = items(&body)
        .into_iter()
        .filter(|item| item["typeName"] == "Chair")
        .collect::<Vec<_>>();
    assert_eq!(chairs.len(), 2);
    assert!(chairs.iter().all(|item| item["quantity"] == 1));
    assert_eq!(body.trim_end().lines().count(), 1);
}

#[test]
fn config_file_changes_planner_layer() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let input = dir.path().join("drawing.json");
    let config = dir.path().join("boq.toml");
    fs::write(&input, SNAPSHOT).expect("write snapshot");
    fs::write(&config, "[engine]\nplanner_layer = \"A-AREA\"\n").expect("write config");

    let assert = boq(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("--input")
        .arg(&input)
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    assert!(
        items(&stdout)
            .iter()
            .all(|item| item["zoneName"] == "Unmarked Area")
    );
}

#[test]
fn missing_input_fails() {
    let dir = tempfile::tempdir().expect("create temp dir");
    boq(dir.path())
        .arg("--input")
        .arg(dir.path().join("absent.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.json"));
}

#[test]
fn snapshot_without_unit_fails() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let input = dir.path().join("drawing.json");
    fs::write(&input, r#"{"entities": []}"#).expect("write snapshot");
    boq(dir.path())
        .arg("--input")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("linear unit"));
}

#[test]
fn broken_config_is_reported_and_defaults_apply() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let input = dir.path().join("drawing.json");
    let config = dir.path().join("broken.toml");
    fs::write(&input, SNAPSHOT).expect("write snapshot");
    fs::write(&config, "[engine\nplanner_layer = ").expect("write config");

    let assert = boq(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("--input")
        .arg(&input)
        .assert()
        .success()
        .stderr(predicate::str::contains("broken.toml"));
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    assert_eq!(items(&stdout)[0]["zoneName"], "Reception");
}
