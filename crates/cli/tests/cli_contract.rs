use assert_cmd::cargo::cargo_bin_cmd;
use pdf_engine::testing::build_pdf;
use predicates::prelude::*;
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;

fn fixture(dir: &TempDir, name: &str, pages: &[(i64, i64)]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, build_pdf(pages)).expect("fixture should be written");
    path
}

fn stdout_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("stdout should contain valid json")
}

#[test]
fn info_emits_stable_json_contract() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = fixture(&temp, "small.pdf", &[(200, 300), (400, 500)]);

    let output = cargo_bin_cmd!("pdf-viewer-cli")
        .arg("info")
        .arg(&file)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value = stdout_json(&output);
    assert_eq!(value["page_count"], 2);
    assert_eq!(value["first_page_size_pt"]["width"], 200.0);
    assert_eq!(value["first_page_size_pt"]["height"], 300.0);
}

#[test]
fn render_writes_png_file() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = fixture(&temp, "medium.pdf", &[(100, 100), (120, 80)]);
    let output_path = temp.path().join("out/page.png");

    cargo_bin_cmd!("pdf-viewer-cli")
        .arg("render")
        .arg(&file)
        .arg("--page")
        .arg("2")
        .arg("--scale")
        .arg("2")
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success();

    let image = image::open(&output_path).expect("render should be readable image");
    assert_eq!(image.width(), 240);
    assert_eq!(image.height(), 160);
}

#[test]
fn render_rejects_page_zero() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = fixture(&temp, "one.pdf", &[(100, 100)]);

    cargo_bin_cmd!("pdf-viewer-cli")
        .arg("render")
        .arg(&file)
        .arg("--page")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("1-based"));
}

#[test]
fn simulate_reports_host_commands() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = fixture(&temp, "three.pdf", &[(100, 200), (100, 200), (100, 200)]);

    let output = cargo_bin_cmd!("pdf-viewer-cli")
        .arg("simulate")
        .arg(&file)
        .arg("--width")
        .arg("220")
        .arg("--height")
        .arg("400")
        .arg("--config")
        .arg(r#"{"fitPolicy":0}"#)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value = stdout_json(&output);
    assert_eq!(value["pageCount"], 3);
    assert_eq!(value["currentPage"], 1);

    let scale = value["scale"].as_f64().expect("scale should be a number");
    assert!((scale - 220.0 / 120.0).abs() < 1e-9);

    let commands = value["commands"].as_array().expect("commands should be an array");
    assert_eq!(commands[0], serde_json::json!({"command": "present", "pages": [0, 1, 2]}));
    let load_complete = serde_json::json!({
        "type": "loadComplete",
        "pageCount": 3,
        "width": 100.0,
        "height": 200.0,
    });
    assert!(commands.iter().any(|command| command["event"] == load_complete));
}

#[test]
fn simulate_prints_wire_messages() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = fixture(&temp, "pages.pdf", &[(100, 100), (100, 100), (100, 100)]);

    cargo_bin_cmd!("pdf-viewer-cli")
        .arg("simulate")
        .arg(&file)
        .arg("--width")
        .arg("100")
        .arg("--height")
        .arg("100")
        .arg("--config")
        .arg(r#"{"fitPolicy":-1,"margin":0}"#)
        .arg("--scroll")
        .arg("100")
        .arg("--messages")
        .assert()
        .success()
        .stdout(predicate::str::contains("pageChanged|1|3"))
        .stdout(predicate::str::contains("loadComplete|3|100|100|"))
        .stdout(predicate::str::contains("pageChanged|2|3"));
}

#[test]
fn info_fails_for_missing_file() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    cargo_bin_cmd!("pdf-viewer-cli")
        .arg("info")
        .arg(temp.path().join("missing.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn info_fails_for_invalid_pdf() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let path = temp.path().join("invalid.pdf");
    std::fs::write(&path, b"not a pdf").expect("fixture should be written");

    cargo_bin_cmd!("pdf-viewer-cli")
        .arg("info")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open PDF"));
}

#[test]
fn simulate_reports_encrypted_documents() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let path = temp.path().join("encrypted.pdf");
    let mut bytes = build_pdf(&[(100, 100)]);
    bytes.extend_from_slice(b"\n% /Encrypt\n");
    std::fs::write(&path, bytes).expect("fixture should be written");

    cargo_bin_cmd!("pdf-viewer-cli")
        .arg("simulate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Password required or incorrect password."));
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("pdf-viewer-cli")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
