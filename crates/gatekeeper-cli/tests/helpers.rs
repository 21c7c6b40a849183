use gatekeeper_cli::{run_face, run_plate, Config};
use image::{Rgb, RgbImage};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

const ROSTER: &str = r#"[{"id": 3, "firstname": "Mariam", "lastname": "Fathy", "encodedimagedata": [0.1, 0.9]}]"#;

/// Config pointing every model at an empty directory.
fn config_without_models(dir: &Path) -> Config {
    let models = dir.join("models");
    let models_str = models.to_string_lossy().into_owned();
    let output = dir.join("annotated.jpg").to_string_lossy().into_owned();
    Config::from_lookup(move |key| match key {
        "GATEKEEPER_MODEL_DIR" => Some(models_str.clone()),
        "GATEKEEPER_OUTPUT_IMAGE" => Some(output.clone()),
        _ => None,
    })
}

fn write_image(dir: &Path) -> PathBuf {
    let path = dir.join("gate.png");
    RgbImage::from_pixel(32, 24, Rgb([90, 120, 150])).save(&path).unwrap();
    path
}

#[test]
fn face_missing_image_prints_empty_object() {
    let dir = tempfile::tempdir().unwrap();
    let out = run_face(&dir.path().join("missing.jpg"), ROSTER, &config_without_models(dir.path()));
    assert_eq!(out, "{}");
    assert!(serde_json::from_str::<serde_json::Value>(&out).unwrap().is_object());
}

#[test]
fn face_missing_models_prints_empty_object() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path());
    let out = run_face(&image, ROSTER, &config_without_models(dir.path()));
    assert_eq!(out, "{}");
}

#[test]
fn face_bad_roster_prints_empty_object() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path());
    let out = run_face(&image, "not json", &config_without_models(dir.path()));
    assert_eq!(out, "{}");
}

#[test]
fn face_undecodable_image_prints_empty_object() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.jpg");
    std::fs::write(&path, b"definitely not a jpeg").unwrap();
    let out = run_face(&path, ROSTER, &config_without_models(dir.path()));
    assert_eq!(out, "{}");
}

#[test]
fn face_zero_input_size_prints_empty_object() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path());
    let output = dir.path().join("annotated.jpg").to_string_lossy().into_owned();
    let config = Config::from_lookup(move |key| match key {
        "GATEKEEPER_FACE_INPUT_SIZE" => Some("0".to_string()),
        "GATEKEEPER_OUTPUT_IMAGE" => Some(output.clone()),
        _ => None,
    });
    assert_eq!(config.face_detector_options().input_size, 0);
    assert_eq!(run_face(&image, ROSTER, &config), "{}");
}

#[test]
fn plate_missing_image_prints_empty_string() {
    let dir = tempfile::tempdir().unwrap();
    let out = run_plate(&dir.path().join("missing.jpg"), &config_without_models(dir.path()));
    assert_eq!(out, "\"\"");
    assert_eq!(serde_json::from_str::<String>(&out).unwrap(), "");
}

#[test]
fn plate_missing_models_prints_empty_string() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path());
    let out = run_plate(&image, &config_without_models(dir.path()));
    assert_eq!(out, "\"\"");
}

#[test]
fn face_binary_requires_image_argument() {
    let status = Command::new(env!("CARGO_BIN_EXE_gatekeeper-face"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn plate_binary_requires_image_argument() {
    let status = Command::new(env!("CARGO_BIN_EXE_gatekeeper-plate"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn face_binary_prints_valid_json_for_missing_image() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = Command::new(env!("CARGO_BIN_EXE_gatekeeper-face"))
        .arg(dir.path().join("missing.jpg"))
        .env("GATEKEEPER_MODEL_DIR", dir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(ROSTER.as_bytes()).unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.trim(), "{}");
}

#[test]
fn plate_binary_prints_valid_json_for_missing_image() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_gatekeeper-plate"))
        .arg(dir.path().join("missing.jpg"))
        .env("GATEKEEPER_MODEL_DIR", dir.path())
        .stderr(Stdio::null())
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(serde_json::from_str::<String>(stdout.trim()).unwrap(), "");
}
