//! Runs the built `pf` binary against model files on disk

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn pf(args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pf"));
    cmd.args(args).arg("--kernel").arg("mock").env("RUST_LOG", "off");
    for (key, value) in env {
        cmd.env(key, value);
    }
    cmd.output().unwrap()
}

fn model_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_validate_plate() {
    let dir = tempfile::tempdir().unwrap();
    let model = model_file(dir.path(), "plate.ron", r#"(builder: "plate")"#);

    let out = pf(&["test", arg(&model)], &[]);
    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("plate: 1 solid(s) OK"), "{stdout}");
    assert!(stdout.contains("Plate"));
}

#[test]
fn test_json_report() {
    let dir = tempfile::tempdir().unwrap();
    let model = model_file(dir.path(), "plate.ron", r#"(builder: "plate")"#);

    let out = pf(&["test", arg(&model), "--json"], &[("PLATE_WIDTH_MM", "120")]);
    assert_eq!(out.status.code(), Some(0));
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["model"], "plate");
    assert_eq!(report["solids"][0]["extents"][0], 120.0);
    assert_eq!(report["parameters"]["PLATE_WIDTH_MM"], 120.0);
}

#[test]
fn test_export_stl() {
    let dir = tempfile::tempdir().unwrap();
    let model = model_file(dir.path(), "plate.ron", r#"(builder: "plate")"#);
    let stl = dir.path().join("plate.stl");

    let out = pf(&["export-stl", arg(&model), arg(&stl)], &[]);
    assert_eq!(out.status.code(), Some(0));
    assert!(std::fs::metadata(&stl).unwrap().len() > 84);
}

#[test]
fn test_export_3mf_appends_extension() {
    let dir = tempfile::tempdir().unwrap();
    let model = model_file(dir.path(), "diffuser.ron", r#"(builder: "led_diffuser")"#);

    let out = pf(&["export-3mf", arg(&model), arg(&dir.path().join("diffuser"))], &[]);
    assert_eq!(out.status.code(), Some(0));
    assert!(dir.path().join("diffuser.3mf").exists());
}

#[test]
fn test_export_without_output_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let model = model_file(dir.path(), "plate.ron", r#"(builder: "plate")"#);

    let out = pf(&["export-stl", arg(&model)], &[]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("export-stl needs an output path"));
}

#[test]
fn test_malformed_override_fails_before_building() {
    let dir = tempfile::tempdir().unwrap();
    let model = model_file(dir.path(), "plate.ron", r#"(builder: "plate")"#);
    let stl = dir.path().join("plate.stl");

    let out = pf(
        &["export-stl", arg(&model), arg(&stl)],
        &[("PLATE_THICKNESS_MM", "thick")],
    );
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("PLATE_THICKNESS_MM"));
    assert!(!stl.exists());
}

#[test]
fn test_unwritable_output_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let model = model_file(dir.path(), "plate.ron", r#"(builder: "plate")"#);
    let stl = dir.path().join("no-such-dir").join("plate.stl");

    let out = pf(&["export-stl", arg(&model), arg(&stl)], &[]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn test_unknown_builder_and_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let model = model_file(dir.path(), "x.ron", r#"(builder: "teapot")"#);
    assert_eq!(pf(&["test", arg(&model)], &[]).status.code(), Some(1));

    let missing = dir.path().join("missing.ron");
    let out = pf(&["test", arg(&missing)], &[]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("missing.ron"));
}

#[test]
fn test_watch_stops_when_file_is_gone() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("gone.ron");
    let out = pf(&["watch", arg(&missing), "--interval-ms", "10"], &[]);
    assert_eq!(out.status.code(), Some(0));
}

#[test]
fn test_models_lists_registry() {
    let out = pf(&["models"], &[]);
    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&out.stdout);
    for name in [
        "plate",
        "led_diffuser",
        "muldenklappe",
        "kleinteile_einschub",
        "gravitrax_lift_clip",
        "tablet_holder",
    ] {
        assert!(stdout.contains(name), "{name}");
    }
    assert!(stdout.contains("PLATE_THICKNESS_MM"));
    assert!(stdout.contains("CLIP_NUB_RADIUS"));
}
