//! Robot-mode end-to-end tests.

use serde_json::{json, Value};

use crate::common::cli::CliRunner;
use crate::common::fixtures::{png_bytes, TestRegistry};
use crate::common::init_test_logging;

fn runner(reg: &TestRegistry) -> CliRunner {
    init_test_logging();
    CliRunner::new().with_config(&reg.config_path)
}

fn add(cli: &CliRunner, args: &[&str]) -> Value {
    let mut full = vec!["add"];
    full.extend(args);
    let result = cli.run_robot(&full);
    result.assert_success();
    result.json()["device"].clone()
}

#[test]
fn robot_list_on_fresh_registry_is_empty_array() {
    let reg = TestRegistry::new();
    let cli = runner(&reg);

    cli.run_robot(&["list"])
        .assert_success()
        .assert_json_array_len("", 0);
    assert!(reg.config_path.exists(), "registry file should be created");
}

#[test]
fn robot_default_command_lists() {
    let reg = TestRegistry::new();
    let cli = runner(&reg);
    let result = cli.run_robot(&[]);
    result.assert_success();
    assert!(result.json().is_array());
}

#[test]
fn robot_add_list_remove_round_trip() {
    let reg = TestRegistry::new();
    let cli = runner(&reg);

    let device = add(
        &cli,
        &["--host", "10.0.0.5", "--alias", "Rack", "-u", "admin", "-p", "s3cret"],
    );
    let id = device["id"].as_str().unwrap().to_string();
    assert_eq!(device["alias"], "Rack");
    assert!(device.get("password").is_none());

    let list = cli.run_robot(&["list"]);
    list.assert_success()
        .assert_json_array_len("", 1)
        .assert_json_field("/0/id", &json!(id))
        .assert_json_field("/0/auth", &json!(true));
    assert!(!list.stdout.contains("s3cret"));

    cli.run_robot(&["remove", &id])
        .assert_success()
        .assert_json_field("/action", &json!("removed"));
    cli.run_robot(&["list"])
        .assert_success()
        .assert_json_array_len("", 0);
    assert!(reg.thumbnail_files().is_empty());
}

#[test]
fn robot_show_resolves_alias_and_builds_url() {
    let reg = TestRegistry::new();
    let cli = runner(&reg);
    add(&cli, &["--host", "10.0.0.5", "--alias", "Rack One", "-u", "ad min", "-p", "pw"]);
    add(&cli, &["--host", "10.0.0.6", "--alias", "Desk"]);

    cli.run_robot(&["show", "rack"])
        .assert_success()
        .assert_json_field("/device/host", &json!("10.0.0.5"))
        .assert_json_field("/device/auth", &json!(true))
        .assert_json_field("/url", &json!("http://10.0.0.5/"));
}

#[test]
fn robot_show_and_open_never_print_password() {
    let reg = TestRegistry::new();
    let cli = runner(&reg);
    add(&cli, &["--host", "10.0.0.5", "--alias", "Rack", "-u", "admin", "-p", "s3cret"]);

    let show = cli.run_robot(&["show", "rack"]);
    show.assert_success();
    assert!(!show.stdout.contains("s3cret"), "show leaked: {}", show.stdout);
    assert!(show.json()["device"].get("password").is_none());

    let open = cli.run_robot(&["open", "rack"]);
    open.assert_success()
        .assert_json_field("/url", &json!("http://10.0.0.5/"))
        .assert_json_field("/opened", &json!(false));
    assert!(!open.stdout.contains("s3cret"), "open leaked: {}", open.stdout);
}

#[test]
fn robot_update_replaces_fields() {
    let reg = TestRegistry::new();
    let cli = runner(&reg);
    let device = add(&cli, &["--host", "10.0.0.5", "--alias", "Old"]);
    let id = device["id"].as_str().unwrap();

    cli.run_robot(&["update", id, "--host", "10.0.0.9"])
        .assert_success()
        .assert_json_field("/device/host", &json!("10.0.0.9"))
        .assert_json_field("/device/id", &json!(id));

    let list = cli.run_robot(&["list"]);
    assert!(list.json()[0].get("alias").is_none());
}

#[test]
fn robot_errors_are_json_on_stderr() {
    let reg = TestRegistry::new();
    let cli = runner(&reg);

    let result = cli.run_robot(&["show", "ghost"]);
    result.assert_failure();
    assert_eq!(result.exit_code, 1);

    let error = result.stderr_json();
    assert_eq!(error["error"], true);
    assert!(error["message"].as_str().unwrap().contains("Device not found"));
    assert_eq!(error["recoverable"], true);
    assert!(error.get("suggestion").is_some());
}

#[test]
fn robot_thumbnail_set_and_path() {
    let reg = TestRegistry::new();
    let cli = runner(&reg);
    let device = add(&cli, &["--host", "10.0.0.5"]);
    let id = device["id"].as_str().unwrap();

    let image = reg.dir.path().join("shot.png");
    std::fs::write(&image, png_bytes(900, 600)).unwrap();

    cli.run_robot(&["thumbnail", "set", id, image.to_str().unwrap()])
        .assert_success()
        .assert_json_field("/ok", &json!(true));

    let path = cli.run_robot(&["thumbnail", "path", id]);
    path.assert_success();
    let path = path.json()["path"].as_str().unwrap().to_string();
    assert!(path.ends_with(&format!("{id}.jpg")));
    assert_eq!(reg.thumbnail_files(), vec![format!("{id}.jpg")]);

    cli.run_robot(&["thumbnail", "clear", id]).assert_success();
    cli.run_robot(&["thumbnail", "path", id])
        .assert_success()
        .assert_json_field("/path", &Value::Null);
}

#[test]
fn robot_thumbnail_set_rejects_unsupported_file() {
    let reg = TestRegistry::new();
    let cli = runner(&reg);
    let device = add(&cli, &["--host", "10.0.0.5"]);
    let id = device["id"].as_str().unwrap();
    let before = reg.thumbnail_files();

    let file = reg.dir.path().join("shot.bmp");
    std::fs::write(&file, b"BM").unwrap();

    let result = cli.run_robot(&["thumbnail", "set", id, file.to_str().unwrap()]);
    result.assert_failure();
    assert!(result.stderr_json()["message"]
        .as_str()
        .unwrap()
        .contains("Unsupported thumbnail type"));
    assert_eq!(reg.thumbnail_files(), before);
}

#[test]
fn robot_version_outputs_build_info() {
    let reg = TestRegistry::new();
    let cli = runner(&reg);
    cli.run_robot(&["version"])
        .assert_success()
        .assert_json_field("/version", &json!(env!("CARGO_PKG_VERSION")));
}
