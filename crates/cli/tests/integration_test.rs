use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn theta(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_theta"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run theta")
}

fn write_config(dir: &TempDir, extra_strategy: &str) -> std::path::PathBuf {
    let path = dir.path().join("Theta.toml");
    let state = dir.path().join("state");
    std::fs::write(
        &path,
        format!(
            "[strategy]\nunderlying = \"NIFTY\"\n{extra_strategy}\n\n[state]\ndir = {:?}\n",
            state.display().to_string()
        ),
    )
    .unwrap();
    path
}

#[test]
fn shipped_presets_are_valid() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/Theta.toml");
    let output = theta(&root, &["check-config"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let shown: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown["strategy"]["underlying"], "NIFTY");

    let output = theta(&root, &["--profile", "banknifty", "check-config"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let shown: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown["strategy"]["underlying"], "BANKNIFTY");
    assert_eq!(shown["strategy"]["trade_weekdays"][0], "Wed");

    let output = theta(&root, &["--profile", "thursday", "check-config"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let shown: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown["strategy"]["underlying"], "NIFTY");
    assert_eq!(shown["strategy"]["trade_weekdays"], serde_json::json!(["Thu"]));
    assert_eq!(shown["strategy"]["lots"], 10);
    assert_eq!(shown["strategy"]["lot_size"], 50);
    assert_eq!(shown["strategy"]["entry_start"], "10:00:00");
}

#[test]
fn invalid_config_exits_with_code_two() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "spread_width = 0");

    let output = theta(&config, &["run"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(!dir.path().join("state").exists());
}

#[test]
fn unknown_profile_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "");

    let output = theta(&config, &["--profile", "nope", "check-config"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn run_on_a_non_trading_day_is_a_quiet_success() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "trade_weekdays = [\"Tue\"]");

    // Monday noon in India.
    let output = theta(&config, &["run", "--at", "2026-10-19T06:30:00Z"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(!dir.path().join("state").join("NIFTY").exists());
}

#[test]
fn close_without_an_open_position_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "");

    let output = theta(&config, &["close", "--date", "2026-10-20", "--exit-credit", "1.5"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!dir.path().join("state").join("NIFTY").join("2026-10-20.json").exists());
}

#[test]
fn status_and_summary_on_empty_state() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "");

    let output = theta(&config, &["status", "--date", "2026-10-20"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("no record"));

    let output = theta(&config, &["summary", "--json"]);
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["trades"], 0);
}
