//! CLI integration tests

use std::path::Path;
use std::process::{Command, Output};

fn pct(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pct"))
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute command")
}

/// Write a small square-law NMOS table and a training config next to it
fn write_training_setup(dir: &Path) -> std::path::PathBuf {
    let mut csv = String::from("W,L,Vgs,Vds,id,gm\n");
    for &w in &[1e-6, 2e-6] {
        for i in 0..6 {
            for j in 0..5 {
                let vgs = 0.2 * i as f64;
                let vds = 0.3 * j as f64;
                let vov: f64 = (vgs - 0.4).max(0.0);
                let id = 1e-4 * w / 1e-6 * vov * vov * (1.0 + 0.1 * vds);
                let gm = if vov > 0.0 { 2.0 * id / vov } else { 0.0 };
                csv.push_str(&format!("{},{},{},{},{},{}\n", w, 1e-6, vgs, vds, id, gm));
            }
        }
    }
    let data_path = dir.join("nmos.csv");
    std::fs::write(&data_path, csv).unwrap();

    let config = format!(
        "device_name: nmos\n\
         data_path: {}\n\
         model_dir: {}\n\
         params_x: [W, L, Vgs, Vds]\n\
         params_y: [id, gm]\n\
         trafo_mask_y: [id, gm]\n\
         lambdas_y: [0.2, 0.2]\n\
         batch_size: 16\n\
         num_workers: 0\n\
         epochs: 2\n\
         hidden_layers: [8]\n",
        data_path.display(),
        dir.join("models").display()
    );
    let config_path = dir.join("nmos.yml");
    std::fs::write(&config_path, config).unwrap();
    config_path
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = pct(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("precept"), "Should show app name");
    for command in ["train", "predict", "inspect", "query", "columns"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = pct(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("pct"), "Should show binary name");
}

/// Test predict subcommand help
#[test]
fn test_predict_help() {
    let output = pct(&["predict", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Predict help should succeed");
    assert!(stdout.contains("--model"), "Should show model option");
    assert!(stdout.contains("--input"), "Should show input option");
    assert!(stdout.contains("--output"), "Should show output option");
}

/// Test format and url options
#[test]
fn test_global_options() {
    let output = pct(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("table"), "Should show table format");
    assert!(stdout.contains("json"), "Should show json format");
    assert!(stdout.contains("--url"), "Should show url option");
    assert!(stdout.contains("PCT_SERVER_URL"), "Should show env var");
}

/// Test missing required argument error handling
#[test]
fn test_missing_argument() {
    let output = pct(&["train"]);

    assert!(!output.status.success(), "Missing argument should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("required") || stderr.contains("error"),
        "Should show error about missing argument"
    );
}

/// Test that a missing configuration file fails cleanly
#[test]
fn test_train_missing_config() {
    let output = pct(&["train", "--config", "/nonexistent/precept.yml"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"));
}

/// Train, inspect and predict with the exported model
#[test]
fn test_train_inspect_predict() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_training_setup(dir.path());

    let output = pct(&["train", "--config", config_path.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "train failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let model_path = dir.path().join("models").join("nmos.mlp");
    assert!(model_path.is_file());
    assert!(dir.path().join("models").join("nmos.yml").is_file());

    let output = pct(&["inspect", "--model", model_path.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Vgs"));
    assert!(stdout.contains("checksum matches"));

    let input_path = dir.path().join("query.csv");
    std::fs::write(&input_path, "Vds,Vgs,L,W\n0.6,0.8,1e-6,1e-6\n").unwrap();
    let output = pct(&[
        "--format",
        "json",
        "predict",
        "--model",
        model_path.to_str().unwrap(),
        "--input",
        input_path.to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "predict failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let out: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(out["id"].as_array().unwrap().len(), 1);
    assert!(out["gm"][0].as_f64().unwrap().is_finite());
}
