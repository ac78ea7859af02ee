//! Integration tests for the `comfyflow` command.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const FLUX_INVENTORY: &str = r#"{
    "diffusion_models": ["flux1-dev.safetensors", "flux1-schnell.safetensors"],
    "text_encoders": ["clip_l.safetensors", "t5xxl_fp16.safetensors"],
    "vae": ["ae.safetensors"]
}"#;

/// A command isolated from the user's configuration files and environment.
fn comfyflow(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("comfyflow").unwrap();
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env_remove("COMFYUI_BASE_URL")
        .env_remove("COMFYUI_TIMEOUT_SECS")
        .env_remove("COMFYUI_API_KEY");
    cmd
}

fn write_inventory(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("inventory.json");
    fs::write(&path, content).unwrap();
    path
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_models_json() {
    let dir = TempDir::new().unwrap();
    let output = comfyflow(&dir).args(["models", "--json"]).output().unwrap();
    assert!(output.status.success());

    let models = stdout_json(&output);
    let dev = models
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["filename"] == "flux1-dev.safetensors")
        .unwrap();
    assert_eq!(dev["modelFamily"], "FLUX");
    assert_eq!(dev["variant"], "dev");
}

#[test]
fn test_models_variant_filter_is_priority_ordered() {
    let dir = TempDir::new().unwrap();
    let output = comfyflow(&dir).args(["models", "--variant", "schnell", "--json"]).output().unwrap();
    let models = stdout_json(&output);
    let priorities: Vec<u64> =
        models.as_array().unwrap().iter().map(|m| m["priority"].as_u64().unwrap()).collect();
    assert!(!priorities.is_empty());
    assert!(priorities.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_models_unknown_variant() {
    let dir = TempDir::new().unwrap();
    comfyflow(&dir)
        .args(["models", "--variant", "does-not-exist"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown variant"));
}

#[test]
fn test_resolve() {
    let dir = TempDir::new().unwrap();
    let output = comfyflow(&dir).args(["resolve", "flux1-dev.safetensors", "--json"]).output().unwrap();
    assert!(output.status.success());
    let resolved = stdout_json(&output);
    assert_eq!(resolved["matchedFilename"], "flux1-dev.safetensors");
    assert_eq!(resolved["matchMode"], "exact");
}

#[test]
fn test_resolve_case_sensitivity() {
    let dir = TempDir::new().unwrap();
    comfyflow(&dir)
        .args(["resolve", "FLUX1-DEV.SAFETENSORS"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No registered model matches"));

    comfyflow(&dir)
        .args(["resolve", "FLUX1-DEV.SAFETENSORS", "--case-insensitive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("flux1-dev.safetensors"));
}

#[test]
fn test_resolve_filters() {
    let dir = TempDir::new().unwrap();
    comfyflow(&dir)
        .args(["resolve", "flux1-dev.safetensors", "--priority", "1", "--family", "FLUX"])
        .assert()
        .success();
    comfyflow(&dir)
        .args(["resolve", "flux1-dev.safetensors", "--priority", "2"])
        .assert()
        .code(1);
}

#[test]
fn test_supported() {
    let dir = TempDir::new().unwrap();
    let output = comfyflow(&dir).args(["supported", "--json"]).output().unwrap();
    let supported = stdout_json(&output);
    assert_eq!(supported["fluxVariants"], serde_json::json!(["dev", "krea", "schnell", "kontext"]));
    assert!(supported["routes"].as_array().unwrap().iter().any(|r| r["builder"] == "sd35"));
}

#[test]
fn test_build_offline() {
    let dir = TempDir::new().unwrap();
    let inventory = write_inventory(&dir, FLUX_INVENTORY);

    let output = comfyflow(&dir)
        .args(["build", "flux-schnell", "--prompt", "a red fox", "--seed", "7", "--inventory"])
        .arg(&inventory)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let graph = stdout_json(&output);
    let nodes = graph.as_object().unwrap();
    let save = nodes.values().find(|n| n["class_type"] == "SaveImage").unwrap();
    assert_eq!(save["inputs"]["filename_prefix"], "comfyflow");
    let noise = nodes.values().find(|n| n["class_type"] == "RandomNoise").unwrap();
    assert_eq!(noise["inputs"]["noise_seed"], 7);
}

#[test]
fn test_build_with_overrides_and_bindings() {
    let dir = TempDir::new().unwrap();
    let inventory = write_inventory(&dir, FLUX_INVENTORY);

    let output = comfyflow(&dir)
        .args(["build", "flux1-dev.safetensors", "-p", "a fox", "--bindings", "--set", "steps=12"])
        .arg("--inventory")
        .arg(&inventory)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let built = stdout_json(&output);
    let target = &built["bindings"]["steps"][0];
    let node = target["node"].as_str().unwrap();
    assert_eq!(built["graph"][node]["inputs"]["steps"], 12);
    assert!(!built["outputs"].as_array().unwrap().is_empty());
}

#[test]
fn test_build_writes_output_file() {
    let dir = TempDir::new().unwrap();
    let inventory = write_inventory(&dir, FLUX_INVENTORY);
    let out = dir.path().join("prompt.json");

    comfyflow(&dir)
        .args(["build", "flux-dev", "-p", "a fox", "--inventory"])
        .arg(&inventory)
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("Built"));

    let graph: Value = serde_json::from_str(&fs::read_to_string(out).unwrap()).unwrap();
    assert_eq!(graph["1"]["class_type"], "DualCLIPLoader");
}

#[test]
fn test_build_missing_component_is_engine_error() {
    let dir = TempDir::new().unwrap();
    let inventory = write_inventory(&dir, r#"{"diffusion_models": ["flux1-dev.safetensors"]}"#);

    comfyflow(&dir)
        .args(["build", "flux-dev", "-p", "a fox", "--inventory"])
        .arg(&inventory)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Workflow/MISSING_COMPONENT"));
}

#[test]
fn test_build_missing_model_lists_expected_files() {
    let dir = TempDir::new().unwrap();
    let inventory = write_inventory(&dir, r#"{"checkpoints": ["other.safetensors"]}"#);

    comfyflow(&dir)
        .args(["build", "flux-dev", "-p", "a fox", "--inventory"])
        .arg(&inventory)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("MODEL_NOT_FOUND"))
        .stderr(predicate::str::contains("flux1-dev.safetensors"));
}

#[test]
fn test_build_bad_override_is_usage_error() {
    let dir = TempDir::new().unwrap();
    let inventory = write_inventory(&dir, FLUX_INVENTORY);

    comfyflow(&dir)
        .args(["build", "flux-dev", "-p", "a fox", "--set", "nonsense", "--inventory"])
        .arg(&inventory)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("expected NAME=VALUE"));
}

#[test]
fn test_build_rejects_out_of_range_override() {
    let dir = TempDir::new().unwrap();
    let inventory = write_inventory(&dir, FLUX_INVENTORY);

    comfyflow(&dir)
        .args(["build", "flux-dev", "-p", "a fox", "--set", "width=0", "--inventory"])
        .arg(&inventory)
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Workflow/INVALID_PARAMS"))
        .stderr(predicate::str::contains("width"));
}

#[test]
fn test_invalid_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("bad.toml");
    fs::write(&config, "[backend]\ntimeout_secs = 0\n").unwrap();

    comfyflow(&dir)
        .args(["check", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("INVALID_CONFIG"));
}
