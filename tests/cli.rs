use assert_cmd::prelude::*;
use color_eyre::Result;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

const LAB: &str = r#"
[devices.rack-pdu]
kind = "pdu"
host = "10.0.0.20"
vendor = "raritan"

[devices.switch]
kind = "dli"
ip = "10.0.0.30"
username = "admin"
password = "secret"
outlet_number = 2

[devices.localhost]
kind = "system"
"#;

fn lab_file() -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(LAB.as_bytes())?;
    Ok(file)
}

fn labpower() -> Result<Command> {
    let mut cmd = Command::cargo_bin("labpower")?;
    cmd.env_remove("LABPOWER_CONFIG").env_remove("RUST_LOG");
    Ok(cmd)
}

#[test]
fn test_help_without_command() -> Result<()> {
    let output = labpower()?.output()?;
    assert!(output.status.success(), "Stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage: labpower [OPTIONS] [COMMAND]"), "Missing usage text");
    for command in ["list", "on", "off", "cycle", "set", "states"] {
        assert!(stdout.contains(command), "Missing {} command", command);
    }
    Ok(())
}

#[test]
fn test_list_devices() -> Result<()> {
    let lab = lab_file()?;
    let output = labpower()?.arg("--config").arg(lab.path()).arg("list").output()?;
    assert!(output.status.success(), "Stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec!["localhost\tsystem", "rack-pdu\tpdu", "switch\tdli"]);
    Ok(())
}

#[test]
fn test_config_from_environment() -> Result<()> {
    let lab = lab_file()?;
    let output = labpower()?.env("LABPOWER_CONFIG", lab.path()).arg("list").output()?;
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("rack-pdu\tpdu"));
    Ok(())
}

#[test]
fn test_unknown_device() -> Result<()> {
    let lab = lab_file()?;
    let output = labpower()?
        .arg("--config")
        .arg(lab.path())
        .args(["on", "nope"])
        .output()?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown device 'nope'"));
    Ok(())
}

#[test]
fn test_missing_config_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let output = labpower()?
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("list")
        .output()?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read config file"));
    Ok(())
}

#[test]
fn test_illegal_state_is_rejected_before_any_request() -> Result<()> {
    let lab = lab_file()?;
    let output = labpower()?
        .arg("--config")
        .arg(lab.path())
        .args(["set", "reset", "switch"])
        .output()?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unsupported state 'reset' for dli"));
    Ok(())
}

#[test]
fn test_states_requires_system_device() -> Result<()> {
    let lab = lab_file()?;
    let output = labpower()?
        .arg("--config")
        .arg(lab.path())
        .args(["states", "rack-pdu"])
        .output()?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("system devices only"));
    Ok(())
}
