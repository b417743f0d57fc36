use assert_cmd::prelude::*;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

const CONFIG_VARS: &[&str] = &[
    "WEB_PROVIDER_URI",
    "CONTRACT_ADDRESS",
    "ECA_ABI_PATH",
    "ECA_CHAIN",
    "ECA_LOG_LEVEL",
    "ECA_RECEIPT_TIMEOUT_SECS",
    "ECA_POLL_INTERVAL_MS",
    "RUST_LOG",
];

fn studio(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("eca-studio").expect("binary");
    cmd.current_dir(dir);
    for var in CONFIG_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// Same environment as [`studio`], as an `assert_cmd` command so stdin can be fed.
fn studio_session(dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("eca-studio").expect("binary");
    cmd.current_dir(dir);
    for var in CONFIG_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn token_id_prints_layout() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let output = studio(dir.path())
        .args(["token-id", "--rule", "30", "--state", "4", "--size", "2"])
        .output()?;
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("token id    269826 (0x41e02)"), "{out}");
    assert!(out.contains("draw size   3"), "{out}");
    assert!(out.contains("state mask  0x7"), "{out}");
    assert!(out.contains("state bits  100"), "{out}");
    Ok(())
}

#[test]
fn token_id_json_covers_widest_size_class() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let output = studio(dir.path())
        .args([
            "token-id",
            "--rule",
            "255",
            "--state",
            "0x7FFFFFFF",
            "--size",
            "5",
            "--json",
        ])
        .output()?;
    assert!(output.status.success(), "{}", stderr(&output));
    let preview: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(preview["token_id"], 0x7FFF_FFFF_FF05u64);
    assert_eq!(preview["draw_size"], 31);
    assert_eq!(preview["state_bits"], "1".repeat(31));
    Ok(())
}

#[test]
fn invalid_parameters_report_rule_first() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let output = studio(dir.path())
        .args(["token-id", "--rule", "256", "--state", "-1", "--size", "0"])
        .output()?;
    assert!(!output.status.success());
    assert!(stderr(&output).contains("rule 256"), "{}", stderr(&output));

    let output = studio(dir.path())
        .args(["token-id", "--rule", "30", "--state", "-1", "--size", "0"])
        .output()?;
    assert!(!output.status.success());
    assert!(stderr(&output).contains("non-negative"), "{}", stderr(&output));
    Ok(())
}

#[test]
fn decode_splits_fields() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let output = studio(dir.path()).args(["decode", "269826"]).output()?;
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("rule        30"), "{out}");
    assert!(out.contains("size class  2"), "{out}");
    assert!(out.contains("state bits  100"), "{out}");

    let output = studio(dir.path()).args(["decode", "0x0107"]).output()?;
    assert!(output.status.success());
    assert!(stdout(&output).contains("size class 7 is outside 1..=5"));
    Ok(())
}

#[test]
fn rpc_commands_require_configuration() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let output = studio(dir.path()).arg("accounts").output()?;
    assert!(!output.status.success());
    assert!(stderr(&output).contains("missing node endpoint"), "{}", stderr(&output));
    Ok(())
}

#[test]
fn dotenv_selects_memory_chain() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    std::fs::write(dir.path().join(".env"), "# local session\nECA_CHAIN=memory\n")?;
    let output = studio(dir.path()).arg("accounts").output()?;
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert_eq!(out.lines().count(), 3);
    assert!(out.contains("0x0101010101010101010101010101010101010101"), "{out}");
    Ok(())
}

#[test]
fn memory_price_table() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let output = studio(dir.path()).args(["--chain", "memory", "price"]).output()?;
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("base price 0.01 ether"), "{out}");
    assert!(out.contains("size 1: minimum 0.01 ether"), "{out}");
    assert!(out.contains("size 5: minimum 0.25 ether"), "{out}");

    let output = studio(dir.path())
        .args(["--chain", "memory", "price", "--size", "3"])
        .output()?;
    assert!(stdout(&output).contains("size 3: minimum 0.09 ether"));
    Ok(())
}

#[test]
fn memory_generate_prints_receipt() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let output = studio(dir.path())
        .args([
            "--chain", "memory", "generate", "--rule", "30", "--state", "4", "--size", "2",
        ])
        .output()?;
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    let (first, receipt) = out.split_once('\n').expect("two sections");
    assert_eq!(first, "Generating rule 30 state 100");
    let receipt: serde_json::Value = serde_json::from_str(receipt)?;
    assert_eq!(receipt["status"], "0x1");
    assert_eq!(receipt["blockNumber"], "0x1");
    Ok(())
}

#[test]
fn underpayment_is_refused() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let output = studio(dir.path())
        .args([
            "--chain", "memory", "generate", "--rule", "30", "--state", "4", "--size", "2",
            "--payment", "0.039",
        ])
        .output()?;
    assert!(!output.status.success());
    assert!(stderr(&output).contains("below the required"), "{}", stderr(&output));
    Ok(())
}

#[test]
fn ui_shell_session() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let output = studio_session(dir.path())
        .args(["--chain", "memory", "ui"])
        .write_stdin("preview 30 4 2\nprice 3\ngenerate 30 4 2\ndraw 269826\nbogus\n:quit\n")
        .output()?;
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Generating rule 30 state 100"), "{out}");
    assert!(out.contains("token id 269826"), "{out}");
    assert!(out.contains("size 3: minimum 0.09 ether"), "{out}");
    assert!(out.contains("minted token 269826 in block 1"), "{out}");
    assert!(out.contains("Drawing 269826"), "{out}");
    assert!(out.contains("rule 30"), "{out}");
    assert!(out.contains("unrecognized input"), "{out}");
    Ok(())
}

#[test]
fn ui_shell_mints_from_named_account() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let script = format!(
        "generate 30 4 2 from=0x{0} 0.05\ngenerate 90 1 1 from=0x{1}\n:quit\n",
        "02".repeat(20),
        "77".repeat(20),
    );
    let output = studio_session(dir.path())
        .args(["--chain", "memory", "ui"])
        .write_stdin(script)
        .output()?;
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("minted token 269826 in block 1"), "{out}");
    assert!(out.contains("is not managed by the node"), "{out}");
    Ok(())
}
