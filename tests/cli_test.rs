use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::io::Write;
use std::process::Command;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("payment-orchestrator"));
    cmd.arg("tests/fixtures/requests.jsonl");

    let output = cmd.output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    let envelopes: Vec<Value> = stdout
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;

    // The blank line is skipped, every other request gets an envelope.
    assert_eq!(envelopes.len(), 6);

    // Same idempotency key, same payment.
    assert_eq!(envelopes[0]["success"], true);
    assert_eq!(envelopes[0]["data"]["status"], "PENDING");
    assert_eq!(envelopes[0]["data"]["id"], envelopes[1]["data"]["id"]);

    assert_eq!(envelopes[2]["data"]["balance_after"], "750");
    assert_eq!(envelopes[3]["data"]["balance"], "750");
    assert_eq!(envelopes[3]["data"]["version"], 1);

    assert_eq!(envelopes[4]["success"], false);
    assert_eq!(envelopes[4]["code"], "NOT_FOUND");
    assert!(envelopes[4].get("data").is_none());

    assert_eq!(envelopes[5]["data"]["state"], "closed");
    assert_eq!(envelopes[5]["data"]["name"], "payment-gateway");

    Ok(())
}

#[test]
fn test_cli_reports_malformed_lines_and_keeps_going() {
    let mut input = tempfile::NamedTempFile::new().unwrap();
    writeln!(input, "{{\"action\":\"teleport\"}}").unwrap();
    writeln!(input, "not json").unwrap();
    writeln!(input, "{{\"action\":\"get_balance\",\"user_id\":\"u1\"}}").unwrap();

    let mut cmd = Command::new(cargo_bin!("payment-orchestrator"));
    cmd.arg(input.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading request"))
        .stderr(predicate::str::contains("line 2"))
        .stdout(predicate::str::contains("\"balance\":\"1000\""));
}

#[test]
fn test_cli_declining_gateway_fails_and_restores_wallet() {
    let mut input = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        input,
        "{{\"action\":\"create_payment\",\"user_id\":\"u1\",\"amount\":\"30\",\"idempotency_key\":\"k1\"}}"
    )
    .unwrap();
    let mut cmd = Command::new(cargo_bin!("payment-orchestrator"));
    let first = cmd.arg(input.path()).output().unwrap();
    let created: Value = serde_json::from_slice(&first.stdout).unwrap();
    let id = created["data"]["id"].as_str().unwrap().to_string();

    writeln!(input, "{{\"action\":\"process_payment\",\"payment_id\":\"{}\"}}", id).unwrap();
    writeln!(input, "{{\"action\":\"get_balance\",\"user_id\":\"u1\"}}").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("wallets.csv");
    let mut cmd = Command::new(cargo_bin!("payment-orchestrator"));
    cmd.arg(input.path())
        .arg("--gateway-behavior")
        .arg("decline")
        .arg("--wallets-csv")
        .arg(&csv_path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"status\":\"FAILED\""))
        .stdout(predicate::str::contains("\"balance\":\"1000\""));

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(csv, "user_id,balance,currency,version\nu1,1000,USD,2\n");
}
