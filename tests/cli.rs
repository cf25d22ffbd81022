use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Env {
    config: TempDir,
    data: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            config: tempfile::tempdir().unwrap(),
            data: tempfile::tempdir().unwrap(),
        }
    }

    fn root(&self) -> &Path {
        self.data.path()
    }

    fn cmd(&self, args: &[&str]) -> Command {
        let mut cmd = Command::cargo_bin("reckon").unwrap();
        cmd.env("RECKON_CONFIG_DIR", self.config.path())
            .env_remove("RUST_LOG")
            .arg("--data-dir")
            .arg(self.data.path())
            .args(args);
        cmd
    }

    fn write(&self, rel: &str, body: &str) {
        let path = self.root().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    /// Initialized data directory with one reconcilable January export.
    fn seeded() -> Self {
        let env = Self::new();
        env.cmd(&["init"]).assert().success();
        env.write(
            "balance.csv",
            "statement_date,opening_balance,closing_balance\n\
             2024-01-31,0.00,1200.00\n",
        );
        env.write(
            "dimensions/category.csv",
            "master_category,subcategory,enabled\n\
             Income,Salary,True\n\
             Monthly,Groceries,True\n\
             Monthly,Discretionary,True\n\
             Transfer-out,Cash,True\n\
             Transfer-in,HSBC DC,True\n",
        );
        env.write(
            "2024-01-31_ynab.csv",
            "Date,Payee,Category,Memo,Outflow,Inflow\n\
             2024-01-05,Employer,Income: Salary,,,1300.00\n\
             2024-01-20,Tesco,Monthly: Groceries,,60.00,\n\
             2024-01-25,Transfer : Cash,,,40.00,\n",
        );
        env
    }
}

#[test]
fn test_init_creates_layout_and_settings() {
    let env = Env::new();
    env.cmd(&["init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created dimensions/category.csv"));
    assert!(env.root().join("facts").is_dir());
    assert!(env.root().join("balance.csv").exists());
    assert!(env.config.path().join("settings.json").exists());
}

#[test]
fn test_run_merges_then_leaves_masters_alone() {
    let env = Env::seeded();
    env.cmd(&["run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Master ledgers"));

    let master = env.root().join("facts").join("transaction_hsbc_dc.csv");
    let bytes = std::fs::read(&master).unwrap();
    assert!(String::from_utf8_lossy(&bytes)
        .contains("HSBC DC,2024-01-20,Tesco,Monthly,Groceries,,-60.00"));
    assert!(env.root().join("facts").join("transaction_cash.csv").exists());

    env.cmd(&["run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 checkpoint(s) reconciled"));
    assert_eq!(std::fs::read(&master).unwrap(), bytes);
}

#[test]
fn test_check_mismatch_exits_with_status_two() {
    let env = Env::seeded();
    env.write(
        "facts/transaction_hsbc_dc.csv",
        "account,transaction_date,payee,master_category,subcategory,memo,amount\n\
         HSBC DC,2024-01-05,Employer,Income,Salary,,1300.00\n",
    );
    env.cmd(&["check"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Reconciliation mismatch"));
    let diag = std::fs::read_to_string(env.root().join("transaction_error.csv")).unwrap();
    assert!(diag.contains("2024-01-31,,0.00,1300.00,1300.00,1200.00,False"));
}

#[test]
fn test_validate_short_statement_exits_with_status_two() {
    let env = Env::seeded();
    env.write(
        "2024-01-31_ynab.csv",
        "Date,Payee,Category,Memo,Outflow,Inflow\n2024-01-05,Employer,Income: Salary,,,1300.00\n",
    );
    env.cmd(&["generate"]).assert().success();
    env.cmd(&["validate"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("does not reconcile"));
}

#[test]
fn test_categories_strict_flag_blocks() {
    let env = Env::seeded();
    env.write(
        "ledger.csv",
        "account,transaction_date,payee,master_category,subcategory,memo,amount\n\
         Cash,2024-01-05,Market,Travel,Trains,,-5.00\n",
    );
    let file = env.root().join("ledger.csv");
    let file = file.to_str().unwrap();

    env.cmd(&["categories", file])
        .assert()
        .success()
        .stdout(predicate::str::contains("Trains"));
    env.cmd(&["--strict", "categories", file])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown categories"));
}

#[test]
fn test_categories_checks_export_files() {
    let env = Env::seeded();
    env.write(
        "2024-02-29_ynab.csv",
        "Date,Payee,Category,Memo,Outflow,Inflow\n\
         2024-02-03,Tesco,Monthly: Groceries,,20.00,\n\
         2024-02-09,Pub,Going Out: Drinks,,12.00,\n",
    );
    let file = env.root().join("2024-02-29_ynab.csv");
    let file = file.to_str().unwrap();

    env.cmd(&["categories", file])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing column"));
    env.cmd(&["categories", "--type", "ynab", file])
        .assert()
        .success()
        .stdout(predicate::str::contains("Drinks"));
    env.cmd(&["--strict", "categories", "-t", "ynab", file])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Going Out"));
    env.cmd(&["--strict", "categories", "-t", "ynab"])
        .arg(env.root().join("2024-01-31_ynab.csv"))
        .assert()
        .success();
}

#[test]
fn test_prepare_writes_import_file() {
    let env = Env::seeded();
    std::fs::remove_file(env.root().join("2024-01-31_ynab.csv")).unwrap();
    env.write(
        "2024-01-31_txn.csv",
        "05/01/2024,ACME SALARY,1300.00\n\
         20/01/2024,TESCO STORES,-100.00\n\
         31/01/2024,BALANCE CARRIED FORWARD,1200.00\n",
    );
    env.write(
        "config/payee_mapping.csv",
        "original_payee,friendly_name,match_type\ntesco,Tesco,contains\n",
    );
    env.cmd(&["prepare"]).assert().success();
    let out = std::fs::read_to_string(env.root().join("2024-01-31_ynab.csv")).unwrap();
    assert!(out.contains("2024-01-20,Tesco,,,100.00,"));
    assert!(!out.contains("BALANCE"));
}

#[test]
fn test_report_and_status() {
    let env = Env::seeded();
    env.cmd(&["run"]).assert().success();
    env.cmd(&["report"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Monthly: Groceries"));
    assert!(env.root().join("reports").join("transaction.csv").exists());
    env.cmd(&["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hsbc_dc"));
}
