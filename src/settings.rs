use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::categories::CategoryPolicy;
use crate::error::{ReckonError, Result};
use crate::normalizer::NormalizeOptions;

/// A master ledger and, for bank accounts, the checkpoint file it reconciles
/// against. Ledgers without checkpoints (cash) are merged unchecked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub name: String,
    #[serde(default)]
    pub checkpoints: Option<String>,
}

impl LedgerConfig {
    pub fn reconciled(name: &str, checkpoints: &str) -> Self {
        Self {
            name: name.to_string(),
            checkpoints: Some(checkpoints.to_string()),
        }
    }

    pub fn unreconciled(name: &str) -> Self {
        Self {
            name: name.to_string(),
            checkpoints: None,
        }
    }

    pub fn is_reconciled(&self) -> bool {
        self.checkpoints.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Payee on the source statement that marks a transfer out.
    #[serde(default = "default_transfer_payee")]
    pub payee: String,
    #[serde(default = "default_cash_account")]
    pub account: String,
    #[serde(default = "default_cash_ledger")]
    pub ledger: String,
    #[serde(default = "default_placeholder_payee")]
    pub placeholder_payee: String,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            payee: default_transfer_payee(),
            account: default_cash_account(),
            ledger: default_cash_ledger(),
            placeholder_payee: default_placeholder_payee(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    /// Halt on unknown categories instead of warning.
    #[serde(default)]
    pub strict_categories: bool,
    /// Balance the running total starts from. Legacy masters carry their
    /// opening balance as a transaction, hence zero.
    #[serde(default)]
    pub starting_balance: Decimal,
    #[serde(default = "default_source_account")]
    pub source_account: String,
    #[serde(default = "default_source_ledger")]
    pub source_ledger: String,
    #[serde(default)]
    pub transfer: TransferSettings,
    #[serde(default = "default_ledgers")]
    pub ledgers: Vec<LedgerConfig>,
}

fn default_source_account() -> String {
    "HSBC DC".to_string()
}

fn default_source_ledger() -> String {
    "hsbc_dc".to_string()
}

fn default_transfer_payee() -> String {
    "Transfer : Cash".to_string()
}

fn default_cash_account() -> String {
    "Cash".to_string()
}

fn default_cash_ledger() -> String {
    "cash".to_string()
}

fn default_placeholder_payee() -> String {
    "Misc".to_string()
}

fn default_ledgers() -> Vec<LedgerConfig> {
    vec![
        LedgerConfig::reconciled("hsbc_dc", "balance.csv"),
        LedgerConfig::unreconciled("hsbc_cc"),
        LedgerConfig::unreconciled("cash"),
    ]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            strict_categories: false,
            starting_balance: Decimal::ZERO,
            source_account: default_source_account(),
            source_ledger: default_source_ledger(),
            transfer: TransferSettings::default(),
            ledgers: default_ledgers(),
        }
    }
}

impl Settings {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn ledger(&self, name: &str) -> Option<&LedgerConfig> {
        self.ledgers.iter().find(|l| l.name == name)
    }

    pub fn master_path(&self, ledger: &str) -> PathBuf {
        self.data_path()
            .join("facts")
            .join(format!("transaction_{ledger}.csv"))
    }

    pub fn category_path(&self) -> PathBuf {
        self.data_path().join("dimensions").join("category.csv")
    }

    pub fn budget_path(&self) -> PathBuf {
        self.data_path().join("dimensions").join("budget.csv")
    }

    pub fn payee_mapping_path(&self) -> PathBuf {
        self.data_path().join("config").join("payee_mapping.csv")
    }

    pub fn category_mapping_path(&self) -> PathBuf {
        self.data_path().join("config").join("category_mapping.csv")
    }

    pub fn error_artifact_path(&self) -> PathBuf {
        self.data_path().join("transaction_error.csv")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.data_path().join("reports")
    }

    pub fn category_policy(&self) -> CategoryPolicy {
        if self.strict_categories {
            CategoryPolicy::Strict
        } else {
            CategoryPolicy::Permissive
        }
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            source_account: self.source_account.clone(),
            source_ledger: self.source_ledger.clone(),
            transfer_payee: self.transfer.payee.clone(),
            transfer_account: self.transfer.account.clone(),
            transfer_ledger: self.transfer.ledger.clone(),
            placeholder_payee: self.transfer.placeholder_payee.clone(),
        }
    }
}

fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("RECKON_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("reckon")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("reckon")
}

pub fn load_settings() -> Result<Settings> {
    read_settings(&settings_path())
}

fn read_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| ReckonError::Settings(format!("{}: {e}", path.display())))
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| ReckonError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

/// Settings with an optional `--data-dir` override applied.
pub fn resolve(data_dir: Option<&str>) -> Result<Settings> {
    let mut settings = load_settings()?;
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(dir);
    }
    Ok(settings)
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            strict_categories: true,
            starting_balance: dec!(1000.00),
            ..Settings::default()
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let loaded = read_settings(&path).unwrap();
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert!(loaded.strict_categories);
        assert_eq!(loaded.starting_balance, dec!(1000));
        assert_eq!(loaded.ledgers, default_ledgers());
    }

    #[test]
    fn test_load_returns_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let s = read_settings(&dir.path().join("settings.json")).unwrap();
        assert!(!s.strict_categories);
        assert_eq!(s.category_policy(), CategoryPolicy::Permissive);
        assert_eq!(s.source_account, "HSBC DC");
        assert!(!s.data_dir.is_empty());
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{
            "data_dir": "/tmp/test",
            "ledgers": [{"name": "current", "checkpoints": "current_balance.csv"}]
        }"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.transfer.payee, "Transfer : Cash");
        assert_eq!(s.transfer.ledger, "cash");
        assert_eq!(s.ledgers.len(), 1);
        assert!(s.ledger("current").unwrap().is_reconciled());
        assert!(s.ledger("cash").is_none());
    }

    #[test]
    fn test_malformed_settings_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(read_settings(&path), Err(ReckonError::Settings(_))));
    }

    #[test]
    fn test_paths_follow_data_dir_layout() {
        let s = Settings {
            data_dir: "/data".to_string(),
            ..Settings::default()
        };
        assert_eq!(s.master_path("cash"), PathBuf::from("/data/facts/transaction_cash.csv"));
        assert_eq!(s.category_path(), PathBuf::from("/data/dimensions/category.csv"));
        assert_eq!(s.error_artifact_path(), PathBuf::from("/data/transaction_error.csv"));
        assert_eq!(s.payee_mapping_path(), PathBuf::from("/data/config/payee_mapping.csv"));
    }
}
