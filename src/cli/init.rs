use std::path::Path;

use crate::error::Result;
use crate::settings::{save_settings, settings_file_exists, Settings};

const SEED_FILES: [(&str, &str); 5] = [
    ("balance.csv", "statement_date,opening_balance,closing_balance\n"),
    ("dimensions/category.csv", "master_category,subcategory,enabled\n"),
    ("dimensions/budget.csv", "category,start,end,amount\n"),
    ("config/payee_mapping.csv", "original_payee,friendly_name,match_type\n"),
    ("config/category_mapping.csv", "payee,category\n"),
];

fn seed(root: &Path) -> Result<Vec<String>> {
    for dir in ["facts", "dimensions", "config", "reports"] {
        std::fs::create_dir_all(root.join(dir))?;
    }
    let mut created = Vec::new();
    for (rel, header) in SEED_FILES {
        let path = root.join(rel);
        if path.exists() {
            continue;
        }
        std::fs::write(&path, header)?;
        created.push(rel.to_string());
    }
    Ok(created)
}

/// Persists `settings` (with any `--data-dir`/`--strict` applied) and seeds
/// the data directory.
pub fn run(settings: &Settings) -> Result<()> {
    let root = settings.data_path();
    let created = seed(&root)?;
    let fresh = !settings_file_exists();
    save_settings(settings)?;

    println!("Data dir: {}", root.display());
    for rel in &created {
        println!("  created {rel}");
    }
    if fresh {
        println!("Settings written. Add statements and run `reckon run`.");
    } else {
        println!("Settings updated.");
    }
    Ok(())
}
