use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::error::{ReckonError, Result};
use crate::fmt::plain;
use crate::models::Transaction;

pub const LEDGER_HEADER: [&str; 7] = [
    "account",
    "transaction_date",
    "payee",
    "master_category",
    "subcategory",
    "memo",
    "amount",
];

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// Parse a statement amount. Thousands separators, quotes and currency symbols
/// are stripped and `(12.50)` reads as negative. Blank or non-numeric input
/// yields `None`; callers decide whether blank means zero.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let s: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | '"' | '$' | '£' | '€'))
        .collect();
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return Decimal::from_str(inner.trim()).ok().map(|d| -d);
    }
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

// `%Y` also accepts a two-digit year, so each `%y` form is tried first.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%y",
    "%d/%m/%Y",
    "%d-%m-%y",
    "%d-%m-%Y",
    "%d %b %y",
    "%d %b %Y",
];

/// Parse ISO or day-first dates. A trailing time component is ignored.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let raw = match raw.split_once([' ', 'T']) {
        Some((head, _)) if head.len() == 10 && head.as_bytes()[4] == b'-' => head,
        _ => raw,
    };
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Locate named columns in a header row, ignoring case, padding and a BOM.
pub fn header_index(
    headers: &csv::StringRecord,
    names: &[&str],
    source: &Path,
) -> Result<Vec<usize>> {
    let normalized: Vec<String> = headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
        .collect();
    names
        .iter()
        .map(|name| {
            normalized
                .iter()
                .position(|h| h == &name.to_lowercase())
                .ok_or_else(|| {
                    ReckonError::Config(format!(
                        "{}: missing column '{name}'",
                        source.display()
                    ))
                })
        })
        .collect()
}

pub fn checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

/// Replace `path` as a whole: the bytes land in a sibling temp file that is
/// then renamed over the target, so readers never see a partial file.
pub fn replace_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Serialize records to CSV and atomically replace `path` with them.
pub fn write_csv<I, R>(path: &Path, header: &[&str], records: I) -> Result<()>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(header)?;
    for record in records {
        wtr.write_record(record)?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| ReckonError::Other(format!("CSV buffer error: {e}")))?;
    replace_file(path, &bytes)
}

// ---------------------------------------------------------------------------
// Canonical ledger files
// ---------------------------------------------------------------------------

pub fn read_ledger(path: &Path) -> Result<Vec<Transaction>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = rdr.headers()?.clone();
    let idx = header_index(&headers, &LEDGER_HEADER, path)?;

    let mut rows = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let line = i + 2;
        let field = |n: usize| record.get(idx[n]).unwrap_or("").trim();
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let transaction_date = parse_date(field(1)).ok_or_else(|| ReckonError::Parse {
            line,
            message: format!("{}: bad transaction_date '{}'", path.display(), field(1)),
        })?;
        let amount = parse_amount(field(6)).ok_or_else(|| ReckonError::Parse {
            line,
            message: format!("{}: bad amount '{}'", path.display(), field(6)),
        })?;
        rows.push(Transaction {
            account: field(0).to_string(),
            transaction_date,
            payee: field(2).to_string(),
            master_category: field(3).to_string(),
            subcategory: field(4).to_string(),
            memo: field(5).to_string(),
            amount,
        });
    }
    Ok(rows)
}

/// Missing master files read as empty ledgers.
pub fn read_ledger_or_empty(path: &Path) -> Result<Vec<Transaction>> {
    if path.exists() {
        read_ledger(path)
    } else {
        Ok(Vec::new())
    }
}

pub fn write_ledger(path: &Path, rows: &[Transaction]) -> Result<()> {
    write_csv(
        path,
        &LEDGER_HEADER,
        rows.iter().map(|t| {
            [
                t.account.clone(),
                t.transaction_date.format("%Y-%m-%d").to_string(),
                t.payee.clone(),
                t.master_category.clone(),
                t.subcategory.clone(),
                t.memo.clone(),
                plain(t.amount),
            ]
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,234.56"), Some(dec!(1234.56)));
        assert_eq!(parse_amount("\"500.00\""), Some(dec!(500.00)));
        assert_eq!(parse_amount("  -42.50  "), Some(dec!(-42.50)));
        assert_eq!(parse_amount("1200.0"), Some(dec!(1200)));
        assert_eq!(parse_amount("£15.20"), Some(dec!(15.20)));
        assert_eq!(parse_amount("(1,234.56)"), Some(dec!(-1234.56)));
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        assert_eq!(parse_amount("not_a_number"), None);
        assert_eq!(parse_amount("12.3.4"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("   "), None);
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-01-31"), Some(d(2024, 1, 31)));
        assert_eq!(parse_date("31/01/2024"), Some(d(2024, 1, 31)));
        assert_eq!(parse_date("05/02/2024"), Some(d(2024, 2, 5)));
        assert_eq!(parse_date("05 Feb 2024"), Some(d(2024, 2, 5)));
        assert_eq!(parse_date("2024-01-31 00:00:00"), Some(d(2024, 1, 31)));
        assert_eq!(parse_date("31/02/2024"), None);
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_parse_date_two_digit_years() {
        assert_eq!(parse_date("05/01/24"), Some(d(2024, 1, 5)));
        assert_eq!(parse_date("05-01-24"), Some(d(2024, 1, 5)));
        assert_eq!(parse_date("05 Feb 24"), Some(d(2024, 2, 5)));
        assert_eq!(parse_date("31/12/99"), Some(d(1999, 12, 31)));
    }

    #[test]
    fn test_ledger_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts").join("transaction_hsbc_dc.csv");
        let rows = vec![Transaction {
            account: "HSBC DC".to_string(),
            transaction_date: d(2024, 1, 5),
            payee: "Salary, Ltd".to_string(),
            master_category: "Income".to_string(),
            subcategory: "Salary".to_string(),
            memo: String::new(),
            amount: dec!(300),
        }];
        write_ledger(&path, &rows).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(
            "account,transaction_date,payee,master_category,subcategory,memo,amount\n"
        ));
        assert!(content.contains("HSBC DC,2024-01-05,\"Salary, Ltd\",Income,Salary,,300.00"));
        assert_eq!(read_ledger(&path).unwrap(), rows);
        assert!(!dir.path().join("facts").join("transaction_hsbc_dc.csv.tmp").exists());
    }

    #[test]
    fn test_read_ledger_reports_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(
            &path,
            "account,transaction_date,payee,master_category,subcategory,memo,amount\n\
             HSBC DC,2024-01-05,Shop,Monthly,Groceries,,abc\n",
        )
        .unwrap();
        match read_ledger(&path) {
            Err(ReckonError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_read_ledger_requires_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.csv");
        std::fs::write(&path, "account,transaction_date,amount\nA,2024-01-01,1\n").unwrap();
        assert!(matches!(read_ledger(&path), Err(ReckonError::Config(_))));
    }

    #[test]
    fn test_missing_master_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_ledger_or_empty(&dir.path().join("nope.csv")).unwrap().is_empty());
    }

    #[test]
    fn test_checksum_changes_with_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        std::fs::write(&path, "x").unwrap();
        let first = checksum(&path).unwrap();
        assert_eq!(first.len(), 64);
        std::fs::write(&path, "y").unwrap();
        assert_ne!(first, checksum(&path).unwrap());
    }
}
