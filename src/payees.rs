use std::path::Path;

use regex::Regex;

use crate::error::{ReckonError, Result};
use crate::ledger::header_index;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchType {
    #[default]
    Contains,
    StartsWith,
    Regex,
}

impl MatchType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "" | "contains" => Some(Self::Contains),
            "starts_with" => Some(Self::StartsWith),
            "regex" => Some(Self::Regex),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PayeeRule {
    pub pattern: String,
    pub friendly_name: String,
    pub match_type: MatchType,
    regex: Option<Regex>,
}

impl PayeeRule {
    pub fn new(pattern: &str, friendly_name: &str, match_type: MatchType) -> Result<Self> {
        let regex = match match_type {
            MatchType::Regex => Some(
                Regex::new(&format!("(?i){pattern}")).map_err(|e| {
                    ReckonError::Config(format!("bad payee pattern '{pattern}': {e}"))
                })?,
            ),
            _ => None,
        };
        Ok(Self {
            pattern: pattern.to_string(),
            friendly_name: friendly_name.to_string(),
            match_type,
            regex,
        })
    }

    pub fn matches(&self, payee: &str) -> bool {
        let payee_lower = payee.to_lowercase();
        let pat_lower = self.pattern.to_lowercase();
        match self.match_type {
            MatchType::Contains => payee_lower.contains(&pat_lower),
            MatchType::StartsWith => payee_lower.starts_with(&pat_lower),
            MatchType::Regex => self.regex.as_ref().is_some_and(|re| re.is_match(payee)),
        }
    }
}

/// Ordered payee → friendly name rules plus friendly name → category.
/// Order is significant: the first matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct PayeeMap {
    rules: Vec<PayeeRule>,
    categories: Vec<(String, String)>,
}

impl PayeeMap {
    pub fn new(rules: Vec<PayeeRule>, categories: Vec<(String, String)>) -> Self {
        Self { rules, categories }
    }

    /// Load `payee_mapping.csv` (`original_payee,friendly_name[,match_type]`) and
    /// `category_mapping.csv` (`payee,category`). Missing files give empty lists.
    pub fn load(payee_path: &Path, category_path: &Path) -> Result<Self> {
        let mut rules = Vec::new();
        if payee_path.exists() {
            let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(payee_path)?;
            let headers = rdr.headers()?.clone();
            let idx = header_index(&headers, &["original_payee", "friendly_name"], payee_path)?;
            let type_idx = header_index(&headers, &["match_type"], payee_path)
                .ok()
                .map(|v| v[0]);
            for result in rdr.records() {
                let record = result?;
                let pattern = record.get(idx[0]).unwrap_or("").trim();
                if pattern.is_empty() {
                    continue;
                }
                let raw_type = type_idx.and_then(|i| record.get(i)).unwrap_or("");
                let match_type = MatchType::parse(raw_type).ok_or_else(|| {
                    ReckonError::Config(format!("unknown match type '{raw_type}' for '{pattern}'"))
                })?;
                let friendly = record.get(idx[1]).unwrap_or("").trim();
                rules.push(PayeeRule::new(pattern, friendly, match_type)?);
            }
        }

        let mut categories = Vec::new();
        if category_path.exists() {
            let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(category_path)?;
            let headers = rdr.headers()?.clone();
            let idx = header_index(&headers, &["payee", "category"], category_path)?;
            for result in rdr.records() {
                let record = result?;
                categories.push((
                    record.get(idx[0]).unwrap_or("").trim().to_string(),
                    record.get(idx[1]).unwrap_or("").trim().to_string(),
                ));
            }
        }
        Ok(Self::new(rules, categories))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// `(friendly_name, category)` for a raw statement payee. Unmatched payees
    /// keep their raw name and get an empty category.
    pub fn resolve(&self, raw_payee: &str) -> (String, String) {
        let Some(rule) = self.rules.iter().find(|r| r.matches(raw_payee)) else {
            return (raw_payee.to_string(), String::new());
        };
        let category = self
            .categories
            .iter()
            .find(|(payee, _)| payee == &rule.friendly_name)
            .map(|(_, category)| category.clone())
            .unwrap_or_default();
        (rule.friendly_name.clone(), category)
    }
}
