use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::checksum::{ISBN13_LENGTH, clean_identifier};

/// Digits examined after the registration-group prefix.
const RULE_DIGITS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeStatus {
    Valid,
    /// No group or rule covers the number.
    Unknown,
    /// Covered by a rule with publisher length 0.
    Reserved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IsbnInformation {
    pub status: RangeStatus,
    /// Prefix of the matching registration group, e.g. `978-0`.
    pub prefix: Option<String>,
    pub agency: Option<String>,
}

impl IsbnInformation {
    pub fn is_in_unknown_range(&self) -> bool {
        self.status == RangeStatus::Unknown
    }

    pub fn is_in_reserved_range(&self) -> bool {
        self.status == RangeStatus::Reserved
    }
}

/// Classification of ISBN-13 numbers by numbering range.
pub trait IsbnRangeLookup: Send + Sync {
    fn information(&self, isbn: &str) -> Option<IsbnInformation>;
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct IsbnRangeTable {
    #[serde(default)]
    pub groups: Vec<RangeGroup>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RangeGroup {
    /// EAN prefix and group, dash separated (`978-0`).
    pub prefix: String,
    pub agency: Option<String>,
    #[serde(default)]
    pub rules: Vec<RangeRule>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RangeRule {
    /// Inclusive bounds over the next seven digits: `0000000-1999999`.
    pub range: String,
    pub length: u8,
}

impl RangeRule {
    fn bounds(&self) -> Option<(u32, u32)> {
        let (low, high) = self.range.split_once('-')?;
        let (low, high) = (low.trim(), high.trim());
        if low.len() != RULE_DIGITS || high.len() != RULE_DIGITS {
            return None;
        }
        Some((low.parse().ok()?, high.parse().ok()?))
    }
}

impl RangeGroup {
    fn digits(&self) -> String {
        self.prefix.chars().filter(char::is_ascii_digit).collect()
    }
}

impl IsbnRangeTable {
    pub fn validate(&self) -> Result<()> {
        for group in &self.groups {
            let digits = group.digits();
            if digits.len() < 3 || digits.len() >= ISBN13_LENGTH - RULE_DIGITS + 3 {
                bail!("invalid ISBN range prefix `{}`", group.prefix);
            }
            for rule in &group.rules {
                if rule.bounds().is_none() {
                    bail!(
                        "invalid ISBN range `{}` in group `{}`",
                        rule.range,
                        group.prefix
                    );
                }
            }
        }
        Ok(())
    }
}

impl IsbnRangeLookup for IsbnRangeTable {
    fn information(&self, isbn: &str) -> Option<IsbnInformation> {
        let number = clean_identifier(isbn);
        if number.len() != ISBN13_LENGTH {
            return None;
        }

        let Some(group) = self
            .groups
            .iter()
            .filter(|group| number.starts_with(&group.digits()))
            .max_by_key(|group| group.digits().len())
        else {
            return Some(IsbnInformation {
                status: RangeStatus::Unknown,
                prefix: None,
                agency: None,
            });
        };

        let status = if group.rules.is_empty() {
            RangeStatus::Valid
        } else {
            let digits = group.digits();
            let following = number
                .get(digits.len()..)
                .map(|rest| rest.chars().chain(std::iter::repeat('0')).take(RULE_DIGITS).collect::<String>())
                .and_then(|rest| rest.parse::<u32>().ok());
            let rule = following.and_then(|value| {
                group.rules.iter().find(|rule| {
                    rule.bounds()
                        .is_some_and(|(low, high)| low <= value && value <= high)
                })
            });
            match rule {
                None => RangeStatus::Unknown,
                Some(rule) if rule.length == 0 => RangeStatus::Reserved,
                Some(_) => RangeStatus::Valid,
            }
        };

        Some(IsbnInformation {
            status,
            prefix: Some(group.prefix.clone()),
            agency: group.agency.clone(),
        })
    }
}

/// Load a range table from TOML (`[[groups]]` with `[[groups.rules]]`).
pub fn load_range_table(path: &Path) -> Result<IsbnRangeTable> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let table: IsbnRangeTable =
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;
    table
        .validate()
        .with_context(|| format!("invalid range table {}", path.display()))?;
    Ok(table)
}
