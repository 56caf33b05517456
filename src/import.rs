//! Text bulk-import helpers.
//!
//! Parses the formats accepted at the desk: one bettor name per line, a
//! CSV of bettor names, and `Name:Horse` pick lists. Bad pick lines are
//! collected as issues so every one can be reported at once.

use std::collections::BTreeMap;
use std::fmt;

use crate::types::{DerbyError, Result};

/// A line that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportIssue {
    /// 1-based line number in the pasted text.
    pub line: usize,
    pub content: String,
    pub reason: &'static str,
}

impl fmt::Display for ImportIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} ({})", self.line, self.reason, self.content)
    }
}

/// Parsed pick list plus any rejected lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPicks {
    pub picks: BTreeMap<String, String>,
    pub issues: Vec<ImportIssue>,
}

impl ParsedPicks {
    /// The picks, or a validation error naming every bad line. A pick
    /// list is used whole or not at all.
    pub fn into_picks(self) -> Result<BTreeMap<String, String>> {
        if self.issues.is_empty() {
            return Ok(self.picks);
        }
        let lines: Vec<String> = self.issues.iter().map(ToString::to_string).collect();
        Err(DerbyError::Validation(format!(
            "{} bad pick line(s): {}",
            lines.len(),
            lines.join("; ")
        )))
    }
}

/// One name per line; surrounding whitespace trimmed, blanks skipped.
pub fn parse_names(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// `Name:Horse` per line, split on the first colon. A later line for the
/// same bettor replaces the earlier one.
pub fn parse_picks(text: &str) -> ParsedPicks {
    let mut parsed = ParsedPicks::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let issue = |reason| ImportIssue {
            line: idx + 1,
            content: line.to_string(),
            reason,
        };

        let Some((name, horse)) = line.split_once(':') else {
            parsed.issues.push(issue("expected Name:Horse"));
            continue;
        };
        let (name, horse) = (name.trim(), horse.trim());
        if name.is_empty() {
            parsed.issues.push(issue("missing bettor name"));
        } else if horse.is_empty() {
            parsed.issues.push(issue("missing horse number"));
        } else {
            parsed.picks.insert(name.to_string(), horse.to_string());
        }
    }

    parsed
}

/// Bettor names from a CSV with a header row.
///
/// Names come from the first column whose header contains "name" (any
/// case), else from the first column. Cells are trimmed; blanks skipped.
pub fn parse_bettor_csv(text: &str) -> std::result::Result<Vec<String>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let column = reader
        .headers()?
        .iter()
        .position(|header| header.to_lowercase().contains("name"))
        .unwrap_or(0);

    let mut names = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(name) = record.get(column).map(str::trim).filter(|n| !n.is_empty()) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

/// Render picks back into the `Name:Horse` text form.
pub fn format_picks(picks: &BTreeMap<String, String>) -> String {
    picks
        .iter()
        .map(|(name, horse)| format!("{name}:{horse}"))
        .collect::<Vec<_>>()
        .join("\n")
}
