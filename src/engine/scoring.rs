//! Scoring engine.
//!
//! Derives the leaderboard from the roster and the finalized races. Nothing
//! here is stored: standings are recomputed on every call, so a corrected
//! race result is reflected immediately.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::engine::ledger::Ledger;
use crate::engine::roster::Roster;
use crate::types::{EventConfig, Standing};

// ---------------------------------------------------------------------------
// Standings
// ---------------------------------------------------------------------------

/// Score every rostered bettor against every finalized race.
///
/// Pending races are skipped entirely. Rows are ordered by total points
/// descending, then bettor name ascending; ranks are 1-based and distinct
/// even for equal totals.
pub fn compute_standings(roster: &Roster, ledger: &Ledger) -> Vec<Standing> {
    let mut standings: Vec<Standing> = roster
        .list_bettors()
        .into_iter()
        .map(|name| {
            let per_race_points: BTreeMap<u32, u32> = ledger
                .finalized_races()
                .filter_map(|race| {
                    let podium = race.result()?;
                    let pick = race.picks().get(&name).map(String::as_str);
                    Some((race.race_number(), podium.points_for(pick)))
                })
                .collect();
            let total_points = per_race_points.values().sum();

            Standing {
                rank: 0,
                bettor_name: name,
                per_race_points,
                total_points,
            }
        })
        .collect();

    standings.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then_with(|| a.bettor_name.cmp(&b.bettor_name))
    });

    for (i, standing) in standings.iter_mut().enumerate() {
        standing.rank = i + 1;
    }

    standings
}

/// Case-insensitive name search. Ranks stay those of the full board.
pub fn filter_standings(standings: &[Standing], term: &str) -> Vec<Standing> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return standings.to_vec();
    }
    standings
        .iter()
        .filter(|s| s.bettor_name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Headline numbers shown above the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreboardSummary {
    pub total_bettors: usize,
    pub completed_races: usize,
    pub total_races: u32,
    pub leading_score: Option<u32>,
    pub average_score: Option<f64>,
}

pub fn summarize(standings: &[Standing], ledger: &Ledger, config: &EventConfig) -> ScoreboardSummary {
    let totals: Vec<u32> = standings.iter().map(|s| s.total_points).collect();
    let average_score = if totals.is_empty() {
        None
    } else {
        Some(totals.iter().sum::<u32>() as f64 / totals.len() as f64)
    };

    ScoreboardSummary {
        total_bettors: standings.len(),
        completed_races: ledger.finalized_count(),
        total_races: config.total_races,
        leading_score: totals.iter().copied().max(),
        average_score,
    }
}

/// Plain-text leaderboard, one line per bettor.
pub fn render_leaderboard(standings: &[Standing]) -> String {
    let mut out = String::from("DERBY LEADERBOARD\n");
    out.push_str(&"=".repeat(20));
    out.push('\n');
    for standing in standings {
        out.push_str(&standing.to_string());
        out.push('\n');
    }
    out
}

// ---------------------------------------------------------------------------
// Per-race breakdown
// ---------------------------------------------------------------------------

/// How the field scored in one finalized race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceBreakdown {
    pub race_number: u32,
    /// Bettors who picked the winner (3 pts).
    pub first: usize,
    pub second: usize,
    pub third: usize,
    /// Bettors who missed the podium or made no pick.
    pub no_points: usize,
}

pub fn race_breakdown(standings: &[Standing], ledger: &Ledger) -> Vec<RaceBreakdown> {
    ledger
        .finalized_races()
        .map(|race| {
            let race_number = race.race_number();
            let mut row = RaceBreakdown {
                race_number,
                first: 0,
                second: 0,
                third: 0,
                no_points: 0,
            };
            for standing in standings {
                match standing.per_race_points.get(&race_number).copied().unwrap_or(0) {
                    3 => row.first += 1,
                    2 => row.second += 1,
                    1 => row.third += 1,
                    _ => row.no_points += 1,
                }
            }
            row
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

/// Scoreboard as CSV: rank, bettor, one column per finalized race, total.
pub fn render_csv(standings: &[Standing], ledger: &Ledger) -> Result<String, csv::Error> {
    let races: Vec<u32> = ledger.finalized_races().map(|r| r.race_number()).collect();
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["Rank".to_string(), "Bettor".to_string()];
    header.extend(races.iter().map(|n| format!("R{n}")));
    header.push("Total".to_string());
    writer.write_record(&header)?;

    for standing in standings {
        let mut record = vec![standing.rank.to_string(), standing.bettor_name.clone()];
        record.extend(
            races
                .iter()
                .map(|n| standing.per_race_points.get(n).copied().unwrap_or(0).to_string()),
        );
        record.push(standing.total_points.to_string());
        writer.write_record(&record)?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
