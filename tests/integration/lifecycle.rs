//! Full event flows: setup gates, racing, scoring, and resets.

use std::collections::BTreeMap;

use derby::engine::{DerbyEvent, EventDefaults};
use derby::types::{DerbyError, EntityKind, Phase, Podium, RaceStatus};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn picks(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(name, horse)| (name.to_string(), horse.to_string()))
        .collect()
}

/// Eight horses, the given bettors, both setup gates closed.
fn active_event(bettors: &[&str]) -> DerbyEvent {
    let mut event = DerbyEvent::new(EventDefaults {
        total_races: 3,
        horse_count: 8,
    });
    event.setup_horses(8).unwrap();
    for name in bettors {
        event.add_bettor(name).unwrap();
    }
    event.set_target_bettor_count(bettors.len() as u32).unwrap();
    event.complete_bettor_setup().unwrap();
    event
}

fn totals(event: &DerbyEvent) -> BTreeMap<String, u32> {
    event
        .compute_standings()
        .into_iter()
        .map(|s| (s.bettor_name, s.total_points))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_full_event_lifecycle() {
    let mut event = DerbyEvent::new(EventDefaults {
        total_races: 2,
        horse_count: 8,
    });
    assert_eq!(event.phase(), Phase::AwaitingHorseSetup);

    // Racing is closed until both rosters are set.
    let early = event.finalize_race(1, Podium::new("1", "2", "3"), BTreeMap::new());
    assert!(matches!(early, Err(DerbyError::Precondition(_))));

    assert_eq!(event.add_horses_bulk(["2", "10", "1", "3"]), 4);
    assert_eq!(event.list_horses(), vec!["1", "2", "3", "10"]);
    event.complete_horse_setup().unwrap();
    assert_eq!(event.phase(), Phase::AwaitingBettorSetup);

    let report = event.add_bettors_bulk(["Alice", "Bob", "Alice"]);
    assert_eq!(report.added, vec!["Alice", "Bob"]);
    assert_eq!(report.skipped, vec!["Alice"]);

    event.set_target_bettor_count(3).unwrap();
    assert!(matches!(
        event.complete_bettor_setup(),
        Err(DerbyError::Precondition(_))
    ));
    event.add_bettor("Carol").unwrap();
    event.complete_bettor_setup().unwrap();
    assert_eq!(event.phase(), Phase::Active);

    event
        .finalize_race(1, Podium::new("10", "2", "1"), picks(&[("Alice", "10"), ("Bob", "1")]))
        .unwrap();
    assert_eq!(event.advance_race().unwrap(), 2);
    event
        .finalize_race(2, Podium::new("3", "1", "2"), picks(&[("Bob", "3"), ("Carol", "2")]))
        .unwrap();
    assert_eq!(event.advance_race().unwrap(), 3);
    assert_eq!(event.phase(), Phase::Complete);
    assert!(matches!(event.advance_race(), Err(DerbyError::Precondition(_))));

    let standings = event.compute_standings();
    let rows: Vec<(usize, &str, u32)> = standings
        .iter()
        .map(|s| (s.rank, s.bettor_name.as_str(), s.total_points))
        .collect();
    assert_eq!(rows, vec![(1, "Bob", 4), (2, "Alice", 3), (3, "Carol", 1)]);

    let summary = event.summary();
    assert_eq!(summary.completed_races, 2);
    assert_eq!(summary.total_races, 2);
    assert_eq!(summary.leading_score, Some(4));
}

#[test]
fn test_duplicates_leave_store_unchanged() {
    let mut event = active_event(&["Alice"]);
    event.create_race(2).unwrap();

    let err = event.add_horse("3").unwrap_err();
    assert_eq!(
        err,
        DerbyError::Duplicate {
            kind: EntityKind::Horse,
            key: "3".into()
        }
    );
    assert!(matches!(
        event.add_bettor("Alice"),
        Err(DerbyError::Duplicate { kind: EntityKind::Bettor, .. })
    ));
    assert!(matches!(
        event.create_race(2),
        Err(DerbyError::Duplicate { kind: EntityKind::Race, .. })
    ));

    assert_eq!(event.list_horses().len(), 8);
    assert_eq!(event.list_bettors(), vec!["Alice"]);
    assert_eq!(event.list_races().len(), 1);
}

#[test]
fn test_bettor_names_are_case_sensitive() {
    let mut event = active_event(&["alice"]);
    event.add_bettor("Alice").unwrap();
    event.add_bettor(" Alice").unwrap();
    assert_eq!(event.list_bettors().len(), 3);
}

#[test]
fn test_scoring_three_two_one() {
    let mut event = active_event(&["Alice", "Bob", "Carol", "Dave", "Erin"]);
    event
        .finalize_race(
            1,
            Podium::new("3", "7", "1"),
            picks(&[("Alice", "3"), ("Bob", "7"), ("Carol", "1"), ("Dave", "5")]),
        )
        .unwrap();

    let standings = event.compute_standings();
    let race_one: BTreeMap<&str, u32> = standings
        .iter()
        .map(|s| (s.bettor_name.as_str(), s.per_race_points[&1]))
        .collect();
    assert_eq!(race_one["Alice"], 3);
    assert_eq!(race_one["Bob"], 2);
    assert_eq!(race_one["Carol"], 1);
    // Losing pick and no pick score the same.
    assert_eq!(race_one["Dave"], 0);
    assert_eq!(race_one["Erin"], 0);
}

#[test]
fn test_pending_race_scores_nothing() {
    let mut event = active_event(&["Alice"]);
    event.create_race(1).unwrap();
    event
        .finalize_race(2, Podium::new("1", "2", "3"), picks(&[("Alice", "1")]))
        .unwrap();

    let standing = &event.compute_standings()[0];
    assert!(!standing.per_race_points.contains_key(&1));
    assert_eq!(standing.per_race_points.len(), 1);
    assert_eq!(standing.total_points, 3);
    assert_eq!(event.get_race(1).unwrap().status(), RaceStatus::Pending);
    assert!(event.picks_for(1).is_empty());
}

#[test]
fn test_bulk_horse_insert_idempotent() {
    let mut event = DerbyEvent::default();
    assert_eq!(event.add_horses_bulk(["1", "2", "3"]), 3);
    assert_eq!(event.add_horses_bulk(["1", "2", "3"]), 0);
    assert_eq!(event.list_horses(), vec!["1", "2", "3"]);
}

#[test]
fn test_refinalize_replaces_result_and_picks() {
    let mut event = active_event(&["Alice", "Bob"]);
    event
        .finalize_race(2, Podium::new("1", "2", "3"), picks(&[("Alice", "1"), ("Bob", "2")]))
        .unwrap();
    event
        .finalize_race(2, Podium::new("4", "5", "6"), picks(&[("Bob", "4")]))
        .unwrap();

    let race = event.get_race(2).unwrap();
    assert_eq!(race.result(), Some(&Podium::new("4", "5", "6")));
    assert_eq!(race.picks(), &picks(&[("Bob", "4")]));
    assert_eq!(
        totals(&event),
        BTreeMap::from([("Alice".to_string(), 0), ("Bob".to_string(), 3)])
    );
}

#[test]
fn test_rejected_finalize_changes_nothing() {
    let mut event = active_event(&["Alice"]);
    event
        .finalize_race(1, Podium::new("1", "2", "3"), picks(&[("Alice", "1")]))
        .unwrap();
    let before = event.clone();

    // Last pick names an unknown bettor.
    let err = event
        .finalize_race(1, Podium::new("4", "5", "6"), picks(&[("Alice", "4"), ("Zed", "5")]))
        .unwrap_err();
    assert!(matches!(err, DerbyError::Validation(msg) if msg.contains("Zed")));
    assert_eq!(event, before);

    let err = event
        .finalize_race(1, Podium::new("4", "4", "6"), BTreeMap::new())
        .unwrap_err();
    assert!(matches!(err, DerbyError::Validation(_)));

    let err = event
        .finalize_race(1, Podium::new("4", "5", "99"), BTreeMap::new())
        .unwrap_err();
    assert!(matches!(err, DerbyError::Validation(msg) if msg.contains("#99")));
    assert_eq!(event, before);
}

#[test]
fn test_remove_bettor_cascades_picks() {
    let mut event = active_event(&["Alice", "Bob"]);
    event
        .finalize_race(1, Podium::new("1", "2", "3"), picks(&[("Alice", "1"), ("Bob", "2")]))
        .unwrap();
    event
        .finalize_race(2, Podium::new("4", "5", "6"), picks(&[("Alice", "5"), ("Bob", "6")]))
        .unwrap();

    event.remove_bettor("Alice").unwrap();

    for n in [1, 2] {
        let race = event.get_race(n).unwrap();
        assert!(!race.picks().contains_key("Alice"));
        assert!(race.picks().contains_key("Bob"));
        assert!(race.is_finalized());
    }
    assert_eq!(totals(&event), BTreeMap::from([("Bob".to_string(), 3)]));
}

#[test]
fn test_referenced_horse_cannot_be_removed() {
    let mut event = active_event(&["Alice"]);
    event
        .finalize_race(1, Podium::new("1", "2", "3"), picks(&[("Alice", "8")]))
        .unwrap();

    for horse in ["1", "8"] {
        let err = event.remove_horse(horse).unwrap_err();
        assert!(matches!(err, DerbyError::Referenced { kind: EntityKind::Horse, .. }));
    }
    event.remove_horse("7").unwrap();
    assert_eq!(event.list_horses().len(), 7);
}

#[test]
fn test_reset_horses_needs_no_bettors() {
    let mut event = DerbyEvent::default();
    event.setup_horses(4).unwrap();
    event.add_bettor("Alice").unwrap();

    assert!(matches!(event.reset_horses(), Err(DerbyError::Precondition(_))));
    assert_eq!(event.list_horses().len(), 4);

    event.remove_bettor("Alice").unwrap();
    event.reset_horses().unwrap();
    assert!(event.list_horses().is_empty());
    assert_eq!(event.phase(), Phase::AwaitingHorseSetup);
}

#[test]
fn test_reset_all_returns_to_defaults() {
    let mut event = active_event(&["Alice"]);
    event
        .finalize_race(1, Podium::new("1", "2", "3"), BTreeMap::new())
        .unwrap();
    event.advance_race().unwrap();

    event.reset_all();
    assert_eq!(event.phase(), Phase::AwaitingHorseSetup);
    assert_eq!(event.config().current_race, 1);
    assert_eq!(event.config().total_races, 3);
    assert!(event.list_races().is_empty());
    assert!(event.list_bettors().is_empty());
}

#[test]
fn test_tied_totals_get_consecutive_ranks() {
    let mut event = active_event(&["Zoe", "Max", "Amy"]);
    event
        .finalize_race(
            1,
            Podium::new("1", "2", "3"),
            picks(&[("Zoe", "1"), ("Amy", "1"), ("Max", "1")]),
        )
        .unwrap();
    event
        .finalize_race(
            2,
            Podium::new("4", "5", "6"),
            picks(&[("Zoe", "5"), ("Amy", "5"), ("Max", "8")]),
        )
        .unwrap();

    let rows: Vec<(usize, String, u32)> = event
        .compute_standings()
        .into_iter()
        .map(|s| (s.rank, s.bettor_name, s.total_points))
        .collect();
    assert_eq!(
        rows,
        vec![
            (1, "Amy".to_string(), 5),
            (2, "Zoe".to_string(), 5),
            (3, "Max".to_string(), 3),
        ]
    );
}

#[test]
fn test_total_races_cannot_drop_below_progress() {
    let mut event = active_event(&["Alice"]);
    event.finalize_race(1, Podium::new("1", "2", "3"), BTreeMap::new()).unwrap();
    event.finalize_race(2, Podium::new("1", "2", "3"), BTreeMap::new()).unwrap();

    assert!(matches!(event.set_total_races(1), Err(DerbyError::Validation(_))));
    event.set_total_races(5).unwrap();
    assert_eq!(event.config().total_races, 5);
}

#[test]
fn test_auto_provision_once() {
    let mut event = DerbyEvent::new(EventDefaults {
        total_races: 10,
        horse_count: 6,
    });
    event.complete_horse_setup().unwrap();
    assert_eq!(event.list_horses(), vec!["1", "2", "3", "4", "5", "6"]);

    // A second close on an emptied roster does not provision again.
    event.reset_horses().unwrap();
    let err = event.complete_horse_setup().unwrap_err();
    assert!(matches!(err, DerbyError::Precondition(_)));
    assert!(event.list_horses().is_empty());
}
