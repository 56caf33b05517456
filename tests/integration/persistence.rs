//! State file round trips through `Session` and snapshot import/export.

use std::collections::BTreeMap;
use std::path::PathBuf;

use derby::engine::{DerbyEvent, EventDefaults};
use derby::session::Session;
use derby::snapshot::{EventSnapshot, LegacyExport};
use derby::storage::{JsonFileStore, SnapshotStore};
use derby::types::{DerbyError, Phase, Podium};

fn temp_path() -> PathBuf {
    std::env::temp_dir().join(format!("derby_it_{}.json", uuid::Uuid::new_v4()))
}

struct TempState(PathBuf);

impl Drop for TempState {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

fn open(path: &PathBuf) -> Session<JsonFileStore> {
    Session::open(JsonFileStore::new(path), EventDefaults::default()).unwrap()
}

#[test]
fn test_session_survives_restart() {
    let state = TempState(temp_path());

    {
        let mut session = open(&state.0);
        session.apply(|e| e.setup_horses(6)).unwrap();
        for name in ["Alice", "Bob"] {
            session.apply(|e| e.add_bettor(name)).unwrap();
        }
        session.apply(|e| e.set_target_bettor_count(2)).unwrap();
        session.apply(|e| e.complete_bettor_setup()).unwrap();
        let picks = BTreeMap::from([("Bob".to_string(), "2".to_string())]);
        session
            .apply(|e| e.finalize_race(1, Podium::new("2", "4", "6"), picks))
            .unwrap();
        session.apply(|e| e.advance_race()).unwrap();
    }

    let session = open(&state.0);
    let event = session.event();
    assert_eq!(event.phase(), Phase::Active);
    assert_eq!(event.config().current_race, 2);
    assert_eq!(event.list_horses().len(), 6);
    assert_eq!(event.roster().bettor_id("Bob").map(|id| id.0), Some(2));

    let standings = event.compute_standings();
    assert_eq!(standings[0].bettor_name, "Bob");
    assert_eq!(standings[0].total_points, 3);
    assert!(event.get_race(1).unwrap().completed_at().is_some());
}

#[test]
fn test_failed_command_leaves_file_untouched() {
    let state = TempState(temp_path());
    let mut session = open(&state.0);
    session.apply(|e| e.setup_horses(3)).unwrap();
    let before = std::fs::read_to_string(&state.0).unwrap();

    let err = session.apply(|e| e.setup_horses(5)).unwrap_err();
    assert!(matches!(err, DerbyError::Precondition(_)));
    assert_eq!(std::fs::read_to_string(&state.0).unwrap(), before);
    assert_eq!(session.event().list_horses().len(), 3);
}

#[test]
fn test_corrupt_state_file_is_storage_error() {
    let state = TempState(temp_path());
    std::fs::write(&state.0, "not json at all").unwrap();

    let result = Session::open(JsonFileStore::new(&state.0), EventDefaults::default());
    assert!(matches!(result, Err(DerbyError::Storage(_))));
}

#[test]
fn test_export_import_preserves_event() {
    let mut event = DerbyEvent::default();
    event.add_horses_bulk(["1", "2", "3", "4", "10"]);
    event.complete_horse_setup().unwrap();
    event.add_bettors_bulk(["Amy", "Zoe", "Max"]);
    event.set_target_bettor_count(3).unwrap();
    event.complete_bettor_setup().unwrap();
    event
        .finalize_race(
            1,
            Podium::new("10", "2", "3"),
            BTreeMap::from([
                ("Amy".to_string(), "10".to_string()),
                ("Max".to_string(), "3".to_string()),
            ]),
        )
        .unwrap();
    event.create_race(2).unwrap();
    event.advance_race().unwrap();
    // Removed after setup closed; the import has to cope with 2 of 3.
    event.remove_bettor("Zoe").unwrap();

    let json = serde_json::to_string(&event.export_snapshot()).unwrap();
    let snapshot: EventSnapshot = serde_json::from_str(&json).unwrap();
    let restored = DerbyEvent::import_snapshot(&snapshot, EventDefaults::default()).unwrap();

    assert_eq!(restored.phase(), Phase::Active);
    assert_eq!(restored.config(), event.config());
    assert_eq!(restored.list_horses(), event.list_horses());
    assert_eq!(restored.list_bettors(), vec!["Amy", "Max"]);
    assert_eq!(restored.list_races().len(), 2);
    assert_eq!(restored.compute_standings(), event.compute_standings());
    assert_eq!(
        restored.get_race(1).unwrap().completed_at(),
        event.get_race(1).unwrap().completed_at()
    );
}

#[test]
fn test_invalid_snapshot_rejected_whole() {
    let mut event = DerbyEvent::default();
    event.setup_horses(4).unwrap();
    event.add_bettor("Alice").unwrap();
    event.set_target_bettor_count(1).unwrap();
    event.complete_bettor_setup().unwrap();
    let mut snapshot = event.export_snapshot();

    // Pick on a horse that is not in the roster.
    snapshot.races.push(derby::snapshot::RaceSnapshot {
        race_number: 1,
        result: Some(derby::snapshot::ResultSnapshot {
            first: "1".into(),
            second: "2".into(),
            third: "3".into(),
            completed_at: None,
        }),
        picks: BTreeMap::from([("Alice".to_string(), "9".to_string())]),
    });

    let err = DerbyEvent::import_snapshot(&snapshot, EventDefaults::default()).unwrap_err();
    assert!(matches!(err, DerbyError::Validation(_)));
}

#[test]
fn test_legacy_export_import() {
    let legacy = r#"{
        "horses": ["1", "2", "3", "4", "5"],
        "bettors": [{"name": "Alice"}, {"name": "Bob"}],
        "races": [
            {
                "race_number": 1,
                "results": {
                    "first": "5",
                    "second": "1",
                    "third": "2",
                    "timestamp": "2024-05-04 18:51:00",
                    "bettor_bets": {"Alice": "1", "Bob": ""}
                }
            },
            {"race_number": 2, "results": null}
        ],
        "current_race": 2,
        "setup_complete": true,
        "target_horse_count": 5,
        "bettors_setup_complete": true,
        "target_bettor_count": 2,
        "total_races": 6
    }"#;

    let old: LegacyExport = serde_json::from_str(legacy).unwrap();
    let snapshot: EventSnapshot = old.into();
    let event = DerbyEvent::import_snapshot(&snapshot, EventDefaults::default()).unwrap();

    assert_eq!(event.phase(), Phase::Active);
    assert_eq!(event.config().total_races, 6);
    assert_eq!(event.config().current_race, 2);
    assert!(event.picks_for(1).get("Bob").is_none());

    let standings = event.compute_standings();
    assert_eq!(standings[0].bettor_name, "Alice");
    assert_eq!(standings[0].total_points, 2);

    let completed = event.get_race(1).unwrap().completed_at().unwrap();
    assert_eq!(completed.to_rfc3339(), "2024-05-04T18:51:00+00:00");
}

#[test]
fn test_store_trait_round_trip() {
    let state = TempState(temp_path());
    let store = JsonFileStore::new(&state.0);
    assert!(store.load().unwrap().is_none());

    let snapshot = DerbyEvent::default().export_snapshot();
    store.save(&snapshot).unwrap();
    assert_eq!(store.load().unwrap(), Some(snapshot));
}

// ---------------------------------------------------------------------------
// Edge states must reopen
// ---------------------------------------------------------------------------

/// Drive a session into some state, then check a fresh `Session::open`
/// on the same file sees the same event.
fn assert_reopens<F>(build: F)
where
    F: FnOnce(&mut Session<JsonFileStore>),
{
    let state = TempState(temp_path());
    let before = {
        let mut session = open(&state.0);
        build(&mut session);
        session.into_event()
    };

    let reopened = Session::open(JsonFileStore::new(&state.0), EventDefaults::default())
        .unwrap_or_else(|e| panic!("state file did not reopen: {e}"));
    let after = reopened.event();

    assert_eq!(after.phase(), before.phase());
    assert_eq!(after.config(), before.config());
    assert_eq!(after.list_horses(), before.list_horses());
    assert_eq!(after.list_bettors(), before.list_bettors());
    assert_eq!(after.list_races().len(), before.list_races().len());
    assert_eq!(after.compute_standings(), before.compute_standings());
}

fn racing(session: &mut Session<JsonFileStore>, bettors: &[&str]) {
    session.apply(|e| e.setup_horses(6)).unwrap();
    for name in bettors {
        session.apply(|e| e.add_bettor(name)).unwrap();
    }
    let target = bettors.len() as u32;
    session.apply(|e| e.set_target_bettor_count(target)).unwrap();
    session.apply(|e| e.complete_bettor_setup()).unwrap();
}

#[test]
fn test_reopen_with_results_past_race_count() {
    assert_reopens(|session| {
        racing(session, &["Alice", "Bob"]);
        session.apply(|e| e.set_total_races(2)).unwrap();
        for race in 1..=3 {
            let picks = BTreeMap::from([("Alice".to_string(), "1".to_string())]);
            session
                .apply(|e| e.finalize_race(race, Podium::new("1", "2", "3"), picks))
                .unwrap();
            if race < 3 {
                session.apply(|e| e.advance_race()).unwrap();
            }
        }
        assert_eq!(session.event().config().current_race, 3);
        assert_eq!(session.event().phase(), Phase::Complete);
    });
}

#[test]
fn test_reopen_complete_after_shortening() {
    assert_reopens(|session| {
        racing(session, &["Alice"]);
        session.apply(|e| e.set_total_races(2)).unwrap();
        session.apply(|e| e.advance_race()).unwrap();
        session.apply(|e| e.advance_race()).unwrap();
        assert_eq!(session.event().phase(), Phase::Complete);
    });
}

#[test]
fn test_reopen_with_every_bettor_removed() {
    assert_reopens(|session| {
        racing(session, &["Alice", "Bob"]);
        let picks = BTreeMap::from([("Bob".to_string(), "2".to_string())]);
        session
            .apply(|e| e.finalize_race(1, Podium::new("2", "4", "6"), picks))
            .unwrap();
        session.apply(|e| e.remove_bettor("Alice")).unwrap();
        session.apply(|e| e.remove_bettor("Bob")).unwrap();
        assert_eq!(session.event().phase(), Phase::Active);
    });
}

#[test]
fn test_reopen_after_bettors_removed_and_horses_reset() {
    assert_reopens(|session| {
        racing(session, &["Alice"]);
        session.apply(|e| e.remove_bettor("Alice")).unwrap();
        session.apply(|e| e.reset_horses()).unwrap();
        assert_eq!(session.event().phase(), Phase::AwaitingHorseSetup);
    });
}

#[test]
fn test_reopen_with_every_horse_removed() {
    assert_reopens(|session| {
        session.apply(|e| e.setup_horses(3)).unwrap();
        for number in ["1", "2", "3"] {
            session.apply(|e| e.remove_horse(number)).unwrap();
        }
        assert_eq!(session.event().phase(), Phase::AwaitingBettorSetup);
        assert!(session.event().list_horses().is_empty());
    });
}

#[test]
fn test_reopen_with_bettors_below_target() {
    assert_reopens(|session| {
        racing(session, &["Alice", "Bob", "Carol"]);
        session.apply(|e| e.remove_bettor("Carol")).unwrap();
        assert_eq!(session.event().config().target_bettor_count, Some(3));
    });
}
