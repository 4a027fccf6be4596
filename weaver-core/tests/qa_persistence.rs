//! QA tests for saving and restoring tales.
//!
//! Run with: `cargo test -p weaver-core --test qa_persistence`

use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use weaver_core::persist::{PersistError, SAVE_VERSION, STATE_KEY};
use weaver_core::testing::{assert_phase, assert_transcript_in_step, assert_turn};
use weaver_core::world::Seal;
use weaver_core::{
    FileStore, KeyValueStore, MemoryStore, Tale, TaleHarness, TalePhase, WeaverConfig,
};

fn config() -> WeaverConfig {
    WeaverConfig::new().with_seed(7)
}

fn reopen(store: &Arc<MemoryStore>) -> Tale {
    Tale::local(&config(), Box::new(store.clone()))
}

async fn played_harness() -> TaleHarness {
    let mut harness = TaleHarness::new();
    harness.begin();
    harness.tale.state_mut().flags.award_seal(Seal::Echo);
    harness.act("search the alcove").await.unwrap();
    harness.choose(1).await.unwrap();
    harness
}

/// A store whose every operation fails.
struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get_raw(&self, _key: &str) -> Result<Option<String>, PersistError> {
        Err(PersistError::Unavailable("quota exceeded".to_string()))
    }

    fn set_raw(&self, _key: &str, _value: &str) -> Result<(), PersistError> {
        Err(PersistError::Unavailable("quota exceeded".to_string()))
    }

    fn delete(&self, _key: &str) -> Result<(), PersistError> {
        Err(PersistError::Unavailable("quota exceeded".to_string()))
    }
}

fn saved_json(store: &MemoryStore) -> Value {
    let raw = store.get_raw(STATE_KEY).unwrap().expect("a saved tale");
    serde_json::from_str(&raw).unwrap()
}

// =============================================================================
// Round trips
// =============================================================================

#[tokio::test]
async fn test_save_and_load_restore_everything() {
    let harness = played_harness().await;
    harness.tale.save();

    let mut restored = reopen(&harness.store);
    assert_eq!(restored.phase(), TalePhase::NotStarted);
    assert!(restored.load());

    assert_eq!(restored.state(), harness.state());
    assert_eq!(restored.choices(), harness.tale.choices());
    assert_eq!(restored.phase(), TalePhase::InProgress);
    assert_eq!(restored.turn(), 3);
    assert_eq!(restored.seed(), 7);
}

#[tokio::test]
async fn test_restored_tale_keeps_playing() {
    let harness = played_harness().await;
    harness.tale.save();

    let mut restored = reopen(&harness.store);
    assert!(restored.load());
    restored.act("climb the stair").await.unwrap();
    assert_eq!(restored.turn(), 4);
    assert_eq!(restored.state().beats().len(), 4);
}

#[test]
fn test_file_store_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut tale = Tale::local(&config(), Box::new(FileStore::new(dir.path())));
    tale.begin();
    tale.save();
    assert!(dir.path().join("dds_state.json").exists());

    let mut restored = Tale::local(&config(), Box::new(FileStore::new(dir.path())));
    assert!(restored.load());
    assert_eq!(restored.state(), tale.state());
    assert_eq!(restored.choices(), tale.choices());
}

#[test]
fn test_ended_tale_loads_ended() {
    let mut harness = TaleHarness::new();
    harness.begin();
    harness.tale.end();
    harness.tale.save();

    let mut restored = reopen(&harness.store);
    assert!(restored.load());
    assert_eq!(restored.phase(), TalePhase::Ended);
    assert!(restored.choices().is_empty());
    assert!(!restored.undo());
}

#[test]
fn test_endpoint_survives_new_tale() {
    let mut harness = TaleHarness::new();
    harness.tale.set_endpoint("/night-turn");

    let tale = reopen(&harness.store);
    assert_eq!(tale.endpoint(), "/night-turn");
}

// =============================================================================
// Unusable saves
// =============================================================================

#[test]
fn test_load_without_save() {
    let mut harness = TaleHarness::new();
    assert!(!harness.tale.load());
    assert_phase(&harness, TalePhase::NotStarted);
    assert_turn(&harness, 0);
}

#[test]
fn test_corrupt_save_is_ignored() {
    let mut harness = TaleHarness::new();
    harness.begin();
    let before = harness.state().clone();

    harness
        .store
        .set_raw(STATE_KEY, "{\"version\": 1, \"state\": [")
        .unwrap();
    assert!(!harness.tale.load());
    assert_eq!(harness.state(), &before);
    assert_phase(&harness, TalePhase::InProgress);
}

#[test]
fn test_newer_save_version_is_ignored() {
    let mut harness = TaleHarness::new();
    harness.begin();
    harness.tale.save();

    let mut json = saved_json(&harness.store);
    json["version"] = Value::from(SAVE_VERSION + 1);
    harness
        .store
        .set_raw(STATE_KEY, &json.to_string())
        .unwrap();

    let mut restored = reopen(&harness.store);
    assert!(!restored.load());
    assert_eq!(restored.phase(), TalePhase::NotStarted);
}

#[test]
fn test_failing_store_never_panics() {
    let mut tale = Tale::local(&config(), Box::new(FailingStore));
    assert_eq!(tale.endpoint(), "/dm-turn");

    tale.begin();
    tale.save();
    assert!(!tale.load());
    assert_eq!(tale.set_endpoint("/elsewhere"), "/elsewhere");
    assert_eq!(tale.phase(), TalePhase::InProgress);
}

// =============================================================================
// Repair on load
// =============================================================================

#[tokio::test]
async fn test_transcript_rebuilt_on_load() {
    let harness = played_harness().await;
    harness.tale.save();

    let mut json = saved_json(&harness.store);
    json["state"]["transcript"] = Value::Array(Vec::new());
    harness
        .store
        .set_raw(STATE_KEY, &json.to_string())
        .unwrap();

    let mut restored = TaleHarness::new();
    restored.tale = reopen(&harness.store);
    assert!(restored.tale.load());
    assert_transcript_in_step(&restored);
    assert_eq!(restored.state().transcript().len(), 3);
}

#[test]
fn test_missing_choices_are_regenerated() {
    let mut harness = TaleHarness::new();
    harness.begin();
    harness.tale.save();

    let mut json = saved_json(&harness.store);
    if let Value::Object(map) = &mut json {
        map.remove("choices");
    }
    harness
        .store
        .set_raw(STATE_KEY, &json.to_string())
        .unwrap();

    let mut restored = reopen(&harness.store);
    assert!(restored.load());
    assert_eq!(restored.choices().len(), 3);
}

#[test]
fn test_boss_ready_restored_from_seals() {
    let mut harness = TaleHarness::new();
    harness.begin();
    harness.tale.save();

    let mut json = saved_json(&harness.store);
    json["state"]["flags"]["seals"] = serde_json::json!(["Brass", "Stone", "Brass"]);
    json["state"]["flags"]["bossReady"] = Value::Bool(false);
    harness
        .store
        .set_raw(STATE_KEY, &json.to_string())
        .unwrap();

    let mut restored = reopen(&harness.store);
    assert!(restored.load());
    assert_eq!(restored.state().flags.seals(), &[Seal::Brass, Seal::Stone]);
    assert!(restored.state().flags.boss_ready());
}

// =============================================================================
// Stored format
// =============================================================================

#[test]
fn test_saved_json_uses_wire_names() {
    let mut harness = TaleHarness::new();
    harness.begin();
    harness.tale.save();

    let json = saved_json(&harness.store);
    assert_eq!(json["version"], SAVE_VERSION);
    assert_eq!(json["phase"], "InProgress");
    assert!(json["saved_at"].is_string());
    assert_eq!(json["choices"].as_array().map(Vec::len), Some(3));

    let state = &json["state"];
    assert_eq!(state["seed"], 7);
    assert_eq!(state["turn"], 1);
    assert_eq!(state["scene"], "Halls");
    assert_eq!(state["storyBeats"].as_array().map(Vec::len), Some(1));
    assert_eq!(state["character"]["STR"], 12);
    assert_eq!(state["character"]["Gold"], 5);
    assert_eq!(state["flags"]["bossReady"], false);
    assert_eq!(state["flags"]["rumors"], true);
}
