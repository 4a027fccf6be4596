//! QA tests for the turn loop with local narration.
//!
//! These tests drive a full tale through the harness and force rolls with a
//! scripted RNG. Run with: `cargo test -p weaver-core --test qa_turn_flow`

use weaver_core::choices::confront_choice;
use weaver_core::testing::{
    assert_has_seal, assert_offers_climax, assert_phase, assert_transcript_in_step, assert_turn,
};
use weaver_core::world::{Ability, CharacterEdit, Scene, Seal};
use weaver_core::{SeededRng, TaleHarness, TalePhase};

fn choice_index(harness: &TaleHarness, ability: Ability) -> usize {
    harness
        .tale
        .choices()
        .iter()
        .position(|choice| choice.ability == ability)
        .expect("choice for ability")
}

// =============================================================================
// Forced rolls
// =============================================================================

#[tokio::test]
async fn test_forced_roll_passes_and_echoes_action() {
    let mut harness = TaleHarness::new();
    harness.begin();
    assert_eq!(harness.tale.character().strength, 12);

    let index = choice_index(&harness, Ability::Strength);
    // DC 10, die shows 15, no seal.
    harness.script(vec![0, 15, 5]);
    let outcome = harness.choose(index).await.unwrap();

    assert_eq!(outcome.check.roll, 15);
    assert_eq!(outcome.check.modifier, 1);
    assert_eq!(outcome.check.difficulty, 10);
    assert_eq!(outcome.check.total, 16);
    assert!(outcome.check.passed);
    assert_eq!(outcome.action, "You pry the rusted grate");

    let beat = harness.state().last_beat().unwrap();
    assert!(beat.text.starts_with("You pry the rusted grate. "));
    assert!(beat.text.contains("and the moment tilts your way."));
    assert_eq!(beat.roll_info.as_deref(), Some("d20 15 +1 vs DC 10 ⇒ 16"));

    assert_turn(&harness, 2);
    assert_transcript_in_step(&harness);
    assert_eq!(harness.tale.choices().len(), 3);
}

#[tokio::test]
async fn test_free_text_is_capitalized() {
    let mut harness = TaleHarness::new();
    harness.begin();
    harness.script(vec![0, 15, 5]);

    let outcome = harness.act("push the crate aside").await.unwrap();
    assert_eq!(outcome.ability, Ability::Strength);
    assert!(harness
        .last_beat()
        .unwrap()
        .starts_with("Push the crate aside. "));
}

#[tokio::test]
async fn test_failed_check_uses_failure_note() {
    let mut harness = TaleHarness::new();
    harness.begin();
    // DC 13, die shows 1.
    harness.script(vec![3, 1]);

    let outcome = harness.act("decipher the glyphs").await.unwrap();
    assert_eq!(outcome.ability, Ability::Intelligence);
    assert!(!outcome.check.passed);
    assert_eq!(
        harness.last_beat().unwrap(),
        "Decipher the glyphs. Two symbols argue; the truth steps back. \
         The city still whispers about the Unfathomer below; its tide is patient, not kind."
    );
    assert!(harness.state().flags.seals().is_empty());
}

// =============================================================================
// Seals and the climax
// =============================================================================

#[tokio::test]
async fn test_second_seal_unlocks_climax() {
    let mut harness = TaleHarness::new();
    harness.begin();
    harness.tale.state_mut().flags.award_seal(Seal::Brass);
    assert!(!harness.state().flags.boss_ready());
    assert!(!harness.offers_climax());

    // DC 10, die 15, seal draw hits, first of [Echo, Stone].
    harness.script(vec![0, 15, 1, 0]);
    harness.choose(0).await.unwrap();

    assert_has_seal(&harness, Seal::Echo);
    assert_eq!(harness.state().flags.seals(), &[Seal::Brass, Seal::Echo]);
    assert!(harness.state().flags.boss_ready());
    assert!(harness.last_beat().unwrap().contains("the Seal of Echo."));
    assert_offers_climax(&harness);
    assert_eq!(harness.tale.choices().len(), 4);
}

#[tokio::test]
async fn test_climax_choice_keeps_local_tale_in_scene() {
    let mut harness = TaleHarness::new();
    harness.begin();
    harness.tale.state_mut().flags.award_seal(Seal::Brass);
    harness.script(vec![0, 15, 1, 0]);
    harness.choose(0).await.unwrap();

    let confront = harness
        .tale
        .choices()
        .iter()
        .position(|choice| *choice == confront_choice())
        .unwrap();
    harness.script(vec![0, 15, 5]);
    let outcome = harness.choose(confront).await.unwrap();

    assert_eq!(outcome.ability, Ability::Charisma);
    assert!(outcome.check.passed);
    assert_eq!(outcome.scene, Scene::Halls);
    assert_eq!(harness.state().scene, Scene::Halls);
    assert_eq!(harness.tale.choices().len(), 4);
    assert!(harness
        .tale
        .choices()
        .iter()
        .filter(|choice| **choice != confront_choice())
        .all(|choice| choice.target_scene == Scene::Halls));
    assert_offers_climax(&harness);
}

#[tokio::test]
async fn test_flags_hold_across_long_play() {
    let mut harness = TaleHarness::new();
    harness.begin();
    harness.tale.set_rng(Box::new(SeededRng::new(2024)));

    let mut was_ready = false;
    for turn in 0..60 {
        if turn % 3 == 0 {
            harness.act("study the carvings").await.unwrap();
        } else {
            let last = harness.tale.choices().len() - 1;
            harness.choose(turn % (last + 1)).await.unwrap();
        }

        let flags = &harness.state().flags;
        let mut seals = flags.seals().to_vec();
        seals.sort_by_key(|seal| seal.name());
        seals.dedup();
        assert_eq!(seals.len(), flags.seals().len());
        assert!(flags.seals().len() <= Seal::ALL.len());

        if was_ready {
            assert!(flags.boss_ready());
        }
        was_ready = flags.boss_ready();
        assert_transcript_in_step(&harness);
    }
    assert_turn(&harness, 61);
}

// =============================================================================
// Undo, end, restart
// =============================================================================

#[tokio::test]
async fn test_undo_on_first_turn_changes_nothing() {
    let mut harness = TaleHarness::new();
    harness.begin();
    let before = harness.state().clone();
    let choices = harness.tale.choices().to_vec();

    assert!(!harness.tale.undo());
    assert_eq!(harness.state(), &before);
    assert_eq!(harness.tale.choices(), choices.as_slice());
}

#[tokio::test]
async fn test_undo_on_third_turn_drops_one_beat() {
    let mut harness = TaleHarness::new();
    harness.begin();
    harness.tale.state_mut().flags.award_seal(Seal::Stone);
    harness.script(vec![0, 15, 5]);
    harness.act("look around").await.unwrap();
    // Seal draw hits on the second turn.
    harness.script(vec![0, 15, 1, 0]);
    harness.act("read the plaque").await.unwrap();
    assert_turn(&harness, 3);
    assert_has_seal(&harness, Seal::Brass);

    let beats = harness.state().beats().len();
    let transcript = harness.state().transcript().len();
    assert!(harness.tale.undo());

    assert_turn(&harness, 2);
    assert_eq!(harness.state().beats().len(), beats - 1);
    assert_eq!(harness.state().transcript().len(), transcript - 1);
    assert_eq!(harness.tale.choices().len(), 3);
    // Deltas from the undone turn stay.
    assert_has_seal(&harness, Seal::Brass);
    assert!(harness.state().flags.boss_ready());
}

#[tokio::test]
async fn test_end_appends_one_beat_and_clears_choices() {
    let mut harness = TaleHarness::new();
    harness.begin();
    harness.script(vec![3, 1]);
    harness.act("look around").await.unwrap();
    let beats = harness.beat_count();
    let turn = harness.tale.turn();

    harness.tale.end();
    assert_eq!(harness.beat_count(), beats + 1);
    assert!(harness.tale.choices().is_empty());
    assert_turn(&harness, turn);
    assert_phase(&harness, TalePhase::Ended);
    assert!(harness.last_beat().unwrap().starts_with("Epilogue"));
    assert!(harness.last_beat().unwrap().contains("Seals gained: none."));

    // Ending again still adds exactly one beat.
    harness.tale.end();
    assert_eq!(harness.beat_count(), beats + 2);
    assert!(!harness.tale.undo());
}

#[tokio::test]
async fn test_end_before_begin() {
    let mut harness = TaleHarness::new();
    harness.tale.end();
    assert_eq!(harness.beat_count(), 1);
    assert!(harness.tale.choices().is_empty());
    assert_phase(&harness, TalePhase::Ended);
}

#[tokio::test]
async fn test_begin_again_keeps_character() {
    let mut harness = TaleHarness::new();
    harness.begin();
    harness.tale.state_mut().flags.award_seal(Seal::Echo);
    harness.act("sneak past").await.unwrap();
    harness.tale.end();

    let mut edit = CharacterEdit::default();
    edit.set("name", "Ysolda");
    edit.set("CHA", "16");
    harness.tale.edit_character(&edit);
    harness.begin();

    assert_turn(&harness, 1);
    assert_phase(&harness, TalePhase::InProgress);
    assert_eq!(harness.beat_count(), 1);
    assert!(harness.state().flags.seals().is_empty());
    assert_eq!(harness.state().scene, Scene::Halls);
    assert_eq!(harness.tale.character().name, "Ysolda");
    assert_eq!(harness.tale.character().charisma, 16);
}

#[tokio::test]
async fn test_auto_generated_character_is_in_range() {
    let mut harness = TaleHarness::new();
    harness.tale.auto_generate_character();
    let character = harness.tale.character();

    for ability in Ability::ALL {
        assert!((8..=18).contains(&character.score(ability)));
    }
    assert!((8..=20).contains(&character.hit_points));
    assert!(character.gold <= 25);
    assert!(!character.inventory.is_empty());
}
