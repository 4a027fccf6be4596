//! Built-in narration from authored fragments.

use super::{NarrationResult, Narrator, TurnPayload};
use crate::choices::{choices_for_scene, confront_choice};
use crate::dice::{self, StoryRng};
use crate::world::{Ability, FlagsPatch, InventoryDelta, Seal, SEALS_FOR_CLIMAX};
use async_trait::async_trait;

const RUMOR_NUDGE: &str =
    " The city still whispers about the Unfathomer below; its tide is patient, not kind.";

/// One chance in this many to find a seal on a passed check.
const SEAL_ODDS: i32 = 5;

fn success_verbs(ability: Ability) -> &'static [&'static str] {
    match ability {
        Ability::Strength => &["you force the way", "you wrestle the obstacle", "you brace and heave"],
        Ability::Dexterity => &[
            "you move with quiet balance",
            "you slip along blind angles",
            "you work with careful hands",
        ],
        Ability::Intelligence => &[
            "you reason through the pattern",
            "you trace the hidden logic",
            "you test a small hypothesis",
        ],
        Ability::Charisma => &[
            "you speak with steady poise",
            "you read the room and guide it",
            "you put warm conviction to work",
        ],
    }
}

fn failure_note(ability: Ability) -> &'static str {
    match ability {
        Ability::Strength => "Your grip bites and the metal sings; the hall hears too much.",
        Ability::Dexterity => "A heel kisses grit; the torchlight notices.",
        Ability::Intelligence => "Two symbols argue; the truth steps back.",
        Ability::Charisma => "A word lands wrong; faces cool a measure.",
    }
}

/// Upper-case the first character.
pub(crate) fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Narrates locally. Only the RNG makes it vary.
///
/// Draw order: seal chance and seal pick (passed checks only), flavor line
/// (passed checks only), then the choice shuffle.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalNarrator;

impl LocalNarrator {
    pub fn narrate(&self, payload: &TurnPayload, rng: &mut dyn StoryRng) -> NarrationResult {
        let flags = &payload.snapshot.flags;

        let awarded = if payload.passed
            && flags.seals().len() < Seal::ALL.len()
            && rng.range(1, SEAL_ODDS) == 1
        {
            dice::pick(&flags.missing_seals(), rng).copied()
        } else {
            None
        };

        let story = compose(payload, awarded, rng);

        let mut flags_patch = FlagsPatch::default();
        if let Some(seal) = awarded {
            let mut seals = flags.seals().to_vec();
            seals.push(seal);
            flags_patch.seals = Some(seals);
        }

        // Local narration never moves the story; choices stay in the current scene.
        let next_choices = choices_for_scene(&payload.snapshot.scene, rng);

        let seal_count = flags.seals().len() + usize::from(awarded.is_some());
        let maybe_boss_option = (flags.boss_ready() || seal_count >= SEALS_FOR_CLIMAX)
            .then(confront_choice);

        NarrationResult {
            story_paragraph: Some(story),
            flags_patch: Some(flags_patch),
            inventory_delta: Some(InventoryDelta::default()),
            gold_delta: Some(0),
            next_choices: Some(next_choices),
            maybe_boss_option,
            scene: None,
        }
    }
}

fn compose(payload: &TurnPayload, awarded: Option<Seal>, rng: &mut dyn StoryRng) -> String {
    let mut text = format!("{}. ", capitalize(&payload.action));

    if payload.passed {
        let verb = dice::pick(success_verbs(payload.ability), rng)
            .copied()
            .unwrap_or("you press on");
        text.push_str(verb);
        text.push_str(" and the moment tilts your way.");
        if let Some(seal) = awarded {
            text.push_str(&format!(
                " A faint sigil warms at your wrist \u{2014} the Seal of {seal}."
            ));
        }
    } else {
        text.push_str(failure_note(payload.ability));
    }

    text.push_str(RUMOR_NUDGE);
    text
}

#[async_trait]
impl Narrator for LocalNarrator {
    async fn resolve_turn(&self, payload: &TurnPayload, rng: &mut dyn StoryRng) -> NarrationResult {
        self.narrate(payload, rng)
    }
}
