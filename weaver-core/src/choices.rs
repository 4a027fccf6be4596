//! Choice generation and free-text classification.

use crate::dice::{self, StoryRng};
use crate::world::{Ability, Choice, Scene};
use once_cell::sync::Lazy;
use regex::Regex;

/// How many choices a scene offers.
pub const CHOICES_PER_SCENE: usize = 3;

static ABILITY_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\((STR|DEX|INT|CHA)\)\s*$").expect("valid regex"));

/// Keyword classes in priority order. The first class that matches wins.
static KEYWORDS: Lazy<Vec<(Ability, Regex)>> = Lazy::new(|| {
    [
        (
            Ability::Strength,
            r"\b(push|lift|break|smash|force|hold|shove|drag)\b",
        ),
        (
            Ability::Dexterity,
            r"\b(sneak|hide|slip|dodge|climb|balance|steal|pick)\b",
        ),
        (
            Ability::Intelligence,
            r"\b(look|inspect|study|analyze|read|recall|solve|decipher|investigate)\b",
        ),
        (
            Ability::Charisma,
            r"\b(speak|persuade|charm|intimidate|perform|negotiate|parley)\b",
        ),
    ]
    .into_iter()
    .map(|(ability, pattern)| (ability, Regex::new(pattern).expect("valid regex")))
    .collect()
});

/// The authored pool for a scene. Unknown scenes use the Halls pool.
pub fn scene_pool(scene: &Scene) -> Vec<Choice> {
    let pool: [(&str, Ability); 3] = match scene {
        Scene::Archives => [
            ("You scan the index sigils (INT)", Ability::Intelligence),
            ("You charm a wary scribe (CHA)", Ability::Charisma),
            ("You reach a high ledge (DEX)", Ability::Dexterity),
        ],
        Scene::Depths => [
            ("You hold your ground (STR)", Ability::Strength),
            ("You read the tide\u{2019}s cadence (INT)", Ability::Intelligence),
            ("You defy it with clear words (CHA)", Ability::Charisma),
        ],
        Scene::Halls | Scene::Other(_) => [
            ("You study the floor mosaics (INT)", Ability::Intelligence),
            ("You slip between patrols (DEX)", Ability::Dexterity),
            ("You pry the rusted grate (STR)", Ability::Strength),
        ],
    };

    let target = match scene {
        Scene::Other(_) => Scene::Halls,
        known => known.clone(),
    };

    pool.into_iter()
        .map(|(sentence, ability)| Choice::new(sentence, ability, target.clone()))
        .collect()
}

/// A shuffled choice set for `scene`.
///
/// Nothing is remembered between calls, so the same options come back.
pub fn choices_for_scene(scene: &Scene, rng: &mut dyn StoryRng) -> Vec<Choice> {
    let mut pool = scene_pool(scene);
    dice::shuffle(&mut pool, rng);
    pool.truncate(CHOICES_PER_SCENE);
    pool
}

/// The climax choice, offered once enough seals are held.
pub fn confront_choice() -> Choice {
    Choice::new(
        "You confront the Unfathomer (CHA)",
        Ability::Charisma,
        Scene::climax(),
    )
}

/// Guess the ability a free-text action leans on. Defaults to INT.
pub fn infer_ability(text: &str) -> Ability {
    let text = text.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, pattern)| pattern.is_match(&text))
        .map(|(ability, _)| *ability)
        .unwrap_or(Ability::Intelligence)
}

/// The action a choice describes, without its trailing ability tag.
pub fn action_text(sentence: &str) -> String {
    ABILITY_TAG.replace(sentence, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::SeededRng;
    use crate::testing::ScriptedRng;

    #[test]
    fn test_every_scene_offers_three() {
        let mut rng = SeededRng::new(5);
        for scene in [
            Scene::Halls,
            Scene::Archives,
            Scene::Depths,
            Scene::Other("Vaults".to_string()),
        ] {
            let choices = choices_for_scene(&scene, &mut rng);
            assert_eq!(choices.len(), CHOICES_PER_SCENE);

            let mut sentences: Vec<_> = choices.iter().map(|c| c.sentence.clone()).collect();
            sentences.sort();
            sentences.dedup();
            assert_eq!(sentences.len(), CHOICES_PER_SCENE, "{scene}");
        }
    }

    #[test]
    fn test_choices_are_a_permutation_of_the_pool() {
        let mut rng = SeededRng::new(11);
        let mut pool = scene_pool(&Scene::Archives);
        let mut offered = choices_for_scene(&Scene::Archives, &mut rng);
        pool.sort_by(|a, b| a.sentence.cmp(&b.sentence));
        offered.sort_by(|a, b| a.sentence.cmp(&b.sentence));
        assert_eq!(pool, offered);
    }

    #[test]
    fn test_unknown_scene_uses_halls_pool() {
        assert_eq!(
            scene_pool(&Scene::Other("Clockwork Bazaar".to_string())),
            scene_pool(&Scene::Halls)
        );
    }

    #[test]
    fn test_exhausted_script_keeps_pool_order() {
        let mut rng = ScriptedRng::new(vec![]);
        let choices = choices_for_scene(&Scene::Depths, &mut rng);
        assert_eq!(choices, scene_pool(&Scene::Depths));
    }

    #[test]
    fn test_confront_choice() {
        let choice = confront_choice();
        assert_eq!(choice.ability, Ability::Charisma);
        assert_eq!(choice.target_scene, Scene::Depths);
        assert_eq!(action_text(&choice.sentence), "You confront the Unfathomer");
    }

    #[test]
    fn test_infer_ability_keywords() {
        assert_eq!(infer_ability("I shove the cart aside"), Ability::Strength);
        assert_eq!(infer_ability("Sneak past the guard"), Ability::Dexterity);
        assert_eq!(infer_ability("inspect the runes"), Ability::Intelligence);
        assert_eq!(infer_ability("PERSUADE the scribe"), Ability::Charisma);
    }

    #[test]
    fn test_infer_ability_priority_and_default() {
        // STR outranks CHA when both match.
        assert_eq!(
            infer_ability("speak softly, then push the door"),
            Ability::Strength
        );
        assert_eq!(infer_ability("wait for the bells"), Ability::Intelligence);
        // Whole words only.
        assert_eq!(infer_ability("the pushcart rattles"), Ability::Intelligence);
    }

    #[test]
    fn test_action_text_strips_tag() {
        assert_eq!(
            action_text("You pry the rusted grate (STR)"),
            "You pry the rusted grate"
        );
        assert_eq!(action_text("You wave  (CHA)  "), "You wave");
        assert_eq!(action_text("Walk (slowly)"), "Walk (slowly)");
    }
}
