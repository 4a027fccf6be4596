//! Session state: the character, story flags, scene, and the beat log.
//!
//! Field names on the wire (and in saves) follow the Live DM contract:
//! `STR`/`DEX`/`INT`/`CHA`/`HP`/`Gold` on the character, camelCase flags.

use crate::dice::{self, StoryRng};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Abilities
// ============================================================================

/// One of the four character abilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    #[serde(rename = "STR")]
    Strength,
    #[serde(rename = "DEX")]
    Dexterity,
    #[serde(rename = "INT")]
    Intelligence,
    #[serde(rename = "CHA")]
    Charisma,
}

impl Ability {
    pub const ALL: [Ability; 4] = [
        Ability::Strength,
        Ability::Dexterity,
        Ability::Intelligence,
        Ability::Charisma,
    ];

    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Intelligence => "INT",
            Ability::Charisma => "CHA",
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

/// Error for unrecognized ability or seal names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownName {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for Ability {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STR" => Ok(Ability::Strength),
            "DEX" => Ok(Ability::Dexterity),
            "INT" => Ok(Ability::Intelligence),
            "CHA" => Ok(Ability::Charisma),
            _ => Err(UnknownName {
                kind: "ability",
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Seals
// ============================================================================

/// Narrative progress tokens. Two unlock the climax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Seal {
    Brass,
    Echo,
    Stone,
}

impl Seal {
    pub const ALL: [Seal; 3] = [Seal::Brass, Seal::Echo, Seal::Stone];

    pub fn name(&self) -> &'static str {
        match self {
            Seal::Brass => "Brass",
            Seal::Echo => "Echo",
            Seal::Stone => "Stone",
        }
    }
}

impl fmt::Display for Seal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Seal {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Seal::ALL
            .into_iter()
            .find(|seal| seal.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownName {
                kind: "seal",
                value: s.to_string(),
            })
    }
}

/// Number of seals that unlocks the climax.
pub const SEALS_FOR_CLIMAX: usize = 2;

// ============================================================================
// Scenes
// ============================================================================

/// Where the story currently is. Drives choice generation.
///
/// A remote narrator may name scenes this engine has no authored pool for;
/// those are kept as [`Scene::Other`] and use the default pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Scene {
    #[default]
    Halls,
    Archives,
    Depths,
    Other(String),
}

impl Scene {
    /// The scene the confrontation takes place in.
    pub fn climax() -> Scene {
        Scene::Depths
    }

    pub fn name(&self) -> &str {
        match self {
            Scene::Halls => "Halls",
            Scene::Archives => "Archives",
            Scene::Depths => "Depths",
            Scene::Other(name) => name,
        }
    }
}

impl From<&str> for Scene {
    fn from(name: &str) -> Self {
        let name = name.trim();
        match name.to_ascii_lowercase().as_str() {
            "halls" => Scene::Halls,
            "archives" => Scene::Archives,
            "depths" => Scene::Depths,
            _ => Scene::Other(name.to_string()),
        }
    }
}

impl From<String> for Scene {
    fn from(name: String) -> Self {
        Scene::from(name.as_str())
    }
}

impl From<Scene> for String {
    fn from(scene: Scene) -> Self {
        match scene {
            Scene::Other(name) => name,
            known => known.name().to_string(),
        }
    }
}

impl fmt::Display for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Character
// ============================================================================

/// Ability score bounds enforced when editing.
pub const ABILITY_RANGE: (i32, i32) = (6, 18);
pub const HP_RANGE: (i32, i32) = (4, 30);
pub const GOLD_RANGE: (i32, i32) = (0, 999);

const GENERATED_NAMES: [&str; 8] = [
    "Eldan", "Brassa", "Keled", "Varek", "Moriah", "Thrain", "Ysolda", "Kael",
];
const STARTING_KIT: [&str; 3] = ["Torch", "Canteen", "Oil Flask"];

/// The player character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    #[serde(rename = "STR")]
    pub strength: i32,
    #[serde(rename = "DEX")]
    pub dexterity: i32,
    #[serde(rename = "INT")]
    pub intelligence: i32,
    #[serde(rename = "CHA")]
    pub charisma: i32,
    #[serde(rename = "HP")]
    pub hit_points: i32,
    #[serde(rename = "Gold")]
    pub gold: u32,
    /// Item names in acquisition order; duplicates allowed.
    pub inventory: Vec<String>,
}

impl Default for Character {
    fn default() -> Self {
        Self {
            name: "Eldan".to_string(),
            strength: 12,
            dexterity: 14,
            intelligence: 12,
            charisma: 10,
            hit_points: 14,
            gold: 5,
            inventory: vec!["Torch".to_string(), "Canteen".to_string()],
        }
    }
}

impl Character {
    pub fn score(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Intelligence => self.intelligence,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn set_score(&mut self, ability: Ability, score: i32) {
        match ability {
            Ability::Strength => self.strength = score,
            Ability::Dexterity => self.dexterity = score,
            Ability::Intelligence => self.intelligence = score,
            Ability::Charisma => self.charisma = score,
        }
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        dice::modifier(self.score(ability))
    }

    /// Add `delta` gold, never going below zero.
    pub fn apply_gold_delta(&mut self, delta: i64) {
        let gold = (i64::from(self.gold) + delta).clamp(0, i64::from(u32::MAX));
        self.gold = u32::try_from(gold).unwrap_or(u32::MAX);
    }

    /// Drop every item named in `remove`, then append `add`.
    pub fn apply_inventory_delta(&mut self, delta: &InventoryDelta) {
        self.inventory.retain(|item| !delta.remove.contains(item));
        self.inventory.extend(delta.add.iter().cloned());
    }

    /// Apply a character edit. Blank or unparseable fields keep their value.
    pub fn apply_edit(&mut self, edit: &CharacterEdit) {
        if let Some(name) = edit.name.as_deref().map(str::trim) {
            if !name.is_empty() {
                self.name = name.to_string();
            }
        }

        for ability in Ability::ALL {
            let current = self.score(ability);
            let updated = edited_number(edit.score(ability), current, ABILITY_RANGE);
            self.set_score(ability, updated);
        }

        self.hit_points = edited_number(edit.hit_points.as_deref(), self.hit_points, HP_RANGE);

        let gold = i32::try_from(self.gold).unwrap_or(GOLD_RANGE.1);
        let gold = edited_number(edit.gold.as_deref(), gold, GOLD_RANGE);
        self.gold = u32::try_from(gold).unwrap_or(0);

        if let Some(inventory) = edit.inventory.as_deref() {
            self.inventory = inventory
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    /// Roll up a fresh random character.
    pub fn auto_generate(rng: &mut dyn StoryRng) -> Self {
        let name = dice::pick(&GENERATED_NAMES, rng)
            .copied()
            .unwrap_or(GENERATED_NAMES[0]);
        let strength = rng.range(8, 18);
        let dexterity = rng.range(8, 18);
        let intelligence = rng.range(8, 18);
        let charisma = rng.range(8, 18);
        let hit_points = rng.range(8, 20);
        let gold = rng.range(0, 25);
        let kit = rng.range(1, STARTING_KIT.len() as i32) as usize;

        Self {
            name: name.to_string(),
            strength,
            dexterity,
            intelligence,
            charisma,
            hit_points,
            gold: u32::try_from(gold).unwrap_or(0),
            inventory: STARTING_KIT
                .iter()
                .take(kit)
                .map(|item| item.to_string())
                .collect(),
        }
    }
}

fn edited_number(raw: Option<&str>, current: i32, (lo, hi): (i32, i32)) -> i32 {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => text.parse::<i32>().map_or(current, |n| n.clamp(lo, hi)),
        None => current,
    }
}

/// Raw edit-form values for a character. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterEdit {
    pub name: Option<String>,
    pub strength: Option<String>,
    pub dexterity: Option<String>,
    pub intelligence: Option<String>,
    pub charisma: Option<String>,
    pub hit_points: Option<String>,
    pub gold: Option<String>,
    /// Comma-separated item names.
    pub inventory: Option<String>,
}

impl CharacterEdit {
    fn score(&self, ability: Ability) -> Option<&str> {
        match ability {
            Ability::Strength => self.strength.as_deref(),
            Ability::Dexterity => self.dexterity.as_deref(),
            Ability::Intelligence => self.intelligence.as_deref(),
            Ability::Charisma => self.charisma.as_deref(),
        }
    }

    /// Set a field by its form name (`name`, `STR`, `hp`, `gold`, `inv`, ...).
    ///
    /// Returns false for an unknown field.
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> bool {
        let value = Some(value.into());
        match field.trim().to_ascii_lowercase().as_str() {
            "name" => self.name = value,
            "str" => self.strength = value,
            "dex" => self.dexterity = value,
            "int" => self.intelligence = value,
            "cha" => self.charisma = value,
            "hp" => self.hit_points = value,
            "gold" => self.gold = value,
            "inv" | "inventory" => self.inventory = value,
            _ => return false,
        }
        true
    }
}

/// Items gained and lost in one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryDelta {
    #[serde(default)]
    pub add: Vec<String>,
    #[serde(default)]
    pub remove: Vec<String>,
}

// ============================================================================
// Flags
// ============================================================================

/// Story flags.
///
/// Seals are distinct and drawn from [`Seal::ALL`]. `boss_ready` only ever
/// goes from false to true within a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    pub rumors: bool,
    #[serde(deserialize_with = "distinct_seals")]
    seals: Vec<Seal>,
    #[serde(rename = "bossReady")]
    boss_ready: bool,
    #[serde(rename = "bossDealtWith")]
    pub boss_dealt_with: bool,
}

impl Flags {
    /// Flags for a freshly begun tale.
    pub fn opening() -> Self {
        Self {
            rumors: true,
            ..Self::default()
        }
    }

    pub fn seals(&self) -> &[Seal] {
        &self.seals
    }

    pub fn has_seal(&self, seal: Seal) -> bool {
        self.seals.contains(&seal)
    }

    /// Seals not yet awarded, in vocabulary order.
    pub fn missing_seals(&self) -> Vec<Seal> {
        Seal::ALL
            .into_iter()
            .filter(|seal| !self.has_seal(*seal))
            .collect()
    }

    /// Add a seal. Returns false if it was already held.
    pub fn award_seal(&mut self, seal: Seal) -> bool {
        if self.has_seal(seal) {
            return false;
        }
        self.seals.push(seal);
        true
    }

    pub fn boss_ready(&self) -> bool {
        self.boss_ready
    }

    /// Re-derive `boss_ready` from the seal count. Never clears it.
    pub fn refresh_boss_ready(&mut self) -> bool {
        if !self.boss_ready && self.seals.len() >= SEALS_FOR_CLIMAX {
            self.boss_ready = true;
        }
        self.boss_ready
    }

    /// Shallow-merge a patch. A seal list replaces the current one.
    pub fn apply_patch(&mut self, patch: &FlagsPatch) {
        if let Some(rumors) = patch.rumors {
            self.rumors = rumors;
        }
        if let Some(seals) = &patch.seals {
            self.seals = dedup_seals(seals.iter().copied());
        }
        if patch.boss_ready == Some(true) {
            self.boss_ready = true;
        }
        if let Some(dealt) = patch.boss_dealt_with {
            self.boss_dealt_with = dealt;
        }
    }
}

fn dedup_seals(seals: impl IntoIterator<Item = Seal>) -> Vec<Seal> {
    let mut distinct = Vec::with_capacity(Seal::ALL.len());
    for seal in seals {
        if !distinct.contains(&seal) {
            distinct.push(seal);
        }
    }
    distinct
}

fn distinct_seals<'de, D>(deserializer: D) -> Result<Vec<Seal>, D::Error>
where
    D: Deserializer<'de>,
{
    let seals = Vec::<Seal>::deserialize(deserializer)?;
    Ok(dedup_seals(seals))
}

/// Partial overwrite of [`Flags`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rumors: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seals: Option<Vec<Seal>>,
    #[serde(default, rename = "bossReady", skip_serializing_if = "Option::is_none")]
    pub boss_ready: Option<bool>,
    #[serde(
        default,
        rename = "bossDealtWith",
        skip_serializing_if = "Option::is_none"
    )]
    pub boss_dealt_with: Option<bool>,
}

// ============================================================================
// Beats, choices, session
// ============================================================================

/// One unit of narrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beat {
    pub text: String,
    /// Roll summary for beats produced by a check.
    #[serde(default, rename = "rollInfo", skip_serializing_if = "Option::is_none")]
    pub roll_info: Option<String>,
}

/// An offered action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Choice {
    pub sentence: String,
    #[serde(rename = "stat")]
    pub ability: Ability,
    #[serde(rename = "scene")]
    pub target_scene: Scene,
}

impl Choice {
    pub fn new(sentence: impl Into<String>, ability: Ability, target_scene: Scene) -> Self {
        Self {
            sentence: sentence.into(),
            ability,
            target_scene,
        }
    }
}

/// The state a narration provider sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub character: Character,
    pub flags: Flags,
    pub scene: Scene,
    pub turn: u32,
}

/// Everything that makes up one play session.
///
/// `story_beats` and `transcript` are kept the same length; both only change
/// through [`SessionState::append_beat`] and [`SessionState::pop_beat`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Seeds the session RNG.
    pub seed: u64,
    pub turn: u32,
    pub scene: Scene,
    /// Diagnostic notices raised during play.
    #[serde(default)]
    pub log: Vec<String>,
    #[serde(rename = "storyBeats")]
    story_beats: Vec<Beat>,
    transcript: Vec<String>,
    pub character: Character,
    pub flags: Flags,
}

impl SessionState {
    pub fn new(seed: u64, character: Character) -> Self {
        Self {
            seed,
            turn: 0,
            scene: Scene::default(),
            log: Vec::new(),
            story_beats: Vec::new(),
            transcript: Vec::new(),
            character,
            flags: Flags::default(),
        }
    }

    /// Reset everything but the seed and the character for a new tale.
    pub fn reset_for_tale(&mut self) {
        self.turn = 0;
        self.scene = Scene::default();
        self.story_beats.clear();
        self.transcript.clear();
        self.flags = Flags::opening();
        self.log.clear();
    }

    pub fn beats(&self) -> &[Beat] {
        &self.story_beats
    }

    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    pub fn last_beat(&self) -> Option<&Beat> {
        self.story_beats.last()
    }

    pub fn append_beat(&mut self, text: impl Into<String>, roll_info: Option<String>) {
        let text = text.into();
        self.transcript.push(text.clone());
        self.story_beats.push(Beat { text, roll_info });
    }

    pub fn pop_beat(&mut self) -> Option<Beat> {
        self.transcript.pop();
        self.story_beats.pop()
    }

    /// The last `limit` transcript lines, oldest first.
    pub fn recent_history(&self, limit: usize) -> Vec<String> {
        let start = self.transcript.len().saturating_sub(limit);
        self.transcript[start..].to_vec()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            character: self.character.clone(),
            flags: self.flags.clone(),
            scene: self.scene.clone(),
            turn: self.turn,
        }
    }

    /// Rebuild the transcript from the beats if a loaded save disagrees.
    pub(crate) fn repair(&mut self) -> bool {
        let consistent = self.transcript.len() == self.story_beats.len()
            && self
                .transcript
                .iter()
                .zip(&self.story_beats)
                .all(|(line, beat)| *line == beat.text);
        if !consistent {
            self.transcript = self.story_beats.iter().map(|b| b.text.clone()).collect();
        }
        !consistent
    }
}
