//! Tale - the turn controller and main public API.
//!
//! A [`Tale`] owns one play session: the state, the visible choices, the
//! narrators, the store and the RNG. Every state change goes through it.
//!
//! Lifecycle: `NotStarted -> InProgress -> Ended`. [`Tale::begin`] may be
//! called again at any time to start over with the same character.

use crate::choices;
use crate::config::WeaverConfig;
use crate::dice::{self, Check, SeededRng, StoryRng};
use crate::narrator::{
    normalize_endpoint, ActionSource, HttpTransport, LiveNarrator, MemoryLog, NarrationLog,
    NarrationMode, NarrationResult, NarrationTransport, Narrator, TracingLog, TurnPayload, Weaver,
};
use crate::persist::{KeyValueStore, SavedTale};
use crate::world::{Ability, Character, CharacterEdit, Choice, Scene, SessionState};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

const OPENING: &str = "Torches breathe along brasswork and shadow. Rumors speak of an \
otherworldly tide \u{2014} the Unfathomer \u{2014} pooling beneath the city\u{2019}s vaults. \
You stand at the threshold of the Halls, where echoing floors remember every step.";

/// Beat text used when a narrator returns no paragraph.
pub const SILENCE: &str = "(silence)";

/// How many transcript lines a narrator sees.
pub const HISTORY_WINDOW: usize = 10;

/// Highest random seed handed out when none is configured.
const MAX_RANDOM_SEED: i32 = 9_999_999;

/// Where a tale is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TalePhase {
    #[default]
    NotStarted,
    InProgress,
    Ended,
}

impl fmt::Display for TalePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TalePhase::NotStarted => f.write_str("not started"),
            TalePhase::InProgress => f.write_str("in progress"),
            TalePhase::Ended => f.write_str("ended"),
        }
    }
}

/// Errors from tale operations. None of them change state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaleError {
    #[error("The tale is {0}")]
    NotInProgress(TalePhase),

    #[error("Describe an action first")]
    EmptyAction,

    #[error("There is no choice {0}")]
    UnknownChoice(usize),
}

/// What happened on one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub action: String,
    pub source: ActionSource,
    pub ability: Ability,
    pub check: Check,
    /// Scene after the turn was applied.
    pub scene: Scene,
}

/// One play session.
pub struct Tale {
    state: SessionState,
    choices: Vec<Choice>,
    phase: TalePhase,
    weaver: Weaver,
    store: Box<dyn KeyValueStore>,
    rng: Box<dyn StoryRng>,
    notices: MemoryLog,
    sink: Arc<dyn NarrationLog>,
}

impl Tale {
    /// A tale that can narrate through the Live DM over HTTP.
    pub fn new(
        config: &WeaverConfig,
        store: Box<dyn KeyValueStore>,
    ) -> Result<Self, live_dm::Error> {
        let transport = HttpTransport::new(config.base_url.clone(), config.timeout)?;
        Ok(Self::with_transport(config, store, Arc::new(transport)))
    }

    /// A tale that narrates live through `transport`.
    pub fn with_transport(
        config: &WeaverConfig,
        store: Box<dyn KeyValueStore>,
        transport: Arc<dyn NarrationTransport>,
    ) -> Self {
        let notices = MemoryLog::new();
        let live = LiveNarrator::new(transport, Arc::new(notices.clone()))
            .with_timeout(config.timeout)
            .with_endpoint(normalize_endpoint(&config.endpoint));
        let mut weaver = Weaver::with_live(live).load_endpoint(store.as_ref());
        if config.live {
            weaver.set_mode(NarrationMode::Live);
        }
        Self::assemble(config, store, weaver, notices)
    }

    /// A tale that only ever narrates locally.
    pub fn local(config: &WeaverConfig, store: Box<dyn KeyValueStore>) -> Self {
        let weaver = Weaver::local().load_endpoint(store.as_ref());
        Self::assemble(config, store, weaver, MemoryLog::new())
    }

    fn assemble(
        config: &WeaverConfig,
        store: Box<dyn KeyValueStore>,
        weaver: Weaver,
        notices: MemoryLog,
    ) -> Self {
        let seed = config
            .seed
            .unwrap_or_else(|| SeededRng::from_entropy().range(1, MAX_RANDOM_SEED) as u64);

        Self {
            state: SessionState::new(seed, Character::default()),
            choices: Vec::new(),
            phase: TalePhase::NotStarted,
            weaver,
            store,
            rng: Box::new(SeededRng::new(seed)),
            notices,
            sink: Arc::new(TracingLog),
        }
    }

    /// Also send diagnostic notices to `sink`. They always land in the
    /// session log.
    pub fn with_log(mut self, sink: Arc<dyn NarrationLog>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_rng(mut self, rng: Box<dyn StoryRng>) -> Self {
        self.rng = rng;
        self
    }

    /// Replace the RNG mid-session.
    pub fn set_rng(&mut self, rng: Box<dyn StoryRng>) {
        self.rng = rng;
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start a new tale with the current character.
    pub fn begin(&mut self) {
        self.state.reset_for_tale();
        self.state.append_beat(OPENING, None);
        self.choices = choices::choices_for_scene(&self.state.scene, self.rng.as_mut());
        self.state.turn += 1;
        self.phase = TalePhase::InProgress;
        info!(character = %self.state.character.name, seed = self.state.seed, "Tale begun");
    }

    /// Close the tale with an epilogue. Always appends exactly one beat.
    pub fn end(&mut self) {
        let epilogue = self.epilogue();
        self.state.append_beat(epilogue, None);
        self.choices.clear();
        self.phase = TalePhase::Ended;
        info!(turn = self.state.turn, "Tale ended");
    }

    fn epilogue(&self) -> String {
        let character = &self.state.character;
        let flags = &self.state.flags;
        let seals = if flags.seals().is_empty() {
            "none".to_string()
        } else {
            flags
                .seals()
                .iter()
                .map(|seal| seal.name())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let dealt = if flags.boss_dealt_with {
            "You face the Unfathomer, and the crisis is resolved."
        } else {
            "The Unfathomer still turns beneath the world."
        };

        format!(
            "Epilogue \u{2014} You carry {} gold and {} keepsakes. Seals gained: {seals}. {dealt} \
             The city holds its breath, then exhales, and your name threads through quiet conversations.",
            character.gold,
            character.inventory.len(),
        )
    }

    /// Drop the latest beat.
    ///
    /// Only the beat goes; gold, items and flags from that turn stay. Does
    /// nothing before turn 2 or outside an active tale. Returns whether a
    /// beat was removed.
    pub fn undo(&mut self) -> bool {
        if self.phase != TalePhase::InProgress || self.state.turn <= 1 {
            return false;
        }
        self.state.pop_beat();
        self.state.turn -= 1;
        self.choices = choices::choices_for_scene(&self.state.scene, self.rng.as_mut());
        debug!(turn = self.state.turn, "Turn undone");
        true
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Act on the visible choice at `index` (zero-based).
    pub async fn choose(&mut self, index: usize) -> Result<TurnOutcome, TaleError> {
        self.require_in_progress()?;
        let choice = self
            .choices
            .get(index)
            .cloned()
            .ok_or(TaleError::UnknownChoice(index))?;

        let action = choices::action_text(&choice.sentence);
        Ok(self
            .play(action, ActionSource::Choice, choice.ability, Some(choice.target_scene))
            .await)
    }

    /// Act on a free-text action. The ability is inferred from its words.
    pub async fn act(&mut self, text: &str) -> Result<TurnOutcome, TaleError> {
        self.require_in_progress()?;
        let action = text.trim();
        if action.is_empty() {
            return Err(TaleError::EmptyAction);
        }

        let ability = choices::infer_ability(action);
        Ok(self
            .play(action.to_string(), ActionSource::FreeText, ability, None)
            .await)
    }

    fn require_in_progress(&self) -> Result<(), TaleError> {
        match self.phase {
            TalePhase::InProgress => Ok(()),
            phase => Err(TaleError::NotInProgress(phase)),
        }
    }

    async fn play(
        &mut self,
        action: String,
        source: ActionSource,
        ability: Ability,
        target_scene: Option<Scene>,
    ) -> TurnOutcome {
        let score = self.state.character.score(ability);
        let check = dice::resolve_check(score, self.rng.as_mut());
        debug!(%ability, check = %check, passed = check.passed, "Check resolved");

        let payload = TurnPayload {
            action: action.clone(),
            source,
            ability,
            difficulty: check.difficulty,
            passed: check.passed,
            snapshot: self.state.snapshot(),
            history: self.state.recent_history(HISTORY_WINDOW),
            target_scene,
        };

        let result = self.weaver.resolve_turn(&payload, self.rng.as_mut()).await;
        self.collect_notices();
        self.apply(result, &check);

        TurnOutcome {
            action,
            source,
            ability,
            check,
            scene: self.state.scene.clone(),
        }
    }

    fn collect_notices(&mut self) {
        for notice in self.notices.drain() {
            self.sink.notice(&notice);
            self.state.log.push(notice);
        }
    }

    fn apply(&mut self, result: NarrationResult, check: &Check) {
        if let Some(patch) = &result.flags_patch {
            self.state.flags.apply_patch(patch);
        }
        if let Some(delta) = &result.inventory_delta {
            self.state.character.apply_inventory_delta(delta);
        }
        if let Some(delta) = result.gold_delta {
            self.state.character.apply_gold_delta(delta);
        }

        let paragraph = result
            .story_paragraph
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| SILENCE.to_string());
        self.state.append_beat(paragraph, Some(check.summary()));

        // Regenerated choices come from the scene the turn was played in.
        self.choices = match result.next_choices {
            Some(choices) if !choices.is_empty() => choices,
            _ => choices::choices_for_scene(&self.state.scene, self.rng.as_mut()),
        };
        if let Some(boss) = result.maybe_boss_option {
            if !self.choices.contains(&boss) {
                self.choices.push(boss);
            }
        }

        if let Some(scene) = result.scene {
            if scene != self.state.scene {
                info!(from = %self.state.scene, to = %scene, "Scene changed");
            }
            self.state.scene = scene;
        }

        if !self.state.flags.boss_ready() && self.state.flags.refresh_boss_ready() {
            info!("Enough seals gathered; the climax is open");
        }
        self.state.turn += 1;
    }

    // ========================================================================
    // Character
    // ========================================================================

    pub fn edit_character(&mut self, edit: &CharacterEdit) {
        self.state.character.apply_edit(edit);
    }

    pub fn auto_generate_character(&mut self) {
        self.state.character = Character::auto_generate(self.rng.as_mut());
        info!(name = %self.state.character.name, "Character generated");
    }

    // ========================================================================
    // Narration mode
    // ========================================================================

    pub fn mode(&self) -> NarrationMode {
        self.weaver.mode()
    }

    pub fn set_mode(&mut self, mode: NarrationMode) -> NarrationMode {
        self.weaver.set_mode(mode)
    }

    pub fn endpoint(&self) -> &str {
        self.weaver.endpoint()
    }

    /// Set and persist the Live DM endpoint. Blank input restores the default.
    pub fn set_endpoint(&mut self, raw: &str) -> &str {
        self.weaver.set_endpoint(raw, self.store.as_ref())
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Save the whole session. Best-effort.
    pub fn save(&self) {
        let saved = SavedTale::new(self.phase, self.choices.clone(), self.state.clone());
        saved.store(self.store.as_ref());
        info!(turn = self.state.turn, "Tale saved");
    }

    /// Restore the saved session, if there is a usable one.
    pub fn load(&mut self) -> bool {
        let Some(saved) = SavedTale::fetch(self.store.as_ref()) else {
            return false;
        };

        let mut state = saved.state;
        if state.repair() {
            debug!("Transcript rebuilt from story beats");
        }
        state.flags.refresh_boss_ready();

        self.rng = Box::new(SeededRng::new(
            state.seed.wrapping_mul(31).wrapping_add(u64::from(state.turn)),
        ));
        self.phase = saved.phase;
        self.choices = saved.choices;
        if self.phase == TalePhase::InProgress && self.choices.is_empty() {
            self.choices = choices::choices_for_scene(&state.scene, self.rng.as_mut());
        }
        if self.phase == TalePhase::Ended {
            self.choices.clear();
        }
        self.state = state;

        info!(turn = self.state.turn, phase = %self.phase, "Tale loaded");
        true
    }

    // ========================================================================
    // Read-only views
    // ========================================================================

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Mutable access to the session state.
    ///
    /// Use with caution - direct changes bypass the turn controller.
    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    pub fn phase(&self) -> TalePhase {
        self.phase
    }

    pub fn turn(&self) -> u32 {
        self.state.turn
    }

    pub fn character(&self) -> &Character {
        &self.state.character
    }

    pub fn seed(&self) -> u64 {
        self.state.seed
    }
}
