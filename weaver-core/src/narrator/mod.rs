//! Narration providers.
//!
//! A narrator turns one resolved check into story text and state deltas.
//! It never decides pass or fail; the caller rolls the check first.
//!
//! - [`LocalNarrator`] composes text from authored fragments and never fails.
//! - [`LiveNarrator`] asks a remote Live DM and falls back to local narration
//!   on any failure.
//! - [`Weaver`] holds both and routes each turn by [`NarrationMode`].

mod live;
mod local;
mod log;

pub use live::{
    from_reply, to_request, HttpTransport, LiveNarrator, NarrationTransport, FALLBACK_NOTICE,
};
pub use local::LocalNarrator;
pub use log::{MemoryLog, NarrationLog, TracingLog};

use crate::dice::StoryRng;
use crate::persist::{KeyValueStore, StoreExt, ENDPOINT_KEY};
use crate::world::{Ability, Choice, FlagsPatch, InventoryDelta, Scene, Snapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use live_dm::DEFAULT_ENDPOINT;

/// Where an action came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionSource {
    #[serde(rename = "choice")]
    Choice,
    #[serde(rename = "freeText")]
    FreeText,
}

impl ActionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionSource::Choice => "choice",
            ActionSource::FreeText => "freeText",
        }
    }
}

/// Everything a narrator needs to narrate one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnPayload {
    /// The attempted action. Choice tags are already stripped.
    pub action: String,
    pub source: ActionSource,
    pub ability: Ability,
    pub difficulty: i32,
    pub passed: bool,
    pub snapshot: Snapshot,
    /// The last few transcript lines, oldest first.
    pub history: Vec<String>,
    /// Scene the chosen option leads to. Free-text actions have none.
    pub target_scene: Option<Scene>,
}

/// What a narrator produced. Every field is optional and merged if present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NarrationResult {
    pub story_paragraph: Option<String>,
    pub flags_patch: Option<FlagsPatch>,
    pub inventory_delta: Option<InventoryDelta>,
    pub gold_delta: Option<i64>,
    pub next_choices: Option<Vec<Choice>>,
    pub maybe_boss_option: Option<Choice>,
    pub scene: Option<Scene>,
}

/// Resolves a turn payload into narration.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn resolve_turn(&self, payload: &TurnPayload, rng: &mut dyn StoryRng) -> NarrationResult;
}

/// Which narrator handles turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NarrationMode {
    #[default]
    Local,
    Live,
}

impl fmt::Display for NarrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NarrationMode::Local => f.write_str("Local"),
            NarrationMode::Live => f.write_str("Live"),
        }
    }
}

impl FromStr for NarrationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(NarrationMode::Local),
            "live" => Ok(NarrationMode::Live),
            other => Err(format!("unknown narration mode: {other}")),
        }
    }
}

/// Normalize a configured endpoint. Blank input means the default.
pub fn normalize_endpoint(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        DEFAULT_ENDPOINT.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Routes turns to the local or live narrator.
pub struct Weaver {
    mode: NarrationMode,
    endpoint: String,
    local: LocalNarrator,
    live: Option<LiveNarrator>,
}

impl Weaver {
    /// A weaver that can only narrate locally.
    pub fn local() -> Self {
        Self {
            mode: NarrationMode::Local,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            local: LocalNarrator,
            live: None,
        }
    }

    /// A weaver that can switch to `live`. Starts in local mode.
    pub fn with_live(live: LiveNarrator) -> Self {
        let mut weaver = Self::local();
        weaver.endpoint = live.endpoint().to_string();
        weaver.live = Some(live);
        weaver
    }

    /// Restore the endpoint saved in `store`, if any.
    pub fn load_endpoint(mut self, store: &dyn KeyValueStore) -> Self {
        let endpoint: String = store.get(ENDPOINT_KEY, self.endpoint.clone());
        self.apply_endpoint(normalize_endpoint(&endpoint));
        self
    }

    pub fn mode(&self) -> NarrationMode {
        self.mode
    }

    /// Switch narrators and return the mode now in effect.
    ///
    /// Live mode needs a live narrator; without one the weaver stays local.
    pub fn set_mode(&mut self, mode: NarrationMode) -> NarrationMode {
        if mode == NarrationMode::Live && self.live.is_none() {
            tracing::warn!("No Live DM configured; staying in Local mode");
            self.mode = NarrationMode::Local;
        } else {
            self.mode = mode;
        }
        tracing::info!(mode = %self.mode, "Narration mode set");
        self.mode
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Update the live endpoint and persist it.
    pub fn set_endpoint(&mut self, raw: &str, store: &dyn KeyValueStore) -> &str {
        let endpoint = normalize_endpoint(raw);
        store.set(ENDPOINT_KEY, &endpoint);
        self.apply_endpoint(endpoint);
        &self.endpoint
    }

    fn apply_endpoint(&mut self, endpoint: String) {
        if let Some(live) = self.live.as_mut() {
            live.set_endpoint(endpoint.clone());
        }
        self.endpoint = endpoint;
    }
}

impl Default for Weaver {
    fn default() -> Self {
        Self::local()
    }
}

#[async_trait]
impl Narrator for Weaver {
    async fn resolve_turn(&self, payload: &TurnPayload, rng: &mut dyn StoryRng) -> NarrationResult {
        match (self.mode, &self.live) {
            (NarrationMode::Live, Some(live)) => live.resolve_turn(payload, rng).await,
            _ => self.local.narrate(payload, rng),
        }
    }
}
