//! Remote narration through a Live DM, with local fallback.

use super::local::LocalNarrator;
use super::log::NarrationLog;
use super::{NarrationResult, Narrator, TurnPayload, DEFAULT_ENDPOINT};
use crate::dice::StoryRng;
use crate::world::{Choice, FlagsPatch, InventoryDelta, Scene, Seal};
use async_trait::async_trait;
use live_dm::{LiveDm, TurnReply, TurnRequest, WireChoice};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Notice emitted once per failed remote turn.
pub const FALLBACK_NOTICE: &str = "Live DM unavailable \u{2014} falling back to Local.";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Delivers one turn request to a Live DM.
#[async_trait]
pub trait NarrationTransport: Send + Sync {
    async fn send(&self, endpoint: &str, request: &TurnRequest) -> Result<TurnReply, live_dm::Error>;
}

/// HTTP transport. Relative endpoints are joined onto `base_url`.
#[derive(Clone)]
pub struct HttpTransport {
    client: LiveDm,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, live_dm::Error> {
        Ok(Self {
            client: LiveDm::new(timeout)?,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl NarrationTransport for HttpTransport {
    async fn send(&self, endpoint: &str, request: &TurnRequest) -> Result<TurnReply, live_dm::Error> {
        let url = live_dm::resolve_endpoint(&self.base_url, endpoint)?;
        debug!(%url, "Sending turn to Live DM");
        self.client.turn(url, request).await
    }
}

/// Narrates through a remote Live DM.
///
/// Any failure (transport, status, body, timeout) is reported once through
/// the log and the turn is narrated locally instead. Callers cannot tell the
/// two paths apart.
pub struct LiveNarrator {
    transport: Arc<dyn NarrationTransport>,
    log: Arc<dyn NarrationLog>,
    endpoint: String,
    timeout: Duration,
    fallback: LocalNarrator,
}

impl LiveNarrator {
    pub fn new(transport: Arc<dyn NarrationTransport>, log: Arc<dyn NarrationLog>) -> Self {
        Self {
            transport,
            log,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            fallback: LocalNarrator,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(crate) fn set_endpoint(&mut self, endpoint: String) {
        self.endpoint = endpoint;
    }

    /// One remote attempt, without fallback.
    pub async fn attempt(&self, payload: &TurnPayload) -> Result<NarrationResult, live_dm::Error> {
        let request = to_request(payload)?;
        let reply = tokio::time::timeout(self.timeout, self.transport.send(&self.endpoint, &request))
            .await
            .map_err(|_| live_dm::Error::Timeout)??;
        Ok(from_reply(reply, &payload.snapshot.scene))
    }
}

#[async_trait]
impl Narrator for LiveNarrator {
    async fn resolve_turn(&self, payload: &TurnPayload, rng: &mut dyn StoryRng) -> NarrationResult {
        match self.attempt(payload).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, endpoint = %self.endpoint, "Live DM turn failed");
                self.log.notice(FALLBACK_NOTICE);
                self.fallback.narrate(payload, rng)
            }
        }
    }
}

/// Build the wire request for a payload.
pub fn to_request(payload: &TurnPayload) -> Result<TurnRequest, live_dm::Error> {
    let game_state = serde_json::to_value(&payload.snapshot)
        .map_err(|e| live_dm::Error::Parse(format!("snapshot: {e}")))?;

    Ok(TurnRequest {
        action: payload.action.clone(),
        source: payload.source.as_str().to_string(),
        stat: payload.ability.abbreviation().to_string(),
        dc: payload.difficulty,
        passed: payload.passed,
        game_state,
        history: payload.history.clone(),
        target_scene: payload.target_scene.as_ref().map(|s| s.name().to_string()),
    })
}

/// Sanitize a reply into a narration result.
///
/// Unknown seals and choices with an unknown stat are dropped. Choices that
/// name no scene stay in `current_scene`, or in the reply's scene if it set one.
pub fn from_reply(reply: TurnReply, current_scene: &Scene) -> NarrationResult {
    let scene = reply
        .scene
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(Scene::from);
    let home = scene.clone().unwrap_or_else(|| current_scene.clone());

    let flags_patch = reply.flags_patch.map(|patch| FlagsPatch {
        rumors: patch.rumors,
        seals: patch.seals.map(|names| {
            names
                .iter()
                .filter_map(|name| match name.parse::<Seal>() {
                    Ok(seal) => Some(seal),
                    Err(e) => {
                        warn!(error = %e, "Dropping seal from Live DM reply");
                        None
                    }
                })
                .collect()
        }),
        boss_ready: patch.boss_ready,
        boss_dealt_with: patch.boss_dealt_with,
    });

    let inventory_delta = reply.inventory_delta.map(|delta| InventoryDelta {
        add: clean_items(delta.add),
        remove: clean_items(delta.remove),
    });

    let next_choices = reply.next_choices.map(|choices| {
        choices
            .into_iter()
            .filter_map(|choice| wire_choice(choice, &home))
            .collect()
    });

    NarrationResult {
        story_paragraph: reply.story_paragraph,
        flags_patch,
        inventory_delta,
        gold_delta: reply.gold_delta,
        next_choices,
        maybe_boss_option: reply
            .maybe_boss_option
            .and_then(|choice| wire_choice(choice, &home)),
        scene,
    }
}

fn clean_items(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn wire_choice(choice: WireChoice, home: &Scene) -> Option<Choice> {
    let sentence = choice.sentence.trim();
    if sentence.is_empty() {
        return None;
    }
    let ability = match choice.stat.parse() {
        Ok(ability) => ability,
        Err(e) => {
            warn!(error = %e, sentence, "Dropping choice from Live DM reply");
            return None;
        }
    };
    let target_scene = choice
        .scene
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(Scene::from)
        .unwrap_or_else(|| home.clone());

    Some(Choice::new(sentence, ability, target_scene))
}
