//! Testing utilities for Storyweaver.
//!
//! This module provides tools for integration testing:
//! - `ScriptedRng` for forcing specific rolls and draws
//! - `StubTransport` for simulating a Live DM without a network
//! - `TaleHarness` for scripted play with a shared store and log
//! - Assertion helpers for verifying tale state

use crate::config::WeaverConfig;
use crate::dice::StoryRng;
use crate::narrator::{MemoryLog, NarrationTransport};
use crate::persist::MemoryStore;
use crate::session::{Tale, TaleError, TalePhase, TurnOutcome};
use crate::world::{Seal, SessionState};
use async_trait::async_trait;
use live_dm::{TurnReply, TurnRequest};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A [`StoryRng`] that returns scripted values in order.
///
/// Each value is clamped into the requested range. Once the script runs out
/// every draw returns the top of its range, so shuffles keep their order and
/// 1-in-N chances miss.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRng {
    values: VecDeque<i32>,
}

impl ScriptedRng {
    pub fn new(values: Vec<i32>) -> Self {
        Self {
            values: values.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl StoryRng for ScriptedRng {
    fn range(&mut self, min: i32, max: i32) -> i32 {
        match self.values.pop_front() {
            Some(value) => value.clamp(min, max.max(min)),
            None => max.max(min),
        }
    }
}

/// How a [`StubTransport`] answers.
#[derive(Debug, Clone)]
pub enum StubBehavior {
    /// Answer with this reply.
    Reply(TurnReply),
    /// Fail as if the host were unreachable.
    Network,
    /// Fail with this HTTP status.
    Status(u16),
    /// Answer with a body that does not parse.
    Malformed,
    /// Never answer.
    Hang,
}

/// A Live DM stand-in that records every request it receives.
#[derive(Debug, Clone)]
pub struct StubTransport {
    behavior: StubBehavior,
    requests: Arc<Mutex<Vec<(String, TurnRequest)>>>,
}

impl StubTransport {
    pub fn new(behavior: StubBehavior) -> Self {
        Self {
            behavior,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn reply(reply: TurnReply) -> Self {
        Self::new(StubBehavior::Reply(reply))
    }

    pub fn network() -> Self {
        Self::new(StubBehavior::Network)
    }

    pub fn status(status: u16) -> Self {
        Self::new(StubBehavior::Status(status))
    }

    pub fn malformed() -> Self {
        Self::new(StubBehavior::Malformed)
    }

    pub fn hang() -> Self {
        Self::new(StubBehavior::Hang)
    }

    /// Requests received so far, with the endpoint each was sent to.
    pub fn requests(&self) -> Vec<(String, TurnRequest)> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl NarrationTransport for StubTransport {
    async fn send(&self, endpoint: &str, request: &TurnRequest) -> Result<TurnReply, live_dm::Error> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((endpoint.to_string(), request.clone()));
        }

        match &self.behavior {
            StubBehavior::Reply(reply) => Ok(reply.clone()),
            StubBehavior::Network => Err(live_dm::Error::Network("connection refused".to_string())),
            StubBehavior::Status(status) => Err(live_dm::Error::Api {
                status: *status,
                message: "stub failure".to_string(),
            }),
            StubBehavior::Malformed => live_dm::parse_reply("{\"story_paragraph\": 42"),
            StubBehavior::Hang => std::future::pending::<Result<TurnReply, live_dm::Error>>().await,
        }
    }
}

/// Test harness for running tale scenarios.
pub struct TaleHarness {
    /// The tale under test.
    pub tale: Tale,
    /// Receives every diagnostic notice the tale emits.
    pub log: MemoryLog,
    /// The store the tale saves into.
    pub store: Arc<MemoryStore>,
}

impl TaleHarness {
    /// A local-only tale with a fixed seed.
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let log = MemoryLog::new();
        let tale = Tale::local(&Self::config(), Box::new(store.clone()))
            .with_log(Arc::new(log.clone()));
        Self { tale, log, store }
    }

    /// A tale in live mode that talks to `transport`.
    pub fn live(transport: StubTransport) -> Self {
        let store = Arc::new(MemoryStore::new());
        let log = MemoryLog::new();
        let config = Self::config()
            .with_live(true)
            .with_timeout(Duration::from_millis(200));
        let tale = Tale::with_transport(&config, Box::new(store.clone()), Arc::new(transport))
            .with_log(Arc::new(log.clone()));
        Self { tale, log, store }
    }

    fn config() -> WeaverConfig {
        WeaverConfig::new().with_seed(7)
    }

    /// Force the next draws. Call after `begin` so the opening shuffle does
    /// not consume them.
    pub fn script(&mut self, values: Vec<i32>) -> &mut Self {
        self.tale.set_rng(Box::new(ScriptedRng::new(values)));
        self
    }

    pub fn begin(&mut self) -> &mut Self {
        self.tale.begin();
        self
    }

    pub async fn choose(&mut self, index: usize) -> Result<TurnOutcome, TaleError> {
        self.tale.choose(index).await
    }

    pub async fn act(&mut self, text: &str) -> Result<TurnOutcome, TaleError> {
        self.tale.act(text).await
    }

    pub fn state(&self) -> &SessionState {
        self.tale.state()
    }

    /// Text of the latest beat.
    pub fn last_beat(&self) -> Option<&str> {
        self.tale.state().last_beat().map(|beat| beat.text.as_str())
    }

    pub fn beat_count(&self) -> usize {
        self.tale.state().beats().len()
    }

    /// Whether the climax choice is on offer.
    pub fn offers_climax(&self) -> bool {
        self.tale
            .choices()
            .iter()
            .any(|choice| *choice == crate::choices::confront_choice())
    }
}

impl Default for TaleHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the tale is on turn `turn`.
#[track_caller]
pub fn assert_turn(harness: &TaleHarness, turn: u32) {
    assert_eq!(
        harness.tale.turn(),
        turn,
        "Expected turn {turn}, got {}",
        harness.tale.turn()
    );
}

/// Assert the tale is in `phase`.
#[track_caller]
pub fn assert_phase(harness: &TaleHarness, phase: TalePhase) {
    assert_eq!(
        harness.tale.phase(),
        phase,
        "Expected phase '{phase}', got '{}'",
        harness.tale.phase()
    );
}

/// Assert the transcript mirrors the story beats.
#[track_caller]
pub fn assert_transcript_in_step(harness: &TaleHarness) {
    let state = harness.state();
    let beats: Vec<&str> = state.beats().iter().map(|b| b.text.as_str()).collect();
    let transcript: Vec<&str> = state.transcript().iter().map(String::as_str).collect();
    assert_eq!(beats, transcript, "Transcript diverged from story beats");
}

/// Assert the character holds `seal`.
#[track_caller]
pub fn assert_has_seal(harness: &TaleHarness, seal: Seal) {
    assert!(
        harness.state().flags.has_seal(seal),
        "Expected the Seal of {seal}, have {:?}",
        harness.state().flags.seals()
    );
}

/// Assert the climax choice is offered.
#[track_caller]
pub fn assert_offers_climax(harness: &TaleHarness) {
    assert!(
        harness.offers_climax(),
        "Expected the climax choice among {:?}",
        harness.tale.choices()
    );
}

/// Assert exactly `count` notices were logged.
#[track_caller]
pub fn assert_notices(harness: &TaleHarness, count: usize) {
    let notices = harness.log.entries();
    assert_eq!(
        notices.len(),
        count,
        "Expected {count} notices, got {notices:?}"
    );
}
