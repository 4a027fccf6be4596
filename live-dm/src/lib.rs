//! Minimal client for a remote Storyweaver narration endpoint.
//!
//! A "Live DM" is any HTTP service that accepts one turn payload as a JSON
//! `POST` body and answers with a narration document. This crate provides:
//! - The wire types for that single request/response exchange
//! - Endpoint resolution against a base URL
//! - A client with request and connect timeouts and a small error taxonomy

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Endpoint used when none has been configured.
pub const DEFAULT_ENDPOINT: &str = "/dm-turn";

/// Base URL relative endpoints are joined onto.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8787";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur when talking to a Live DM.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Live DM error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(err.to_string())
        }
    }
}

/// Live DM client.
#[derive(Clone)]
pub struct LiveDm {
    client: reqwest::Client,
}

impl LiveDm {
    /// Create a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Send one turn to `url` and parse the narration reply.
    ///
    /// Any non-success status is reported as [`Error::Api`], and a body that
    /// is not a well-typed [`TurnReply`] as [`Error::Parse`].
    pub async fn turn(&self, url: Url, request: &TurnRequest) -> Result<TurnReply, Error> {
        let response = self
            .client
            .post(url)
            .headers(Self::build_headers())
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        let body = response.text().await?;
        parse_reply(&body)
    }

    fn build_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }
}

impl Default for LiveDm {
    fn default() -> Self {
        // A builder with only timeouts set cannot fail to build.
        Self::new(DEFAULT_TIMEOUT).unwrap_or_else(|_| Self {
            client: reqwest::Client::new(),
        })
    }
}

/// Parse a reply body.
pub fn parse_reply(body: &str) -> Result<TurnReply, Error> {
    serde_json::from_str(body).map_err(|e| Error::Parse(e.to_string()))
}

/// Resolve the configured endpoint into an absolute URL.
///
/// Absolute `http`/`https` endpoints are used as-is; anything else is treated
/// as a path relative to `base`.
pub fn resolve_endpoint(base: &str, endpoint: &str) -> Result<Url, Error> {
    let endpoint = endpoint.trim();
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return Url::parse(endpoint).map_err(|e| Error::Config(format!("{endpoint}: {e}")));
    }

    let base = Url::parse(base).map_err(|e| Error::Config(format!("{base}: {e}")))?;
    base.join(endpoint)
        .map_err(|e| Error::Config(format!("{endpoint}: {e}")))
}

// ============================================================================
// Wire types
// ============================================================================

/// One turn sent to the Live DM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRequest {
    /// The attempted action, already normalized.
    pub action: String,
    /// `"choice"` or `"freeText"`.
    pub source: String,
    /// `STR`, `DEX`, `INT` or `CHA`.
    pub stat: String,
    pub dc: i32,
    pub passed: bool,
    /// Character, flags, scene and turn.
    pub game_state: serde_json::Value,
    /// Up to the last ten narration lines.
    pub history: Vec<String>,
    /// Scene the chosen option leads to, when the action came from a choice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_scene: Option<String>,
}

/// Narration returned by the Live DM. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnReply {
    #[serde(default)]
    pub story_paragraph: Option<String>,
    #[serde(default)]
    pub flags_patch: Option<WireFlagsPatch>,
    #[serde(default)]
    pub inventory_delta: Option<WireInventoryDelta>,
    #[serde(default)]
    pub gold_delta: Option<i64>,
    #[serde(default)]
    pub next_choices: Option<Vec<WireChoice>>,
    #[serde(default)]
    pub maybe_boss_option: Option<WireChoice>,
    #[serde(default)]
    pub scene: Option<String>,
}

/// Partial flags overwrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireFlagsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rumors: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seals: Option<Vec<String>>,
    #[serde(
        default,
        rename = "bossReady",
        skip_serializing_if = "Option::is_none"
    )]
    pub boss_ready: Option<bool>,
    #[serde(
        default,
        rename = "bossDealtWith",
        skip_serializing_if = "Option::is_none"
    )]
    pub boss_dealt_with: Option<bool>,
}

/// Items gained and lost this turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireInventoryDelta {
    #[serde(default)]
    pub add: Vec<String>,
    #[serde(default)]
    pub remove: Vec<String>,
}

/// An offered action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireChoice {
    pub sentence: String,
    pub stat: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
}
