//! Turn-based narrative engine with local and live narration.
//!
//! This crate provides:
//! - Check resolution (d20 + ability modifier against a jittered difficulty)
//! - A local narrator built from authored fragments
//! - A Live DM narrator that falls back to local narration on any failure
//! - The turn controller that merges narration into session state
//! - Key-value persistence for sessions and the Live DM endpoint
//!
//! # Quick Start
//!
//! ```ignore
//! use weaver_core::{Tale, WeaverConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WeaverConfig::from_env()?;
//!     let mut tale = Tale::new(&config, config.store())?;
//!
//!     tale.begin();
//!     let outcome = tale.choose(0).await?;
//!     println!("{}", outcome.check);
//!     println!("{}", tale.state().last_beat().map(|b| b.text.as_str()).unwrap_or(""));
//!
//!     tale.save();
//!     Ok(())
//! }
//! ```

pub mod choices;
pub mod config;
pub mod dice;
pub mod narrator;
pub mod persist;
pub mod session;
pub mod testing;
pub mod world;

// Primary public API
pub use config::{ConfigError, WeaverConfig};
pub use dice::{Check, SeededRng, StoryRng};
pub use narrator::{
    LiveNarrator, LocalNarrator, MemoryLog, NarrationLog, NarrationMode, NarrationResult,
    Narrator, TracingLog, TurnPayload, Weaver,
};
pub use persist::{FileStore, KeyValueStore, MemoryStore, SavedTale, StoreExt};
pub use session::{Tale, TaleError, TalePhase, TurnOutcome};
pub use testing::{ScriptedRng, StubTransport, TaleHarness};
pub use world::{Ability, Character, CharacterEdit, Choice, Flags, Scene, Seal, SessionState};
