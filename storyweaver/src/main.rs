//! Storyweaver player.
//!
//! A line-oriented front end for the narrative engine. Numbers pick a
//! choice, `#` starts a command and anything else is a free action:
//!
//! ```bash
//! STORYWEAVER_SAVE_DIR=.storyweaver cargo run -p storyweaver
//! ```

mod headless;

use tracing_subscriber::EnvFilter;
use weaver_core::{Tale, WeaverConfig};

/// Save directory used when none is configured.
const DEFAULT_SAVE_DIR: &str = ".storyweaver";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Diagnostics go to stderr; stdout carries the protocol.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let mut config = WeaverConfig::from_env()?;
    if config.save_dir.is_none() {
        config = config.with_save_dir(DEFAULT_SAVE_DIR);
    }

    let mut tale = Tale::new(&config, config.store())?;
    let fresh = args.iter().any(|a| a == "--new");
    if fresh || !tale.load() {
        tale.begin();
    }
    tracing::info!(seed = tale.seed(), mode = %tale.mode(), turn = tale.turn(), "Storyweaver started");

    headless::run(tale).await;
    Ok(())
}

fn print_help() {
    println!("Storyweaver - a short tale beneath the city");
    println!();
    println!("USAGE:");
    println!("    storyweaver [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --new         Start a new tale instead of resuming the saved one");
    println!("    -h, --help    Print this help");
    println!();
    println!("ENVIRONMENT:");
    println!("    STORYWEAVER_BASE_URL      Live DM host (default http://127.0.0.1:8787)");
    println!("    STORYWEAVER_ENDPOINT      Live DM endpoint path (default /dm-turn)");
    println!("    STORYWEAVER_TIMEOUT_SECS  Live DM timeout in seconds (default 20)");
    println!("    STORYWEAVER_LIVE          Start in Live mode (1/0)");
    println!("    STORYWEAVER_SEED          Fixed RNG seed");
    println!("    STORYWEAVER_SAVE_DIR      Save directory (default {DEFAULT_SAVE_DIR})");
    println!("    RUST_LOG                  Log filter (default warn)");
}
