//! Line protocol for playing a tale.
//!
//! - A number picks the visible choice with that number
//! - Lines starting with `#` are commands
//! - Anything else is a free action
//!
//! Output lines are prefixed with `[DM]`, `[STATUS]`, `[ERROR]` and so on.

use std::io::{self, BufRead, Write};
use weaver_core::{CharacterEdit, NarrationMode, Tale, TalePhase, TurnOutcome};

const COMMANDS: &[(&str, &str)] = &[
    ("#begin", "Start a new tale with the current character"),
    ("#end", "Close the tale with an epilogue"),
    ("#undo", "Drop the latest beat"),
    ("#save", "Save the tale"),
    ("#load", "Restore the saved tale"),
    ("#status", "Show the character and tale state"),
    ("#live", "Narrate through the Live DM"),
    ("#local", "Narrate locally"),
    ("#endpoint <path>", "Set the Live DM endpoint (blank resets)"),
    ("#edit field=value ...", "Edit name, str, dex, int, cha, hp, gold, inv"),
    ("#auto", "Roll a random character"),
    ("#help", "Show this help"),
    ("#quit", "Save and exit"),
];

/// Run the protocol on stdin until `#quit` or end of input.
pub async fn run(mut tale: Tale) {
    println!("=== Storyweaver ===");
    print_help();
    println!();
    print_scene(&tale);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('#') {
            if !handle_command(&mut tale, command) {
                break;
            }
            stdout.flush().ok();
            continue;
        }

        let seen = tale.state().log.len();
        let result = match line.parse::<usize>() {
            Ok(0) => {
                println!("[ERROR] Choices are numbered from 1");
                continue;
            }
            Ok(number) => tale.choose(number - 1).await,
            Err(_) => tale.act(line).await,
        };

        match result {
            Ok(outcome) => {
                print_turn(&tale, &outcome, seen);
                tale.save();
            }
            Err(e) => println!("[ERROR] {e}"),
        }
        stdout.flush().ok();
    }

    tale.save();
}

/// Handle one command. Returns false when the player quits.
fn handle_command(tale: &mut Tale, command: &str) -> bool {
    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    match name {
        "quit" | "exit" => {
            tale.save();
            println!("Goodbye!");
            return false;
        }
        "begin" => {
            tale.begin();
            print_scene(tale);
        }
        "end" => {
            tale.end();
            print_latest(tale);
        }
        "undo" => {
            if tale.undo() {
                println!("[UNDONE] Back to turn {}", tale.turn());
                print_choices(tale);
            } else {
                println!("[ERROR] Nothing to undo");
            }
        }
        "save" => {
            tale.save();
            println!("[SAVED] Turn {}", tale.turn());
        }
        "load" => {
            if tale.load() {
                println!("[LOADED] Turn {}", tale.turn());
                print_scene(tale);
            } else {
                println!("[ERROR] No usable save");
            }
        }
        "status" => print_status(tale),
        "live" => {
            let mode = tale.set_mode(NarrationMode::Live);
            println!("[MODE] {mode}");
        }
        "local" => {
            let mode = tale.set_mode(NarrationMode::Local);
            println!("[MODE] {mode}");
        }
        "endpoint" => {
            let endpoint = tale.set_endpoint(rest);
            println!("[ENDPOINT] {endpoint}");
        }
        "edit" => edit_character(tale, rest),
        "auto" => {
            tale.auto_generate_character();
            print_status(tale);
        }
        "help" => print_help(),
        _ => println!("[ERROR] Unknown command. Type #help for help."),
    }
    true
}

fn edit_character(tale: &mut Tale, args: &str) {
    let mut edit = CharacterEdit::default();
    for pair in args.split_whitespace() {
        match pair.split_once('=') {
            Some((field, value)) if edit.set(field, value) => {}
            _ => {
                println!("[ERROR] Usage: #edit field=value (fields: name str dex int cha hp gold inv)");
                return;
            }
        }
    }
    tale.edit_character(&edit);
    print_status(tale);
}

fn print_help() {
    println!("[HELP]");
    for (command, description) in COMMANDS {
        println!("  {command:<22} - {description}");
    }
    println!("  <number>               - Pick a choice");
    println!("  (anything else is a free action)");
}

/// Print a finished turn. Notices past `seen` were raised by it.
fn print_turn(tale: &Tale, outcome: &TurnOutcome, seen: usize) {
    println!(
        "[ROLL] {} {} - {}",
        outcome.ability,
        outcome.check,
        if outcome.check.passed { "success" } else { "failure" }
    );
    for notice in tale.state().log.iter().skip(seen) {
        println!("[NOTICE] {notice}");
    }
    print_latest(tale);
    print_choices(tale);
}

fn print_scene(tale: &Tale) {
    println!("[SCENE] {} - turn {}", tale.state().scene, tale.turn());
    print_latest(tale);
    print_choices(tale);
}

fn print_latest(tale: &Tale) {
    if let Some(beat) = tale.state().last_beat() {
        println!("[DM]");
        println!("{}", beat.text);
        println!();
    }
}

fn print_choices(tale: &Tale) {
    if tale.phase() == TalePhase::Ended {
        println!("[END] Type #begin to play again.");
        return;
    }
    println!("[CHOICES]");
    for (i, choice) in tale.choices().iter().enumerate() {
        println!("  {}. {}", i + 1, choice.sentence);
    }
}

fn print_status(tale: &Tale) {
    let state = tale.state();
    let character = &state.character;
    let seals: Vec<&str> = state.flags.seals().iter().map(|s| s.name()).collect();

    println!("[STATUS]");
    println!("  Character: {}", character.name);
    println!(
        "  STR {} DEX {} INT {} CHA {}",
        character.strength, character.dexterity, character.intelligence, character.charisma
    );
    println!("  HP: {}  Gold: {}", character.hit_points, character.gold);
    if !character.inventory.is_empty() {
        println!("  Inventory: {}", character.inventory.join(", "));
    }
    if !seals.is_empty() {
        println!("  Seals: {}", seals.join(", "));
    }
    println!("  Scene: {}  Turn: {}  Tale: {}", state.scene, tale.turn(), tale.phase());
    println!("  Narration: {} ({})", tale.mode(), tale.endpoint());
}
