//! Check resolution.
//!
//! A check rolls a d20, adds the ability modifier and compares the total
//! against a difficulty drawn fresh for every check. All randomness goes
//! through [`StoryRng`] so sessions can be seeded and tests can script rolls.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

/// Base difficulty before jitter.
pub const BASE_DIFFICULTY: i32 = 10;

/// Lowest and highest difficulty a check can have.
pub const MIN_DIFFICULTY: i32 = 8;
pub const MAX_DIFFICULTY: i32 = 18;

/// Jitter band added to [`BASE_DIFFICULTY`].
const DIFFICULTY_JITTER: (i32, i32) = (-1, 3);

/// Source of randomness for everything the engine rolls.
pub trait StoryRng: Send {
    /// A uniformly random integer in `[min, max]` inclusive.
    fn range(&mut self, min: i32, max: i32) -> i32;
}

/// A [`StoryRng`] backed by a seeded `StdRng`.
pub struct SeededRng {
    rng: StdRng,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl StoryRng for SeededRng {
    fn range(&mut self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        self.rng.gen_range(min..=max)
    }
}

/// Ability modifier for a score: `floor((score - 10) / 2)`.
pub fn modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// `base` plus a random offset in `[min, max]`, clamped to `[lo, hi]`.
pub fn clamped_roll(rng: &mut dyn StoryRng, base: i32, offset: (i32, i32), lo: i32, hi: i32) -> i32 {
    (base + rng.range(offset.0, offset.1)).clamp(lo, hi)
}

/// Roll a d20.
pub fn roll_d20(rng: &mut dyn StoryRng) -> i32 {
    rng.range(1, 20)
}

/// Draw a difficulty for one check.
pub fn roll_difficulty(rng: &mut dyn StoryRng) -> i32 {
    clamped_roll(
        rng,
        BASE_DIFFICULTY,
        DIFFICULTY_JITTER,
        MIN_DIFFICULTY,
        MAX_DIFFICULTY,
    )
}

/// The outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Check {
    pub roll: i32,
    pub modifier: i32,
    pub difficulty: i32,
    pub total: i32,
    pub passed: bool,
}

impl Check {
    /// Build a check from its parts, deriving `total` and `passed`.
    pub fn new(roll: i32, modifier: i32, difficulty: i32) -> Self {
        let total = roll + modifier;
        Self {
            roll,
            modifier,
            difficulty,
            total,
            passed: total >= difficulty,
        }
    }

    /// The roll annotation attached to a beat, e.g. `d20 15 +1 vs DC 10 ⇒ 16`.
    pub fn summary(&self) -> String {
        format!(
            "d20 {} {} vs DC {} ⇒ {}",
            self.roll,
            format_modifier(self.modifier),
            self.difficulty,
            self.total
        )
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Resolve a check for an ability score.
///
/// The difficulty is drawn before the die. Nothing outside the RNG is touched;
/// the caller decides what to do with the outcome.
pub fn resolve_check(score: i32, rng: &mut dyn StoryRng) -> Check {
    let difficulty = roll_difficulty(rng);
    let roll = roll_d20(rng);
    Check::new(roll, modifier(score), difficulty)
}

/// Signed modifier, e.g. `+2`, `+0`, `-1`.
pub fn format_modifier(modifier: i32) -> String {
    if modifier >= 0 {
        format!("+{modifier}")
    } else {
        modifier.to_string()
    }
}

/// Shuffle a slice in place (Fisher-Yates).
pub fn shuffle<T>(items: &mut [T], rng: &mut dyn StoryRng) {
    for i in (1..items.len()).rev() {
        let j = rng.range(0, i as i32) as usize;
        items.swap(i, j.min(i));
    }
}

/// Pick one element uniformly.
pub fn pick<'a, T>(items: &'a [T], rng: &mut dyn StoryRng) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    let index = rng.range(0, items.len() as i32 - 1) as usize;
    items.get(index.min(items.len() - 1))
}
