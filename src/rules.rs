/// Dice rules used to summarize and reroll events
use crate::event::Event;
use rand::Rng;
use serde::Serialize;

/// Lowest die face counted as a hit
pub const HIT_THRESHOLD: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Glitch {
    None,
    Glitch,
    /// A glitch with no hits at all
    Critical,
}

/// Summary of a dice event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "ty", rename_all = "camelCase")]
pub enum RollOutcome {
    Dice { hits: u32, glitch: Glitch },
    Initiative { total: i32 },
}

/// Summarize an event; `None` for events without dice
pub fn outcome(event: &Event) -> Option<RollOutcome> {
    match event {
        Event::Roll { dice, glitchy, .. } => Some(dice_outcome(dice, count_hits(dice), *glitchy)),
        Event::EdgeRoll { rounds, glitchy, .. } => {
            let first = rounds.first().map(Vec::as_slice).unwrap_or_default();
            let hits = rounds.iter().map(|round| count_hits(round)).sum();
            Some(dice_outcome(first, hits, *glitchy))
        }
        // rounds[0] rerolled the failures of the original roll in rounds[1]
        Event::RerollFailures { rounds, glitchy, .. } => {
            let original = rounds.get(1).map(Vec::as_slice).unwrap_or_default();
            let hits = rounds.iter().map(|round| count_hits(round)).sum();
            Some(dice_outcome(original, hits, *glitchy))
        }
        Event::Initiative { base, dice, .. } => Some(RollOutcome::Initiative {
            total: base + dice.iter().map(|&die| i32::from(die)).sum::<i32>(),
        }),
        Event::PlayerJoin { .. } => None,
    }
}

pub fn count_hits(dice: &[u8]) -> u32 {
    dice.iter().filter(|&&die| die >= HIT_THRESHOLD).count() as u32
}

fn dice_outcome(glitch_dice: &[u8], hits: u32, glitchy: i32) -> RollOutcome {
    RollOutcome::Dice {
        hits,
        glitch: glitch(glitch_dice, hits, glitchy),
    }
}

/// More than half the pool (after `glitchy` adjustments) shows ones
fn glitch(dice: &[u8], hits: u32, glitchy: i32) -> Glitch {
    if dice.is_empty() {
        return Glitch::None;
    }
    let ones = dice.iter().filter(|&&die| die == 1).count() as i64 + i64::from(glitchy);
    if ones * 2 <= dice.len() as i64 {
        Glitch::None
    } else if hits == 0 {
        Glitch::Critical
    } else {
        Glitch::Glitch
    }
}

/// Roll `count` six-sided dice
pub fn roll_dice(count: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..count).map(|_| rng.gen_range(1..=6)).collect()
}

/// Fresh dice for every failure in `dice`
pub fn reroll_failures(dice: &[u8]) -> Vec<u8> {
    roll_dice(dice.len() - count_hits(dice) as usize)
}
