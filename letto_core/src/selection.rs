//! Winner Selection Engine.
//!
//! Pure functions of (state, config, tier). Nothing here mutates the
//! draw state, so a winner can be computed speculatively and discarded.
//!
//! # Algorithm
//!
//! ```text
//! ordinal = counter[tier] + 1
//! rigged(tier, ordinal) not yet drawn?  ──► that name
//! pool = primary (+ secondary for the two lowest tiers)
//!        − rigged − already drawn
//! pool empty?                           ──► None
//! otherwise                             ──► uniform pick from pool
//! ```

use crate::config::DrawConfig;
use crate::draw_state::DrawState;
use rand::seq::SliceRandom;
use rand::RngCore;
use tracing::{debug, warn};

/// The 1-based position the next draw would take within `tier`.
pub fn next_ordinal(state: &DrawState, tier: &str) -> u32 {
    let next = state.count_for(tier).saturating_add(1);
    u32::try_from(next).unwrap_or(u32::MAX)
}

/// Returns the rigged winner for the next draw of the tier at `tier_index`.
///
/// A slot whose participant has already won yields `None` so the random
/// branch can fill it without producing a duplicate.
pub fn rigged_slot<'a>(
    state: &DrawState,
    config: &'a DrawConfig,
    tier_index: usize,
) -> Option<&'a str> {
    let tier = config.tier(tier_index)?;
    let ordinal = next_ordinal(state, &tier.name);
    let winner = config.rigged_winner(&tier.name, ordinal)?;
    if state.is_drawn(winner) {
        warn!(
            tier = %tier.name,
            ordinal,
            winner,
            "Rigged winner already drawn; falling back to random draw"
        );
        return None;
    }
    Some(winner)
}

/// Names eligible for a random draw at `tier_index`, in roster order.
pub fn eligibility_pool<'a>(
    state: &DrawState,
    config: &'a DrawConfig,
    tier_index: usize,
) -> Vec<&'a str> {
    let roster = &config.roster;
    let secondary: &[String] = if config.is_lower_tier(tier_index) {
        &roster.secondary
    } else {
        &[]
    };

    roster
        .primary
        .iter()
        .chain(secondary)
        .map(String::as_str)
        .filter(|name| !config.is_rigged(name) && !state.is_drawn(name))
        .collect()
}

/// Names shown while a draw is rolling: primary participants not yet drawn.
///
/// Visual only. Nothing picked from here is ever recorded.
pub fn visual_pool<'a>(state: &DrawState, config: &'a DrawConfig) -> Vec<&'a str> {
    config
        .roster
        .primary
        .iter()
        .map(String::as_str)
        .filter(|name| !state.is_drawn(name))
        .collect()
}

/// Computes the next winner for the tier at `tier_index`.
///
/// A rigged slot wins unless its participant has already been drawn
/// (possible only after a stored counter was reset on load); that slot is
/// then filled from the random pool instead, so no name ever wins twice.
///
/// Returns `None` when the index is out of range or no eligible
/// participant remains.
pub fn select_winner(
    state: &DrawState,
    config: &DrawConfig,
    tier_index: usize,
    rng: &mut dyn RngCore,
) -> Option<String> {
    let tier = config.tier(tier_index)?;

    if let Some(winner) = rigged_slot(state, config, tier_index) {
        debug!(tier = %tier.name, winner, "Rigged slot");
        return Some(winner.to_string());
    }

    let pool = eligibility_pool(state, config, tier_index);
    let winner = pool.choose(rng)?;
    debug!(tier = %tier.name, pool = pool.len(), winner, "Random draw");
    Some(winner.to_string())
}
