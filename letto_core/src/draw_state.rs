//! Draw State - the mutable aggregate behind every draw.
//!
//! Holds who has won, how many winners each tier has, the ordered history
//! and the active tier. Only the lifecycle controller mutates it; the
//! persistence adapter rebuilds it on load.

use crate::config::DrawConfig;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One awarded prize, in draw order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub name: String,
    pub prize: String,
}

impl HistoryEntry {
    pub fn new(name: impl Into<String>, prize: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prize: prize.into(),
        }
    }
}

/// A violated Draw State invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyError {
    #[error("{0} appears more than once in the history")]
    DuplicateWinner(String),

    #[error("{0} is in the history but not in the drawn winners")]
    MissingFromWinners(String),

    #[error("{0} is a drawn winner with no history entry")]
    MissingFromHistory(String),

    #[error("Counter for {tier} is {counter} but history has {history} entries")]
    CounterMismatch {
        tier: String,
        counter: u64,
        history: u64,
    },

    #[error("Tier index {index} out of range for {count} tiers")]
    TierIndexOutOfRange { index: usize, count: usize },
}

/// Mutable draw record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawState {
    /// Insertion-ordered, so saving keeps draw order
    drawn_winners: IndexSet<String>,

    /// Keyed by tier name, in configured tier order
    prize_counters: IndexMap<String, u64>,

    history: Vec<HistoryEntry>,

    current_tier_index: usize,
}

impl DrawState {
    /// Empty state: every configured tier at zero, tier index 0.
    pub fn new(config: &DrawConfig) -> Self {
        Self {
            drawn_winners: IndexSet::new(),
            prize_counters: config.tiers.iter().map(|t| (t.name.clone(), 0)).collect(),
            history: Vec::new(),
            current_tier_index: 0,
        }
    }

    /// Reassembles a state from already-sanitized parts.
    pub(crate) fn from_parts(
        drawn_winners: IndexSet<String>,
        prize_counters: IndexMap<String, u64>,
        history: Vec<HistoryEntry>,
        current_tier_index: usize,
    ) -> Self {
        Self {
            drawn_winners,
            prize_counters,
            history,
            current_tier_index,
        }
    }

    pub fn drawn_winners(&self) -> &IndexSet<String> {
        &self.drawn_winners
    }

    pub fn prize_counters(&self) -> &IndexMap<String, u64> {
        &self.prize_counters
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn current_tier_index(&self) -> usize {
        self.current_tier_index
    }

    pub fn is_drawn(&self, name: &str) -> bool {
        self.drawn_winners.contains(name)
    }

    /// Winners so far for `tier` (0 for tiers never drawn).
    pub fn count_for(&self, tier: &str) -> u64 {
        self.prize_counters.get(tier).copied().unwrap_or(0)
    }

    pub fn distinct_winners(&self) -> usize {
        self.drawn_winners.len()
    }

    /// Applies a resolved draw. Returns false if `name` had already won.
    pub(crate) fn record_win(&mut self, name: &str, tier: &str) -> bool {
        if !self.drawn_winners.insert(name.to_string()) {
            return false;
        }
        *self.prize_counters.entry(tier.to_string()).or_insert(0) += 1;
        self.history.push(HistoryEntry::new(name, tier));
        true
    }

    /// Moves to the next tier, wrapping past the last one.
    pub(crate) fn advance_tier(&mut self, tier_count: usize) -> usize {
        self.current_tier_index = if tier_count == 0 {
            0
        } else {
            (self.current_tier_index + 1) % tier_count
        };
        self.current_tier_index
    }

    /// Checks every invariant; returns the first violation found.
    pub fn check_consistency(&self, tier_count: usize) -> Result<(), ConsistencyError> {
        if self.current_tier_index >= tier_count.max(1) {
            return Err(ConsistencyError::TierIndexOutOfRange {
                index: self.current_tier_index,
                count: tier_count,
            });
        }

        let mut seen = IndexSet::new();
        let mut per_tier: IndexMap<&str, u64> = IndexMap::new();
        for entry in &self.history {
            if !seen.insert(entry.name.as_str()) {
                return Err(ConsistencyError::DuplicateWinner(entry.name.clone()));
            }
            if !self.drawn_winners.contains(&entry.name) {
                return Err(ConsistencyError::MissingFromWinners(entry.name.clone()));
            }
            *per_tier.entry(entry.prize.as_str()).or_insert(0) += 1;
        }

        if let Some(orphan) = self.drawn_winners.iter().find(|w| !seen.contains(w.as_str())) {
            return Err(ConsistencyError::MissingFromHistory(orphan.clone()));
        }

        for (tier, counter) in &self.prize_counters {
            let history = per_tier.get(tier.as_str()).copied().unwrap_or(0);
            if *counter != history {
                return Err(ConsistencyError::CounterMismatch {
                    tier: tier.clone(),
                    counter: *counter,
                    history,
                });
            }
        }
        for (tier, history) in &per_tier {
            if !self.prize_counters.contains_key(*tier) {
                return Err(ConsistencyError::CounterMismatch {
                    tier: tier.to_string(),
                    counter: 0,
                    history: *history,
                });
            }
        }

        Ok(())
    }
}
