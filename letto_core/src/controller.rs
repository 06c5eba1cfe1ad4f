//! Draw Lifecycle Controller - the Idle/Rolling state machine.
//!
//! ```text
//!            start() [winner available]
//!   ┌──────┐ ─────────────────────────► ┌─────────┐
//!   │ Idle │                            │ Rolling │
//!   └──────┘ ◄───────────────────────── └─────────┘
//!      │        resolve() after duration
//!      │
//!      ├── advance_tier()   (Idle only)
//!      └── reset()          (any time)
//! ```
//!
//! The winner is fixed when `start()` succeeds, not when `resolve()`
//! fires. Every resolution is one in-memory update followed by one full
//! save, then a presenter notification.

use crate::config::{ConfigError, DrawConfig, PrizeTier};
use crate::draw_state::DrawState;
use crate::persistence::Persistence;
use crate::presenter::{DrawView, Presenter};
use crate::selection;
use rand::seq::SliceRandom;
use rand::RngCore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Errors surfaced synchronously to the caller. None of them alter state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrawError {
    #[error("No eligible participants remain for {tier}")]
    NoEligibleParticipants { tier: String },

    #[error("A draw is already rolling")]
    AlreadyRolling,

    #[error("No draw is rolling")]
    NotRolling,
}

/// A draw that has started rolling. The winner is already decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingDraw {
    pub roll_id: u64,
    pub winner: String,
    pub tier_index: usize,
    pub tier: String,
    pub ordinal: u32,
    pub duration: Duration,
}

/// A resolved draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawRecord {
    pub roll_id: u64,
    pub winner: String,
    pub tier: String,
    pub ordinal: u32,

    /// Distinct winners after this draw
    pub distinct_winners: usize,
}

/// Controller phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawPhase {
    Idle,
    Rolling(PendingDraw),
}

/// Owns the draw state and applies every command to it.
pub struct DrawController {
    config: Arc<DrawConfig>,
    state: DrawState,
    phase: DrawPhase,
    persistence: Persistence,
    presenter: Arc<dyn Presenter>,
    next_roll_id: u64,
}

impl DrawController {
    /// Validates the config and restores state from `persistence`.
    pub fn new(
        config: Arc<DrawConfig>,
        persistence: Persistence,
        presenter: Arc<dyn Presenter>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = persistence.load(&config);
        info!(
            winners = state.distinct_winners(),
            tier_index = state.current_tier_index(),
            "Draw state restored"
        );

        Ok(Self {
            config,
            state,
            phase: DrawPhase::Idle,
            persistence,
            presenter,
            next_roll_id: 1,
        })
    }

    pub fn config(&self) -> &Arc<DrawConfig> {
        &self.config
    }

    pub fn state(&self) -> &DrawState {
        &self.state
    }

    pub fn phase(&self) -> &DrawPhase {
        &self.phase
    }

    pub fn is_rolling(&self) -> bool {
        matches!(self.phase, DrawPhase::Rolling(_))
    }

    /// Id of the rolling draw, if any.
    pub fn rolling_id(&self) -> Option<u64> {
        match &self.phase {
            DrawPhase::Rolling(pending) => Some(pending.roll_id),
            DrawPhase::Idle => None,
        }
    }

    /// The active tier. The state keeps its index in range.
    pub fn current_tier(&self) -> &PrizeTier {
        &self.config.tiers[self.state.current_tier_index()]
    }

    /// Begins a draw for the active tier.
    pub fn start(&mut self, rng: &mut dyn RngCore) -> Result<PendingDraw, DrawError> {
        if self.is_rolling() {
            return Err(DrawError::AlreadyRolling);
        }

        let tier_index = self.state.current_tier_index();
        let tier = self.current_tier().clone();
        let ordinal = selection::next_ordinal(&self.state, &tier.name);

        let Some(winner) = selection::select_winner(&self.state, &self.config, tier_index, rng)
        else {
            warn!(tier = %tier.name, "No eligible participants remain");
            self.presenter.no_eligible_participants(&tier.name);
            return Err(DrawError::NoEligibleParticipants { tier: tier.name });
        };

        let pending = PendingDraw {
            roll_id: self.next_roll_id,
            winner,
            tier_index,
            tier: tier.name.clone(),
            ordinal,
            duration: tier.duration(),
        };
        self.next_roll_id += 1;
        info!(
            roll = pending.roll_id,
            tier = %pending.tier,
            ordinal,
            duration_secs = tier.duration_secs,
            "Draw rolling"
        );

        self.phase = DrawPhase::Rolling(pending.clone());
        self.notify();
        Ok(pending)
    }

    /// Completes the rolling draw: record, save, notify.
    pub fn resolve(&mut self) -> Result<DrawRecord, DrawError> {
        let DrawPhase::Rolling(pending) = std::mem::replace(&mut self.phase, DrawPhase::Idle)
        else {
            return Err(DrawError::NotRolling);
        };

        if !self.state.record_win(&pending.winner, &pending.tier) {
            error!(winner = %pending.winner, "Winner already recorded; draw discarded");
        }
        self.persistence.save(&self.state);

        let record = DrawRecord {
            roll_id: pending.roll_id,
            winner: pending.winner,
            tier: pending.tier,
            ordinal: pending.ordinal,
            distinct_winners: self.state.distinct_winners(),
        };
        info!(
            roll = record.roll_id,
            winner = %record.winner,
            tier = %record.tier,
            ordinal = record.ordinal,
            "Winner drawn"
        );

        self.presenter.winner_drawn(&record);
        self.notify();
        Ok(record)
    }

    /// Resolves only if `roll_id` is the draw still rolling.
    ///
    /// Timer callbacks use this so a roll discarded by `reset()` cannot
    /// resolve a later one.
    pub fn resolve_roll(&mut self, roll_id: u64) -> Result<DrawRecord, DrawError> {
        if self.rolling_id() != Some(roll_id) {
            return Err(DrawError::NotRolling);
        }
        self.resolve()
    }

    /// Moves to the next tier, wrapping after the last.
    pub fn advance_tier(&mut self) -> Result<&PrizeTier, DrawError> {
        if self.is_rolling() {
            return Err(DrawError::AlreadyRolling);
        }

        let index = self.state.advance_tier(self.config.tier_count());
        self.persistence.save(&self.state);
        info!(tier_index = index, tier = %self.config.tiers[index].name, "Advanced tier");

        self.notify();
        Ok(self.current_tier())
    }

    /// Clears storage and returns to the empty state. Any rolling draw is
    /// discarded.
    pub fn reset(&mut self) {
        if let DrawPhase::Rolling(pending) = &self.phase {
            warn!(roll = pending.roll_id, "Reset discards rolling draw");
        }
        self.persistence.purge();
        self.state = DrawState::new(&self.config);
        self.phase = DrawPhase::Idle;
        info!("Draw state reset");
        self.notify();
    }

    /// Picks a name to flash while rolling, from primary names not yet drawn.
    pub fn visual_pick(&self, rng: &mut dyn RngCore) -> Option<String> {
        selection::visual_pool(&self.state, &self.config)
            .choose(rng)
            .map(|name| name.to_string())
    }

    /// Sends a rolling display update to the presenter.
    pub fn show_rolling(&self, name: &str) {
        self.presenter.rolling_display(name);
    }

    pub fn view(&self) -> DrawView {
        let tier = self.current_tier();
        DrawView {
            tier_index: self.state.current_tier_index(),
            tier_name: tier.name.clone(),
            tier_count: self.state.count_for(&tier.name),
            rolling: self.is_rolling(),
            history: self.state.history().to_vec(),
            distinct_winners: self.state.distinct_winners(),
        }
    }

    fn notify(&self) {
        self.presenter.state_changed(&self.view());
    }
}
