//! Ceremony runner - replays a full prize ceremony deterministically.
//!
//! Drives a [`DrawSession`] on a [`SimContext`]: the session's own tick
//! and resolve timers run on the virtual clock, every random choice comes
//! from the seeded RNG, and the draw state is checked after every
//! resolution. Optionally the session is rebuilt from storage every few
//! draws, the way a page reload would.

use crate::context::SimContext;
use crate::error::SimError;
use crate::exporter::{CeremonyReport, DrawEvent, TierSummary};
use crate::plan::CeremonyPlan;

use letto_core::{
    DrawConfig, DrawError, DrawRecord, DrawSession, DrawStore, DrawView, MemoryDrawStore,
    NullPresenter, Persistence, Presenter,
};
use letto_env::DrawContext;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Forwards to the caller's presenter and counts rolling display updates.
struct TickCounter {
    inner: Arc<dyn Presenter>,
    ticks: AtomicU64,
}

impl TickCounter {
    fn take(&self) -> u64 {
        self.ticks.swap(0, Ordering::SeqCst)
    }
}

impl Presenter for TickCounter {
    fn state_changed(&self, view: &DrawView) {
        self.inner.state_changed(view);
    }

    fn rolling_display(&self, name: &str) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        self.inner.rolling_display(name);
    }

    fn winner_drawn(&self, record: &DrawRecord) {
        self.inner.winner_drawn(record);
    }

    fn no_eligible_participants(&self, tier: &str) {
        self.inner.no_eligible_participants(tier);
    }
}

/// Runs ceremonies for one configuration.
pub struct CeremonyRunner {
    config: Arc<DrawConfig>,
    seed: u64,
    plan: CeremonyPlan,
    restart_every: Option<usize>,
    store: Option<Arc<dyn DrawStore>>,
    presenter: Arc<dyn Presenter>,
}

impl CeremonyRunner {
    /// Creates a runner with the default plan and a fresh in-memory store.
    pub fn new(config: Arc<DrawConfig>, seed: u64) -> Self {
        Self {
            config,
            seed,
            plan: CeremonyPlan::default(),
            restart_every: None,
            store: None,
            presenter: Arc::new(NullPresenter),
        }
    }

    pub fn with_plan(mut self, plan: CeremonyPlan) -> Self {
        self.plan = plan;
        self
    }

    /// Rebuilds the session from storage after every `draws` draws.
    pub fn with_restart_every(mut self, draws: usize) -> Self {
        self.restart_every = (draws > 0).then_some(draws);
        self
    }

    /// Uses `store` instead of a fresh in-memory store.
    ///
    /// Any record already under the configured key is purged when the
    /// run starts, so every seed begins from the empty state.
    pub fn with_store(mut self, store: Arc<dyn DrawStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = presenter;
        self
    }

    /// Runs the plan. Setup problems are errors; invariant violations
    /// are reported as a failed [`CeremonyReport`].
    ///
    /// Builds its own current-thread runtime, so it must not be called
    /// from inside one.
    pub fn run(&self) -> Result<CeremonyReport, SimError> {
        self.plan.validate(&self.config)?;
        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        runtime.block_on(self.run_ceremony())
    }

    async fn run_ceremony(&self) -> Result<CeremonyReport, SimError> {
        let context = SimContext::shared(self.seed);
        let store = self
            .store
            .clone()
            .unwrap_or_else(|| Arc::new(MemoryDrawStore::new()));
        if store.read(&self.config.storage_key)?.is_some() {
            debug!(key = %self.config.storage_key, "Discarding stored draw state before the run");
        }
        let persistence = Persistence::new(store, self.config.storage_key.clone());
        persistence.purge();

        let counter = Arc::new(TickCounter {
            inner: Arc::clone(&self.presenter),
            ticks: AtomicU64::new(0),
        });
        let mut session = self.session(&context, &persistence, &counter)?;
        let tier_count = self.config.tier_count();

        let mut report = CeremonyReport::new(self.seed);
        let mut since_restart = 0;

        info!(seed = context.seed(), draws = self.plan.total(), "Ceremony starting");

        for quota in &self.plan.quotas {
            for _ in 0..tier_count {
                if session.with_controller(|c| c.current_tier().name == quota.tier) {
                    break;
                }
                if let Err(e) = session.advance_tier() {
                    report.fail(format!("Could not advance to {}: {}", quota.tier, e));
                    return Ok(report);
                }
            }

            let mut summary = TierSummary {
                tier: quota.tier.clone(),
                quota: quota.quota,
                drawn: 0,
                exhausted: false,
            };

            while summary.drawn < quota.quota {
                let ticket = match session.start_draw() {
                    Ok(ticket) => ticket,
                    Err(DrawError::NoEligibleParticipants { tier }) => {
                        warn!(tier = %tier, drawn = summary.drawn, "Pool exhausted before quota");
                        summary.exhausted = true;
                        break;
                    }
                    Err(e) => {
                        report.fail(format!("Unexpected start failure: {}", e));
                        break;
                    }
                };

                let record = match context.run_until(ticket.finished()).await {
                    Ok(record) => record,
                    Err(e) => {
                        report.fail(format!("Draw never resolved: {}", e));
                        break;
                    }
                };
                let visual_ticks = counter.take();
                debug!(
                    t = context.now().as_secs_f64(),
                    tier = %record.tier,
                    ordinal = record.ordinal,
                    winner = %record.winner,
                    visual_ticks,
                    "Draw resolved"
                );

                let consistency =
                    session.with_controller(|c| c.state().check_consistency(tier_count));
                if let Err(e) = consistency {
                    report.fail(format!("After draw {}: {}", record.roll_id, e));
                }

                let rigged = self.config.rigged_winner(&record.tier, record.ordinal)
                    == Some(record.winner.as_str());
                report.add_draw(DrawEvent {
                    time_sec: context.now().as_secs_f64(),
                    roll_id: record.roll_id,
                    tier: record.tier,
                    ordinal: record.ordinal,
                    winner: record.winner,
                    rigged,
                    visual_ticks,
                });
                summary.drawn += 1;

                since_restart += 1;
                if self.restart_every == Some(since_restart) {
                    since_restart = 0;
                    let restored = self.session(&context, &persistence, &counter)?;
                    let before = session.with_controller(|c| c.state().clone());
                    if restored.with_controller(|c| c.state() != &before) {
                        report.fail(format!(
                            "State changed across restart after {} draws",
                            report.draws.len()
                        ));
                    }
                    session = restored;
                    report.restarts += 1;
                }
            }

            report.add_tier(summary);
        }

        if let Err(e) = session.with_controller(|c| c.state().check_consistency(tier_count)) {
            report.fail(format!("Final state: {}", e));
        }
        report.finalize();

        info!(
            seed = self.seed,
            draws = report.draws.len(),
            passed = report.passed,
            "Ceremony finished"
        );
        Ok(report)
    }

    fn session(
        &self,
        context: &Arc<SimContext>,
        persistence: &Persistence,
        presenter: &Arc<TickCounter>,
    ) -> Result<DrawSession<SimContext>, SimError> {
        Ok(DrawSession::open(
            Arc::clone(context),
            Arc::clone(&self.config),
            persistence.clone(),
            Arc::clone(presenter) as Arc<dyn Presenter>,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::TierQuota;
    use letto_core::{PrizeTier, RecordingPresenter, Roster};

    #[test]
    fn test_default_ceremony_passes() {
        let config = Arc::new(DrawConfig::default());
        let report = CeremonyRunner::new(config.clone(), 42).run().unwrap();

        assert!(report.passed, "{:?}", report.failure_reason);
        assert_eq!(report.draws.len(), 21);
        assert!(report.tiers.iter().all(|t| t.drawn == t.quota && !t.exhausted));

        // Participation prize has 10 draws, so both of its rigged slots fire
        let rigged: Vec<(&str, u32, &str)> = report
            .draws
            .iter()
            .filter(|d| d.rigged)
            .map(|d| (d.tier.as_str(), d.ordinal, d.winner.as_str()))
            .collect();
        assert_eq!(
            rigged,
            vec![
                ("参与奖", 7, "王博"),
                ("参与奖", 9, "王伟业"),
                ("三等奖", 4, "胡星"),
                ("二等奖", 3, "贾超"),
            ]
        );

        // Tier durations: 10*2 + 5*2 + 3*3 + 2*3 + 1*5
        assert_eq!(report.duration_sec, 50.0);
        assert_eq!(report.draws[0].visual_ticks, 39);
    }

    #[test]
    fn test_same_seed_same_ceremony() {
        let config = Arc::new(DrawConfig::default());
        let a = CeremonyRunner::new(config.clone(), 7).run().unwrap();
        let b = CeremonyRunner::new(config.clone(), 7).run().unwrap();
        let c = CeremonyRunner::new(config, 8).run().unwrap();

        assert_eq!(a.winners(), b.winners());
        assert_ne!(a.winners(), c.winners());
    }

    #[test]
    fn test_restarts_preserve_state() {
        let config = Arc::new(DrawConfig::default());
        let report = CeremonyRunner::new(config, 3)
            .with_restart_every(4)
            .run()
            .unwrap();

        assert!(report.passed, "{:?}", report.failure_reason);
        assert_eq!(report.restarts, 5);
    }

    #[test]
    fn test_exhausted_pool_is_reported() {
        let config = Arc::new(DrawConfig::new(
            Roster {
                primary: vec!["A".to_string(), "B".to_string()],
                ..Default::default()
            },
            Vec::new(),
            vec![PrizeTier::new("Gold", 1)],
        ));
        let plan = CeremonyPlan {
            quotas: vec![TierQuota::new("Gold", 5)],
        };

        let report = CeremonyRunner::new(config, 1).with_plan(plan).run().unwrap();

        assert!(report.passed);
        assert_eq!(report.tiers[0].drawn, 2);
        assert!(report.tiers[0].exhausted);
    }

    #[test]
    fn test_presenter_sees_ticks_before_winner() {
        let config = Arc::new(DrawConfig::default());
        let presenter = Arc::new(RecordingPresenter::new());
        let plan: CeremonyPlan = "参与奖=1".parse().unwrap();

        let report = CeremonyRunner::new(config, 11)
            .with_plan(plan)
            .with_presenter(presenter.clone())
            .run()
            .unwrap();

        assert_eq!(presenter.rolling_updates() as u64, report.visual_ticks());
        assert_eq!(presenter.last_view().map(|v| v.distinct_winners), Some(1));
    }

    #[test]
    fn test_unknown_plan_tier_is_an_error() {
        let config = Arc::new(DrawConfig::default());
        let plan: CeremonyPlan = "安慰奖=1".parse().unwrap();
        assert!(matches!(
            CeremonyRunner::new(config, 1).with_plan(plan).run(),
            Err(SimError::Plan(_))
        ));
    }

    #[test]
    fn test_shared_store_runs_match_fresh_runs() {
        let config = Arc::new(DrawConfig::default());
        let store: Arc<dyn DrawStore> = MemoryDrawStore::shared();

        let first = CeremonyRunner::new(config.clone(), 42)
            .with_store(store.clone())
            .run()
            .unwrap();
        let second = CeremonyRunner::new(config.clone(), 43)
            .with_store(store.clone())
            .run()
            .unwrap();
        let fresh = CeremonyRunner::new(config.clone(), 43).run().unwrap();

        assert!(first.passed && second.passed);
        assert_eq!(second.draws[0].ordinal, 1);
        assert_eq!(second.draws.iter().filter(|d| d.rigged).count(), 4);
        assert_eq!(second.winners(), fresh.winners());

        // The store keeps the last run's results
        let saved = Persistence::new(store, config.storage_key.clone()).load(&config);
        assert_eq!(saved.distinct_winners(), second.draws.len());
    }

    #[test]
    fn test_stale_record_is_discarded_before_run() {
        let config = Arc::new(DrawConfig::default());
        let store = MemoryDrawStore::shared();
        store
            .write(&config.storage_key, br#"{"drawnWinners":["X"],"currentPrizeIndex":3}"#)
            .unwrap();

        let report = CeremonyRunner::new(config.clone(), 9)
            .with_store(store)
            .run()
            .unwrap();

        assert!(report.passed, "{:?}", report.failure_reason);
        assert_eq!(report.draws[0].tier, "参与奖");
        assert_eq!(report.draws[0].ordinal, 1);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;
        use std::collections::HashSet;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn prop_ceremony_keeps_invariants(
                seed in any::<u64>(),
                quota in 1u32..15,
                restart_every in 0usize..6,
            ) {
                let config = Arc::new(DrawConfig::default());
                let report = CeremonyRunner::new(config.clone(), seed)
                    .with_plan(CeremonyPlan::uniform(&config, quota))
                    .with_restart_every(restart_every)
                    .run()
                    .unwrap();

                prop_assert!(report.passed, "{:?}", report.failure_reason);

                let mut seen = HashSet::new();
                for draw in &report.draws {
                    prop_assert!(seen.insert(draw.winner.clone()), "duplicate {}", draw.winner);
                    // Rigged names only ever come from their slot
                    prop_assert_eq!(config.is_rigged(&draw.winner), draw.rigged);
                }
            }
        }
    }
}
