//! Simulation context implementing DrawContext for deterministic runs.
//!
//! Time only moves when the driver says so. `sleep` parks the caller on a
//! virtual timer; [`SimContext::run_until`] fires timers one at a time in
//! `(deadline, registration)` order and lets the woken task run before
//! firing the next. Two timers due at the same instant therefore always
//! fire in the order they were set.

use async_trait::async_trait;
use letto_env::{DrawContext, TaskHandle};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::Poll;
use std::time::Duration;
use tokio::sync::oneshot;

/// Yields given to woken tasks after each timer fires.
const SETTLE_YIELDS: usize = 8;

/// Pending timers keyed by (deadline ns, registration sequence).
#[derive(Default)]
struct Timers {
    next_seq: u64,
    pending: BTreeMap<(u64, u64), oneshot::Sender<()>>,
}

/// Simulation context backed by a virtual clock and a seeded RNG.
///
/// Tasks spawned through it run on the current Tokio runtime; drive them
/// from a current-thread runtime for a reproducible schedule.
pub struct SimContext {
    seed: u64,

    /// Virtual time in nanoseconds since the run started
    clock: Mutex<u64>,

    timers: Mutex<Timers>,

    /// Winner and visual picks
    rng: Mutex<ChaCha8Rng>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SimContext {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            clock: Mutex::new(0),
            timers: Mutex::new(Timers::default()),
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    fn register(&self, duration: Duration) -> oneshot::Receiver<()> {
        let deadline = lock(&self.clock).saturating_add(duration.as_nanos() as u64);
        let (tx, rx) = oneshot::channel();
        let mut timers = lock(&self.timers);
        let seq = timers.next_seq;
        timers.next_seq += 1;
        timers.pending.insert((deadline, seq), tx);
        rx
    }

    /// Fires the earliest live timer, moving the clock to its deadline.
    ///
    /// Timers whose sleeper is gone (an aborted task) are dropped without
    /// touching the clock. Returns false when nothing is left to fire.
    fn fire_next(&self) -> bool {
        loop {
            let Some(((deadline, _), tx)) = lock(&self.timers).pending.pop_first() else {
                return false;
            };
            if tx.is_closed() {
                continue;
            }
            {
                let mut clock = lock(&self.clock);
                *clock = (*clock).max(deadline);
            }
            if tx.send(()).is_ok() {
                return true;
            }
        }
    }

    /// Drives virtual time until `future` completes.
    ///
    /// Between timers every spawned task gets a chance to run, so the
    /// future observes the state after the last fired timer. If no timers
    /// remain the future is awaited directly.
    pub async fn run_until<F: Future>(&self, future: F) -> F::Output {
        let mut future = std::pin::pin!(future);
        loop {
            for _ in 0..SETTLE_YIELDS {
                tokio::task::yield_now().await;
            }
            let polled = std::future::poll_fn(|cx| {
                Poll::Ready(match future.as_mut().poll(cx) {
                    Poll::Ready(output) => Some(output),
                    Poll::Pending => None,
                })
            })
            .await;
            if let Some(output) = polled {
                return output;
            }
            if !self.fire_next() {
                return future.await;
            }
        }
    }
}

#[async_trait]
impl DrawContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(*lock(&self.clock))
    }

    async fn sleep(&self, duration: Duration) {
        let wake = self.register(duration);
        // A dropped sender only happens when the context itself is gone
        let _ = wake.await;
    }

    fn spawn<F>(&self, name: &str, future: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let join = tokio::spawn(future);
        TaskHandle::from_abort(name, join.abort_handle())
    }

    fn with_rng<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&mut dyn RngCore) -> T,
    {
        f(&mut *lock(&self.rng))
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use letto_core::{
        DrawConfig, DrawSession, Persistence, PresenterEvent, PrizeTier, RecordingPresenter,
        Roster,
    };
    use letto_env::EnvError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn session(
        ctx: &Arc<SimContext>,
        primary: &[&str],
    ) -> (DrawSession<SimContext>, Arc<RecordingPresenter>) {
        let config = Arc::new(DrawConfig::new(
            Roster {
                primary: primary.iter().map(|n| n.to_string()).collect(),
                ..Default::default()
            },
            Vec::new(),
            vec![PrizeTier::new("参与奖", 2), PrizeTier::new("三等奖", 2)],
        ));
        let presenter = Arc::new(RecordingPresenter::new());
        let session = DrawSession::open(
            Arc::clone(ctx),
            Arc::clone(&config),
            Persistence::in_memory(&config),
            presenter.clone(),
        )
        .unwrap();
        (session, presenter)
    }

    #[test]
    fn test_sim_context_deterministic_rng() {
        let ctx1 = SimContext::new(42);
        let ctx2 = SimContext::new(42);

        let a: Vec<u32> = (0..8).map(|_| ctx1.with_rng(|rng| rng.next_u32())).collect();
        let b: Vec<u32> = (0..8).map(|_| ctx2.with_rng(|rng| rng.next_u32())).collect();
        assert_eq!(a, b);

        let ctx3 = SimContext::new(43);
        let c: Vec<u32> = (0..8).map(|_| ctx3.with_rng(|rng| rng.next_u32())).collect();
        assert_ne!(a, c);
        assert_eq!(ctx3.seed(), 43);
    }

    #[tokio::test]
    async fn test_sleep_waits_for_virtual_clock() {
        let ctx = SimContext::shared(1);
        let woke = Arc::new(AtomicUsize::new(0));

        let (inner, flag) = (Arc::clone(&ctx), Arc::clone(&woke));
        let join = tokio::spawn(async move {
            inner.sleep(Duration::from_secs(3)).await;
            flag.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..SETTLE_YIELDS {
            tokio::task::yield_now().await;
        }
        assert_eq!(ctx.now(), Duration::ZERO);
        assert_eq!(woke.load(Ordering::SeqCst), 0);

        ctx.run_until(join).await.unwrap();
        assert_eq!(ctx.now(), Duration::from_secs(3));
        assert_eq!(woke.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_same_deadline_fires_in_registration_order() {
        let ctx = SimContext::shared(1);
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut joins = Vec::new();
        for label in ["first", "second", "third"] {
            let (inner, order) = (Arc::clone(&ctx), Arc::clone(&order));
            joins.push(tokio::spawn(async move {
                inner.sleep(Duration::from_millis(100)).await;
                lock(&*order).push(label);
            }));
        }

        for join in joins {
            ctx.run_until(join).await.unwrap();
        }
        assert_eq!(*lock(&*order), vec!["first", "second", "third"]);
        assert_eq!(ctx.now(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_session_ticks_stop_exactly_at_resolution() {
        let ctx = SimContext::shared(7);
        let (session, presenter) = session(&ctx, &["A", "B", "C"]);

        let ticket = session.start_draw().unwrap();
        let tick = ticket.tick.clone();
        let record = ctx.run_until(ticket.finished()).await.unwrap();

        assert_eq!(ctx.now(), Duration::from_secs(2));
        // The 2s tick was set after the resolve timer, so it never shows
        assert_eq!(presenter.rolling_updates(), 39);
        assert!(tick.is_cancelled());

        let winner_at = presenter.first_winner_position().unwrap();
        assert!(!presenter.events()[winner_at..]
            .iter()
            .any(|e| matches!(e, PresenterEvent::RollingDisplay(_))));
        assert_eq!(record.distinct_winners, 1);

        // Nothing left to move the clock
        ctx.run_until(async {}).await;
        assert!(!ctx.fire_next());
        assert_eq!(ctx.now(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_session_replays_identically_per_seed() {
        async fn winners(seed: u64) -> Vec<String> {
            let ctx = SimContext::shared(seed);
            let (session, _) = session(&ctx, &["A", "B", "C", "D", "E", "F"]);
            let mut winners = Vec::new();
            for _ in 0..4 {
                let ticket = session.start_draw().unwrap();
                winners.push(ctx.run_until(ticket.finished()).await.unwrap().winner);
            }
            winners
        }

        assert_eq!(winners(5).await, winners(5).await);
    }

    #[tokio::test]
    async fn test_session_reset_cancels_on_virtual_clock() {
        let ctx = SimContext::shared(3);
        let (session, presenter) = session(&ctx, &["A", "B"]);

        let ticket = session.start_draw().unwrap();
        let resolve = ticket.resolve.clone();
        ctx.run_until(async {}).await;
        session.reset_all();

        let outcome = ctx.run_until(ticket.finished()).await;
        assert!(matches!(outcome, Err(EnvError::TaskCancelled(_))));
        assert!(resolve.is_cancelled());
        assert_eq!(session.view().distinct_winners, 0);

        presenter.clear();
        ctx.run_until(async {}).await;
        assert!(presenter.events().is_empty());
        assert!(ctx.now() < Duration::from_secs(2));
    }
}
