//! Draw Session - runs the controller against an environment context.
//!
//! This module is the integration layer between the synchronous state
//! machine ([`DrawController`]) and the environment abstraction
//! ([`DrawContext`]). It turns a successful `start()` into two timer
//! tasks:
//!
//! ```text
//!   start_draw()
//!       │
//!       ├── visual-tick task: every tick → rolling_display(random name)
//!       │                     stops when the roll is no longer active
//!       │
//!       └── resolve task:     sleep(duration) → [lock] cancel tick,
//!                             resolve_roll() → RollTicket outcome
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use letto_core::{DrawSession, DrawConfig, Persistence, NullPresenter};
//! use letto_env::TokioContext;
//!
//! let config = Arc::new(DrawConfig::default());
//! let persistence = Persistence::in_memory(&config);
//! let presenter = Arc::new(NullPresenter);
//! let session = DrawSession::open(TokioContext::shared(), config, persistence, presenter)?;
//!
//! let ticket = session.start_draw()?;
//! let record = ticket.finished().await?;
//! ```

use crate::config::{ConfigError, DrawConfig, PrizeTier};
use crate::controller::{DrawController, DrawError, DrawRecord, PendingDraw};
use crate::persistence::Persistence;
use crate::presenter::{DrawView, Presenter};
use letto_env::{DrawContext, EnvError, TaskHandle};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, trace};

/// Handles for one rolling draw.
pub struct RollTicket {
    /// The draw as fixed by `start()`
    pub pending: PendingDraw,

    /// Visual update task
    pub tick: TaskHandle,

    /// Resolution timer task
    pub resolve: TaskHandle,

    outcome: oneshot::Receiver<DrawRecord>,
}

impl RollTicket {
    /// Waits for the draw to resolve.
    ///
    /// Fails with [`EnvError::TaskCancelled`] if the roll was discarded
    /// by a reset before its timer fired.
    pub async fn finished(self) -> Result<DrawRecord, EnvError> {
        let name = self.resolve.name().to_string();
        self.outcome.await.map_err(|_| EnvError::cancelled(name))
    }
}

/// Timer tasks of the rolling draw, cancelled together.
struct RollTimers {
    tick: TaskHandle,
    resolve: TaskHandle,
}

/// An interactive draw session.
///
/// Generic over the context implementation, so the same session code
/// runs on the wall clock (tokio) or a virtual clock (simulation).
pub struct DrawSession<Ctx>
where
    Ctx: DrawContext,
{
    /// Environment context
    context: Arc<Ctx>,

    controller: Arc<Mutex<DrawController>>,

    timers: Mutex<Option<RollTimers>>,
}

fn lock(controller: &Mutex<DrawController>) -> MutexGuard<'_, DrawController> {
    controller.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<Ctx> DrawSession<Ctx>
where
    Ctx: DrawContext,
{
    /// Wraps an existing controller.
    pub fn new(context: Arc<Ctx>, controller: DrawController) -> Self {
        debug!(seed = context.seed(), "Draw session opened");
        Self {
            context,
            controller: Arc::new(Mutex::new(controller)),
            timers: Mutex::new(None),
        }
    }

    /// Builds the controller (restoring persisted state) and wraps it.
    pub fn open(
        context: Arc<Ctx>,
        config: Arc<DrawConfig>,
        persistence: Persistence,
        presenter: Arc<dyn Presenter>,
    ) -> Result<Self, ConfigError> {
        let controller = DrawController::new(config, persistence, presenter)?;
        Ok(Self::new(context, controller))
    }

    /// Starts a draw and schedules its visual tick and resolution.
    pub fn start_draw(&self) -> Result<RollTicket, DrawError> {
        let (pending, period) = {
            let mut controller = lock(&self.controller);
            let pending = self.context.with_rng(|rng| controller.start(rng))?;
            (pending, controller.config().visual_tick())
        };

        let tick = self.spawn_visual_tick(pending.roll_id, period);
        let (tx, outcome) = oneshot::channel();
        let resolve = self.spawn_resolve(&pending, tick.clone(), tx);

        if let Ok(mut timers) = self.timers.lock() {
            *timers = Some(RollTimers {
                tick: tick.clone(),
                resolve: resolve.clone(),
            });
        }

        Ok(RollTicket {
            pending,
            tick,
            resolve,
            outcome,
        })
    }

    fn spawn_visual_tick(&self, roll_id: u64, period: std::time::Duration) -> TaskHandle {
        let ctx = Arc::clone(&self.context);
        let controller = Arc::clone(&self.controller);

        self.context.spawn("visual-tick", async move {
            loop {
                ctx.sleep(period).await;
                let still_rolling = {
                    let controller = lock(&controller);
                    if controller.rolling_id() == Some(roll_id) {
                        if let Some(name) = ctx.with_rng(|rng| controller.visual_pick(rng)) {
                            trace!(roll = roll_id, name = %name, "Rolling display");
                            controller.show_rolling(&name);
                        }
                        true
                    } else {
                        false
                    }
                };
                if !still_rolling {
                    break;
                }
            }
        })
    }

    fn spawn_resolve(
        &self,
        pending: &PendingDraw,
        tick: TaskHandle,
        tx: oneshot::Sender<DrawRecord>,
    ) -> TaskHandle {
        let ctx = Arc::clone(&self.context);
        let controller = Arc::clone(&self.controller);
        let roll_id = pending.roll_id;
        let duration = pending.duration;

        self.context.spawn("resolve", async move {
            ctx.sleep(duration).await;
            let outcome = {
                let mut controller = lock(&controller);
                tick.cancel();
                controller.resolve_roll(roll_id)
            };
            match outcome {
                Ok(record) => {
                    let _ = tx.send(record);
                }
                Err(e) => debug!(roll = roll_id, "Roll not resolved: {}", e),
            }
        })
    }

    /// Moves to the next tier. Rejected while a draw is rolling.
    pub fn advance_tier(&self) -> Result<PrizeTier, DrawError> {
        lock(&self.controller).advance_tier().cloned()
    }

    /// Discards any rolling draw, cancels its timers, purges storage and
    /// resets the state. Callers confirm with the user first.
    pub fn reset_all(&self) {
        lock(&self.controller).reset();
        if let Ok(mut timers) = self.timers.lock() {
            if let Some(timers) = timers.take() {
                timers.tick.cancel();
                timers.resolve.cancel();
            }
        }
    }

    pub fn view(&self) -> DrawView {
        lock(&self.controller).view()
    }

    pub fn is_rolling(&self) -> bool {
        lock(&self.controller).is_rolling()
    }

    /// Runs `f` with read access to the controller.
    pub fn with_controller<T>(&self, f: impl FnOnce(&DrawController) -> T) -> T {
        f(&lock(&self.controller))
    }
}
