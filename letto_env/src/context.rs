//! Core environment context trait for Letto draw sessions.

use async_trait::async_trait;
use rand::RngCore;
use std::future::Future;
use std::time::Duration;

use crate::task::TaskHandle;

/// The central interface for Environment Interaction.
///
/// This trait abstracts the "real world" so that a draw session can run
/// against the wall clock (production) or a virtual clock (simulation).
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, `thread_rng`
/// - **Simulation**: `SimContext` - virtual clock, `ChaCha8Rng(seed)`
///
/// # Determinism
///
/// Every source of non-determinism a draw depends on (time, randomness)
/// is routed through the implementation, so a seeded context replays the
/// same winners.
#[async_trait]
pub trait DrawContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: parks until the driver moves the virtual clock
    /// past the deadline
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task and returns a handle that can cancel it.
    ///
    /// Rolling draws use this for the visual tick and the resolve timer.
    fn spawn<F>(&self, name: &str, future: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static;

    /// Runs `f` with the context's random number generator.
    ///
    /// Selection code takes `&mut dyn RngCore` so the same engine can be
    /// driven by OS entropy or by a seeded generator.
    fn with_rng<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&mut dyn RngCore) -> T;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    /// In simulation, returns the master seed.
    fn seed(&self) -> u64;
}
