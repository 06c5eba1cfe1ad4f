//! Letto Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing a draw session
//! to run against **Production** (tokio, wall clock) and **Simulation**
//! (virtual clock, seeded RNG) environments.
//!
//! # Core Concept
//!
//! A rolling draw depends on two things outside the draw logic:
//! - Time (`now()`, `sleep()`, spawned timer tasks with cancel handles)
//! - Randomness (`with_rng()`)
//!
//! By deriving all entropy from a single 64-bit seed in simulation, any
//! ceremony becomes reproducible via its seed number.
//!
//! # Example
//!
//! ```ignore
//! use letto_env::{DrawContext, TokioContext};
//!
//! let ctx = TokioContext::shared();
//! let tick = ctx.spawn("visual-tick", async move { /* ... */ });
//! ctx.sleep(Duration::from_secs(2)).await;
//! tick.cancel();
//! ```

mod context;
mod error;
mod task;
mod tokio_impl;

pub use context::DrawContext;
pub use error::EnvError;
pub use task::TaskHandle;
pub use tokio_impl::TokioContext;
