//! Letto Deterministic Ceremony Simulation
//!
//! This crate provides a controlled environment where a whole prize
//! ceremony runs deterministically, plus the console front end used on
//! the night.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: a virtual clock that jumps from timer to timer
//! - **Randomness**: all winner and display picks come from one 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                    CeremonyRunner                     │
//! │  ┌─────────────────────────────────────────────────┐  │
//! │  │ SimContext (virtual clock + ChaCha8Rng(seed))    │  │
//! │  └─────────────────────────────────────────────────┘  │
//! │       │                                               │
//! │  ┌────▼─────────────┐      ┌──────────────────────┐   │
//! │  │   DrawSession    │─────►│ Persistence (store)  │   │
//! │  └──────────────────┘      └──────────────────────┘   │
//! │       │                                               │
//! │  ┌────▼────────────────────────┐                      │
//! │  │ CeremonyReport (JSON export)│                      │
//! │  └─────────────────────────────┘                      │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use letto_sim::{CeremonyRunner, CeremonyPlan};
//!
//! let report = CeremonyRunner::new(Arc::new(DrawConfig::default()), 42)
//!     .with_plan(CeremonyPlan::default())
//!     .run()?;
//! assert!(report.passed);
//! ```

mod context;
mod error;
mod exporter;
mod runner;
pub mod console;
pub mod plan;

pub use context::SimContext;
pub use error::SimError;
pub use exporter::{CeremonyReport, DrawEvent, TierSummary};
pub use plan::{CeremonyPlan, PlanError, TierQuota};
pub use runner::CeremonyRunner;
