//! Letto Core - Prize-Drawing State Machine
//!
//! Draws winners for an ordered list of prize tiers while keeping three
//! guarantees:
//! 1. **No duplicate winners**: a name wins at most once until a full reset
//! 2. **Deterministic rigged slots**: `(tier, ordinal)` assignments always fire
//! 3. **Consistent counters**: per-tier counts match the history, across restarts
//!
//! Rendering is someone else's job: the core reports through the
//! [`Presenter`] trait and takes commands through [`DrawController`] or
//! the timer-driven [`DrawSession`].

pub mod config;
pub mod controller;
pub mod draw_state;
pub mod persistence;
pub mod presenter;
pub mod selection;
pub mod session;

// Re-export key types for convenience
pub use config::{ConfigError, DrawConfig, PrizeTier, RiggedSlot, Roster};
pub use controller::{DrawController, DrawError, DrawPhase, DrawRecord, PendingDraw};
pub use draw_state::{ConsistencyError, DrawState, HistoryEntry};
pub use persistence::{DrawStore, MemoryDrawStore, PersistError, Persistence, SledDrawStore};
pub use presenter::{DrawView, NullPresenter, Presenter, PresenterEvent, RecordingPresenter};
pub use session::{DrawSession, RollTicket};
