//! Load orchestration module
//!
//! Contains the phase planner, the scheduler loop, the clock and
//! cancellation primitives it runs on, and the OS signal relay.

pub mod cancel;
pub mod clock;
pub mod phase;
pub mod runner;
pub mod signals;

// Re-export commonly used types
pub use cancel::{forward_interrupts, CancellationSignal};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use phase::{Phase, PhaseKind, PhasePlan, Stage};
pub use runner::{LoadTest, RunState};
pub use signals::{relay_interrupts, InterruptSource, OsSignals};
