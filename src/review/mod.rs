//! The note review pipeline: deterministic fixers, oscillation handling,
//! the strict QA gate, and the orchestrator that drives them.

pub mod fixer;
pub mod history;
pub mod orchestrator;
pub mod oscillation;
pub mod qa;
pub mod state;

pub use fixer::DeterministicFixer;
pub use history::{detect_oscillation, filter_blocking_history, OSCILLATION_MIN_HISTORY};
pub use orchestrator::{ReviewOptions, ReviewOrchestrator};
pub use oscillation::OscillationFixer;
pub use qa::{QaBlockingReason, QaResult, StrictQaVerifier};
pub use state::{FixResult, HistoryEntry, ReviewState};
