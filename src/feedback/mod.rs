//! Improvement feedback for the next generation attempt.
//!
//! Feedback is built from the latest validation result plus the run's
//! history, so the loop can push back harder when scores stall or drop.

pub mod builder;
pub mod signals;

pub use builder::{FeedbackBuilder, FeedbackConfig, ViolationType};
pub use signals::{ProgressSignal, detect_signals};
