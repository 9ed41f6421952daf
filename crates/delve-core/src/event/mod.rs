//! In-process fan-out of research progress.

pub mod bus;

pub use bus::{EventBus, next_for_job};
