//! Company research workflow.
//!
//! One [`ResearchOrchestrator`](orchestrator::ResearchOrchestrator) drives
//! every job: plan queries, run the search phase through a
//! [`SearchStrategy`](strategy::SearchStrategy), synthesize a report with a
//! single completion call, parse it, and record each step through a
//! [`ProgressSink`](progress::ProgressSink). The
//! [`ResearchWorkerPool`](worker::ResearchWorkerPool) runs jobs off a queue.

pub mod orchestrator;
pub mod parse;
pub mod progress;
pub mod prompt;
pub mod queries;
pub mod strategy;
pub mod tool_loop;
pub mod worker;

pub use orchestrator::{ResearchOrchestrator, ResearchSettings};
pub use progress::{ProgressSink, RepositorySink};
pub use strategy::{DirectSearch, SearchStrategy, ToolCallingSearch};
pub use worker::ResearchWorkerPool;
