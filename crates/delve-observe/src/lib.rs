//! Observability setup for Delve: structured logging and optional
//! OpenTelemetry trace export.

pub mod tracing_setup;
