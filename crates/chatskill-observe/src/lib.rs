//! Observability setup for chatskill: structured logging and optional
//! OpenTelemetry trace export.

pub mod tracing_setup;
