//! Observability setup for Persona Chat: structured logging plus optional
//! OpenTelemetry span export.

pub mod tracing_setup;
