//! Observability setup for ReadZone binaries: structured logging and
//! optional OpenTelemetry span export.

pub mod tracing_setup;
