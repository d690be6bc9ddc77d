//! # ruflink-observability
//!
//! Observability-Crate fuer ruflink:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check-Endpunkt (`/health`)
//! - Structured Logging via tracing-subscriber
//!
//! Die Router werden in den HTTP-Server des Relays gemerged, es gibt
//! keinen separaten Observability-Port.

pub mod health;
pub mod logging;
pub mod metrics;

pub use health::{health_router, HealthResponse, HealthState, HealthStatus};
pub use logging::{
    log_format_gueltig, log_level_gueltig, logging_initialisieren, LogEinstellungen, LogFormat,
};
pub use metrics::{metrics_router, RelayMetriken};
