//! Prometheus-kompatible Metriken fuer ruflink
//!
//! Registrierte Metriken:
//! - `ruflink_connected_clients` – Gauge: Aktuell registrierte Clients
//! - `ruflink_messages_relayed_total` – Counter: Zugestellte Nachrichten (type)
//! - `ruflink_routing_misses_total` – Counter: Anfragen an nicht verbundene Ziele
//! - `ruflink_send_failures_total` – Counter: Fehlgeschlagene Zustellungen

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle ruflink-Prometheus-Metriken
///
/// Clone teilt die Registry und alle Metrik-Handles.
#[derive(Clone)]
pub struct RelayMetriken {
    pub registry: Arc<Registry>,

    pub connected_clients: IntGauge,
    pub messages_relayed_total: IntCounterVec,
    pub routing_misses_total: IntCounter,
    pub send_failures_total: IntCounter,
}

impl RelayMetriken {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_clients = IntGauge::with_opts(Opts::new(
            "ruflink_connected_clients",
            "Anzahl aktuell registrierter Clients",
        ))?;
        registry.register(Box::new(connected_clients.clone()))?;

        let messages_relayed_total = IntCounterVec::new(
            Opts::new(
                "ruflink_messages_relayed_total",
                "Gesamtanzahl zugestellter Signaling-Nachrichten",
            ),
            &["type"],
        )?;
        registry.register(Box::new(messages_relayed_total.clone()))?;

        let routing_misses_total = IntCounter::with_opts(Opts::new(
            "ruflink_routing_misses_total",
            "Anfragen an Ziele, die nicht (mehr) verbunden sind",
        ))?;
        registry.register(Box::new(routing_misses_total.clone()))?;

        let send_failures_total = IntCounter::with_opts(Opts::new(
            "ruflink_send_failures_total",
            "Zustellungen, die an einer vollen oder geschlossenen Queue scheiterten",
        ))?;
        registry.register(Box::new(send_failures_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_clients,
            messages_relayed_total,
            routing_misses_total,
            send_failures_total,
        })
    }

    /// Zaehlt eine zugestellte Nachricht eines Typs
    pub fn zugestellt(&self, typ: &str, anzahl: usize) {
        self.messages_relayed_total
            .with_label_values(&[typ])
            .inc_by(anzahl as u64);
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: RelayMetriken) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<RelayMetriken>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
