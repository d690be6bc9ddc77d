//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt Registry, Router, Codec und Observability-Handles als geteilte
//! Referenzen, die sicher zwischen tokio-Tasks geteilt werden koennen.

use ruflink_observability::{HealthState, RelayMetriken};
use ruflink_protocol::NachrichtenCodec;
use std::sync::Arc;

use crate::registry::PeerRegistry;
use crate::router::SignalingRouter;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Maximale gleichzeitig registrierte Clients
    pub max_clients: usize,
    /// Groesse der Send-Queue pro Client
    pub sende_queue_groesse: usize,
    /// Maximale Groesse einer eingehenden Nachricht in Bytes
    pub max_nachricht_groesse: usize,
    /// Keepalive-Intervall (WebSocket-Ping) in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
    /// Anrufer mit `target-unreachable` informieren
    pub unerreichbar_melden: bool,
    /// Erlaubte CORS-Origins. Leer = alle Origins erlaubt.
    pub cors_origins: Vec<String>,
    /// `/metrics` ausliefern
    pub metriken_aktiviert: bool,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            max_clients: 1024,
            sende_queue_groesse: 64,
            max_nachricht_groesse: ruflink_protocol::wire::DEFAULT_MAX_NACHRICHT_GROESSE,
            keepalive_sek: 25,
            verbindungs_timeout_sek: 60,
            unerreichbar_melden: true,
            cors_origins: vec![],
            metriken_aktiviert: true,
        }
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    /// Server-Konfiguration
    pub config: Arc<SignalingConfig>,
    /// Peer-Registry (wer ist erreichbar)
    pub registry: PeerRegistry,
    /// Signaling-Router (wer bekommt was)
    pub router: SignalingRouter,
    /// JSON-Codec fuer WebSocket-Textframes
    pub codec: NachrichtenCodec,
    /// Prometheus-Metriken
    pub metriken: RelayMetriken,
    /// Health-Zustand (Uptime, Annahme aktiv)
    pub health: HealthState,
}

impl SignalingState {
    /// Erstellt einen neuen SignalingState
    pub fn neu(config: SignalingConfig, metriken: RelayMetriken) -> Arc<Self> {
        let registry = PeerRegistry::mit_limit(config.max_clients);
        let router = SignalingRouter::neu(
            registry.clone(),
            metriken.clone(),
            config.unerreichbar_melden,
        );
        let codec = NachrichtenCodec::with_max_size(config.max_nachricht_groesse);
        let health = HealthState::neu(metriken.clone());

        Arc::new(Self {
            config: Arc::new(config),
            registry,
            router,
            codec,
            metriken,
            health,
        })
    }

    /// Prueft ob ein weiterer Client angenommen werden darf
    ///
    /// Nur die schnelle Vorab-Pruefung vor dem Upgrade (503 statt Upgrade).
    /// Verbindlich ist das Limit in `PeerRegistry::registrieren`.
    pub fn nimmt_clients_an(&self) -> bool {
        self.health.nimmt_an() && self.registry.anzahl() < self.config.max_clients
    }
}
