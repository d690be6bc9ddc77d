//! ruflink-server – Bibliotheks-Root
//!
//! Verdrahtet Konfiguration, Metriken und Signaling-Service und stellt den
//! oeffentlichen Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use ruflink_observability::RelayMetriken;
use ruflink_signaling::{SignalingServer, SignalingState};
use tokio::sync::watch;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet den Signaling-Server und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Metriken-Registry anlegen
    /// 2. Signaling-Zustand (Registry, Router) aufbauen
    /// 3. HTTP/WebSocket-Listener starten
    /// 4. Auf Ctrl-C warten, dann Verbindungen schliessen
    pub async fn starten(self) -> Result<()> {
        let bind_adresse = self.config.bind_adresse()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Shutdown-Signal empfangen, Server wird beendet"),
                Err(e) => tracing::error!(fehler = %e, "Signal-Handler fehlgeschlagen, Server wird beendet"),
            }
            let _ = shutdown_tx.send(true);
        });

        self.mit_shutdown_starten(bind_adresse, shutdown_rx).await
    }

    /// Wie `starten`, aber mit eigenem Shutdown-Kanal
    pub async fn mit_shutdown_starten(
        self,
        bind_adresse: std::net::SocketAddr,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<()> {
        let metriken = RelayMetriken::neu().context("Metriken konnten nicht registriert werden")?;
        let state = SignalingState::neu(self.config.signaling_config(), metriken);

        tracing::info!(
            adresse = %bind_adresse,
            max_clients = state.config.max_clients,
            metriken = state.config.metriken_aktiviert,
            "Server startet"
        );

        SignalingServer::neu(state, bind_adresse)
            .starten(shutdown_rx)
            .await
            .context("Signaling-Server beendet mit Fehler")?;

        tracing::info!("Server gestoppt");
        Ok(())
    }
}
