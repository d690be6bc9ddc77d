//! HTTP/WebSocket-Server – Bindet Socket, nimmt Verbindungen an
//!
//! Der `SignalingServer` stellt einen axum-Router bereit:
//! - `GET /`        – Lebenszeichen ("server is running")
//! - `GET /ws`      – WebSocket-Upgrade in den Signaling-Relay
//! - `GET /health`  – Health-Check JSON
//! - `GET /metrics` – Prometheus scrape format
//!
//! Fuer jede angenommene WebSocket-Verbindung laeuft eine eigene
//! `ClientConnection` in einem tokio-Task.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use ruflink_observability::{health_router, metrics_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::connection::ClientConnection;
use crate::error::SignalingResult;
use crate::server_state::SignalingState;

/// Antwort auf `GET /`
pub const LEBENSZEICHEN: &str = "server is running";

/// Axum-State der WebSocket-Route
#[derive(Clone)]
struct AppState {
    state: Arc<SignalingState>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Signaling-Server (HTTP + WebSocket)
pub struct SignalingServer {
    state: Arc<SignalingState>,
    bind_addr: SocketAddr,
}

impl SignalingServer {
    /// Erstellt einen neuen SignalingServer
    pub fn neu(state: Arc<SignalingState>, bind_addr: SocketAddr) -> Self {
        Self { state, bind_addr }
    }

    /// Baut den axum-Router mit allen Routen und Layern
    pub fn router(&self, shutdown_rx: watch::Receiver<bool>) -> Router {
        let app_state = AppState {
            state: Arc::clone(&self.state),
            shutdown_rx,
        };

        let mut app = Router::new()
            .route("/", get(lebenszeichen))
            .route("/ws", get(ws_handler))
            .with_state(app_state)
            .merge(health_router(self.state.health.clone()));

        if self.state.config.metriken_aktiviert {
            app = app.merge(metrics_router(self.state.metriken.clone()));
        }

        app.layer(cors_layer(&self.state.config.cors_origins))
            .layer(TraceLayer::new_for_http())
    }

    /// Bindet `bind_addr` und laeuft bis `shutdown_rx` `true` meldet
    pub async fn starten(self, shutdown_rx: watch::Receiver<bool>) -> SignalingResult<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.mit_listener_starten(listener, shutdown_rx).await
    }

    /// Wie `starten`, aber auf einem bereits gebundenen Listener
    pub async fn mit_listener_starten(
        self,
        listener: TcpListener,
        shutdown_rx: watch::Receiver<bool>,
    ) -> SignalingResult<()> {
        let lokale_addr = listener.local_addr()?;
        let app = self.router(shutdown_rx.clone());
        let health = self.state.health.clone();

        tracing::info!(adresse = %lokale_addr, "Signaling-Server gestartet");

        let mut stop_rx = shutdown_rx;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let signal_erhalten = stop_rx.wait_for(|stop| *stop).await.is_ok();
            if !signal_erhalten {
                // Sender weg ohne Stop-Signal: weiterlaufen
                std::future::pending::<()>().await;
            }
            health.annahme_beenden();
            tracing::info!("Signaling-Server: Shutdown-Signal empfangen");
        })
        .await?;

        tracing::info!("Signaling-Server gestoppt");
        Ok(())
    }

    /// Gibt die Bind-Adresse zurueck
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}

/// CORS: entweder spezifische Origins oder Any (Browser-Clients von ueberall)
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods([Method::GET, Method::POST]);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    layer.allow_origin(origins)
}

/// `GET /`
async fn lebenszeichen() -> &'static str {
    LEBENSZEICHEN
}

/// `GET /ws` – WebSocket-Upgrade
async fn ws_handler(
    State(app): State<AppState>,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    if !app.state.nimmt_clients_an() {
        tracing::warn!(
            peer = %peer_addr,
            max = app.state.config.max_clients,
            "Server voll oder faehrt herunter – Verbindung abgelehnt"
        );
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    tracing::debug!(peer = %peer_addr, "WebSocket-Upgrade akzeptiert");

    let verbindung = ClientConnection::neu(Arc::clone(&app.state), peer_addr);
    let shutdown_rx = app.shutdown_rx.clone();
    ws.max_message_size(app.state.config.max_nachricht_groesse)
        .on_upgrade(move |socket| verbindung.verarbeiten(socket, shutdown_rx))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
