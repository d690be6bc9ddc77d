//! Client-Connection – Verwaltet eine einzelne WebSocket-Verbindung
//!
//! Jede Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task, der eingehende Frames liest und an den Router gibt. Ein
//! zweiter Task pro Verbindung leert die Send-Queue in den Socket, damit
//! Unicasts und Broadcasts an denselben Client serialisiert bleiben.
//!
//! ## State Machine
//! ```text
//! Verbunden -> (Anrufend | Idle) -> Getrennt
//!                  ^        |
//!                  +--------+
//! ```
//!
//! ## Keepalive
//! - Server sendet alle `keepalive_sek` einen WebSocket-Ping
//! - Kommt `verbindungs_timeout_sek` lang kein Frame an, wird getrennt
//! - Jede Art der Trennung laeuft ueber denselben Disconnect-Pfad

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use ruflink_core::ClientId;
use ruflink_protocol::{NachrichtenCodec, ServerNachricht, WireError};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::SignalingResult;
use crate::router::Routing;
use crate::server_state::SignalingState;

/// Wie lange nach dem Trennen noch auf den Schreib-Task gewartet wird
const SCHREIBER_ABSCHLUSS: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Verbindungszustand
// ---------------------------------------------------------------------------

/// Zustand einer Signaling-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsZustand {
    /// Registriert, noch keine Anruf-Nachricht verarbeitet
    Verbunden,
    /// Kein laufender Anrufaufbau
    Idle,
    /// Anruf-Anfrage oder -Annahme wurde zugestellt
    Anrufend,
    /// Endzustand
    Getrennt,
}

impl VerbindungsZustand {
    /// Folgezustand nach einer verarbeiteten Nachricht
    pub fn uebergang(self, routing: Routing) -> Self {
        if self == Self::Getrennt {
            return self;
        }
        match routing {
            Routing::Zugestellt { .. } => Self::Anrufend,
            Routing::ZielUnerreichbar { .. }
            | Routing::Verworfen { .. }
            | Routing::Aufgelegt { .. } => Self::Idle,
        }
    }
}

/// Grund fuer das Ende einer Verbindung (fuer Logging)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrennGrund {
    Client,
    Lesefehler,
    Schreibfehler,
    Timeout,
    Shutdown,
}

// ---------------------------------------------------------------------------
// ClientConnection
// ---------------------------------------------------------------------------

/// Verarbeitet eine einzelne WebSocket-Verbindung
pub struct ClientConnection {
    state: Arc<SignalingState>,
    peer_addr: SocketAddr,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<SignalingState>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis der Client trennt, der Socket fehlschlaegt, der Keepalive
    /// ablaeuft oder das Shutdown-Signal kommt. In jedem Fall wird der Client
    /// danach genau einmal abgemeldet.
    pub async fn verarbeiten(self, mut socket: WebSocket, mut shutdown_rx: watch::Receiver<bool>) {
        let peer_addr = self.peer_addr;
        let config = Arc::clone(&self.state.config);
        let timeout_dauer = Duration::from_secs(config.verbindungs_timeout_sek);
        let keepalive_intervall = Duration::from_secs(config.keepalive_sek);

        // Ausgehende Nachrichten-Queue (Verteiler -> Socket)
        let (sende_tx, sende_rx) = mpsc::channel::<ServerNachricht>(config.sende_queue_groesse);
        let Some(client_id) = self.state.router.verbunden(sende_tx) else {
            // Limit erst nach dem Upgrade erreicht (paralleler Connect)
            tracing::warn!(
                peer = %peer_addr,
                max = config.max_clients,
                "Client-Limit erreicht – Verbindung wird geschlossen"
            );
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::AGAIN,
                    reason: "server full".into(),
                })))
                .await;
            return;
        };
        tracing::info!(peer = %peer_addr, client_id = %client_id, "Neue Verbindung");

        let (ws_tx, mut ws_rx) = socket.split();

        let (beenden_tx, beenden_rx) = oneshot::channel();
        let mut schreiber = tokio::spawn(schreiben(
            ws_tx,
            sende_rx,
            self.state.codec.clone(),
            keepalive_intervall,
            beenden_rx,
        ));
        let mut schreiber_laeuft = true;

        let mut zustand = VerbindungsZustand::Verbunden;
        let mut letzter_empfang = Instant::now();

        let schon_gestoppt = *shutdown_rx.borrow();
        let grund = if schon_gestoppt {
            TrennGrund::Shutdown
        } else {
            loop {
                let frist = letzter_empfang + timeout_dauer;

                tokio::select! {
                    // Eingehender Frame vom Client
                    frame = ws_rx.next() => {
                        match frame {
                            Some(Ok(Message::Text(text))) => {
                                letzter_empfang = Instant::now();
                                zustand = self.text_verarbeiten(client_id, &text, zustand);
                            }
                            Some(Ok(Message::Binary(daten))) => {
                                letzter_empfang = Instant::now();
                                tracing::debug!(
                                    client_id = %client_id,
                                    bytes = daten.len(),
                                    "Binaerframe ignoriert"
                                );
                            }
                            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                                letzter_empfang = Instant::now();
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                tracing::debug!(client_id = %client_id, "Verbindung vom Client getrennt");
                                break TrennGrund::Client;
                            }
                            Some(Err(e)) => {
                                tracing::warn!(
                                    client_id = %client_id,
                                    fehler = %e,
                                    "Frame-Lesefehler"
                                );
                                break TrennGrund::Lesefehler;
                            }
                        }
                    }

                    // Keepalive abgelaufen
                    _ = tokio::time::sleep_until(frist) => {
                        tracing::warn!(client_id = %client_id, "Verbindungs-Timeout");
                        break TrennGrund::Timeout;
                    }

                    // Schreib-Task beendet (Socket kaputt)
                    ergebnis = &mut schreiber, if schreiber_laeuft => {
                        schreiber_laeuft = false;
                        match ergebnis {
                            Ok(Err(e)) => tracing::warn!(
                                client_id = %client_id,
                                fehler = %e,
                                "Senden fehlgeschlagen"
                            ),
                            Err(e) => tracing::error!(
                                client_id = %client_id,
                                fehler = %e,
                                "Schreib-Task abgebrochen"
                            ),
                            Ok(Ok(())) => {}
                        }
                        break TrennGrund::Schreibfehler;
                    }

                    // Shutdown-Signal
                    Ok(()) = shutdown_rx.changed() => {
                        let stop = *shutdown_rx.borrow_and_update();
                        if stop {
                            tracing::debug!(client_id = %client_id, "Shutdown-Signal – Verbindung wird getrennt");
                            break TrennGrund::Shutdown;
                        }
                    }
                }
            }
        };

        // Cleanup beim Verbindungsende
        self.state.router.getrennt(&client_id);
        tracing::debug!(
            client_id = %client_id,
            von = ?zustand,
            nach = ?VerbindungsZustand::Getrennt,
            "Zustandswechsel"
        );

        if schreiber_laeuft {
            let _ = beenden_tx.send(());
            if tokio::time::timeout(SCHREIBER_ABSCHLUSS, &mut schreiber)
                .await
                .is_err()
            {
                schreiber.abort();
            }
        }

        tracing::info!(
            peer = %peer_addr,
            client_id = %client_id,
            grund = ?grund,
            "Verbindungs-Task beendet"
        );
    }

    /// Dekodiert einen Textframe und gibt ihn an den Router
    ///
    /// Unbekannte oder ungueltige Nachrichten werden ignoriert.
    fn text_verarbeiten(
        &self,
        client_id: ClientId,
        text: &str,
        zustand: VerbindungsZustand,
    ) -> VerbindungsZustand {
        match self.state.codec.dekodieren(text) {
            Ok(nachricht) => {
                let routing = self.state.router.verarbeiten(client_id, nachricht);
                let neu = zustand.uebergang(routing);
                if neu != zustand {
                    tracing::debug!(client_id = %client_id, von = ?zustand, nach = ?neu, "Zustandswechsel");
                }
                neu
            }
            Err(WireError::UnbekannterTyp(typ)) => {
                tracing::debug!(client_id = %client_id, typ = %typ, "Unbekannter Nachrichtentyp ignoriert");
                zustand
            }
            Err(e) => {
                tracing::debug!(client_id = %client_id, fehler = %e, "Ungueltige Nachricht ignoriert");
                zustand
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Schreib-Task
// ---------------------------------------------------------------------------

/// Leert die Send-Queue in den Socket und sendet Keepalive-Pings
///
/// Endet mit einem Close-Frame, wenn `beenden_rx` ausloest oder alle
/// Sender der Queue verschwunden sind.
async fn schreiben(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut sende_rx: mpsc::Receiver<ServerNachricht>,
    codec: NachrichtenCodec,
    keepalive_intervall: Duration,
    mut beenden_rx: oneshot::Receiver<()>,
) -> SignalingResult<()> {
    let mut ping = tokio::time::interval_at(Instant::now() + keepalive_intervall, keepalive_intervall);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = &mut beenden_rx => break,

            nachricht = sende_rx.recv() => {
                let Some(nachricht) = nachricht else { break };
                let text = codec.kodieren(&nachricht)?;
                ws_tx.send(Message::Text(text)).await?;
            }

            _ = ping.tick() => {
                ws_tx.send(Message::Ping(Vec::new())).await?;
            }
        }
    }

    let _ = ws_tx.send(Message::Close(None)).await;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zustellung_fuehrt_zu_anrufend() {
        let ziel = ClientId::new();
        assert_eq!(
            VerbindungsZustand::Verbunden.uebergang(Routing::Zugestellt { ziel }),
            VerbindungsZustand::Anrufend
        );
    }

    #[test]
    fn auflegen_und_fehlschlag_fuehren_zu_idle() {
        let ziel = ClientId::new();
        assert_eq!(
            VerbindungsZustand::Anrufend.uebergang(Routing::Aufgelegt { benachrichtigt: 1 }),
            VerbindungsZustand::Idle
        );
        assert_eq!(
            VerbindungsZustand::Verbunden.uebergang(Routing::ZielUnerreichbar { ziel }),
            VerbindungsZustand::Idle
        );
    }

    #[test]
    fn getrennt_ist_endzustand() {
        let ziel = ClientId::new();
        assert_eq!(
            VerbindungsZustand::Getrennt.uebergang(Routing::Zugestellt { ziel }),
            VerbindungsZustand::Getrennt
        );
    }
}
