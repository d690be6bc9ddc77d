//! Signaling-Router – Entscheidet wer welche Nachricht bekommt
//!
//! Der Router interpretiert eingehende Client-Nachrichten sowie die
//! Verbindungs-Ereignisse (Connect, Disconnect) und beauftragt den
//! `Verteiler` mit der Zustellung.
//!
//! ## Routing-Regeln
//! - Connect: registrieren, `me` nur an den neuen Client
//! - `call-request`: `call-incoming` per Unicast an das Ziel
//! - `answer-call`: `call-accepted` per Unicast an den Anrufer
//! - `call-end`: `call-ended` an alle ausser dem Absender
//! - Disconnect: abmelden, danach genau einmal `call-ended` an alle anderen
//!
//! Ist ein Ziel nicht registriert, wird die Anfrage verworfen. Das ist ein
//! normales Rennen mit einem Disconnect, kein Fehler. Eine volle Send-Queue
//! beim Ziel ist dagegen kein Disconnect: die Nachricht geht verloren, der
//! Absender bekommt kein `target-unreachable`.

use ruflink_core::ClientId;
use ruflink_observability::RelayMetriken;
use ruflink_protocol::{
    AnswerCall, CallAccepted, CallIncoming, CallRequest, ClientNachricht, ServerNachricht,
};
use tokio::sync::mpsc;

use crate::broadcast::Verteiler;
use crate::registry::PeerRegistry;

/// Ergebnis der Verarbeitung einer Client-Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// Nachricht wurde an das Ziel weitergereicht
    Zugestellt { ziel: ClientId },
    /// Ziel ist nicht (mehr) registriert oder nicht erreichbar
    ZielUnerreichbar { ziel: ClientId },
    /// Ziel ist verbunden, seine Send-Queue aber voll
    Verworfen { ziel: ClientId },
    /// Auflegen wurde an die uebrigen Clients verteilt
    Aufgelegt { benachrichtigt: usize },
}

/// Zentraler Signaling-Router
///
/// Clone teilt Registry und Metriken.
#[derive(Clone)]
pub struct SignalingRouter {
    registry: PeerRegistry,
    verteiler: Verteiler,
    metriken: RelayMetriken,
    /// Anrufer ueber nicht erreichbare Ziele informieren
    unerreichbar_melden: bool,
}

impl SignalingRouter {
    /// Erstellt einen neuen Router
    pub fn neu(registry: PeerRegistry, metriken: RelayMetriken, unerreichbar_melden: bool) -> Self {
        Self {
            registry,
            verteiler: Verteiler::neu(metriken.clone()),
            metriken,
            unerreichbar_melden,
        }
    }

    /// Gibt die Registry zurueck
    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Neue Verbindung: registrieren und die ID an den Client melden
    ///
    /// `None`, wenn das Client-Limit erreicht ist.
    pub fn verbunden(&self, tx: mpsc::Sender<ServerNachricht>) -> Option<ClientId> {
        let registriert = self.registry.registrieren(tx, ServerNachricht::me)?;
        self.metriken.connected_clients.inc();
        if registriert.begruesst {
            self.metriken.zugestellt("me", 1);
        } else {
            self.metriken.send_failures_total.inc();
        }
        tracing::info!(client_id = %registriert.client_id, "Client verbunden");
        Some(registriert.client_id)
    }

    /// Verarbeitet eine Nachricht des Clients `von`
    pub fn verarbeiten(&self, von: ClientId, nachricht: ClientNachricht) -> Routing {
        tracing::trace!(client_id = %von, typ = nachricht.typ(), "Nachricht empfangen");

        match nachricht {
            ClientNachricht::CallRequest(req) => self.anruf_weiterleiten(von, req),
            ClientNachricht::AnswerCall(antwort) => self.annahme_weiterleiten(von, antwort),
            ClientNachricht::CallEnd => {
                let benachrichtigt = self.auflegen_verteilen(&von);
                tracing::info!(client_id = %von, benachrichtigt, "Anruf beendet");
                Routing::Aufgelegt { benachrichtigt }
            }
        }
    }

    /// Verbindung getrennt (freiwillig, abrupt oder per Timeout)
    ///
    /// Darf beliebig oft aufgerufen werden. Nur der Aufruf, der den Eintrag
    /// tatsaechlich entfernt, verteilt `call-ended`; gibt in dem Fall die
    /// Anzahl benachrichtigter Clients zurueck, sonst `None`.
    pub fn getrennt(&self, client_id: &ClientId) -> Option<usize> {
        if !self.registry.abmelden(client_id) {
            tracing::debug!(client_id = %client_id, "Doppelter Disconnect ignoriert");
            return None;
        }
        self.metriken.connected_clients.dec();

        let benachrichtigt = self.auflegen_verteilen(client_id);
        tracing::info!(client_id = %client_id, benachrichtigt, "Client getrennt");
        Some(benachrichtigt)
    }

    // -----------------------------------------------------------------------
    // Interne Hilfsmethoden
    // -----------------------------------------------------------------------

    fn anruf_weiterleiten(&self, von: ClientId, req: CallRequest) -> Routing {
        let ziel = req.target_client_id;

        if let Some(behauptet) = req.from_client_id.as_deref() {
            if behauptet != von.to_string() {
                tracing::debug!(
                    client_id = %von,
                    behauptet,
                    "Abweichende fromClientId ersetzt"
                );
            }
        }

        let nachricht = ServerNachricht::CallIncoming(CallIncoming {
            signal_payload: req.signal_payload,
            from_client_id: von,
            display_name: req.display_name,
        });
        self.unicast(von, ziel, nachricht)
    }

    fn annahme_weiterleiten(&self, von: ClientId, antwort: AnswerCall) -> Routing {
        let nachricht = ServerNachricht::CallAccepted(CallAccepted {
            signal_payload: antwort.signal_payload,
            from_client_id: von,
        });
        self.unicast(von, antwort.to_client_id, nachricht)
    }

    fn unicast(&self, von: ClientId, ziel: ClientId, nachricht: ServerNachricht) -> Routing {
        let typ = nachricht.typ();

        // Lookup und Zustellung sind getrennte Schritte; der Guard ist beim
        // Senden schon wieder frei.
        let Some(empfaenger) = self.registry.nachschlagen(&ziel) else {
            return self.ziel_fehlt(von, ziel, typ);
        };

        match self.verteiler.an_einen_senden(&empfaenger, nachricht) {
            Ok(()) => {
                tracing::debug!(client_id = %von, ziel = %ziel, typ, "Weitergeleitet");
                Routing::Zugestellt { ziel }
            }
            // Ziel hat sich zwischen Lookup und Senden getrennt
            Err(e) if e.ist_trennungsrennen() => self.ziel_fehlt(von, ziel, typ),
            // Ziel lebt, kommt nur nicht hinterher: der Absender erfaehrt nichts
            Err(_) => {
                tracing::debug!(client_id = %von, ziel = %ziel, typ, "Ziel ueberlastet – verworfen");
                Routing::Verworfen { ziel }
            }
        }
    }

    fn ziel_fehlt(&self, von: ClientId, ziel: ClientId, typ: &str) -> Routing {
        self.metriken.routing_misses_total.inc();
        tracing::debug!(client_id = %von, ziel = %ziel, typ, "Ziel nicht erreichbar – verworfen");

        if self.unerreichbar_melden {
            if let Some(absender) = self.registry.nachschlagen(&von) {
                // Fehler ist im Verteiler bereits geloggt
                let _ = self
                    .verteiler
                    .an_einen_senden(&absender, ServerNachricht::unerreichbar(ziel));
            }
        }
        Routing::ZielUnerreichbar { ziel }
    }

    fn auflegen_verteilen(&self, von: &ClientId) -> usize {
        let empfaenger = self.registry.alle_ausser(von);
        self.verteiler
            .an_alle_senden(&empfaenger, ServerNachricht::CallEnded)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
