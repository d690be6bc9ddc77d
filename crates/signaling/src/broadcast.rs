//! Verteiler – Unicast und Broadcast an registrierte Clients
//!
//! Der Verteiler fuehrt die eigentliche Zustellung durch. Welche Clients
//! eine Nachricht bekommen, entscheidet der Router; der Verteiler bekommt
//! die aufgeloesten Send-Queues als Argument.
//!
//! ## Fehlerisolation
//! - Eine volle oder geschlossene Queue wird geloggt und verworfen
//! - Beim Broadcast bricht ein fehlerhafter Empfaenger die Zustellung an
//!   die anderen nie ab

use ruflink_observability::RelayMetriken;
use ruflink_protocol::ServerNachricht;

use crate::error::{SignalingError, SignalingResult};
use crate::registry::ClientSender;

/// Stellt Nachrichten an einen oder mehrere Clients zu
#[derive(Clone)]
pub struct Verteiler {
    metriken: RelayMetriken,
}

impl Verteiler {
    pub fn neu(metriken: RelayMetriken) -> Self {
        Self { metriken }
    }

    /// Sendet eine Nachricht an genau einen Client
    ///
    /// Fehler sind bereits geloggt und gezaehlt, wenn sie zurueckkommen.
    /// Der Aufrufer entscheidet nur noch, ob der Absender davon erfaehrt.
    pub fn an_einen_senden(
        &self,
        empfaenger: &ClientSender,
        nachricht: ServerNachricht,
    ) -> SignalingResult<()> {
        let typ = nachricht.typ();
        empfaenger.senden(nachricht).map_err(|e| {
            self.fehler_protokollieren(empfaenger, typ, &e);
            e
        })?;
        self.metriken.zugestellt(typ, 1);
        Ok(())
    }

    /// Sendet eine Nachricht an alle uebergebenen Clients
    ///
    /// Gibt die Anzahl der erfolgreichen Zustellungen zurueck.
    pub fn an_alle_senden(&self, empfaenger: &[ClientSender], nachricht: ServerNachricht) -> usize {
        let typ = nachricht.typ();
        let mut gesendet = 0;
        for peer in empfaenger {
            match peer.senden(nachricht.clone()) {
                Ok(()) => gesendet += 1,
                Err(e) => self.fehler_protokollieren(peer, typ, &e),
            }
        }
        self.metriken.zugestellt(typ, gesendet);
        gesendet
    }

    fn fehler_protokollieren(&self, peer: &ClientSender, typ: &str, fehler: &SignalingError) {
        self.metriken.send_failures_total.inc();
        if fehler.ist_trennungsrennen() {
            tracing::debug!(
                client_id = %peer.client_id,
                typ,
                "Empfaenger bereits getrennt – Nachricht verworfen"
            );
        } else {
            tracing::warn!(
                client_id = %peer.client_id,
                typ,
                fehler = %fehler,
                "Zustellung fehlgeschlagen – Nachricht verworfen"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
