//! Peer-Registry – Wer kann gerade Nachrichten empfangen?
//!
//! Die Registry bildet jede vergebene `ClientId` auf die Send-Queue der
//! zugehoerigen Verbindung ab. Sie ist die einzige Quelle der Wahrheit fuer
//! die Erreichbarkeit: eine ID ist genau dann eingetragen, wenn ihre
//! Verbindung offen ist.
//!
//! ## Nebenlaeufigkeit
//! Alle Operationen laufen unter einem einzigen `parking_lot::Mutex`.
//! Registrieren, Abmelden und Snapshot-Erstellung schliessen sich damit
//! gegenseitig aus. Der Guard wird nie ueber ein `.await` oder einen
//! Sendevorgang gehalten; Broadcasts arbeiten auf einem Snapshot.

use parking_lot::Mutex;
use ruflink_core::ClientId;
use ruflink_protocol::ServerNachricht;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{SignalingError, SignalingResult};

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue eines verbundenen Clients
///
/// Die Registry haelt nur dieses Handle, nie den Socket selbst. Der
/// Schreib-Task der Verbindung leert die Queue in Reihenfolge.
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub client_id: ClientId,
    tx: mpsc::Sender<ServerNachricht>,
}

impl ClientSender {
    pub fn neu(client_id: ClientId, tx: mpsc::Sender<ServerNachricht>) -> Self {
        Self { client_id, tx }
    }

    /// Reiht eine Nachricht nicht-blockierend in die Send-Queue ein
    pub fn senden(&self, nachricht: ServerNachricht) -> SignalingResult<()> {
        match self.tx.try_send(nachricht) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(SignalingError::QueueVoll),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SignalingError::SendFehler),
        }
    }

    /// Prueft ob die Gegenseite die Queue bereits geschlossen hat
    pub fn ist_geschlossen(&self) -> bool {
        self.tx.is_closed()
    }
}

// ---------------------------------------------------------------------------
// PeerRegistry
// ---------------------------------------------------------------------------

/// Ergebnis einer erfolgreichen Registrierung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registriert {
    pub client_id: ClientId,
    /// Begruessung liegt in der Send-Queue
    pub begruesst: bool,
}

/// Zentrale Registry aller verbundenen Clients
///
/// Thread-safe via Arc + Mutex. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct PeerRegistry {
    inner: Arc<Mutex<HashMap<ClientId, ClientSender>>>,
    /// Obergrenze gleichzeitig registrierter Clients
    max_clients: usize,
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::mit_limit(usize::MAX)
    }
}

impl PeerRegistry {
    /// Erstellt eine leere Registry ohne Obergrenze
    pub fn neu() -> Self {
        Self::default()
    }

    /// Erstellt eine leere Registry, die hoechstens `max_clients` Eintraege annimmt
    pub fn mit_limit(max_clients: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            max_clients,
        }
    }

    /// Registriert eine neue Verbindung und vergibt ihre `ClientId`
    ///
    /// `begruessung` erzeugt die erste Nachricht fuer den neuen Client. Sie
    /// wird noch unter dem Guard eingereiht, bevor der Eintrag sichtbar
    /// wird, und liegt damit garantiert vor jedem Broadcast in der Queue.
    ///
    /// Limit-Pruefung und Einfuegen passieren unter demselben Guard. Ist die
    /// Registry voll, wird nichts eingetragen und `None` zurueckgegeben.
    pub fn registrieren<F>(
        &self,
        tx: mpsc::Sender<ServerNachricht>,
        begruessung: F,
    ) -> Option<Registriert>
    where
        F: FnOnce(ClientId) -> ServerNachricht,
    {
        let mut clients = self.inner.lock();
        if clients.len() >= self.max_clients {
            tracing::debug!(max = self.max_clients, "Registry voll – Registrierung abgelehnt");
            return None;
        }

        let mut client_id = ClientId::new();
        while clients.contains_key(&client_id) {
            client_id = ClientId::new();
        }

        let sender = ClientSender::neu(client_id, tx);
        let begruesst = match sender.senden(begruessung(client_id)) {
            Ok(()) => true,
            Err(e) => {
                // Verbindung schon wieder weg; der Disconnect-Pfad raeumt auf
                tracing::debug!(client_id = %client_id, fehler = %e, "Begruessung nicht zustellbar");
                false
            }
        };
        clients.insert(client_id, sender);

        tracing::debug!(client_id = %client_id, anzahl = clients.len(), "Client registriert");
        Some(Registriert {
            client_id,
            begruesst,
        })
    }

    /// Loest eine `ClientId` in ihre Send-Queue auf
    pub fn nachschlagen(&self, client_id: &ClientId) -> Option<ClientSender> {
        self.inner.lock().get(client_id).cloned()
    }

    /// Entfernt einen Client aus der Registry
    ///
    /// Idempotent: ein zweiter Aufruf fuer dieselbe ID ist ein No-op.
    /// Gibt `true` zurueck, wenn tatsaechlich ein Eintrag entfernt wurde.
    pub fn abmelden(&self, client_id: &ClientId) -> bool {
        let mut clients = self.inner.lock();
        let entfernt = clients.remove(client_id).is_some();
        if entfernt {
            tracing::debug!(client_id = %client_id, anzahl = clients.len(), "Client abgemeldet");
        }
        entfernt
    }

    /// Snapshot aller Clients ausser einem (fuer Broadcasts)
    ///
    /// Die Reihenfolge ist nicht festgelegt.
    pub fn alle_ausser(&self, ausgeschlossen: &ClientId) -> Vec<ClientSender> {
        self.inner
            .lock()
            .iter()
            .filter(|(id, _)| *id != ausgeschlossen)
            .map(|(_, sender)| sender.clone())
            .collect()
    }

    /// Gibt die Anzahl der registrierten Clients zurueck
    pub fn anzahl(&self) -> usize {
        self.inner.lock().len()
    }

    /// Prueft ob ein Client registriert ist
    pub fn ist_registriert(&self, client_id: &ClientId) -> bool {
        self.inner.lock().contains_key(client_id)
    }

    /// Gibt alle registrierten IDs zurueck
    pub fn client_ids(&self) -> Vec<ClientId> {
        self.inner.lock().keys().copied().collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
