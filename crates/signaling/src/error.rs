//! Fehlertypen fuer den Signaling-Service
//!
//! Keiner dieser Fehler ist fuer den Relay fatal: sie betreffen immer nur
//! eine einzelne Verbindung oder eine einzelne Zustellung.

use ruflink_protocol::WireError;
use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (Listener, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Fehler der WebSocket-Schicht
    #[error("WebSocket-Fehler: {0}")]
    WebSocket(#[from] axum::Error),

    /// Nachricht konnte nicht kodiert oder dekodiert werden
    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] WireError),

    /// Send-Queue des Empfaengers ist voll
    #[error("Send-Queue voll")]
    QueueVoll,

    /// Senden an Client fehlgeschlagen (Queue geschlossen, Client getrennt)
    #[error("Senden fehlgeschlagen: Client getrennt")]
    SendFehler,
}

impl SignalingError {
    /// Gibt true zurueck wenn der Fehler nur ein Verbindungsrennen ist
    /// (Empfaenger schon weg) und kein Anzeichen fuer ein echtes Problem
    pub fn ist_trennungsrennen(&self) -> bool {
        matches!(self, Self::SendFehler)
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
