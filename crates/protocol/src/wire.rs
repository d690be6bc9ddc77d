//! Wire-Format fuer WebSocket-Textframes
//!
//! Jeder Textframe traegt genau eine JSON-Nachricht. Das Framing selbst
//! uebernimmt die WebSocket-Schicht; dieser Codec kuemmert sich nur um
//! Groessenlimit und (De-)Serialisierung.
//!
//! Beim Dekodieren werden drei Fehlerfaelle unterschieden, damit der Router
//! sie getrennt loggen kann:
//! - Frame zu gross
//! - unbekannter Typ-Tag (vorwaertskompatibel, wird ignoriert)
//! - ungueltiges JSON bzw. falscher Payload

use serde_json::Value;
use thiserror::Error;

use crate::nachrichten::{ClientNachricht, ServerNachricht};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Nachrichtengroesse (256 KB, SDP mit vielen Kandidaten passt)
pub const DEFAULT_MAX_NACHRICHT_GROESSE: usize = 256 * 1024;

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Fehler beim Kodieren oder Dekodieren einer Nachricht
#[derive(Debug, Error)]
pub enum WireError {
    /// Nachricht ueberschreitet das Groessenlimit
    #[error("Nachricht zu gross: {groesse} Bytes (Maximum: {maximum} Bytes)")]
    ZuGross { groesse: usize, maximum: usize },

    /// Typ-Tag ist diesem Server nicht bekannt
    #[error("Unbekannter Nachrichtentyp: {0}")]
    UnbekannterTyp(String),

    /// JSON ungueltig oder Payload passt nicht zum Typ
    #[error("Ungueltige Nachricht: {0}")]
    Ungueltig(#[from] serde_json::Error),

    /// Pflichtfeld `type` fehlt
    #[error("Nachricht ohne Typ-Feld")]
    OhneTyp,
}

// ---------------------------------------------------------------------------
// NachrichtenCodec
// ---------------------------------------------------------------------------

/// JSON-Codec fuer Signaling-Nachrichten
#[derive(Debug, Clone)]
pub struct NachrichtenCodec {
    /// Maximale erlaubte Nachrichtengroesse in Bytes
    max_groesse: usize,
}

impl NachrichtenCodec {
    /// Erstellt einen neuen Codec mit Standard-Limit
    pub fn new() -> Self {
        Self {
            max_groesse: DEFAULT_MAX_NACHRICHT_GROESSE,
        }
    }

    /// Erstellt einen Codec mit benutzerdefinierter maximaler Groesse
    pub fn with_max_size(max_groesse: usize) -> Self {
        Self { max_groesse }
    }

    /// Gibt die konfigurierte maximale Nachrichtengroesse zurueck
    pub fn max_groesse(&self) -> usize {
        self.max_groesse
    }

    /// Dekodiert einen eingehenden Textframe
    pub fn dekodieren(&self, text: &str) -> Result<ClientNachricht, WireError> {
        if text.len() > self.max_groesse {
            return Err(WireError::ZuGross {
                groesse: text.len(),
                maximum: self.max_groesse,
            });
        }

        let mut wert: Value = serde_json::from_str(text)?;
        let typ = wert
            .get("type")
            .and_then(Value::as_str)
            .ok_or(WireError::OhneTyp)?;

        if !ClientNachricht::TYPEN.contains(&typ) {
            return Err(WireError::UnbekannterTyp(typ.to_string()));
        }

        // Browser schicken auch bei inhaltslosen Typen gern `"payload": {}`
        let ohne_payload = ClientNachricht::OHNE_PAYLOAD.contains(&typ);
        if ohne_payload {
            if let Some(objekt) = wert.as_object_mut() {
                objekt.remove("payload");
            }
        }

        Ok(serde_json::from_value(wert)?)
    }

    /// Kodiert eine ausgehende Nachricht als Textframe
    pub fn kodieren(&self, nachricht: &ServerNachricht) -> Result<String, WireError> {
        Ok(serde_json::to_string(nachricht)?)
    }
}

impl Default for NachrichtenCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
