//! Signaling-Nachrichten (WebSocket, JSON)
//!
//! Definiert alle Nachrichten, die ueber die WebSocket-Verbindung zwischen
//! Browser und Relay ausgetauscht werden.
//!
//! ## Design
//! - Jede Nachricht ist ein Objekt `{"type": "...", "payload": {...}}`
//! - Typ-Tags in kebab-case, Payload-Felder in camelCase (Browser-Konvention)
//! - Nachrichten ohne Inhalt (`call-end`, `call-ended`) haben kein `payload`-Feld
//! - SDP/ICE-Daten sind fuer den Relay opak und bleiben ein `serde_json::Value`

use ruflink_core::ClientId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Anruf-Anfrage eines Clients an einen anderen Client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    /// Angerufener Client
    pub target_client_id: ClientId,
    /// SDP-Offer bzw. ICE-Daten (opak)
    pub signal_payload: Value,
    /// Anzeigename des Anrufers
    #[serde(default)]
    pub display_name: String,
    /// Vom Client behauptete Absender-ID
    ///
    /// Wird vom Router ignoriert und durch den echten Registry-Schluessel
    /// des Absenders ersetzt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_client_id: Option<String>,
}

/// Annahme eines Anrufs (Antwort des Angerufenen an den Anrufer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerCall {
    /// Urspruenglicher Anrufer
    pub to_client_id: ClientId,
    /// SDP-Answer (opak)
    pub signal_payload: Value,
}

/// Alle Nachrichten, die ein Client senden darf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ClientNachricht {
    /// Anruf starten
    CallRequest(CallRequest),
    /// Anruf annehmen
    AnswerCall(AnswerCall),
    /// Auflegen ohne die Verbindung zu trennen
    CallEnd,
}

impl ClientNachricht {
    /// Alle bekannten Typ-Tags (fuer die Unterscheidung unbekannt/ungueltig)
    pub const TYPEN: &'static [&'static str] = &["call-request", "answer-call", "call-end"];

    /// Typen ohne Inhalt; ein mitgeschicktes `payload` wird ignoriert
    pub const OHNE_PAYLOAD: &'static [&'static str] = &["call-end"];

    /// Typ-Tag dieser Nachricht (fuer Logging und Metriken)
    pub fn typ(&self) -> &'static str {
        match self {
            Self::CallRequest(_) => "call-request",
            Self::AnswerCall(_) => "answer-call",
            Self::CallEnd => "call-end",
        }
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Selbst-Ankuendigung direkt nach dem Verbindungsaufbau
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Me {
    pub client_id: ClientId,
}

/// Eingehender Anruf beim Angerufenen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallIncoming {
    pub signal_payload: Value,
    pub from_client_id: ClientId,
    pub display_name: String,
}

/// Anruf wurde angenommen (beim Anrufer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAccepted {
    pub signal_payload: Value,
    pub from_client_id: ClientId,
}

/// Ziel ist nicht (mehr) verbunden
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetUnreachable {
    pub target_client_id: ClientId,
}

/// Alle Nachrichten, die der Server sendet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ServerNachricht {
    Me(Me),
    CallIncoming(CallIncoming),
    CallAccepted(CallAccepted),
    /// Ein Peer hat aufgelegt oder die Verbindung verloren
    CallEnded,
    TargetUnreachable(TargetUnreachable),
}

impl ServerNachricht {
    /// Erstellt die Selbst-Ankuendigung
    pub fn me(client_id: ClientId) -> Self {
        Self::Me(Me { client_id })
    }

    /// Erstellt eine Ziel-nicht-erreichbar-Meldung
    pub fn unerreichbar(target_client_id: ClientId) -> Self {
        Self::TargetUnreachable(TargetUnreachable { target_client_id })
    }

    /// Typ-Tag dieser Nachricht (fuer Logging und Metriken)
    pub fn typ(&self) -> &'static str {
        match self {
            Self::Me(_) => "me",
            Self::CallIncoming(_) => "call-incoming",
            Self::CallAccepted(_) => "call-accepted",
            Self::CallEnded => "call-ended",
            Self::TargetUnreachable(_) => "target-unreachable",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
