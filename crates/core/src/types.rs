//! Identifikationstypen fuer ruflink
//!
//! Die `ClientId` verwendet das Newtype-Pattern, damit sie nicht mit
//! beliebigen Strings verwechselt werden kann. Auf dem Draht ist sie ein
//! opaker String (UUID v4, lowercase mit Bindestrichen).

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Vom Server vergebene ID einer einzelnen Live-Verbindung
///
/// Wird beim Verbindungsaufbau erzeugt und bleibt fuer die Lebensdauer der
/// Verbindung stabil. Clients waehlen ihre ID nie selbst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Erstellt eine neue zufaellige ClientId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ClientId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}
