//! ruflink-core – Gemeinsame Typen
//!
//! Dieses Crate stellt die Identifikationstypen bereit, die Protokoll,
//! Signaling und Server gemeinsam nutzen.

pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use types::ClientId;
