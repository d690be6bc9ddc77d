//! ruflink-signaling – WebSocket-Signaling-Relay
//!
//! Dieser Crate implementiert den Relay fuer den WebRTC-Verbindungsaufbau
//! von ruflink. Er vergibt jeder WebSocket-Verbindung eine `ClientId`,
//! leitet Anruf-Anfragen und -Annahmen an den adressierten Peer weiter
//! und meldet getrennte Clients per Broadcast an alle anderen.
//!
//! Der Relay interpretiert keine SDP- oder ICE-Inhalte, er reicht
//! `signalPayload` unveraendert durch.
//!
//! ## Architektur
//!
//! ```text
//! HTTP Listener (SignalingServer, axum)
//!     |
//!     +-- GET /        Lebenszeichen
//!     +-- GET /health  HealthState
//!     +-- GET /metrics RelayMetriken
//!     +-- GET /ws
//!          |
//!          v
//!     ClientConnection (pro Verbindung ein Lese- und ein Schreib-Task)
//!          |  State Machine: Verbunden -> (Anrufend | Idle) -> Getrennt
//!          |
//!          v
//!     SignalingRouter
//!          |
//!          +-- call-request -> call-incoming  (Unicast)
//!          +-- answer-call  -> call-accepted  (Unicast)
//!          +-- call-end     -> call-ended     (Broadcast ohne Absender)
//!          +-- Trennung     -> call-ended     (Broadcast, genau einmal)
//!
//! PeerRegistry – Wer ist verbunden (ClientId -> Send-Queue)
//! Verteiler    – Zustellung in die Send-Queues, Fehlerisolation
//! ```

pub mod broadcast;
pub mod connection;
pub mod error;
pub mod registry;
pub mod router;
pub mod server;
pub mod server_state;

// Bequeme Re-Exporte
pub use broadcast::Verteiler;
pub use connection::{ClientConnection, VerbindungsZustand};
pub use error::{SignalingError, SignalingResult};
pub use registry::{ClientSender, PeerRegistry};
pub use router::{Routing, SignalingRouter};
pub use server::SignalingServer;
pub use server_state::{SignalingConfig, SignalingState};
