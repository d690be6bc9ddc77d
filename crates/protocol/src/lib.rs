//! ruflink-protocol – Signaling-Protokoll-Definitionen
//!
//! Dieses Crate definiert alle Nachrichtentypen, die zwischen Browser-Client
//! und Relay ausgetauscht werden, sowie den JSON-Codec fuer WebSocket-Textframes.

pub mod nachrichten;
pub mod wire;

pub use nachrichten::{
    AnswerCall, CallAccepted, CallIncoming, CallRequest, ClientNachricht, Me, ServerNachricht,
    TargetUnreachable,
};
pub use wire::{NachrichtenCodec, WireError};
