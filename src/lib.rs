//! Client-side packet dispatch and request/response correlation over
//! byte-stream conduits.
//!
//! This library routes decoded inbound packets either to persistently
//! registered handlers for the packet's type, or to the one-shot callback
//! awaiting a specific correlated response. Callers can fire requests and
//! forget them, attach a response callback, or block until a matching
//! response arrives or a timeout elapses. Abandoned callback registrations
//! are reclaimed by an opportunistic expiry sweep.
//!
//! Transports (conduits) and wire encodings (codecs) are pluggable
//! collaborators specified only at their interface boundary; an in-memory
//! conduit pair and a JSON codec are provided as reference implementations.

// Import all sub modules once...
mod client;
mod codec;
mod domain;
mod transport;

mod config;

mod correlation;
mod error;

mod macros;

pub(crate) use macros::{log_debug, log_error, log_info, log_warn};

// Re-export main types
pub use client::{Client, ConnectionId, ConnectionState};

pub use config::ClientConfig;

pub use correlation::CorrelationId;
pub use error::{Error, Result};

pub use codec::{CodecPtr, JsonCodec, PacketCodec};

pub use transport::create_memory_conduits;

// --- public re-exports
pub use domain::{
    //
    Conduit,
    ConduitPtr,
    FrameInbox,
    Packet,
    PacketCatalog,
    PacketCatalogBuilder,
    PacketHandler,
    PacketKind,
    PacketTypeId,
};
