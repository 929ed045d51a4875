use thiserror::Error;

use crate::PacketTypeId;

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Send attempted while the client is not in the `Ready` state.
    #[error("client is not connected")]
    NotConnected,

    /// Outgoing packet could not be encoded.
    #[error("packet encode failed: {0}")]
    Encode(String),

    /// Inbound frame could not be decoded.
    ///
    /// The dispatch path never surfaces this to registered handlers; the
    /// frame is dropped. It is only returned from explicit codec calls.
    #[error("frame decode failed: {0}")]
    Decode(String),

    /// Conduit-level failure (closed channel, broken pipe, ...).
    #[error("conduit error: {0}")]
    Conduit(String),

    /// Packet type not declared in the configured catalog.
    ///
    /// The catalog is closed at configuration time; hitting this is a
    /// programming error on the caller's side.
    #[error("packet type {0} is not in the catalog")]
    UnknownPacketType(PacketTypeId),
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
