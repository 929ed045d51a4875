// src/domain/conduit.rs

//! Conduit domain abstraction.
//!
//! A conduit is an opaque bidirectional byte-stream channel with frame
//! boundaries already delimited by the underlying transport. This module
//! defines the minimal contract the client layer needs: connect and
//! disconnect, send a frame, and receive inbound frames through an inbox.
//!
//! The conduit layer is responsible only for moving frames. Higher-level
//! semantics such as packet decoding, correlation, or timeouts are handled
//! elsewhere. Concrete implementations live under `src/transport/`.

use crate::Result;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

/// Handle for reading inbound frames from a conduit.
///
/// The inbox remains live until either the handle is dropped or the conduit
/// is disconnected (sender side closes).
pub struct FrameInbox {
    // ---
    /// Receiver channel for delivered byte frames.
    pub inbox: mpsc::Receiver<Bytes>,
}

/// Conduit abstraction.
///
/// Implementations must ensure that:
/// - Frames sent after `connect()` returns successfully are deliverable to
///   the peer's inbox, in send order.
/// - `send()` does not block on the consumer beyond bounded channel
///   backpressure.
/// - No assumptions are made about durability or redelivery; delivery
///   guarantees are whatever the concrete transport provides.
///
/// The in-memory conduit serves as the reference implementation of these
/// semantics.
#[async_trait::async_trait]
pub trait Conduit: Send + Sync {
    // ---
    /// Establish the conduit.
    async fn connect(&self) -> Result<()>;

    /// Tear the conduit down and release associated resources.
    async fn disconnect(&self) -> Result<()>;

    /// Send one byte frame to the peer.
    async fn send(&self, frame: Bytes) -> Result<()>;

    /// Take the inbound frame inbox.
    ///
    /// May be called at most once per conduit; a second call is an error.
    async fn open(&self) -> Result<FrameInbox>;
}

/// Shared conduit pointer.
///
/// This is an `Arc<dyn Conduit>`, which means:
/// - `.clone()` is cheap (only increments a reference count)
/// - Multiple clones share the same underlying channel
/// - Used to erase concrete conduit types behind a stable domain interface.
pub type ConduitPtr = Arc<dyn Conduit>;
