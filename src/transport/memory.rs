// src/transport/memory.rs

//! In-memory conduit implementation.
//!
//! A linked pair of conduits moving byte frames entirely within the
//! process. This is the **reference implementation** of conduit semantics:
//! frames sent on one side arrive in the other side's inbox, in order.
//! Other transports are expected to approximate this behavior as closely as
//! their underlying systems allow.
//!
//! ## Non-Goals
//!
//! - Persistence or durability
//! - Network behavior or failure simulation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::{Conduit, ConduitPtr, Error, FrameInbox, Result};

struct MemoryConduit {
    // ---
    /// Sender feeding the peer's inbox.
    peer_tx: mpsc::Sender<Bytes>,

    /// Own inbound receiver, taken once by `open()`.
    inbox: Mutex<Option<mpsc::Receiver<Bytes>>>,

    connected: AtomicBool,
}

#[async_trait::async_trait]
impl Conduit for MemoryConduit {
    // ---
    async fn connect(&self) -> Result<()> {
        // ---
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        // ---
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Send one frame to the peer's inbox.
    ///
    /// A closed peer inbox (dropped `FrameInbox`) surfaces as a conduit
    /// error, matching a broken pipe on a real transport.
    async fn send(&self, frame: Bytes) -> Result<()> {
        // ---
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::Conduit("memory conduit not connected".into()));
        }

        self.peer_tx
            .send(frame)
            .await
            .map_err(|_| Error::Conduit("peer inbox closed".into()))
    }

    async fn open(&self) -> Result<FrameInbox> {
        // ---
        let mut slot = match self.inbox.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        match slot.take() {
            Some(inbox) => Ok(FrameInbox { inbox }),
            None => Err(Error::Conduit("frame inbox already taken".into())),
        }
    }
}

/// Create a linked pair of in-memory conduits.
///
/// Frames sent on either side are buffered (bounded) until the other side
/// opens its inbox, so there is no startup race between the two ends.
pub fn conduit_pair() -> (ConduitPtr, ConduitPtr) {
    // ---
    let (a_tx, a_rx) = mpsc::channel(16);
    let (b_tx, b_rx) = mpsc::channel(16);

    let a = MemoryConduit {
        peer_tx: b_tx,
        inbox: Mutex::new(Some(a_rx)),
        connected: AtomicBool::new(false),
    };
    let b = MemoryConduit {
        peer_tx: a_tx,
        inbox: Mutex::new(Some(b_rx)),
        connected: AtomicBool::new(false),
    };

    (Arc::new(a), Arc::new(b))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_in_order() {
        // ---
        let (left, right) = conduit_pair();
        left.connect().await.unwrap();

        left.send(Bytes::from_static(b"one")).await.unwrap();
        left.send(Bytes::from_static(b"two")).await.unwrap();

        let mut handle = right.open().await.unwrap();
        assert_eq!(handle.inbox.recv().await.unwrap(), "one");
        assert_eq!(handle.inbox.recv().await.unwrap(), "two");
    }

    #[tokio::test]
    async fn test_send_requires_connect() {
        // ---
        let (left, _right) = conduit_pair();
        let err = left.send(Bytes::new()).await.unwrap_err();
        assert!(matches!(err, Error::Conduit(_)));
    }

    #[tokio::test]
    async fn test_open_is_single_shot() {
        // ---
        let (left, _right) = conduit_pair();
        left.open().await.unwrap();
        assert!(left.open().await.is_err());
    }
}
