//! Domain layer public interface.
//!
//! This module defines domain-level abstractions that are independent of
//! conduit implementations, wire formats, or infrastructure concerns.
//!
//! All domain consumers must import symbols via this module, not by
//! referencing individual files directly.

mod conduit;
mod packet;

// --- Conduit domain re-exports ---

pub use conduit::{
    //
    Conduit,
    ConduitPtr,
    FrameInbox,
};

// --- Packet domain re-exports ---

pub use packet::{
    //
    Packet,
    PacketCatalog,
    PacketCatalogBuilder,
    PacketHandler,
    PacketKind,
    PacketTypeId,
};
