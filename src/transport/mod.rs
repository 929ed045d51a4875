//! Conduit implementations.
//!
//! This module provides concrete implementations of the domain-level
//! `Conduit` trait. Client code must not depend on transport-specific
//! types; everything is reached through constructor functions returning
//! `ConduitPtr`.

mod memory;

pub use memory::conduit_pair as create_memory_conduits;
