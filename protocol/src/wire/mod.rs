//! # Wire Adapter
//!
//! Boundary between the batch core and the network's serialization format.
//!
//! ```text
//! codec.rs       — CanonicalCodec contract + SortedJsonCodec offline implementation
//! definitions.rs — validated server_definitions tables
//! ```
//!
//! The core depends only on the [`CanonicalCodec`] trait. Swapping the
//! offline codec for a binary one changes the bytes (and therefore every
//! transaction ID and signature) but none of the protocol logic.

pub mod codec;
pub mod definitions;

pub use codec::{CanonicalCodec, CodecError, SortedJsonCodec};
pub use definitions::{NetworkDefinitions, REQUIRED_SECTIONS};
