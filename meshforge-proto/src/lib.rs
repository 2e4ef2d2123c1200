//! # MeshForge Wire Protocol
//!
//! This crate defines the value types exchanged between mesh partitions during
//! distributed 2:1-balance enforcement, together with their binary codecs.
//! Every message is a plain value record: no shared references ever cross the
//! wire, and all fields are either fixed-width integers, UTF-8 strings, or
//! opaque canonical key bytes.
//!
//! ## Message Catalog
//!
//! The balance protocol uses one logical service with three message families:
//!
//! - **[`ViolationBatch`]**: the payload of one butterfly aggregation round.
//!   Carries every 2:1 violation the sender has accumulated so far, tagged
//!   with the requester/responder ranks and the round number.
//! - **[`RefinementRequest`]** / **[`RefinementResponse`]**: one partner
//!   exchange of the iterative refinement protocol. A request with an empty
//!   boundary-key list is a heartbeat that still consumes a barrier slot.
//! - **[`GhostElement`]**: a read-only copy of a leaf owned by a neighboring
//!   partition, shipped inside refinement responses and ghost-layer updates.
//!
//! ## Encoding Guarantees
//!
//! - Spatial keys travel as canonical byte strings. Hashing and equality of
//!   key bytes are deterministic across peers: two partitions holding the
//!   same leaf always produce bit-identical encodings.
//! - Ranks, levels, and round numbers are `i32`; tree identifiers are `i64`;
//!   timestamps are milliseconds since the Unix epoch as `i64`.
//! - The compact wire form is bincode ([`codec::encode`] / [`codec::decode`]);
//!   JSON remains available through serde for diagnostics and tooling.

pub mod codec;
pub mod messages;

pub use codec::{decode, encode, CodecError};
pub use messages::{
    GhostBatch, GhostElement, KeyBytes, RefinementRequest, RefinementResponse, Violation,
    ViolationBatch,
};

/// Current time in milliseconds since the Unix epoch, as carried in every
/// protocol timestamp field.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
