//! Typed error definitions for the bond service mesh.
//!
//! [`MeshError`] groups failures by how the caller is expected to react:
//! capacity violations and lookup misses are raised to the immediate caller,
//! malformed input is logged and the single message dropped, and transport
//! errors are handled by the owning worker loop. All variants implement
//! `std::error::Error` via `thiserror`, so they compose with `anyhow::Result`
//! in process setup code.

use thiserror::Error;

use crate::types::InquiryState;

/// Library-wide result alias.
pub type Result<T> = std::result::Result<T, MeshError>;

/// Domain-specific errors for the bond service mesh.
#[derive(Debug, Error)]
pub enum MeshError {
    /// A queue message does not fit in one slot. Raised before any queue
    /// state is touched.
    #[error("message too large: {len} bytes (slot holds < {max})")]
    MessageTooLarge { len: usize, max: usize },

    /// `get_data` on a key that was never ingested.
    #[error("unknown key: {0}")]
    UnknownKey(String),

    /// Product id not present in the registry.
    #[error("unknown product: {0}")]
    UnknownProduct(String),

    /// Malformed wire line (field count, number, side, state, level).
    #[error("parse error: {0}")]
    Parse(String),

    /// Inquiry state machine misuse.
    #[error("inquiry {id}: invalid transition {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: InquiryState,
        to: InquiryState,
    },

    /// Shared memory creation, mapping, or synchronization error.
    #[error("shm error: {0}")]
    Shm(String),

    /// TCP connect/accept/read/write error, or a closed outbound channel.
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
