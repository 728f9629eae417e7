//! # bm-core
//!
//! Core crate for the bond trading mesh, providing:
//!
//! - **Types** (`types`): bonds, order books, trades, positions, risk, inquiries
//! - **Configuration** (`config`): JSON config deserialization
//! - **Error types** (`error`): domain-specific `MeshError` via thiserror
//! - **Service traits** (`soa`): `Service`, `ServiceListener`, `Connector` and the shared keyed store
//! - **Price codec** (`price`): fractional `WHOLE-XYz` bond price notation
//! - **Line codec** (`codec`): one text line per record, both directions
//! - **Shared memory** (`shm`): bounded blocking text queue over mmap
//! - **Line transport** (`line`): newline-framed TCP server and client
//! - **CPU affinity** (`cpu_affinity`): thread-to-core pinning for the queue consumer
//! - **Time utilities** (`time_util`): wall-clock timestamps for history files
//! - **Logging** (`logging`): tracing-based structured logging

pub mod codec;
pub mod config;
pub mod cpu_affinity;
pub mod error;
pub mod line;
pub mod logging;
pub mod price;
pub mod shm;
pub mod soa;
pub mod time_util;
pub mod types;

pub use error::{MeshError, Result};
// Re-export types at crate root for convenience.
pub use types::*;
