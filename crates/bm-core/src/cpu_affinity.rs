//! Thread pinning for the blocking workers.
//!
//! The shared-memory consumer spends its life parked in `pop`; pinning it
//! keeps each wakeup on a warm core. Only that worker is ever pinned.

use tracing::{info, warn};

/// Pin the calling thread to `core`, logging under `label`.
///
/// `None` leaves scheduling to the OS and reports `false`, as does a core id
/// past the end of the machine or a refusal from the OS.
pub fn pin_current_thread(core: Option<usize>, label: &str) -> bool {
    let Some(core) = core else {
        return false;
    };
    let ids = core_affinity::get_core_ids().unwrap_or_default();
    let Some(id) = ids.get(core).copied() else {
        warn!("[{label}] core {core} out of range ({} cores), not pinning", ids.len());
        return false;
    };
    if core_affinity::set_for_current(id) {
        info!("[{label}] pinned to core {core}");
        true
    } else {
        warn!("[{label}] OS refused pin to core {core}");
        false
    }
}
