//! Run state shared across worker threads.
//!
//! - `SHUTDOWN`: Has shutdown been requested? (Ctrl+C received)

use std::sync::atomic::{AtomicBool, Ordering};

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

// =============================================================================
// SHUTDOWN state
// =============================================================================

/// Setup the global Ctrl+C handler. Call once at program start
///
/// The first Ctrl+C asks workers to stop picking up new images; the archive is
/// then left untouched. A second Ctrl+C exits immediately.
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        if SHUTDOWN.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        crate::log!("slim"; "interrupted, finishing images in flight...");
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// The shutdown flag, for components that take their cancellation signal by
/// reference. Workers load it with `Relaxed` ordering: the worst case is a few
/// more images processed before stopping.
pub fn shutdown_flag() -> &'static AtomicBool {
    &SHUTDOWN
}
