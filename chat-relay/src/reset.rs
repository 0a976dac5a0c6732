//! Background task that starts new admission windows.
//!
//! One shared tick serves every connection; each tick resets the counters
//! whose window has elapsed.

use crate::hub::BroadcastHub;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Spawn the window reset task.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_window_reset_task(
    hub: Arc<BroadcastHub>,
    tick: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Window reset task started (tick: {}ms)", tick.as_millis());

        let mut timer = interval(tick);

        loop {
            timer.tick().await;

            let reset = hub.reset_elapsed_windows();
            if reset > 0 {
                tracing::debug!("Window reset: {} connections", reset);
            }
        }
    })
}
