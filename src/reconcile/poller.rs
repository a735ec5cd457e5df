//! Periodic pull feed.
//!
//! Sweeps every actively watched order that accepts the poll feed,
//! fetches its venue snapshot, and forwards it into the engine's poll
//! channel. In poll-only mode this path is a full substitute for the
//! push feed, not a degraded approximation: status and fill state are
//! reconstructed entirely from snapshots.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::orders::OrderRegistry;
use crate::venue::VenueClient;

use super::events::{FeedEvent, OrderSnapshot};

/// Spawn the poll loop. Returns a handle that can be aborted to stop
/// polling; the loop also exits once the engine drops the poll channel.
pub fn spawn_poller<V: VenueClient + 'static>(
    registry: Arc<OrderRegistry>,
    venue: Arc<V>,
    poll_tx: mpsc::Sender<FeedEvent>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;

            let ids = registry.pollable_ids().await;
            if !ids.is_empty() {
                debug!(count = ids.len(), "Polling order snapshots");
            }
            for id in ids {
                let raw = match venue.order_snapshot(&id).await {
                    Ok(raw) => raw,
                    Err(e) => {
                        // Transient venue failures self-heal on the next tick.
                        warn!(order_id = %id, error = %e, "Snapshot fetch failed");
                        continue;
                    }
                };
                let snapshot = match OrderSnapshot::try_from(raw) {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        warn!(order_id = %id, error = %e, "Malformed snapshot dropped");
                        continue;
                    }
                };
                if poll_tx.send(FeedEvent::Snapshot(snapshot)).await.is_err() {
                    debug!("Poll channel closed, stopping poller");
                    return;
                }
            }

            registry.purge_tombstones().await;
        }
    })
}
