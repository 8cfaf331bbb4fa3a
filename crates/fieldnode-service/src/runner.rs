//! Scheduler loop glue between the line protocol, the node and the logs.

use tracing::{debug, error, info, warn};

use fieldnode_core::{
    Clock, Connectivity, HubClient, Node, ReadingStore, StatusIndicator, SyncEvent,
};

use crate::ingest::{Input, parse_line};

/// Apply one input line to the node.
pub async fn handle_line<S, H, L, C>(node: &mut Node<S, H, L, C>, line: &str)
where
    S: ReadingStore,
    H: HubClient,
    L: Connectivity,
    C: Clock,
{
    let input = match parse_line(line) {
        Ok(Some(input)) => input,
        Ok(None) => return,
        Err(e) => {
            warn!("Ignoring input line: {}", e);
            return;
        }
    };

    match input {
        Input::Reading {
            sensor_type,
            value,
            unit,
            endpoint_id,
        } => {
            node.store_reading(&sensor_type, value, &unit, endpoint_id)
                .await;
        }
        Input::SyncButton { long_press } => {
            if node.sync_button_pressed(long_press) {
                info!("Sync requested (sync all: {})", long_press);
            }
        }
        Input::Status => log_status(node),
    }
}

/// Log a status snapshot.
pub fn log_status<S, H, L, C>(node: &Node<S, H, L, C>)
where
    S: ReadingStore,
    H: HubClient,
    L: Connectivity,
    C: Clock,
{
    let status = node.status();
    match serde_json::to_string(&status) {
        Ok(json) => info!("Status: {}", json),
        Err(e) => warn!("Failed to serialize status: {}", e),
    }
}

/// Drain and log node events; returns the indicator to show.
pub fn report_events<S, H, L, C>(
    node: &mut Node<S, H, L, C>,
    shown: Option<StatusIndicator>,
) -> Option<StatusIndicator>
where
    S: ReadingStore,
    H: HubClient,
    L: Connectivity,
    C: Clock,
{
    for event in node.drain_events() {
        match &event {
            SyncEvent::RetriesExhausted { attempts } => {
                error!("Sync gave up after {} attempts", attempts)
            }
            SyncEvent::ReadingDropped { sensor_type, error } => {
                warn!("Dropped {} reading: {}", sensor_type, error)
            }
            SyncEvent::SpaceReclaimed {
                deleted,
                bytes_freed,
                shortfall,
            } => info!(
                "Reclaimed {} bytes from {} partitions (shortfall {})",
                bytes_freed,
                deleted.len(),
                shortfall
            ),
            _ => debug!(?event, "Node event"),
        }
    }

    let indicator = node.status().indicator;
    if indicator != shown
        && let Some(pattern) = indicator
    {
        info!(?pattern, "Status LED");
    }
    indicator
}
