//! Uplink monitor.
//!
//! A background task probes the Hub with a plain TCP connect and publishes
//! the result through an atomic flag; the node reads the flag through
//! [`Connectivity`] on every tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::Url;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};

use fieldnode_core::Connectivity;

/// Connectivity flag shared between the probe task and the node.
#[derive(Debug, Clone, Default)]
pub struct SharedLink {
    up: Arc<AtomicBool>,
}

impl SharedLink {
    pub fn new(up: bool) -> Self {
        Self {
            up: Arc::new(AtomicBool::new(up)),
        }
    }

    pub fn set(&self, up: bool) {
        let was = self.up.swap(up, Ordering::SeqCst);
        if was != up {
            info!("Hub link {}", if up { "up" } else { "down" });
        }
    }
}

impl Connectivity for SharedLink {
    fn is_connected(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }
}

/// `host:port` to probe for a Hub base URL.
pub fn probe_target(hub_url: &str) -> Option<String> {
    let url = Url::parse(hub_url).ok()?;
    let host = url.host_str()?;
    let port = url.port_or_known_default()?;
    if host.contains(':') {
        Some(format!("[{}]:{}", host.trim_matches(|c| c == '[' || c == ']'), port))
    } else {
        Some(format!("{}:{}", host, port))
    }
}

/// Try one TCP connect within `limit`.
pub async fn probe(target: &str, limit: Duration) -> bool {
    match timeout(limit, TcpStream::connect(target)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!("Link probe to {} failed: {}", target, e);
            false
        }
        Err(_) => {
            debug!("Link probe to {} timed out after {:?}", target, limit);
            false
        }
    }
}

/// Probe `target` every `every` and publish the result into `link`.
///
/// Runs until the task is aborted.
pub fn spawn_monitor(
    link: SharedLink,
    target: String,
    every: Duration,
    limit: Duration,
) -> JoinHandle<()> {
    info!("Monitoring Hub link at {} every {:?}", target, every);
    tokio::spawn(async move {
        let mut timer = interval(every);
        let mut consecutive_failures = 0u32;

        loop {
            timer.tick().await;
            let up = probe(&target, limit).await;
            if up {
                consecutive_failures = 0;
            } else {
                consecutive_failures += 1;
                if consecutive_failures == 3 {
                    warn!("Hub at {} unreachable for 3 probes", target);
                }
            }
            link.set(up);
        }
    })
}
