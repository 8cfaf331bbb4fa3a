//! Fieldnode - offline-first reading store and Hub sync.
//!
//! Run with: `sensor-driver | cargo run -p fieldnode-service`

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use fieldnode_core::hub_client::HttpHubClient;
use fieldnode_core::{ConfigManager, Node, PartitionDate, StorageMode, Store, SystemClock};
use fieldnode_service::{Config, SharedLink, link, runner};

type ServiceNode = Node<Store, HttpHubClient, SharedLink, SystemClock>;

/// Fieldnode - offline-first reading store and Hub sync.
#[derive(Parser, Debug)]
#[command(name = "fieldnode")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Media root (overrides config).
    #[arg(short, long, global = true)]
    media: Option<PathBuf>,

    /// Hub base URL (overrides config).
    #[arg(long, global = true)]
    hub: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the node in the foreground, reading input from stdin (default).
    Run,

    /// Print a status snapshot as JSON.
    Status,

    /// Sync every pending reading now and exit.
    Sync,

    /// Delete synced partitions past retention or until enough space is free.
    Cleanup {
        /// Free bytes to reach (defaults to minFreeBytes from config.json).
        #[arg(long)]
        min_free: Option<u64>,
    },

    /// Change the storage mode persisted on the media.
    Mode {
        /// REMOTE_ONLY, LOCAL_AND_REMOTE, LOCAL_ONLY or LOCAL_AUTOSYNC.
        mode: StorageMode,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fieldnode_service=info".parse()?)
                .add_directive("fieldnode_core=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&args)?;

    match args.command {
        Some(Command::Run) | None => run(config).await,
        Some(Command::Status) => status(config).await,
        Some(Command::Sync) => sync_now(config).await,
        Some(Command::Cleanup { min_free }) => cleanup(config, min_free),
        Some(Command::Mode { mode }) => set_mode(config, mode),
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    if let Some(media) = &args.media {
        config.storage.root = media.clone();
    }
    if let Some(hub) = &args.hub {
        config.hub.url = Some(hub.clone());
    }

    config.validate()?;
    Ok(config)
}

fn hub_client(config: &Config) -> anyhow::Result<HttpHubClient> {
    match &config.hub.url {
        Some(url) => Ok(HttpHubClient::with_timeout(
            url,
            Duration::from_secs(config.hub.timeout_secs),
        )?),
        None => {
            warn!("No Hub URL configured; readings will only be stored locally");
            Ok(HttpHubClient::unconfigured())
        }
    }
}

fn open_node(config: &Config, link: SharedLink) -> anyhow::Result<ServiceNode> {
    let root = &config.storage.root;
    if config.storage.create_root && !root.exists() {
        std::fs::create_dir_all(root)
            .with_context(|| format!("Failed to create media root {}", root.display()))?;
    }

    info!("Opening media at {}", root.display());
    let node = Node::open(
        root,
        config.storage.store_options(),
        hub_client(config)?,
        link,
        SystemClock::new(),
    )?;
    Ok(node)
}

/// Probe the Hub once so one-shot commands see the real link state.
async fn probe_once(config: &Config) -> SharedLink {
    let target = config.hub.url.as_deref().and_then(link::probe_target);
    let up = match target {
        Some(target) => {
            link::probe(
                &target,
                Duration::from_millis(config.scheduler.link_probe_timeout_ms),
            )
            .await
        }
        None => false,
    };
    SharedLink::new(up)
}

async fn run(config: Config) -> anyhow::Result<()> {
    let link = probe_once(&config).await;
    let monitor = config
        .hub
        .url
        .as_deref()
        .and_then(link::probe_target)
        .map(|target| {
            link::spawn_monitor(
                link.clone(),
                target,
                Duration::from_millis(config.scheduler.link_probe_interval_ms),
                Duration::from_millis(config.scheduler.link_probe_timeout_ms),
            )
        });

    let mut node = open_node(&config, link)?;
    info!(
        "Node running: {} pending, state {}",
        node.pending_count(),
        node.sync_state().as_str()
    );

    let mut ticker = interval(Duration::from_millis(config.scheduler.tick_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut indicator = None;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                node.tick().await;
                indicator = runner::report_events(&mut node, indicator);
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => runner::handle_line(&mut node, &line).await,
                Ok(None) => {
                    info!("Input closed; continuing to sync");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("Failed to read input: {}", e);
                    stdin_open = false;
                }
            },
            _ = &mut shutdown => {
                info!("Shutting down with {} readings pending", node.pending_count());
                break;
            }
        }
    }

    if let Some(monitor) = monitor {
        monitor.abort();
    }
    Ok(())
}

async fn status(config: Config) -> anyhow::Result<()> {
    let link = probe_once(&config).await;
    let node = open_node(&config, link)?;
    println!("{}", serde_json::to_string_pretty(&node.status())?);
    Ok(())
}

async fn sync_now(config: Config) -> anyhow::Result<()> {
    let link = probe_once(&config).await;
    let mut node = open_node(&config, link)?;
    if !node.has_pending_readings() {
        println!("Nothing to sync");
        return Ok(());
    }

    node.manual_sync(true);
    node.tick().await;
    runner::report_events(&mut node, None);

    match node.last_result() {
        Some(result) => {
            println!(
                "Synced {} readings, {} failed, {} still pending",
                result.synced_count,
                result.failed_count,
                node.pending_count()
            );
            if let Some(error) = &result.error {
                println!("Last error: {}", error);
            }
        }
        None => println!("Hub not reachable; {} readings pending", node.pending_count()),
    }
    Ok(())
}

fn cleanup(config: Config, min_free: Option<u64>) -> anyhow::Result<()> {
    let mut store = Store::open(&config.storage.root, config.storage.store_options())?;
    let manager = ConfigManager::in_media_root(&config.storage.root)?;
    let node_config = manager.config();

    let today = PartitionDate::from_datetime(time::OffsetDateTime::now_utc());
    let expired = store.reclaim_expired(today, node_config.keep_synced_days)?;
    let pressure = store.reclaim(min_free.unwrap_or(node_config.min_free_bytes))?;

    println!(
        "Deleted {} partitions, freed {} bytes, {} bytes free",
        expired.deleted.len() + pressure.deleted.len(),
        expired.bytes_freed + pressure.bytes_freed,
        pressure.free_after
    );
    if !pressure.target_met() {
        println!(
            "Still {} bytes short; remaining partitions hold unsynced readings",
            pressure.shortfall
        );
    }
    Ok(())
}

fn set_mode(config: Config, mode: StorageMode) -> anyhow::Result<()> {
    let mut manager = ConfigManager::in_media_root(&config.storage.root)?;
    if manager.set_mode(mode)? {
        println!("Storage mode set to {}", mode);
    } else {
        println!("Storage mode already {}", mode);
    }
    Ok(())
}
