use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use beacon_registry::config::{ConfigValidator, RegistryConfig};
use beacon_registry::logging;
use beacon_registry::server;

#[derive(Parser, Debug)]
#[command(name = "beacon-registry")]
#[command(about = "Lightweight replicated service registry for small clusters")]
#[command(long_about = r#"
Lightweight replicated service registry for small clusters.

Service providers register endpoints under a service name and keep them
alive with heartbeats; consumers discover endpoints by name. In cluster
mode, all peers are configured statically, one of them is elected leader
deterministically, and followers replicate full snapshots from it.

Examples:
  # Single node
  beacon-registry --port 8484

  # Three-node cluster
  beacon-registry --port 8484 \
    --server-list http://10.0.0.1:8484 http://10.0.0.2:8484 http://10.0.0.3:8484 \
    --snapshot-path /var/lib/beacon/snapshot.json
"#)]
struct CliArgs {
    /// Path to a JSON config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host address to bind the HTTP server
    #[arg(long)]
    host: Option<String>,

    /// Port to bind the HTTP server
    #[arg(long)]
    port: Option<u16>,

    /// Cluster peer URLs (e.g. http://10.0.0.1:8484 http://10.0.0.2:8484)
    #[arg(long, num_args = 0..)]
    server_list: Vec<String>,

    /// This node's URL, when the local address matches no server-list entry
    #[arg(long)]
    my_url: Option<String>,

    /// Disable cluster mode; the node runs standalone and leads itself
    #[arg(long, default_value_t = false)]
    standalone: bool,

    /// Cluster loop period in milliseconds
    #[arg(long)]
    heartbeat_interval_ms: Option<u64>,

    /// Instance liveness threshold in milliseconds
    #[arg(long)]
    node_timeout_ms: Option<u64>,

    /// Liveness sweep period in milliseconds
    #[arg(long)]
    sweep_interval_ms: Option<u64>,

    /// Durable snapshot file; persistence is off when not set
    #[arg(long)]
    snapshot_path: Option<PathBuf>,

    /// Durable save period in seconds
    #[arg(long)]
    snapshot_interval_secs: Option<u64>,

    /// Default log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn assemble_config(args: CliArgs) -> anyhow::Result<RegistryConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => RegistryConfig::default(),
    };

    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if !args.server_list.is_empty() {
        config.server_list = args.server_list;
    }
    if args.my_url.is_some() {
        config.my_url = args.my_url;
    }
    if args.standalone {
        config.cluster_mode = false;
    }
    if let Some(value) = args.heartbeat_interval_ms {
        config.heartbeat_interval_ms = value;
    }
    if let Some(value) = args.node_timeout_ms {
        config.node_timeout_ms = value;
    }
    if let Some(value) = args.sweep_interval_ms {
        config.sweep_interval_ms = value;
    }
    if args.snapshot_path.is_some() {
        config.snapshot_path = args.snapshot_path;
    }
    if let Some(value) = args.snapshot_interval_secs {
        config.snapshot_interval_secs = value;
    }
    config.log_level.get_or_insert(args.log_level);

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = assemble_config(args)?;

    logging::init_logging(config.log_level.as_deref().unwrap_or("info"));
    ConfigValidator::validate(&config).context("invalid configuration")?;

    server::startup(config).await
}
