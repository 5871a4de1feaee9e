//! HTTP transport and node wiring
//!
//! The axum surface over the registry: client-facing registration and
//! discovery endpoints plus the peer-facing `/info`, `/cluster`, `/leader`
//! and `/snapshot` endpoints the cluster loop consumes. Write endpoints are
//! admitted only on the leader; any node serves reads.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::cluster::{
    Cluster, ClusterController, Election, HttpPeerClient, Replicator, Server,
};
use crate::config::{ConfigValidator, RegistryConfig};
use crate::core::{
    InstanceMeta, RegistryError, RegistryService, RegistryState, Snapshot, SystemClock,
};
use crate::health::{LivenessSweeper, SweeperConfig};
use crate::store::{FileSnapshotStore, SnapshotPersister, SnapshotStore};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<dyn RegistryService>,
    pub cluster: Arc<Cluster>,
}

#[derive(Deserialize)]
struct ServiceParam {
    service: String,
}

#[derive(Deserialize)]
struct ServicesParam {
    /// Comma-joined service names.
    services: String,
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        match self {
            RegistryError::NotLeader { leader } => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "not leader",
                    "leader": leader.as_deref().unwrap_or("unknown"),
                })),
            )
                .into_response(),
            RegistryError::MalformedInput { reason } => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": reason }))).into_response()
            }
            other => {
                error!(error = %other, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}

/// Writes are admitted on the leader only; the rejection carries the leader
/// URL so clients can redirect.
fn ensure_leader(cluster: &Cluster) -> Result<(), RegistryError> {
    if cluster.is_self_leader() {
        return Ok(());
    }
    Err(RegistryError::NotLeader {
        leader: cluster.leader().map(|l| l.url),
    })
}

async fn register(
    State(state): State<AppState>,
    Query(params): Query<ServiceParam>,
    Json(instance): Json<InstanceMeta>,
) -> Result<Json<InstanceMeta>, RegistryError> {
    ensure_leader(&state.cluster)?;
    Ok(Json(state.registry.register(&params.service, instance)))
}

async fn unregister(
    State(state): State<AppState>,
    Query(params): Query<ServiceParam>,
    Json(instance): Json<InstanceMeta>,
) -> Result<Json<InstanceMeta>, RegistryError> {
    ensure_leader(&state.cluster)?;
    Ok(Json(state.registry.unregister(&params.service, &instance)))
}

async fn find_all(
    State(state): State<AppState>,
    Query(params): Query<ServiceParam>,
) -> Json<Vec<InstanceMeta>> {
    // Absent and present-but-empty both serialize as [].
    Json(
        state
            .registry
            .get_all_instances(&params.service)
            .unwrap_or_default(),
    )
}

async fn renew(
    State(state): State<AppState>,
    Query(params): Query<ServiceParam>,
    Json(instance): Json<InstanceMeta>,
) -> Result<Json<InstanceMeta>, RegistryError> {
    ensure_leader(&state.cluster)?;
    Ok(Json(state.registry.renew(&params.service, &instance)))
}

async fn renews(
    State(state): State<AppState>,
    Query(params): Query<ServicesParam>,
    Json(instance): Json<InstanceMeta>,
) -> Result<Json<InstanceMeta>, RegistryError> {
    ensure_leader(&state.cluster)?;
    let services: Vec<&str> = params
        .services
        .split(',')
        .filter(|s| !s.is_empty())
        .collect();
    if services.is_empty() {
        return Err(RegistryError::MalformedInput {
            reason: "services must name at least one service".to_string(),
        });
    }
    Ok(Json(state.registry.renews(&services, &instance)))
}

async fn version(
    State(state): State<AppState>,
    Query(params): Query<ServiceParam>,
) -> Json<u64> {
    Json(state.registry.version(&params.service))
}

async fn versions(
    State(state): State<AppState>,
    Query(params): Query<ServicesParam>,
) -> Json<HashMap<String, u64>> {
    let services: Vec<&str> = params
        .services
        .split(',')
        .filter(|s| !s.is_empty())
        .collect();
    Json(state.registry.versions(&services))
}

/// Self-description; doubles as the peer probe target. The version field
/// carries this node's global heartbeat counter.
async fn info(State(state): State<AppState>) -> Json<Server> {
    let mut server = state.cluster.self_server();
    server.version = state.registry.global_version();
    Json(server)
}

async fn cluster(State(state): State<AppState>) -> Json<Vec<Server>> {
    Json(state.cluster.servers())
}

async fn leader(State(state): State<AppState>) -> Json<Option<Server>> {
    Json(state.cluster.leader())
}

async fn snapshot(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.registry.snapshot())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/reg", post(register))
        .route("/unreg", post(unregister))
        .route("/findAll", get(find_all))
        .route("/renew", post(renew))
        .route("/renews", post(renews))
        .route("/version", post(version))
        .route("/versions", post(versions))
        .route("/info", get(info))
        .route("/cluster", get(cluster))
        .route("/leader", get(leader))
        .route("/snapshot", get(snapshot))
        .with_state(state)
}

/// How long shutdown waits for periodic tasks to drain their final tick.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(5);

/// Build every component, spawn the periodic tasks and serve until ctrl-c.
pub async fn startup(config: RegistryConfig) -> anyhow::Result<()> {
    ConfigValidator::validate(&config)?;

    let clock = Arc::new(SystemClock);
    let registry: Arc<RegistryState> = Arc::new(RegistryState::new(clock.clone()));
    let registry_dyn: Arc<dyn RegistryService> = registry.clone();

    // Restore prior state before anything else observes the registry.
    let store: Option<Arc<dyn SnapshotStore>> = config
        .snapshot_path
        .as_ref()
        .map(|path| Arc::new(FileSnapshotStore::new(path.clone())) as Arc<dyn SnapshotStore>);
    if let Some(store) = &store {
        SnapshotPersister::restore_on_startup(registry_dyn.as_ref(), store.as_ref());
    }

    let local_ip = crate::cluster::resolve_local_ip().unwrap_or_else(|| {
        warn!("could not resolve local address, falling back to 127.0.0.1");
        "127.0.0.1".to_string()
    });
    let cluster_enabled = config.cluster_mode && !config.server_list.is_empty();
    let cluster = if cluster_enabled {
        Arc::new(Cluster::from_config(
            &config.server_list,
            config.my_url.as_deref(),
            &local_ip,
        )?)
    } else {
        let my_url = config
            .my_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", local_ip, config.port));
        info!(url = %my_url, "single-node mode, this node leads itself");
        Arc::new(Cluster::single(my_url))
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let mut tasks: Vec<(&str, JoinHandle<()>)> = Vec::new();

    let sweeper = LivenessSweeper::new(
        registry_dyn.clone(),
        clock,
        SweeperConfig {
            interval: Duration::from_millis(config.sweep_interval_ms),
            timeout_millis: config.node_timeout_ms as i64,
        },
    );
    tasks.push(("sweeper", tokio::spawn(sweeper.run(shutdown_rx.clone()))));

    if cluster_enabled {
        let peers = Arc::new(HttpPeerClient::new());
        let controller = ClusterController::new(
            cluster.clone(),
            Election::new(cluster.clone()),
            Replicator::new(cluster.clone(), registry_dyn.clone(), peers.clone()),
            peers,
            Duration::from_millis(config.heartbeat_interval_ms),
        );
        tasks.push((
            "cluster loop",
            tokio::spawn(controller.event_loop(shutdown_rx.clone())),
        ));
    }

    if let Some(store) = store {
        let persister = SnapshotPersister::new(
            registry_dyn.clone(),
            store,
            Duration::from_secs(config.snapshot_interval_secs),
        );
        tasks.push((
            "snapshot persister",
            tokio::spawn(persister.run(shutdown_rx.clone())),
        ));
    }

    let app = build_router(AppState {
        registry: registry_dyn,
        cluster,
    });
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "registry listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the periodic tasks and give each a bounded window to finish its
    // tick (the persister writes its final snapshot during this drain).
    info!("shutting down background tasks");
    let _ = shutdown_tx.send(());
    for (name, mut task) in tasks {
        if tokio::time::timeout(SHUTDOWN_DRAIN, &mut task).await.is_err() {
            warn!(task = name, "task did not drain in time, aborting");
            task.abort();
        }
    }
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    } else {
        info!("shutdown signal received");
    }
}
