use std::{net::SocketAddr, sync::Arc};

use anyhow::Context as _;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use kaldb_health_check::{AppHealth, CheckHealth};
use kaldb_types::NodeRole;
use serde::Serialize;
use tokio::sync::watch;

/// Health endpoint of one node. Serves the node identity next to the
/// aggregate readiness of the role's components under `/health`; the node
/// answers SERVICE_UNAVAILABLE until every component has finished its
/// initial sync, which is what rolling restarts and load balancers key off.
///
/// Runs as one of the node's tasks, driven by the shared stop channel like
/// every other service.
pub struct HealthServer {
    bind_addr: SocketAddr,
    state: Arc<NodeHealthState>,
}

struct NodeHealthState {
    node_name: String,
    role: NodeRole,
    checks: Vec<Box<dyn CheckHealth>>,
}

/// Wire shape of a `/health` answer.
#[derive(Serialize)]
struct NodeHealth {
    node: String,
    role: String,
    #[serde(flatten)]
    health: AppHealth,
}

impl HealthServer {
    pub fn new(
        bind_addr: SocketAddr,
        node_name: impl Into<String>,
        role: NodeRole,
        checks: Vec<Box<dyn CheckHealth>>,
    ) -> Self {
        Self {
            bind_addr,
            state: Arc::new(NodeHealthState {
                node_name: node_name.into(),
                role,
                checks,
            }),
        }
    }

    pub async fn run(self, mut stop_receiver: watch::Receiver<bool>) -> anyhow::Result<()> {
        let app = Router::new()
            .route("/health", get(serve_node_health))
            .with_state(Arc::clone(&self.state));
        kaldb_logs::info!(
            "Health endpoint of {} node {} listening on {}",
            self.state.role,
            self.state.node_name,
            self.bind_addr
        );

        axum::Server::try_bind(&self.bind_addr)
            .with_context(|| format!("failed to bind health endpoint to {}", self.bind_addr))?
            .serve(app.into_make_service())
            .with_graceful_shutdown(async move {
                while stop_receiver.changed().await.is_ok() {
                    if *stop_receiver.borrow() {
                        break;
                    }
                }
                kaldb_logs::info!("Stop signal received, health endpoint is shutting down");
            })
            .await
            .context("health endpoint failed")
    }
}

async fn serve_node_health(
    State(state): State<Arc<NodeHealthState>>,
) -> (StatusCode, Json<NodeHealth>) {
    let health = AppHealth::new(&state.checks).await;
    let status_code = if health.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let response = NodeHealth {
        node: state.node_name.clone(),
        role: state.role.to_string(),
        health,
    };
    (status_code, Json(response))
}
