use std::collections::HashMap;

use async_trait::async_trait;
use futures::future;
use serde::Serialize;
use tokio::sync::watch;

/// Health status of a single component or of the application as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Component is initializing and not ready yet.
    NotReady,
    /// Component is ready for operations.
    Ready,
    /// Component is shut down.
    ShutDown,
    /// Component has panicked.
    Panicked,
}

impl HealthStatus {
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    fn aggregation_priority(self) -> usize {
        // Greater value means worse.
        match self {
            Self::Ready => 0,
            Self::NotReady => 1,
            Self::ShutDown => 2,
            Self::Panicked => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Health {
    status: HealthStatus,
    /// Free-form component-specific information.
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl Health {
    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<HealthStatus> for Health {
    fn from(status: HealthStatus) -> Self {
        Self {
            status,
            details: None,
        }
    }
}

#[async_trait]
pub trait CheckHealth: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn check_health(&self) -> Health;
}

/// Aggregate health of the application, as served by the health endpoint.
#[derive(Debug, Serialize)]
pub struct AppHealth {
    #[serde(flatten)]
    inner: Health,
    components: HashMap<&'static str, Health>,
}

impl AppHealth {
    pub async fn new(health_checks: &[Box<dyn CheckHealth>]) -> Self {
        let check_futures = health_checks.iter().map(|check| async move {
            let health = check.check_health().await;
            (check.name(), health)
        });
        let components: HashMap<_, _> = future::join_all(check_futures).await.into_iter().collect();

        let worst_status = components
            .values()
            .map(|health| health.status)
            .max_by_key(|status| status.aggregation_priority())
            .unwrap_or(HealthStatus::Ready);
        Self {
            inner: worst_status.into(),
            components,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.inner.status.is_ready()
    }
}

/// Health check whose state is fed by the component through the paired
/// [`HealthUpdater`].
#[derive(Debug, Clone)]
pub struct ReactiveHealthCheck {
    name: &'static str,
    health_receiver: watch::Receiver<Health>,
}

impl ReactiveHealthCheck {
    pub fn new(name: &'static str) -> (Self, HealthUpdater) {
        let (health_sender, health_receiver) = watch::channel(HealthStatus::NotReady.into());
        let this = Self {
            name,
            health_receiver,
        };
        let updater = HealthUpdater {
            name,
            health_sender,
        };
        (this, updater)
    }
}

#[async_trait]
impl CheckHealth for ReactiveHealthCheck {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn check_health(&self) -> Health {
        self.health_receiver.borrow().clone()
    }
}

/// Sending side of a [`ReactiveHealthCheck`]. Marks the check as shut down
/// when dropped.
#[derive(Debug)]
pub struct HealthUpdater {
    name: &'static str,
    health_sender: watch::Sender<Health>,
}

impl HealthUpdater {
    /// Returns whether the update was read by anyone.
    pub fn update(&self, health: Health) -> bool {
        self.health_sender.send(health).is_ok()
    }

    /// Subscribes to the health check updated by this updater.
    pub fn subscribe(&self) -> ReactiveHealthCheck {
        ReactiveHealthCheck {
            name: self.name,
            health_receiver: self.health_sender.subscribe(),
        }
    }
}

impl Drop for HealthUpdater {
    fn drop(&mut self) {
        self.health_sender.send(HealthStatus::ShutDown.into()).ok();
    }
}
