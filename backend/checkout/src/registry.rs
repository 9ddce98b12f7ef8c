//! Per-user orchestrators and the background sweeper that reclaims them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::db;
use crate::orchestrator::{CheckoutOrchestrator, Collaborators, SessionSnapshot};

/// One orchestrator per authenticated user.
pub struct SessionRegistry {
    services: Collaborators,
    sessions: RwLock<HashMap<String, Arc<CheckoutOrchestrator>>>,
}

impl SessionRegistry {
    pub fn new(services: Collaborators) -> Self {
        Self {
            services,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// The user's orchestrator, created on first use.
    pub async fn for_user(&self, user_id: &str) -> Arc<CheckoutOrchestrator> {
        if let Some(existing) = self.sessions.read().await.get(user_id) {
            return existing.clone();
        }
        self.sessions
            .write()
            .await
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(CheckoutOrchestrator::new(self.services.clone())))
            .clone()
    }

    pub async fn get(&self, user_id: &str) -> Option<Arc<CheckoutOrchestrator>> {
        self.sessions.read().await.get(user_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Cancel sessions stuck in `awaiting-payment` for `checkout_ttl` and drop
    /// orchestrators that have been idle for as long. Returns the snapshots of
    /// the sessions that were cancelled.
    pub async fn sweep(&self, checkout_ttl: Duration) -> Vec<SessionSnapshot> {
        let all: Vec<_> = self.sessions.read().await.values().cloned().collect();

        let mut expired = Vec::new();
        for orchestrator in all {
            if let Some(snapshot) = orchestrator.expire_if_stale(checkout_ttl).await {
                expired.push(snapshot);
            }
        }

        let mut sessions = self.sessions.write().await;
        let mut dormant = Vec::new();
        for (user_id, orchestrator) in sessions.iter() {
            // A handler holding a clone may be about to use it.
            if Arc::strong_count(orchestrator) == 1 && orchestrator.is_dormant(checkout_ttl).await {
                dormant.push(user_id.clone());
            }
        }
        for user_id in &dormant {
            sessions.remove(user_id);
        }
        if !dormant.is_empty() {
            info!("Reclaimed {} idle checkout sessions", dormant.len());
        }

        expired
    }
}

/// Spawn-able loop that sweeps the registry until `shutdown` fires.
pub async fn run_sweeper(
    registry: Arc<SessionRegistry>,
    pool: SqlitePool,
    checkout_ttl: Duration,
    interval: Duration,
    shutdown: CancellationToken,
) {
    info!("Session sweeper starting, checkout ttl {}s", checkout_ttl.as_secs());

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Session sweeper stopping");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        for snapshot in registry.sweep(checkout_ttl).await {
            if let Err(e) = db::record_attempt(&pool, &snapshot).await {
                error!("Failed to record expired checkout: {e}");
            }
        }
    }
}
