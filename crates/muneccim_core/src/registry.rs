//! crates/muneccim_core/src/registry.rs
//!
//! One live workspace per signed-in user, loaded on first use and dropped on sign-out
//! or after it has gone unused for a while.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::ServiceContext;
use crate::domain::User;
use crate::flows::{load_workspace, WorkspaceHandle};
use crate::ports::PortResult;
use crate::session::{SessionEvent, SessionEvents};

struct Entry {
    handle: WorkspaceHandle,
    last_used: Instant,
}

pub struct WorkspaceRegistry {
    ctx: ServiceContext,
    workspaces: RwLock<HashMap<Uuid, Entry>>,
}

impl WorkspaceRegistry {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            ctx,
            workspaces: RwLock::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    /// Looks a workspace up without counting as a use.
    pub async fn get(&self, user_id: Uuid) -> Option<WorkspaceHandle> {
        self.workspaces
            .read()
            .await
            .get(&user_id)
            .map(|entry| entry.handle.clone())
    }

    pub async fn get_or_load(&self, user: &User) -> PortResult<WorkspaceHandle> {
        if let Some(entry) = self.workspaces.write().await.get_mut(&user.user_id) {
            entry.last_used = Instant::now();
            return Ok(entry.handle.clone());
        }

        let loaded = load_workspace(&self.ctx, user.clone()).await?;
        // A concurrent request may have loaded it meanwhile; keep whichever landed first.
        let mut workspaces = self.workspaces.write().await;
        let entry = workspaces.entry(user.user_id).or_insert(Entry {
            handle: loaded,
            last_used: Instant::now(),
        });
        entry.last_used = Instant::now();
        Ok(entry.handle.clone())
    }

    pub async fn remove(&self, user_id: Uuid) -> bool {
        self.workspaces.write().await.remove(&user_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.workspaces.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops workspaces unused for at least `max_idle`. Workspaces with an operation in
    /// flight are kept until a later sweep. Returns how many were dropped.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut workspaces = self.workspaces.write().await;
        let before = workspaces.len();
        workspaces.retain(|user_id, entry| {
            let idle = now.saturating_duration_since(entry.last_used) >= max_idle;
            if idle && entry.handle.is_settled() {
                debug!("Evicting idle workspace for {}", user_id);
                return false;
            }
            true
        });
        before - workspaces.len()
    }

    /// Sweeps idle workspaces every `every`. Runs for the life of the process.
    pub fn evict_idle_every(self: Arc<Self>, max_idle: Duration, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = self.evict_idle(max_idle).await;
                if evicted > 0 {
                    info!("Evicted {} idle workspaces", evicted);
                }
            }
        })
    }

    /// Drops a user's workspace whenever they sign out. Runs until the event channel closes.
    pub fn evict_on_sign_out(self: Arc<Self>, events: &SessionEvents) -> JoinHandle<()> {
        let mut rx = events.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(SessionEvent::SignedOut { user_id }) => {
                        if self.remove(user_id).await {
                            info!("Evicted workspace for {}", user_id);
                        }
                    }
                    Ok(SessionEvent::SignedIn(_)) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Session event listener lagged; skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
