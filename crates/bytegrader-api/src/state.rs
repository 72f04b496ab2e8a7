use std::sync::Arc;

use bytegrader_core::{Config, JobStore, Queue, RateLimiter, Registry, Workspace};

/// Shared resources threaded through every handler and middleware layer.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<JobStore>,
    pub queue: Arc<Queue>,
    pub registry: Registry,
    pub workspace: Workspace,
    pub rate_limiter: Arc<RateLimiter>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}
