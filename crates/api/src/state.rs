use std::sync::Arc;

use clearwave_enhancer::EnhancerHandle;
use clearwave_worker::TaskDispatcher;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc` or is already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: clearwave_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Background executor for enhancement jobs.
    pub dispatcher: Arc<TaskDispatcher>,
    /// Process-wide model handle, reported on `/health`.
    pub enhancer: Arc<EnhancerHandle>,
}
