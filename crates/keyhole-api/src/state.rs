use std::sync::Arc;

use keyhole_db::Database;
use keyhole_gateway::registry::Registry;

use crate::error::ApiError;
use crate::images::ImageHost;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub registry: Registry,
    pub jwt_secret: String,
    /// External image-hosting collaborator. `None` disables image sends.
    pub images: Option<ImageHost>,
}

impl AppStateInner {
    /// Run a blocking DB closure off the async runtime.
    pub async fn with_db<T, F>(self: &Arc<Self>, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || f(&state.db))
            .await
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("spawn_blocking join error: {e}")))?
            .map_err(ApiError::Internal)
    }
}
