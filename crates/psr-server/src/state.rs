use std::sync::Arc;

use chrono::Duration;

use crate::config::ServerConfig;
use crate::store::{CachedImageStore, DiskImageStore, ImageStore, Result};

/// Shared handler state.
pub struct AppState {
    pub store: Arc<dyn ImageStore>,
    pub ttl: Duration,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Memory cache over the upload folder named in `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        // Clamped to the largest span `Duration` can hold.
        let secs = config.upload_ttl_seconds.min((i64::MAX / 1000) as u64) as i64;
        let ttl = Duration::seconds(secs);
        let disk = DiskImageStore::open(&config.upload_folder, ttl)?;
        Ok(Self {
            store: Arc::new(CachedImageStore::new(disk)),
            ttl,
            max_upload_bytes: config.max_upload_bytes(),
        })
    }
}
