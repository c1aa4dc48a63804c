//! Service configuration: command-line flags with environment fallbacks.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "HTTP service for lunar PSR image analysis")]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(short = 'b', long, env = "PSR_BIND", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    /// Directory holding the on-disk copy of uploaded images.
    #[arg(long, env = "UPLOAD_FOLDER", default_value = "uploads")]
    pub upload_folder: PathBuf,

    /// Largest accepted request body, in megabytes.
    #[arg(long, env = "MAX_UPLOAD_SIZE_MB", default_value_t = 10)]
    pub max_upload_size_mb: u64,

    /// Uploads older than this are purged.
    #[arg(
        long,
        env = "UPLOAD_TTL_SECONDS",
        default_value_t = 86_400,
        long_help = "Retention window for uploads. Expired uploads are removed \
                     from memory and disk before each request is handled."
    )]
    pub upload_ttl_seconds: u64,
}

impl ServerConfig {
    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_size_mb as usize).saturating_mul(1024 * 1024)
    }
}
