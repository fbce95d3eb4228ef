use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

// Default knobs for queueing, retry, and media-similarity behavior.
pub const DEFAULT_MAX_WORKERS: usize = 50;
pub const DEFAULT_QUEUE_CAPACITY: usize = 50_000;
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 25;
pub const DEFAULT_RETRY_BASE_SECONDS: f64 = 0.3;
pub const DEFAULT_RETRY_CAP_SECONDS: f64 = 60.0;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_SIMILARITY_THRESHOLD: u32 = 5;
pub const DEFAULT_F_MAX: u32 = 5;
pub const DEFAULT_DRAIN_SECONDS: u64 = 15;

/// Top-level config (replicator.toml + REPLICATOR_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicatorConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub senders: SenderPoolConfig,
    #[serde(default)]
    pub images: ImageGuardConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl Default for ReplicatorConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            dispatcher: DispatcherConfig::default(),
            senders: SenderPoolConfig::default(),
            images: ImageGuardConfig::default(),
            admin: AdminConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_retry_base_seconds")]
    pub retry_base_seconds: f64,
    #[serde(default = "default_retry_cap_seconds")]
    pub retry_cap_seconds: f64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_drain_seconds")]
    pub drain_seconds: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            queue_capacity: default_queue_capacity(),
            retry_base_seconds: default_retry_base_seconds(),
            retry_cap_seconds: default_retry_cap_seconds(),
            max_attempts: default_max_attempts(),
            drain_seconds: default_drain_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderPoolConfig {
    #[serde(default = "default_f_max")]
    pub f_max: u32,
}

impl Default for SenderPoolConfig {
    fn default() -> Self {
        Self {
            f_max: default_f_max(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGuardConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: u32,
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,
    #[serde(default = "default_font_path")]
    pub watermark_font_path: String,
}

impl Default for ImageGuardConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_concurrent_downloads: default_max_concurrent_downloads(),
            watermark_font_path: default_font_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Principals allowed to invoke the admin command surface.
    #[serde(default)]
    pub admin_users: Vec<String>,
    /// Seed list for the global word block, loaded on first startup.
    #[serde(default)]
    pub global_blocked_words: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.replicator/replicator.db", home)
}
fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}
fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}
fn default_retry_base_seconds() -> f64 {
    DEFAULT_RETRY_BASE_SECONDS
}
fn default_retry_cap_seconds() -> f64 {
    DEFAULT_RETRY_CAP_SECONDS
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_drain_seconds() -> u64 {
    DEFAULT_DRAIN_SECONDS
}
fn default_f_max() -> u32 {
    DEFAULT_F_MAX
}
fn default_similarity_threshold() -> u32 {
    DEFAULT_SIMILARITY_THRESHOLD
}
fn default_max_concurrent_downloads() -> usize {
    DEFAULT_MAX_CONCURRENT_DOWNLOADS
}
fn default_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf".to_string()
}
fn default_port() -> u16 {
    8787
}
fn default_bind() -> String {
    "127.0.0.1".to_string()
}

impl ReplicatorConfig {
    /// Load config from a TOML file with REPLICATOR_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.replicator/replicator.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: ReplicatorConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("REPLICATOR_").split("_"))
            .extract()
            .map_err(|e| crate::error::ErrorKind::Permanent(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.replicator/replicator.toml", home)
}
