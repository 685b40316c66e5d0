//! Configuration for termfleet-daemon

use crate::error::{DaemonError, DaemonResult};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use termfleet_health::HttpProberConfig;
use termfleet_types::GracePeriods;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// DNS configuration
    #[serde(default)]
    pub dns: DnsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: true,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (for development/testing)
    #[default]
    Memory,

    /// SQLite storage
    Sqlite {
        /// Database file path
        path: String,

        /// Maximum connections in pool
        #[serde(default = "default_pool_size")]
        max_connections: u32,
    },
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Time between reconciliation ticks in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Per-probe timeout in milliseconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,

    /// Maximum probes in flight during a tick
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_probes: usize,

    /// Delete the DNS record of pruned workstations
    #[serde(default)]
    pub release_dns_on_prune: bool,

    /// Lifecycle grace periods
    #[serde(default)]
    pub grace: GraceConfig,

    /// HTTP probe settings
    #[serde(default)]
    pub probe: HttpProberConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            probe_timeout_ms: default_probe_timeout(),
            max_concurrent_probes: default_max_concurrent(),
            release_dns_on_prune: false,
            grace: GraceConfig::default(),
            probe: HttpProberConfig::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

// chrono::Duration::seconds panics above i64::MAX / 1000.
const MAX_GRACE_SECS: u64 = (i64::MAX / 1000) as u64;

/// Grace periods in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraceConfig {
    #[serde(default = "default_starting_grace")]
    pub starting_secs: u64,

    #[serde(default = "default_online_silence_grace")]
    pub online_silence_secs: u64,

    #[serde(default = "default_unknown_grace")]
    pub unknown_secs: u64,

    #[serde(default = "default_prune_after")]
    pub prune_after_secs: u64,
}

impl Default for GraceConfig {
    fn default() -> Self {
        Self {
            starting_secs: default_starting_grace(),
            online_silence_secs: default_online_silence_grace(),
            unknown_secs: default_unknown_grace(),
            prune_after_secs: default_prune_after(),
        }
    }
}

impl GraceConfig {
    /// Convert to the lifecycle representation
    pub fn periods(&self) -> GracePeriods {
        let secs = |s: u64| chrono::Duration::seconds(s.min(MAX_GRACE_SECS) as i64);
        GracePeriods {
            starting: secs(self.starting_secs),
            online_silence: secs(self.online_silence_secs),
            unknown: secs(self.unknown_secs),
            prune_after: secs(self.prune_after_secs),
        }
    }
}

/// DNS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Zone under which workstation subdomains are created
    #[serde(default)]
    pub base_domain: String,

    /// A record TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_secs: u32,

    /// Record provider
    #[serde(default)]
    pub provider: DnsProviderConfig,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            base_domain: String::new(),
            ttl_secs: default_ttl(),
            provider: DnsProviderConfig::default(),
        }
    }
}

/// DNS provider selection
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DnsProviderConfig {
    /// Records kept in process (for development/testing)
    #[default]
    Memory,

    /// Spaceship DNS REST API
    Spaceship {
        #[serde(default)]
        api_key: String,

        #[serde(default)]
        api_secret: String,

        #[serde(default = "default_spaceship_api")]
        api_base: String,
    },
}

impl std::fmt::Debug for DnsProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DnsProviderConfig::Memory => f.write_str("Memory"),
            DnsProviderConfig::Spaceship { api_base, .. } => f
                .debug_struct("Spaceship")
                .field("api_key", &"<redacted>")
                .field("api_secret", &"<redacted>")
                .field("api_base", api_base)
                .finish(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn default_pool_size() -> u32 {
    5
}

fn default_tick_interval() -> u64 {
    20_000
}

fn default_probe_timeout() -> u64 {
    10_000
}

fn default_max_concurrent() -> usize {
    32
}

fn default_starting_grace() -> u64 {
    10 * 60
}

fn default_online_silence_grace() -> u64 {
    60
}

fn default_unknown_grace() -> u64 {
    10 * 60
}

fn default_prune_after() -> u64 {
    50 * 60
}

fn default_ttl() -> u32 {
    600
}

fn default_spaceship_api() -> String {
    "https://spaceship.dev/api/v1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `TERMFLEET__SECTION__KEY` environment variables
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("TERMFLEET")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Reject configurations the daemon cannot run with
    pub fn validate(&self) -> DaemonResult<()> {
        let base_domain = self.dns.base_domain.trim();
        if base_domain.is_empty() {
            return Err(DaemonError::Config("dns.base_domain is required".to_string()));
        }
        if base_domain.starts_with('.') || base_domain.ends_with('.') || base_domain.contains('/')
        {
            return Err(DaemonError::Config(format!(
                "dns.base_domain is not a valid domain: {}",
                base_domain
            )));
        }
        if self.dns.ttl_secs == 0 {
            return Err(DaemonError::Config("dns.ttl_secs must be positive".to_string()));
        }
        if self.scheduler.tick_interval_ms == 0 {
            return Err(DaemonError::Config(
                "scheduler.tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.scheduler.probe_timeout_ms == 0 {
            return Err(DaemonError::Config(
                "scheduler.probe_timeout_ms must be positive".to_string(),
            ));
        }
        if self.scheduler.max_concurrent_probes == 0 {
            return Err(DaemonError::Config(
                "scheduler.max_concurrent_probes must be positive".to_string(),
            ));
        }
        if let DnsProviderConfig::Spaceship {
            api_key,
            api_secret,
            ..
        } = &self.dns.provider
        {
            if api_key.is_empty() || api_secret.is_empty() {
                return Err(DaemonError::Config(
                    "dns.provider.api_key and dns.provider.api_secret are required for spaceship"
                        .to_string(),
                ));
            }
        }
        if let StorageConfig::Sqlite { path, .. } = &self.storage {
            if path.is_empty() {
                return Err(DaemonError::Config("storage.path is required for sqlite".to_string()));
            }
        }
        Ok(())
    }

    /// Create a development configuration
    pub fn development(base_domain: impl Into<String>) -> Self {
        Self {
            dns: DnsConfig {
                base_domain: base_domain.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
