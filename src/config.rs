//! Configuration for FUQLdb
//!
//! Centralized configuration with sensible defaults, plus loading from the
//! on-disk config file written by `--init`.
//!
//! ## Config File Format
//! ```text
//! database_storage_path="/var/lib/fuqldb"
//! database_name="main"
//! sex_number=69
//! ```
//! The file is TOML; only the first two keys are required.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{FuqlError, Result};

/// Main configuration for a FUQLdb instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding one `<name>.db` snapshot per database
    pub storage_path: PathBuf,

    /// Name recorded by `--init`
    ///
    /// Informational only: it is checked for presence and logged at
    /// startup, but databases are still created by clients.
    pub database_name: String,

    /// Arbitrary integer recorded by `--init`
    pub sex_number: i64,

    // -------------------------------------------------------------------------
    // Autosave Configuration
    // -------------------------------------------------------------------------
    /// A database is saved once its last save is older than this
    pub autosave_interval: Duration,

    /// How often the dispatcher checks for databases to save
    pub autosave_tick: Duration,

    // -------------------------------------------------------------------------
    // Dispatcher Configuration
    // -------------------------------------------------------------------------
    /// Capacity of the shared demand queue
    pub queue_capacity: usize,

    /// Deadline for enqueueing a demand and for receiving its reply
    pub request_timeout: Duration,

    // -------------------------------------------------------------------------
    // Session Configuration
    // -------------------------------------------------------------------------
    /// Sessions idle for longer than this are evicted (None = never)
    pub session_idle_timeout: Option<Duration>,

    /// Maximum number of live sessions before LRU eviction
    pub max_sessions: usize,

    // -------------------------------------------------------------------------
    // Catalog Bootstrap
    // -------------------------------------------------------------------------
    /// Admin account seeded when the catalog database has to be created
    pub bootstrap_admin: Option<(String, String)>,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./fuqldb_data"),
            database_name: "main".to_string(),
            sex_number: 0,
            autosave_interval: Duration::from_secs(60),
            autosave_tick: Duration::from_secs(30),
            queue_capacity: 1000,
            request_timeout: Duration::from_secs(30),
            session_idle_timeout: Some(Duration::from_secs(30 * 60)),
            max_sessions: 10_000,
            bootstrap_admin: None,
            listen_addr: "127.0.0.1:8008".to_string(),
            max_connections: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
        }
    }
}

/// Raw shape of the config file
#[derive(Debug, Deserialize)]
struct ConfigFile {
    database_storage_path: Option<String>,
    database_name: Option<String>,
    sex_number: Option<i64>,
    listen_addr: Option<String>,
    autosave_interval_secs: Option<u64>,
    autosave_tick_secs: Option<u64>,
    queue_capacity: Option<usize>,
    request_timeout_secs: Option<u64>,
    session_idle_secs: Option<u64>,
    max_sessions: Option<usize>,
    max_connections: Option<usize>,
    admin_user: Option<String>,
    admin_password: Option<String>,
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Platform location of the config file
    pub fn default_path() -> PathBuf {
        if cfg!(windows) {
            PathBuf::from(r"C:\fuqldb\config.conf")
        } else {
            PathBuf::from("/etc/fuqldb/config.conf")
        }
    }

    /// Load a config file
    ///
    /// Fails if the file cannot be read, is not valid TOML, or lacks
    /// `database_storage_path` / `database_name`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            FuqlError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Parse config file contents
    pub fn from_toml(text: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| FuqlError::Config(e.to_string()))?;

        let storage_path = file.database_storage_path.ok_or_else(|| {
            FuqlError::Config("config file is missing database_storage_path key".to_string())
        })?;
        let database_name = file.database_name.ok_or_else(|| {
            FuqlError::Config("config file is missing database_name key".to_string())
        })?;

        let mut builder = Config::builder()
            .storage_path(storage_path)
            .database_name(database_name);

        if let Some(n) = file.sex_number {
            builder = builder.sex_number(n);
        }
        if let Some(addr) = file.listen_addr {
            builder = builder.listen_addr(addr);
        }
        if let Some(secs) = file.autosave_interval_secs {
            builder = builder.autosave_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = file.autosave_tick_secs {
            builder = builder.autosave_tick(Duration::from_secs(secs));
        }
        if let Some(capacity) = file.queue_capacity {
            builder = builder.queue_capacity(capacity);
        }
        if let Some(secs) = file.request_timeout_secs {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = file.session_idle_secs {
            let timeout = (secs > 0).then(|| Duration::from_secs(secs));
            builder = builder.session_idle_timeout(timeout);
        }
        if let Some(count) = file.max_sessions {
            builder = builder.max_sessions(count);
        }
        if let Some(count) = file.max_connections {
            builder = builder.max_connections(count);
        }
        match (file.admin_user, file.admin_password) {
            (Some(user), Some(password)) => builder = builder.bootstrap_admin(user, password),
            (None, None) => {}
            _ => {
                return Err(FuqlError::Config(
                    "admin_user and admin_password must be set together".to_string(),
                ))
            }
        }

        Ok(builder.build())
    }

    /// Write the file produced by `--init`
    pub fn write_init_file(
        path: &Path,
        database_name: &str,
        storage_path: &str,
        sex_number: i64,
    ) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let contents = format!(
            "database_storage_path={}\ndatabase_name={}\nsex_number={}\n",
            toml_string(storage_path),
            toml_string(database_name),
            sex_number
        );
        fs::write(path, contents)?;
        Ok(())
    }
}

/// Quote a string as a TOML basic string
fn toml_string(s: &str) -> String {
    toml::Value::String(s.to_string()).to_string()
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the storage directory
    pub fn storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage_path = path.into();
        self
    }

    pub fn database_name(mut self, name: impl Into<String>) -> Self {
        self.config.database_name = name.into();
        self
    }

    pub fn sex_number(mut self, n: i64) -> Self {
        self.config.sex_number = n;
        self
    }

    /// Set the age after which a database is autosaved
    pub fn autosave_interval(mut self, interval: Duration) -> Self {
        self.config.autosave_interval = interval;
        self
    }

    /// Set how often the autosave check runs
    pub fn autosave_tick(mut self, tick: Duration) -> Self {
        self.config.autosave_tick = tick;
        self
    }

    /// Set the demand queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Set the per-request deadline
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the session idle timeout
    pub fn session_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.session_idle_timeout = timeout;
        self
    }

    /// Set the maximum number of live sessions
    pub fn max_sessions(mut self, count: usize) -> Self {
        self.config.max_sessions = count;
        self
    }

    /// Seed an admin user when the catalog is created
    pub fn bootstrap_admin(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.bootstrap_admin = Some((user.into(), password.into()));
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
