use std::{path::PathBuf, time::Duration};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 28015;
pub const DEFAULT_USER: &str = "admin";

pub const DEFAULT_DATABASE: &str = "test";
pub const DEFAULT_TABLE: &str = "geospatial";
pub const DEFAULT_INDEX: &str = "area";

/// Names of the database objects the demo works on. Passed to every store
/// call so tests can point the same steps at a different table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub database: String,
    pub table: String,
    pub index: String,
}

impl Schema {
    pub fn new(
        database: impl Into<String>,
        table: impl Into<String>,
        index: impl Into<String>,
    ) -> Self {
        Schema {
            database: database.into(),
            table: table.into(),
            index: index.into(),
        }
    }
}

impl Default for Schema {
    fn default() -> Self {
        Schema::new(DEFAULT_DATABASE, DEFAULT_TABLE, DEFAULT_INDEX)
    }
}

#[derive(Debug, Clone)]
pub struct ConnectOpts {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub connect_timeout: Duration,
}

impl ConnectOpts {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ConnectOpts {
    fn default() -> Self {
        ConnectOpts {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            user: DEFAULT_USER.to_string(),
            password: String::new(),
            connect_timeout: Duration::from_secs(20),
        }
    }
}

/// How long to wait for the store to catch up between steps.
#[derive(Debug, Clone, Copy)]
pub struct Readiness {
    /// Upper bound for any single readiness check.
    pub timeout: Duration,
    /// Pause between two polls of the row count.
    pub poll_interval: Duration,
    /// Extra fixed pause after every step. Zero by default.
    pub step_delay: Duration,
}

impl Default for Readiness {
    fn default() -> Self {
        Readiness {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
            step_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub schema: Schema,
    pub connect: ConnectOpts,
    pub readiness: Readiness,
    /// Where to write one CSV file per query mode, if anywhere.
    pub csv_dir: Option<PathBuf>,
}
