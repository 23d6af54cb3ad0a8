use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::access::Role;

/// Main configuration structure for the dashboard remarks service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DashboardConfig {
    /// Stage labels and terminal designations
    pub workflow: WorkflowConfig,
    /// Where business records come from
    pub source: SourceConfig,
    /// Remark persistence
    pub storage: StorageConfig,
    /// HTTP API settings
    pub server: ServerConfig,
    /// Known actors, their roles and API tokens
    pub access: AccessConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Exactly eight ordered stage labels
    pub stages: Vec<String>,
    /// Labels locked against further transitions without override
    pub terminal_stages: Vec<String>,
    /// Maximum remark text length in characters
    pub max_text_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Local,
    GoogleSheets,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// JSON table file used by the local source
    pub local_path: PathBuf,
    /// Sharing URL of the Google Sheet
    pub sheet_url: String,
    /// Sheets API key (can be set via env var)
    pub api_key: Option<String>,
    /// A1 range to read, defaults to the whole first sheet
    pub range: String,
    /// How long a loaded table is reused before refetching
    pub cache_ttl_seconds: u64,
    /// Sheets API request budget
    pub requests_per_minute: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    File,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Remark document used by the file backend
    pub file_path: PathBuf,
    /// SQLite connection string used by the sqlite backend
    pub database_url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub bind_address: SocketAddr,
    /// Rows returned by the data endpoint when no limit is given
    pub default_limit: usize,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub actors: Vec<ActorConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActorConfig {
    pub name: String,
    pub role: Role,
    /// Bearer token; an empty token disables API login for this actor
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            stages: [
                "NEW",
                "CONTACTED",
                "QUALIFIED",
                "PROPOSAL_SENT",
                "NEGOTIATION",
                "WON",
                "LOST",
                "CLOSED",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            terminal_stages: vec!["WON".to_string(), "LOST".to_string()],
            max_text_len: crate::workflows::DEFAULT_MAX_TEXT_LEN,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Local,
            local_path: PathBuf::from("data/records.json"),
            sheet_url: String::new(),
            api_key: None,
            range: "A1:ZZ".to_string(),
            cache_ttl_seconds: 60,
            requests_per_minute: 60,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            file_path: PathBuf::from(".dashboard-remarks/remarks.json"),
            database_url: "sqlite://.dashboard-remarks/remarks.db".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
            default_limit: 100,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            workflow: WorkflowConfig::default(),
            source: SourceConfig::default(),
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
            access: AccessConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (dashboard-remarks.toml, .dashboard-remarks-rc)
    ///    or an explicit file passed on the command line
    /// 3. Environment variables (prefixed with DASHBOARD_REMARKS_, `__` between levels)
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        match explicit {
            Some(path) => {
                builder = builder.add_source(File::from(path));
            }
            None => {
                if Path::new("dashboard-remarks.toml").exists() {
                    builder = builder.add_source(File::with_name("dashboard-remarks"));
                }
                if Path::new(".dashboard-remarks-rc").exists() {
                    builder = builder.add_source(
                        File::with_name(".dashboard-remarks-rc").format(config::FileFormat::Toml),
                    );
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("DASHBOARD_REMARKS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut dashboard_config: DashboardConfig = builder.build()?.try_deserialize()?;

        // Special handling for the Sheets API key - accept the conventional name too
        if dashboard_config.source.api_key.is_none() {
            if let Ok(key) = std::env::var("GOOGLE_SHEETS_API_KEY") {
                dashboard_config.source.api_key = Some(key);
            }
        }

        Ok(dashboard_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}
