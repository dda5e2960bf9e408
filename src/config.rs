use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for Expense Desk
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExpenseDeskConfig {
    /// Where expense reports and tickets live
    pub store: StoreConfig,
    /// Optimistic-concurrency retry policy
    pub retry: RetryConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
    /// Static user → role table
    pub identity: IdentityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// JSON documents under `data_dir`
    Filesystem,
    /// Process-local; state is lost on exit
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Root directory for the filesystem backend
    pub data_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Total attempts of the read-decide-save cycle, including the first
    pub max_attempts: u32,
    /// Base delay between attempts in milliseconds
    pub base_delay_ms: u64,
    /// Upper bound for a single delay in milliseconds
    pub max_delay_ms: u64,
    /// Randomize delays to spread out competing writers
    pub jitter: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable output
    pub json_logs: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IdentityConfig {
    /// Role for users not listed in `users`
    pub default_role: Option<String>,
    /// User id → role name (assistant, supervisor, accounting, employee)
    #[serde(default)]
    pub users: HashMap<String, String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 50,
            max_delay_ms: 2_000,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for ExpenseDeskConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                backend: StoreBackend::Filesystem,
                data_dir: ".expense-desk/data".to_string(),
            },
            retry: RetryConfig::default(),
            observability: ObservabilityConfig {
                log_level: "warn".to_string(),
                json_logs: false,
            },
            identity: IdentityConfig::default(),
        }
    }
}

impl ExpenseDeskConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (expense-desk.toml, .expense-desk-rc), or the
    ///    explicit `path` when given
    /// 3. Environment variables (prefixed with EXPENSE_DESK_, nested keys
    ///    separated by `__`)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path).required(true));
            }
            None => {
                if Path::new("expense-desk.toml").exists() {
                    builder = builder.add_source(File::with_name("expense-desk"));
                }

                if Path::new(".expense-desk-rc").exists() {
                    builder = builder
                        .add_source(File::new(".expense-desk-rc", config::FileFormat::Toml));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("EXPENSE_DESK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
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
