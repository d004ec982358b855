use serde::{Deserialize, Serialize};
use tracing::{info, error};

/// Client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Base URL of the presence WebSocket endpoint
    #[serde(default = "default_ws_base_url")]
    pub ws_base_url: String,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Delay before the first connect attempt, absorbs mount/unmount churn
    #[serde(default = "default_connect_delay_ms")]
    pub connect_delay_ms: u64,

    /// Interval between outbound heartbeat frames
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Initial reconnect delay, doubled per attempt
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,

    /// Upper bound on the reconnect delay
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,

    /// Quiet period after the last edit before an autosave flush fires
    #[serde(default = "default_autosave_window_secs")]
    pub autosave_window_secs: u64,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            // Fallback to .env file
            dotenvy::dotenv().ok();
        }

        // Load from environment variables using envy
        match envy::from_env::<Config>() {
            Ok(config) => {
                info!("✅ Configuration loaded successfully");
                Ok(config)
            }
            Err(e) => {
                error!("❌ Failed to load configuration: {}", e);
                Err(ConfigError::EnvError(e))
            }
        }
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "dev" || self.environment.to_lowercase() == "development"
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "prod" || self.environment.to_lowercase() == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ws_base_url: default_ws_base_url(),
            environment: default_environment(),
            log_level: default_log_level(),
            connect_delay_ms: default_connect_delay_ms(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            autosave_window_secs: default_autosave_window_secs(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    EnvError(envy::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::EnvError(e) => write!(f, "Environment variable error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

// Default value functions
fn default_ws_base_url() -> String {
    "ws://localhost:3001".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_connect_delay_ms() -> u64 {
    250
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_reconnect_base_delay_ms() -> u64 {
    2000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30000
}

fn default_autosave_window_secs() -> u64 {
    120
}
