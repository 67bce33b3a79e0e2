use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub accounts: AccountsConfig,

    pub research: ResearchConfig,

    pub bulk: BulkConfig,

    pub mail: MailConfig,

    pub security: SecurityConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Emit JSON log lines instead of the human readable format
    pub json_logs: bool,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/capaccess.db".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    /// Absolute base URL used for links in outgoing email.
    pub public_url: String,

    /// Whether to set the Secure flag on session cookies.
    /// Default: true for production safety. Set to false for local development without HTTPS.
    pub secure_cookies: bool,

    /// Session inactivity expiry in minutes.
    pub session_expiry_minutes: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            public_url: "https://case.law".to_string(),
            secure_cookies: true,
            session_expiry_minutes: 60 * 24 * 14,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    /// Restricted cases a verified user may view per day.
    pub daily_case_allowance: i32,

    /// Lifetime of an email verification link.
    pub verification_nonce_hours: i64,

    pub min_password_length: usize,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            daily_case_allowance: 500,
            verification_nonce_hours: 72,
            min_password_length: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Email domain that qualifies for the Harvard research agreement.
    pub harvard_domain: String,

    /// How long unlimited access lasts once a contract is approved.
    pub access_duration_days: i64,

    /// Where approval requests go when no user holds the approver role.
    pub approver_fallback_email: String,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            harvard_domain: "harvard.edu".to_string(),
            access_duration_days: 365,
            approver_fallback_email: "info@case.law".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    /// Directory holding export zip files; `case_exports.file_path` is relative to it.
    pub exports_root: String,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            exports_root: "./bulk_exports".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailBackend {
    /// Keep messages in memory (development and tests).
    Memory,
    /// Write each message to `spool_path` as a text file.
    File,
    /// Only log that a message was sent.
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub backend: MailBackend,

    pub from_address: String,

    pub spool_path: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            backend: MailBackend::File,
            from_address: "noreply@case.law".to_string(),
            spool_path: "./data/mail".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "capaccess".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            accounts: AccountsConfig::default(),
            research: ResearchConfig::default(),
            bulk: BulkConfig::default(),
            mail: MailConfig::default(),
            security: SecurityConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        if let Ok(explicit) = std::env::var("CAPACCESS_CONFIG") {
            paths.push(PathBuf::from(explicit));
        }

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("capaccess").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".capaccess").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.server.public_url)
            .with_context(|| format!("Invalid public_url: {}", self.server.public_url))?;
        if url.cannot_be_a_base() {
            anyhow::bail!("public_url must be an absolute http(s) URL");
        }

        if self.accounts.daily_case_allowance < 0 {
            anyhow::bail!("daily_case_allowance cannot be negative");
        }

        if self.accounts.verification_nonce_hours <= 0 {
            anyhow::bail!("verification_nonce_hours must be > 0");
        }

        if self.research.access_duration_days <= 0 {
            anyhow::bail!("access_duration_days must be > 0");
        }

        Ok(())
    }

    /// Public URL without a trailing slash, for building absolute links.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.server.public_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.accounts.daily_case_allowance, 500);
        assert_eq!(config.accounts.min_password_length, 8);
        assert_eq!(config.research.access_duration_days, 365);
        assert_eq!(config.mail.backend, MailBackend::File);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[accounts]"));
        assert!(toml_str.contains("[research]"));
        assert!(toml_str.contains("backend = \"file\""));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [accounts]
            daily_case_allowance = 10

            [mail]
            backend = "memory"
            "#,
        )
        .unwrap();
        assert_eq!(config.accounts.daily_case_allowance, 10);
        assert_eq!(config.accounts.verification_nonce_hours, 72);
        assert_eq!(config.mail.backend, MailBackend::Memory);
        assert_eq!(config.server.public_url, "https://case.law");
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = Config::default();
        config.server.public_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_base_url_trims_slash() {
        let mut config = Config::default();
        config.server.public_url = "http://localhost:8000/".to_string();
        assert_eq!(config.base_url(), "http://localhost:8000");
    }
}
