use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::warn;

use crate::model::settings::{DEFAULT_EXPIRY_DAYS, MAX_EXPIRY_DAYS, MIN_EXPIRY_DAYS};

/// Configuration for the governance service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// External ML and workflow services
    pub collaborators: CollaboratorConfig,
    /// Governance rule thresholds
    pub governance: GovernanceTunables,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Require HTTPS for outbound collaborator calls
    pub require_https: bool,
    /// Requests allowed per window on trigger endpoints
    pub rate_limit_requests: u32,
    /// Rate limit window length in seconds
    pub rate_limit_window_secs: u64,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
    /// Bearer secret for scheduled sweep endpoints
    pub cron_secret: String,
    /// Shared HMAC secret for workflow webhooks
    pub webhook_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub postgres_url: String,
    /// Enable PostgreSQL (if false, uses the in-memory store)
    pub postgres_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Mask secrets in log output
    pub sanitize_logs: bool,
    /// Log every HTTP request
    pub log_requests: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorConfig {
    /// ML scoring service base URL; empty disables remote scoring
    pub ml_base_url: String,
    pub ml_timeout_secs: u64,
    /// How long the circuit stays open after a failed ML call
    pub ml_circuit_open_secs: u64,
    /// Workflow automation webhook URL; empty disables dispatch
    pub workflow_webhook_url: String,
    pub workflow_timeout_secs: u64,
}

impl CollaboratorConfig {
    pub fn ml_timeout(&self) -> Duration {
        Duration::from_secs(self.ml_timeout_secs)
    }

    pub fn ml_circuit_open(&self) -> Duration {
        Duration::from_secs(self.ml_circuit_open_secs)
    }
}

/// Thresholds for the governance rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GovernanceTunables {
    /// Expiry window used when no `expiry_days` row is stored
    pub default_expiry_days: u32,
    /// Trailing window for the no-spam rule
    pub window_days: u32,
    /// Attempts allowed in the window without a booking
    pub max_attempts_without_booking: u64,
    /// Pool supply below which a demand segment is a gap
    pub gap_threshold: usize,
    /// Experts released per expiry sweep
    pub expiry_batch_limit: usize,
    pub audit_max_limit: usize,
    pub bulk_reclaim_max: usize,
}

impl Default for GovernanceTunables {
    fn default() -> Self {
        Self {
            default_expiry_days: DEFAULT_EXPIRY_DAYS,
            window_days: 7,
            max_attempts_without_booking: 3,
            gap_threshold: 5,
            expiry_batch_limit: 500,
            audit_max_limit: 500,
            bulk_reclaim_max: 500,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            postgres_url: "postgresql://localhost:5432/expert_governance".to_string(),
            postgres_enabled: false,
        }
    }
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8780,
            },
            security: SecurityConfig {
                require_https: true,
                rate_limit_requests: 20,
                rate_limit_window_secs: 60,
                max_request_size: 1024 * 1024, // 1MB
                cron_secret: String::new(),
                webhook_secret: String::new(),
            },
            database: DatabaseConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                sanitize_logs: true,
                log_requests: false,
            },
            collaborators: CollaboratorConfig {
                ml_base_url: String::new(),
                ml_timeout_secs: 10,
                ml_circuit_open_secs: 30,
                workflow_webhook_url: String::new(),
                workflow_timeout_secs: 15,
            },
            governance: GovernanceTunables::default(),
        }
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => Ok(Some(
            raw.parse()
                .with_context(|| format!("Invalid {} value", name))?,
        )),
        Err(_) => Ok(None),
    }
}

impl GovernanceConfig {
    /// Load configuration from environment variables and validate it
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Server configuration
        if let Ok(host) = env::var("EXPERT_GOV_HOST") {
            config.server.host = host;
        }
        if let Some(port) = parse_var("EXPERT_GOV_PORT")? {
            config.server.port = port;
        }

        // Security configuration
        if let Some(require_https) = parse_var("EXPERT_GOV_REQUIRE_HTTPS")? {
            config.security.require_https = require_https;
        }
        if let Some(requests) = parse_var("EXPERT_GOV_RATE_LIMIT_REQUESTS")? {
            config.security.rate_limit_requests = requests;
        }
        if let Some(secs) = parse_var("EXPERT_GOV_RATE_LIMIT_WINDOW_SECS")? {
            config.security.rate_limit_window_secs = secs;
        }
        if let Some(size) = parse_var("EXPERT_GOV_MAX_REQUEST_SIZE")? {
            config.security.max_request_size = size;
        }
        config.security.cron_secret = env::var("EXPERT_GOV_CRON_SECRET").unwrap_or_else(|_| {
            warn!("EXPERT_GOV_CRON_SECRET not set, scheduled sweep endpoints are disabled");
            String::new()
        });
        config.security.webhook_secret =
            env::var("EXPERT_GOV_WEBHOOK_SECRET").unwrap_or_else(|_| {
                warn!("EXPERT_GOV_WEBHOOK_SECRET not set, workflow callbacks will be rejected");
                String::new()
            });

        // Database configuration
        if let Ok(url) = env::var("EXPERT_GOV_POSTGRES_URL") {
            config.database.postgres_url = url;
        }
        if let Some(enabled) = parse_var("EXPERT_GOV_POSTGRES_ENABLED")? {
            config.database.postgres_enabled = enabled;
        }

        // Logging configuration
        if let Ok(level) = env::var("EXPERT_GOV_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(sanitize_logs) = parse_var("EXPERT_GOV_SANITIZE_LOGS")? {
            config.logging.sanitize_logs = sanitize_logs;
        }
        if let Some(log_requests) = parse_var("EXPERT_GOV_LOG_REQUESTS")? {
            config.logging.log_requests = log_requests;
        }

        // Collaborators
        if let Ok(url) = env::var("EXPERT_GOV_ML_URL") {
            config.collaborators.ml_base_url = url;
        }
        if let Some(secs) = parse_var("EXPERT_GOV_ML_TIMEOUT_SECS")? {
            config.collaborators.ml_timeout_secs = secs;
        }
        if let Some(secs) = parse_var("EXPERT_GOV_ML_CIRCUIT_OPEN_SECS")? {
            config.collaborators.ml_circuit_open_secs = secs;
        }
        if let Ok(url) = env::var("EXPERT_GOV_WORKFLOW_WEBHOOK_URL") {
            config.collaborators.workflow_webhook_url = url;
        }

        // Governance thresholds
        if let Some(days) = parse_var("EXPERT_GOV_DEFAULT_EXPIRY_DAYS")? {
            config.governance.default_expiry_days = days;
        }
        if let Some(days) = parse_var("EXPERT_GOV_NO_SPAM_WINDOW_DAYS")? {
            config.governance.window_days = days;
        }
        if let Some(attempts) = parse_var("EXPERT_GOV_NO_SPAM_MAX_ATTEMPTS")? {
            config.governance.max_attempts_without_booking = attempts;
        }
        if let Some(threshold) = parse_var("EXPERT_GOV_GAP_THRESHOLD")? {
            config.governance.gap_threshold = threshold;
        }
        if let Some(limit) = parse_var("EXPERT_GOV_EXPIRY_BATCH_LIMIT")? {
            config.governance.expiry_batch_limit = limit;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for security and consistency
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(anyhow::anyhow!("Server host cannot be empty"));
        }
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port must be non-zero"));
        }

        if self.security.rate_limit_requests == 0 || self.security.rate_limit_window_secs == 0 {
            return Err(anyhow::anyhow!("Rate limit and window must be non-zero"));
        }

        if self.security.require_https {
            for (name, url) in [
                ("ML", &self.collaborators.ml_base_url),
                ("workflow webhook", &self.collaborators.workflow_webhook_url),
            ] {
                if !url.is_empty() && !url.starts_with("https://") {
                    return Err(anyhow::anyhow!(
                        "HTTPS is required but {} URL is not HTTPS: {}",
                        name,
                        url
                    ));
                }
            }
        }

        let days = i64::from(self.governance.default_expiry_days);
        if !(MIN_EXPIRY_DAYS..=MAX_EXPIRY_DAYS).contains(&days) {
            return Err(anyhow::anyhow!(
                "Default expiry days must be between {} and {}",
                MIN_EXPIRY_DAYS,
                MAX_EXPIRY_DAYS
            ));
        }
        if self.governance.window_days == 0 {
            return Err(anyhow::anyhow!("No-spam window must be at least one day"));
        }
        if self.governance.expiry_batch_limit == 0
            || self.governance.audit_max_limit == 0
            || self.governance.bulk_reclaim_max == 0
        {
            return Err(anyhow::anyhow!("Batch limits must be non-zero"));
        }

        if !self.security.webhook_secret.is_empty() && self.security.webhook_secret.len() < 16 {
            return Err(anyhow::anyhow!(
                "Webhook secret is too short (minimum 16 characters)"
            ));
        }

        Ok(())
    }
}

/// Sanitize sensitive data for logging
pub fn sanitize_for_logging(data: &str) -> String {
    let sensitive_patterns = [
        "authorization",
        "bearer",
        "token",
        "password",
        "secret",
        "signature",
        "credential",
        "api_key",
        "apikey",
    ];

    let data_lower = data.to_lowercase();
    for pattern in &sensitive_patterns {
        if data_lower.contains(pattern) {
            let chars: Vec<char> = data.chars().collect();
            let keep = if chars.len() > 20 { 6 } else { 2 };
            let head: String = chars.iter().take(keep.min(chars.len())).collect();
            let tail: String = chars[chars.len().saturating_sub(keep)..].iter().collect();
            return format!("{}***{}", head, tail);
        }
    }

    data.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_for_logging() {
        assert_eq!(sanitize_for_logging("my_secret_value_1234"), "my***34");
        assert_eq!(sanitize_for_logging("Bearer abcdefghijklmnopqrstuv"), "Bearer***qrstuv");
        assert_eq!(sanitize_for_logging("expert_e1"), "expert_e1");
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = GovernanceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.governance.gap_threshold, 5);
        assert_eq!(config.governance.window_days, 7);
        assert_eq!(config.security.rate_limit_requests, 20);
        assert_eq!(config.collaborators.ml_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_config_rejects_plain_http_collaborator() {
        let mut config = GovernanceConfig::default();
        config.collaborators.ml_base_url = "http://ml.internal".to_string();
        assert!(config.validate().is_err());

        config.security.require_https = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_out_of_range_expiry() {
        let mut config = GovernanceConfig::default();
        config.governance.default_expiry_days = 91;
        assert!(config.validate().is_err());
    }
}
