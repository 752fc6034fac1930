use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub monitor: MonitorConfig,
    pub escalation: EscalationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub api_port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct MonitorConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub thread_timeout_ms: u64,
}

#[derive(Clone, Debug)]
pub struct EscalationConfig {
    pub webhook_url: Option<String>,
    pub auth_token: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub monitor_enabled: Option<bool>,
    pub monitor_interval_secs: Option<u64>,
    pub escalation_webhook_url: Option<String>,
    pub escalation_auth_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://inboxly.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                api_port: 8090,
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            monitor: MonitorConfig {
                enabled: true,
                interval_secs: 60,
                thread_timeout_ms: 2_000,
            },
            escalation: EscalationConfig { webhook_url: None, auth_token: None, timeout_secs: 10 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("inboxly.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(api_port) = server.api_port {
                self.server.api_port = api_port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(monitor) = patch.monitor {
            if let Some(enabled) = monitor.enabled {
                self.monitor.enabled = enabled;
            }
            if let Some(interval_secs) = monitor.interval_secs {
                self.monitor.interval_secs = interval_secs;
            }
            if let Some(thread_timeout_ms) = monitor.thread_timeout_ms {
                self.monitor.thread_timeout_ms = thread_timeout_ms;
            }
        }

        if let Some(escalation) = patch.escalation {
            if let Some(webhook_url) = escalation.webhook_url {
                self.escalation.webhook_url = Some(webhook_url);
            }
            if let Some(auth_token_value) = escalation.auth_token {
                self.escalation.auth_token = Some(secret_value(auth_token_value));
            }
            if let Some(timeout_secs) = escalation.timeout_secs {
                self.escalation.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("INBOXLY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("INBOXLY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("INBOXLY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("INBOXLY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("INBOXLY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("INBOXLY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("INBOXLY_SERVER_API_PORT") {
            self.server.api_port = parse_u16("INBOXLY_SERVER_API_PORT", &value)?;
        }
        if let Some(value) = read_env("INBOXLY_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("INBOXLY_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("INBOXLY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("INBOXLY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("INBOXLY_MONITOR_ENABLED") {
            self.monitor.enabled = parse_bool("INBOXLY_MONITOR_ENABLED", &value)?;
        }
        if let Some(value) = read_env("INBOXLY_MONITOR_INTERVAL_SECS") {
            self.monitor.interval_secs = parse_u64("INBOXLY_MONITOR_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("INBOXLY_MONITOR_THREAD_TIMEOUT_MS") {
            self.monitor.thread_timeout_ms =
                parse_u64("INBOXLY_MONITOR_THREAD_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = read_env("INBOXLY_ESCALATION_WEBHOOK_URL") {
            self.escalation.webhook_url = Some(value);
        }
        if let Some(value) = read_env("INBOXLY_ESCALATION_AUTH_TOKEN") {
            self.escalation.auth_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("INBOXLY_ESCALATION_TIMEOUT_SECS") {
            self.escalation.timeout_secs = parse_u64("INBOXLY_ESCALATION_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("INBOXLY_LOGGING_LEVEL").or_else(|| read_env("INBOXLY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("INBOXLY_LOGGING_FORMAT").or_else(|| read_env("INBOXLY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(enabled) = overrides.monitor_enabled {
            self.monitor.enabled = enabled;
        }
        if let Some(interval_secs) = overrides.monitor_interval_secs {
            self.monitor.interval_secs = interval_secs;
        }
        if let Some(webhook_url) = overrides.escalation_webhook_url {
            self.escalation.webhook_url = Some(webhook_url);
        }
        if let Some(auth_token) = overrides.escalation_auth_token {
            self.escalation.auth_token = Some(secret_value(auth_token));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_monitor(&self.monitor)?;
        validate_escalation(&self.escalation)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("inboxly.toml"), PathBuf::from("config/inboxly.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.api_port == 0 {
        return Err(ConfigError::Validation(
            "server.api_port must be greater than zero".to_string(),
        ));
    }

    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.api_port == server.health_check_port {
        return Err(ConfigError::Validation(
            "server.api_port and server.health_check_port must differ".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_monitor(monitor: &MonitorConfig) -> Result<(), ConfigError> {
    if monitor.interval_secs == 0 || monitor.interval_secs > 86_400 {
        return Err(ConfigError::Validation(
            "monitor.interval_secs must be in range 1..=86400".to_string(),
        ));
    }

    if monitor.thread_timeout_ms == 0 || monitor.thread_timeout_ms > 600_000 {
        return Err(ConfigError::Validation(
            "monitor.thread_timeout_ms must be in range 1..=600000".to_string(),
        ));
    }

    Ok(())
}

fn validate_escalation(escalation: &EscalationConfig) -> Result<(), ConfigError> {
    if let Some(url) = &escalation.webhook_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "escalation.webhook_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if escalation.auth_token.is_some() && escalation.webhook_url.is_none() {
        return Err(ConfigError::Validation(
            "escalation.auth_token is set but escalation.webhook_url is missing".to_string(),
        ));
    }

    if escalation.timeout_secs == 0 || escalation.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "escalation.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    monitor: Option<MonitorPatch>,
    escalation: Option<EscalationPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    api_port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MonitorPatch {
    enabled: Option<bool>,
    interval_secs: Option<u64>,
    thread_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EscalationPatch {
    webhook_url: Option<String>,
    auth_token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
