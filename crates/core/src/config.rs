use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Kyiv;
/// Longest idle time a conversation may be kept (30 days). Zero disables expiry.
pub const MAX_SESSION_TTL_SECS: u64 = 30 * 86_400;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub telegram: TelegramConfig,
    pub orders: OrdersConfig,
    pub conversation: ConversationConfig,
    pub invoice: InvoiceConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub api_base_url: String,
    pub poll_timeout_secs: u64,
    pub notify_chat_id: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct OrdersConfig {
    pub timezone: Tz,
}

#[derive(Clone, Debug)]
pub struct ConversationConfig {
    pub session_ttl_secs: u64,
    pub search_limit: u32,
}

#[derive(Clone, Debug)]
pub struct InvoiceConfig {
    pub wkhtmltopdf_path: Option<PathBuf>,
    pub template_dir: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
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
    pub telegram_bot_token: Option<String>,
    pub telegram_api_base_url: Option<String>,
    pub telegram_notify_chat_id: Option<i64>,
    pub timezone: Option<String>,
    pub wkhtmltopdf_path: Option<PathBuf>,
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
                url: "sqlite://pidloga.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            telegram: TelegramConfig {
                bot_token: String::new().into(),
                api_base_url: "https://api.telegram.org".to_string(),
                poll_timeout_secs: 30,
                notify_chat_id: None,
            },
            orders: OrdersConfig { timezone: DEFAULT_TIMEZONE },
            conversation: ConversationConfig { session_ttl_secs: 86_400, search_limit: 5 },
            invoice: InvoiceConfig { wkhtmltopdf_path: None, template_dir: None },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
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

pub fn parse_timezone(value: &str) -> Result<Tz, ConfigError> {
    value.trim().parse::<Tz>().map_err(|_| {
        ConfigError::Validation(format!(
            "orders.timezone `{value}` is not an IANA timezone name (e.g. `Europe/Kyiv`)"
        ))
    })
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("pidloga.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides)?;
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
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

        if let Some(telegram) = patch.telegram {
            if let Some(bot_token) = telegram.bot_token {
                self.telegram.bot_token = secret_value(bot_token);
            }
            if let Some(api_base_url) = telegram.api_base_url {
                self.telegram.api_base_url = api_base_url;
            }
            if let Some(poll_timeout_secs) = telegram.poll_timeout_secs {
                self.telegram.poll_timeout_secs = poll_timeout_secs;
            }
            if let Some(notify_chat_id) = telegram.notify_chat_id {
                self.telegram.notify_chat_id = Some(notify_chat_id);
            }
        }

        if let Some(orders) = patch.orders {
            if let Some(timezone) = orders.timezone {
                self.orders.timezone = parse_timezone(&timezone)?;
            }
        }

        if let Some(conversation) = patch.conversation {
            if let Some(session_ttl_secs) = conversation.session_ttl_secs {
                self.conversation.session_ttl_secs = session_ttl_secs;
            }
            if let Some(search_limit) = conversation.search_limit {
                self.conversation.search_limit = search_limit;
            }
        }

        if let Some(invoice) = patch.invoice {
            if let Some(wkhtmltopdf_path) = invoice.wkhtmltopdf_path {
                self.invoice.wkhtmltopdf_path = Some(wkhtmltopdf_path);
            }
            if let Some(template_dir) = invoice.template_dir {
                self.invoice.template_dir = Some(template_dir);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
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

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PIDLOGA_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("PIDLOGA_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("PIDLOGA_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("PIDLOGA_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("PIDLOGA_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PIDLOGA_TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("PIDLOGA_TELEGRAM_API_BASE_URL") {
            self.telegram.api_base_url = value;
        }
        if let Some(value) = read_env("PIDLOGA_TELEGRAM_POLL_TIMEOUT_SECS") {
            self.telegram.poll_timeout_secs =
                parse_u64("PIDLOGA_TELEGRAM_POLL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PIDLOGA_TELEGRAM_NOTIFY_CHAT_ID") {
            self.telegram.notify_chat_id = Some(parse_i64("PIDLOGA_TELEGRAM_NOTIFY_CHAT_ID", &value)?);
        }

        if let Some(value) = read_env("PIDLOGA_ORDERS_TIMEZONE") {
            self.orders.timezone = parse_timezone(&value)?;
        }

        if let Some(value) = read_env("PIDLOGA_CONVERSATION_SESSION_TTL_SECS") {
            self.conversation.session_ttl_secs =
                parse_u64("PIDLOGA_CONVERSATION_SESSION_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("PIDLOGA_CONVERSATION_SEARCH_LIMIT") {
            self.conversation.search_limit =
                parse_u32("PIDLOGA_CONVERSATION_SEARCH_LIMIT", &value)?;
        }

        if let Some(value) = read_env("PIDLOGA_INVOICE_WKHTMLTOPDF_PATH") {
            self.invoice.wkhtmltopdf_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("PIDLOGA_INVOICE_TEMPLATE_DIR") {
            self.invoice.template_dir = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("PIDLOGA_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PIDLOGA_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("PIDLOGA_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("PIDLOGA_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PIDLOGA_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("PIDLOGA_LOGGING_LEVEL").or_else(|| read_env("PIDLOGA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PIDLOGA_LOGGING_FORMAT").or_else(|| read_env("PIDLOGA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) -> Result<(), ConfigError> {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.telegram_bot_token {
            self.telegram.bot_token = secret_value(bot_token);
        }
        if let Some(api_base_url) = overrides.telegram_api_base_url {
            self.telegram.api_base_url = api_base_url;
        }
        if let Some(notify_chat_id) = overrides.telegram_notify_chat_id {
            self.telegram.notify_chat_id = Some(notify_chat_id);
        }
        if let Some(timezone) = overrides.timezone {
            self.orders.timezone = parse_timezone(&timezone)?;
        }
        if let Some(wkhtmltopdf_path) = overrides.wkhtmltopdf_path {
            self.invoice.wkhtmltopdf_path = Some(wkhtmltopdf_path);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_telegram(&self.telegram)?;
        validate_conversation(&self.conversation)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("pidloga.toml"), PathBuf::from("config/pidloga.toml")]
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

/// Bot API tokens look like `123456789:AAH...`: numeric bot id, colon, secret.
pub fn is_bot_token_shape(token: &str) -> bool {
    match token.split_once(':') {
        Some((bot_id, secret)) => {
            !bot_id.is_empty()
                && bot_id.chars().all(|ch| ch.is_ascii_digit())
                && !secret.is_empty()
                && !secret.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    let bot_token = telegram.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "telegram.bot_token is required. Create a bot with @BotFather and copy the token it issues".to_string(),
        ));
    }
    if !is_bot_token_shape(bot_token) {
        return Err(ConfigError::Validation(
            "telegram.bot_token must look like `<bot id>:<secret>` as issued by @BotFather"
                .to_string(),
        ));
    }

    let base_url = telegram.api_base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "telegram.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if telegram.poll_timeout_secs == 0 || telegram.poll_timeout_secs > 50 {
        return Err(ConfigError::Validation(
            "telegram.poll_timeout_secs must be in range 1..=50".to_string(),
        ));
    }

    Ok(())
}

fn validate_conversation(conversation: &ConversationConfig) -> Result<(), ConfigError> {
    if conversation.session_ttl_secs > MAX_SESSION_TTL_SECS {
        return Err(ConfigError::Validation(format!(
            "conversation.session_ttl_secs must be 0 (disabled) or at most {MAX_SESSION_TTL_SECS}"
        )));
    }

    if conversation.search_limit == 0 || conversation.search_limit > 20 {
        return Err(ConfigError::Validation(
            "conversation.search_limit must be in range 1..=20".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
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

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.trim().parse::<i64>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    telegram: Option<TelegramPatch>,
    orders: Option<OrdersPatch>,
    conversation: Option<ConversationPatch>,
    invoice: Option<InvoicePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    api_base_url: Option<String>,
    poll_timeout_secs: Option<u64>,
    notify_chat_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct OrdersPatch {
    timezone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ConversationPatch {
    session_ttl_secs: Option<u64>,
    search_limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct InvoicePatch {
    wkhtmltopdf_path: Option<PathBuf>,
    template_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
