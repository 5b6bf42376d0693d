use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use pidloga_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::CommandResult;

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn field(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Field {
    Field { key, value: value.into(), env_keys }
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            )
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult::success("config", lines.join("\n"))
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        field("database.url", config.database.url.as_str(), &["PIDLOGA_DATABASE_URL"]),
        field(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["PIDLOGA_DATABASE_MAX_CONNECTIONS"],
        ),
        field(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["PIDLOGA_DATABASE_TIMEOUT_SECS"],
        ),
        field(
            "telegram.bot_token",
            redact_token(config.telegram.bot_token.expose_secret()),
            &["PIDLOGA_TELEGRAM_BOT_TOKEN"],
        ),
        field(
            "telegram.api_base_url",
            config.telegram.api_base_url.as_str(),
            &["PIDLOGA_TELEGRAM_API_BASE_URL"],
        ),
        field(
            "telegram.poll_timeout_secs",
            config.telegram.poll_timeout_secs.to_string(),
            &["PIDLOGA_TELEGRAM_POLL_TIMEOUT_SECS"],
        ),
        field(
            "telegram.notify_chat_id",
            optional(config.telegram.notify_chat_id.map(|id| id.to_string())),
            &["PIDLOGA_TELEGRAM_NOTIFY_CHAT_ID"],
        ),
        field("orders.timezone", config.orders.timezone.name(), &["PIDLOGA_ORDERS_TIMEZONE"]),
        field(
            "conversation.session_ttl_secs",
            config.conversation.session_ttl_secs.to_string(),
            &["PIDLOGA_CONVERSATION_SESSION_TTL_SECS"],
        ),
        field(
            "conversation.search_limit",
            config.conversation.search_limit.to_string(),
            &["PIDLOGA_CONVERSATION_SEARCH_LIMIT"],
        ),
        field(
            "invoice.wkhtmltopdf_path",
            optional(config.invoice.wkhtmltopdf_path.as_deref().map(display_path)),
            &["PIDLOGA_INVOICE_WKHTMLTOPDF_PATH"],
        ),
        field(
            "invoice.template_dir",
            optional(config.invoice.template_dir.as_deref().map(display_path)),
            &["PIDLOGA_INVOICE_TEMPLATE_DIR"],
        ),
        field(
            "server.bind_address",
            config.server.bind_address.as_str(),
            &["PIDLOGA_SERVER_BIND_ADDRESS"],
        ),
        field(
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            &["PIDLOGA_SERVER_HEALTH_CHECK_PORT"],
        ),
        field(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["PIDLOGA_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        field(
            "logging.level",
            config.logging.level.as_str(),
            &["PIDLOGA_LOGGING_LEVEL", "PIDLOGA_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["PIDLOGA_LOGGING_FORMAT", "PIDLOGA_LOG_FORMAT"],
        ),
    ]
}

fn optional(value: Option<String>) -> String {
    value.unwrap_or_else(|| "<unset>".to_string())
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("pidloga.toml"), PathBuf::from("config/pidloga.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }
    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }
    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the public bot id and hides the secret half.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    if let Some((bot_id, _)) = trimmed.split_once(':') {
        return format!("{bot_id}:***");
    }
    "<redacted>".to_string()
}
