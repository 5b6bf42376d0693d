use std::sync::Arc;

use pidloga_core::config::{AppConfig, ConfigError, LoadOptions};
use pidloga_core::{
    ConversationEngine, InvoiceBuilder, InvoiceError, OrderDesk, OrderNumberAllocator,
    PdfInvoicePrinter, SessionStore, SystemClock,
};
use pidloga_db::{connect_with_settings, migrations, DbPool, SqlCatalogRepository, SqlOrderRepository};
use pidloga_telegram::{BotService, PollingRunner, ReconnectPolicy, TelegramClient, TelegramError};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub sessions: Arc<SessionStore>,
    #[allow(dead_code)]
    pub engine: Arc<ConversationEngine>,
    pub runner: PollingRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("invoice template could not be loaded: {0}")]
    Invoice(#[from] InvoiceError),
    #[error("telegram client could not be created: {0}")]
    Telegram(#[from] TelegramError),
}

#[allow(dead_code)]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let timezone = config.orders.timezone;
    let builder = match &config.invoice.template_dir {
        Some(dir) => InvoiceBuilder::from_template_dir(dir, timezone)?,
        None => InvoiceBuilder::new(timezone)?,
    };
    let printer = PdfInvoicePrinter::new(builder, config.invoice.wkhtmltopdf_path.as_deref());

    let clock = Arc::new(SystemClock);
    let sessions = Arc::new(SessionStore::default());
    let desk = Arc::new(OrderDesk::new(
        Arc::new(SqlOrderRepository::new(db_pool.clone())),
        Arc::new(printer),
        OrderNumberAllocator::new(timezone),
        clock.clone(),
    ));
    let engine = Arc::new(
        ConversationEngine::new(
            Arc::new(SqlCatalogRepository::new(db_pool.clone())),
            desk,
            sessions.clone(),
            clock,
        )
        .with_search_limit(config.conversation.search_limit),
    );

    let client = Arc::new(TelegramClient::new(
        config.telegram.api_base_url.clone(),
        config.telegram.bot_token.clone(),
        config.telegram.poll_timeout_secs,
    )?);
    let service = Arc::new(
        BotService::new(engine.clone(), client.clone())
            .with_notify_chat(config.telegram.notify_chat_id),
    );
    let runner = PollingRunner::new(client, service, ReconnectPolicy::default());
    info!(
        event_name = "system.bootstrap.transport_ready",
        correlation_id = "bootstrap",
        api_base_url = %config.telegram.api_base_url,
        "telegram transport configured"
    );

    Ok(Application { config, db_pool, sessions, engine, runner })
}
