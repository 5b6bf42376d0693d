use std::env;
use std::sync::{Mutex, OnceLock};

use chrono::{NaiveDate, TimeZone, Utc};
use pidloga_cli::commands::{config, invoice, migrate, seed};
use pidloga_core::gateway::OrderGateway;
use pidloga_core::{DeliveryMethod, NewOrder, OrderItem, OrderNumber, OrderPayload};
use pidloga_db::{connect_with_settings, migrations, SqlOrderRepository};
use rust_decimal::Decimal;
use serde_json::Value;
use tempfile::TempDir;

const TOKEN: &str = "123456789:AAHcli-test-secret";

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(
        &[("PIDLOGA_TELEGRAM_BOT_TOKEN", TOKEN), ("PIDLOGA_DATABASE_URL", "sqlite::memory:")],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 0, "expected successful migrate run");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "ok");
        },
    );
}

#[test]
fn migrate_returns_config_failure_without_bot_token() {
    with_env(&[("PIDLOGA_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload["message"].as_str().unwrap_or_default().contains("telegram.bot_token"));
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);

    with_env(&[("PIDLOGA_TELEGRAM_BOT_TOKEN", TOKEN), ("PIDLOGA_DATABASE_URL", &url)], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["command"], "seed");
        assert_eq!(
            first_payload["message"],
            "demo catalog loaded: 5 products seeded (5 new), 5 in catalog"
        );

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        assert_eq!(
            parse_payload(&second.output)["message"],
            "demo catalog loaded: 5 products seeded (0 new), 5 in catalog"
        );
    });
}

#[test]
fn config_reports_sources_and_redacts_bot_token() {
    with_env(
        &[
            ("PIDLOGA_TELEGRAM_BOT_TOKEN", TOKEN),
            ("PIDLOGA_DATABASE_URL", "sqlite::memory:"),
            ("PIDLOGA_LOG_LEVEL", "debug"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);
            assert_eq!(result.output.lines().count(), 1, "outcome should be one JSON line");

            let payload = parse_payload(&result.output);
            let message = payload["message"].as_str().unwrap_or_default();
            assert!(message.contains(
                "- telegram.bot_token = 123456789:*** (source: env (PIDLOGA_TELEGRAM_BOT_TOKEN))"
            ));
            assert!(message.contains("- logging.level = debug (source: env (PIDLOGA_LOG_LEVEL))"));
            assert!(message.contains("- orders.timezone = Europe/Kyiv (source: default)"));
            assert!(!message.contains("AAHcli-test-secret"));
        },
    );
}

#[test]
fn invoice_reports_missing_order() {
    with_env(
        &[("PIDLOGA_TELEGRAM_BOT_TOKEN", TOKEN), ("PIDLOGA_DATABASE_URL", "sqlite::memory:")],
        || {
            let result = invoice::run("99/01/2024", None);
            assert_eq!(result.exit_code, 7);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "invoice");
            assert_eq!(payload["error_class"], "not_found");
        },
    );
}

#[test]
fn invoice_writes_document_for_stored_order() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);
    store_order(&url, OrderNumber::new(3, 3, 2024));
    let out = dir.path().join("invoice-out");

    with_env(
        &[
            ("PIDLOGA_TELEGRAM_BOT_TOKEN", TOKEN),
            ("PIDLOGA_DATABASE_URL", &url),
            ("PIDLOGA_INVOICE_WKHTMLTOPDF_PATH", "/nonexistent/pidloga/wkhtmltopdf"),
        ],
        || {
            let result = invoice::run("3/03/2024", Some(&out));
            assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["status"], "ok");
            assert!(payload["message"].as_str().unwrap_or_default().contains("(html,"));

            let html = std::fs::read_to_string(&out).expect("invoice file should be written");
            assert!(html.contains("Рахунок на оплату №3"));
            assert!(html.contains("Oak Natural"));
        },
    );
}

fn database_url(dir: &TempDir) -> String {
    format!("sqlite://{}", dir.path().join("pidloga.db").display())
}

fn store_order(url: &str, order_number: OrderNumber) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime should build");

    runtime.block_on(async {
        let pool = connect_with_settings(url, 1, 5).await.expect("pool should connect");
        migrations::run_pending(&pool).await.expect("migrations should apply");

        SqlOrderRepository::new(pool.clone())
            .create_order(OrderPayload {
                order_number,
                order_day: NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
                created_at: Utc.with_ymd_and_hms(2024, 3, 7, 10, 0, 0).unwrap(),
                details: NewOrder {
                    customer_name: "Olha".to_string(),
                    customer_phone: "+380671234567".to_string(),
                    customer_email: None,
                    delivery_method: DeliveryMethod::Pickup,
                    address: String::new(),
                    payment_method: "bank_transfer".to_string(),
                    items: vec![OrderItem {
                        name: "Паркетна дошка Chevron Oak Natural".to_string(),
                        price: Decimal::new(1250, 0),
                        quantity: Decimal::new(2, 0),
                        unit: "м²".to_string(),
                        sku: Some("PP-CH-001".to_string()),
                    }],
                    total_amount: Decimal::new(2500, 0),
                },
            })
            .await
            .expect("order should be stored");

        pool.close().await;
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let keys = [
        "PIDLOGA_DATABASE_URL",
        "PIDLOGA_DATABASE_MAX_CONNECTIONS",
        "PIDLOGA_DATABASE_TIMEOUT_SECS",
        "PIDLOGA_TELEGRAM_BOT_TOKEN",
        "PIDLOGA_TELEGRAM_API_BASE_URL",
        "PIDLOGA_TELEGRAM_POLL_TIMEOUT_SECS",
        "PIDLOGA_TELEGRAM_NOTIFY_CHAT_ID",
        "PIDLOGA_ORDERS_TIMEZONE",
        "PIDLOGA_CONVERSATION_SESSION_TTL_SECS",
        "PIDLOGA_CONVERSATION_SEARCH_LIMIT",
        "PIDLOGA_INVOICE_WKHTMLTOPDF_PATH",
        "PIDLOGA_INVOICE_TEMPLATE_DIR",
        "PIDLOGA_SERVER_BIND_ADDRESS",
        "PIDLOGA_SERVER_HEALTH_CHECK_PORT",
        "PIDLOGA_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "PIDLOGA_LOGGING_LEVEL",
        "PIDLOGA_LOGGING_FORMAT",
        "PIDLOGA_LOG_LEVEL",
        "PIDLOGA_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
