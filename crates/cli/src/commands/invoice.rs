use std::path::{Path, PathBuf};
use std::sync::Arc;

use pidloga_core::config::AppConfig;
use pidloga_core::{
    ApplicationError, InvoiceBuilder, InvoiceDocument, OrderDesk, OrderNumberAllocator,
    PdfInvoicePrinter, SystemClock,
};
use pidloga_db::SqlOrderRepository;

use crate::commands::{open_database, prepare, CommandResult, StepFailure};

pub fn run(order_number: &str, out: Option<&Path>) -> CommandResult {
    let order_number = order_number.trim();
    if order_number.is_empty() {
        return CommandResult::failure("invoice", "invalid_input", "order number is required", 2);
    }

    let (config, runtime) = match prepare("invoice") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let rendered = render(&config, pool.clone(), order_number).await;
        pool.close().await;
        rendered
    });

    let document = match result {
        Ok(document) => document,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("invoice", error_class, message, exit_code)
        }
    };

    let path = out.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(&document.file_name));
    if let Err(error) = std::fs::write(&path, &document.bytes) {
        return CommandResult::failure(
            "invoice",
            "io",
            format!("could not write `{}`: {error}", path.display()),
            9,
        );
    }

    CommandResult::success(
        "invoice",
        format!(
            "invoice for order {order_number} written to {} ({}, {} bytes)",
            path.display(),
            document.format.extension(),
            document.bytes.len()
        ),
    )
}

async fn render(
    config: &AppConfig,
    pool: pidloga_db::DbPool,
    order_number: &str,
) -> Result<InvoiceDocument, StepFailure> {
    let timezone = config.orders.timezone;
    let builder = match &config.invoice.template_dir {
        Some(dir) => InvoiceBuilder::from_template_dir(dir, timezone),
        None => InvoiceBuilder::new(timezone),
    }
    .map_err(|error| ("invoice_template", error.to_string(), 8u8))?;
    let printer = PdfInvoicePrinter::new(builder, config.invoice.wkhtmltopdf_path.as_deref());

    let desk = OrderDesk::new(
        Arc::new(SqlOrderRepository::new(pool)),
        Arc::new(printer),
        OrderNumberAllocator::new(timezone),
        Arc::new(SystemClock),
    );

    match desk.invoice_by_number(order_number).await {
        Ok(Some((_, document))) => Ok(document),
        Ok(None) => Err(("not_found", format!("order {order_number} not found"), 7)),
        Err(error @ ApplicationError::Invoice(_)) => Err(("invoice_render", error.to_string(), 8)),
        Err(error) => Err(("persistence", error.to_string(), 4)),
    }
}
