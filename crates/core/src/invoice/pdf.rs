use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use super::{DocumentFormat, InvoiceBuilder, InvoiceDocument, InvoiceError, InvoicePrinter};
use crate::domain::order::Order;

const CONVERTER_BINARY: &str = "wkhtmltopdf";
const PAGE_MARGIN: &str = "10mm";

/// Resolves the converter binary: the configured path when it is executable,
/// otherwise whatever `wkhtmltopdf` is on `PATH`.
pub fn locate_wkhtmltopdf(configured: Option<&Path>) -> Option<PathBuf> {
    match configured {
        Some(path) => match which::which(path) {
            Ok(found) => Some(found),
            Err(error) => {
                warn!(
                    event_name = "invoice.converter.unavailable",
                    path = %path.display(),
                    error = %error,
                    "configured wkhtmltopdf path is not executable"
                );
                None
            }
        },
        None => which::which(CONVERTER_BINARY).ok(),
    }
}

/// Prints invoices as A4 PDFs through wkhtmltopdf. Without a converter, or
/// when conversion fails, the rendered HTML is delivered instead.
pub struct PdfInvoicePrinter {
    builder: InvoiceBuilder,
    converter: Option<PathBuf>,
}

impl PdfInvoicePrinter {
    pub fn new(builder: InvoiceBuilder, configured: Option<&Path>) -> Self {
        let converter = locate_wkhtmltopdf(configured);
        match &converter {
            Some(path) => info!(
                event_name = "invoice.converter.found",
                path = %path.display(),
                "wkhtmltopdf found"
            ),
            None => warn!(
                event_name = "invoice.converter.missing",
                "wkhtmltopdf not found, invoices will be delivered as HTML"
            ),
        }
        Self { builder, converter }
    }

    pub fn with_converter(builder: InvoiceBuilder, converter: Option<PathBuf>) -> Self {
        Self { builder, converter }
    }

    pub fn converter(&self) -> Option<&Path> {
        self.converter.as_deref()
    }

    async fn convert(&self, converter: &Path, html: &str) -> Result<Vec<u8>, InvoiceError> {
        let stem = uuid::Uuid::new_v4();
        let temp_dir = std::env::temp_dir();
        let html_path = temp_dir.join(format!("pidloga_invoice_{stem}.html"));
        let pdf_path = temp_dir.join(format!("pidloga_invoice_{stem}.pdf"));

        tokio::fs::write(&html_path, html).await?;
        let result = run_converter(converter, &html_path, &pdf_path).await;

        let _ = tokio::fs::remove_file(&html_path).await;
        let _ = tokio::fs::remove_file(&pdf_path).await;
        result
    }
}

async fn run_converter(
    converter: &Path,
    html_path: &Path,
    pdf_path: &Path,
) -> Result<Vec<u8>, InvoiceError> {
    let output = Command::new(converter)
        .args(["--quiet", "--page-size", "A4", "--encoding", "utf-8"])
        .args(["--margin-top", PAGE_MARGIN, "--margin-bottom", PAGE_MARGIN])
        .args(["--margin-left", PAGE_MARGIN, "--margin-right", PAGE_MARGIN])
        .arg(html_path)
        .arg(pdf_path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(InvoiceError::Conversion(stderr.trim().to_string()));
    }

    Ok(tokio::fs::read(pdf_path).await?)
}

#[async_trait]
impl InvoicePrinter for PdfInvoicePrinter {
    async fn print(&self, order: &Order) -> Result<InvoiceDocument, InvoiceError> {
        let html = self.builder.render_html(order)?;
        let order_number = order.order_number.to_string();

        if let Some(converter) = &self.converter {
            match self.convert(converter, &html).await {
                Ok(bytes) => {
                    info!(
                        event_name = "invoice.rendered",
                        order_number = %order_number,
                        format = "pdf",
                        size = bytes.len(),
                        "invoice converted to pdf"
                    );
                    return Ok(InvoiceDocument::new(&order.order_number, DocumentFormat::Pdf, bytes));
                }
                Err(error) => warn!(
                    event_name = "invoice.conversion_failed",
                    order_number = %order_number,
                    error = %error,
                    "pdf conversion failed, falling back to html"
                ),
            }
        }

        info!(
            event_name = "invoice.rendered",
            order_number = %order_number,
            format = "html",
            "invoice rendered as html"
        );
        Ok(InvoiceDocument::new(&order.order_number, DocumentFormat::Html, html.into_bytes()))
    }
}
