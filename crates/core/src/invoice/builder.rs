use std::collections::HashMap;
use std::error::Error as _;
use std::path::Path;

use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Serialize;
use tera::{Context, Tera};

use super::{amount_in_words, format_money, format_quantity, InvoiceError};
use crate::domain::order::Order;

const TEMPLATE_NAME: &str = "invoice.html";
const TEMPLATE_FILE: &str = "invoice.html.tera";
const EMBEDDED_TEMPLATE: &str = include_str!("../../../../templates/invoice/invoice.html.tera");
const DEFAULT_UNIT: &str = "м²";

const PAYMENT_NOTICE: &str = "Увага! Оплата даного рахунку означає згоду з умовами постачання товару. \
Повідомлення про оплату обов'язково, у противному випадку не гарантується наявність товару на складі. \
Товар відпускається по факту приходу грошей на п/р Постачальника, самовивозом, при наявності доручення і паспорта.";

/// Payee block printed on every invoice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SupplierDetails {
    pub name: &'static str,
    pub tax_id: &'static str,
    pub bank: &'static str,
    pub bank_code: &'static str,
    pub account: &'static str,
    pub address: &'static str,
    pub signer: &'static str,
}

pub const SUPPLIER: SupplierDetails = SupplierDetails {
    name: "Фізична особа-підприємець Коваленко Олена Петрівна",
    tax_id: "2934501876",
    bank: "АТ \"УНІВЕРСАЛ БАНК\"",
    bank_code: "322001",
    account: "UA213220010000026001234567890",
    address: "08130, м. Київ, вул. Садова, буд 139",
    signer: "Коваленко О.П.",
};

#[derive(Serialize)]
struct InvoiceRow<'a> {
    position: usize,
    sku: &'a str,
    name: &'a str,
    quantity: Decimal,
    unit: &'a str,
    price: Decimal,
    total: Decimal,
}

#[derive(Serialize)]
struct InvoiceView<'a> {
    sequence: &'a str,
    order_number: &'a str,
    issued_on: String,
    notice: &'static str,
    supplier: &'static SupplierDetails,
    customer_name: &'a str,
    customer_phone: &'a str,
    rows: Vec<InvoiceRow<'a>>,
    item_count: usize,
    subtotal: Decimal,
    discount: Option<Decimal>,
    total: Decimal,
    amount_in_words: String,
}

/// Renders orders into the printable HTML invoice. Output is a pure function
/// of the order, the supplier constants and the shop timezone.
#[derive(Clone, Debug)]
pub struct InvoiceBuilder {
    tera: Tera,
    timezone: Tz,
}

impl InvoiceBuilder {
    pub fn new(timezone: Tz) -> Result<Self, InvoiceError> {
        Self::with_template(EMBEDDED_TEMPLATE, timezone)
    }

    /// Loads `invoice.html.tera` from `template_dir` in place of the bundled layout.
    pub fn from_template_dir(template_dir: &Path, timezone: Tz) -> Result<Self, InvoiceError> {
        let source = std::fs::read_to_string(template_dir.join(TEMPLATE_FILE))?;
        Self::with_template(&source, timezone)
    }

    fn with_template(source: &str, timezone: Tz) -> Result<Self, InvoiceError> {
        let mut tera = Tera::default();
        register_template_filters(&mut tera);
        tera.add_raw_template(TEMPLATE_NAME, source).map_err(template_error)?;
        Ok(Self { tera, timezone })
    }

    pub fn render_html(&self, order: &Order) -> Result<String, InvoiceError> {
        let rows: Vec<InvoiceRow<'_>> = order
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| InvoiceRow {
                position: index + 1,
                sku: item.sku.as_deref().filter(|sku| !sku.trim().is_empty()).unwrap_or("-"),
                name: &item.name,
                quantity: item.quantity,
                unit: if item.unit.trim().is_empty() { DEFAULT_UNIT } else { &item.unit },
                price: item.price,
                total: item.row_total(),
            })
            .collect();

        let subtotal: Decimal = rows.iter().map(|row| row.total).sum();
        let discount = Some(subtotal - order.total_amount).filter(|value| *value > Decimal::ZERO);

        let view = InvoiceView {
            sequence: order.order_number.sequence(),
            order_number: order.order_number.as_str(),
            issued_on: order.created_at.with_timezone(&self.timezone).format("%d.%m.%Y").to_string(),
            notice: PAYMENT_NOTICE,
            supplier: &SUPPLIER,
            customer_name: &order.customer_name,
            customer_phone: &order.customer_phone,
            item_count: rows.len(),
            rows,
            subtotal,
            discount,
            total: order.total_amount,
            amount_in_words: amount_in_words(order.total_amount),
        };

        let context = Context::from_serialize(&view).map_err(template_error)?;
        self.tera.render(TEMPLATE_NAME, &context).map_err(template_error)
    }
}

fn template_error(error: tera::Error) -> InvoiceError {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    InvoiceError::Template(message)
}

/// - `money`: two decimals, e.g. `row.price | money`
/// - `quantity`: trims trailing zeros, e.g. `row.quantity | quantity`
pub fn register_template_filters(tera: &mut Tera) {
    tera.register_filter("money", money_filter);
    tera.register_filter("quantity", quantity_filter);
}

fn decimal_arg(value: &tera::Value, filter: &str) -> tera::Result<Decimal> {
    let raw = match value {
        tera::Value::String(text) => text.clone(),
        tera::Value::Number(number) => number.to_string(),
        tera::Value::Null => return Ok(Decimal::ZERO),
        other => return Err(tera::Error::msg(format!("{filter} filter expects a number, got {other}"))),
    };
    raw.parse::<Decimal>()
        .map_err(|error| tera::Error::msg(format!("{filter} filter: invalid number `{raw}`: {error}")))
}

fn money_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    Ok(tera::Value::String(format_money(decimal_arg(value, "money")?)))
}

fn quantity_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    Ok(tera::Value::String(format_quantity(decimal_arg(value, "quantity")?)))
}
