//! Chat texts. Anything that came from a user or the catalog is escaped
//! before it is embedded into Telegram HTML.

use rust_decimal::Decimal;
use tera::escape_html;

use crate::conversation::buttons::{Button, ButtonAction};
use crate::conversation::reply::OutboundText;
use crate::conversation::states::{DraftLineItem, NextAction};
use crate::domain::order::Order;
use crate::domain::product::Product;
use crate::invoice::{format_money, format_quantity};
use crate::pricing::{AreaQuote, MatrixQuote};

pub const SEARCH_PROMPT: &str = "🔍 Введіть назву товару для пошуку:";
pub const NO_PRODUCTS_FOUND: &str = "❌ Товарів не знайдено. Спробуйте іншу назву:";
pub const SEARCH_UNAVAILABLE: &str = "❌ Пошук тимчасово недоступний. Спробуйте ще раз пізніше:";
pub const PRODUCT_GONE: &str = "❌ Товар не знайдено. Оберіть інший або введіть нову назву:";
pub const INVALID_QUANTITY: &str = "❌ Будь ласка, введіть число:";
pub const INVALID_WIDTH: &str = "❌ Введіть коректну ширину в мм:";
pub const LENGTH_PROMPT: &str = "Введіть довжину в мм:";
pub const INVALID_LENGTH: &str = "❌ Введіть коректну довжину в мм:";
pub const NONSTANDARD_SIZE: &str =
    "❌ Помилка: Нестандартний розмір. Зверніться до менеджера.\nЩоб почати знову, надішліть /calc.";
pub const DISCOUNT_VALUE_PROMPT: &str = "Введіть знижку у відсотках (від 0 до 100):";
pub const INVALID_DISCOUNT: &str = "❌ Введіть число від 0 до 100:";
pub const CUSTOMER_NAME_PROMPT: &str = "Введіть ім'я клієнта:";
pub const CUSTOMER_PHONE_PROMPT: &str = "Введіть телефон клієнта:";
pub const EMPTY_VALUE: &str = "❌ Значення не може бути порожнім. Спробуйте ще раз:";
pub const USE_BUTTONS: &str = "Будь ласка, скористайтеся кнопками нижче.";
pub const CANCELLED: &str = "Розрахунок скасовано. Щоб почати знову, надішліть /calc.";
pub const NOTHING_TO_CANCEL: &str = "Немає активного розрахунку. Щоб почати, надішліть /calc.";
pub const IDLE_HINT: &str = "Щоб розрахувати вартість, надішліть /calc.";
pub const GENERATING_INVOICE: &str = "Генерую рахунок...";
pub const ORDER_NOT_FOUND: &str = "Помилка: Замовлення не знайдено.";
pub const INVOICE_FAILED: &str = "Сталася помилка при генерації рахунку.";
pub const INVOICE_MANAGERS_ONLY: &str = "Рахунки за номером доступні лише в чаті менеджерів.";
pub const INVOICE_USAGE: &str = "Вкажіть номер замовлення, наприклад: /invoice 4/03/2024";
pub const HELP: &str = "Вітаю! Я допоможу розрахувати вартість підлоги й підвіконь та сформувати рахунок.\n\n\
/calc - новий розрахунок\n\
/invoice &lt;номер&gt; - рахунок за номером замовлення\n\
/cancel - скасувати поточний розрахунок\n\
/help - ця довідка";

fn product_label(product: &Product) -> String {
    if product.is_matrix_priced() {
        format!("{} (ціна за розміром)", product.name)
    } else {
        format!("{} ({} грн)", product.name, format_money(product.price))
    }
}

pub fn product_choices(products: &[Product]) -> OutboundText {
    let keyboard = products
        .iter()
        .map(|product| vec![Button::new(product_label(product), ButtonAction::SelectProduct(product.id))])
        .collect();
    OutboundText::with_keyboard("Оберіть товар:", keyboard)
}

pub fn quantity_prompt(product: &Product) -> String {
    let unit = escape_html(&product.unit);
    format!(
        "Товар: <b>{}</b>\nЦіна: {} грн/{unit}\nВ упаковці: {} {unit}\n\nВведіть потрібну кількість ({unit}):",
        escape_html(&product.name),
        format_money(product.price),
        format_quantity(product.effective_pack_size()),
    )
}

pub fn width_prompt(product: &Product) -> String {
    let mut widths: Vec<u32> = product.price_matrix.iter().map(|tier| tier.width).collect();
    widths.sort_unstable();
    let widths: Vec<String> = widths.iter().map(u32::to_string).collect();
    format!(
        "Товар: <b>{}</b>\nДоступна ширина: {} мм\n\nВведіть ширину в мм:",
        escape_html(&product.name),
        widths.join(", ")
    )
}

pub fn width_exceeds_maximum(max_width_mm: u32) -> String {
    format!(
        "❌ Помилка: Максимальна ширина для цього товару {max_width_mm} мм.\nЩоб почати знову, надішліть /calc."
    )
}

pub fn area_result(product: &Product, quote: &AreaQuote, draft_total: Decimal) -> String {
    let unit = escape_html(&product.unit);
    format!(
        "✅ <b>Розрахунок</b>\nТовар: {}\nПотрібно: {} {unit}\nУпаковок: {} ({} {unit})\nЦіна за {unit}: {} грн\n<b>Сума: {} грн</b>\n\nРазом у замовленні: {} грн",
        escape_html(&product.name),
        format_quantity(quote.requested_quantity),
        quote.packs_needed,
        format_quantity(quote.billed_quantity),
        format_money(quote.unit_price),
        format_money(quote.line_total),
        format_money(draft_total),
    )
}

pub fn matrix_result(product: &Product, quote: &MatrixQuote, draft_total: Decimal) -> String {
    format!(
        "✅ <b>Розрахунок</b>\nТовар: {}\nРозмір: {}x{} мм\nРозрахункова ширина: {} мм\nЦіна за м.п.: {} грн\n<b>Сума: {} грн</b>\n\nРазом у замовленні: {} грн",
        escape_html(&product.name),
        quote.requested_width_mm,
        quote.length_mm,
        quote.tier_width_mm,
        format_money(quote.price_per_meter),
        format_money(quote.line_total),
        format_money(draft_total),
    )
}

pub fn next_action_menu(items: &[DraftLineItem]) -> OutboundText {
    let text = format!("У замовленні позицій: {}. Що далі?", items.len());
    OutboundText::with_keyboard(
        text,
        vec![
            vec![Button::new("➕ Додати товар", ButtonAction::Next(NextAction::AddItem))],
            vec![Button::new("✅ Оформити замовлення", ButtonAction::Next(NextAction::Finalize))],
            vec![Button::new("❌ Скасувати", ButtonAction::Next(NextAction::Cancel))],
        ],
    )
}

pub fn discount_question(total: Decimal) -> OutboundText {
    OutboundText::with_keyboard(
        format!("Сума замовлення: {} грн.\nЗастосувати знижку?", format_money(total)),
        vec![vec![
            Button::new("Так", ButtonAction::Discount(true)),
            Button::new("Ні", ButtonAction::Discount(false)),
        ]],
    )
}

pub fn discount_applied(percent: Decimal, total: Decimal) -> String {
    format!(
        "Знижку {}% застосовано. Сума до сплати: {} грн",
        format_quantity(percent),
        format_money(total)
    )
}

pub fn order_placed(order: &Order) -> String {
    format!(
        "✅ Замовлення <b>№{}</b> оформлено.\nКлієнт: {}, {}\nСума до сплати: {} грн",
        order.order_number,
        escape_html(&order.customer_name),
        escape_html(&order.customer_phone),
        format_money(order.total_amount),
    )
}

pub fn order_not_saved(reason: &str) -> String {
    format!(
        "❌ Не вдалося зберегти замовлення: {}\nНадішліть телефон ще раз, щоб повторити.",
        escape_html(reason)
    )
}

pub fn invoice_not_rendered(order: &Order) -> String {
    format!(
        "⚠️ Замовлення №{number} збережено, але рахунок не сформовано. Спробуйте /invoice {number}",
        number = order.order_number
    )
}

pub fn invoice_caption(order: &Order) -> String {
    format!("📄 Рахунок для замовлення {}", order.order_number)
}

pub fn order_number_not_found(number: &str) -> String {
    format!("Замовлення {} не знайдено.", escape_html(number))
}

/// Sent to the manager chat when a new order is placed.
pub fn new_order_notification(order: &Order) -> OutboundText {
    let text = format!(
        "🆕 Нове замовлення <b>№{}</b>\nКлієнт: {}, {}\nПозицій: {}\nСума: {} грн",
        order.order_number,
        escape_html(&order.customer_name),
        escape_html(&order.customer_phone),
        order.items.len(),
        format_money(order.total_amount),
    );
    OutboundText::with_keyboard(
        text,
        vec![vec![Button::new("📄 Сформувати рахунок", ButtonAction::GenerateInvoice(order.id))]],
    )
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{order_number_not_found, product_choices, width_prompt};
    use crate::conversation::buttons::ButtonAction;
    use crate::domain::product::{PriceTier, Product, ProductId};

    fn product(id: i64, name: &str, matrix: Vec<PriceTier>) -> Product {
        Product {
            id: ProductId(id),
            name: name.to_string(),
            sku: None,
            price: Decimal::new(2400, 0),
            unit: "м²".to_string(),
            pack_size: Decimal::ONE,
            price_matrix: matrix,
        }
    }

    #[test]
    fn user_text_is_escaped_before_embedding() {
        assert_eq!(
            order_number_not_found("<b>1</b>"),
            "Замовлення &lt;b&gt;1&lt;&#x2F;b&gt; не знайдено."
        );
        assert!(width_prompt(&product(3, "Tom & \"Jerry\"", Vec::new()))
            .contains("<b>Tom &amp; &quot;Jerry&quot;</b>"));
    }

    #[test]
    fn choices_list_one_button_per_product() {
        let message = product_choices(&[
            product(1, "Chevron Oak", Vec::new()),
            product(2, "Sill", vec![PriceTier { width: 200, price: Decimal::new(120, 0) }]),
        ]);

        assert_eq!(message.text, "Оберіть товар:");
        assert_eq!(message.keyboard.len(), 2);
        assert_eq!(message.keyboard[0][0].label, "Chevron Oak (2400.00 грн)");
        assert_eq!(message.keyboard[0][0].action, ButtonAction::SelectProduct(ProductId(1)));
        assert_eq!(message.keyboard[1][0].label, "Sill (ціна за розміром)");
    }

    #[test]
    fn width_prompt_lists_tiers_in_order() {
        let sill = product(
            2,
            "Sill",
            vec![
                PriceTier { width: 300, price: Decimal::new(150, 0) },
                PriceTier { width: 150, price: Decimal::new(100, 0) },
            ],
        );
        assert!(width_prompt(&sill).contains("Доступна ширина: 150, 300 мм"));
    }
}
