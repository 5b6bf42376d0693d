use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PricingError;

/// Whole-pack quote for a product sold by area.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaQuote {
    pub requested_quantity: Decimal,
    pub pack_size: Decimal,
    pub packs_needed: u64,
    pub billed_quantity: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Rounds the requested quantity up to whole packs and bills the packed quantity.
pub fn price_by_area(
    requested_quantity: Decimal,
    pack_size: Decimal,
    unit_price: Decimal,
) -> Result<AreaQuote, PricingError> {
    if requested_quantity <= Decimal::ZERO {
        return Err(PricingError::NonPositiveQuantity);
    }
    if pack_size <= Decimal::ZERO {
        return Err(PricingError::InvalidPackSize);
    }

    let packs = requested_quantity
        .checked_div(pack_size)
        .ok_or(PricingError::QuantityOutOfRange)?
        .ceil();
    let packs_needed = packs.to_u64().ok_or(PricingError::QuantityOutOfRange)?;
    let billed_quantity = packs.checked_mul(pack_size).ok_or(PricingError::QuantityOutOfRange)?;
    let line_total =
        billed_quantity.checked_mul(unit_price).ok_or(PricingError::QuantityOutOfRange)?;

    Ok(AreaQuote {
        requested_quantity,
        pack_size,
        packs_needed,
        billed_quantity,
        unit_price,
        line_total,
    })
}
