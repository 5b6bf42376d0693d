use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::PricingError;
use crate::domain::product::PriceTier;

pub const WIDTH_TIER_STEP_MM: u32 = 50;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixQuote {
    pub requested_width_mm: u32,
    pub length_mm: u32,
    pub tier_width_mm: u32,
    pub price_per_meter: Decimal,
    pub line_total: Decimal,
}

pub fn round_width_to_tier(width_mm: u32) -> u32 {
    width_mm.div_ceil(WIDTH_TIER_STEP_MM).saturating_mul(WIDTH_TIER_STEP_MM)
}

/// Prices a cut-to-length piece: the width is rounded up to the 50 mm grid and
/// must hit a tier exactly. The total is rounded to whole hryvnias.
pub fn price_by_width(
    width_mm: u32,
    length_mm: u32,
    matrix: &[PriceTier],
) -> Result<MatrixQuote, PricingError> {
    if width_mm == 0 || length_mm == 0 {
        return Err(PricingError::NonPositiveDimension);
    }
    let max_width_mm =
        matrix.iter().map(|tier| tier.width).max().ok_or(PricingError::EmptyMatrix)?;

    let tier_width_mm = round_width_to_tier(width_mm);
    let Some(tier) = matrix.iter().find(|tier| tier.width == tier_width_mm) else {
        if width_mm > max_width_mm {
            return Err(PricingError::WidthExceedsMaximum { max_width_mm });
        }
        return Err(PricingError::NoMatchingTier { tier_width_mm });
    };

    let line_total = (tier.price * Decimal::from(length_mm) / Decimal::from(1000))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    Ok(MatrixQuote {
        requested_width_mm: width_mm,
        length_mm,
        tier_width_mm,
        price_per_meter: tier.price,
        line_total,
    })
}
