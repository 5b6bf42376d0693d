//! Price calculation for the two ways products are sold: by area in whole
//! packs, and by running meter against a width matrix.

pub mod area;
pub mod matrix;

use thiserror::Error;

pub use area::{price_by_area, AreaQuote};
pub use matrix::{price_by_width, round_width_to_tier, MatrixQuote, WIDTH_TIER_STEP_MM};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("quantity must be greater than zero")]
    NonPositiveQuantity,
    #[error("pack size must be greater than zero")]
    InvalidPackSize,
    #[error("quantity is too large to price")]
    QuantityOutOfRange,
    #[error("dimensions must be greater than zero")]
    NonPositiveDimension,
    #[error("price matrix is empty")]
    EmptyMatrix,
    #[error("requested width exceeds the maximum tier of {max_width_mm} mm")]
    WidthExceedsMaximum { max_width_mm: u32 },
    #[error("no price tier for width {tier_width_mm} mm")]
    NoMatchingTier { tier_width_mm: u32 },
}
