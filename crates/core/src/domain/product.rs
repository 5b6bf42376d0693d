use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub i64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of a width-priced product: price per running meter for a given width.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTier {
    pub width: u32,
    pub price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub sku: Option<String>,
    pub price: Decimal,
    pub unit: String,
    pub pack_size: Decimal,
    pub price_matrix: Vec<PriceTier>,
}

impl Product {
    /// Products with a non-empty width matrix are priced per running meter.
    pub fn is_matrix_priced(&self) -> bool {
        !self.price_matrix.is_empty()
    }

    /// Catalog rows with a missing or non-positive pack size sell in units of one.
    pub fn effective_pack_size(&self) -> Decimal {
        if self.pack_size > Decimal::ZERO {
            self.pack_size
        } else {
            Decimal::ONE
        }
    }

    pub fn max_tier_width(&self) -> Option<u32> {
        self.price_matrix.iter().map(|tier| tier.width).max()
    }
}
