use rust_decimal::Decimal;

use pidloga_core::domain::product::{PriceTier, Product, ProductId};

use crate::connection::DbPool;
use crate::repositories::{RepositoryError, SqlCatalogRepository};

struct SeedProduct {
    sku: &'static str,
    name: &'static str,
    /// Price in kopiykas.
    price: i64,
    unit: &'static str,
    /// Pack size in hundredths of the unit.
    pack_size: i64,
    /// `(width mm, price per running meter in UAH)`.
    matrix: &'static [(u32, i64)],
}

const SEED_PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        sku: "PP-CH-001",
        name: "Паркетна дошка Chevron Oak Natural",
        price: 240_000,
        unit: "м²",
        pack_size: 173,
        matrix: &[],
    },
    SeedProduct {
        sku: "PP-HB-002",
        name: "Паркетна дошка Herringbone Walnut",
        price: 310_000,
        unit: "м²",
        pack_size: 146,
        matrix: &[],
    },
    SeedProduct {
        sku: "PP-PL-003",
        name: "Паркетна дошка Plank Ash White",
        price: 180_000,
        unit: "м²",
        pack_size: 202,
        matrix: &[],
    },
    SeedProduct {
        sku: "PP-MS-004",
        name: "Паркетна дошка Mosaic Teak",
        price: 450_000,
        unit: "м²",
        pack_size: 100,
        matrix: &[],
    },
    SeedProduct {
        sku: "WS-WG-001",
        name: "Підвіконня Werzalit білий",
        price: 0,
        unit: "шт",
        pack_size: 100,
        matrix: &[
            (100, 380),
            (150, 520),
            (200, 690),
            (250, 850),
            (300, 1_020),
            (350, 1_190),
            (400, 1_360),
            (450, 1_530),
            (500, 1_700),
            (600, 2_040),
        ],
    },
];

/// Demo flooring catalog used by `pidloga seed` and local development.
pub struct DemoCatalog;

impl DemoCatalog {
    pub fn products() -> Vec<Product> {
        SEED_PRODUCTS
            .iter()
            .map(|seed| Product {
                id: ProductId(0),
                name: seed.name.to_string(),
                sku: Some(seed.sku.to_string()),
                price: Decimal::new(seed.price, 2),
                unit: seed.unit.to_string(),
                pack_size: Decimal::new(seed.pack_size, 2),
                price_matrix: seed
                    .matrix
                    .iter()
                    .map(|(width, price)| PriceTier { width: *width, price: Decimal::new(*price, 0) })
                    .collect(),
            })
            .collect()
    }

    /// Upserts every demo product by SKU, so reseeding never duplicates rows.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let repo = SqlCatalogRepository::new(pool.clone());
        let before = repo.count().await?;

        let mut seeded = Vec::with_capacity(SEED_PRODUCTS.len());
        for product in Self::products() {
            let id = repo.upsert(&product).await?;
            seeded.push(id);
        }

        let after = repo.count().await?;
        Ok(SeedResult { products_seeded: seeded, products_created: after.saturating_sub(before) })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub products_seeded: Vec<ProductId>,
    pub products_created: u64,
}
