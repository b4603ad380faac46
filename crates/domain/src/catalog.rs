//! Static product catalog: store product id to credit count

use serde::{Deserialize, Serialize};

use crate::constants::{
    PRODUCT_BASIC, PRODUCT_BUSINESS, PRODUCT_PRO, PRODUCT_STANDARD,
};

/// A consumable credit pack sold through the purchase authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub credits: u32,
    /// Highlighted as "popular" by storefronts
    #[serde(default)]
    pub popular: bool,
}

impl Product {
    pub fn new(id: impl Into<String>, credits: u32) -> Self {
        Self { id: id.into(), credits, popular: false }
    }

    #[must_use]
    pub fn popular(mut self) -> Self {
        self.popular = true;
        self
    }
}

/// Lookup table from product id to credits granted.
///
/// Unknown product ids grant 0 credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCatalog {
    products: Vec<Product>,
}

impl ProductCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    /// The four credit packs currently on sale.
    pub fn standard() -> Self {
        Self::new(vec![
            Product::new(PRODUCT_BASIC, 10),
            Product::new(PRODUCT_STANDARD, 25).popular(),
            Product::new(PRODUCT_PRO, 60),
            Product::new(PRODUCT_BUSINESS, 150),
        ])
    }

    pub fn credits_for(&self, product_id: &str) -> u32 {
        self.get(product_id).map_or(0, |p| p.credits)
    }

    pub fn get(&self, product_id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == product_id)
    }

    pub fn product_ids(&self) -> impl Iterator<Item = &str> {
        self.products.iter().map(|p| p.id.as_str())
    }

    pub fn is_popular(&self, product_id: &str) -> bool {
        self.get(product_id).is_some_and(|p| p.popular)
    }
}

impl Default for ProductCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
