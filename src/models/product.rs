use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ProductCategory {
    pub id: i32,
    pub name: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub category: Option<ProductCategory>,
    pub price: Decimal,
    /// Relative path under the media url
    pub image: String,
    pub special_status: bool,
    pub description: String,
}
