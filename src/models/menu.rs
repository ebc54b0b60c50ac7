use serde::{Deserialize, Serialize};

/// A restaurant stocks a product. Unique per (restaurant_id, product_id).
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct MenuEntry {
    pub restaurant_id: i32,
    pub product_id: i32,
    pub availability: bool,
}
