use std::collections::{HashMap, HashSet};
use serde::Serialize;
use crate::models::menu::MenuEntry;
use crate::models::product::Product;
use crate::models::restaurant::Restaurant;

/// Products each restaurant currently stocks.
///
/// Rebuilt from a full snapshot of menu rows on every request. Rows with
/// `availability = false` contribute nothing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MenuAvailabilityIndex {
    stocked: HashMap<i32, HashSet<i32>>,
}

impl MenuAvailabilityIndex {
    pub fn build(entries: &[MenuEntry]) -> Self {
        let mut stocked: HashMap<i32, HashSet<i32>> = HashMap::new();
        for entry in entries.iter().filter(|entry| entry.availability) {
            stocked
                .entry(entry.restaurant_id)
                .or_default()
                .insert(entry.product_id);
        }
        Self { stocked }
    }

    #[cfg(test)]
    pub fn stocked_products(&self, restaurant_id: i32) -> Option<&HashSet<i32>> {
        self.stocked.get(&restaurant_id)
    }

    pub fn stocks_all(&self, restaurant_id: i32, products: &HashSet<i32>) -> bool {
        match self.stocked.get(&restaurant_id) {
            Some(stocked) => products.is_subset(stocked),
            None => products.is_empty(),
        }
    }
}

/// One row of the staff product table: a flag per restaurant, in the
/// restaurant order given to [`availability_matrix`].
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct ProductAvailability {
    pub product: Product,
    pub availability: Vec<bool>,
}

/// Unlike the index, this reports the raw menu flag, and `false` when a
/// restaurant has no menu row for the product.
pub fn availability_matrix(
    products: Vec<Product>,
    restaurants: &[Restaurant],
    entries: &[MenuEntry],
) -> Vec<ProductAvailability> {
    let flags: HashMap<(i32, i32), bool> = entries
        .iter()
        .map(|entry| ((entry.product_id, entry.restaurant_id), entry.availability))
        .collect();

    products
        .into_iter()
        .map(|product| {
            let availability = restaurants
                .iter()
                .map(|restaurant| {
                    flags
                        .get(&(product.id, restaurant.id))
                        .copied()
                        .unwrap_or(false)
                })
                .collect();
            ProductAvailability { product, availability }
        })
        .collect()
}
