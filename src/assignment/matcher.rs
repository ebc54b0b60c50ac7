use std::collections::HashSet;
use crate::assignment::availability::MenuAvailabilityIndex;
use crate::models::order::Order;
use crate::models::restaurant::Restaurant;

/// Restaurants able to cook every product of the order.
///
/// A manually assigned restaurant is returned alone and skips matching. The
/// result keeps the order of `restaurants`; ranking happens later.
pub fn match_restaurants<'a>(
    order: &Order,
    restaurants: &'a [Restaurant],
    index: &MenuAvailabilityIndex,
) -> Vec<&'a Restaurant> {
    if let Some(assigned) = order.restaurant_id {
        return restaurants
            .iter()
            .filter(|restaurant| restaurant.id == assigned)
            .collect();
    }

    let ordered: HashSet<i32> = order.items.iter().map(|item| item.product_id).collect();
    restaurants
        .iter()
        .filter(|restaurant| index.stocks_all(restaurant.id, &ordered))
        .collect()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use time::OffsetDateTime;
    use crate::models::menu::MenuEntry;
    use crate::models::order::{OrderItem, OrderStatus};
    use super::*;

    const X: i32 = 10;
    const Y: i32 = 11;
    const Z: i32 = 12;

    fn restaurant(id: i32, name: &str) -> Restaurant {
        Restaurant {
            id,
            name: name.to_string(),
            address: String::new(),
            contact_phone: String::new(),
        }
    }

    fn order(products: &[i32], restaurant_id: Option<i32>) -> Order {
        Order {
            id: 1,
            firstname: "Anna".to_string(),
            lastname: "Ivanova".to_string(),
            phonenumber: "+79001234567".to_string(),
            address: "Moscow".to_string(),
            status: OrderStatus::Raw,
            payment_method: None,
            comment: String::new(),
            registered_at: OffsetDateTime::UNIX_EPOCH,
            called_at: None,
            delivered_at: None,
            restaurant_id,
            items: products
                .iter()
                .map(|&product_id| OrderItem { product_id, quantity: 1, price: Decimal::ONE })
                .collect(),
        }
    }

    fn available(restaurant_id: i32, product_id: i32) -> MenuEntry {
        MenuEntry { restaurant_id, product_id, availability: true }
    }

    #[test]
    fn only_restaurants_stocking_every_product_match() {
        let restaurants = vec![restaurant(1, "Restaurant1"), restaurant(2, "Restaurant2")];
        let index = MenuAvailabilityIndex::build(&[
            available(1, X),
            available(1, Y),
            available(1, Z),
            available(2, X),
        ]);

        let matched = match_restaurants(&order(&[X, Y], None), &restaurants, &index);
        assert_eq!(matched, vec![&restaurants[0]]);
    }

    #[test]
    fn temporarily_unavailable_product_excludes_restaurant() {
        let restaurants = vec![restaurant(1, "Restaurant1")];
        let index = MenuAvailabilityIndex::build(&[
            available(1, X),
            MenuEntry { restaurant_id: 1, product_id: Y, availability: false },
        ]);

        assert!(match_restaurants(&order(&[X, Y], None), &restaurants, &index).is_empty());
    }

    #[test]
    fn manual_assignment_overrides_matching() {
        let restaurants = vec![restaurant(1, "Restaurant1"), restaurant(2, "Restaurant2")];
        let index = MenuAvailabilityIndex::build(&[available(1, X)]);

        let matched = match_restaurants(&order(&[X], Some(2)), &restaurants, &index);
        assert_eq!(matched, vec![&restaurants[1]]);
    }

    #[test]
    fn repeated_products_count_once() {
        let restaurants = vec![restaurant(1, "Restaurant1")];
        let index = MenuAvailabilityIndex::build(&[available(1, X)]);

        let matched = match_restaurants(&order(&[X, X], None), &restaurants, &index);
        assert_eq!(matched.len(), 1);
    }
}
