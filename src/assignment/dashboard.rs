use std::collections::HashSet;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;
use crate::assignment::availability::MenuAvailabilityIndex;
use crate::assignment::matcher::match_restaurants;
use crate::geocoding::distance::{rank, RankedCandidate};
use crate::geocoding::geocoder::Geocoder;
use crate::models::menu::MenuEntry;
use crate::models::order::Order;
use crate::models::restaurant::Restaurant;

/// An order as shown on the staff dashboard.
#[derive(Clone, Serialize, Debug)]
pub struct OrderAssignment {
    pub order: Order,
    pub total: Decimal,
    pub address_not_found: bool,
    /// Empty when the order address could not be geocoded
    pub restaurants: Vec<RankedCandidate>,
}

/// Matches and ranks restaurants for every given order. Nothing is persisted,
/// the result is recomputed on each call.
pub async fn assign_orders(
    geocoder: &Geocoder,
    orders: Vec<Order>,
    restaurants: &[Restaurant],
    menu: &[MenuEntry],
) -> Vec<OrderAssignment> {
    let index = MenuAvailabilityIndex::build(menu);

    let matched: Vec<Vec<&Restaurant>> = orders
        .iter()
        .map(|order| match_restaurants(order, restaurants, &index))
        .collect();

    let addresses: HashSet<String> = orders
        .iter()
        .map(|order| order.address.clone())
        .chain(matched.iter().flatten().map(|restaurant| restaurant.address.clone()))
        .collect();
    let coordinates = geocoder.resolve_all(&addresses).await;

    orders
        .into_iter()
        .zip(matched)
        .map(|(order, candidates)| {
            let Some(order_coordinates) = coordinates.get(&order.address).copied() else {
                warn!("Order {} has an address that could not be geocoded: {}", order.id, order.address);
                return OrderAssignment {
                    total: order.total(),
                    order,
                    address_not_found: true,
                    restaurants: Vec::new(),
                };
            };

            let candidates = candidates
                .into_iter()
                .map(|restaurant| (restaurant.clone(), coordinates.get(&restaurant.address).copied()))
                .collect();

            OrderAssignment {
                total: order.total(),
                order,
                address_not_found: false,
                restaurants: rank(order_coordinates, candidates),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use rust_decimal::Decimal;
    use time::OffsetDateTime;
    use crate::geocoding::cache::memory::InMemoryGeoCache;
    use crate::geocoding::distance::Distance;
    use crate::geocoding::geocoder::testing::StaticProvider;
    use crate::models::order::{OrderItem, OrderStatus};
    use crate::models::place::Coordinates;
    use super::*;

    const X: i32 = 10;
    const Y: i32 = 11;

    fn restaurant(id: i32, name: &str, address: &str) -> Restaurant {
        Restaurant {
            id,
            name: name.to_string(),
            address: address.to_string(),
            contact_phone: String::new(),
        }
    }

    fn order(id: i32, address: &str, products: &[i32]) -> Order {
        Order {
            id,
            firstname: "Petr".to_string(),
            lastname: "Sidorov".to_string(),
            phonenumber: "+79031112233".to_string(),
            address: address.to_string(),
            status: OrderStatus::Raw,
            payment_method: None,
            comment: String::new(),
            registered_at: OffsetDateTime::UNIX_EPOCH,
            called_at: None,
            delivered_at: None,
            restaurant_id: None,
            items: products
                .iter()
                .map(|&product_id| OrderItem { product_id, quantity: 1, price: Decimal::TEN })
                .collect(),
        }
    }

    fn menu() -> Vec<MenuEntry> {
        [(1, X), (1, Y), (2, X), (2, Y), (3, X)]
            .into_iter()
            .map(|(restaurant_id, product_id)| MenuEntry { restaurant_id, product_id, availability: true })
            .collect()
    }

    fn restaurants() -> Vec<Restaurant> {
        vec![
            restaurant(2, "Restaurant2", "Far street"),
            restaurant(1, "Restaurant1", "Near street"),
            restaurant(3, "Restaurant3", "Near street"),
        ]
    }

    fn geocoder(provider: Arc<StaticProvider>) -> Geocoder {
        Geocoder::new(Arc::new(InMemoryGeoCache::default()), provider)
    }

    #[tokio::test]
    async fn candidates_are_matched_and_ranked_by_distance() {
        let provider = Arc::new(StaticProvider::new(&[
            ("Customer street", Coordinates::new(37.62, 55.75)),
            ("Near street", Coordinates::new(37.60, 55.74)),
            ("Far street", Coordinates::new(37.70, 55.80)),
        ]));

        let dashboard = assign_orders(
            &geocoder(provider),
            vec![order(1, "Customer street", &[X, Y])],
            &restaurants(),
            &menu(),
        )
        .await;

        assert_eq!(dashboard.len(), 1);
        assert!(!dashboard[0].address_not_found);
        let names: Vec<&str> = dashboard[0]
            .restaurants
            .iter()
            .map(|candidate| candidate.restaurant.name.as_str())
            .collect();
        assert_eq!(names, vec!["Restaurant1", "Restaurant2"]);
    }

    #[tokio::test]
    async fn unresolvable_order_address_is_flagged() {
        let provider = Arc::new(StaticProvider::new(&[
            ("Near street", Coordinates::new(37.60, 55.74)),
            ("Far street", Coordinates::new(37.70, 55.80)),
        ]));

        let dashboard = assign_orders(
            &geocoder(provider),
            vec![order(1, "Atlantis", &[X, Y])],
            &restaurants(),
            &menu(),
        )
        .await;

        assert!(dashboard[0].address_not_found);
        assert!(dashboard[0].restaurants.is_empty());
    }

    #[tokio::test]
    async fn one_bad_address_does_not_affect_other_orders() {
        let provider = Arc::new(StaticProvider::new(&[
            ("Customer street", Coordinates::new(37.62, 55.75)),
            ("Near street", Coordinates::new(37.60, 55.74)),
        ]));

        let dashboard = assign_orders(
            &geocoder(provider),
            vec![order(1, "Atlantis", &[X]), order(2, "Customer street", &[X, Y])],
            &restaurants(),
            &menu(),
        )
        .await;

        assert!(dashboard[0].address_not_found);
        assert!(!dashboard[1].address_not_found);
        let ranked = &dashboard[1].restaurants;
        assert_eq!(ranked[0].restaurant.name, "Restaurant1");
        assert!(matches!(ranked[0].distance, Distance::Km(_)));
        assert_eq!(ranked[1].restaurant.name, "Restaurant2");
        assert_eq!(ranked[1].distance, Distance::Unknown);
    }

    #[tokio::test]
    async fn shared_addresses_are_geocoded_once() {
        let provider = Arc::new(StaticProvider::new(&[
            ("Customer street", Coordinates::new(37.62, 55.75)),
            ("Near street", Coordinates::new(37.60, 55.74)),
            ("Far street", Coordinates::new(37.70, 55.80)),
        ]));
        let geocoder = geocoder(provider.clone());
        let orders = vec![order(1, "Customer street", &[X]), order(2, "Customer street", &[X])];

        assign_orders(&geocoder, orders.clone(), &restaurants(), &menu()).await;
        assert_eq!(provider.calls(), 3);

        assign_orders(&geocoder, orders, &restaurants(), &menu()).await;
        assert_eq!(provider.calls(), 3);
    }
}
