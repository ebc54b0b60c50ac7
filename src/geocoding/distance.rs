use std::cmp::Ordering;
use geo::{GeodesicDistance, Point};
use serde::Serialize;
use crate::models::place::Coordinates;
use crate::models::restaurant::Restaurant;

#[derive(Clone, Copy, Serialize, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    Km(f64),
    Unknown,
}

impl Distance {
    fn cmp_nearest_first(&self, other: &Distance) -> Ordering {
        match (self, other) {
            (Distance::Km(a), Distance::Km(b)) => a.total_cmp(b),
            (Distance::Km(_), Distance::Unknown) => Ordering::Less,
            (Distance::Unknown, Distance::Km(_)) => Ordering::Greater,
            (Distance::Unknown, Distance::Unknown) => Ordering::Equal,
        }
    }
}

/// A restaurant able to cook an order, with its distance to the customer.
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct RankedCandidate {
    pub restaurant: Restaurant,
    pub distance: Distance,
}

/// WGS-84 geodesic distance in kilometers, rounded to 2 decimals.
pub fn distance_km(from: Coordinates, to: Coordinates) -> Option<f64> {
    if !from.is_valid() || !to.is_valid() {
        return None;
    }

    let meters = Point::new(from.lon, from.lat).geodesic_distance(&Point::new(to.lon, to.lat));
    if !meters.is_finite() {
        return None;
    }
    Some((meters / 10.0).round() / 100.0)
}

/// Nearest first, unknown distances last, ties by restaurant name.
pub fn rank(
    order_coordinates: Coordinates,
    candidates: Vec<(Restaurant, Option<Coordinates>)>,
) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = candidates
        .into_iter()
        .map(|(restaurant, coordinates)| {
            let distance = coordinates
                .and_then(|coordinates| distance_km(order_coordinates, coordinates))
                .map_or(Distance::Unknown, Distance::Km);
            RankedCandidate { restaurant, distance }
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.distance
            .cmp_nearest_first(&b.distance)
            .then_with(|| a.restaurant.name.cmp(&b.restaurant.name))
    });
    ranked
}
