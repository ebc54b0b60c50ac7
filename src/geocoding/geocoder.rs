use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};
use crate::geocoding::cache::GeoCache;
use crate::models::place::Coordinates;

#[derive(Clone, Debug)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub api_key: String,
}

/// External service turning a free-text address into coordinates.
/// `Ok(None)` means the provider answered but found nothing.
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    async fn geocode(&self, address: &str) -> anyhow::Result<Option<Coordinates>>;
}

/// Yandex geocoder HTTP API.
pub struct YandexGeocoder {
    client: reqwest::Client,
    config: GeocoderConfig,
}

impl YandexGeocoder {
    pub fn new(config: GeocoderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl GeocodingProvider for YandexGeocoder {
    async fn geocode(&self, address: &str) -> anyhow::Result<Option<Coordinates>> {
        let body = self.client
            .get(&self.config.base_url)
            .query(&[
                ("geocode", address),
                ("apikey", self.config.api_key.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .context("Geocoder request failed")?
            .error_for_status()
            .context("Geocoder returned an error status")?
            .text()
            .await
            .context("Failed to read geocoder response")?;

        parse_geocoder_response(&body)
    }
}

#[derive(Deserialize, Debug)]
struct GeocoderResponse {
    response: GeocoderResponseBody,
}

#[derive(Deserialize, Debug)]
struct GeocoderResponseBody {
    #[serde(rename = "GeoObjectCollection")]
    geo_object_collection: GeoObjectCollection,
}

#[derive(Deserialize, Debug)]
struct GeoObjectCollection {
    #[serde(rename = "featureMember")]
    feature_member: Vec<FeatureMember>,
}

#[derive(Deserialize, Debug)]
struct FeatureMember {
    #[serde(rename = "GeoObject")]
    geo_object: GeoObject,
}

#[derive(Deserialize, Debug)]
struct GeoObject {
    #[serde(rename = "Point")]
    point: Point,
}

#[derive(Deserialize, Debug)]
struct Point {
    pos: String,
}

/// Takes the first (most relevant) candidate. An empty candidate list is
/// `Ok(None)`, an unexpected shape is an error.
fn parse_geocoder_response(body: &str) -> anyhow::Result<Option<Coordinates>> {
    let response: GeocoderResponse = serde_json::from_str(body)
        .context("Unexpected geocoder response shape")?;

    match response.response.geo_object_collection.feature_member.first() {
        Some(most_relevant) => parse_pos(&most_relevant.geo_object.point.pos).map(Some),
        None => Ok(None),
    }
}

/// `pos` is "longitude latitude".
fn parse_pos(pos: &str) -> anyhow::Result<Coordinates> {
    let mut parts = pos.split_whitespace();
    let (Some(lon), Some(lat), None) = (parts.next(), parts.next(), parts.next()) else {
        anyhow::bail!("Malformed point: {:?}", pos);
    };
    let lon: f64 = lon.parse().with_context(|| format!("Malformed longitude: {}", lon))?;
    let lat: f64 = lat.parse().with_context(|| format!("Malformed latitude: {}", lat))?;
    Ok(Coordinates::new(lon, lat))
}

/// Resolves addresses through the cache first, the provider second.
/// Never fails: every problem ends up as a missing coordinate.
pub struct Geocoder {
    cache: Arc<dyn GeoCache>,
    provider: Arc<dyn GeocodingProvider>,
}

impl Geocoder {
    pub fn new(cache: Arc<dyn GeoCache>, provider: Arc<dyn GeocodingProvider>) -> Self {
        Self { cache, provider }
    }

    pub async fn resolve(&self, address: &str) -> Option<Coordinates> {
        match self.cache.lookup(address).await {
            Ok(Some(coordinates)) => {
                debug!("Geocache hit for address: {}", address);
                return Some(coordinates);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Failed to read geocache for address: {}, due to: {}", address, e);
            }
        }

        self.fetch_and_store(address).await
    }

    /// Addresses that cannot be resolved are absent from the result.
    pub async fn resolve_all(&self, addresses: &HashSet<String>) -> HashMap<String, Coordinates> {
        let addresses: Vec<String> = addresses.iter().cloned().collect();
        let mut resolved = match self.cache.lookup_many(&addresses).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!("Failed to read geocache in bulk, falling back to the provider: {}", e);
                HashMap::new()
            }
        };

        let missing: Vec<String> = addresses
            .into_iter()
            .filter(|address| !resolved.contains_key(address))
            .collect();

        for address in missing {
            if let Some(coordinates) = self.fetch_and_store(&address).await {
                resolved.insert(address, coordinates);
            }
        }

        resolved
    }

    async fn fetch_and_store(&self, address: &str) -> Option<Coordinates> {
        let coordinates = match self.provider.geocode(address).await {
            Ok(Some(coordinates)) => coordinates,
            Ok(None) => {
                warn!("Address not found: {}", address);
                return None;
            }
            Err(e) => {
                warn!("Failed to geocode address: {}, due to: {:#}", address, e);
                return None;
            }
        };

        info!("Geocoded address: {} -> ({}, {})", address, coordinates.lon, coordinates.lat);
        if let Err(e) = self.cache.store(address, coordinates).await {
            warn!("Failed to store geocache entry for address: {}, due to: {}", address, e);
        }
        Some(coordinates)
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use async_trait::async_trait;
    use crate::models::place::Coordinates;
    use super::GeocodingProvider;

    /// Provider answering from a fixed table and counting calls.
    #[derive(Default)]
    pub struct StaticProvider {
        known: HashMap<String, Coordinates>,
        calls: AtomicUsize,
    }

    impl StaticProvider {
        pub fn new(known: &[(&str, Coordinates)]) -> Self {
            Self {
                known: known.iter().map(|(a, c)| (a.to_string(), *c)).collect(),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GeocodingProvider for StaticProvider {
        async fn geocode(&self, address: &str) -> anyhow::Result<Option<Coordinates>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.known.get(address).copied())
        }
    }
}
