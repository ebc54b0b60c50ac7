use std::collections::HashMap;
use async_trait::async_trait;
use crate::models::place::Coordinates;
use crate::repositories::postgres_repo::PostgresConnectionRepo;

/// Durable memo of address -> coordinates.
///
/// Keys are matched as exact strings, `"Moscow, Tverskaya 1"` and
/// `"Moscow, Tverskaya 1 "` are different entries. Entries never expire.
#[async_trait]
pub trait GeoCache: Send + Sync {
    async fn lookup(&self, address: &str) -> anyhow::Result<Option<Coordinates>>;

    /// Returns only the addresses that are cached.
    async fn lookup_many(&self, addresses: &[String]) -> anyhow::Result<HashMap<String, Coordinates>>;

    /// Upsert, so concurrent stores of the same address do not fail.
    async fn store(&self, address: &str, coordinates: Coordinates) -> anyhow::Result<()>;
}

#[async_trait]
impl GeoCache for PostgresConnectionRepo {
    async fn lookup(&self, address: &str) -> anyhow::Result<Option<Coordinates>> {
        Ok(self.retrieve_place(address).await?.map(|place| place.coordinates))
    }

    async fn lookup_many(&self, addresses: &[String]) -> anyhow::Result<HashMap<String, Coordinates>> {
        let places = self.retrieve_places(addresses).await?;
        Ok(places
            .into_iter()
            .map(|place| (place.address, place.coordinates))
            .collect())
    }

    async fn store(&self, address: &str, coordinates: Coordinates) -> anyhow::Result<()> {
        self.upsert_place(address, coordinates).await
    }
}
