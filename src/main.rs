use std::sync::Arc;
use anyhow::Context;
use bb8_postgres::bb8::Pool;
use bb8_postgres::PostgresConnectionManager;
use bb8_postgres::tokio_postgres::NoTls;
use clap::Parser;
use dotenv::dotenv;
use tracing::info;
use star_burger_backend::config::Config;
use star_burger_backend::controller::{self, AppState};
use star_burger_backend::geocoding::geocoder::{Geocoder, YandexGeocoder};
use star_burger_backend::repositories::postgres_repo::PostgresConnectionRepo;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::parse();
    info!("Starting star burger backend in {} environment", config.environment);

    let manager = PostgresConnectionManager::new_from_stringlike(&config.database_url, NoTls)
        .context("Invalid DATABASE_URL")?;
    let postgres_connection = Pool::builder()
        .max_size(config.pool_size())
        .build(manager)
        .await
        .context("Failed to build postgres connection pool")?;

    let geocoder = Geocoder::new(
        Arc::new(PostgresConnectionRepo::new(postgres_connection.clone())),
        Arc::new(YandexGeocoder::new(config.geocoder_config())),
    );

    let app_state = AppState::new(postgres_connection, Arc::new(geocoder), config);
    controller::serve(app_state).await
}
