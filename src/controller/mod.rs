use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Context;
use axum::http::HeaderValue;
use axum::Router;
use bb8_postgres::bb8::Pool;
use bb8_postgres::PostgresConnectionManager;
use bb8_postgres::tokio_postgres::NoTls;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tracing::info;
use crate::config::Config;
use crate::geocoding::geocoder::Geocoder;
use crate::helpers::handler_404::page_not_found_handler;
use crate::repositories::postgres_repo::PostgresConnectionRepo;

pub mod catalog_controller;
pub mod health_check;
pub mod manager_controller;
pub mod order_controller;

#[derive(Clone)]
pub struct AppState {
    pub postgres_repo: Arc<PostgresConnectionRepo>,
    pub geocoder: Arc<Geocoder>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        postgres_connection: Pool<PostgresConnectionManager<NoTls>>,
        geocoder: Arc<Geocoder>,
        config: Config,
    ) -> Self {
        Self {
            postgres_repo: Arc::new(PostgresConnectionRepo::new(postgres_connection)),
            geocoder,
            config: Arc::new(config),
        }
    }
}

pub async fn serve(
    app_state: AppState,
) -> anyhow::Result<()> {
    let origins = app_state.config
        .origin_urls
        .split(',')
        .map(|s| s.trim().parse::<HeaderValue>())
        .collect::<Result<Vec<HeaderValue>, _>>()
        .context("Invalid origin url")?;
    let port = SocketAddr::from(([0, 0, 0, 0], app_state.config.port));

    let application = router_endpoints(app_state)
        .layer(
            ServiceBuilder::new()
                .layer(CompressionLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_methods([
                            Method::GET,
                            Method::POST,
                            Method::PUT,
                            Method::PATCH,
                            Method::DELETE,
                            Method::OPTIONS
                        ])
                        .allow_origin(origins)
                        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                )
        );

    info!("API server listening on port: {}", port);
    axum::Server::bind(&port)
        .serve(application.into_make_service())
        .await
        .context("Error spinning up the API server")
}

pub fn router_endpoints(app_state: AppState) -> Router {
    Router::new()
        .merge(health_check::router())
        .nest(
            "/api",
            catalog_controller::router(app_state.clone())
                .merge(order_controller::router(app_state.clone())),
        )
        .nest("/manager", manager_controller::router(app_state))
        .fallback(page_not_found_handler)
}


#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use super::testing::offline_state;
    use super::*;

    #[tokio::test]
    async fn health_check_is_ok() {
        let response = router_endpoints(offline_state())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let response = router_endpoints(offline_state())
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn banners_are_served_without_database() {
        let response = router_endpoints(offline_state())
            .oneshot(Request::builder().uri("/api/banners").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
