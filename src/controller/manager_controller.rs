use std::sync::Arc;
use axum::{Extension, Json, Router};
use axum::extract::{Path, Query};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch, put};
use serde::{Deserialize, Serialize};
use tracing::info;
use crate::assignment::availability::{availability_matrix, ProductAvailability};
use crate::assignment::dashboard::{assign_orders, OrderAssignment};
use crate::controller::AppState;
use crate::error::{AppError, ValidationErrors};
use crate::geocoding::geocoder::Geocoder;
use crate::helpers::auth::{require_manager, ManagerToken};
use crate::models::menu::MenuEntry;
use crate::models::order::{Order, OrderUpdate};
use crate::models::restaurant::Restaurant;
use crate::repositories::postgres_repo::PostgresConnectionRepo;

pub fn router(app_state: AppState) -> Router {
    let token = ManagerToken(Arc::from(app_state.config.manager_token.as_str()));

    Router::new()
        .route("/orders", get(retrieve_order_dashboard))
        .route("/orders/:order_id", patch(update_order))
        .route("/restaurants", get(retrieve_restaurants))
        .route("/products", get(retrieve_product_availability))
        .route("/menu", put(upsert_menu_entry).delete(remove_menu_entry))
        .route_layer(Extension(app_state.postgres_repo))
        .route_layer(Extension(app_state.geocoder))
        .route_layer(from_fn_with_state(token, require_manager))
}

/// Pending orders with the restaurants able to cook them, nearest first
pub async fn retrieve_order_dashboard(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    Extension(geocoder): Extension<Arc<Geocoder>>,
) -> Result<Json<Vec<OrderAssignment>>, AppError> {
    let orders = postgres_repo.retrieve_pending_orders().await?;
    let restaurants = postgres_repo.retrieve_restaurants().await?;
    let menu = postgres_repo.retrieve_menu_entries().await?;

    Ok(Json(assign_orders(&geocoder, orders, &restaurants, &menu).await))
}

pub async fn update_order(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    Path(order_id): Path<i32>,
    update: Result<Json<OrderUpdate>, JsonRejection>,
) -> Result<Json<Order>, AppError> {
    let Json(update) = update.map_err(malformed_body)?;
    if let Some(Some(restaurant_id)) = update.restaurant_id {
        if postgres_repo.retrieve_restaurant(restaurant_id).await?.is_none() {
            return Err(AppError::Validation(ValidationErrors::single(
                "restaurant_id",
                format!("Invalid pk \"{}\" - object does not exist.", restaurant_id),
            )));
        }
    }

    let order = postgres_repo
        .update_order(order_id, update)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {}", order_id)))?;

    info!("Order {} updated, status: {}", order.id, order.status);
    Ok(Json(order))
}

fn malformed_body(rejection: JsonRejection) -> AppError {
    AppError::Validation(ValidationErrors::single("non_field_errors", rejection.body_text()))
}

pub async fn retrieve_restaurants(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
) -> Result<Json<Vec<Restaurant>>, AppError> {
    Ok(Json(postgres_repo.retrieve_restaurants().await?))
}

#[derive(Clone, Serialize, Debug)]
pub struct ProductAvailabilityTable {
    pub restaurants: Vec<Restaurant>,
    pub products: Vec<ProductAvailability>,
}

pub async fn retrieve_product_availability(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
) -> Result<Json<ProductAvailabilityTable>, AppError> {
    let restaurants = postgres_repo.retrieve_restaurants().await?;
    let products = postgres_repo.retrieve_products().await?;
    let menu = postgres_repo.retrieve_menu_entries().await?;

    let products = availability_matrix(products, &restaurants, &menu);
    Ok(Json(ProductAvailabilityTable { restaurants, products }))
}

pub async fn upsert_menu_entry(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    entry: Result<Json<MenuEntry>, JsonRejection>,
) -> Result<Json<MenuEntry>, AppError> {
    let Json(entry) = entry.map_err(malformed_body)?;
    if !postgres_repo.upsert_menu_entry(&entry).await? {
        let mut errors = ValidationErrors::default();
        errors.add("restaurant_id", "Restaurant or product does not exist.");
        errors.add("product_id", "Restaurant or product does not exist.");
        return Err(AppError::Validation(errors));
    }

    info!(
        "Menu entry for restaurant: {}, product: {} set to available: {}",
        entry.restaurant_id, entry.product_id, entry.availability
    );
    Ok(Json(entry))
}

#[derive(Clone, Deserialize, Debug)]
pub struct MenuEntryQuery {
    pub restaurant_id: i32,
    pub product_id: i32,
}

pub async fn remove_menu_entry(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    Query(query): Query<MenuEntryQuery>,
) -> Result<StatusCode, AppError> {
    let removed = postgres_repo
        .remove_menu_entry(query.restaurant_id, query.product_id)
        .await?;

    if !removed {
        return Err(AppError::NotFound(format!(
            "menu entry for restaurant {} and product {}",
            query.restaurant_id, query.product_id
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, HttpBody};
    use axum::http::{header, Request};
    use tower::ServiceExt;
    use crate::controller::router_endpoints;
    use crate::controller::testing::{offline_state, MANAGER_TOKEN};

    async fn status_for(method: &str, uri: &str, authorization: Option<&str>) -> axum::http::StatusCode {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(value) = authorization {
            request = request.header(header::AUTHORIZATION, value);
        }
        router_endpoints(offline_state())
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn back_office_requires_manager_token() {
        for (method, uri) in [
            ("GET", "/manager/orders"),
            ("GET", "/manager/restaurants"),
            ("GET", "/manager/products"),
            ("PATCH", "/manager/orders/1"),
            ("PUT", "/manager/menu"),
            ("DELETE", "/manager/menu?restaurant_id=1&product_id=2"),
        ] {
            assert_eq!(
                status_for(method, uri, None).await,
                axum::http::StatusCode::UNAUTHORIZED,
                "{} {}",
                method,
                uri
            );
        }
    }

    #[tokio::test]
    async fn authorized_request_reaches_the_handler() {
        // The body is missing, so the handler rejects it before using the pool.
        let authorization = format!("Bearer {}", MANAGER_TOKEN);
        let status = status_for("PUT", "/manager/menu", Some(&authorization)).await;

        assert_ne!(status, axum::http::StatusCode::UNAUTHORIZED);
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn malformed_body_is_reported_as_validation_errors() {
        for (method, uri, body) in [
            ("PATCH", "/manager/orders/1", r#"{"status": "Lost"}"#),
            ("PUT", "/manager/menu", r#"{"restaurant_id": "one"}"#),
        ] {
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", MANAGER_TOKEN))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap();
            let response = router_endpoints(offline_state()).oneshot(request).await.unwrap();

            assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST, "{} {}", method, uri);
            let mut body = response.into_body();
            let mut bytes = Vec::new();
            while let Some(chunk) = body.data().await {
                bytes.extend_from_slice(&chunk.unwrap());
            }
            let errors: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert!(errors.get("non_field_errors").is_some(), "{} {}", method, uri);
        }
    }
}
