use std::sync::Arc;
use axum::{Extension, Json, Router};
use axum::routing::get;
use rust_decimal::Decimal;
use serde::Serialize;
use crate::config::Config;
use crate::controller::AppState;
use crate::error::AppError;
use crate::models::banner::Banner;
use crate::models::product::{Product, ProductCategory};
use crate::repositories::postgres_repo::PostgresConnectionRepo;

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/products", get(list_available_products))
        .route("/banners", get(list_banners))
        .route_layer(Extension(app_state.postgres_repo))
        .route_layer(Extension(app_state.config))
}

#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct CatalogProduct {
    pub id: i32,
    pub name: String,
    pub price: Decimal,
    pub special_status: bool,
    pub description: String,
    pub category: Option<ProductCategory>,
    pub image: String,
}

impl CatalogProduct {
    fn from_product(product: Product, media_url: &str) -> Self {
        Self {
            id: product.id,
            name: product.name,
            price: product.price,
            special_status: product.special_status,
            description: product.description,
            category: product.category,
            image: format!("{}{}", media_url, product.image),
        }
    }
}

/// Products that at least one restaurant has on sale
pub async fn list_available_products(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    Extension(config): Extension<Arc<Config>>,
) -> Result<Json<Vec<CatalogProduct>>, AppError> {
    let products = postgres_repo.retrieve_available_products().await?;

    Ok(Json(
        products
            .into_iter()
            .map(|product| CatalogProduct::from_product(product, &config.media_url))
            .collect(),
    ))
}

pub async fn list_banners(
    Extension(config): Extension<Arc<Config>>,
) -> Json<Vec<Banner>> {
    Json(banners(&config.static_url))
}

fn banners(static_url: &str) -> Vec<Banner> {
    [
        ("Burger", "burger.jpg", "Tasty Burger at your door step"),
        ("Spices", "food.jpg", "All Cuisines"),
        ("New York", "tasty.jpg", "Food is incomplete without a tasty dessert"),
    ]
    .into_iter()
    .map(|(title, file, text)| Banner {
        title: title.to_string(),
        src: format!("{}{}", static_url, file),
        text: text.to_string(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_is_served_from_media_url() {
        let product = Product {
            id: 3,
            name: "Cheeseburger".to_string(),
            category: Some(ProductCategory { id: 1, name: "Burgers".to_string() }),
            price: Decimal::new(24950, 2),
            image: "cheeseburger.png".to_string(),
            special_status: true,
            description: "With cheddar".to_string(),
        };

        let catalog_product = CatalogProduct::from_product(product, "/media/");
        assert_eq!(catalog_product.image, "/media/cheeseburger.png");
        assert_eq!(catalog_product.price, Decimal::new(24950, 2));
    }

    #[test]
    fn banners_point_at_static_files() {
        let banners = banners("https://cdn.example.com/static/");
        assert_eq!(banners.len(), 3);
        assert_eq!(banners[0].src, "https://cdn.example.com/static/burger.jpg");
    }
}
