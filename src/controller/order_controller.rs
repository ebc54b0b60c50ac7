use std::sync::Arc;
use axum::{Extension, Json, Router};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::routing::post;
use serde::Deserialize;
use tracing::{info, warn};
use crate::controller::AppState;
use crate::error::{AppError, ValidationErrors};
use crate::models::order::{NewOrder, NewOrderLine, Order};
use crate::repositories::postgres_repo::PostgresConnectionRepo;

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/order", post(register_order))
        .route_layer(Extension(app_state.postgres_repo))
}

#[derive(Clone, Deserialize, Debug)]
pub struct OrderLinePayload {
    pub product: i32,
    pub quantity: i32,
}

/// Every field is optional here so that missing ones are reported per field.
#[derive(Clone, Deserialize, Debug, Default)]
pub struct OrderPayload {
    #[serde(default)]
    pub products: Option<Vec<OrderLinePayload>>,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub phonenumber: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

pub async fn register_order(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    payload: Result<Json<OrderPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let Json(payload) = payload.map_err(|rejection| {
        AppError::Validation(ValidationErrors::single("non_field_errors", rejection.body_text()))
    })?;

    let new_order = validate_order(payload).map_err(|errors| {
        warn!("Rejected order: {:?}", errors);
        AppError::Validation(errors)
    })?;

    let product_ids: Vec<i32> = new_order.lines.iter().map(|line| line.product_id).collect();
    let existing = postgres_repo.retrieve_existing_product_ids(&product_ids).await?;
    let mut errors = ValidationErrors::default();
    for product_id in product_ids.iter().filter(|id| !existing.contains(*id)) {
        errors.add("products", format!("Invalid pk \"{}\" - object does not exist.", product_id));
    }
    if !errors.is_empty() {
        warn!("Rejected order with unknown products: {:?}", errors);
        return Err(AppError::Validation(errors));
    }

    let order = postgres_repo.create_order(&new_order).await?;
    info!("Registered order {} with {} items", order.id, order.items.len());
    Ok((StatusCode::CREATED, Json(order)))
}

/// Checks required fields and the phone number, and merges repeated
/// products into a single line.
pub fn validate_order(payload: OrderPayload) -> Result<NewOrder, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let lines = match payload.products {
        None => {
            errors.add("products", "This field is required.");
            Vec::new()
        }
        Some(products) if products.is_empty() => {
            errors.add("products", "This list may not be empty.");
            Vec::new()
        }
        Some(products) => merge_lines(products, &mut errors),
    };

    let firstname = required_text("firstname", payload.firstname, &mut errors);
    let lastname = required_text("lastname", payload.lastname, &mut errors);
    let address = required_text("address", payload.address, &mut errors);
    let phonenumber = required_text("phonenumber", payload.phonenumber, &mut errors)
        .and_then(|value| match normalize_phonenumber(&value) {
            Some(normalized) => Some(normalized),
            None => {
                errors.add("phonenumber", "Invalid phone number format");
                None
            }
        });

    match (firstname, lastname, address, phonenumber) {
        (Some(firstname), Some(lastname), Some(address), Some(phonenumber)) if errors.is_empty() => {
            Ok(NewOrder { firstname, lastname, phonenumber, address, lines })
        }
        _ => Err(errors),
    }
}

fn required_text(field: &str, value: Option<String>, errors: &mut ValidationErrors) -> Option<String> {
    match value {
        None => {
            errors.add(field, "This field is required.");
            None
        }
        Some(value) if value.trim().is_empty() => {
            errors.add(field, "This field may not be blank.");
            None
        }
        Some(value) => Some(value.trim().to_string()),
    }
}

fn merge_lines(products: Vec<OrderLinePayload>, errors: &mut ValidationErrors) -> Vec<NewOrderLine> {
    let mut lines: Vec<NewOrderLine> = Vec::with_capacity(products.len());
    for item in products {
        if item.quantity < 1 {
            errors.add("products", format!("Quantity for product {} must be at least 1.", item.product));
            continue;
        }
        match lines.iter_mut().find(|line| line.product_id == item.product) {
            Some(line) => line.quantity = line.quantity.saturating_add(item.quantity),
            None => lines.push(NewOrderLine { product_id: item.product, quantity: item.quantity }),
        }
    }
    lines
}

/// Accepts international numbers only and returns them in E.164 form.
fn normalize_phonenumber(value: &str) -> Option<String> {
    let number = phonenumber::parse(None, value).ok()?;
    if !phonenumber::is_valid(&number) {
        return None;
    }
    Some(number.format().mode(phonenumber::Mode::E164).to_string())
}
