use std::fmt;
use std::str::FromStr;
use anyhow::anyhow;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use time::OffsetDateTime;

/// Lifecycle of an order. Declared in processing order so that sorting by
/// status puts fresh orders first.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OrderStatus {
    Raw,
    #[serde(rename = "In progress")]
    InProgress,
    #[serde(rename = "In delivery")]
    InDelivery,
    Done,
}

impl OrderStatus {
    /// Label stored in the `orders.status` column
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Raw => "Raw",
            OrderStatus::InProgress => "In progress",
            OrderStatus::InDelivery => "In delivery",
            OrderStatus::Done => "Done",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Raw" => Ok(OrderStatus::Raw),
            "In progress" => Ok(OrderStatus::InProgress),
            "In delivery" => Ok(OrderStatus::InDelivery),
            "Done" => Ok(OrderStatus::Done),
            other => Err(anyhow!("Unknown order status: {}", other)),
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum PaymentMethod {
    Cash,
    Card,
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Card => "Card",
            PaymentMethod::Online => "Online",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Cash" => Ok(PaymentMethod::Cash),
            "Card" => Ok(PaymentMethod::Card),
            "Online" => Ok(PaymentMethod::Online),
            other => Err(anyhow!("Unknown payment method: {}", other)),
        }
    }
}

/// Line item. `price` is the product price captured when the order was placed.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct OrderItem {
    pub product_id: i32,
    pub quantity: i32,
    pub price: Decimal,
}

#[skip_serializing_none]
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Order {
    pub id: i32,
    pub firstname: String,
    pub lastname: String,
    pub phonenumber: String,
    pub address: String,
    pub status: OrderStatus,
    pub payment_method: Option<PaymentMethod>,
    pub comment: String,
    #[serde(with = "time::serde::rfc3339")]
    pub registered_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub called_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub delivered_at: Option<OffsetDateTime>,
    /// Restaurant assigned by staff, overrides automatic matching
    pub restaurant_id: Option<i32>,
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn total(&self) -> Decimal {
        self.items
            .iter()
            .map(|item| item.price * Decimal::from(item.quantity))
            .sum()
    }

    /// Stamps `called_at` when the order is taken into work and
    /// `delivered_at` when it is done, unless already set.
    pub fn apply_update(&mut self, update: OrderUpdate, now: OffsetDateTime) {
        if let Some(status) = update.status {
            if status >= OrderStatus::InProgress && self.called_at.is_none() {
                self.called_at = Some(now);
            }
            if status == OrderStatus::Done && self.delivered_at.is_none() {
                self.delivered_at = Some(now);
            }
            self.status = status;
        }
        if let Some(payment_method) = update.payment_method {
            self.payment_method = Some(payment_method);
        }
        if let Some(comment) = update.comment {
            self.comment = comment;
        }
        if let Some(restaurant_id) = update.restaurant_id {
            self.restaurant_id = restaurant_id;
        }
    }
}

/// A validated order ready to be persisted, one line per distinct product.
#[derive(Clone, Debug, PartialEq)]
pub struct NewOrder {
    pub firstname: String,
    pub lastname: String,
    pub phonenumber: String,
    pub address: String,
    pub lines: Vec<NewOrderLine>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product_id: i32,
    pub quantity: i32,
}

/// Staff edit of an order. `restaurant_id: Some(None)` clears the assignment.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub comment: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub restaurant_id: Option<Option<i32>>,
}

fn deserialize_some<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
