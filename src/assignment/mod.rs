//! Picking restaurants that can fulfil an order.

pub mod availability;
pub mod dashboard;
pub mod matcher;
