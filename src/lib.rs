pub mod assignment;
pub mod config;
pub mod controller;
pub mod error;
pub mod geocoding;
pub mod helpers;
pub mod models;
pub mod repositories;
