pub mod auth;
pub mod handler_404;
