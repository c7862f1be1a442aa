//! API route definitions.
//!
//! This module organizes all HTTP routes for the Storelens API server.

mod greet;
mod health;
mod products;

pub use greet::greet_routes;
pub use health::health_routes;
pub use products::product_routes;
