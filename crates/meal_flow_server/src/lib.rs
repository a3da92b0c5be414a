//! meal_flow_server: REST transport for the meal fulfillment workflow.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
