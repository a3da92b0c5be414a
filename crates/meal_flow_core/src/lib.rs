//! meal_flow_core: hospital meal fulfillment workflow.
//!
//! A manager authors a daily diet chart per patient; pantry staff prepare
//! the chart's meals and delivery staff carry them to the bedside. This crate
//! holds the domain types, the role/state transition table, the store port
//! with an in-memory backend, the chart lifecycle and the role-scoped task
//! queries. Transport concerns live in `meal_flow_server`.
//!
//! Enable the `database` feature for the Postgres store and directory.

pub mod authorizer;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod ports;
pub mod principal;
pub mod queries;
pub mod repository;
pub mod types;
pub mod validate;
pub mod view;

#[cfg(feature = "database")]
pub mod postgres;

pub use error::{FieldError, FulfillmentError, Result};
pub use lifecycle::DietChartService;
pub use principal::{CallerIdentity, Role};
pub use queries::TaskQueries;
pub use repository::DietChartRepository;
pub use types::{DietChart, Meal, MealType, PreparationStatus};
