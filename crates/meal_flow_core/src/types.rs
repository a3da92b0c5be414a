//! Diet Chart Types
//!
//! A [`DietChart`] is one patient's meal plan for one calendar day. Meals are
//! owned by their chart and addressed by an id unique within it; they are
//! never persisted on their own.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Meal slot within a day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
        }
    }
}

impl FromStr for MealType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breakfast" => Ok(Self::Breakfast),
            "lunch" => Ok(Self::Lunch),
            "dinner" => Ok(Self::Dinner),
            _ => Err(format!("unknown meal type '{}'", s)),
        }
    }
}

impl std::fmt::Display for MealType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Preparation lifecycle of a meal.
/// Declaration order is the state-machine order (used for stats output).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PreparationStatus {
    #[default]
    Pending,
    Preparing,
    Ready,
    Delivered,
}

impl PreparationStatus {
    pub const ALL: [PreparationStatus; 4] = [
        PreparationStatus::Pending,
        PreparationStatus::Preparing,
        PreparationStatus::Ready,
        PreparationStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Delivered => "delivered",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl FromStr for PreparationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "preparing" => Ok(Self::Preparing),
            "ready" => Ok(Self::Ready),
            "delivered" => Ok(Self::Delivered),
            _ => Err(format!("unknown preparation status '{}'", s)),
        }
    }
}

impl std::fmt::Display for PreparationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One meal slot within a chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    /// Unique within the parent chart
    pub id: Uuid,
    #[serde(rename = "type")]
    pub meal_type: MealType,
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub special_instructions: String,
    #[serde(default)]
    pub preparation_status: PreparationStatus,
    /// Pantry staff who performed the last preparation transition
    #[serde(default)]
    pub assigned_pantry: Option<Uuid>,
    /// Delivery staff who completed hand-off
    #[serde(default)]
    pub assigned_delivery: Option<Uuid>,
    #[serde(default)]
    pub delivery_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivery_notes: Option<String>,
}

impl Meal {
    /// A fresh, unassigned meal in `pending`.
    pub fn new(meal_type: MealType, ingredients: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            meal_type,
            ingredients,
            special_instructions: String::new(),
            preparation_status: PreparationStatus::Pending,
            assigned_pantry: None,
            assigned_delivery: None,
            delivery_time: None,
            delivery_notes: None,
        }
    }
}

/// One patient's meal plan for one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DietChart {
    pub id: Uuid,
    /// Reference into the patient attribute store
    pub patient_id: Uuid,
    /// Calendar day in the server's local zone
    pub date: NaiveDate,
    pub meals: Vec<Meal>,
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
    #[serde(default)]
    pub calories: Option<u32>,
    pub created_by: Uuid,
    /// Soft-delete marker
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DietChart {
    pub fn meal(&self, meal_id: Uuid) -> Option<&Meal> {
        self.meals.iter().find(|m| m.id == meal_id)
    }

    pub fn meal_mut(&mut self, meal_id: Uuid) -> Option<&mut Meal> {
        self.meals.iter_mut().find(|m| m.id == meal_id)
    }
}

// ============================================================================
// Request shapes
// ============================================================================
//
// Enum-valued and id fields arrive as raw strings so that malformed values are
// reported as field-level validation errors instead of decode failures.

/// Meal as supplied by a manager on create/update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MealInput {
    /// Existing meal id to keep (update only); generated when absent
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub meal_type: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

impl MealInput {
    pub fn of(meal_type: &str, ingredients: &[&str]) -> Self {
        Self {
            meal_type: Some(meal_type.to_string()),
            ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }
}

/// Create-chart request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDietChart {
    #[serde(default)]
    pub patient: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub meals: Vec<MealInput>,
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
    #[serde(default)]
    pub calories: Option<i64>,
}

/// Partial update; absent fields are left untouched, `meals` replaces wholesale
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DietChartPatch {
    #[serde(default)]
    pub patient: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub meals: Option<Vec<MealInput>>,
    #[serde(default)]
    pub dietary_restrictions: Option<Vec<String>>,
    #[serde(default)]
    pub calories: Option<i64>,
}

/// Per-meal status change request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MealStatusUpdate {
    #[serde(default)]
    pub status: Option<String>,
    /// Recorded only on the delivery hand-off
    #[serde(default)]
    pub delivery_notes: Option<String>,
}

impl MealStatusUpdate {
    pub fn to(status: PreparationStatus) -> Self {
        Self {
            status: Some(status.as_str().to_string()),
            delivery_notes: None,
        }
    }
}
