//! Port traits for persistence and reference lookups.
//!
//! The lifecycle manager and query engine operate exclusively through these
//! traits, so the same logic runs against the in-memory store or Postgres.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::authorizer::MealUpdate;
use crate::types::{DietChart, Meal, PreparationStatus};

pub type Result<T> = std::result::Result<T, crate::error::FulfillmentError>;

/// Whether soft-deleted charts are visible to a read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadScope {
    #[default]
    ActiveOnly,
    /// Administrative audit reads only
    IncludeInactive,
}

impl ReadScope {
    pub fn admits(&self, chart: &DietChart) -> bool {
        match self {
            Self::ActiveOnly => chart.is_active,
            Self::IncludeInactive => true,
        }
    }
}

/// Constraint on a meal's assignee field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssigneeMatch {
    #[default]
    Any,
    /// Field not set
    Unassigned,
    Is(Uuid),
}

impl AssigneeMatch {
    pub fn matches(&self, value: Option<Uuid>) -> bool {
        match self {
            Self::Any => true,
            Self::Unassigned => value.is_none(),
            Self::Is(id) => value == Some(*id),
        }
    }
}

/// Predicate over a single meal. Empty `statuses` means any status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MealMatch {
    pub statuses: Vec<PreparationStatus>,
    pub pantry: AssigneeMatch,
    pub delivery: AssigneeMatch,
}

impl MealMatch {
    pub fn with_statuses(statuses: &[PreparationStatus]) -> Self {
        Self {
            statuses: statuses.to_vec(),
            ..Self::default()
        }
    }

    pub fn pantry(mut self, pantry: AssigneeMatch) -> Self {
        self.pantry = pantry;
        self
    }

    pub fn delivery(mut self, delivery: AssigneeMatch) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn matches(&self, meal: &Meal) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&meal.preparation_status))
            && self.pantry.matches(meal.assigned_pantry)
            && self.delivery.matches(meal.assigned_delivery)
    }
}

/// Filter over active charts.
///
/// A chart passes the meal predicate when at least one *single* meal
/// satisfies every part of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartFilter {
    pub patient: Option<Uuid>,
    /// Inclusive lower bound on chart date
    pub date_from: Option<NaiveDate>,
    /// Exclusive upper bound on chart date
    pub date_until: Option<NaiveDate>,
    pub meal: Option<MealMatch>,
}

impl ChartFilter {
    /// Charts dated exactly `day`.
    pub fn on_day(day: NaiveDate) -> Self {
        Self {
            date_from: Some(day),
            date_until: day.succ_opt(),
            ..Self::default()
        }
    }

    pub fn from_day(day: NaiveDate) -> Self {
        Self {
            date_from: Some(day),
            ..Self::default()
        }
    }

    pub fn with_meal(meal: MealMatch) -> Self {
        Self {
            meal: Some(meal),
            ..Self::default()
        }
    }

    /// Evaluated against active charts only; callers never see inactive ones.
    pub fn matches(&self, chart: &DietChart) -> bool {
        if !chart.is_active {
            return false;
        }
        if self.patient.is_some_and(|p| p != chart.patient_id) {
            return false;
        }
        if self.date_from.is_some_and(|from| chart.date < from) {
            return false;
        }
        if self.date_until.is_some_and(|until| chart.date >= until) {
            return false;
        }
        match &self.meal {
            Some(pred) => chart.meals.iter().any(|m| pred.matches(m)),
            None => true,
        }
    }
}

/// Result of a guarded whole-chart replace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Replaced,
    /// Chart was written by someone else since it was read
    Stale,
    /// Absent or inactive
    Missing,
}

/// Persistence for DietChart aggregates. There is no separate meal storage.
#[async_trait]
pub trait DietChartStore: Send + Sync {
    async fn insert(&self, chart: &DietChart) -> Result<()>;

    async fn find_by_id(&self, id: Uuid, scope: ReadScope) -> Result<Option<DietChart>>;

    /// Active charts matching `filter`, in no particular order.
    async fn find_active(&self, filter: &ChartFilter) -> Result<Vec<DietChart>>;

    /// Write the chart's scalar fields and leave the stored meals untouched.
    /// The store stamps `updated_at`. Returns the chart after the write, or
    /// `None` when absent or inactive.
    async fn update_details(&self, chart: &DietChart) -> Result<Option<DietChart>>;

    /// Whole-document replace of an active chart, applied only while the
    /// stored `updated_at` still equals `read_at`.
    async fn replace(&self, chart: &DietChart, read_at: DateTime<Utc>) -> Result<ReplaceOutcome>;

    /// Apply `update` to one meal of an active chart as a single atomic
    /// write that touches no other meal. Returns the chart after the write,
    /// or `None` when the chart (or meal) is absent or inactive.
    async fn apply_meal_update(
        &self,
        chart_id: Uuid,
        meal_id: Uuid,
        update: &MealUpdate,
    ) -> Result<Option<DietChart>>;

    /// Flip `is_active` to false. Returns false when absent or already inactive.
    async fn soft_delete(&self, id: Uuid) -> Result<bool>;
}

/// Display form of a patient reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientSummary {
    pub id: Uuid,
    pub name: String,
    pub room_number: String,
    pub bed_number: String,
    pub floor_number: i32,
}

/// Read-only lookups into the patient and staff attribute stores.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn patient(&self, id: Uuid) -> Result<Option<PatientSummary>>;

    async fn staff_name(&self, id: Uuid) -> Result<Option<String>>;
}
