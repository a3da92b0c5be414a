//! Meal Transition Authorizer
//!
//! Pure decision table from (caller role, requested status) to an assignment
//! stamp. The caller's current meal state is deliberately not consulted:
//! a delivery caller may move a `pending` meal straight to `delivered`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{FulfillmentError, Result};
use crate::principal::{CallerIdentity, Role};
use crate::types::{Meal, PreparationStatus};

/// Which assignment field a granted transition stamps with the caller id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStamp {
    /// `assigned_pantry`
    Pantry,
    /// `assigned_delivery` plus `delivery_time`
    Delivery,
}

/// Every permitted (role, target) pair. Anything absent is Forbidden.
/// Managers edit charts wholesale and have no entry here.
pub const TRANSITION_TABLE: &[(Role, PreparationStatus, AssignmentStamp)] = &[
    (
        Role::Pantry,
        PreparationStatus::Preparing,
        AssignmentStamp::Pantry,
    ),
    (Role::Pantry, PreparationStatus::Ready, AssignmentStamp::Pantry),
    (
        Role::Delivery,
        PreparationStatus::Delivered,
        AssignmentStamp::Delivery,
    ),
];

pub fn authorize(role: Role, target: PreparationStatus) -> Result<AssignmentStamp> {
    TRANSITION_TABLE
        .iter()
        .find(|(r, t, _)| *r == role && *t == target)
        .map(|(_, _, stamp)| *stamp)
        .ok_or_else(|| {
            FulfillmentError::forbidden(format!(
                "role '{}' may not set meal status to '{}'",
                role, target
            ))
        })
}

/// Targets reachable by a role, in table order.
pub fn allowed_targets(role: Role) -> Vec<PreparationStatus> {
    TRANSITION_TABLE
        .iter()
        .filter(|(r, _, _)| *r == role)
        .map(|(_, t, _)| *t)
        .collect()
}

/// Side-effect descriptor for one granted meal transition.
///
/// Carries only the fields the transition touches so stores can apply it to
/// the addressed meal without rewriting the rest of the chart.
#[derive(Debug, Clone, PartialEq)]
pub struct MealUpdate {
    pub status: PreparationStatus,
    pub assigned_pantry: Option<uuid::Uuid>,
    pub assigned_delivery: Option<uuid::Uuid>,
    pub delivery_time: Option<DateTime<Utc>>,
    pub delivery_notes: Option<String>,
}

impl MealUpdate {
    /// Authorize and build the update in one step.
    pub fn grant(
        caller: &CallerIdentity,
        target: PreparationStatus,
        delivery_notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let stamp = authorize(caller.role, target)?;
        Ok(match stamp {
            AssignmentStamp::Pantry => Self {
                status: target,
                assigned_pantry: Some(caller.user_id),
                assigned_delivery: None,
                delivery_time: None,
                delivery_notes: None,
            },
            AssignmentStamp::Delivery => Self {
                status: target,
                assigned_pantry: None,
                assigned_delivery: Some(caller.user_id),
                delivery_time: Some(now),
                delivery_notes,
            },
        })
    }
}

impl Meal {
    /// Apply a granted transition in place. Fields the update leaves `None`
    /// are untouched.
    pub fn apply_update(&mut self, update: &MealUpdate) {
        self.preparation_status = update.status;
        if let Some(pantry) = update.assigned_pantry {
            self.assigned_pantry = Some(pantry);
        }
        if let Some(courier) = update.assigned_delivery {
            self.assigned_delivery = Some(courier);
        }
        if let Some(at) = update.delivery_time {
            self.delivery_time = Some(at);
        }
        if let Some(notes) = &update.delivery_notes {
            self.delivery_notes = Some(notes.clone());
        }
    }
}
