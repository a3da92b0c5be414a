//! Diet Chart Repository
//!
//! Wraps a [`DietChartStore`] port with the store contract: absent or
//! inactive charts are uniformly `NotFound`, writes are re-validated, and
//! nothing is persisted when validation fails.
//!
//! Manager edits never write back meals they did not change: a patch without
//! `meals` leaves the stored array alone, and a meal replacement is only
//! written over the exact version it was computed from.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::authorizer::MealUpdate;
use crate::error::{FulfillmentError, Result};
use crate::ports::{ChartFilter, DietChartStore, ReadScope, ReplaceOutcome};
use crate::types::{DietChart, DietChartPatch, NewDietChart};
use crate::validate;

/// Read-merge-write rounds before a meal replacement gives up.
pub const MAX_EDIT_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct DietChartRepository {
    store: Arc<dyn DietChartStore>,
}

fn chart_not_found(id: Uuid) -> FulfillmentError {
    FulfillmentError::not_found(format!("diet chart {id}"))
}

impl DietChartRepository {
    pub fn new(store: Arc<dyn DietChartStore>) -> Self {
        Self { store }
    }

    /// Validate and persist a new chart with a generated id.
    pub async fn create(&self, input: NewDietChart, created_by: Uuid) -> Result<DietChart> {
        let chart = validate::validate_new_chart(input, created_by, Utc::now())?;
        self.store.insert(&chart).await?;
        debug!(chart_id = %chart.id, meals = chart.meals.len(), "diet chart inserted");
        Ok(chart)
    }

    pub async fn find_by_id(&self, id: Uuid, scope: ReadScope) -> Result<DietChart> {
        self.store
            .find_by_id(id, scope)
            .await?
            .ok_or_else(|| chart_not_found(id))
    }

    pub async fn find_active(&self, filter: &ChartFilter) -> Result<Vec<DietChart>> {
        self.store.find_active(filter).await
    }

    /// Merge `patch` into the active chart and persist the result.
    pub async fn update(&self, id: Uuid, patch: DietChartPatch) -> Result<DietChart> {
        if patch.meals.is_none() {
            let existing = self.find_by_id(id, ReadScope::ActiveOnly).await?;
            let updated = validate::apply_patch(&existing, patch, Utc::now())?;
            return self
                .store
                .update_details(&updated)
                .await?
                .ok_or_else(|| chart_not_found(id));
        }

        for attempt in 1..=MAX_EDIT_ATTEMPTS {
            let existing = self.find_by_id(id, ReadScope::ActiveOnly).await?;
            let updated = validate::apply_patch(&existing, patch.clone(), Utc::now())?;
            match self.store.replace(&updated, existing.updated_at).await? {
                ReplaceOutcome::Replaced => return Ok(updated),
                ReplaceOutcome::Missing => return Err(chart_not_found(id)),
                ReplaceOutcome::Stale => {
                    debug!(chart_id = %id, attempt, "chart changed during edit, re-reading");
                }
            }
        }
        Err(FulfillmentError::Conflict(format!(
            "diet chart {id} changed during the edit {MAX_EDIT_ATTEMPTS} times"
        )))
    }

    /// Atomic single-meal write. The chart may have been soft-deleted since
    /// it was read; that surfaces as `NotFound`.
    pub async fn apply_meal_update(
        &self,
        chart_id: Uuid,
        meal_id: Uuid,
        update: &MealUpdate,
    ) -> Result<DietChart> {
        self.store
            .apply_meal_update(chart_id, meal_id, update)
            .await?
            .ok_or_else(|| chart_not_found(chart_id))
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<()> {
        if self.store.soft_delete(id).await? {
            Ok(())
        } else {
            Err(chart_not_found(id))
        }
    }
}
