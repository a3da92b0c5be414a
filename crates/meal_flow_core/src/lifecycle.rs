//! Diet Chart Lifecycle Manager
//!
//! Orchestrates chart create/update/soft-delete and per-meal status changes.
//! Every authorization and validation check runs before any write.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::authorizer::MealUpdate;
use crate::error::{FulfillmentError, Result};
use crate::ports::{ChartFilter, ReadScope};
use crate::principal::{CallerIdentity, Role};
use crate::repository::DietChartRepository;
use crate::types::{DietChart, DietChartPatch, MealStatusUpdate, NewDietChart};
use crate::validate;

#[derive(Clone)]
pub struct DietChartService {
    repo: DietChartRepository,
}

impl DietChartService {
    pub fn new(repo: DietChartRepository) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &DietChartRepository {
        &self.repo
    }

    /// Active charts matching `filter`. Any authenticated role.
    pub async fn list(&self, _caller: &CallerIdentity, filter: &ChartFilter) -> Result<Vec<DietChart>> {
        self.repo.find_active(filter).await
    }

    /// One active chart. Any authenticated role.
    pub async fn get(&self, _caller: &CallerIdentity, id: Uuid) -> Result<DietChart> {
        self.repo.find_by_id(id, ReadScope::ActiveOnly).await
    }

    /// Administrative read that also sees soft-deleted charts.
    pub async fn audit(&self, caller: &CallerIdentity, id: Uuid) -> Result<DietChart> {
        caller.require_role(&[Role::Manager])?;
        self.repo.find_by_id(id, ReadScope::IncludeInactive).await
    }

    pub async fn create(&self, caller: &CallerIdentity, input: NewDietChart) -> Result<DietChart> {
        caller.require_role(&[Role::Manager])?;
        let chart = self.repo.create(input, caller.user_id).await?;
        info!(
            chart_id = %chart.id,
            patient_id = %chart.patient_id,
            date = %chart.date,
            created_by = %caller.user_id,
            "diet chart created"
        );
        Ok(chart)
    }

    pub async fn update(
        &self,
        caller: &CallerIdentity,
        id: Uuid,
        patch: DietChartPatch,
    ) -> Result<DietChart> {
        caller.require_role(&[Role::Manager])?;
        let chart = self.repo.update(id, patch).await?;
        info!(chart_id = %id, by = %caller.user_id, "diet chart updated");
        Ok(chart)
    }

    /// Move one meal to the requested status, stamping the caller as the
    /// responsible pantry or delivery staff member.
    pub async fn update_meal_status(
        &self,
        caller: &CallerIdentity,
        chart_id: Uuid,
        meal_id: Uuid,
        request: MealStatusUpdate,
    ) -> Result<DietChart> {
        let target = validate::parse_status(request.status.as_deref())?;

        let chart = self.repo.find_by_id(chart_id, ReadScope::ActiveOnly).await?;
        if chart.meal(meal_id).is_none() {
            return Err(FulfillmentError::not_found(format!(
                "meal {meal_id} in diet chart {chart_id}"
            )));
        }

        let update = MealUpdate::grant(caller, target, request.delivery_notes, Utc::now())?;
        let chart = self.repo.apply_meal_update(chart_id, meal_id, &update).await?;

        info!(
            chart_id = %chart_id,
            meal_id = %meal_id,
            role = %caller.role,
            by = %caller.user_id,
            status = %target,
            "meal status updated"
        );
        Ok(chart)
    }

    pub async fn soft_delete(&self, caller: &CallerIdentity, id: Uuid) -> Result<()> {
        caller.require_role(&[Role::Manager])?;
        self.repo.soft_delete(id).await?;
        info!(chart_id = %id, by = %caller.user_id, "diet chart deactivated");
        Ok(())
    }
}
