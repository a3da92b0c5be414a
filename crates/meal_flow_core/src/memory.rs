//! In-memory port implementations.
//!
//! Used as the default backend when no database is configured, and as the
//! test double for the lifecycle and query layers.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::authorizer::MealUpdate;
use crate::ports::{
    ChartFilter, DietChartStore, Directory, PatientSummary, ReadScope, ReplaceOutcome, Result,
};
use crate::types::DietChart;

#[derive(Default, Clone)]
pub struct MemoryDietChartStore {
    charts: Arc<RwLock<HashMap<Uuid, DietChart>>>,
}

impl MemoryDietChartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DietChartStore for MemoryDietChartStore {
    async fn insert(&self, chart: &DietChart) -> Result<()> {
        let mut charts = self.charts.write().await;
        if charts.contains_key(&chart.id) {
            return Err(anyhow!("diet chart {} already exists", chart.id).into());
        }
        charts.insert(chart.id, chart.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid, scope: ReadScope) -> Result<Option<DietChart>> {
        let charts = self.charts.read().await;
        Ok(charts.get(&id).filter(|c| scope.admits(c)).cloned())
    }

    async fn find_active(&self, filter: &ChartFilter) -> Result<Vec<DietChart>> {
        let charts = self.charts.read().await;
        Ok(charts.values().filter(|c| filter.matches(c)).cloned().collect())
    }

    async fn update_details(&self, chart: &DietChart) -> Result<Option<DietChart>> {
        let mut charts = self.charts.write().await;
        let Some(slot) = charts.get_mut(&chart.id).filter(|c| c.is_active) else {
            return Ok(None);
        };
        slot.patient_id = chart.patient_id;
        slot.date = chart.date;
        slot.dietary_restrictions = chart.dietary_restrictions.clone();
        slot.calories = chart.calories;
        slot.updated_at = Utc::now();
        Ok(Some(slot.clone()))
    }

    async fn replace(&self, chart: &DietChart, read_at: DateTime<Utc>) -> Result<ReplaceOutcome> {
        let mut charts = self.charts.write().await;
        match charts.get_mut(&chart.id) {
            Some(slot) if slot.is_active && slot.updated_at != read_at => Ok(ReplaceOutcome::Stale),
            Some(slot) if slot.is_active => {
                *slot = chart.clone();
                Ok(ReplaceOutcome::Replaced)
            }
            _ => Ok(ReplaceOutcome::Missing),
        }
    }

    async fn apply_meal_update(
        &self,
        chart_id: Uuid,
        meal_id: Uuid,
        update: &MealUpdate,
    ) -> Result<Option<DietChart>> {
        let mut charts = self.charts.write().await;
        let Some(chart) = charts.get_mut(&chart_id).filter(|c| c.is_active) else {
            return Ok(None);
        };
        let Some(meal) = chart.meal_mut(meal_id) else {
            return Ok(None);
        };
        meal.apply_update(update);
        chart.updated_at = Utc::now();
        Ok(Some(chart.clone()))
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        let mut charts = self.charts.write().await;
        match charts.get_mut(&id) {
            Some(chart) if chart.is_active => {
                chart.is_active = false;
                chart.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Patient and staff display data held in memory.
#[derive(Default, Clone)]
pub struct MemoryDirectory {
    patients: Arc<RwLock<HashMap<Uuid, PatientSummary>>>,
    staff: Arc<RwLock<HashMap<Uuid, String>>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_patient(&self, patient: PatientSummary) {
        self.patients.write().await.insert(patient.id, patient);
    }

    pub async fn add_staff(&self, id: Uuid, name: impl Into<String>) {
        self.staff.write().await.insert(id, name.into());
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn patient(&self, id: Uuid) -> Result<Option<PatientSummary>> {
        Ok(self.patients.read().await.get(&id).cloned())
    }

    async fn staff_name(&self, id: Uuid) -> Result<Option<String>> {
        Ok(self.staff.read().await.get(&id).cloned())
    }
}
