//! Display resolution
//!
//! Replaces patient, creator and assignee ids with their display form.
//! Dangling references resolve to an id with no display data rather than
//! failing the whole read.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::ports::{Directory, PatientSummary};
use crate::queries::CompletedChart;
use crate::types::{DietChart, Meal, MealType, PreparationStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaffRef {
    pub id: Uuid,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientRef {
    pub id: Uuid,
    pub name: Option<String>,
    pub room_number: Option<String>,
    pub bed_number: Option<String>,
    pub floor_number: Option<i32>,
}

impl PatientRef {
    fn from_summary(id: Uuid, summary: Option<PatientSummary>) -> Self {
        match summary {
            Some(p) => Self {
                id,
                name: Some(p.name),
                room_number: Some(p.room_number),
                bed_number: Some(p.bed_number),
                floor_number: Some(p.floor_number),
            },
            None => Self {
                id,
                name: None,
                room_number: None,
                bed_number: None,
                floor_number: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub meal_type: MealType,
    pub ingredients: Vec<String>,
    pub special_instructions: String,
    pub preparation_status: PreparationStatus,
    pub assigned_pantry: Option<StaffRef>,
    pub assigned_delivery: Option<StaffRef>,
    pub delivery_time: Option<DateTime<Utc>>,
    pub delivery_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartView {
    pub id: Uuid,
    pub patient: PatientRef,
    pub date: NaiveDate,
    pub meals: Vec<MealView>,
    pub dietary_restrictions: Vec<String>,
    pub calories: Option<u32>,
    pub created_by: StaffRef,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedChartView {
    pub id: Uuid,
    pub patient: PatientRef,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub meals: Vec<MealView>,
}

/// Resolves references through a [`Directory`], memoizing lookups for the
/// lifetime of one resolver.
pub struct ChartResolver {
    directory: Arc<dyn Directory>,
    patients: HashMap<Uuid, PatientRef>,
    staff: HashMap<Uuid, StaffRef>,
}

impl ChartResolver {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self {
            directory,
            patients: HashMap::new(),
            staff: HashMap::new(),
        }
    }

    async fn patient(&mut self, id: Uuid) -> Result<PatientRef> {
        if let Some(p) = self.patients.get(&id) {
            return Ok(p.clone());
        }
        let resolved = PatientRef::from_summary(id, self.directory.patient(id).await?);
        self.patients.insert(id, resolved.clone());
        Ok(resolved)
    }

    async fn staff(&mut self, id: Uuid) -> Result<StaffRef> {
        if let Some(s) = self.staff.get(&id) {
            return Ok(s.clone());
        }
        let resolved = StaffRef {
            id,
            name: self.directory.staff_name(id).await?,
        };
        self.staff.insert(id, resolved.clone());
        Ok(resolved)
    }

    async fn optional_staff(&mut self, id: Option<Uuid>) -> Result<Option<StaffRef>> {
        match id {
            Some(id) => Ok(Some(self.staff(id).await?)),
            None => Ok(None),
        }
    }

    async fn meal(&mut self, meal: Meal) -> Result<MealView> {
        Ok(MealView {
            id: meal.id,
            meal_type: meal.meal_type,
            ingredients: meal.ingredients,
            special_instructions: meal.special_instructions,
            preparation_status: meal.preparation_status,
            assigned_pantry: self.optional_staff(meal.assigned_pantry).await?,
            assigned_delivery: self.optional_staff(meal.assigned_delivery).await?,
            delivery_time: meal.delivery_time,
            delivery_notes: meal.delivery_notes,
        })
    }

    async fn meals(&mut self, meals: Vec<Meal>) -> Result<Vec<MealView>> {
        let mut views = Vec::with_capacity(meals.len());
        for meal in meals {
            views.push(self.meal(meal).await?);
        }
        Ok(views)
    }

    pub async fn chart(&mut self, chart: DietChart) -> Result<ChartView> {
        Ok(ChartView {
            id: chart.id,
            patient: self.patient(chart.patient_id).await?,
            date: chart.date,
            meals: self.meals(chart.meals).await?,
            dietary_restrictions: chart.dietary_restrictions,
            calories: chart.calories,
            created_by: self.staff(chart.created_by).await?,
            is_active: chart.is_active,
            created_at: chart.created_at,
            updated_at: chart.updated_at,
        })
    }

    pub async fn charts(&mut self, charts: Vec<DietChart>) -> Result<Vec<ChartView>> {
        let mut views = Vec::with_capacity(charts.len());
        for chart in charts {
            views.push(self.chart(chart).await?);
        }
        Ok(views)
    }

    pub async fn completed(&mut self, completed: Vec<CompletedChart>) -> Result<Vec<CompletedChartView>> {
        let mut views = Vec::with_capacity(completed.len());
        for c in completed {
            views.push(CompletedChartView {
                id: c.id,
                patient: self.patient(c.patient_id).await?,
                date: c.date,
                created_at: c.created_at,
                meals: self.meals(c.meals).await?,
            });
        }
        Ok(views)
    }
}
