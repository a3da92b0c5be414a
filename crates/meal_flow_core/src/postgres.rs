//! Postgres implementations of the store and directory ports.
//!
//! All SQL is runtime-checked (sqlx::query, not sqlx::query!) so the crate
//! builds without a live database.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::authorizer::MealUpdate;
use crate::error::FulfillmentError;
use crate::ports::{
    AssigneeMatch, ChartFilter, DietChartStore, Directory, MealMatch, PatientSummary, ReadScope,
    ReplaceOutcome, Result,
};
use crate::types::{DietChart, Meal};

const CHART_COLUMNS: &str = "id, patient_id, chart_date, meals, dietary_restrictions, \
                             calories, created_by, is_active, created_at, updated_at";

/// Apply the bundled schema. Idempotent.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(include_str!("../migrations/001_diet_charts.sql"))
        .execute(pool)
        .await
        .map_err(|e| anyhow!(e))?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct PgChartRow {
    id: Uuid,
    patient_id: Uuid,
    chart_date: NaiveDate,
    meals: Json<Vec<Meal>>,
    dietary_restrictions: Vec<String>,
    calories: Option<i32>,
    created_by: Uuid,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PgChartRow> for DietChart {
    type Error = FulfillmentError;

    fn try_from(row: PgChartRow) -> std::result::Result<Self, Self::Error> {
        let calories = row
            .calories
            .map(u32::try_from)
            .transpose()
            .map_err(|_| anyhow!("negative calories stored for chart {}", row.id))?;
        Ok(Self {
            id: row.id,
            patient_id: row.patient_id,
            date: row.chart_date,
            meals: row.meals.0,
            dietary_restrictions: row.dietary_restrictions,
            calories,
            created_by: row.created_by,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn calories_column(chart: &DietChart) -> Result<Option<i32>> {
    chart
        .calories
        .map(i32::try_from)
        .transpose()
        .map_err(|_| FulfillmentError::invalid("calories", "out of range"))
}

/// Only the fields the transition touches, merged into the meal object.
fn meal_patch_json(update: &MealUpdate) -> serde_json::Value {
    let mut patch = serde_json::Map::new();
    patch.insert(
        "preparation_status".into(),
        serde_json::json!(update.status),
    );
    if let Some(id) = update.assigned_pantry {
        patch.insert("assigned_pantry".into(), serde_json::json!(id));
    }
    if let Some(id) = update.assigned_delivery {
        patch.insert("assigned_delivery".into(), serde_json::json!(id));
    }
    if let Some(at) = update.delivery_time {
        patch.insert("delivery_time".into(), serde_json::json!(at));
    }
    if let Some(notes) = &update.delivery_notes {
        patch.insert("delivery_notes".into(), serde_json::json!(notes));
    }
    serde_json::Value::Object(patch)
}

/// `@>` filters for the GIN index on `meals`: one array-of-object document
/// per accepted status, carrying any fixed assignee. Empty when the match
/// has nothing containment can express.
fn containment_filters(meal: &MealMatch) -> Vec<serde_json::Value> {
    let mut fixed = serde_json::Map::new();
    if let AssigneeMatch::Is(id) = meal.pantry {
        fixed.insert("assigned_pantry".into(), serde_json::json!(id));
    }
    if let AssigneeMatch::Is(id) = meal.delivery {
        fixed.insert("assigned_delivery".into(), serde_json::json!(id));
    }
    if meal.statuses.is_empty() {
        if fixed.is_empty() {
            return Vec::new();
        }
        return vec![serde_json::json!([fixed])];
    }
    meal.statuses
        .iter()
        .map(|status| {
            let mut doc = fixed.clone();
            doc.insert("preparation_status".into(), serde_json::json!(status));
            serde_json::json!([doc])
        })
        .collect()
}

fn push_assignee(qb: &mut QueryBuilder<'_, Postgres>, field: &'static str, m: AssigneeMatch) {
    match m {
        AssigneeMatch::Any => {}
        AssigneeMatch::Unassigned => {
            qb.push(format!(" AND m->>'{field}' IS NULL"));
        }
        AssigneeMatch::Is(id) => {
            qb.push(format!(" AND m->>'{field}' = "));
            qb.push_bind(id.to_string());
        }
    }
}

// ── PgDietChartStore ──────────────────────────────────────────

pub struct PgDietChartStore {
    pool: PgPool,
}

impl PgDietChartStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DietChartStore for PgDietChartStore {
    async fn insert(&self, chart: &DietChart) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO diet_charts
                (id, patient_id, chart_date, meals, dietary_restrictions,
                 calories, created_by, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(chart.id)
        .bind(chart.patient_id)
        .bind(chart.date)
        .bind(Json(&chart.meals))
        .bind(&chart.dietary_restrictions)
        .bind(calories_column(chart)?)
        .bind(chart.created_by)
        .bind(chart.is_active)
        .bind(chart.created_at)
        .bind(chart.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid, scope: ReadScope) -> Result<Option<DietChart>> {
        let active_clause = match scope {
            ReadScope::ActiveOnly => " AND is_active",
            ReadScope::IncludeInactive => "",
        };
        let query = format!("SELECT {CHART_COLUMNS} FROM diet_charts WHERE id = $1{active_clause}");
        let row = sqlx::query_as::<_, PgChartRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        row.map(DietChart::try_from).transpose()
    }

    async fn find_active(&self, filter: &ChartFilter) -> Result<Vec<DietChart>> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT {CHART_COLUMNS} FROM diet_charts WHERE is_active"
        ));
        if let Some(patient) = filter.patient {
            qb.push(" AND patient_id = ");
            qb.push_bind(patient);
        }
        if let Some(from) = filter.date_from {
            qb.push(" AND chart_date >= ");
            qb.push_bind(from);
        }
        if let Some(until) = filter.date_until {
            qb.push(" AND chart_date < ");
            qb.push_bind(until);
        }
        if let Some(meal) = &filter.meal {
            let filters = containment_filters(meal);
            if !filters.is_empty() {
                qb.push(" AND (");
                let mut sep = qb.separated(" OR ");
                for doc in filters {
                    sep.push("meals @> ");
                    sep.push_bind_unseparated(Json(doc));
                }
                qb.push(")");
            }
            // Every meal condition must hold on the same array element.
            qb.push(" AND EXISTS (SELECT 1 FROM jsonb_array_elements(meals) AS m WHERE TRUE");
            if !meal.statuses.is_empty() {
                let statuses: Vec<String> =
                    meal.statuses.iter().map(|s| s.as_str().to_string()).collect();
                qb.push(" AND m->>'preparation_status' = ANY(");
                qb.push_bind(statuses);
                qb.push(")");
            }
            push_assignee(&mut qb, "assigned_pantry", meal.pantry);
            push_assignee(&mut qb, "assigned_delivery", meal.delivery);
            qb.push(")");
        }

        let rows = qb
            .build_query_as::<PgChartRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        rows.into_iter().map(DietChart::try_from).collect()
    }

    async fn update_details(&self, chart: &DietChart) -> Result<Option<DietChart>> {
        let query = format!(
            r#"
            UPDATE diet_charts
            SET patient_id = $2,
                chart_date = $3,
                dietary_restrictions = $4,
                calories = $5,
                updated_at = now()
            WHERE id = $1 AND is_active
            RETURNING {CHART_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, PgChartRow>(&query)
            .bind(chart.id)
            .bind(chart.patient_id)
            .bind(chart.date)
            .bind(&chart.dietary_restrictions)
            .bind(calories_column(chart)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        row.map(DietChart::try_from).transpose()
    }

    async fn replace(&self, chart: &DietChart, read_at: DateTime<Utc>) -> Result<ReplaceOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE diet_charts
            SET patient_id = $2,
                chart_date = $3,
                meals = $4,
                dietary_restrictions = $5,
                calories = $6,
                updated_at = $7
            WHERE id = $1 AND is_active AND updated_at = $8
            "#,
        )
        .bind(chart.id)
        .bind(chart.patient_id)
        .bind(chart.date)
        .bind(Json(&chart.meals))
        .bind(&chart.dietary_restrictions)
        .bind(calories_column(chart)?)
        .bind(chart.updated_at)
        .bind(read_at)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        if result.rows_affected() > 0 {
            return Ok(ReplaceOutcome::Replaced);
        }

        let active = sqlx::query_scalar::<_, bool>("SELECT is_active FROM diet_charts WHERE id = $1")
            .bind(chart.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(match active {
            Some(true) => ReplaceOutcome::Stale,
            _ => ReplaceOutcome::Missing,
        })
    }

    async fn apply_meal_update(
        &self,
        chart_id: Uuid,
        meal_id: Uuid,
        update: &MealUpdate,
    ) -> Result<Option<DietChart>> {
        // Single statement: the row lock serializes concurrent writers and
        // the meal array is rebuilt from the latest committed version, so a
        // transition on one meal never clobbers a transition on another.
        let query = format!(
            r#"
            UPDATE diet_charts AS c
            SET meals = (
                    SELECT jsonb_agg(
                        CASE WHEN e.m->>'id' = $2 THEN e.m || $3::jsonb ELSE e.m END
                        ORDER BY e.ord)
                    FROM jsonb_array_elements(c.meals) WITH ORDINALITY AS e(m, ord)
                ),
                updated_at = now()
            WHERE c.id = $1
              AND c.is_active
              AND EXISTS (SELECT 1 FROM jsonb_array_elements(c.meals) AS x WHERE x->>'id' = $2)
            RETURNING {CHART_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, PgChartRow>(&query)
            .bind(chart_id)
            .bind(meal_id.to_string())
            .bind(Json(meal_patch_json(update)))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        row.map(DietChart::try_from).transpose()
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE diet_charts
            SET is_active = FALSE, updated_at = now()
            WHERE id = $1 AND is_active
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(result.rows_affected() > 0)
    }
}

// ── PgDirectory ───────────────────────────────────────────────

pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn patient(&self, id: Uuid) -> Result<Option<PatientSummary>> {
        let row = sqlx::query_as::<_, (Uuid, String, String, String, i32)>(
            r#"SELECT id, name, room_number, bed_number, floor_number
               FROM patients
               WHERE id = $1 AND is_active"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(row.map(
            |(id, name, room_number, bed_number, floor_number)| PatientSummary {
                id,
                name,
                room_number,
                bed_number,
                floor_number,
            },
        ))
    }

    async fn staff_name(&self, id: Uuid) -> Result<Option<String>> {
        let name = sqlx::query_scalar::<_, String>("SELECT name FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(name)
    }
}
