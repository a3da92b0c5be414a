//! Role-scoped task lists and statistics under /api/tasks.

use axum::{extract::Query, Extension, Json};
use meal_flow_core::queries::StatusCount;
use meal_flow_core::validate::parse_day;
use meal_flow_core::view::{ChartView, CompletedChartView};
use meal_flow_core::CallerIdentity;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DayParam {
    pub date: Option<String>,
}

impl DayParam {
    fn day(&self) -> Result<Option<chrono::NaiveDate>, AppError> {
        Ok(self
            .date
            .as_deref()
            .map(|raw| parse_day("date", raw))
            .transpose()?)
    }
}

/// GET /api/tasks/pantry
pub async fn pantry_queue(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> Result<Json<Vec<ChartView>>, AppError> {
    let charts = state.tasks.pantry_queue(&caller).await?;
    Ok(Json(state.resolver().charts(charts).await?))
}

/// GET /api/tasks/delivery
pub async fn delivery_queue(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> Result<Json<Vec<ChartView>>, AppError> {
    let charts = state.tasks.delivery_queue(&caller).await?;
    Ok(Json(state.resolver().charts(charts).await?))
}

/// GET /api/tasks/pantry/completed?date=YYYY-MM-DD
pub async fn pantry_completed(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Query(param): Query<DayParam>,
) -> Result<Json<Vec<CompletedChartView>>, AppError> {
    let done = state.tasks.pantry_completed(&caller, param.day()?).await?;
    Ok(Json(state.resolver().completed(done).await?))
}

/// GET /api/tasks/delivery/completed
pub async fn delivery_completed(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> Result<Json<Vec<ChartView>>, AppError> {
    let charts = state.tasks.delivery_completed(&caller).await?;
    Ok(Json(state.resolver().charts(charts).await?))
}

/// GET /api/tasks/stats?date=YYYY-MM-DD
pub async fn stats(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Query(param): Query<DayParam>,
) -> Result<Json<Vec<StatusCount>>, AppError> {
    Ok(Json(state.tasks.manager_stats(&caller, param.day()?).await?))
}
