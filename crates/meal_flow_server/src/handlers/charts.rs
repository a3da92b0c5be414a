//! Diet chart endpoints under /api/diet-charts.

use axum::{
    extract::{rejection::JsonRejection, Path, Query},
    http::StatusCode,
    Extension, Json,
};
use meal_flow_core::ports::{ChartFilter, MealMatch};
use meal_flow_core::types::{DietChartPatch, MealStatusUpdate, NewDietChart};
use meal_flow_core::validate::{parse_day, parse_id, parse_status};
use meal_flow_core::view::ChartView;
use meal_flow_core::CallerIdentity;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub patient: Option<String>,
    pub date: Option<String>,
    pub status: Option<String>,
}

impl ListParams {
    fn into_filter(self) -> Result<ChartFilter, AppError> {
        let mut filter = match self.date.as_deref() {
            Some(raw) => ChartFilter::on_day(parse_day("date", raw)?),
            None => ChartFilter::default(),
        };
        if let Some(raw) = self.patient.as_deref() {
            filter.patient = Some(parse_id("patient", raw)?);
        }
        if let Some(raw) = self.status.as_deref() {
            let status = parse_status(Some(raw))?;
            filter.meal = Some(MealMatch::with_statuses(&[status]));
        }
        Ok(filter)
    }
}

/// GET /api/diet-charts
pub async fn list(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ChartView>>, AppError> {
    let filter = params.into_filter()?;
    let charts = state.charts.list(&caller, &filter).await?;
    Ok(Json(state.resolver().charts(charts).await?))
}

/// GET /api/diet-charts/:id
pub async fn get(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<Json<ChartView>, AppError> {
    let chart = state.charts.get(&caller, parse_id("id", &id)?).await?;
    Ok(Json(state.resolver().chart(chart).await?))
}

/// GET /api/diet-charts/:id/audit, includes soft-deleted charts.
pub async fn audit(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<Json<ChartView>, AppError> {
    let chart = state.charts.audit(&caller, parse_id("id", &id)?).await?;
    Ok(Json(state.resolver().chart(chart).await?))
}

/// POST /api/diet-charts
pub async fn create(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    payload: Result<Json<NewDietChart>, JsonRejection>,
) -> Result<(StatusCode, Json<ChartView>), AppError> {
    let Json(input) = payload?;
    let chart = state.charts.create(&caller, input).await?;
    let view = state.resolver().chart(chart).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// PATCH /api/diet-charts/:id
pub async fn update(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(id): Path<String>,
    payload: Result<Json<DietChartPatch>, JsonRejection>,
) -> Result<Json<ChartView>, AppError> {
    let id = parse_id("id", &id)?;
    let Json(patch) = payload?;
    let chart = state.charts.update(&caller, id, patch).await?;
    Ok(Json(state.resolver().chart(chart).await?))
}

/// PATCH /api/diet-charts/:id/meals/:meal_id
pub async fn update_meal_status(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path((id, meal_id)): Path<(String, String)>,
    payload: Result<Json<MealStatusUpdate>, JsonRejection>,
) -> Result<Json<ChartView>, AppError> {
    let chart_id = parse_id("id", &id)?;
    let meal_id = parse_id("meal_id", &meal_id)?;
    let Json(request) = payload?;
    let chart = state
        .charts
        .update_meal_status(&caller, chart_id, meal_id, request)
        .await?;
    Ok(Json(state.resolver().chart(chart).await?))
}

/// DELETE /api/diet-charts/:id
pub async fn delete(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.charts.soft_delete(&caller, parse_id("id", &id)?).await?;
    Ok(Json(json!({ "message": "Diet chart deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_params_build_filter() {
        let patient = uuid::Uuid::new_v4();
        let filter = ListParams {
            patient: Some(patient.to_string()),
            date: Some("2025-03-04".into()),
            status: Some("ready".into()),
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.patient, Some(patient));
        assert!(filter.date_from.is_some());
        assert!(filter.meal.is_some());
    }

    #[test]
    fn list_params_reject_bad_status() {
        let err = ListParams {
            status: Some("cold".into()),
            ..ListParams::default()
        }
        .into_filter()
        .unwrap_err();
        assert_eq!(err.0.fields()[0].field, "status");
    }
}
