//! Request validation: raw chart input to typed [`DietChart`].
//!
//! All field errors are collected before anything is returned, so a caller
//! sees the complete list in one [`FulfillmentError::Validation`].

use std::collections::HashSet;

use chrono::{DateTime, Local, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::{FieldError, FulfillmentError, Result};
use crate::types::{DietChart, DietChartPatch, Meal, MealInput, MealType, NewDietChart};

/// Build a new active chart from a create request.
pub fn validate_new_chart(
    input: NewDietChart,
    created_by: Uuid,
    now: DateTime<Utc>,
) -> Result<DietChart> {
    let mut errors = Vec::new();

    let patient_id = match input.patient.as_deref() {
        None => {
            errors.push(FieldError::new("patient", "is required"));
            None
        }
        Some(raw) => parse_uuid("patient", raw, &mut errors),
    };
    let date = match input.date.as_deref() {
        None => {
            errors.push(FieldError::new("date", "is required"));
            None
        }
        Some(raw) => parse_date("date", raw, &mut errors),
    };
    let calories = input
        .calories
        .and_then(|c| parse_calories(c, &mut errors));
    let meals = build_meals(&input.meals, &[], &mut errors);

    match (patient_id, date) {
        (Some(patient_id), Some(date)) if errors.is_empty() => Ok(DietChart {
            id: Uuid::new_v4(),
            patient_id,
            date,
            meals,
            dietary_restrictions: clean_labels(input.dietary_restrictions),
            calories,
            created_by,
            is_active: true,
            created_at: now,
            updated_at: now,
        }),
        _ => Err(FulfillmentError::Validation(errors)),
    }
}

/// Merge a partial update into an existing chart and re-validate.
///
/// A supplied meal list replaces the existing one. Replacement meals whose id
/// matches an existing meal keep that meal's status, assignees and delivery
/// stamp; everything else starts pending and unassigned.
pub fn apply_patch(
    existing: &DietChart,
    patch: DietChartPatch,
    now: DateTime<Utc>,
) -> Result<DietChart> {
    let mut errors = Vec::new();
    let mut chart = existing.clone();

    if let Some(raw) = patch.patient.as_deref() {
        if let Some(id) = parse_uuid("patient", raw, &mut errors) {
            chart.patient_id = id;
        }
    }
    if let Some(raw) = patch.date.as_deref() {
        if let Some(date) = parse_date("date", raw, &mut errors) {
            chart.date = date;
        }
    }
    if let Some(c) = patch.calories {
        chart.calories = parse_calories(c, &mut errors);
    }
    if let Some(labels) = patch.dietary_restrictions {
        chart.dietary_restrictions = clean_labels(labels);
    }
    if let Some(inputs) = patch.meals.as_deref() {
        chart.meals = build_meals(inputs, &existing.meals, &mut errors);
    }

    if !errors.is_empty() {
        return Err(FulfillmentError::Validation(errors));
    }
    chart.updated_at = now;
    Ok(chart)
}

/// Parse a requested status string.
pub fn parse_status(raw: Option<&str>) -> Result<crate::types::PreparationStatus> {
    let raw = raw.ok_or_else(|| FulfillmentError::invalid("status", "is required"))?;
    raw.parse()
        .map_err(|msg: String| FulfillmentError::invalid("status", msg))
}

/// Parse an id supplied outside a request body (path or query string).
pub fn parse_id(field: &str, raw: &str) -> Result<Uuid> {
    let mut errors = Vec::new();
    parse_uuid(field, raw, &mut errors).ok_or(FulfillmentError::Validation(errors))
}

/// Parse a calendar day supplied in a query string.
pub fn parse_day(field: &str, raw: &str) -> Result<NaiveDate> {
    let mut errors = Vec::new();
    parse_date(field, raw, &mut errors).ok_or(FulfillmentError::Validation(errors))
}

fn build_meals(inputs: &[MealInput], existing: &[Meal], errors: &mut Vec<FieldError>) -> Vec<Meal> {
    let mut seen = HashSet::new();
    let mut meals = Vec::with_capacity(inputs.len());

    for (i, input) in inputs.iter().enumerate() {
        let before = errors.len();

        let id = match input.id.as_deref() {
            Some(raw) => parse_uuid(&format!("meals[{i}].id"), raw, errors),
            None => Some(Uuid::new_v4()),
        };
        if let Some(id) = id {
            if !seen.insert(id) {
                errors.push(FieldError::new(
                    format!("meals[{i}].id"),
                    "duplicate meal id within chart",
                ));
            }
        }

        let meal_type = match input.meal_type.as_deref() {
            None => {
                errors.push(FieldError::new(format!("meals[{i}].type"), "is required"));
                None
            }
            Some(raw) => match raw.parse::<MealType>() {
                Ok(t) => Some(t),
                Err(msg) => {
                    errors.push(FieldError::new(format!("meals[{i}].type"), msg));
                    None
                }
            },
        };

        for (j, ingredient) in input.ingredients.iter().enumerate() {
            if ingredient.trim().is_empty() {
                errors.push(FieldError::new(
                    format!("meals[{i}].ingredients[{j}]"),
                    "must not be empty",
                ));
            }
        }

        if errors.len() > before {
            continue;
        }
        let (Some(id), Some(meal_type)) = (id, meal_type) else {
            continue;
        };

        let mut meal = existing
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .unwrap_or_else(|| Meal::new(meal_type, Vec::new()));
        meal.id = id;
        meal.meal_type = meal_type;
        meal.ingredients = input.ingredients.iter().map(|s| s.trim().to_string()).collect();
        meal.special_instructions = input.special_instructions.clone().unwrap_or_default();
        meals.push(meal);
    }

    meals
}

fn parse_uuid(field: &str, raw: &str, errors: &mut Vec<FieldError>) -> Option<Uuid> {
    match Uuid::parse_str(raw.trim()) {
        Ok(id) => Some(id),
        Err(_) => {
            errors.push(FieldError::new(field, format!("'{raw}' is not a valid id")));
            None
        }
    }
}

/// Accepts `YYYY-MM-DD`, or an RFC 3339 timestamp reduced to its local day.
fn parse_date(field: &str, raw: &str, errors: &mut Vec<FieldError>) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Local).date_naive());
    }
    errors.push(FieldError::new(field, format!("'{raw}' is not a valid date")));
    None
}

fn parse_calories(raw: i64, errors: &mut Vec<FieldError>) -> Option<u32> {
    match u32::try_from(raw) {
        Ok(c) => Some(c),
        Err(_) => {
            errors.push(FieldError::new("calories", "must be a non-negative number"));
            None
        }
    }
}

fn clean_labels(labels: Vec<String>) -> Vec<String> {
    labels
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}
