//! Workflow Query Engine
//!
//! Role-scoped task lists, completed-work reports and manager statistics.
//! Reads are at chart granularity; the completed-work report answers a
//! per-meal question through an explicit flatten -> filter -> regroup
//! pipeline whose stages are exposed for testing.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::ports::{AssigneeMatch, ChartFilter, MealMatch};
use crate::principal::{CallerIdentity, Role};
use crate::repository::DietChartRepository;
use crate::types::{DietChart, Meal, PreparationStatus};

/// Statuses that make a meal pending pantry work
pub const PANTRY_OPEN: [PreparationStatus; 2] =
    [PreparationStatus::Pending, PreparationStatus::Preparing];

/// Statuses that count as completed pantry work
pub const PANTRY_DONE: [PreparationStatus; 2] =
    [PreparationStatus::Ready, PreparationStatus::Delivered];

/// Chart metadata carried alongside each flattened meal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartHeader {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl From<&DietChart> for ChartHeader {
    fn from(chart: &DietChart) -> Self {
        Self {
            id: chart.id,
            patient_id: chart.patient_id,
            date: chart.date,
            created_at: chart.created_at,
        }
    }
}

/// Chart-shaped record holding only the meals that matched a report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedChart {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub meals: Vec<Meal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: PreparationStatus,
    pub count: usize,
}

// ============================================================================
// Pipeline stages
// ============================================================================

/// Stage 1: one (chart header, meal) pair per meal, in chart order.
pub fn flatten_meals(charts: &[DietChart]) -> Vec<(ChartHeader, Meal)> {
    charts
        .iter()
        .flat_map(|chart| {
            let header = ChartHeader::from(chart);
            chart.meals.iter().map(move |m| (header.clone(), m.clone()))
        })
        .collect()
}

/// Stage 3: group pairs by chart id, keeping the first-seen header and the
/// first-seen chart order.
pub fn regroup_by_chart(pairs: Vec<(ChartHeader, Meal)>) -> Vec<CompletedChart> {
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    let mut groups: Vec<CompletedChart> = Vec::new();

    for (header, meal) in pairs {
        match index.get(&header.id) {
            Some(&slot) => groups[slot].meals.push(meal),
            None => {
                index.insert(header.id, groups.len());
                groups.push(CompletedChart {
                    id: header.id,
                    patient_id: header.patient_id,
                    date: header.date,
                    created_at: header.created_at,
                    meals: vec![meal],
                });
            }
        }
    }
    groups
}

/// Local calendar day for "today".
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

// ============================================================================
// Query engine
// ============================================================================

#[derive(Clone)]
pub struct TaskQueries {
    repo: DietChartRepository,
}

impl TaskQueries {
    pub fn new(repo: DietChartRepository) -> Self {
        Self { repo }
    }

    /// Charts where one meal is assigned to the caller and still open.
    /// Whole charts are returned; callers re-filter meals themselves.
    pub async fn pantry_queue(&self, caller: &CallerIdentity) -> Result<Vec<DietChart>> {
        caller.require_role(&[Role::Pantry])?;
        let filter = ChartFilter::with_meal(
            MealMatch::with_statuses(&PANTRY_OPEN).pantry(AssigneeMatch::Is(caller.user_id)),
        );
        let mut charts = self.repo.find_active(&filter).await?;
        sort_oldest_first(&mut charts);
        debug!(pantry = %caller.user_id, charts = charts.len(), "pantry queue");
        Ok(charts)
    }

    /// Global pool of ready meals nobody has claimed for delivery.
    pub async fn delivery_queue(&self, caller: &CallerIdentity) -> Result<Vec<DietChart>> {
        caller.require_role(&[Role::Delivery])?;
        let filter = ChartFilter::with_meal(
            MealMatch::with_statuses(&[PreparationStatus::Ready])
                .delivery(AssigneeMatch::Unassigned),
        );
        let mut charts = self.repo.find_active(&filter).await?;
        sort_oldest_first(&mut charts);
        debug!(charts = charts.len(), "delivery queue");
        Ok(charts)
    }

    /// Meals the caller finished preparing on `date` (default today),
    /// grouped per chart, newest chart first.
    pub async fn pantry_completed(
        &self,
        caller: &CallerIdentity,
        date: Option<NaiveDate>,
    ) -> Result<Vec<CompletedChart>> {
        caller.require_role(&[Role::Pantry])?;
        let day = date.unwrap_or_else(today);
        let charts = self.repo.find_active(&ChartFilter::on_day(day)).await?;

        let done = MealMatch::with_statuses(&PANTRY_DONE).pantry(AssigneeMatch::Is(caller.user_id));
        let pairs: Vec<_> = flatten_meals(&charts)
            .into_iter()
            .filter(|(_, meal)| done.matches(meal))
            .collect();

        let mut grouped = regroup_by_chart(pairs);
        grouped.sort_by_key(|c| Reverse(c.created_at));
        grouped.retain(|c| !c.meals.is_empty());
        Ok(grouped)
    }

    /// Charts with a meal the caller delivered, most recent delivery first.
    pub async fn delivery_completed(&self, caller: &CallerIdentity) -> Result<Vec<DietChart>> {
        caller.require_role(&[Role::Delivery])?;
        let done = MealMatch::with_statuses(&[PreparationStatus::Delivered])
            .delivery(AssigneeMatch::Is(caller.user_id));
        let mut charts = self.repo.find_active(&ChartFilter::with_meal(done.clone())).await?;

        let latest = |chart: &DietChart| {
            chart
                .meals
                .iter()
                .filter(|m| done.matches(m))
                .filter_map(|m| m.delivery_time)
                .max()
        };
        charts.sort_by(|a, b| latest(b).cmp(&latest(a)).then_with(|| a.id.cmp(&b.id)));
        Ok(charts)
    }

    /// Meal counts per status across active charts dated on/after `date`
    /// (default today). Only statuses that occur are listed.
    pub async fn manager_stats(
        &self,
        caller: &CallerIdentity,
        date: Option<NaiveDate>,
    ) -> Result<Vec<StatusCount>> {
        caller.require_role(&[Role::Manager])?;
        let day = date.unwrap_or_else(today);
        let charts = self.repo.find_active(&ChartFilter::from_day(day)).await?;
        Ok(count_by_status(&charts))
    }
}

pub fn count_by_status(charts: &[DietChart]) -> Vec<StatusCount> {
    let mut counts: BTreeMap<PreparationStatus, usize> = BTreeMap::new();
    for meal in charts.iter().flat_map(|c| c.meals.iter()) {
        *counts.entry(meal.preparation_status).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect()
}

fn sort_oldest_first(charts: &mut [DietChart]) {
    charts.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MealType;
    use chrono::Duration;

    fn chart(created_offset_secs: i64, meals: Vec<Meal>) -> DietChart {
        let created = Utc::now() + Duration::seconds(created_offset_secs);
        DietChart {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 5, 5).unwrap(),
            meals,
            dietary_restrictions: vec![],
            calories: None,
            created_by: Uuid::new_v4(),
            is_active: true,
            created_at: created,
            updated_at: created,
        }
    }

    fn meal(status: PreparationStatus, pantry: Option<Uuid>) -> Meal {
        let mut m = Meal::new(MealType::Lunch, vec!["soup".into()]);
        m.preparation_status = status;
        m.assigned_pantry = pantry;
        m
    }

    #[test]
    fn flatten_emits_one_pair_per_meal() {
        let charts = vec![
            chart(0, vec![meal(PreparationStatus::Pending, None); 2]),
            chart(1, vec![meal(PreparationStatus::Ready, None)]),
        ];
        let pairs = flatten_meals(&charts);
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].0.id, charts[0].id);
        assert_eq!(pairs[2].0.id, charts[1].id);
    }

    #[test]
    fn regroup_keeps_first_seen_order_and_header() {
        let a = chart(0, vec![]);
        let b = chart(5, vec![]);
        let m1 = meal(PreparationStatus::Ready, None);
        let m2 = meal(PreparationStatus::Delivered, None);
        let m3 = meal(PreparationStatus::Ready, None);
        let pairs = vec![
            (ChartHeader::from(&a), m1.clone()),
            (ChartHeader::from(&b), m2.clone()),
            (ChartHeader::from(&a), m3.clone()),
        ];
        let groups = regroup_by_chart(pairs);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].id, a.id);
        assert_eq!(groups[0].meals, vec![m1, m3]);
        assert_eq!(groups[0].patient_id, a.patient_id);
        assert_eq!(groups[1].meals, vec![m2]);
    }

    #[test]
    fn regroup_of_nothing_is_empty() {
        assert!(regroup_by_chart(Vec::new()).is_empty());
    }

    #[test]
    fn count_by_status_lists_present_statuses_in_order() {
        let charts = vec![
            chart(0, vec![
                meal(PreparationStatus::Ready, None),
                meal(PreparationStatus::Pending, None),
            ]),
            chart(1, vec![meal(PreparationStatus::Ready, None)]),
        ];
        assert_eq!(
            count_by_status(&charts),
            vec![
                StatusCount {
                    status: PreparationStatus::Pending,
                    count: 1
                },
                StatusCount {
                    status: PreparationStatus::Ready,
                    count: 2
                },
            ]
        );
        assert!(count_by_status(&[]).is_empty());
    }
}
