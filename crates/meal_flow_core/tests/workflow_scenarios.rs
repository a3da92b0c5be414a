//! End-to-end workflow tests against the in-memory store.
//!
//! Exercises the lifecycle manager and the query engine together, the way the
//! HTTP layer drives them: manager authors charts, pantry prepares, delivery
//! hands off.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use meal_flow_core::authorizer::MealUpdate;
use meal_flow_core::memory::MemoryDietChartStore;
use meal_flow_core::queries::{today, PANTRY_DONE};
use meal_flow_core::types::{DietChartPatch, MealInput, MealStatusUpdate, NewDietChart};
use meal_flow_core::{
    CallerIdentity, DietChart, DietChartRepository, DietChartService, FulfillmentError,
    PreparationStatus, Role, TaskQueries,
};
use uuid::Uuid;

// ── Harness ────────────────────────────────────────────────────

struct Ward {
    charts: DietChartService,
    tasks: TaskQueries,
    manager: CallerIdentity,
}

impl Ward {
    fn new() -> Self {
        let repo = DietChartRepository::new(Arc::new(MemoryDietChartStore::new()));
        Self {
            charts: DietChartService::new(repo.clone()),
            tasks: TaskQueries::new(repo),
            manager: staff(Role::Manager),
        }
    }

    async fn chart_on(&self, date: &str, meal_types: &[&str]) -> DietChart {
        let input = NewDietChart {
            patient: Some(Uuid::new_v4().to_string()),
            date: Some(date.to_string()),
            meals: meal_types
                .iter()
                .map(|t| MealInput::of(t, &["rice", "dal"]))
                .collect(),
            dietary_restrictions: vec!["low sodium".into()],
            calories: Some(1800),
        };
        let chart = self.charts.create(&self.manager, input).await.unwrap();
        // keep creation timestamps strictly ordered
        tokio::time::sleep(Duration::from_millis(2)).await;
        chart
    }

    async fn set(
        &self,
        who: &CallerIdentity,
        chart: &DietChart,
        meal_idx: usize,
        status: PreparationStatus,
    ) -> Result<DietChart, FulfillmentError> {
        self.charts
            .update_meal_status(
                who,
                chart.id,
                chart.meals[meal_idx].id,
                MealStatusUpdate::to(status),
            )
            .await
    }
}

fn staff(role: Role) -> CallerIdentity {
    CallerIdentity::new(Uuid::new_v4(), role)
}

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

// ── Scenarios ──────────────────────────────────────────────────

#[tokio::test]
async fn breakfast_goes_from_pending_to_bedside() {
    let ward = Ward::new();
    let cook = staff(Role::Pantry);
    let courier = staff(Role::Delivery);
    let chart = ward.chart_on("2031-03-01", &["breakfast", "lunch"]).await;

    let after = ward
        .set(&cook, &chart, 0, PreparationStatus::Preparing)
        .await
        .unwrap();
    let breakfast = &after.meals[0];
    assert_eq!(breakfast.preparation_status, PreparationStatus::Preparing);
    assert_eq!(breakfast.assigned_pantry, Some(cook.user_id));
    assert_eq!(after.meals[1], chart.meals[1]);

    let queue = ward.tasks.pantry_queue(&cook).await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, chart.id);

    ward.set(&cook, &chart, 0, PreparationStatus::Ready)
        .await
        .unwrap();

    // Pantry staff cannot hand off
    let err = ward
        .set(&cook, &chart, 0, PreparationStatus::Delivered)
        .await
        .unwrap_err();
    assert!(matches!(err, FulfillmentError::Forbidden(_)));

    let pool = ward.tasks.delivery_queue(&courier).await.unwrap();
    assert_eq!(pool.len(), 1);

    let after = ward
        .set(&courier, &chart, 0, PreparationStatus::Delivered)
        .await
        .unwrap();
    let breakfast = &after.meals[0];
    assert_eq!(breakfast.preparation_status, PreparationStatus::Delivered);
    assert_eq!(breakfast.assigned_delivery, Some(courier.user_id));
    assert_eq!(breakfast.assigned_pantry, Some(cook.user_id));
    assert!(breakfast.delivery_time.is_some());

    assert!(ward.tasks.delivery_queue(&courier).await.unwrap().is_empty());
    let delivered = ward.tasks.delivery_completed(&courier).await.unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].id, chart.id);
}

#[tokio::test]
async fn delivery_may_skip_straight_from_pending() {
    let ward = Ward::new();
    let courier = staff(Role::Delivery);
    let chart = ward.chart_on("2031-03-01", &["dinner"]).await;

    let after = ward
        .set(&courier, &chart, 0, PreparationStatus::Delivered)
        .await
        .unwrap();
    assert_eq!(after.meals[0].preparation_status, PreparationStatus::Delivered);
    assert!(after.meals[0].assigned_pantry.is_none());
}

#[tokio::test]
async fn soft_deleted_chart_vanishes_from_reads_and_queues() {
    let ward = Ward::new();
    let cook = staff(Role::Pantry);
    let chart = ward.chart_on("2031-03-02", &["lunch"]).await;
    ward.set(&cook, &chart, 0, PreparationStatus::Preparing)
        .await
        .unwrap();
    assert_eq!(ward.tasks.pantry_queue(&cook).await.unwrap().len(), 1);

    ward.charts.soft_delete(&ward.manager, chart.id).await.unwrap();

    assert!(matches!(
        ward.charts.get(&cook, chart.id).await.unwrap_err(),
        FulfillmentError::NotFound(_)
    ));
    assert!(ward.tasks.pantry_queue(&cook).await.unwrap().is_empty());
    assert!(ward
        .tasks
        .pantry_completed(&cook, Some(day("2031-03-02")))
        .await
        .unwrap()
        .is_empty());
    assert!(ward
        .tasks
        .manager_stats(&ward.manager, Some(day("2031-03-01")))
        .await
        .unwrap()
        .is_empty());
    assert!(matches!(
        ward.set(&cook, &chart, 0, PreparationStatus::Ready)
            .await
            .unwrap_err(),
        FulfillmentError::NotFound(_)
    ));
}

#[tokio::test]
async fn missing_patient_and_date_are_both_reported() {
    let ward = Ward::new();
    let input = NewDietChart {
        meals: vec![MealInput::of("lunch", &["khichdi"])],
        ..NewDietChart::default()
    };
    let err = ward.charts.create(&ward.manager, input).await.unwrap_err();
    let fields: Vec<_> = err.fields().iter().map(|f| f.field.as_str()).collect();
    assert_eq!(fields, vec!["patient", "date"]);

    let all = ward
        .charts
        .list(&ward.manager, &Default::default())
        .await
        .unwrap();
    assert!(all.is_empty());
}

#[tokio::test]
async fn queue_match_requires_one_meal_to_satisfy_everything() {
    let ward = Ward::new();
    let p1 = staff(Role::Pantry);
    let p2 = staff(Role::Pantry);
    let chart = ward.chart_on("2031-03-03", &["breakfast", "lunch"]).await;

    // p1 finished breakfast, p2 is still cooking lunch
    ward.set(&p1, &chart, 0, PreparationStatus::Ready)
        .await
        .unwrap();
    ward.set(&p2, &chart, 1, PreparationStatus::Preparing)
        .await
        .unwrap();

    assert!(ward.tasks.pantry_queue(&p1).await.unwrap().is_empty());
    assert_eq!(ward.tasks.pantry_queue(&p2).await.unwrap().len(), 1);
}

#[tokio::test]
async fn queues_enforce_roles() {
    let ward = Ward::new();
    let cook = staff(Role::Pantry);
    let courier = staff(Role::Delivery);

    assert!(matches!(
        ward.tasks.pantry_queue(&courier).await.unwrap_err(),
        FulfillmentError::Forbidden(_)
    ));
    assert!(matches!(
        ward.tasks.delivery_queue(&cook).await.unwrap_err(),
        FulfillmentError::Forbidden(_)
    ));
    assert!(matches!(
        ward.tasks.delivery_completed(&ward.manager).await.unwrap_err(),
        FulfillmentError::Forbidden(_)
    ));
    assert!(matches!(
        ward.tasks.manager_stats(&cook, None).await.unwrap_err(),
        FulfillmentError::Forbidden(_)
    ));
}

#[tokio::test]
async fn claimed_ready_meal_stays_out_of_delivery_pool() {
    let ward = Ward::new();
    let cook = staff(Role::Pantry);
    let courier = staff(Role::Delivery);
    let claimed = ward.chart_on("2031-03-04", &["lunch"]).await;
    let open = ward.chart_on("2031-03-04", &["lunch"]).await;

    ward.set(&courier, &claimed, 0, PreparationStatus::Delivered)
        .await
        .unwrap();
    // kitchen marks the tray ready again; the courier stamp stays
    let after = ward
        .set(&cook, &claimed, 0, PreparationStatus::Ready)
        .await
        .unwrap();
    assert_eq!(after.meals[0].preparation_status, PreparationStatus::Ready);
    assert_eq!(after.meals[0].assigned_delivery, Some(courier.user_id));

    ward.set(&cook, &open, 0, PreparationStatus::Ready)
        .await
        .unwrap();

    let pool = ward.tasks.delivery_queue(&staff(Role::Delivery)).await.unwrap();
    let ids: Vec<_> = pool.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![open.id]);
}

#[tokio::test]
async fn delivered_charts_list_latest_hand_off_first() {
    let ward = Ward::new();
    let courier = staff(Role::Delivery);
    let colleague = staff(Role::Delivery);
    let a = ward.chart_on("2031-03-05", &["breakfast", "dinner"]).await;
    let b = ward.chart_on("2031-03-05", &["lunch"]).await;
    let c = ward.chart_on("2031-03-05", &["lunch"]).await;
    let theirs = ward.chart_on("2031-03-05", &["lunch"]).await;

    for (chart, idx) in [(&a, 0), (&b, 0), (&c, 0), (&a, 1)] {
        ward.set(&courier, chart, idx, PreparationStatus::Delivered)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    ward.set(&colleague, &theirs, 0, PreparationStatus::Delivered)
        .await
        .unwrap();

    // Two hand-offs stamped with the same instant, earlier than the rest.
    let tied_at = Utc::now() - chrono::Duration::hours(1);
    let tied_x = ward.chart_on("2031-03-05", &["dinner"]).await;
    let tied_y = ward.chart_on("2031-03-05", &["dinner"]).await;
    let stamp = MealUpdate::grant(&courier, PreparationStatus::Delivered, None, tied_at).unwrap();
    for chart in [&tied_x, &tied_y] {
        ward.charts
            .repository()
            .apply_meal_update(chart.id, chart.meals[0].id, &stamp)
            .await
            .unwrap();
    }
    let (first_tied, second_tied) = if tied_x.id < tied_y.id {
        (tied_x.id, tied_y.id)
    } else {
        (tied_y.id, tied_x.id)
    };

    let delivered = ward.tasks.delivery_completed(&courier).await.unwrap();
    let ids: Vec<_> = delivered.iter().map(|c| c.id).collect();
    // a's dinner was the most recent hand-off, so a leads despite its early breakfast
    assert_eq!(ids, vec![a.id, c.id, b.id, first_tied, second_tied]);
}

#[tokio::test]
async fn reports_default_to_today() {
    let ward = Ward::new();
    let cook = staff(Role::Pantry);
    let now = today();
    let yesterday = now.pred_opt().unwrap();

    let current = ward
        .chart_on(&now.format("%Y-%m-%d").to_string(), &["breakfast", "lunch"])
        .await;
    let stale = ward
        .chart_on(&yesterday.format("%Y-%m-%d").to_string(), &["dinner"])
        .await;
    ward.set(&cook, &current, 0, PreparationStatus::Ready)
        .await
        .unwrap();
    ward.set(&cook, &stale, 0, PreparationStatus::Ready)
        .await
        .unwrap();

    let done = ward.tasks.pantry_completed(&cook, None).await.unwrap();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].id, current.id);
    assert_eq!(done[0].meals.len(), 1);

    let stats = ward.tasks.manager_stats(&ward.manager, None).await.unwrap();
    let total: usize = stats.iter().map(|s| s.count).sum();
    assert_eq!(total, current.meals.len());
    assert!(stats
        .iter()
        .any(|s| s.status == PreparationStatus::Ready && s.count == 1));
}

// ── Properties ─────────────────────────────────────────────────

#[tokio::test]
async fn pantry_completed_returns_only_callers_finished_meals() {
    let ward = Ward::new();
    let me = staff(Role::Pantry);
    let other = staff(Role::Pantry);
    let courier = staff(Role::Delivery);

    let a = ward.chart_on("2031-04-10", &["breakfast", "lunch", "dinner"]).await;
    let b = ward.chart_on("2031-04-10", &["breakfast", "lunch"]).await;
    let c = ward.chart_on("2031-04-10", &["dinner"]).await;
    let elsewhere = ward.chart_on("2031-04-11", &["lunch"]).await;

    ward.set(&me, &a, 0, PreparationStatus::Ready).await.unwrap();
    ward.set(&me, &a, 1, PreparationStatus::Preparing).await.unwrap();
    ward.set(&other, &a, 2, PreparationStatus::Ready).await.unwrap();
    ward.set(&me, &b, 1, PreparationStatus::Ready).await.unwrap();
    ward.set(&courier, &b, 1, PreparationStatus::Delivered)
        .await
        .unwrap();
    ward.set(&other, &c, 0, PreparationStatus::Ready).await.unwrap();
    ward.set(&me, &elsewhere, 0, PreparationStatus::Ready)
        .await
        .unwrap();

    let done = ward
        .tasks
        .pantry_completed(&me, Some(day("2031-04-10")))
        .await
        .unwrap();

    assert_eq!(done.len(), 2);
    // newest chart first
    assert_eq!(done[0].id, b.id);
    assert_eq!(done[1].id, a.id);
    for group in &done {
        assert!(!group.meals.is_empty());
        for meal in &group.meals {
            assert_eq!(meal.assigned_pantry, Some(me.user_id));
            assert!(PANTRY_DONE.contains(&meal.preparation_status));
        }
    }
    assert_eq!(done[0].meals.len(), 1);
    assert_eq!(done[0].meals[0].preparation_status, PreparationStatus::Delivered);
    assert_eq!(done[1].meals.len(), 1);
    assert_eq!(done[1].meals[0].id, a.meals[0].id);
}

#[tokio::test]
async fn manager_stats_sum_to_meals_on_or_after_day() {
    let ward = Ward::new();
    let cook = staff(Role::Pantry);

    let before = ward.chart_on("2031-05-01", &["breakfast", "lunch"]).await;
    let on = ward.chart_on("2031-05-02", &["breakfast", "lunch", "dinner"]).await;
    let after = ward.chart_on("2031-05-09", &["dinner"]).await;
    let deleted = ward.chart_on("2031-05-03", &["lunch", "dinner"]).await;
    ward.charts.soft_delete(&ward.manager, deleted.id).await.unwrap();

    ward.set(&cook, &on, 0, PreparationStatus::Ready).await.unwrap();
    ward.set(&cook, &after, 0, PreparationStatus::Preparing)
        .await
        .unwrap();
    ward.set(&cook, &before, 0, PreparationStatus::Ready)
        .await
        .unwrap();

    let stats = ward
        .tasks
        .manager_stats(&ward.manager, Some(day("2031-05-02")))
        .await
        .unwrap();

    let total: usize = stats.iter().map(|s| s.count).sum();
    assert_eq!(total, on.meals.len() + after.meals.len());

    let count = |status: PreparationStatus| {
        stats
            .iter()
            .find(|s| s.status == status)
            .map(|s| s.count)
            .unwrap_or(0)
    };
    assert_eq!(count(PreparationStatus::Pending), 2);
    assert_eq!(count(PreparationStatus::Preparing), 1);
    assert_eq!(count(PreparationStatus::Ready), 1);
    assert!(stats.iter().all(|s| s.count > 0));
}

#[tokio::test]
async fn manager_edit_keeps_kitchen_progress() {
    let ward = Ward::new();
    let cook = staff(Role::Pantry);
    let chart = ward.chart_on("2031-06-01", &["breakfast", "lunch"]).await;
    ward.set(&cook, &chart, 0, PreparationStatus::Ready).await.unwrap();

    let kept = MealInput {
        id: Some(chart.meals[0].id.to_string()),
        ..MealInput::of("breakfast", &["oats", "banana"])
    };
    let patch = DietChartPatch {
        meals: Some(vec![kept, MealInput::of("dinner", &["soup"])]),
        ..DietChartPatch::default()
    };
    let updated = ward
        .charts
        .update(&ward.manager, chart.id, patch)
        .await
        .unwrap();

    assert_eq!(updated.meals.len(), 2);
    assert_eq!(updated.meals[0].id, chart.meals[0].id);
    assert_eq!(updated.meals[0].ingredients, vec!["oats", "banana"]);
    assert_eq!(updated.meals[0].preparation_status, PreparationStatus::Ready);
    assert_eq!(updated.meals[0].assigned_pantry, Some(cook.user_id));
    assert_eq!(updated.meals[1].preparation_status, PreparationStatus::Pending);
    assert!(updated.meals[1].assigned_pantry.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transitions_on_one_chart_all_land() {
    let ward = Arc::new(Ward::new());
    let chart = ward.chart_on("2031-07-01", &["breakfast", "lunch", "dinner"]).await;

    let mut handles = Vec::new();
    for idx in 0..chart.meals.len() {
        let ward = Arc::clone(&ward);
        let chart = chart.clone();
        handles.push(tokio::spawn(async move {
            let cook = staff(Role::Pantry);
            ward.set(&cook, &chart, idx, PreparationStatus::Preparing)
                .await
                .map(|_| cook.user_id)
        }));
    }
    let mut cooks = Vec::new();
    for h in handles {
        cooks.push(h.await.unwrap().unwrap());
    }

    let stored = ward.charts.get(&ward.manager, chart.id).await.unwrap();
    for (meal, cook) in stored.meals.iter().zip(cooks) {
        assert_eq!(meal.preparation_status, PreparationStatus::Preparing);
        assert_eq!(meal.assigned_pantry, Some(cook));
    }
}
