//! Summary statistics derived from a task collection: completion rate,
//! per-category counts and the Sunday-start weekly completion trend.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, TimeZone};
use serde::Serialize;

use crate::datetime::{week_start, weekday_label};
use crate::task::{Category, CategoryKey, Task};

/// `round(100 * numerator / denominator)` with ties toward positive
/// infinity. `denominator` must be positive.
fn round_percent(numerator: i64, denominator: i64) -> i64 {
    let scaled = 100 * numerator;
    (2 * scaled + denominator).div_euclid(2 * denominator)
}

/// Share of completed tasks as a whole percentage; 0 for no tasks.
pub fn completion_rate(tasks: &[Task]) -> u32 {
    if tasks.is_empty() {
        return 0;
    }
    let completed = tasks.iter().filter(|t| t.is_completed).count();
    let rate = round_percent(completed as i64, tasks.len() as i64);
    u32::try_from(rate).unwrap_or(0)
}

/// Task count per category. Every known category is present, even with a
/// zero count. Uncategorized tasks are not counted anywhere; a task that
/// points at a category missing from `categories` gets a bucket of its own.
pub fn category_distribution(
    tasks: &[Task],
    categories: &[Category],
) -> BTreeMap<CategoryKey, usize> {
    let mut counts: BTreeMap<CategoryKey, usize> =
        categories.iter().map(|c| (c.key(), 0)).collect();

    for key in tasks.iter().filter_map(Task::category_key) {
        *counts.entry(key).or_insert(0) += 1;
    }

    counts
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryShare {
    pub key: CategoryKey,
    pub name: String,
    pub color: Option<String>,
    pub count: usize,
    /// Percent of all tasks, not just categorized ones.
    pub percent: u32,
}

/// Per-category rows for the statistics view, in `categories` order.
pub fn category_breakdown(tasks: &[Task], categories: &[Category]) -> Vec<CategoryShare> {
    let counts = category_distribution(tasks, categories);
    let total = tasks.len() as i64;

    categories
        .iter()
        .map(|category| {
            let key = category.key();
            let count = counts.get(&key).copied().unwrap_or(0);
            let percent = if total > 0 {
                u32::try_from(round_percent(count as i64, total)).unwrap_or(0)
            } else {
                0
            };
            CategoryShare {
                key,
                name: category.name.clone(),
                color: category.color.clone(),
                count,
                percent,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyCompletion {
    /// Sunday through Saturday of the reference week.
    pub daily_counts: Vec<DayCount>,
    pub this_week_completed: usize,
    pub last_week_completed: usize,
    pub week_over_week_change_percent: i64,
}

/// Completions per day for the week containing `reference`, plus the
/// comparison with the previous week. Calendar days are taken in the zone of
/// `reference`.
pub fn weekly_completion<Tz: TimeZone>(
    tasks: &[Task],
    reference: &DateTime<Tz>,
) -> WeeklyCompletion {
    let zone = reference.timezone();
    let start = week_start(reference.date_naive());
    let last_start = start - Duration::days(7);
    let end = start + Duration::days(6);

    let completion_days: Vec<NaiveDate> = tasks
        .iter()
        .filter_map(|task| task.completed_at)
        .map(|at| at.with_timezone(&zone).date_naive())
        .collect();

    let daily_counts: Vec<DayCount> = (0..7)
        .map(|offset| {
            let date = start + Duration::days(offset);
            DayCount {
                date,
                label: weekday_label(date),
                count: completion_days.iter().filter(|d| **d == date).count(),
            }
        })
        .collect();

    let this_week_completed = completion_days
        .iter()
        .filter(|d| **d >= start && **d <= end)
        .count();
    let last_week_completed = completion_days
        .iter()
        .filter(|d| **d >= last_start && **d < start)
        .count();

    let week_over_week_change_percent =
        week_over_week_change(this_week_completed, last_week_completed);

    tracing::debug!(
        week_start = %start,
        this_week_completed,
        last_week_completed,
        week_over_week_change_percent,
        "computed weekly completion"
    );

    WeeklyCompletion {
        daily_counts,
        this_week_completed,
        last_week_completed,
        week_over_week_change_percent,
    }
}

/// Percent change between two weekly totals. A zero baseline reads as 100
/// when anything was completed this week and 0 otherwise.
pub fn week_over_week_change(this_week: usize, last_week: usize) -> i64 {
    if last_week == 0 {
        return if this_week > 0 { 100 } else { 0 };
    }
    round_percent(this_week as i64 - last_week as i64, last_week as i64)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub total: usize,
    pub completed: usize,
    pub active: usize,
    pub overdue: usize,
    pub due_today: usize,
    pub upcoming: usize,
}

impl TaskSummary {
    /// Dashboard counters. "Upcoming" covers incomplete tasks due after
    /// `today` and within `upcoming_days`.
    pub fn from_tasks(tasks: &[Task], today: NaiveDate, upcoming_days: i64) -> Self {
        let horizon = today + Duration::days(upcoming_days);
        let mut summary = Self {
            total: tasks.len(),
            ..Self::default()
        };

        for task in tasks {
            if task.is_completed {
                summary.completed += 1;
                continue;
            }
            summary.active += 1;
            match task.due_date {
                Some(due) if due < today => summary.overdue += 1,
                Some(due) if due == today => summary.due_today += 1,
                Some(due) if due < horizon => summary.upcoming += 1,
                _ => {}
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use chrono_tz::America::New_York;

    use super::*;
    use crate::task::RecordId;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn completed_on(when: DateTime<Utc>) -> Task {
        let mut task = Task::new("done", when);
        task.set_completed(true, when);
        task
    }

    #[test]
    fn completion_rate_rounds_and_handles_empty() {
        assert_eq!(completion_rate(&[]), 0);

        let now = Utc::now();
        let mut tasks: Vec<Task> = (0..5).map(|i| Task::new(format!("t{i}"), now)).collect();
        for task in tasks.iter_mut().take(3) {
            task.set_completed(true, now);
        }
        assert_eq!(completion_rate(&tasks), 60);

        let thirds: Vec<Task> = (0..3)
            .map(|i| {
                let mut t = Task::new(format!("t{i}"), now);
                t.set_completed(i < 2, now);
                t
            })
            .collect();
        assert_eq!(completion_rate(&thirds), 67);
    }

    #[test]
    fn distribution_lists_every_category() {
        let now = Utc::now();
        let mut work = Category::new("Work");
        work.id = RecordId::Int(1);
        let mut home = Category::new("Home");
        home.id = RecordId::Int(2);

        let mut a = Task::new("a", now);
        a.category_id = Some(RecordId::from("1"));
        let mut b = Task::new("b", now);
        b.category_id = Some(RecordId::Int(1));
        let loose = Task::new("c", now);

        let dist = category_distribution(&[a.clone(), b.clone(), loose.clone()], &[work.clone(), home.clone()]);
        assert_eq!(dist.len(), 2);
        assert_eq!(dist[&CategoryKey::new("1")], 2);
        assert_eq!(dist[&CategoryKey::new("2")], 0);

        let shares = category_breakdown(&[a, b, loose], &[work, home]);
        assert_eq!(shares[0].name, "Work");
        assert_eq!(shares[0].percent, 67);
        assert_eq!(shares[1].count, 0);
        assert_eq!(shares[1].percent, 0);
    }

    #[test]
    fn orphaned_category_gets_its_own_bucket() {
        let mut task = Task::new("orphan", Utc::now());
        task.category_id = Some(RecordId::Int(99));
        let dist = category_distribution(&[task], &[]);
        assert_eq!(dist[&CategoryKey::new("99")], 1);
    }

    #[test]
    fn weekly_counts_by_sunday_week() {
        // Wednesday 2026-02-18; week runs 2026-02-15 .. 2026-02-21
        let reference = at(2026, 2, 18, 12);
        let tasks = vec![
            completed_on(at(2026, 2, 15, 8)),
            completed_on(at(2026, 2, 18, 9)),
            completed_on(at(2026, 2, 18, 23)),
            completed_on(at(2026, 2, 21, 23)),
            completed_on(at(2026, 2, 10, 10)),
            completed_on(at(2026, 2, 1, 10)),
            Task::new("open", reference),
        ];

        let weekly = weekly_completion(&tasks, &reference);
        let counts: Vec<usize> = weekly.daily_counts.iter().map(|d| d.count).collect();
        assert_eq!(counts, [1, 0, 0, 2, 0, 0, 1]);
        assert_eq!(weekly.daily_counts[0].label, "Sun");
        assert_eq!(
            weekly.daily_counts[0].date,
            NaiveDate::from_ymd_opt(2026, 2, 15).unwrap()
        );
        assert_eq!(weekly.this_week_completed, 4);
        assert_eq!(weekly.last_week_completed, 1);
        assert_eq!(weekly.week_over_week_change_percent, 300);
    }

    #[test]
    fn weekly_days_follow_reference_zone() {
        // 03:00 UTC on Sunday is still Saturday evening in New York
        let reference = New_York.with_ymd_and_hms(2026, 2, 18, 12, 0, 0).unwrap();
        let tasks = vec![completed_on(at(2026, 2, 15, 3))];

        let weekly = weekly_completion(&tasks, &reference);
        assert_eq!(weekly.this_week_completed, 0);
        assert_eq!(weekly.last_week_completed, 1);
        assert_eq!(weekly.week_over_week_change_percent, -100);
    }

    #[test]
    fn week_over_week_policy() {
        assert_eq!(week_over_week_change(0, 0), 0);
        assert_eq!(week_over_week_change(3, 0), 100);
        assert_eq!(week_over_week_change(3, 4), -25);
        assert_eq!(week_over_week_change(5, 4), 25);
        // -2.5 rounds toward positive infinity
        assert_eq!(week_over_week_change(39, 40), -2);
        assert_eq!(week_over_week_change(0, 0), weekly_completion(&[], &Utc::now()).week_over_week_change_percent);
    }

    #[test]
    fn summary_buckets_due_dates() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 18).unwrap();
        let now = Utc::now();
        let due = |days: i64| {
            let mut t = Task::new("t", now);
            t.due_date = Some(today + Duration::days(days));
            t
        };
        let mut finished = due(-3);
        finished.set_completed(true, now);

        let tasks = vec![due(-1), due(0), due(3), due(7), finished, Task::new("free", now)];
        let summary = TaskSummary::from_tasks(&tasks, today, 7);

        assert_eq!(summary.total, 6);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.active, 5);
        assert_eq!(summary.overdue, 1);
        assert_eq!(summary.due_today, 1);
        assert_eq!(summary.upcoming, 1);
    }
}
