use anyhow::anyhow;
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::datetime::week_start;
use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub in_month: bool,
}

/// Whole Sunday-start weeks covering one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub days: Vec<CalendarDay>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarCell<'a> {
    pub day: CalendarDay,
    pub is_today: bool,
    pub tasks: Vec<&'a Task>,
}

pub fn month_grid(year: i32, month: u32) -> anyhow::Result<MonthGrid> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| anyhow!("invalid month: {year}-{month:02}"))?;
    let (next_year, next_month) = next_month(year, month);
    let last = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| anyhow!("month out of range: {year}-{month:02}"))?;

    let start = week_start(first);
    let end = week_start(last) + Duration::days(6);

    let days = start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|date| CalendarDay {
            date,
            in_month: date.month() == month && date.year() == year,
        })
        .collect();

    Ok(MonthGrid { year, month, days })
}

impl MonthGrid {
    pub fn weeks(&self) -> impl Iterator<Item = &[CalendarDay]> {
        self.days.chunks(7)
    }

    /// Attaches the tasks due on each day, row by row.
    pub fn with_tasks<'a>(&self, tasks: &'a [Task], today: NaiveDate) -> Vec<Vec<CalendarCell<'a>>> {
        self.weeks()
            .map(|week| {
                week.iter()
                    .map(|day| CalendarCell {
                        day: *day,
                        is_today: day.date == today,
                        tasks: tasks_due_on(tasks, day.date),
                    })
                    .collect()
            })
            .collect()
    }
}

pub fn tasks_due_on(tasks: &[Task], date: NaiveDate) -> Vec<&Task> {
    tasks.iter().filter(|task| task.due_date == Some(date)).collect()
}

pub fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month >= 12 { (year + 1, 1) } else { (year, month + 1) }
}

pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month <= 1 { (year - 1, 12) } else { (year, month - 1) }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveDate, Utc, Weekday};

    use super::*;

    #[test]
    fn grid_covers_whole_weeks() {
        // February 2026 starts on a Sunday and ends on a Saturday
        let feb = month_grid(2026, 2).expect("grid");
        assert_eq!(feb.days.len(), 28);
        assert!(feb.days.iter().all(|d| d.in_month));

        let march = month_grid(2026, 3).expect("grid");
        assert_eq!(march.days.len() % 7, 0);
        assert_eq!(march.days[0].date.weekday(), Weekday::Sun);
        assert_eq!(march.days[0].date, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        let last = march.days.last().unwrap();
        assert_eq!(last.date.weekday(), Weekday::Sat);
        assert!(!last.in_month);
        assert_eq!(march.weeks().count(), 5);
    }

    #[test]
    fn rejects_bad_months() {
        assert!(month_grid(2026, 13).is_err());
        assert!(month_grid(2026, 0).is_err());
    }

    #[test]
    fn navigation_wraps_years() {
        assert_eq!(next_month(2025, 12), (2026, 1));
        assert_eq!(previous_month(2026, 1), (2025, 12));
        assert_eq!(next_month(2026, 4), (2026, 5));
    }

    #[test]
    fn cells_carry_due_tasks() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
        let mut due = Task::new("Dentist", Utc::now());
        due.due_date = Some(today);
        let tasks = vec![due, Task::new("Whenever", Utc::now())];

        let rows = month_grid(2026, 3).expect("grid").with_tasks(&tasks, today);
        let cell = rows
            .iter()
            .flatten()
            .find(|cell| cell.is_today)
            .expect("today cell");
        assert_eq!(cell.tasks.len(), 1);
        assert_eq!(cell.tasks[0].title, "Dentist");
        assert_eq!(rows.iter().flatten().filter(|c| !c.tasks.is_empty()).count(), 1);
    }
}
