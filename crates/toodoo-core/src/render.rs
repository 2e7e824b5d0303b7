use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::calendar::CalendarCell;
use crate::config::Config;
use crate::stats::{CategoryShare, TaskSummary, WeeklyCompletion};
use crate::task::{Category, Priority, Task};
use crate::workspace::Workspace;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, tasks, ws))]
    pub fn print_task_table(&mut self, tasks: &[Task], ws: &Workspace, today: NaiveDate) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_task_table(&mut out, tasks, ws, today)
    }

    pub fn write_task_table<W: Write>(
        &self,
        out: W,
        tasks: &[Task],
        ws: &Workspace,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            " ".to_string(),
            "Due".to_string(),
            "Pri".to_string(),
            "Category".to_string(),
            "Title".to_string(),
            "Subtasks".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());

        for task in tasks {
            let id = self.paint(&short_id(task), "33");
            let done = if task.is_completed { "x" } else { " " }.to_string();

            let due = task
                .due_date
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            let due = if task.is_overdue(today) {
                self.paint(&due, "31")
            } else {
                due
            };

            let priority = match task.priority {
                Some(Priority::High) => self.paint("H", "35"),
                Some(Priority::Low) => "L".to_string(),
                Some(Priority::Medium) => "M".to_string(),
                None => String::new(),
            };

            let category = task
                .category_key()
                .and_then(|key| ws.category_name(&key).map(ToString::to_string))
                .unwrap_or_default();

            let (sub_done, sub_total) = task.subtask_progress();
            let subtasks = if sub_total == 0 {
                String::new()
            } else {
                format!("{sub_done}/{sub_total}")
            };

            rows.push(vec![id, done, due, priority, category, task.title.clone(), subtasks]);
        }

        write_table(out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task, category))]
    pub fn print_task_info(&mut self, task: &Task, category: Option<&str>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        writeln!(out, "status      {}", if task.is_completed { "completed" } else { "active" })?;
        if let Some(description) = &task.description {
            writeln!(out, "description {description}")?;
        }
        writeln!(out, "priority    {}", task.effective_priority())?;
        writeln!(out, "category    {}", category.unwrap_or("-"))?;
        if let Some(due) = task.due_date {
            writeln!(out, "due         {}", due.format("%Y-%m-%d"))?;
        }
        writeln!(out, "created     {}", task.created_at.to_rfc3339())?;
        if let Some(completed_at) = task.completed_at {
            writeln!(out, "completed   {}", completed_at.to_rfc3339())?;
        }

        if !task.subtasks.is_empty() {
            writeln!(out, "subtasks")?;
            for (idx, subtask) in crate::subtasks::sorted_by_order(&task.subtasks).iter().enumerate() {
                let mark = if subtask.is_completed { "x" } else { " " };
                writeln!(out, "  {idx:>2} [{mark}] {} ({})", subtask.title, subtask.id)?;
            }
        }

        Ok(())
    }

    pub fn print_categories(&mut self, categories: &[Category], shares: &[CategoryShare]) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        let headers = vec![
            "ID".to_string(),
            "Name".to_string(),
            "Color".to_string(),
            "Tasks".to_string(),
        ];
        let rows = categories
            .iter()
            .map(|category| {
                let count = shares
                    .iter()
                    .find(|s| s.key == category.key())
                    .map(|s| s.count)
                    .unwrap_or(0);
                vec![
                    category.id.to_string(),
                    category.name.clone(),
                    category.color.clone().unwrap_or_default(),
                    count.to_string(),
                ]
            })
            .collect();
        write_table(out, headers, rows)
    }

    pub fn print_stats(
        &mut self,
        rate: u32,
        summary: &TaskSummary,
        weekly: &WeeklyCompletion,
        shares: &[CategoryShare],
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(
            out,
            "Completion rate  {rate}% ({} of {} tasks completed)",
            summary.completed, summary.total
        )?;
        writeln!(
            out,
            "Active {}  overdue {}  due today {}  upcoming {}",
            summary.active, summary.overdue, summary.due_today, summary.upcoming
        )?;
        writeln!(out)?;

        let change = weekly.week_over_week_change_percent;
        let change = if change > 0 {
            self.paint(&format!("+{change}%"), "32")
        } else if change < 0 {
            self.paint(&format!("{change}%"), "31")
        } else {
            format!("{change}%")
        };
        writeln!(
            out,
            "This week  {} tasks ({change} vs last week, {} last week)",
            weekly.this_week_completed, weekly.last_week_completed
        )?;
        for day in &weekly.daily_counts {
            writeln!(out, "  {} {:>3} {}", day.label, day.count, "#".repeat(day.count))?;
        }
        writeln!(out)?;

        let headers = vec!["Category".to_string(), "Tasks".to_string(), "Share".to_string()];
        let rows = shares
            .iter()
            .map(|s| vec![s.name.clone(), s.count.to_string(), format!("{}%", s.percent)])
            .collect();
        write_table(&mut out, headers, rows)
    }

    pub fn print_calendar(&mut self, title: &str, rows: &[Vec<CalendarCell<'_>>]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{title}")?;

        let headers: Vec<String> = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let body: Vec<Vec<String>> = rows
            .iter()
            .map(|week| {
                week.iter()
                    .map(|cell| {
                        let mut text = cell.day.date.format("%e").to_string();
                        if !cell.tasks.is_empty() {
                            text.push_str(&format!(" ({})", cell.tasks.len()));
                        }
                        if cell.is_today {
                            self.paint(&text, "7")
                        } else if !cell.day.in_month {
                            self.paint(&text, "2")
                        } else {
                            text
                        }
                    })
                    .collect::<Vec<String>>()
            })
            .collect();
        write_table(&mut out, headers, body)?;

        for cell in rows.iter().flatten().filter(|c| c.day.in_month) {
            for task in &cell.tasks {
                let mark = if task.is_completed { "x" } else { " " };
                writeln!(out, "{} [{mark}] {}", cell.day.date.format("%Y-%m-%d"), task.title)?;
            }
        }
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn short_id(task: &Task) -> String {
    let id = task.id.to_string();
    id.chars().take(8).collect()
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
