//! Host-side state: the authoritative task and category snapshots plus the
//! current list criteria. Commands receive a `Workspace` explicitly; nothing
//! here is global.

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, TimeZone};

use crate::datastore::TaskRepository;
use crate::filter::TaskQuery;
use crate::stats::{self, CategoryShare, TaskSummary, WeeklyCompletion};
use crate::task::{Category, CategoryKey, Task};

#[derive(Debug, Clone, Default)]
pub struct Workspace {
    pub tasks: Vec<Task>,
    pub categories: Vec<Category>,
    pub query: TaskQuery,
}

impl Workspace {
    #[tracing::instrument(skip(repo, query))]
    pub fn load<R>(repo: &R, query: TaskQuery) -> anyhow::Result<Self>
    where
        R: TaskRepository + ?Sized,
    {
        let tasks = repo.list_tasks()?;
        let categories = repo.list_categories()?;
        tracing::debug!(
            tasks = tasks.len(),
            categories = categories.len(),
            "loaded workspace"
        );
        Ok(Self {
            tasks,
            categories,
            query,
        })
    }

    pub fn visible(&self) -> Vec<Task> {
        self.query.apply(&self.tasks)
    }

    pub fn completion_rate(&self) -> u32 {
        stats::completion_rate(&self.tasks)
    }

    pub fn category_breakdown(&self) -> Vec<CategoryShare> {
        stats::category_breakdown(&self.tasks, &self.categories)
    }

    pub fn weekly_completion<Tz: TimeZone>(&self, reference: &DateTime<Tz>) -> WeeklyCompletion {
        stats::weekly_completion(&self.tasks, reference)
    }

    pub fn summary(&self, today: NaiveDate, upcoming_days: i64) -> TaskSummary {
        TaskSummary::from_tasks(&self.tasks, today, upcoming_days)
    }

    /// Finds a task by full id or by an unambiguous id prefix.
    pub fn find_task(&self, selector: &str) -> anyhow::Result<&Task> {
        let selector = selector.trim();
        if let Some(exact) = self.tasks.iter().find(|t| t.id.to_string() == selector) {
            return Ok(exact);
        }

        let mut matches = self
            .tasks
            .iter()
            .filter(|t| !selector.is_empty() && t.id.to_string().starts_with(selector));
        match (matches.next(), matches.next()) {
            (Some(task), None) => Ok(task),
            (Some(_), Some(_)) => Err(anyhow!("task id prefix is ambiguous: {selector}")),
            _ => Err(anyhow!("task not found: {selector}")),
        }
    }

    /// Finds a category by id or by case-insensitive name.
    pub fn find_category(&self, selector: &str) -> anyhow::Result<&Category> {
        let selector = selector.trim();
        let key = CategoryKey::new(selector);
        self.categories
            .iter()
            .find(|c| c.key() == key)
            .or_else(|| {
                self.categories
                    .iter()
                    .find(|c| c.name.to_lowercase() == selector.to_lowercase())
            })
            .ok_or_else(|| anyhow!("category not found: {selector}"))
    }

    pub fn category_name(&self, key: &CategoryKey) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| &c.key() == key)
            .map(|c| c.name.as_str())
    }
}
