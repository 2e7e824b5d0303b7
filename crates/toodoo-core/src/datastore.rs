use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::task::{Category, Priority, RecordId, Subtask, Task};

/// Partial task update. `None` leaves a field alone; for clearable fields
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub priority: Option<Option<Priority>>,
    pub category_id: Option<Option<RecordId>>,
    pub is_completed: Option<bool>,
    pub subtasks: Option<Vec<Subtask>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.due_date.is_none()
            && self.priority.is_none()
            && self.category_id.is_none()
            && self.is_completed.is_none()
            && self.subtasks.is_none()
    }

    /// Applies the patch; completion changes go through
    /// [`Task::set_completed`] so `completed_at` stays consistent.
    pub fn apply_to(self, task: &mut Task, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(category_id) = self.category_id {
            task.category_id = category_id;
        }
        if let Some(completed) = self.is_completed {
            task.set_completed(completed, now);
        }
        if let Some(subtasks) = self.subtasks {
            task.subtasks = subtasks;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub color: Option<Option<String>>,
}

/// Persistence for tasks and categories. The engines never call this; the
/// host loads snapshots through it and writes changes back.
pub trait TaskRepository {
    /// Newest first.
    fn list_tasks(&self) -> anyhow::Result<Vec<Task>>;
    /// Sorted by name.
    fn list_categories(&self) -> anyhow::Result<Vec<Category>>;
    fn insert_task(&self, task: Task) -> anyhow::Result<Task>;
    fn update_task(&self, id: &RecordId, patch: TaskPatch, now: DateTime<Utc>) -> anyhow::Result<Task>;
    fn delete_task(&self, id: &RecordId) -> anyhow::Result<()>;
    fn insert_category(&self, category: Category) -> anyhow::Result<Category>;
    fn update_category(&self, id: &RecordId, patch: CategoryPatch) -> anyhow::Result<Category>;
    /// Also clears the category from every task that referenced it.
    fn delete_category(&self, id: &RecordId) -> anyhow::Result<()>;
}

/// JSON-lines files in a data directory, rewritten atomically on every
/// change.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
    pub categories_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join("tasks.data");
        let categories_path = data_dir.join("categories.data");

        for path in [&tasks_path, &categories_path] {
            if !path.exists() {
                fs::write(path, "")
                    .with_context(|| format!("failed to create {}", path.display()))?;
            }
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            categories = %categories_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            tasks_path,
            categories_path,
        })
    }

    #[tracing::instrument(skip(self))]
    fn load_tasks(&self) -> anyhow::Result<Vec<Task>> {
        load_jsonl(&self.tasks_path).context("failed to load tasks.data")
    }

    #[tracing::instrument(skip(self))]
    fn load_categories(&self) -> anyhow::Result<Vec<Category>> {
        load_jsonl(&self.categories_path).context("failed to load categories.data")
    }

    #[tracing::instrument(skip(self, tasks))]
    fn save_tasks(&self, tasks: &[Task]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.tasks_path, tasks).context("failed to save tasks.data")
    }

    #[tracing::instrument(skip(self, categories))]
    fn save_categories(&self, categories: &[Category]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.categories_path, categories)
            .context("failed to save categories.data")
    }
}

impl TaskRepository for DataStore {
    fn list_tasks(&self) -> anyhow::Result<Vec<Task>> {
        let mut tasks = self.load_tasks()?;
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    fn list_categories(&self) -> anyhow::Result<Vec<Category>> {
        let mut categories = self.load_categories()?;
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    #[tracing::instrument(skip(self, task), fields(id = %task.id))]
    fn insert_task(&self, task: Task) -> anyhow::Result<Task> {
        let mut tasks = self.load_tasks()?;
        if tasks.iter().any(|t| t.id == task.id) {
            return Err(anyhow!("task already exists: {}", task.id));
        }
        tasks.push(task.clone());
        self.save_tasks(&tasks)?;
        Ok(task)
    }

    #[tracing::instrument(skip(self, patch, now), fields(id = %id))]
    fn update_task(&self, id: &RecordId, patch: TaskPatch, now: DateTime<Utc>) -> anyhow::Result<Task> {
        let mut tasks = self.load_tasks()?;
        let task = tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| anyhow!("task not found: {id}"))?;

        patch.apply_to(task, now);
        let updated = task.clone();
        self.save_tasks(&tasks)?;
        debug!(completed = updated.is_completed, "updated task");
        Ok(updated)
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    fn delete_task(&self, id: &RecordId) -> anyhow::Result<()> {
        let mut tasks = self.load_tasks()?;
        let before = tasks.len();
        tasks.retain(|t| &t.id != id);
        if tasks.len() == before {
            return Err(anyhow!("task not found: {id}"));
        }
        self.save_tasks(&tasks)
    }

    #[tracing::instrument(skip(self, category), fields(id = %category.id, name = %category.name))]
    fn insert_category(&self, category: Category) -> anyhow::Result<Category> {
        let mut categories = self.load_categories()?;
        if categories.iter().any(|c| c.id == category.id) {
            return Err(anyhow!("category already exists: {}", category.id));
        }
        categories.push(category.clone());
        self.save_categories(&categories)?;
        Ok(category)
    }

    #[tracing::instrument(skip(self, patch), fields(id = %id))]
    fn update_category(&self, id: &RecordId, patch: CategoryPatch) -> anyhow::Result<Category> {
        let mut categories = self.load_categories()?;
        let category = categories
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| anyhow!("category not found: {id}"))?;

        if let Some(name) = patch.name {
            category.name = name;
        }
        if let Some(color) = patch.color {
            category.color = color;
        }
        let updated = category.clone();
        self.save_categories(&categories)?;
        Ok(updated)
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    fn delete_category(&self, id: &RecordId) -> anyhow::Result<()> {
        let mut categories = self.load_categories()?;
        let before = categories.len();
        categories.retain(|c| &c.id != id);
        if categories.len() == before {
            return Err(anyhow!("category not found: {id}"));
        }

        let key = id.key();
        let mut tasks = self.load_tasks()?;
        let mut cleared = 0usize;
        for task in tasks.iter_mut() {
            if task.category_key().as_ref() == Some(&key) {
                task.category_id = None;
                cleared += 1;
            }
        }

        if cleared > 0 {
            self.save_tasks(&tasks)?;
        }
        self.save_categories(&categories)?;
        info!(cleared, "deleted category");
        Ok(())
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(record);
    }

    debug!(count = out.len(), "loaded records from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, records))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, records: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = records.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for record in records {
        let serialized = serde_json::to_string(record)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
