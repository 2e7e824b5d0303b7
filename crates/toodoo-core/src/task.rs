use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::datetime::due_date_serde;

/// Identifier as handed out by the storage backend. Some backends use
/// integer keys, others strings; both deserialize unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    pub fn generate() -> Self {
        Self::Text(Uuid::new_v4().to_string())
    }

    pub fn key(&self) -> CategoryKey {
        CategoryKey::from(self)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// String form of a category id. `Int(7)` and `Text("7")` normalize to the
/// same key; every category comparison goes through this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryKey(String);

impl CategoryKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&RecordId> for CategoryKey {
    fn from(id: &RecordId) -> Self {
        Self::new(id.to_string())
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" | "l" => Some(Self::Low),
            "medium" | "med" | "m" => Some(Self::Medium),
            "high" | "h" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subtask {
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub order: usize,
}

impl Subtask {
    pub fn new(id: RecordId, title: impl Into<String>, order: usize) -> Self {
        Self {
            id,
            title: title.into(),
            is_completed: false,
            order,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: RecordId::generate(),
            name: name.into(),
            color: None,
        }
    }

    pub fn key(&self) -> CategoryKey {
        self.id.key()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: RecordId,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default, with = "due_date_serde")]
    pub due_date: Option<NaiveDate>,

    #[serde(default, deserialize_with = "lenient_priority")]
    pub priority: Option<Priority>,

    #[serde(default)]
    pub category_id: Option<RecordId>,

    #[serde(default)]
    pub is_completed: bool,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

impl Task {
    pub fn new(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: RecordId::generate(),
            title: title.into(),
            description: None,
            due_date: None,
            priority: None,
            category_id: None,
            is_completed: false,
            completed_at: None,
            created_at: now,
            subtasks: vec![],
        }
    }

    pub fn effective_priority(&self) -> Priority {
        self.priority.unwrap_or(Priority::Medium)
    }

    pub fn category_key(&self) -> Option<CategoryKey> {
        self.category_id.as_ref().map(CategoryKey::from)
    }

    /// Moves the task into `completed`, stamping or clearing `completed_at`
    /// only on an actual transition.
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        if self.is_completed == completed {
            return;
        }
        self.is_completed = completed;
        self.completed_at = if completed { Some(now) } else { None };
    }

    pub fn toggle_completed(&mut self, now: DateTime<Utc>) {
        self.set_completed(!self.is_completed, now);
    }

    pub fn subtask_progress(&self) -> (usize, usize) {
        let done = self.subtasks.iter().filter(|s| s.is_completed).count();
        (done, self.subtasks.len())
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.is_completed && self.due_date.map(|due| due < today).unwrap_or(false)
    }
}

fn lenient_priority<'de, D>(deserializer: D) -> Result<Option<Priority>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| {
        let parsed = Priority::parse(&value);
        if parsed.is_none() {
            tracing::warn!(priority = %value, "unknown priority; treating as medium");
        }
        parsed
    }))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{CategoryKey, Priority, RecordId, Task};

    #[test]
    fn numeric_and_string_ids_share_a_category_key() {
        assert_eq!(RecordId::Int(7).key(), RecordId::from("7").key());
        assert_eq!(CategoryKey::new(" 7 "), RecordId::Int(7).key());
    }

    #[test]
    fn completion_stamps_and_clears_completed_at() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let mut task = Task::new("Write report", now);

        task.toggle_completed(now + Duration::hours(1));
        assert!(task.is_completed);
        assert_eq!(task.completed_at, Some(now + Duration::hours(1)));

        // already completed: the first stamp is kept
        task.set_completed(true, now + Duration::hours(5));
        assert_eq!(task.completed_at, Some(now + Duration::hours(1)));

        task.toggle_completed(now + Duration::hours(2));
        assert!(!task.is_completed);
        assert_eq!(task.completed_at, None);
    }

    #[test]
    fn deserializes_loose_records() {
        let raw = r#"{
            "id": 12,
            "title": "File taxes",
            "due_date": "2025-04-15T00:00:00+00:00",
            "priority": "urgent",
            "category_id": "3",
            "created_at": "2025-04-01T10:00:00Z"
        }"#;
        let task: Task = serde_json::from_str(raw).expect("parse task");

        assert_eq!(task.id, RecordId::Int(12));
        assert_eq!(task.priority, None);
        assert_eq!(task.effective_priority(), Priority::Medium);
        assert_eq!(
            task.due_date.map(|d| d.to_string()).as_deref(),
            Some("2025-04-15")
        );
        assert_eq!(task.category_key(), Some(CategoryKey::new("3")));
        assert!(task.subtasks.is_empty());
        assert!(!task.is_completed);
    }
}
