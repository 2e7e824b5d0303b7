use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use tracing::trace;

use crate::task::{
  CategoryKey,
  Task
};

#[derive(
  Debug, Clone, PartialEq, Eq, Default,
)]
pub enum CategoryFilter {
  #[default]
  All,
  Only(CategoryKey)
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum StatusFilter {
  #[default]
  All,
  Active,
  Completed
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum SortKey {
  #[default]
  DueDate,
  Priority,
  CreatedAt,
  Alphabetical
}

impl CategoryFilter {
  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    match self {
      | Self::All => true,
      | Self::Only(key) => {
        task.category_key().as_ref()
          == Some(key)
      }
    }
  }
}

impl StatusFilter {
  pub fn matches(
    self,
    task: &Task
  ) -> bool {
    match self {
      | Self::All => true,
      | Self::Active => {
        !task.is_completed
      }
      | Self::Completed => {
        task.is_completed
      }
    }
  }
}

impl SortKey {
  /// Ordering for a stable sort; equal
  /// tasks keep their input order.
  pub fn compare(
    self,
    a: &Task,
    b: &Task
  ) -> Ordering {
    match self {
      | Self::DueDate => {
        match (a.due_date, b.due_date) {
          | (Some(x), Some(y)) => {
            x.cmp(&y)
          }
          | (Some(_), None) => {
            Ordering::Less
          }
          | (None, Some(_)) => {
            Ordering::Greater
          }
          | (None, None) => {
            Ordering::Equal
          }
        }
      }
      | Self::Priority => b
        .effective_priority()
        .rank()
        .cmp(
          &a.effective_priority().rank()
        ),
      | Self::CreatedAt => {
        b.created_at.cmp(&a.created_at)
      }
      | Self::Alphabetical => {
        collate(&a.title, &b.title)
      }
    }
  }
}

/// Title comparison that ignores case
/// and diacritics first, so "éclair"
/// sits beside "eclair" and "apple"
/// precedes "Banana".
pub fn collate(
  a: &str,
  b: &str
) -> Ordering {
  collation_key(a)
    .cmp(&collation_key(b))
    .then_with(|| {
      a.to_lowercase()
        .cmp(&b.to_lowercase())
    })
    .then_with(|| a.cmp(b))
}

fn collation_key(text: &str) -> String {
  deunicode::deunicode(text)
    .to_ascii_lowercase()
}

/// The four user-selected criteria
/// behind a task list view.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
  pub category: CategoryFilter,
  pub status:   StatusFilter,
  pub sort:     SortKey,
  pub search:   String
}

impl TaskQuery {
  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    task_matches(
      task,
      &self.category,
      self.status,
      &self.search
    )
  }

  pub fn apply(
    &self,
    tasks: &[Task]
  ) -> Vec<Task> {
    derive_visible_tasks(
      tasks,
      &self.category,
      self.status,
      self.sort,
      &self.search
    )
  }
}

/// Narrows `tasks` by category, status
/// and search text, then stably sorts
/// the survivors. Inputs are untouched.
#[tracing::instrument(skip(tasks), fields(count = tasks.len()))]
pub fn derive_visible_tasks(
  tasks: &[Task],
  category: &CategoryFilter,
  status: StatusFilter,
  sort: SortKey,
  search: &str
) -> Vec<Task> {
  let mut visible: Vec<Task> = tasks
    .iter()
    .filter(|task| {
      task_matches(
        task, category, status, search
      )
    })
    .cloned()
    .collect();

  visible.sort_by(|a, b| {
    sort.compare(a, b)
  });

  tracing::debug!(
    visible = visible.len(),
    "derived visible tasks"
  );
  visible
}

/// Category, status and search
/// predicates for one task, logged at
/// `trace`.
fn task_matches(
  task: &Task,
  category: &CategoryFilter,
  status: StatusFilter,
  search: &str
) -> bool {
  let category_ok =
    category.matches(task);
  let status_ok = status.matches(task);
  let search_ok =
    matches_search(task, search);

  trace!(
    id = %task.id,
    category_ok,
    status_ok,
    search_ok,
    "filter predicate evaluation"
  );
  category_ok && status_ok && search_ok
}

/// Plain substring test; only an empty
/// query skips it.
fn matches_search(
  task: &Task,
  query: &str
) -> bool {
  if query.is_empty() {
    return true;
  }
  let needle = query.to_lowercase();

  let title_match = task
    .title
    .to_lowercase()
    .contains(&needle);
  let description_match = task
    .description
    .as_deref()
    .map(|text| {
      text
        .to_lowercase()
        .contains(&needle)
    })
    .unwrap_or(false);

  title_match || description_match
}

impl FromStr for CategoryFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
      return Err(anyhow!(
        "category filter cannot be \
         empty"
      ));
    }
    if trimmed
      .eq_ignore_ascii_case("all")
    {
      return Ok(Self::All);
    }
    Ok(Self::Only(CategoryKey::new(
      trimmed
    )))
  }
}

impl FromStr for StatusFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(Self::All),
      | "active" | "open" => {
        Ok(Self::Active)
      }
      | "completed" | "done" => {
        Ok(Self::Completed)
      }
      | other => Err(anyhow!(
        "unknown status filter: \
         {other} (expected all, \
         active or completed)"
      ))
    }
  }
}

impl FromStr for SortKey {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "duedate" | "due" => {
        Ok(Self::DueDate)
      }
      | "priority" | "pri" => {
        Ok(Self::Priority)
      }
      | "createdat" | "created" => {
        Ok(Self::CreatedAt)
      }
      | "alphabetical" | "alpha"
      | "title" => {
        Ok(Self::Alphabetical)
      }
      | other => Err(anyhow!(
        "unknown sort key: {other} \
         (expected dueDate, priority, \
         createdAt or alphabetical)"
      ))
    }
  }
}

impl fmt::Display for CategoryFilter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | Self::All => f.write_str("all"),
      | Self::Only(key) => {
        write!(f, "{key}")
      }
    }
  }
}

impl fmt::Display for StatusFilter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(match self {
      | Self::All => "all",
      | Self::Active => "active",
      | Self::Completed => "completed"
    })
  }
}

impl fmt::Display for SortKey {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(match self {
      | Self::DueDate => "dueDate",
      | Self::Priority => "priority",
      | Self::CreatedAt => "createdAt",
      | Self::Alphabetical => {
        "alphabetical"
      }
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    Duration,
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    CategoryFilter,
    SortKey,
    StatusFilter,
    TaskQuery,
    derive_visible_tasks
  };
  use crate::task::{
    CategoryKey,
    Priority,
    RecordId,
    Task
  };

  fn sample_pair() -> Vec<Task> {
    let now = Utc
      .with_ymd_and_hms(
        2025, 4, 1, 9, 0, 0
      )
      .unwrap();

    let mut milk =
      Task::new("Buy milk", now);
    milk.id = RecordId::Int(1);
    milk.priority = Some(Priority::Low);

    let mut taxes = Task::new(
      "File taxes",
      now + Duration::minutes(1)
    );
    taxes.id = RecordId::Int(2);
    taxes.priority =
      Some(Priority::High);
    taxes.due_date =
      NaiveDate::from_ymd_opt(
        2025, 4, 15
      );

    vec![milk, taxes]
  }

  fn ids(tasks: &[Task]) -> Vec<String> {
    tasks
      .iter()
      .map(|t| t.id.to_string())
      .collect()
  }

  #[test]
  fn priority_sort_puts_high_first() {
    let tasks = sample_pair();
    let out = derive_visible_tasks(
      &tasks,
      &CategoryFilter::All,
      StatusFilter::All,
      SortKey::Priority,
      ""
    );
    assert_eq!(ids(&out), ["2", "1"]);
  }

  #[test]
  fn due_date_sort_puts_undated_last()
  {
    let tasks = sample_pair();
    let out = derive_visible_tasks(
      &tasks,
      &CategoryFilter::All,
      StatusFilter::All,
      SortKey::DueDate,
      ""
    );
    assert_eq!(ids(&out), ["2", "1"]);
  }

  #[test]
  fn missing_priority_ranks_as_medium()
  {
    let mut tasks = sample_pair();
    let now = Utc::now();
    let mut plain =
      Task::new("Call mom", now);
    plain.id = RecordId::Int(3);
    tasks.insert(0, plain);

    let out = derive_visible_tasks(
      &tasks,
      &CategoryFilter::All,
      StatusFilter::All,
      SortKey::Priority,
      ""
    );
    assert_eq!(
      ids(&out),
      ["2", "3", "1"]
    );
  }

  #[test]
  fn created_at_sort_is_newest_first()
  {
    let tasks = sample_pair();
    let out = derive_visible_tasks(
      &tasks,
      &CategoryFilter::All,
      StatusFilter::All,
      SortKey::CreatedAt,
      ""
    );
    assert_eq!(ids(&out), ["2", "1"]);
  }

  #[test]
  fn alphabetical_ignores_case_and_accents()
  {
    let now = Utc::now();
    let titles = [
      "banana", "Éclair", "apple",
      "eclair", "Cherry"
    ];
    let tasks: Vec<Task> = titles
      .iter()
      .map(|t| Task::new(*t, now))
      .collect();

    let out = derive_visible_tasks(
      &tasks,
      &CategoryFilter::All,
      StatusFilter::All,
      SortKey::Alphabetical,
      ""
    );
    let sorted: Vec<&str> = out
      .iter()
      .map(|t| t.title.as_str())
      .collect();
    assert_eq!(
      sorted,
      [
        "apple", "banana", "Cherry",
        "eclair", "Éclair"
      ]
    );
  }

  #[test]
  fn category_filter_normalizes_ids() {
    let mut tasks = sample_pair();
    tasks[0].category_id =
      Some(RecordId::Int(5));
    tasks[1].category_id =
      Some(RecordId::from("6"));

    let query = TaskQuery {
      category: "5".parse().unwrap(),
      ..TaskQuery::default()
    };
    assert_eq!(
      ids(&query.apply(&tasks)),
      ["1"]
    );

    let query = TaskQuery {
      category: CategoryFilter::Only(
        CategoryKey::new("6")
      ),
      ..TaskQuery::default()
    };
    assert_eq!(
      ids(&query.apply(&tasks)),
      ["2"]
    );
  }

  #[test]
  fn status_and_search_filters() {
    let mut tasks = sample_pair();
    tasks[0].set_completed(
      true,
      Utc::now()
    );
    tasks[1].description = Some(
      "Ask the ACCOUNTANT first"
        .to_string()
    );

    let active = TaskQuery {
      status: StatusFilter::Active,
      ..TaskQuery::default()
    };
    assert_eq!(
      ids(&active.apply(&tasks)),
      ["2"]
    );

    let search = TaskQuery {
      search: "accountant".to_string(),
      ..TaskQuery::default()
    };
    assert_eq!(
      ids(&search.apply(&tasks)),
      ["2"]
    );

    let title_search = TaskQuery {
      search: "MILK".to_string(),
      ..TaskQuery::default()
    };
    assert_eq!(
      ids(&title_search.apply(&tasks)),
      ["1"]
    );

    // surrounding spaces are part of
    // the needle
    let padded = TaskQuery {
      search: " milk ".to_string(),
      ..TaskQuery::default()
    };
    assert!(
      padded.apply(&tasks).is_empty()
    );
    let spaced = TaskQuery {
      search: "buy milk".to_string(),
      ..TaskQuery::default()
    };
    assert_eq!(
      ids(&spaced.apply(&tasks)),
      ["1"]
    );
  }

  #[test]
  fn query_matches_agrees_with_apply() {
    let mut tasks = sample_pair();
    tasks[1].set_completed(
      true,
      Utc::now()
    );
    tasks[1].category_id =
      Some(RecordId::Int(3));

    let query = TaskQuery {
      category: CategoryFilter::Only(
        CategoryKey::new("3")
      ),
      status: StatusFilter::Completed,
      search: "tax".to_string(),
      ..TaskQuery::default()
    };
    let kept: Vec<String> = tasks
      .iter()
      .filter(|t| query.matches(t))
      .map(|t| t.id.to_string())
      .collect();
    assert_eq!(kept, ["2"]);
    assert_eq!(
      ids(&query.apply(&tasks)),
      kept
    );
    assert!(!query.matches(&tasks[0]));
  }

  #[test]
  fn parses_ui_tokens() {
    assert_eq!(
      "dueDate"
        .parse::<SortKey>()
        .unwrap(),
      SortKey::DueDate
    );
    assert_eq!(
      "createdAt"
        .parse::<SortKey>()
        .unwrap(),
      SortKey::CreatedAt
    );
    assert_eq!(
      "completed"
        .parse::<StatusFilter>()
        .unwrap(),
      StatusFilter::Completed
    );
    assert_eq!(
      "ALL"
        .parse::<CategoryFilter>()
        .unwrap(),
      CategoryFilter::All
    );
    assert!(
      "soon".parse::<SortKey>().is_err()
    );
  }
}
