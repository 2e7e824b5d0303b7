use anyhow::{Context, anyhow};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use crate::calendar::month_grid;
use crate::cli::{AddArgs, CategoryCommand, Command, EditArgs, ListArgs, SubtaskCommand};
use crate::config::Config;
use crate::datastore::{CategoryPatch, DataStore, TaskPatch, TaskRepository};
use crate::datetime::{parse_due_expr, project_now, to_project_date};
use crate::filter::{CategoryFilter, TaskQuery};
use crate::render::Renderer;
use crate::subtasks;
use crate::task::{Category, Priority, RecordId, Task};
use crate::validate::{validate_category_name, validate_title};
use crate::workspace::Workspace;

#[instrument(skip(store, cfg, renderer, command))]
pub fn dispatch(
    store: &DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    command: Option<Command>,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let ws = Workspace::load(store, cfg.default_query()?)?;
    debug!(?command, "dispatching command");

    match command.unwrap_or(Command::List(ListArgs::default())) {
        Command::Add(args) => cmd_add(store, &ws, args, now),
        Command::List(args) => cmd_list(renderer, ws, args, now),
        Command::Show { task } => cmd_show(renderer, &ws, &task),
        Command::Done { task } => cmd_done(store, &ws, &task, now),
        Command::Edit(args) => cmd_edit(store, &ws, args, now),
        Command::Delete { task } => cmd_delete(store, &ws, &task),
        Command::Category(sub) => cmd_category(store, renderer, &ws, sub),
        Command::Subtask(sub) => cmd_subtask(store, &ws, sub, now),
        Command::Stats => cmd_stats(renderer, &ws, cfg),
        Command::Calendar { month } => cmd_calendar(renderer, &ws, month.as_deref(), now),
    }
}

#[instrument(skip(store, ws, args, now))]
fn cmd_add(store: &DataStore, ws: &Workspace, args: AddArgs, now: DateTime<Utc>) -> anyhow::Result<()> {
    let joined = args.title.join(" ");
    let title = validate_title(&joined)?;
    let today = to_project_date(now);

    let mut task = Task::new(title, now);
    task.description = args.description.filter(|d| !d.trim().is_empty());
    task.due_date = args
        .due
        .as_deref()
        .map(|raw| parse_due_expr(raw, today))
        .transpose()?;
    task.priority = Some(
        args.priority
            .as_deref()
            .map(parse_priority)
            .transpose()?
            .unwrap_or(Priority::Medium),
    );
    task.category_id = args
        .category
        .as_deref()
        .map(|selector| ws.find_category(selector).map(|c| c.id.clone()))
        .transpose()?;

    let task = store.insert_task(task)?;
    info!(id = %task.id, "created task");
    println!("Created task {}.", task.id);
    Ok(())
}

#[instrument(skip(renderer, ws, args, now))]
fn cmd_list(renderer: &mut Renderer, mut ws: Workspace, args: ListArgs, now: DateTime<Utc>) -> anyhow::Result<()> {
    ws.query = list_query(&ws, args)?;
    let visible = ws.visible();
    debug!(query = ?ws.query, shown = visible.len(), total = ws.tasks.len(), "listing tasks");

    if visible.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }
    renderer.print_task_table(&visible, &ws, to_project_date(now))?;
    println!();
    println!("{} of {} tasks", visible.len(), ws.tasks.len());
    Ok(())
}

/// Layers command-line criteria over the configured defaults. A category
/// may be given by name; anything unknown is used as a raw id.
fn list_query(ws: &Workspace, args: ListArgs) -> anyhow::Result<TaskQuery> {
    let mut query = ws.query.clone();

    if let Some(raw) = args.category {
        query.category = match raw.parse::<CategoryFilter>()? {
            CategoryFilter::All => CategoryFilter::All,
            CategoryFilter::Only(key) => match ws.find_category(&raw) {
                Ok(category) => CategoryFilter::Only(category.key()),
                Err(_) => {
                    warn!(category = %key, "no such category; filtering by raw id");
                    CategoryFilter::Only(key)
                }
            },
        };
    }
    if let Some(raw) = args.status {
        query.status = raw.parse()?;
    }
    if let Some(raw) = args.sort {
        query.sort = raw.parse()?;
    }
    if let Some(search) = args.search {
        query.search = search;
    }
    Ok(query)
}

fn cmd_show(renderer: &mut Renderer, ws: &Workspace, selector: &str) -> anyhow::Result<()> {
    let task = ws.find_task(selector)?;
    let category = task.category_key().and_then(|key| ws.category_name(&key));
    renderer.print_task_info(task, category)
}

#[instrument(skip(store, ws, now))]
fn cmd_done(store: &DataStore, ws: &Workspace, selector: &str, now: DateTime<Utc>) -> anyhow::Result<()> {
    let task = ws.find_task(selector)?;
    let patch = TaskPatch {
        is_completed: Some(!task.is_completed),
        ..TaskPatch::default()
    };
    let updated = store.update_task(&task.id, patch, now)?;

    if updated.is_completed {
        println!("Completed task {} '{}'.", updated.id, updated.title);
    } else {
        println!("Reopened task {} '{}'.", updated.id, updated.title);
    }
    Ok(())
}

#[instrument(skip(store, ws, args, now))]
fn cmd_edit(store: &DataStore, ws: &Workspace, args: EditArgs, now: DateTime<Utc>) -> anyhow::Result<()> {
    let task = ws.find_task(&args.task)?;
    let today = to_project_date(now);

    let patch = TaskPatch {
        title: args
            .title
            .as_deref()
            .map(|t| validate_title(t).map(ToString::to_string))
            .transpose()?,
        description: args
            .description
            .map(|d| clearable(&d).map(ToString::to_string)),
        due_date: args
            .due
            .as_deref()
            .map(|raw| clearable(raw).map(|v| parse_due_expr(v, today)).transpose())
            .transpose()?,
        priority: args
            .priority
            .as_deref()
            .map(|raw| clearable(raw).map(parse_priority).transpose())
            .transpose()?,
        category_id: args
            .category
            .as_deref()
            .map(|raw| {
                clearable(raw)
                    .map(|selector| ws.find_category(selector).map(|c| c.id.clone()))
                    .transpose()
            })
            .transpose()?,
        ..TaskPatch::default()
    };

    if patch.is_empty() {
        return Err(anyhow!("nothing to change for task {}", task.id));
    }
    let updated = store.update_task(&task.id, patch, now)?;
    println!("Modified task {} '{}'.", updated.id, updated.title);
    Ok(())
}

#[instrument(skip(store, ws))]
fn cmd_delete(store: &DataStore, ws: &Workspace, selector: &str) -> anyhow::Result<()> {
    let task = ws.find_task(selector)?;
    store.delete_task(&task.id)?;
    println!("Deleted task {} '{}'.", task.id, task.title);
    Ok(())
}

#[instrument(skip(store, renderer, ws, command))]
fn cmd_category(
    store: &DataStore,
    renderer: &mut Renderer,
    ws: &Workspace,
    command: CategoryCommand,
) -> anyhow::Result<()> {
    match command {
        CategoryCommand::Add { name, color } => {
            let name = validate_category_name(&name, &ws.categories, None)?;
            let mut category = Category::new(name);
            category.color = color.filter(|c| !c.trim().is_empty());
            let category = store.insert_category(category)?;
            println!("Created category {} '{}'.", category.id, category.name);
        }
        CategoryCommand::List => {
            if ws.categories.is_empty() {
                println!("No categories.");
            } else {
                renderer.print_categories(&ws.categories, &ws.category_breakdown())?;
            }
        }
        CategoryCommand::Rename { category, name } => {
            let existing = ws.find_category(&category)?;
            let name = validate_category_name(&name, &ws.categories, Some(existing))?;
            let patch = CategoryPatch {
                name: Some(name.to_string()),
                ..CategoryPatch::default()
            };
            let updated = store.update_category(&existing.id, patch)?;
            println!("Renamed category {} to '{}'.", updated.id, updated.name);
        }
        CategoryCommand::Delete { category } => {
            let existing = ws.find_category(&category)?;
            store.delete_category(&existing.id)?;
            println!("Deleted category '{}'.", existing.name);
        }
    }
    Ok(())
}

#[instrument(skip(store, ws, command, now))]
fn cmd_subtask(
    store: &DataStore,
    ws: &Workspace,
    command: SubtaskCommand,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let (target, next) = match &command {
        SubtaskCommand::Add { task, title } => {
            let task = ws.find_task(task)?;
            let items = subtasks::add_subtask(&task.subtasks, RecordId::generate(), &title.join(" "))?;
            (task, items)
        }
        SubtaskCommand::Toggle { task, subtask } => {
            let task = ws.find_task(task)?;
            let id = resolve_subtask(task, subtask)?;
            (task, subtasks::toggle_subtask(&task.subtasks, &id))
        }
        SubtaskCommand::Rename { task, subtask, title } => {
            let task = ws.find_task(task)?;
            let id = resolve_subtask(task, subtask)?;
            (task, subtasks::rename_subtask(&task.subtasks, &id, &title.join(" ")))
        }
        SubtaskCommand::Delete { task, subtask } => {
            let task = ws.find_task(task)?;
            let id = resolve_subtask(task, subtask)?;
            (task, subtasks::remove_subtask(&task.subtasks, &id))
        }
        SubtaskCommand::Move { task, subtask, to } => {
            let task = ws.find_task(task)?;
            let id = resolve_subtask(task, subtask)?;
            if *to >= task.subtasks.len() {
                warn!(to, len = task.subtasks.len(), "subtask position out of range");
                return Err(anyhow!(
                    "task {} has {} subtasks; positions start at 0",
                    task.id,
                    task.subtasks.len()
                ));
            }
            (task, subtasks::move_subtask(&task.subtasks, &id, *to))
        }
    };

    let patch = TaskPatch {
        subtasks: Some(next),
        ..TaskPatch::default()
    };
    let updated = store.update_task(&target.id, patch, now)?;
    let (done, total) = updated.subtask_progress();
    println!("Task {} has {done}/{total} subtasks completed.", updated.id);
    Ok(())
}

/// A subtask selector is its position in display order or its id.
fn resolve_subtask(task: &Task, selector: &str) -> anyhow::Result<RecordId> {
    let ordered = subtasks::sorted_by_order(&task.subtasks);
    if let Ok(position) = selector.parse::<usize>()
        && let Some(subtask) = ordered.get(position)
    {
        return Ok(subtask.id.clone());
    }

    ordered
        .iter()
        .find(|s| s.id.to_string() == selector)
        .map(|s| s.id.clone())
        .ok_or_else(|| anyhow!("subtask not found in task {}: {selector}", task.id))
}

#[instrument(skip(renderer, ws, cfg))]
fn cmd_stats(renderer: &mut Renderer, ws: &Workspace, cfg: &Config) -> anyhow::Result<()> {
    let now = project_now();
    let today = now.date_naive();
    let summary = ws.summary(today, cfg.upcoming_days()?);
    let weekly = ws.weekly_completion(&now);
    debug!(
        this_week = weekly.this_week_completed,
        last_week = weekly.last_week_completed,
        "computed weekly completion"
    );
    renderer.print_stats(ws.completion_rate(), &summary, &weekly, &ws.category_breakdown())
}

#[instrument(skip(renderer, ws, now))]
fn cmd_calendar(
    renderer: &mut Renderer,
    ws: &Workspace,
    month: Option<&str>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let today = to_project_date(now);
    let (year, month) = match month {
        Some(raw) => parse_month(raw)?,
        None => (today.year(), today.month()),
    };

    let grid = month_grid(year, month)?;
    let rows = grid.with_tasks(&ws.tasks, today);
    let title = NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.format("%B %Y").to_string())
        .unwrap_or_else(|| format!("{year}-{month:02}"));
    renderer.print_calendar(&title, &rows)
}

fn parse_month(raw: &str) -> anyhow::Result<(i32, u32)> {
    let (year, month) = raw
        .trim()
        .split_once('-')
        .ok_or_else(|| anyhow!("expected YYYY-MM, got: {raw}"))?;
    let year = year
        .parse::<i32>()
        .with_context(|| format!("invalid year in {raw}"))?;
    let month = month
        .parse::<u32>()
        .with_context(|| format!("invalid month in {raw}"))?;
    if !(1..=12).contains(&month) {
        return Err(anyhow!("month out of range: {raw}"));
    }
    Ok((year, month))
}

fn parse_priority(raw: &str) -> anyhow::Result<Priority> {
    Priority::parse(raw).ok_or_else(|| anyhow!("unknown priority: {raw} (expected low, medium or high)"))
}

/// `none` or an empty value clears an optional field.
fn clearable(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::tempdir;

    use super::{clearable, cmd_subtask, list_query, parse_month, resolve_subtask};
    use crate::cli::{ListArgs, SubtaskCommand};
    use crate::datastore::{DataStore, TaskRepository};
    use crate::filter::{CategoryFilter, SortKey, StatusFilter, TaskQuery};
    use crate::subtasks::sorted_by_order;
    use crate::task::{Category, RecordId, Subtask, Task};
    use crate::workspace::Workspace;

    #[test]
    fn month_argument_is_checked() {
        assert_eq!(parse_month("2026-02").unwrap(), (2026, 2));
        assert!(parse_month("2026-13").is_err());
        assert!(parse_month("February").is_err());
    }

    #[test]
    fn none_clears_fields() {
        assert_eq!(clearable("none"), None);
        assert_eq!(clearable("  "), None);
        assert_eq!(clearable(" high "), Some("high"));
    }

    #[test]
    fn subtasks_resolve_by_position_or_id() {
        let mut task = Task::new("pack", Utc::now());
        task.subtasks = vec![
            Subtask::new(RecordId::from("late"), "tent", 1),
            Subtask::new(RecordId::from("early"), "boots", 0),
        ];
        assert_eq!(resolve_subtask(&task, "0").unwrap(), RecordId::from("early"));
        assert_eq!(resolve_subtask(&task, "late").unwrap(), RecordId::from("late"));
        assert!(resolve_subtask(&task, "7").is_err());
    }

    #[test]
    fn move_command_addresses_subtasks_in_display_order() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        let mut task = Task::new("trip", Utc::now());
        task.subtasks = vec![
            Subtask::new(RecordId::from("c"), "C", 2),
            Subtask::new(RecordId::from("a"), "A", 0),
            Subtask::new(RecordId::from("b"), "B", 1),
        ];
        let task = store.insert_task(task).expect("insert");
        let ws = Workspace::load(&store, TaskQuery::default()).expect("load");

        let command = SubtaskCommand::Move {
            task: task.id.to_string(),
            subtask: "0".to_string(),
            to: 2,
        };
        cmd_subtask(&store, &ws, command, Utc::now()).expect("move");

        let stored = store.list_tasks().expect("list");
        let order: Vec<(String, usize)> = sorted_by_order(&stored[0].subtasks)
            .into_iter()
            .map(|s| (s.title, s.order))
            .collect();
        assert_eq!(
            order,
            vec![("B".to_string(), 0), ("C".to_string(), 1), ("A".to_string(), 2)]
        );

        let too_far = SubtaskCommand::Move {
            task: task.id.to_string(),
            subtask: "a".to_string(),
            to: 3,
        };
        assert!(cmd_subtask(&store, &ws, too_far, Utc::now()).is_err());
    }

    #[test]
    fn list_arguments_override_defaults_and_resolve_names() {
        let mut home = Category::new("Home");
        home.id = RecordId::Int(2);
        let ws = Workspace {
            categories: vec![home],
            ..Workspace::default()
        };

        let query = list_query(
            &ws,
            ListArgs {
                category: Some("home".to_string()),
                status: Some("completed".to_string()),
                sort: Some("priority".to_string()),
                search: None,
            },
        )
        .unwrap();
        assert_eq!(query.category, CategoryFilter::Only(RecordId::Int(2).key()));
        assert_eq!(query.status, StatusFilter::Completed);
        assert_eq!(query.sort, SortKey::Priority);

        let query = list_query(&ws, ListArgs::default()).unwrap();
        assert_eq!(query.category, CategoryFilter::All);
    }
}
