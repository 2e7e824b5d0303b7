//! Ordered subtask collections. Every function returns a fresh sequence
//! whose `order` fields equal their positions (0, 1, 2, ...).

use tracing::debug;

use crate::task::{RecordId, Subtask};
use crate::validate::{ValidationError, validate_title};

/// Working sequence for index-based edits: ascending `order`, ties kept in
/// input order.
pub fn sorted_by_order(subtasks: &[Subtask]) -> Vec<Subtask> {
    let mut out = subtasks.to_vec();
    out.sort_by_key(|s| s.order);
    out
}

/// Reassigns `order` from position.
pub fn renumber(subtasks: Vec<Subtask>) -> Vec<Subtask> {
    subtasks
        .into_iter()
        .enumerate()
        .map(|(idx, mut subtask)| {
            subtask.order = idx;
            subtask
        })
        .collect()
}

/// Moves the subtask at `source` to `destination` and renumbers. Either
/// index out of range leaves the sequence as it was.
#[tracing::instrument(skip(subtasks), fields(len = subtasks.len()))]
pub fn reorder_subtasks(subtasks: &[Subtask], source: usize, destination: usize) -> Vec<Subtask> {
    let len = subtasks.len();
    if source >= len || destination >= len {
        debug!("reorder index out of range; leaving subtasks unchanged");
        return subtasks.to_vec();
    }

    let mut items = subtasks.to_vec();
    let moved = items.remove(source);
    items.insert(destination, moved);
    renumber(items)
}

/// Appends a new incomplete subtask with a trimmed title.
pub fn add_subtask(
    subtasks: &[Subtask],
    id: RecordId,
    title: &str,
) -> Result<Vec<Subtask>, ValidationError> {
    let title = validate_title(title)?;
    let mut items = sorted_by_order(subtasks);
    items.push(Subtask::new(id, title, 0));
    Ok(renumber(items))
}

/// Flips completion of the subtask with `id`; unknown ids change nothing.
pub fn toggle_subtask(subtasks: &[Subtask], id: &RecordId) -> Vec<Subtask> {
    let items = sorted_by_order(subtasks)
        .into_iter()
        .map(|mut subtask| {
            if &subtask.id == id {
                subtask.is_completed = !subtask.is_completed;
            }
            subtask
        })
        .collect();
    renumber(items)
}

/// Retitles a subtask. A blank title removes it instead.
pub fn rename_subtask(subtasks: &[Subtask], id: &RecordId, title: &str) -> Vec<Subtask> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return remove_subtask(subtasks, id);
    }

    let items = sorted_by_order(subtasks)
        .into_iter()
        .map(|mut subtask| {
            if &subtask.id == id {
                subtask.title = trimmed.to_string();
            }
            subtask
        })
        .collect();
    renumber(items)
}

pub fn remove_subtask(subtasks: &[Subtask], id: &RecordId) -> Vec<Subtask> {
    let items = sorted_by_order(subtasks)
        .into_iter()
        .filter(|subtask| &subtask.id != id)
        .collect();
    renumber(items)
}

/// Position of `id` in the order-sorted sequence.
pub fn position_of(subtasks: &[Subtask], id: &RecordId) -> Option<usize> {
    sorted_by_order(subtasks).iter().position(|s| &s.id == id)
}

/// Moves the subtask with `id` to position `destination` of the
/// order-sorted sequence, whatever the stored array order is. Unknown ids
/// and out-of-range positions change nothing.
pub fn move_subtask(subtasks: &[Subtask], id: &RecordId, destination: usize) -> Vec<Subtask> {
    let ordered = sorted_by_order(subtasks);
    match position_of(&ordered, id) {
        Some(source) => reorder_subtasks(&ordered, source, destination),
        None => ordered,
    }
}
