use crate::error::TimerError;
use crate::split::{self, Run, Split};
use crate::storage::{Store, StoreExt, StorageKey};

pub fn load_runs(store: &dyn Store) -> Result<Vec<Run>, TimerError> {
    Ok(store.get::<Vec<Run>>(StorageKey::Runs)?.unwrap_or_default())
}

pub fn selected_index(store: &dyn Store) -> Result<usize, TimerError> {
    Ok(store.get::<usize>(StorageKey::SelectedRun)?.unwrap_or(0))
}

/// The run the timer picks its splits from, if any runs exist
pub fn selected_run(store: &dyn Store) -> Result<Option<(usize, Run)>, TimerError> {
    let index = selected_index(store)?;
    Ok(load_runs(store)?
        .into_iter()
        .nth(index)
        .map(|run| (index, run)))
}

/// Append a run definition and make it the selected run. Returns its index.
pub fn add_run(store: &mut dyn Store, run: Run) -> Result<usize, TimerError> {
    if run.name.trim().is_empty() {
        return Err(TimerError::MissingRequiredValue("run name".into()));
    }
    if run.splits.is_empty() {
        return Err(TimerError::MissingRequiredValue("run splits".into()));
    }
    split::validate_orders(&run.splits)?;

    let mut runs = load_runs(store)?;
    runs.push(run);
    let index = runs.len() - 1;
    store.set(StorageKey::Runs, &runs)?;
    store.set(StorageKey::SelectedRun, &index)?;

    tracing::info!(index, name = %runs[index].name, "added run");
    Ok(index)
}

pub fn select_run(store: &mut dyn Store, index: usize) -> Result<(), TimerError> {
    let runs = load_runs(store)?;
    if index >= runs.len() {
        return Err(TimerError::InvalidOperation(format!(
            "select run {index} of {}",
            runs.len()
        )));
    }
    store.set(StorageKey::SelectedRun, &index)?;
    tracing::info!(index, name = %runs[index].name, "selected run");
    Ok(())
}

/// Remove a run, keeping the selection pointed at the same run where possible
pub fn remove_run(store: &mut dyn Store, index: usize) -> Result<Run, TimerError> {
    let mut runs = load_runs(store)?;
    if index >= runs.len() {
        return Err(TimerError::InvalidOperation(format!(
            "remove run {index} of {}",
            runs.len()
        )));
    }

    let selected = selected_index(store)?;
    let removed = runs.remove(index);
    store.set(StorageKey::Runs, &runs)?;

    if runs.is_empty() {
        store.delete(StorageKey::SelectedRun)?;
    } else if index < selected {
        store.set(StorageKey::SelectedRun, &(selected - 1))?;
    } else if index == selected {
        store.set(StorageKey::SelectedRun, &0usize)?;
    }

    tracing::info!(index, name = %removed.name, "removed run");
    Ok(removed)
}

pub fn rename_run(store: &mut dyn Store, index: usize, name: &str) -> Result<(), TimerError> {
    if name.trim().is_empty() {
        return Err(TimerError::MissingRequiredValue("run name".into()));
    }
    edit_run(store, index, "rename", |run| {
        run.name = name.to_string();
        Ok(())
    })
}

/// Insert a split at `position` (appended when `None`). Returns its order.
pub fn add_split(
    store: &mut dyn Store,
    index: usize,
    title: &str,
    position: Option<usize>,
) -> Result<usize, TimerError> {
    edit_run(store, index, "add split", |run| {
        let position = position.unwrap_or(run.splits.len());
        if position > run.splits.len() {
            return Err(TimerError::InvalidOperation(format!(
                "insert split at {position} of {}",
                run.splits.len()
            )));
        }
        run.splits.insert(position, Split::new(title, position));
        Ok(position)
    })
}

pub fn rename_split(
    store: &mut dyn Store,
    index: usize,
    order: usize,
    title: &str,
) -> Result<(), TimerError> {
    edit_run(store, index, "rename split", |run| {
        let split = split_at(run, order)?;
        *split = Split::new(title, order);
        Ok(())
    })
}

/// Remove a split. A run keeps at least one split.
pub fn remove_split(store: &mut dyn Store, index: usize, order: usize) -> Result<Split, TimerError> {
    edit_run(store, index, "remove split", |run| {
        split_at(run, order)?;
        if run.splits.len() == 1 {
            return Err(TimerError::InvalidOperation(
                "remove the only split of a run".into(),
            ));
        }
        Ok(run.splits.remove(order))
    })
}

pub fn move_split(
    store: &mut dyn Store,
    index: usize,
    from: usize,
    to: usize,
) -> Result<(), TimerError> {
    edit_run(store, index, "move split", |run| {
        split_at(run, from)?;
        split_at(run, to)?;
        let split = run.splits.remove(from);
        run.splits.insert(to, split);
        Ok(())
    })
}

fn split_at(run: &mut Run, order: usize) -> Result<&mut Split, TimerError> {
    let Run { name, splits } = run;
    let len = splits.len();
    splits.get_mut(order).ok_or_else(|| {
        TimerError::InvalidOperation(format!("split {order} of {len} in run {name}"))
    })
}

/// Load run `index` with its splits sorted by order, apply `edit`, renumber the
/// orders by position and save. Nothing is written when `edit` fails.
fn edit_run<T>(
    store: &mut dyn Store,
    index: usize,
    what: &str,
    edit: impl FnOnce(&mut Run) -> Result<T, TimerError>,
) -> Result<T, TimerError> {
    let mut runs = load_runs(store)?;
    let count = runs.len();
    let run = runs.get_mut(index).ok_or_else(|| {
        TimerError::InvalidOperation(format!("{what} in run {index} of {count}"))
    })?;

    run.splits = split::in_order(&run.splits).into_iter().cloned().collect();
    let result = edit(run)?;
    for (order, split) in run.splits.iter_mut().enumerate() {
        split.order = order;
    }
    split::validate_orders(&run.splits)?;

    tracing::info!(index, name = %run.name, splits = run.splits.len(), "{what}");
    store.set(StorageKey::Runs, &runs)?;
    Ok(result)
}
