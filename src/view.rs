use crate::sources::{Source, Task};

/// Tasks visible under the current scope.
///
/// The native store has no label taxonomy, so a label never filters it. An
/// empty label means no filter.
pub fn visible_tasks(tasks: &[Task], active_label: &str, active_source: Source) -> Vec<Task> {
    if active_label.is_empty() || active_source.is_native() {
        return tasks.to_vec();
    }
    tasks
        .iter()
        .filter(|task| task.has_label(active_label))
        .cloned()
        .collect()
}
