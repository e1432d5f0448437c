use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::client::{ApiClient, ApiRequest, call};
use crate::error::{Error, Result};

use super::{List, NewTaskOptions, Task, TaskSource, WireId, parse_due};

const TASKS_PATH: &str = "/rest/v1/tasks";
const INBOX_ID: &str = "inbox";
const INBOX_NAME: &str = "Inbox";

// ---------------------------------------------------------------------------
// REST row types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TaskRow {
    id: WireId,
    name: String,
    #[serde(default)]
    due: Option<String>,
    #[serde(default)]
    labels: Option<Vec<String>>,
    #[serde(default)]
    completed: bool,
}

impl TaskRow {
    fn into_task(self) -> Task {
        Task {
            id: self.id.into_string(),
            name: self.name,
            due: self.due.as_deref().and_then(parse_due),
            labels: self.labels.filter(|l| !l.is_empty()),
            completed: self.completed,
        }
    }
}

/// Mutations ask for `return=representation`, so the backend answers with
/// the affected rows, either as an array or a single object.
fn parse_rows(data: Value, what: &str) -> Result<Vec<TaskRow>> {
    match data {
        Value::Null => Ok(Vec::new()),
        Value::Array(_) => serde_json::from_value(data)
            .map_err(|e| Error::TaskSource(format!("failed to parse {what}: {e}"))),
        other => serde_json::from_value(other)
            .map(|row| vec![row])
            .map_err(|e| Error::TaskSource(format!("failed to parse {what}: {e}"))),
    }
}

// ---------------------------------------------------------------------------
// NativeSource
// ---------------------------------------------------------------------------

/// Adapter for the application's own task table.
///
/// The native store has no list concept and no label taxonomy, so it exposes
/// a single synthetic "Inbox" list and ignores list ids and labels.
pub struct NativeSource {
    client: Arc<dyn ApiClient>,
}

impl NativeSource {
    pub fn new(client: Arc<dyn ApiClient>) -> Self {
        Self { client }
    }

    fn row_filter(task_id: &str) -> String {
        format!("eq.{task_id}")
    }

    /// PATCH one row and fail when nothing matched.
    async fn update_row(&self, task_id: &str, body: Value, action: &str) -> Result<()> {
        let request = ApiRequest::patch(TASKS_PATH, body)
            .with_query("id", Self::row_filter(task_id))
            .with_header("Prefer", "return=representation");
        let data = call(&self.client, request, None).await?;
        let rows = parse_rows(data, "updated task")?;
        if rows.is_empty() {
            return Err(Error::TaskSource(format!(
                "cannot {action} task {task_id}: not found"
            )));
        }
        Ok(())
    }
}

impl TaskSource for NativeSource {
    async fn add_task(&self, name: &str, _options: NewTaskOptions) -> Result<Task> {
        let body = json!({ "name": name });
        let request =
            ApiRequest::post(TASKS_PATH, body).with_header("Prefer", "return=representation");
        let data = call(&self.client, request, None).await?;

        let task = parse_rows(data, "created task")?
            .into_iter()
            .next()
            .map(TaskRow::into_task)
            .ok_or_else(|| Error::TaskSource("backend returned no created task".to_string()))?;

        debug!(task_id = %task.id, "created native task");
        Ok(task)
    }

    async fn edit_task(&self, task_id: &str, name: &str, _list_id: Option<&str>) -> Result<()> {
        self.update_row(task_id, json!({ "name": name }), "edit").await
    }

    async fn delete_task(&self, task_id: &str, _list_id: Option<&str>) -> Result<()> {
        let request = ApiRequest::delete(TASKS_PATH).with_query("id", Self::row_filter(task_id));
        call(&self.client, request, None).await?;
        debug!(task_id, "deleted native task");
        Ok(())
    }

    async fn complete_task(&self, task_id: &str, _list_id: Option<&str>) -> Result<()> {
        self.update_row(task_id, json!({ "completed": true }), "complete")
            .await
    }

    async fn undo_complete_task(&self, task_id: &str, _list_id: Option<&str>) -> Result<()> {
        self.update_row(task_id, json!({ "completed": false }), "reopen")
            .await
    }

    async fn fetch_tasks(
        &self,
        _list_id: Option<&str>,
        cancel: Option<CancelToken>,
    ) -> Result<Vec<Task>> {
        let request = ApiRequest::get(TASKS_PATH)
            .with_query("select", "*")
            .with_query("completed", "eq.false")
            .with_query("order", "created_at.asc");
        let data = call(&self.client, request, cancel.as_ref()).await?;

        let tasks: Vec<Task> = parse_rows(data, "native tasks")?
            .into_iter()
            .map(TaskRow::into_task)
            .filter(|t| !t.completed)
            .collect();

        debug!(count = tasks.len(), "fetched native tasks");
        Ok(tasks)
    }

    async fn fetch_lists(&self) -> Result<Vec<List>> {
        Ok(vec![List::new(INBOX_ID, INBOX_NAME)])
    }

    async fn fetch_labels(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn supports_labels(&self) -> bool {
        false
    }
}
