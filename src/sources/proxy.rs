use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::client::{ApiClient, ApiRequest, call};
use crate::error::{Error, Result};

use super::{List, NewTaskOptions, Source, Task, TaskSource, WireId, parse_due};

/// Static description of one third-party provider as seen through the
/// backend proxy. The proxy owns the provider's wire protocol and tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderProfile {
    pub source: Source,
    /// Path segment under `/functions/v1/`.
    pub slug: &'static str,
    pub supports_labels: bool,
    /// `(id, name)` of the pseudo-list the provider scopes to by default.
    pub virtual_list: Option<(&'static str, &'static str)>,
}

pub const TODOIST: ProviderProfile = ProviderProfile {
    source: Source::Todoist,
    slug: "todoist",
    supports_labels: true,
    virtual_list: Some(("today", "Today")),
};

pub const TICKTICK: ProviderProfile = ProviderProfile {
    source: Source::TickTick,
    slug: "ticktick",
    supports_labels: true,
    virtual_list: None,
};

pub const GOOGLE_TASKS: ProviderProfile = ProviderProfile {
    source: Source::GoogleTasks,
    slug: "googletasks",
    supports_labels: false,
    virtual_list: None,
};

pub const MICROSOFT_TODO: ProviderProfile = ProviderProfile {
    source: Source::MicrosoftToDo,
    slug: "microsofttodo",
    supports_labels: true,
    virtual_list: None,
};

// ---------------------------------------------------------------------------
// Proxy response types
// ---------------------------------------------------------------------------

/// Providers spell the due field differently; some nest it in an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DueField {
    Text(String),
    Nested {
        #[serde(alias = "dateTime", alias = "datetime")]
        date: String,
    },
}

impl DueField {
    fn as_str(&self) -> &str {
        match self {
            DueField::Text(s) => s,
            DueField::Nested { date } => date,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProxyTask {
    id: WireId,
    #[serde(alias = "content", alias = "title")]
    name: String,
    #[serde(default, alias = "dueDate", alias = "dueDateTime", alias = "due_date")]
    due: Option<DueField>,
    #[serde(default, alias = "tags", alias = "categories")]
    labels: Option<Vec<String>>,
    #[serde(default, alias = "is_completed", alias = "isCompleted")]
    completed: bool,
}

impl ProxyTask {
    fn into_task(self) -> Task {
        Task {
            id: self.id.into_string(),
            name: self.name,
            due: self.due.as_ref().and_then(|d| parse_due(d.as_str())),
            labels: self.labels.filter(|l| !l.is_empty()),
            completed: self.completed,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProxyList {
    id: WireId,
    #[serde(alias = "title", alias = "displayName")]
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProxyLabel {
    Name(String),
    Object { name: String },
}

impl ProxyLabel {
    fn into_name(self) -> String {
        match self {
            ProxyLabel::Name(name) | ProxyLabel::Object { name } => name,
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(data: Value, what: &str) -> Result<T> {
    serde_json::from_value(data).map_err(|e| Error::TaskSource(format!("failed to parse {what}: {e}")))
}

// ---------------------------------------------------------------------------
// ProxySource
// ---------------------------------------------------------------------------

/// Adapter for a third-party provider reached through the backend proxy.
pub struct ProxySource {
    profile: ProviderProfile,
    client: Arc<dyn ApiClient>,
}

impl ProxySource {
    pub fn new(profile: ProviderProfile, client: Arc<dyn ApiClient>) -> Self {
        Self { profile, client }
    }

    fn path(&self, suffix: &str) -> String {
        format!("/functions/v1/{}/{suffix}", self.profile.slug)
    }

    fn task_path(&self, task_id: &str, action: Option<&str>) -> String {
        match action {
            Some(action) => self.path(&format!("tasks/{task_id}/{action}")),
            None => self.path(&format!("tasks/{task_id}")),
        }
    }

    async fn task_action(&self, task_id: &str, action: &str, list_id: Option<&str>) -> Result<()> {
        let request = ApiRequest::post(self.task_path(task_id, Some(action)), json!({}))
            .with_optional_query("list_id", list_id);
        call(&self.client, request, None).await?;
        debug!(provider = self.profile.slug, task_id, action, "task action applied");
        Ok(())
    }
}

impl TaskSource for ProxySource {
    async fn add_task(&self, name: &str, options: NewTaskOptions) -> Result<Task> {
        let mut body = json!({ "name": name });
        if let Some(list_id) = options.list_id {
            body["list_id"] = json!(list_id);
        }
        if self.profile.supports_labels
            && let Some(label) = options.label
        {
            body["labels"] = json!([label]);
        }

        let data = call(&self.client, ApiRequest::post(self.path("tasks"), body), None).await?;
        let task = parse::<ProxyTask>(data, "created task")?.into_task();

        debug!(provider = self.profile.slug, task_id = %task.id, "created task");
        Ok(task)
    }

    async fn edit_task(&self, task_id: &str, name: &str, list_id: Option<&str>) -> Result<()> {
        let request = ApiRequest::patch(self.task_path(task_id, None), json!({ "name": name }))
            .with_optional_query("list_id", list_id);
        call(&self.client, request, None).await?;
        Ok(())
    }

    async fn delete_task(&self, task_id: &str, list_id: Option<&str>) -> Result<()> {
        let request =
            ApiRequest::delete(self.task_path(task_id, None)).with_optional_query("list_id", list_id);
        call(&self.client, request, None).await?;
        debug!(provider = self.profile.slug, task_id, "deleted task");
        Ok(())
    }

    async fn complete_task(&self, task_id: &str, list_id: Option<&str>) -> Result<()> {
        self.task_action(task_id, "complete", list_id).await
    }

    async fn undo_complete_task(&self, task_id: &str, list_id: Option<&str>) -> Result<()> {
        self.task_action(task_id, "reopen", list_id).await
    }

    async fn fetch_tasks(
        &self,
        list_id: Option<&str>,
        cancel: Option<CancelToken>,
    ) -> Result<Vec<Task>> {
        let request = ApiRequest::get(self.path("tasks")).with_optional_query("list_id", list_id);
        let data = call(&self.client, request, cancel.as_ref()).await?;

        let tasks: Vec<Task> = parse::<Vec<ProxyTask>>(data, "tasks")?
            .into_iter()
            .map(ProxyTask::into_task)
            .filter(|t| !t.completed)
            .collect();

        debug!(provider = self.profile.slug, count = tasks.len(), "fetched tasks");
        Ok(tasks)
    }

    async fn fetch_lists(&self) -> Result<Vec<List>> {
        let data = call(&self.client, ApiRequest::get(self.path("lists")), None).await?;
        let mut lists: Vec<List> = parse::<Vec<ProxyList>>(data, "lists")?
            .into_iter()
            .map(|l| List::new(l.id.into_string(), l.name))
            .collect();

        if lists.is_empty()
            && let Some(list) = self.virtual_list()
        {
            lists.push(list);
        }

        debug!(provider = self.profile.slug, count = lists.len(), "fetched lists");
        Ok(lists)
    }

    async fn fetch_labels(&self) -> Result<Vec<String>> {
        if !self.profile.supports_labels {
            return Ok(Vec::new());
        }
        let data = call(&self.client, ApiRequest::get(self.path("labels")), None).await?;
        let labels: Vec<String> = parse::<Vec<ProxyLabel>>(data, "labels")?
            .into_iter()
            .map(ProxyLabel::into_name)
            .collect();
        debug!(provider = self.profile.slug, count = labels.len(), "fetched labels");
        Ok(labels)
    }

    fn supports_labels(&self) -> bool {
        self.profile.supports_labels
    }

    fn virtual_list(&self) -> Option<List> {
        self.profile
            .virtual_list
            .map(|(id, name)| List::new(id, name))
    }
}
