pub mod native;
pub mod proxy;

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};

pub use native::NativeSource;
pub use proxy::{ProviderProfile, ProxySource};

/// Provider identity. Keys the registry and doubles as a UI label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    Native,
    Todoist,
    #[serde(rename = "ticktick")]
    TickTick,
    GoogleTasks,
    #[serde(rename = "microsoft-todo")]
    MicrosoftToDo,
}

impl Source {
    /// Every source, native first, in the order they are offered.
    pub const ALL: [Source; 5] = [
        Source::Native,
        Source::Todoist,
        Source::TickTick,
        Source::GoogleTasks,
        Source::MicrosoftToDo,
    ];

    /// Stable machine key used in config, CLI args and backend paths.
    pub fn key(&self) -> &'static str {
        match self {
            Source::Native => "native",
            Source::Todoist => "todoist",
            Source::TickTick => "ticktick",
            Source::GoogleTasks => "google-tasks",
            Source::MicrosoftToDo => "microsoft-todo",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Source::Native => "Native",
            Source::Todoist => "Todoist",
            Source::TickTick => "TickTick",
            Source::GoogleTasks => "Google Tasks",
            Source::MicrosoftToDo => "Microsoft To Do",
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Source::Native)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Source {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim();
        Source::ALL
            .into_iter()
            .find(|source| {
                source.key().eq_ignore_ascii_case(needle)
                    || source.label().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| {
                let expected: Vec<&str> = Source::ALL.iter().map(|s| s.key()).collect();
                Error::ConfigValidation(format!(
                    "unknown source: {needle} (expected: {})",
                    expected.join(", ")
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    /// Display name, may contain markdown.
    pub name: String,
    #[serde(default)]
    pub due: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            due: None,
            labels: None,
            completed: false,
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels
            .as_ref()
            .is_some_and(|labels| labels.iter().any(|l| l == label))
    }
}

/// A provider-defined grouping (project, folder, task list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct List {
    pub id: String,
    pub name: String,
}

impl List {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Scope for a newly created task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTaskOptions {
    pub list_id: Option<String>,
    pub label: Option<String>,
}

/// Identifiers arrive as integers or strings depending on the backend.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireId {
    Text(String),
    Number(i64),
}

impl WireId {
    pub(crate) fn into_string(self) -> String {
        match self {
            WireId::Text(s) => s,
            WireId::Number(n) => n.to_string(),
        }
    }
}

/// Normalize a provider due value: RFC 3339, naive date-time or plain date.
/// Plain dates land at midnight UTC.
pub fn parse_due(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// The only vocabulary the store uses to talk to a provider.
///
/// Identifiers are opaque provider-scoped strings. The contract is lossy on
/// purpose: it carries only what every provider can supply.
pub trait TaskSource {
    /// Create a task in `options.list_id` (or the provider default) and
    /// return the canonical created task with its server-assigned id.
    fn add_task(
        &self,
        name: &str,
        options: NewTaskOptions,
    ) -> impl Future<Output = Result<Task>> + Send;

    /// Rename a task in place. Fails if the task no longer exists.
    fn edit_task(
        &self,
        task_id: &str,
        name: &str,
        list_id: Option<&str>,
    ) -> impl Future<Output = Result<()>> + Send;

    fn delete_task(
        &self,
        task_id: &str,
        list_id: Option<&str>,
    ) -> impl Future<Output = Result<()>> + Send;

    fn complete_task(
        &self,
        task_id: &str,
        list_id: Option<&str>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Reverse a completion, keeping the task's identifier.
    fn undo_complete_task(
        &self,
        task_id: &str,
        list_id: Option<&str>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Fetch the open-task set. Must return [`Error::Cancelled`] once
    /// `cancel` fires, never a generic failure.
    fn fetch_tasks(
        &self,
        list_id: Option<&str>,
        cancel: Option<CancelToken>,
    ) -> impl Future<Output = Result<Vec<Task>>> + Send;

    /// Providers without real lists return a single synthetic entry.
    fn fetch_lists(&self) -> impl Future<Output = Result<Vec<List>>> + Send;

    /// Providers without label support return an empty set.
    fn fetch_labels(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn supports_labels(&self) -> bool;

    /// Pseudo-list to scope to before the real list fetch resolves.
    fn virtual_list(&self) -> Option<List> {
        None
    }
}

/// Sealed set of adapters the registry can build.
pub enum AnySource {
    Native(NativeSource),
    Proxy(ProxySource),
}

impl TaskSource for AnySource {
    async fn add_task(&self, name: &str, options: NewTaskOptions) -> Result<Task> {
        match self {
            AnySource::Native(s) => s.add_task(name, options).await,
            AnySource::Proxy(s) => s.add_task(name, options).await,
        }
    }

    async fn edit_task(&self, task_id: &str, name: &str, list_id: Option<&str>) -> Result<()> {
        match self {
            AnySource::Native(s) => s.edit_task(task_id, name, list_id).await,
            AnySource::Proxy(s) => s.edit_task(task_id, name, list_id).await,
        }
    }

    async fn delete_task(&self, task_id: &str, list_id: Option<&str>) -> Result<()> {
        match self {
            AnySource::Native(s) => s.delete_task(task_id, list_id).await,
            AnySource::Proxy(s) => s.delete_task(task_id, list_id).await,
        }
    }

    async fn complete_task(&self, task_id: &str, list_id: Option<&str>) -> Result<()> {
        match self {
            AnySource::Native(s) => s.complete_task(task_id, list_id).await,
            AnySource::Proxy(s) => s.complete_task(task_id, list_id).await,
        }
    }

    async fn undo_complete_task(&self, task_id: &str, list_id: Option<&str>) -> Result<()> {
        match self {
            AnySource::Native(s) => s.undo_complete_task(task_id, list_id).await,
            AnySource::Proxy(s) => s.undo_complete_task(task_id, list_id).await,
        }
    }

    async fn fetch_tasks(
        &self,
        list_id: Option<&str>,
        cancel: Option<CancelToken>,
    ) -> Result<Vec<Task>> {
        match self {
            AnySource::Native(s) => s.fetch_tasks(list_id, cancel).await,
            AnySource::Proxy(s) => s.fetch_tasks(list_id, cancel).await,
        }
    }

    async fn fetch_lists(&self) -> Result<Vec<List>> {
        match self {
            AnySource::Native(s) => s.fetch_lists().await,
            AnySource::Proxy(s) => s.fetch_lists().await,
        }
    }

    async fn fetch_labels(&self) -> Result<Vec<String>> {
        match self {
            AnySource::Native(s) => s.fetch_labels().await,
            AnySource::Proxy(s) => s.fetch_labels().await,
        }
    }

    fn supports_labels(&self) -> bool {
        match self {
            AnySource::Native(s) => s.supports_labels(),
            AnySource::Proxy(s) => s.supports_labels(),
        }
    }

    fn virtual_list(&self) -> Option<List> {
        match self {
            AnySource::Native(s) => s.virtual_list(),
            AnySource::Proxy(s) => s.virtual_list(),
        }
    }
}
