use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::client::{ApiClient, ApiRequest};
use crate::error::{Error, Result};
use crate::sources::Source;

const INTEGRATIONS_PATH: &str = "/rest/v1/integrations";

/// The current authenticated session.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Which third-party providers the user has authorized. Token values never
/// reach this side; only their presence does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Integrations {
    pub todoist: bool,
    pub ticktick: bool,
    pub google_tasks: bool,
    pub microsoft_todo: bool,
}

impl Integrations {
    /// Column name of a provider in the integration record.
    fn record_key(source: Source) -> Option<&'static str> {
        match source {
            Source::Native => None,
            Source::Todoist => Some("todoist"),
            Source::TickTick => Some("ticktick"),
            Source::GoogleTasks => Some("googletasks"),
            Source::MicrosoftToDo => Some("microsofttodo"),
        }
    }

    /// Read an integration record (a single object or a one-row array).
    /// A provider counts as authorized when its column is present and truthy.
    pub fn from_record(record: &Value) -> Self {
        let row = match record {
            Value::Array(rows) => rows.first(),
            Value::Object(_) => Some(record),
            _ => None,
        };
        let authorized = |source: Source| {
            let Some(row) = row else { return false };
            Self::record_key(source)
                .and_then(|key| row.get(key))
                .is_some_and(is_truthy)
        };
        Self {
            todoist: authorized(Source::Todoist),
            ticktick: authorized(Source::TickTick),
            google_tasks: authorized(Source::GoogleTasks),
            microsoft_todo: authorized(Source::MicrosoftToDo),
        }
    }

    pub fn is_authorized(&self, source: Source) -> bool {
        match source {
            Source::Native => true,
            Source::Todoist => self.todoist,
            Source::TickTick => self.ticktick,
            Source::GoogleTasks => self.google_tasks,
            Source::MicrosoftToDo => self.microsoft_todo,
        }
    }

    /// Native first, then every authorized provider in registry order.
    pub fn available_sources(&self) -> Vec<Source> {
        Source::ALL
            .into_iter()
            .filter(|s| self.is_authorized(*s))
            .collect()
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Session collaborator consumed by `fetch_sources`.
///
/// Both calls may block; the store runs them off the async runtime.
pub trait SessionProvider: Send + Sync {
    /// `None` when nobody is signed in. Not an error.
    fn session(&self) -> Result<Option<Session>>;

    fn integrations(&self) -> Result<Integrations>;
}

/// Session provider backed by the application backend.
pub struct HttpSessionProvider {
    client: Arc<dyn ApiClient>,
    access_token: Option<String>,
}

impl HttpSessionProvider {
    pub fn new(client: Arc<dyn ApiClient>, access_token: Option<String>) -> Self {
        Self {
            client,
            access_token: access_token.filter(|t| !t.trim().is_empty()),
        }
    }
}

impl SessionProvider for HttpSessionProvider {
    fn session(&self) -> Result<Option<Session>> {
        Ok(self.access_token.as_ref().map(|token| Session {
            access_token: token.clone(),
        }))
    }

    fn integrations(&self) -> Result<Integrations> {
        if self.access_token.is_none() {
            return Err(Error::Session("no active session".to_string()));
        }
        let request = ApiRequest::get(INTEGRATIONS_PATH)
            .with_query("select", "todoist,ticktick,googletasks,microsofttodo");
        let record = self.client.send(&request)?;
        let integrations = Integrations::from_record(&record);
        debug!(?integrations, "loaded integration record");
        Ok(integrations)
    }
}
