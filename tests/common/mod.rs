#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tasksync::cancel::CancelToken;
use tasksync::error::{Error, Result};
use tasksync::registry::SourceFactory;
use tasksync::report::ErrorReporter;
use tasksync::session::{Integrations, Session, SessionProvider};
use tasksync::sources::{List, NewTaskOptions, Source, Task, TaskSource};
use tasksync::store::TaskStore;
use tokio::sync::{mpsc, oneshot};

// --- Scripted provider ---

/// Canned provider data plus gates that hold individual calls open until the
/// test releases them.
///
/// Gate keys: `add`, `lists`, `labels`, and `tasks:<list id>` (`tasks:` when
/// no list is active).
struct Shared {
    honor_cancel: bool,
    lists: HashMap<Source, Vec<List>>,
    tasks: HashMap<String, Vec<Task>>,
    labels: HashMap<Source, Vec<String>>,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    started: mpsc::UnboundedSender<String>,
    next_id: AtomicUsize,
}

impl Shared {
    async fn hold(&self, key: String, cancel: Option<&CancelToken>) -> Result<()> {
        let _ = self.started.send(key.clone());
        let gate = self.gates.lock().unwrap().remove(&key);
        let Some(gate) = gate else {
            return Ok(());
        };
        match cancel.filter(|_| self.honor_cancel) {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => Err(Error::Cancelled),
                    _ = gate => Ok(()),
                }
            }
            None => {
                let _ = gate.await;
                Ok(())
            }
        }
    }
}

pub struct ScriptedSource {
    source: Source,
    shared: Arc<Shared>,
}

impl TaskSource for ScriptedSource {
    async fn add_task(&self, name: &str, options: NewTaskOptions) -> Result<Task> {
        self.shared.hold("add".to_string(), None).await?;
        let n = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        let mut task = Task::new(format!("new-{n}"), name);
        task.labels = options.label.map(|l| vec![l]);
        Ok(task)
    }

    async fn edit_task(&self, _task_id: &str, _name: &str, _list_id: Option<&str>) -> Result<()> {
        Ok(())
    }

    async fn delete_task(&self, _task_id: &str, _list_id: Option<&str>) -> Result<()> {
        Ok(())
    }

    async fn complete_task(&self, _task_id: &str, _list_id: Option<&str>) -> Result<()> {
        Ok(())
    }

    async fn undo_complete_task(&self, _task_id: &str, _list_id: Option<&str>) -> Result<()> {
        Ok(())
    }

    async fn fetch_tasks(
        &self,
        list_id: Option<&str>,
        cancel: Option<CancelToken>,
    ) -> Result<Vec<Task>> {
        let key = list_id.unwrap_or_default().to_string();
        self.shared
            .hold(format!("tasks:{key}"), cancel.as_ref())
            .await?;
        Ok(self.shared.tasks.get(&key).cloned().unwrap_or_default())
    }

    async fn fetch_lists(&self) -> Result<Vec<List>> {
        self.shared.hold("lists".to_string(), None).await?;
        Ok(self
            .shared
            .lists
            .get(&self.source)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_labels(&self) -> Result<Vec<String>> {
        self.shared.hold("labels".to_string(), None).await?;
        Ok(self
            .shared
            .labels
            .get(&self.source)
            .cloned()
            .unwrap_or_default())
    }

    fn supports_labels(&self) -> bool {
        !self.source.is_native()
    }

    fn virtual_list(&self) -> Option<List> {
        (self.source == Source::Todoist).then(|| List::new("today", "Today"))
    }
}

pub struct ScriptedFactory {
    shared: Arc<Shared>,
}

impl SourceFactory for ScriptedFactory {
    type Source = ScriptedSource;

    fn create(&self, source: Source) -> Result<ScriptedSource> {
        Ok(ScriptedSource {
            source,
            shared: Arc::clone(&self.shared),
        })
    }
}

/// Builder for a scripted provider world.
#[derive(Default)]
pub struct Script {
    honor_cancel: bool,
    lists: HashMap<Source, Vec<List>>,
    tasks: HashMap<String, Vec<Task>>,
    labels: HashMap<Source, Vec<String>>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `fetch_tasks` return `Cancelled` when its token fires. Otherwise
    /// the adapter ignores the token and always runs to completion.
    pub fn honor_cancel(mut self) -> Self {
        self.honor_cancel = true;
        self
    }

    pub fn lists(mut self, source: Source, lists: Vec<List>) -> Self {
        self.lists.insert(source, lists);
        self
    }

    /// Tasks for `list_id` (`""` for no active list).
    pub fn tasks(mut self, list_id: &str, tasks: Vec<Task>) -> Self {
        self.tasks.insert(list_id.to_string(), tasks);
        self
    }

    pub fn labels(mut self, source: Source, labels: &[&str]) -> Self {
        self.labels
            .insert(source, labels.iter().map(|l| l.to_string()).collect());
        self
    }

    pub fn build(self) -> Harness {
        let (started_tx, started_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            honor_cancel: self.honor_cancel,
            lists: self.lists,
            tasks: self.tasks,
            labels: self.labels,
            gates: Mutex::new(HashMap::new()),
            started: started_tx,
            next_id: AtomicUsize::new(1),
        });
        let reporter = Arc::new(RecordingReporter::default());
        let store = TaskStore::new(
            ScriptedFactory {
                shared: Arc::clone(&shared),
            },
            Arc::new(NoSession),
            reporter.clone(),
        )
        .unwrap();
        Harness {
            store,
            reporter,
            shared,
            started: started_rx,
        }
    }
}

pub struct Harness {
    pub store: TaskStore<ScriptedFactory>,
    pub reporter: Arc<RecordingReporter>,
    shared: Arc<Shared>,
    started: mpsc::UnboundedReceiver<String>,
}

impl Harness {
    /// Hold the next call with `key` until the returned sender fires.
    pub fn gate(&self, key: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.shared
            .gates
            .lock()
            .unwrap()
            .insert(key.to_string(), rx);
        tx
    }

    /// Wait until a call with `key` has started.
    pub async fn started(&mut self, key: &str) {
        let wait = async {
            while let Some(seen) = self.started.recv().await {
                if seen == key {
                    return;
                }
            }
            panic!("scripted source dropped before {key} started");
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {key} to start"));
    }
}

// --- Collaborators ---

#[derive(Default)]
pub struct RecordingReporter {
    messages: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

pub struct NoSession;

impl SessionProvider for NoSession {
    fn session(&self) -> Result<Option<Session>> {
        Ok(None)
    }

    fn integrations(&self) -> Result<Integrations> {
        Ok(Integrations::default())
    }
}

// --- Fixtures ---

pub fn task(id: &str, name: &str) -> Task {
    Task::new(id, name)
}

pub fn labelled(id: &str, name: &str, labels: &[&str]) -> Task {
    let mut task = Task::new(id, name);
    task.labels = Some(labels.iter().map(|l| l.to_string()).collect());
    task
}
