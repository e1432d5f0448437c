use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::auth::AuthorizationOutcome;
use crate::cancel::CancelHandle;
use crate::client::run_blocking;
use crate::error::{Error, Result};
use crate::registry::SourceFactory;
use crate::report::ErrorReporter;
use crate::session::SessionProvider;
use crate::sources::{List, NewTaskOptions, Source, Task, TaskSource};
use crate::view;

/// Everything the store knows at one instant.
///
/// Subscribers receive whole snapshots; a snapshot is never partially
/// updated.
pub struct StoreState<S> {
    pub tasks: Vec<Task>,
    pub lists: Vec<List>,
    pub labels: Vec<String>,
    /// Authorized sources, native first.
    pub sources: Vec<Source>,
    pub active_source: Source,
    pub active_list: Option<String>,
    /// Empty means no label filter.
    pub active_label: String,
    pub focusing_task: Option<Task>,
    pub modifying_task: Option<Task>,
    /// Live adapter for `active_source`.
    pub source_instance: Arc<S>,
    pub is_loading_tasks: bool,
    pub is_loading_lists: bool,
    pub is_loading_labels: bool,
    pub is_loading_sources: bool,
    /// Bumped on every source switch.
    pub source_epoch: u64,
    tasks_fetch: Option<CancelHandle>,
}

impl<S> StoreState<S> {
    fn new(instance: S) -> Self {
        Self {
            tasks: Vec::new(),
            lists: Vec::new(),
            labels: Vec::new(),
            sources: vec![Source::Native],
            active_source: Source::Native,
            active_list: None,
            active_label: String::new(),
            focusing_task: None,
            modifying_task: None,
            source_instance: Arc::new(instance),
            is_loading_tasks: true,
            is_loading_lists: true,
            is_loading_labels: false,
            is_loading_sources: true,
            source_epoch: 0,
            tasks_fetch: None,
        }
    }

    /// Id of the outstanding task fetch, if any.
    pub fn pending_fetch(&self) -> Option<u64> {
        self.tasks_fetch.as_ref().map(CancelHandle::id)
    }

    fn owns_fetch(&self, fetch_id: u64) -> bool {
        self.pending_fetch() == Some(fetch_id)
    }

    fn label_filter(&self) -> Option<String> {
        (!self.active_label.is_empty()).then(|| self.active_label.clone())
    }

    fn forget_task(&mut self, task_id: &str) {
        self.tasks.retain(|t| t.id != task_id);
        if self.modifying_task.as_ref().is_some_and(|t| t.id == task_id) {
            self.modifying_task = None;
        }
    }
}

impl<S> Clone for StoreState<S> {
    fn clone(&self) -> Self {
        Self {
            tasks: self.tasks.clone(),
            lists: self.lists.clone(),
            labels: self.labels.clone(),
            sources: self.sources.clone(),
            active_source: self.active_source,
            active_list: self.active_list.clone(),
            active_label: self.active_label.clone(),
            focusing_task: self.focusing_task.clone(),
            modifying_task: self.modifying_task.clone(),
            source_instance: Arc::clone(&self.source_instance),
            is_loading_tasks: self.is_loading_tasks,
            is_loading_lists: self.is_loading_lists,
            is_loading_labels: self.is_loading_labels,
            is_loading_sources: self.is_loading_sources,
            source_epoch: self.source_epoch,
            tasks_fetch: self.tasks_fetch.clone(),
        }
    }
}

type State<F> = StoreState<<F as SourceFactory>::Source>;

struct Inner<F: SourceFactory> {
    factory: F,
    session: Arc<dyn SessionProvider>,
    reporter: Arc<dyn ErrorReporter>,
    state: watch::Sender<State<F>>,
    next_fetch_id: AtomicU64,
}

/// Single state container for the active source, its scope and its tasks.
///
/// Actions are the only mutation path. Each one catches its own failure,
/// reports a short message through the [`ErrorReporter`] and leaves the state
/// as it was. Clones share the same state, so actions can be spawned.
pub struct TaskStore<F: SourceFactory> {
    inner: Arc<Inner<F>>,
}

impl<F: SourceFactory> Clone for TaskStore<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: SourceFactory> TaskStore<F> {
    /// Build a store with the native adapter live.
    pub fn new(
        factory: F,
        session: Arc<dyn SessionProvider>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self> {
        let native = factory.create(Source::Native)?;
        let (state, _) = watch::channel(StoreState::new(native));
        Ok(Self {
            inner: Arc::new(Inner {
                factory,
                session,
                reporter,
                state,
                next_fetch_id: AtomicU64::new(0),
            }),
        })
    }

    // -----------------------------------------------------------------------
    // Selectors
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> State<F> {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified after every committed mutation.
    pub fn subscribe(&self) -> watch::Receiver<State<F>> {
        self.inner.state.subscribe()
    }

    fn read<R>(&self, f: impl FnOnce(&State<F>) -> R) -> R {
        f(&*self.inner.state.borrow())
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.read(|s| s.tasks.clone())
    }

    /// Tasks under the active label filter.
    pub fn visible_tasks(&self) -> Vec<Task> {
        self.read(|s| view::visible_tasks(&s.tasks, &s.active_label, s.active_source))
    }

    pub fn lists(&self) -> Vec<List> {
        self.read(|s| s.lists.clone())
    }

    pub fn labels(&self) -> Vec<String> {
        self.read(|s| s.labels.clone())
    }

    pub fn sources(&self) -> Vec<Source> {
        self.read(|s| s.sources.clone())
    }

    pub fn active_source(&self) -> Source {
        self.read(|s| s.active_source)
    }

    pub fn active_list(&self) -> Option<String> {
        self.read(|s| s.active_list.clone())
    }

    pub fn active_label(&self) -> String {
        self.read(|s| s.active_label.clone())
    }

    pub fn focusing_task(&self) -> Option<Task> {
        self.read(|s| s.focusing_task.clone())
    }

    pub fn modifying_task(&self) -> Option<Task> {
        self.read(|s| s.modifying_task.clone())
    }

    pub fn supports_labels(&self) -> bool {
        self.read(|s| s.source_instance.supports_labels())
    }

    // -----------------------------------------------------------------------
    // Task mutations
    // -----------------------------------------------------------------------

    /// Create a task in the active list and label. Appended only after the
    /// provider confirms it.
    pub async fn add_task(&self, name: &str) {
        let (source, options, epoch) = self.read(|s| {
            let options = NewTaskOptions {
                list_id: s.active_list.clone(),
                label: s.label_filter(),
            };
            (Arc::clone(&s.source_instance), options, s.source_epoch)
        });

        match source.add_task(name, options).await {
            Ok(task) => {
                debug!(task_id = %task.id, "task added");
                self.commit(epoch, |s| s.tasks.push(task));
            }
            Err(e) => self.fail("Failed to add task", &e),
        }
    }

    /// Rename `task` at the provider, then replace the loaded copy by id.
    pub async fn set_task(&self, task: Task) {
        let (source, list_id, epoch) = self.scope();

        match source
            .edit_task(&task.id, &task.name, list_id.as_deref())
            .await
        {
            Ok(()) => {
                self.commit(epoch, |s| {
                    for slot in s.tasks.iter_mut().filter(|t| t.id == task.id) {
                        *slot = task.clone();
                    }
                    if s.modifying_task.as_ref().is_some_and(|t| t.id == task.id) {
                        s.modifying_task = Some(task);
                    }
                });
            }
            Err(e) => self.fail("Failed to edit task", &e),
        }
    }

    pub async fn delete_task(&self, task: &Task) {
        self.unfocus_if(&task.id);
        let (source, list_id, epoch) = self.scope();

        match source.delete_task(&task.id, list_id.as_deref()).await {
            Ok(()) => {
                self.commit(epoch, |s| s.forget_task(&task.id));
            }
            Err(e) => self.fail("Failed to delete task", &e),
        }
    }

    pub async fn complete_task(&self, task: &Task) {
        self.unfocus_if(&task.id);
        let (source, list_id, epoch) = self.scope();

        match source.complete_task(&task.id, list_id.as_deref()).await {
            Ok(()) => {
                self.commit(epoch, |s| s.forget_task(&task.id));
            }
            Err(e) => self.fail("Failed to complete task", &e),
        }
    }

    /// Reopen a completed task and put it back at the front.
    ///
    /// The restored task is rebuilt from `task`, not refetched, so fields the
    /// provider would fill differently are not recovered.
    pub async fn undo_complete_task(&self, task: &Task, list_id: Option<&str>) {
        let (source, epoch) = self.read(|s| (Arc::clone(&s.source_instance), s.source_epoch));

        match source.undo_complete_task(&task.id, list_id).await {
            Ok(()) => {
                let restored = Task {
                    completed: false,
                    ..task.clone()
                };
                self.commit(epoch, |s| {
                    s.tasks.retain(|t| t.id != restored.id);
                    s.tasks.insert(0, restored);
                });
            }
            Err(e) => self.fail("Failed to undo complete task", &e),
        }
    }

    // -----------------------------------------------------------------------
    // Fetches
    // -----------------------------------------------------------------------

    /// Load the authorized sources. No session means native only.
    pub async fn fetch_sources(&self) {
        self.update(|s| s.is_loading_sources = true);

        let session = Arc::clone(&self.inner.session);
        let result = run_blocking(move || match session.session()? {
            None => Ok(vec![Source::Native]),
            Some(_) => Ok(session.integrations()?.available_sources()),
        })
        .await;

        match result {
            Ok(sources) => {
                debug!(count = sources.len(), "fetched sources");
                self.update(|s| {
                    s.sources = sources;
                    s.is_loading_sources = false;
                });
            }
            Err(e) => {
                self.update(|s| s.is_loading_sources = false);
                self.fail("Failed to fetch sources", &e);
            }
        }
    }

    /// Load lists and make sure one of them is active when any exist.
    pub async fn fetch_lists(&self) {
        let (source, epoch) = self.read(|s| (Arc::clone(&s.source_instance), s.source_epoch));
        self.update(|s| s.is_loading_lists = true);

        match source.fetch_lists().await {
            Ok(lists) => {
                debug!(count = lists.len(), "fetched lists");
                self.commit(epoch, |s| {
                    let active_known = s
                        .active_list
                        .as_ref()
                        .is_some_and(|id| lists.iter().any(|l| &l.id == id));
                    if !active_known {
                        s.active_list = lists.first().map(|l| l.id.clone());
                    }
                    s.lists = lists;
                    s.is_loading_lists = false;
                });
            }
            Err(e) => {
                if self.commit(epoch, |s| s.is_loading_lists = false) {
                    self.fail("Failed to fetch lists", &e);
                }
            }
        }
    }

    pub async fn fetch_labels(&self) {
        let (source, epoch) = self.read(|s| (Arc::clone(&s.source_instance), s.source_epoch));
        self.update(|s| s.is_loading_labels = true);

        match source.fetch_labels().await {
            Ok(labels) => {
                debug!(count = labels.len(), "fetched labels");
                self.commit(epoch, |s| {
                    s.labels = labels;
                    s.is_loading_labels = false;
                });
            }
            Err(e) => {
                if self.commit(epoch, |s| s.is_loading_labels = false) {
                    self.fail("Failed to fetch labels", &e);
                }
            }
        }
    }

    /// Refresh tasks for the active list.
    ///
    /// Cancels the previous outstanding fetch first. A result commits only
    /// while its fetch is still the outstanding one, so the last request wins
    /// even when an adapter ignores its token.
    pub async fn fetch_tasks(&self) {
        let fetch_id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = CancelHandle::new(fetch_id);
        let token = handle.token();

        let mut scope = None;
        self.inner.state.send_modify(|s| {
            if let Some(previous) = s.tasks_fetch.replace(handle) {
                previous.cancel();
            }
            s.focusing_task = None;
            s.is_loading_tasks = true;
            scope = Some((Arc::clone(&s.source_instance), s.active_list.clone()));
        });
        let Some((source, list_id)) = scope else {
            return;
        };

        match source.fetch_tasks(list_id.as_deref(), Some(token)).await {
            Ok(tasks) => {
                let count = tasks.len();
                let committed = self.inner.state.send_if_modified(|s| {
                    if !s.owns_fetch(fetch_id) {
                        return false;
                    }
                    s.tasks = tasks;
                    s.is_loading_tasks = false;
                    s.tasks_fetch = None;
                    true
                });
                if committed {
                    debug!(fetch_id, count, "fetched tasks");
                } else {
                    debug!(fetch_id, "discarded superseded task fetch");
                }
            }
            Err(Error::Cancelled) => debug!(fetch_id, "task fetch cancelled"),
            Err(e) => {
                let current = self.inner.state.send_if_modified(|s| {
                    if !s.owns_fetch(fetch_id) {
                        return false;
                    }
                    s.is_loading_tasks = false;
                    s.tasks_fetch = None;
                    true
                });
                if current {
                    self.fail("Failed to fetch tasks", &e);
                } else {
                    debug!(fetch_id, error = %e, "superseded task fetch failed");
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Scope changes
    // -----------------------------------------------------------------------

    /// Switch providers and reload lists, tasks and labels for the new one.
    ///
    /// Scope from the previous source is dropped immediately. Labels load in
    /// the background so they never hold up the task list.
    pub async fn on_source_change(&self, source: Source) {
        let instance = match self.inner.factory.create(source) {
            Ok(instance) => instance,
            Err(e) => {
                self.fail("Failed to change source", &e);
                return;
            }
        };
        let seed = instance.virtual_list();

        self.update(|s| {
            if let Some(previous) = s.tasks_fetch.take() {
                previous.cancel();
            }
            s.is_loading_lists = true;
            s.is_loading_tasks = true;
            s.is_loading_labels = true;
            s.source_instance = Arc::new(instance);
            s.active_source = source;
            s.active_label.clear();
            s.tasks.clear();
            s.labels.clear();
            s.focusing_task = None;
            s.modifying_task = None;
            s.source_epoch += 1;
            match seed {
                Some(list) => {
                    s.active_list = Some(list.id.clone());
                    s.lists = vec![list];
                }
                None => {
                    s.active_list = None;
                    s.lists.clear();
                }
            }
        });
        info!(%source, "switched task source");

        self.fetch_lists().await;
        self.fetch_tasks().await;

        let store = self.clone();
        tokio::spawn(async move {
            store.fetch_labels().await;
        });
    }

    pub async fn on_list_change(&self, list_id: &str) {
        self.update(|s| s.active_list = Some(list_id.to_string()));
        self.fetch_tasks().await;
    }

    /// Change the label filter. Visibility is derived, nothing is fetched.
    pub fn on_label_change(&self, label: &str) {
        self.update(|s| s.active_label = label.to_string());
    }

    pub fn focus_task(&self, task: Task) {
        self.update(|s| s.focusing_task = Some(task));
    }

    pub fn unfocus_task(&self) {
        self.update(|s| s.focusing_task = None);
    }

    pub fn modify_task(&self, task: Task) {
        self.update(|s| s.modifying_task = Some(task));
    }

    pub fn unmodify_task(&self) {
        self.update(|s| s.modifying_task = None);
    }

    /// React to the authorization callback: report a failure, or reload the
    /// source list so the new provider shows up.
    pub async fn handle_authorization(&self, outcome: &AuthorizationOutcome) {
        match outcome {
            AuthorizationOutcome::Failed(message) => {
                warn!(%message, "provider authorization failed");
                self.inner.reporter.report(message);
            }
            AuthorizationOutcome::Connected(message) => {
                info!(%message, "provider authorized");
                self.fetch_sources().await;
            }
        }
    }

    /// Parse the authorization redirect, check its `state` and react to the
    /// outcome. A forged or missing state is reported and nothing reloads.
    pub async fn handle_redirect(&self, query: &str, expected_state: Option<&str>) {
        match AuthorizationOutcome::from_redirect(query, expected_state) {
            Ok(Some(outcome)) => self.handle_authorization(&outcome).await,
            Ok(None) => debug!("redirect carried no authorization outcome"),
            Err(e) => self.fail("Failed to verify authorization", &e),
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn scope(&self) -> (Arc<F::Source>, Option<String>, u64) {
        self.read(|s| {
            (
                Arc::clone(&s.source_instance),
                s.active_list.clone(),
                s.source_epoch,
            )
        })
    }

    fn update(&self, f: impl FnOnce(&mut State<F>)) {
        self.inner.state.send_modify(f);
    }

    /// Apply `f` only if no source switch happened since `epoch` was read.
    fn commit(&self, epoch: u64, f: impl FnOnce(&mut State<F>)) -> bool {
        let applied = self.inner.state.send_if_modified(|s| {
            if s.source_epoch != epoch {
                return false;
            }
            f(s);
            true
        });
        if !applied {
            debug!(epoch, "discarded result from replaced source");
        }
        applied
    }

    fn unfocus_if(&self, task_id: &str) {
        self.inner.state.send_if_modified(|s| {
            if s.focusing_task.as_ref().is_some_and(|t| t.id == task_id) {
                s.focusing_task = None;
                true
            } else {
                false
            }
        });
    }

    fn fail(&self, message: &str, error: &Error) {
        warn!(error = %error, "{message}");
        self.inner.reporter.report(message);
    }
}
