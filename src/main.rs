use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use tasksync::cli::{Cli, CliCommand};
use tasksync::client::{ApiClient, DefaultApiClient};
use tasksync::config::Config;
use tasksync::markdown::plain_text;
use tasksync::registry::DefaultSourceFactory;
use tasksync::report::{ErrorReporter, LogReporter};
use tasksync::session::HttpSessionProvider;
use tasksync::sources::Task;
use tasksync::store::TaskStore;

const LABELS_WAIT: Duration = Duration::from_secs(60);

fn init_logging() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    let config = match Config::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    debug!(?config, "config loaded");

    let token = config.access_token();
    let client: Arc<dyn ApiClient> = Arc::new(DefaultApiClient::new(
        &config.api_url,
        token.clone(),
        config.timeout(),
    ));
    let session = Arc::new(HttpSessionProvider::new(Arc::clone(&client), token));

    let failed = Arc::new(AtomicBool::new(false));
    let reporter: Arc<dyn ErrorReporter> = {
        let failed = Arc::clone(&failed);
        Arc::new(move |message: &str| {
            LogReporter.report(message);
            failed.store(true, Ordering::SeqCst);
        })
    };

    let store = match TaskStore::new(DefaultSourceFactory::new(client), session, reporter) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    run(&store, &config, cli.command, &failed).await;

    if failed.load(Ordering::SeqCst) {
        std::process::exit(1);
    }
}

async fn run(
    store: &TaskStore<DefaultSourceFactory>,
    config: &Config,
    command: CliCommand,
    failed: &AtomicBool,
) {
    let succeeded = || !failed.load(Ordering::SeqCst);

    if command == CliCommand::Sources {
        store.fetch_sources().await;
        let active = store.active_source();
        for source in store.sources() {
            let marker = if source == active { "*" } else { " " };
            println!("{marker} {:<15} {}", source.key(), source.label());
        }
        return;
    }

    info!(source = %config.source, "loading source");
    store.on_source_change(config.source).await;
    if let Some(ref list) = config.list
        && store.active_list().as_deref() != Some(list.as_str())
    {
        store.on_list_change(list).await;
    }
    if let Some(ref label) = config.label {
        store.on_label_change(label);
    }

    match command {
        CliCommand::Sources => {}
        CliCommand::Lists => {
            let active = store.active_list();
            for list in store.lists() {
                let marker = if Some(&list.id) == active.as_ref() { "*" } else { " " };
                println!("{marker} {}\t{}", list.id, list.name);
            }
        }
        CliCommand::Labels => {
            let mut rx = store.subscribe();
            let settled = tokio::time::timeout(LABELS_WAIT, rx.wait_for(|s| !s.is_loading_labels))
                .await
                .is_ok_and(|r| r.is_ok());
            if !settled {
                eprintln!("error: timed out waiting for labels");
                std::process::exit(1);
            }
            if !store.supports_labels() {
                println!("{} does not support labels", config.source);
            }
            for label in store.labels() {
                println!("{label}");
            }
        }
        CliCommand::Tasks => print_tasks(&store.visible_tasks()),
        CliCommand::Add { name } => {
            let before = store.tasks().len();
            store.add_task(&name).await;
            if let Some(task) = store.tasks().get(before) {
                println!("Added: {}", describe(task));
            }
        }
        CliCommand::Edit { id, name } => {
            let mut task = find_task(store, &id);
            task.name = name;
            store.set_task(task.clone()).await;
            if succeeded() {
                println!("Renamed {id}: {}", plain_text(&task.name));
            }
        }
        CliCommand::Complete { id } => {
            let task = find_task(store, &id);
            store.complete_task(&task).await;
            if succeeded() {
                println!("Completed: {}", describe(&task));
            }
        }
        CliCommand::Undo { id, name } => {
            let task = Task::new(id, name);
            let list = store.active_list();
            store.undo_complete_task(&task, list.as_deref()).await;
            if succeeded() {
                println!("Reopened: {}", describe(&task));
            }
        }
        CliCommand::Delete { id } => {
            let task = find_task(store, &id);
            store.delete_task(&task).await;
            if succeeded() {
                println!("Deleted {id}");
            }
        }
    }
}

/// Loaded task with `id`, or a bare stand-in when it is not in the current
/// list.
fn find_task(store: &TaskStore<DefaultSourceFactory>, id: &str) -> Task {
    store
        .tasks()
        .into_iter()
        .find(|t| t.id == id)
        .unwrap_or_else(|| Task::new(id, ""))
}

fn describe(task: &Task) -> String {
    let mut line = format!("{}\t{}", task.id, plain_text(&task.name));
    if let Some(due) = task.due {
        line.push_str(&format!(" (due {})", due.format("%Y-%m-%d")));
    }
    if let Some(ref labels) = task.labels {
        line.push_str(&format!(" [{}]", labels.join(", ")));
    }
    line
}

fn print_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No open tasks");
        return;
    }
    for task in tasks {
        println!("{}", describe(task));
    }
}
