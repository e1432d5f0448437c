use clap::{Parser, Subcommand};

/// tasksync: manage tasks from any connected provider
#[derive(Parser, Debug, Clone)]
#[command(name = "tasksync", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,

    /// Task source to use (native, todoist, ticktick, google-tasks, microsoft-todo)
    #[arg(long, global = true)]
    pub source: Option<String>,

    /// List to scope tasks to (default: the provider's first list)
    #[arg(long, global = true)]
    pub list: Option<String>,

    /// Label to filter visible tasks
    #[arg(long, global = true)]
    pub label: Option<String>,

    /// Backend base URL
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Path to config file
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Show the sources available to the signed-in user
    Sources,

    /// Show the lists of the active source
    Lists,

    /// Show the labels of the active source
    Labels,

    /// Show open tasks in the active list
    Tasks,

    /// Create a task in the active list
    Add {
        /// Task name (markdown allowed)
        name: String,
    },

    /// Rename a task
    Edit {
        /// Task id
        id: String,
        /// New task name
        name: String,
    },

    /// Mark a task done
    Complete {
        /// Task id
        id: String,
    },

    /// Reopen a completed task
    Undo {
        /// Task id
        id: String,
        /// Task name to restore
        name: String,
    },

    /// Permanently delete a task
    Delete {
        /// Task id
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tasks() {
        let cli = Cli::parse_from(["tasksync", "tasks"]);
        assert_eq!(cli.command, CliCommand::Tasks);
        assert!(cli.source.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_add_with_scope() {
        let cli = Cli::parse_from([
            "tasksync",
            "--source",
            "todoist",
            "add",
            "Buy milk",
            "--list",
            "today",
            "--label",
            "errands",
        ]);
        assert_eq!(
            cli.command,
            CliCommand::Add {
                name: "Buy milk".to_string()
            }
        );
        assert_eq!(cli.source.as_deref(), Some("todoist"));
        assert_eq!(cli.list.as_deref(), Some("today"));
        assert_eq!(cli.label.as_deref(), Some("errands"));
    }

    #[test]
    fn test_parse_edit_and_undo() {
        let cli = Cli::parse_from(["tasksync", "edit", "42", "Call mom"]);
        assert_eq!(
            cli.command,
            CliCommand::Edit {
                id: "42".to_string(),
                name: "Call mom".to_string()
            }
        );

        let cli = Cli::parse_from(["tasksync", "undo", "42", "Call mom"]);
        assert!(matches!(cli.command, CliCommand::Undo { ref id, .. } if id == "42"));
    }

    #[test]
    fn test_global_args_after_subcommand() {
        let cli = Cli::parse_from([
            "tasksync",
            "complete",
            "7",
            "--config",
            "/tmp/tasksync.toml",
            "--api-url",
            "http://localhost:54321",
        ]);
        assert_eq!(cli.command, CliCommand::Complete { id: "7".to_string() });
        assert_eq!(cli.config.as_deref(), Some("/tmp/tasksync.toml"));
        assert_eq!(cli.api_url.as_deref(), Some("http://localhost:54321"));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["tasksync"]).is_err());
    }
}
