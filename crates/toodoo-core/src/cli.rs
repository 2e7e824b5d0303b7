use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "toodoo",
    version,
    about = "Toodoo: personal tasks with categories, subtasks and stats",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a task
    Add(AddArgs),
    /// List tasks through the category/status/search filters
    List(ListArgs),
    /// Show one task with its subtasks
    Show { task: String },
    /// Toggle completion
    Done { task: String },
    /// Change task fields; "none" clears an optional field
    Edit(EditArgs),
    Delete { task: String },
    #[command(subcommand)]
    Category(CategoryCommand),
    #[command(subcommand)]
    Subtask(SubtaskCommand),
    /// Completion rate, weekly trend and category breakdown
    Stats,
    /// Month view of due dates
    Calendar {
        /// YYYY-MM, defaults to the current month
        #[arg(long)]
        month: Option<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    #[arg(required = true, num_args = 1..)]
    pub title: Vec<String>,
    #[arg(short, long)]
    pub description: Option<String>,
    #[arg(long)]
    pub due: Option<String>,
    #[arg(short, long)]
    pub priority: Option<String>,
    #[arg(short, long)]
    pub category: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(short, long)]
    pub category: Option<String>,
    #[arg(short, long)]
    pub status: Option<String>,
    #[arg(long)]
    pub sort: Option<String>,
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    pub task: String,
    #[arg(short, long)]
    pub title: Option<String>,
    #[arg(short, long)]
    pub description: Option<String>,
    #[arg(long)]
    pub due: Option<String>,
    #[arg(short, long)]
    pub priority: Option<String>,
    #[arg(short, long)]
    pub category: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategoryCommand {
    Add {
        name: String,
        #[arg(long)]
        color: Option<String>,
    },
    List,
    Rename {
        category: String,
        name: String,
    },
    Delete {
        category: String,
    },
}

/// Subtasks are addressed by position (as shown by `show`) or by id.
#[derive(Subcommand, Debug, Clone)]
pub enum SubtaskCommand {
    Add {
        task: String,
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
    },
    Toggle {
        task: String,
        subtask: String,
    },
    Rename {
        task: String,
        subtask: String,
        title: Vec<String>,
    },
    Delete {
        task: String,
        subtask: String,
    },
    /// Move a subtask (position or id) to position TO
    Move {
        task: String,
        subtask: String,
        to: usize,
    },
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Command, GlobalCli, SubtaskCommand};

    #[test]
    fn parses_nested_subcommands_and_globals() {
        let cli = GlobalCli::parse_from([
            "toodoo", "subtask", "move", "abc", "0", "2", "-vv", "--rc", "color=off",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.rc_overrides[0].key, "color");
        match cli.command {
            Some(Command::Subtask(SubtaskCommand::Move { task, subtask, to })) => {
                assert_eq!((task.as_str(), subtask.as_str(), to), ("abc", "0", 2));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn add_joins_title_words() {
        let cli = GlobalCli::parse_from(["toodoo", "add", "File", "taxes", "--due", "2025-04-15", "-p", "high"]);
        let Some(Command::Add(args)) = cli.command else {
            panic!("expected add");
        };
        assert_eq!(args.title.join(" "), "File taxes");
        assert_eq!(args.due.as_deref(), Some("2025-04-15"));
        assert_eq!(args.priority.as_deref(), Some("high"));
    }
}
