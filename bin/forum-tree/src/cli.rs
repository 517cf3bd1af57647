//! Command line surface.

use clap::{Args, Parser, Subcommand};
use ft_core::Author;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "forum-tree", version, about = "Maintain a threaded discussion tree")]
pub struct Cli {
    /// Extra configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Overrides `database_url` from the configuration.
    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Top-level sections.
    #[command(subcommand)]
    Section(SectionCommand),
    /// Threads inside a section.
    #[command(subcommand)]
    Thread(ThreadCommand),
    /// Replies below a thread.
    #[command(subcommand)]
    Reply(ReplyCommand),
    /// Any post and every live post below it, oldest first.
    Tree {
        id: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Print one post, deleted or not, as JSON.
    Post { id: String },
    /// Fill the store with random sections, threads and replies.
    Populate(PopulateArgs),
}

/// Identity of whoever performs the action.
#[derive(Debug, Args)]
pub struct Who {
    #[arg(long)]
    pub uid: String,
    #[arg(long)]
    pub display: Option<String>,
}

impl Who {
    pub fn author(&self) -> Author {
        Author {
            id: self.uid.clone(),
            name: self.display.clone(),
        }
    }
}

#[derive(Debug, Args)]
pub struct PageArgs {
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
    /// Continuation token printed by a previous listing.
    #[arg(long)]
    pub cursor: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum SectionCommand {
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, allow_negative_numbers = true)]
        index: i64,
        #[command(flatten)]
        who: Who,
    },
    List,
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Delete {
        #[arg(long)]
        id: String,
        #[arg(long)]
        reason: String,
        #[command(flatten)]
        who: Who,
    },
}

#[derive(Debug, Subcommand)]
pub enum ThreadCommand {
    Create {
        #[arg(long)]
        section: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        body: String,
        #[command(flatten)]
        who: Who,
    },
    List {
        #[arg(long)]
        section: String,
        #[command(flatten)]
        page: PageArgs,
    },
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        body: Option<String>,
    },
    Delete {
        #[arg(long)]
        id: String,
        #[arg(long)]
        reason: String,
        #[command(flatten)]
        who: Who,
    },
}

#[derive(Debug, Subcommand)]
pub enum ReplyCommand {
    Create {
        /// Path of the post being replied to, ids joined by `/`.
        #[arg(long)]
        path: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        body: String,
        #[command(flatten)]
        who: Who,
    },
    /// The thread and every reply below it.
    List {
        #[arg(long)]
        thread: String,
        /// Flat listing instead of the tree query.
        #[arg(long)]
        flat: bool,
        #[command(flatten)]
        page: PageArgs,
    },
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        body: String,
    },
    Delete {
        #[arg(long)]
        id: String,
        #[arg(long)]
        reason: String,
        #[command(flatten)]
        who: Who,
    },
    /// Stage a reply without publishing it.
    Draft {
        #[arg(long)]
        path: String,
        #[arg(long)]
        body: String,
        #[command(flatten)]
        who: Who,
    },
    /// Publish a staged reply.
    Install {
        #[arg(long)]
        uid: String,
        #[arg(long)]
        draft: String,
    },
}

#[derive(Debug, Args)]
pub struct PopulateArgs {
    #[arg(long, default_value_t = 20)]
    pub threads: usize,
    #[arg(long, default_value_t = 100)]
    pub replies: usize,
}

/// Splits a `/`-joined path into ids.
pub fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
