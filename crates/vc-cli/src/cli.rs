use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use vc_types::{OptionId, PollId, UserId};

#[derive(Parser)]
#[command(
    name = "votechain",
    about = "Votechain: polls backed by a tamper-evident vote ledger",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML config file; defaults apply when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// State file, overriding `[storage] state_path`
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Register or list users
    User(UserArgs),
    /// Create, list, show, or close polls
    Poll(PollArgs),
    /// Cast a vote
    Cast(CastArgs),
    /// Show a poll's vote history, oldest first
    History(PollRef),
    /// Verify ledger integrity
    Verify,
    /// Rebuild cached tallies from the ledger
    Reconcile(ReconcileArgs),
    /// Show insights for a poll
    Insights(PollRef),
}

#[derive(Args)]
pub struct UserArgs {
    #[command(subcommand)]
    pub action: UserAction,
}

#[derive(Subcommand)]
pub enum UserAction {
    Add { name: String },
    List,
}

#[derive(Args)]
pub struct PollArgs {
    #[command(subcommand)]
    pub action: PollAction,
}

#[derive(Subcommand)]
pub enum PollAction {
    Create(CreateArgs),
    List {
        /// Only polls accepting votes now
        #[arg(long)]
        active: bool,
    },
    Show(PollRef),
    Close(PollRef),
}

#[derive(Args)]
pub struct CreateArgs {
    #[arg(long)]
    pub creator: UserId,
    #[arg(long)]
    pub title: String,
    #[arg(long, default_value = "")]
    pub description: String,
    /// Option text; repeat for each option
    #[arg(short, long = "option", required = true)]
    pub options: Vec<String>,
    /// RFC 3339 start time; defaults to now
    #[arg(long)]
    pub starts: Option<DateTime<Utc>>,
    /// RFC 3339 end time; defaults to `--hours` after the start
    #[arg(long)]
    pub ends: Option<DateTime<Utc>>,
    #[arg(long, default_value = "24")]
    pub hours: i64,
    /// Ask the insight provider to rewrite the description. The built-in
    /// provider has no rewriting backend, so the description is kept as given
    #[arg(long)]
    pub enhance: bool,
}

#[derive(Args)]
pub struct PollRef {
    pub poll: PollId,
}

#[derive(Args)]
pub struct CastArgs {
    #[arg(long)]
    pub user: UserId,
    #[arg(long)]
    pub poll: PollId,
    #[arg(long)]
    pub option: OptionId,
}

#[derive(Args)]
pub struct ReconcileArgs {
    /// Reconcile one poll instead of all of them
    pub poll: Option<PollId>,
}
