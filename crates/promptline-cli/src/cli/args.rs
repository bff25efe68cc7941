use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "promptline",
    version,
    about = "Versioned prompt registry with activation and A/B rollout"
)]
pub struct Cli {
    /// SQLite database path (overrides config and PROMPTLINE_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// YAML settings file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Reject unknown keys in the settings file
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Log filter, e.g. `info` or `promptline_core=debug`
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new prompt version in a scope
    Create(CreateArgs),
    /// List every version of a scope, oldest first
    List(ScopeArgs),
    /// Show one version
    Show(IdArgs),
    /// Show a version and its ancestors, newest first
    Lineage(IdArgs),
    /// Make a version the sole active one of its scope
    Activate(IdArgs),
    /// Resolve which version serves the next task
    Resolve(ResolveArgs),
    /// A/B test lifecycle
    Ab(AbArgs),
    /// Task outcome log
    Outcome(OutcomeArgs),
    /// Store statistics
    Status,
    /// Print the CLI version
    Version,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ScopeArgs {
    #[arg(long)]
    pub role: String,

    /// Omit for the role-wide scope
    #[arg(long)]
    pub model: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct IdArgs {
    pub id: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CreateArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Prompt text
    #[arg(long, conflicts_with = "content_file")]
    pub content: Option<String>,

    /// Read prompt text from a file
    #[arg(long)]
    pub content_file: Option<PathBuf>,

    #[arg(long)]
    pub parent: Option<String>,

    #[arg(long)]
    pub summary: Option<String>,

    /// Defaults to the configured author
    #[arg(long)]
    pub author: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Routing sample in 0..100; drawn uniformly when omitted
    #[arg(long)]
    pub sample: Option<u8>,
}

#[derive(Parser, Clone)]
pub struct AbArgs {
    #[command(subcommand)]
    pub cmd: AbSub,
}

#[derive(Subcommand, Clone)]
pub enum AbSub {
    /// Start a test with the current active version as control
    Start(AbStartArgs),
    /// Report the running test and per-leg metrics
    Status(ScopeArgs),
    /// End the running test
    Conclude(AbConcludeArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct AbStartArgs {
    /// Challenger version id
    pub challenger: String,

    /// Percent of traffic routed to the challenger
    #[arg(long)]
    pub split: Option<u8>,

    #[arg(long)]
    pub min_tasks: Option<u32>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionArg {
    Promote,
    Rollback,
}

#[derive(clap::Args, Debug, Clone)]
pub struct AbConcludeArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    #[arg(long, value_enum)]
    pub decision: DecisionArg,
}

#[derive(Parser, Clone)]
pub struct OutcomeArgs {
    #[command(subcommand)]
    pub cmd: OutcomeSub,
}

#[derive(Subcommand, Clone)]
pub enum OutcomeSub {
    /// Append one task outcome for a version
    Record(OutcomeRecordArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeResultArg {
    Success,
    Failure,
    Partial,
    Abandoned,
}

#[derive(clap::Args, Debug, Clone)]
pub struct OutcomeRecordArgs {
    pub version_id: String,

    #[arg(long, value_enum)]
    pub result: OutcomeResultArg,

    #[arg(long)]
    pub confidence: f64,

    #[arg(long)]
    pub duration_ms: Option<u64>,

    #[arg(long)]
    pub tokens: Option<u64>,
}
