//! Command-line surface (clap derive). Parsing only; `main` does the wiring.

use crate::domain::{DomainError, ModeSelector, Target, TriggerInput};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "feedpilot")]
#[command(version, about = "Scheduled AI-assisted posting agent", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one action (subject to the timing gate unless --force)
    Run(RunArgs),
    /// Print the persisted run state as JSON
    Status,
    /// Start the HTTP trigger server
    Serve {
        /// Port to listen on (overrides FEEDPILOT_SERVER_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Validate configuration and report missing credentials
    Check {
        /// Check for a dry run (no platform token needed)
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// auto, reply, quote, thread, standalone or media
    #[arg(default_value = "auto")]
    pub mode: String,

    /// Account handle to read from (with or without @)
    #[arg(short, long, conflicts_with = "query")]
    pub target: Option<String>,

    /// Search query to read from instead of a handle
    #[arg(short, long)]
    pub query: Option<String>,

    /// Topic for thread/standalone posts
    #[arg(long)]
    pub topic: Option<String>,

    /// Posts to fetch
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Posts to reply to or quote
    #[arg(short, long)]
    pub count: Option<usize>,

    /// Bypass the minimum interval and daily cap
    #[arg(short, long)]
    pub force: bool,

    /// Log what would be published; nothing is posted or persisted
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub fn to_input(&self) -> Result<TriggerInput, DomainError> {
        let selector: ModeSelector = self.mode.parse()?;
        let target = match (&self.target, &self.query) {
            (Some(h), _) => Some(Target::handle(h)),
            (None, Some(q)) => Some(Target::query(q)),
            (None, None) => None,
        };
        let input = TriggerInput {
            selector,
            target,
            topic: self.topic.clone(),
            limit: self.limit,
            count: self.count,
        };
        input.precheck()?;
        Ok(input)
    }
}
