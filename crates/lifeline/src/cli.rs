//! Command-line arguments.

use clap::Parser;
use std::path::PathBuf;

/// Lifeline - emergency control of a single host from a chat
#[derive(Parser, Debug)]
#[command(name = "lifeline")]
#[command(about = "Emergency chat-ops bot with allowlisting, confirmation and audit", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to ./lifeline.toml when present)
    #[arg(short, long, env = "LIFELINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Principal the console speaks as (defaults to the first allowed principal)
    #[arg(short, long)]
    pub principal: Option<i64>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,
}
