use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cardtable")]
#[command(about = "Browse Basecamp card tables and turn cards into PRD epics")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Environment file loaded before reading settings
    #[arg(long, global = true, default_value = ".env")]
    pub env_file: PathBuf,

    /// OAuth authorization code to exchange for an access token
    #[arg(long, global = true)]
    pub code: Option<String>,

    /// Card table ID (skips dock discovery)
    #[arg(long, global = true)]
    pub card_table_id: Option<i64>,

    /// Card table URL (skips dock discovery)
    #[arg(long, global = true)]
    pub card_table_url: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Browse card tables interactively (default)
    Browse,

    /// Print every column and its cards
    List,

    /// Print the OAuth authorization URL
    AuthUrl,
}
