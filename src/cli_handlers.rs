use crate::auth;
use crate::backlog::BacklogStore;
use crate::board::{BasecampClient, BoardApi, resolve_card_table};
use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::navigator::Navigator;
use crate::render;
use crate::summarizer::ClaudeSummarizer;
use std::io::{self, Write};

/// Dispatch a parsed command line
pub fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.env_file)?.with_overrides(cli.card_table_id, cli.card_table_url);

    match cli.command.unwrap_or(Commands::Browse) {
        Commands::AuthUrl => handle_auth_url(&config),
        Commands::List => handle_list(&config, cli.code.as_deref()),
        Commands::Browse => handle_browse(&config, cli.code.as_deref()),
    }
}

/// Handle the auth-url command
pub fn handle_auth_url(config: &Config) -> Result<()> {
    println!("{}", auth::authorize_url(config));
    Ok(())
}

/// Handle the list command
pub fn handle_list(config: &Config, code: Option<&str>) -> Result<()> {
    let client = connect(config, code)?;

    let project = client.fetch_project()?;
    let table = resolve_card_table(&project, config).ok_or(Error::NoCardTableUrl)?;
    let columns = client.list_columns(&table)?;
    if columns.is_empty() {
        return Err(Error::NoColumns);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for column in &columns {
        let items = client.list_items(&table, column)?;
        render::listing_column(&mut out, column, &items)?;
    }
    out.flush()?;

    Ok(())
}

/// Handle the browse command
pub fn handle_browse(config: &Config, code: Option<&str>) -> Result<()> {
    let client = connect(config, code)?;
    let summarizer = ClaudeSummarizer::new(config)?;
    let store = BacklogStore::new(&config.prd_path);

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut navigator = Navigator::new(&client, &summarizer, store, stdin.lock(), stdout.lock());
    navigator.run()
}

// Helper function
fn connect(config: &Config, code: Option<&str>) -> Result<BasecampClient> {
    config.require_board_ids()?;
    let token = auth::bootstrap_access_token(config, code)?;
    BasecampClient::new(config, &token)
}
