//! CLI module for Tablemap.
//!
//! Subcommands:
//! - `find`: Fetch one row by primary key
//! - `list`: Fetch rows matching criteria
//! - `count`: Count rows matching criteria

mod count;
mod find;
mod list;

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::Result;
use serde_json::Value as JsonValue;

use crate::config::Config;
use crate::context::Context;
use crate::di::FromRef;
use crate::repositories::{Criteria, Repository, RepositoryFactory};
use crate::store::backends::postgres::PostgresClient;
use crate::store::Row;

pub use count::CountCommand;
pub use find::FindCommand;
pub use list::ListCommand;

/// Tablemap - table-backed repositories
#[derive(Parser)]
#[command(name = "tablemap")]
#[command(about = "Query PostgreSQL tables through tablemap repositories")]
#[command(version)]
pub struct App {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the row with the given primary key
    Find(FindCommand),

    /// Print rows matching optional criteria
    List(ListCommand),

    /// Print the number of rows matching optional criteria
    Count(CountCommand),
}

impl App {
    /// Run the CLI application.
    pub async fn run(self) -> Result<()> {
        let ctx = connect().await?;
        let factory = RepositoryFactory::from_ref(&ctx);

        match self.command {
            Command::Find(cmd) => cmd.run(&factory).await,
            Command::List(cmd) => cmd.run(&factory).await,
            Command::Count(cmd) => cmd.run(&factory).await,
        }
    }
}

/// Table addressed by a subcommand.
#[derive(Args, Clone)]
pub struct TableArgs {
    /// Table name
    #[arg(long)]
    pub table: String,

    /// Alias used to qualify columns
    #[arg(long)]
    pub alias: Option<String>,

    /// Primary key column(s), comma separated
    #[arg(long, value_delimiter = ',', default_value = "id")]
    pub key: Vec<String>,
}

impl TableArgs {
    /// A row repository over the table.
    fn repository(&self, factory: &RepositoryFactory) -> Repository<Row> {
        let args = self.clone();
        factory.repository::<Row>().define(move |builder| {
            builder
                .set_table_name(args.table.clone(), args.alias.as_deref())?
                .set_database_primary_key(args.key.iter().cloned())?;
            Ok(())
        })
    }
}

async fn connect() -> Result<Context> {
    let config = Config::load()?;

    tracing::info!("Connecting to PostgreSQL");
    let client = PostgresClient::connect(&config.database.uri, config.database.pool_size)
        .await
        .map_err(|e| color_eyre::eyre::eyre!("Failed to connect: {}", e))?;

    Ok(Context {
        store: Arc::new(client),
        config: Arc::new(config),
    })
}

/// Parses a command line value as JSON, falling back to a plain string.
fn parse_value(raw: &str) -> JsonValue {
    serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
}

fn parse_criteria(raw: Option<&str>) -> Result<Criteria> {
    let Some(raw) = raw else {
        return Ok(Criteria::None);
    };
    let value: JsonValue = serde_json::from_str(raw)
        .map_err(|e| color_eyre::eyre::eyre!("Invalid criteria JSON: {}", e))?;
    Ok(Criteria::from_json(value)?)
}

fn print_row(row: &Row) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(row.values())?);
    Ok(())
}
