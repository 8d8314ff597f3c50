//! Count subcommand.

use clap::Parser;
use color_eyre::Result;

use crate::repositories::RepositoryFactory;

use super::{parse_criteria, TableArgs};

/// Print the number of rows matching optional criteria.
#[derive(Parser)]
pub struct CountCommand {
    #[command(flatten)]
    pub table: TableArgs,

    /// JSON object of column/value pairs to match
    #[arg(long)]
    pub criteria: Option<String>,
}

impl CountCommand {
    pub async fn run(self, factory: &RepositoryFactory) -> Result<()> {
        let repository = self.table.repository(factory);
        let criteria = parse_criteria(self.criteria.as_deref())?;

        let count = repository.query(criteria)?.count().await?;
        println!("{}", count);
        Ok(())
    }
}
