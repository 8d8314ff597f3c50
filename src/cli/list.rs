//! List subcommand - fetch rows matching criteria.

use clap::Parser;
use color_eyre::Result;

use crate::repositories::RepositoryFactory;

use super::{parse_criteria, print_row, TableArgs};

/// Print rows matching optional criteria.
#[derive(Parser)]
pub struct ListCommand {
    #[command(flatten)]
    pub table: TableArgs,

    /// JSON object of column/value pairs to match
    #[arg(long)]
    pub criteria: Option<String>,

    /// Maximum number of rows (configured default when omitted)
    #[arg(long)]
    pub limit: Option<u64>,
}

impl ListCommand {
    pub async fn run(self, factory: &RepositoryFactory) -> Result<()> {
        let repository = self.table.repository(factory);
        let criteria = parse_criteria(self.criteria.as_deref())?;

        let result = repository.find_some(criteria, self.limit).await?;
        tracing::debug!(count = result.len(), "Fetched rows");

        for row in result {
            print_row(&row?)?;
        }
        Ok(())
    }
}
