//! Find subcommand - fetch one row by primary key.

use clap::Parser;
use color_eyre::Result;
use serde_json::Value as JsonValue;

use crate::repositories::RepositoryFactory;

use super::{parse_value, print_row, TableArgs};

/// Print the row with the given primary key.
#[derive(Parser)]
pub struct FindCommand {
    #[command(flatten)]
    pub table: TableArgs,

    /// Key value(s), one per key column
    #[arg(required = true)]
    pub ids: Vec<String>,
}

impl FindCommand {
    pub async fn run(self, factory: &RepositoryFactory) -> Result<()> {
        let repository = self.table.repository(factory);

        let mut values: Vec<JsonValue> = self.ids.iter().map(|id| parse_value(id)).collect();
        let id = if values.len() == 1 {
            values.remove(0)
        } else {
            JsonValue::Array(values)
        };

        let row = repository.find_one(id).await?;
        print_row(&row)
    }
}
