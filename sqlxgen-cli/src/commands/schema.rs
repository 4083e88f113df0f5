use std::{error::Error, path::PathBuf};

use clap::Parser;

use super::{introspect, load_config};
use crate::{schema::DbSchema, utils::init_logging};

/// Prints the discovered tables with their translated types.
#[derive(Parser, Debug, Clone)]
#[must_use]
pub struct Schema {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    debug: bool,
}

impl Schema {
    pub fn run(self) -> Result<(), Box<dyn Error>> {
        init_logging(self.debug)?;
        let config = load_config(self.config)?;
        let introspection = introspect(&config, &[])?;
        let db_schema = DbSchema::new(&introspection.tables, config.engine.translator());
        print!("{db_schema}");
        Ok(())
    }
}
