use std::{error::Error, path::PathBuf};

use clap::{Parser, ValueEnum};
use sqlxgen_core::Engine;

use crate::{
    config::{CONFIG_FILE, TomlConfig},
    emit::{Emit, FileEmitter},
};

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum EngineArg {
    #[default]
    Postgres,
    Mysql,
}

impl From<EngineArg> for Engine {
    fn from(engine: EngineArg) -> Self {
        match engine {
            EngineArg::Postgres => Engine::Postgres,
            EngineArg::Mysql => Engine::Mysql,
        }
    }
}

/// Writes a default configuration file.
#[derive(Parser, Debug, Clone)]
#[must_use]
pub struct Init {
    #[arg(long, value_enum, default_value_t)]
    engine: EngineArg,
    /// Where to write, `sqlxgen.toml` by default.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Replace an existing file.
    #[arg(long)]
    force: bool,
}

impl Init {
    pub fn run(self) -> Result<(), Box<dyn Error>> {
        let path = self.config.unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
        if path.exists() && !self.force {
            return Err(format!("{} already exists, pass --force to replace it", path.display()).into());
        }
        let template = toml::to_string_pretty(&TomlConfig::template(self.engine.into()))?;
        FileEmitter.emit(&path, &template)?;
        println!("wrote {}", path.display());
        Ok(())
    }
}
