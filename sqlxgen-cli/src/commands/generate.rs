use std::{error::Error, path::PathBuf};

use clap::Parser;
use sqlxgen_core::model::QuerySource;
use tracing::{info, warn};

use super::{QueryFile, introspect, load_config};
use crate::{
    codegen::{CodeGen, json::JsonCodeGen, rust::RustCodeGen},
    config::{CodeGenerator, SqlxGenConfig},
    discover,
    emit::{Emit, FileEmitter, StdoutEmitter},
    utils::init_logging,
};

#[derive(Parser, Debug, Clone)]
#[must_use]
pub struct Generate {
    /// Configuration file, `sqlxgen.toml` by default.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    debug: bool,
}

fn query_files(config: &SqlxGenConfig) -> Result<Vec<QueryFile>, Box<dyn Error>> {
    let mut files = vec![];
    for path in discover::query_files(&config.query_paths, &config.queries)? {
        let Some(stem) = path.file_stem() else {
            warn!("Skipping {path:?} as the filename is not valid.");
            continue;
        };
        let name = stem.to_string_lossy().to_string();
        let sql = std::fs::read_to_string(&path).map_err(|error| {
            format!("encountered '{error}' attempting to read {}", path.display())
        })?;
        files.push(QueryFile {
            name,
            source: QuerySource {
                file_name: path.display().to_string(),
                sql,
            },
        });
    }
    Ok(files)
}

impl Generate {
    pub fn run(self) -> Result<(), Box<dyn Error>> {
        init_logging(self.debug)?;
        let config = load_config(self.config)?;
        let files = query_files(&config)?;
        info!("found {} query files", files.len());

        let mut codegen: Box<dyn CodeGen> = match config.mode {
            CodeGenerator::Json => Box::new(JsonCodeGen::new(config.engine)),
            CodeGenerator::Rust => Box::new(RustCodeGen::new(config.engine, &config.banner)),
        };

        let introspection = introspect(&config, &files)?;
        for table in &introspection.tables {
            codegen.push_table(table)?;
        }
        for (name, query) in &introspection.queries {
            codegen.push_query(name, query)?;
        }
        let code = codegen.finalize()?;

        match &config.target {
            Some(target) => FileEmitter.emit(target, &code),
            None => StdoutEmitter.emit(&PathBuf::new(), &code),
        }
    }
}
