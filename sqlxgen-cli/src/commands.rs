mod generate;
mod init;
mod schema;

use std::{collections::HashSet, error::Error, path::PathBuf};

pub use generate::Generate;
pub use init::Init;
pub use schema::Schema;

use sqlx::{Connection, Database, mysql::MySqlPoolOptions, postgres::PgPoolOptions};
use sqlxgen_core::{
    Engine,
    introspect::{Introspect, mysql::MysqlIntrospect, postgres::PgIntrospect},
    model::{Query, QuerySource, Table},
};
use tracing::{debug, error, info};

use crate::config::{CONFIG_FILE, SqlxGenConfig};

fn load_config(path: Option<PathBuf>) -> Result<SqlxGenConfig, Box<dyn Error>> {
    let path = path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    SqlxGenConfig::load(&path)
}

/// A query file and the name its generated items are derived from.
#[derive(Debug, Clone)]
pub(crate) struct QueryFile {
    pub name: String,
    pub source: QuerySource,
}

#[derive(Debug, Default)]
pub(crate) struct Introspection {
    pub tables: Vec<Table>,
    pub queries: Vec<(String, Query)>,
}

/// Reads the schema and describes every query over a single connection.
///
/// Everything runs in one transaction that is rolled back at the end.
pub(crate) fn introspect(
    config: &SqlxGenConfig,
    files: &[QueryFile],
) -> Result<Introspection, Box<dyn Error>> {
    let url = config.database_url()?;
    let rt = tokio::runtime::Runtime::new()?;
    match config.engine {
        Engine::Postgres => rt.block_on(async {
            let pool = PgPoolOptions::new().max_connections(1).connect(&url).await?;
            let mut conn = pool.acquire().await?;
            run(&PgIntrospect::new(config.models.clone()), &mut *conn, files).await
        }),
        Engine::Mysql => rt.block_on(async {
            let pool = MySqlPoolOptions::new().max_connections(1).connect(&url).await?;
            let mut conn = pool.acquire().await?;
            run(&MysqlIntrospect::new(config.models.clone()), &mut *conn, files).await
        }),
    }
}

async fn run<I: Introspect>(
    introspect: &I,
    conn: &mut <I::Database as Database>::Connection,
    files: &[QueryFile],
) -> Result<Introspection, Box<dyn Error>> {
    let mut tx = conn.begin().await?;
    let tables = introspect.introspect_schema(&mut *tx).await?;
    info!("introspected {} tables", tables.len());

    let mut names = HashSet::<&str>::new();
    let mut queries = vec![];
    for file in files {
        if !names.insert(&file.name) {
            error!("{} already exists. Skipping {}...", file.name, file.source.file_name);
            continue;
        }
        match introspect.introspect_query(&mut *tx, &file.source).await {
            Ok(query) => {
                debug!("Check for {} successful!", file.source.file_name);
                queries.push((file.name.clone(), query));
            }
            Err(err) => {
                error!("Check for {} failed\n {err}", file.source.file_name);
            }
        }
    }
    info!("introspected {} of {} queries", queries.len(), files.len());

    tx.rollback().await?;
    Ok(Introspection { tables, queries })
}
