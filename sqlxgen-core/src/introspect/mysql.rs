use std::future::Future;

use sqlx::mysql::MySqlRow;
use sqlx::{Connection, MySql, MySqlConnection, Row};
use tracing::{debug, warn};

use super::{CatalogColumn, Introspect, SchemaSelection, describe_query, group_tables, probe_text};
use crate::Engine;
use crate::error::{IntrospectError, Result};
use crate::lexer::{self, Token};
use crate::model::{Column, Query, QuerySource, Table};
use crate::params;
use crate::probe::{self, PROBE_RELATION};
use crate::translate::{
    Translate,
    mysql::{MysqlTranslate, normalize_type_name},
};

const SCHEMA_COLUMNS: &str = "select
    cast(c.table_schema as char(255)) as schema_name,
    cast(c.table_name as char(255)) as table_name,
    cast(c.column_name as char(255)) as column_name,
    cast(c.column_type as char(255)) as column_type,
    cast(if(c.is_nullable = 'YES', 1, 0) as signed) as nullable,
    cast(coalesce(k.ordinal_position, 0) as signed) as pk_ordinal_position,
    cast(if(
        c.extra like '%auto_increment%'
        or c.extra like '%VIRTUAL GENERATED%'
        or c.extra like '%STORED GENERATED%',
        1, 0
    ) as signed) as generated
from information_schema.columns c
inner join information_schema.tables t
    on t.table_schema = c.table_schema
    and t.table_name = c.table_name
    and t.table_type = 'BASE TABLE'
left join information_schema.key_column_usage k
    on k.table_schema = c.table_schema
    and k.table_name = c.table_name
    and k.column_name = c.column_name
    and k.constraint_name = 'PRIMARY'
where c.table_schema like ?
order by c.table_schema, c.table_name, c.ordinal_position";

#[derive(Debug, sqlx::FromRow)]
struct SchemaColumnRow {
    schema_name: String,
    table_name: String,
    column_name: String,
    column_type: String,
    nullable: i64,
    pk_ordinal_position: i64,
    generated: i64,
}

impl From<SchemaColumnRow> for CatalogColumn {
    fn from(row: SchemaColumnRow) -> Self {
        CatalogColumn {
            schema_name: row.schema_name,
            table_name: row.table_name,
            column: Column {
                column_name: row.column_name,
                type_name: normalize_type_name(&row.column_type),
                is_array: false,
                nullable: row.nullable != 0,
                pk_ordinal_position: u32::try_from(row.pk_ordinal_position).unwrap_or_default(),
                generated: row.generated != 0,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MysqlIntrospect {
    selection: SchemaSelection,
}

impl MysqlIntrospect {
    pub fn new(selection: SchemaSelection) -> Self {
        Self { selection }
    }
}

/// `SHOW COLUMNS` values arrive as text or binary depending on server version.
fn text_at(row: &MySqlRow, column: &str) -> std::result::Result<String, sqlx::Error> {
    match row.try_get::<String, _>(column) {
        Ok(value) => Ok(value),
        Err(_) => row
            .try_get::<Vec<u8>, _>(column)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
    }
}

fn show_column(row: &MySqlRow) -> std::result::Result<Column, sqlx::Error> {
    Ok(Column {
        column_name: text_at(row, "Field")?,
        type_name: normalize_type_name(&text_at(row, "Type")?),
        is_array: false,
        nullable: text_at(row, "Null")?.eq_ignore_ascii_case("YES"),
        pk_ordinal_position: 0,
        generated: false,
    })
}

/// MySQL rejects `NULL` as a row count, so limits get `0` instead.
fn probe_literal(previous: Option<&Token<'_>>) -> String {
    match previous {
        Some(token) if token.is_keyword("limit") || token.is_keyword("offset") => "0".to_string(),
        _ => "NULL".to_string(),
    }
}

async fn probe_columns(conn: &mut MySqlConnection, source: &QuerySource) -> Result<Vec<Column>> {
    let file = source.file_name.as_str();
    let probe_sql = probe_text(source, Engine::Mysql)?;
    let literal = lexer::replace_placeholders(&probe_sql, Engine::Mysql, |_, previous| {
        probe_literal(previous)
    });
    debug!("{file}: probing\n{literal}");

    sqlx::query(&format!("drop temporary table if exists {PROBE_RELATION}"))
        .execute(&mut *conn)
        .await
        .map_err(IntrospectError::query(file, "failed to drop probe table"))?;
    sqlx::query(&format!(
        "create temporary table {PROBE_RELATION} as\n{}",
        probe::wrap(&literal)
    ))
    .execute(&mut *conn)
    .await
    .map_err(IntrospectError::query(file, "failed to create probe table"))?;

    let described = sqlx::query(&format!("show columns from {PROBE_RELATION}"))
        .fetch_all(&mut *conn)
        .await
        .and_then(|rows| rows.iter().map(show_column).collect::<std::result::Result<Vec<_>, _>>());

    // temporary tables survive a rollback
    let dropped = sqlx::query(&format!("drop temporary table if exists {PROBE_RELATION}"))
        .execute(&mut *conn)
        .await;

    let columns = described.map_err(IntrospectError::query(file, "failed to read probe columns"))?;
    dropped.map_err(IntrospectError::query(file, "failed to drop probe table"))?;
    Ok(columns)
}

impl Introspect for MysqlIntrospect {
    type Database = MySql;

    fn introspect_schema<'c>(
        &'c self,
        conn: &'c mut MySqlConnection,
    ) -> impl Future<Output = Result<Vec<Table>>> + Send + 'c {
        async move {
            let mut schemas = self.selection.schemas.clone();
            if schemas.is_empty() {
                let current: Option<String> = sqlx::query_scalar("select database()")
                    .fetch_one(&mut *conn)
                    .await
                    .map_err(IntrospectError::schema("database()", "failed to read current database"))?;
                match current {
                    Some(current) => schemas.push(current),
                    None => warn!("no schemas configured and no database selected"),
                }
            }

            let mut rows: Vec<CatalogColumn> = vec![];
            for schema in &schemas {
                debug!("reading columns of schema {schema}");
                let columns: Vec<SchemaColumnRow> = sqlx::query_as(SCHEMA_COLUMNS)
                    .bind(schema)
                    .fetch_all(&mut *conn)
                    .await
                    .map_err(IntrospectError::schema(schema, "failed to read columns"))?;
                rows.extend(columns.into_iter().map(CatalogColumn::from));
            }
            let tables = group_tables(rows, &self.selection.tables);
            debug!("found {} tables", tables.len());
            Ok(tables)
        }
    }

    fn introspect_query<'c>(
        &'c self,
        conn: &'c mut MySqlConnection,
        source: &'c QuerySource,
    ) -> impl Future<Output = Result<Query>> + Send + 'c {
        async move {
            let file = source.file_name.as_str();
            let declared = params::extract_parameters(&source.sql, Engine::Mysql);

            let mut tx = conn
                .begin()
                .await
                .map_err(IntrospectError::query(file, "failed to open probe transaction"))?;
            let probed = probe_columns(&mut *tx, source).await;
            if let Err(err) = tx.rollback().await {
                warn!("{file}: rolling back probe failed: {err}");
            }
            let columns = probed?;

            Ok(describe_query(
                source,
                declared,
                columns,
                &MysqlTranslate,
                |_| None,
                "varchar",
            ))
        }
    }

    fn translator(&self) -> &'static dyn Translate {
        &MysqlTranslate
    }
}
