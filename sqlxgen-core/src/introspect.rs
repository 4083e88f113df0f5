pub mod mysql;
pub mod postgres;

use std::future::Future;

use sqlx::Database;

use crate::Engine;
use crate::error::{IntrospectError, Result};
use crate::filter::NameFilter;
use crate::model::{Column, Parameter, Query, QuerySource, Table};
use crate::params::{self, DeclaredParameter};
use crate::probe;
use crate::translate::Translate;

/// Reads table descriptors from catalogs and result shapes from probed queries.
///
/// Implementations never commit: every probe runs in a nested transaction
/// that is rolled back, so an outer transaction stays usable.
pub trait Introspect: Send + Sync {
    type Database: Database;

    fn introspect_schema<'c>(
        &'c self,
        conn: &'c mut <Self::Database as Database>::Connection,
    ) -> impl Future<Output = Result<Vec<Table>>> + Send + 'c;

    fn introspect_query<'c>(
        &'c self,
        conn: &'c mut <Self::Database as Database>::Connection,
        source: &'c QuerySource,
    ) -> impl Future<Output = Result<Query>> + Send + 'c;

    fn translator(&self) -> &'static dyn Translate;
}

/// Which schemas to read and which of their tables to keep.
#[derive(Debug, Clone)]
pub struct SchemaSelection {
    /// SQL `LIKE` patterns over schema names.
    pub schemas: Vec<String>,
    /// Applied to `schema.table`.
    pub tables: NameFilter,
}

impl Default for SchemaSelection {
    fn default() -> Self {
        Self {
            schemas: vec![],
            tables: NameFilter::everything(),
        }
    }
}

/// One catalog row per column, ordered by table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CatalogColumn {
    pub schema_name: String,
    pub table_name: String,
    pub column: Column,
}

/// Groups consecutive rows of the same table, drops filtered tables and
/// puts every table's columns in canonical order.
pub(crate) fn group_tables(rows: Vec<CatalogColumn>, filter: &NameFilter) -> Vec<Table> {
    let mut tables: Vec<Table> = vec![];
    for row in rows {
        match tables.last_mut() {
            Some(table)
                if table.schema_name == row.schema_name && table.table_name == row.table_name =>
            {
                table.columns.push(row.column);
            }
            _ => tables.push(Table {
                schema_name: row.schema_name,
                table_name: row.table_name,
                columns: vec![row.column],
            }),
        }
    }
    tables.retain(|table| filter.matches(&table.full_name()));
    for table in &mut tables {
        table.sort_columns();
    }
    tables
}

/// Query text ready to probe, or an error when it cannot produce rows.
pub(crate) fn probe_text(source: &QuerySource, engine: Engine) -> Result<String> {
    let executable = params::executable_text(&source.sql, engine);
    match probe::is_row_returning(&executable, engine) {
        true => Ok(probe::neutralize_where(&executable, engine)),
        false => Err(IntrospectError::NotRowReturning {
            file: source.file_name.clone(),
        }),
    }
}

/// Builds the query descriptor once parameter types are known.
///
/// `inferred` yields the server-side type of an unhinted parameter; unhinted
/// parameters it cannot type fall back to `fallback`.
pub(crate) fn describe_query(
    source: &QuerySource,
    declared: Vec<DeclaredParameter>,
    columns: Vec<Column>,
    translate: &dyn Translate,
    inferred: impl Fn(&str) -> Option<String>,
    fallback: &str,
) -> Query {
    let params = declared
        .into_iter()
        .map(|param| {
            let type_name = param
                .type_hint
                .clone()
                .or_else(|| inferred(&param.name))
                .unwrap_or_else(|| fallback.to_string());
            let target = translate.target(&type_name, true, false);
            Parameter {
                name: param.name,
                type_hint: param.type_hint,
                is_array: target.array,
                type_name,
                target,
            }
        })
        .collect();
    Query {
        file_name: source.file_name.clone(),
        sql: source.sql.clone(),
        params,
        columns,
        returns_one: params::returns_one(&source.sql, translate.engine()),
    }
}
