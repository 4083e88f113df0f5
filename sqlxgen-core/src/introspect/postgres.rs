use std::collections::HashMap;
use std::future::Future;

use sqlx::{Connection, Either, Executor, PgConnection, Postgres, Statement, TypeInfo};
use tracing::{debug, warn};

use super::{CatalogColumn, Introspect, SchemaSelection, describe_query, group_tables, probe_text};
use crate::Engine;
use crate::error::{IntrospectError, Result};
use crate::lexer;
use crate::model::{Column, Query, QuerySource, Table};
use crate::params::{self, DeclaredParameter};
use crate::probe::{self, PROBE_RELATION};
use crate::translate::{Translate, postgres::PgTranslate};

const SCHEMA_COLUMNS: &str = "select
    n.nspname as schema_name,
    c.relname as table_name,
    a.attname as column_name,
    case
        when tn.nspname = 'pg_catalog' then regexp_replace(t.typname, '^_', '')
        else tn.nspname || '.' || regexp_replace(t.typname, '^_', '')
    end as type_name,
    t.typcategory = 'A' as is_array,
    not a.attnotnull as nullable,
    coalesce(array_position(pk.conkey, a.attnum), 0) as pk_ordinal_position,
    (
        a.attgenerated <> ''
        or a.attidentity <> ''
        or coalesce(pg_get_expr(d.adbin, d.adrelid), '') like 'nextval(%'
    ) as generated
from pg_class c
inner join pg_namespace n on n.oid = c.relnamespace
inner join pg_attribute a on a.attrelid = c.oid and a.attnum > 0 and not a.attisdropped
inner join pg_type t on t.oid = a.atttypid
inner join pg_namespace tn on tn.oid = t.typnamespace
left join pg_constraint pk on pk.conrelid = c.oid and pk.contype = 'p'
left join pg_attrdef d on d.adrelid = c.oid and d.adnum = a.attnum
where n.nspname like $1
and c.relkind in ('r', 'p')
order by n.nspname, c.relname, a.attnum";

const PROBE_COLUMNS: &str = "select
    a.attname as column_name,
    case
        when tn.nspname = 'pg_catalog' then regexp_replace(t.typname, '^_', '')
        else tn.nspname || '.' || regexp_replace(t.typname, '^_', '')
    end as type_name,
    t.typcategory = 'A' as is_array,
    not a.attnotnull as nullable
from pg_attribute a
inner join pg_type t on t.oid = a.atttypid
inner join pg_namespace tn on tn.oid = t.typnamespace
where a.attrelid = cast($1 as regclass)
and a.attnum > 0
and not a.attisdropped
order by a.attnum";

#[derive(Debug, sqlx::FromRow)]
struct SchemaColumnRow {
    schema_name: String,
    table_name: String,
    column_name: String,
    type_name: String,
    is_array: bool,
    nullable: bool,
    pk_ordinal_position: i32,
    generated: bool,
}

impl From<SchemaColumnRow> for CatalogColumn {
    fn from(row: SchemaColumnRow) -> Self {
        CatalogColumn {
            schema_name: row.schema_name,
            table_name: row.table_name,
            column: Column {
                column_name: row.column_name,
                type_name: row.type_name,
                is_array: row.is_array,
                nullable: row.nullable,
                pk_ordinal_position: u32::try_from(row.pk_ordinal_position).unwrap_or_default(),
                generated: row.generated,
            },
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProbeColumnRow {
    column_name: String,
    type_name: String,
    is_array: bool,
    nullable: bool,
}

impl From<ProbeColumnRow> for Column {
    fn from(row: ProbeColumnRow) -> Self {
        Column {
            column_name: row.column_name,
            type_name: row.type_name,
            is_array: row.is_array,
            nullable: row.nullable,
            pk_ordinal_position: 0,
            generated: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PgIntrospect {
    selection: SchemaSelection,
}

impl PgIntrospect {
    pub fn new(selection: SchemaSelection) -> Self {
        Self { selection }
    }
}

/// `CAST(NULL AS <type>)` for typed placeholders, bare `NULL` otherwise.
fn probe_literal(
    name: &str,
    declared: &[DeclaredParameter],
    inferred: &HashMap<String, String>,
) -> String {
    let hint = declared
        .iter()
        .find(|param| param.name == name)
        .and_then(|param| param.type_hint.as_ref());
    match hint.or_else(|| inferred.get(name)) {
        Some(type_name) => format!("CAST(NULL AS {type_name})"),
        None => "NULL".to_string(),
    }
}

/// Wraps hinted placeholders in `CAST(:name AS <hint>)` so the server
/// prepares them with the declared type instead of guessing.
fn hinted_text(sql: &str, declared: &[DeclaredParameter]) -> String {
    lexer::replace_placeholders(sql, Engine::Postgres, |name, _| {
        let hint = declared
            .iter()
            .find(|param| param.name == name)
            .and_then(|param| param.type_hint.as_deref());
        match hint {
            Some(hint) => format!("CAST(:{name} AS {hint})"),
            None => format!(":{name}"),
        }
    })
}

async fn probe_columns(
    conn: &mut PgConnection,
    source: &QuerySource,
    declared: &[DeclaredParameter],
) -> Result<(Vec<Column>, HashMap<String, String>)> {
    let file = source.file_name.as_str();
    let probe_sql = probe_text(source, Engine::Postgres)?;

    let executable = params::executable_text(&source.sql, Engine::Postgres);
    let positional = params::to_positional(&hinted_text(&executable, declared), Engine::Postgres);
    let prepared = (&mut *conn)
        .prepare(&positional.raw_query)
        .await
        .map_err(IntrospectError::query(file, "failed to prepare query"))?;
    let mut inferred = HashMap::new();
    // PgStatement::parameters always describes the parameter types.
    if let Some(Either::Left(types)) = prepared.parameters() {
        for (name, ty) in positional.params.iter().zip(types) {
            inferred.insert(name.clone(), ty.name().to_lowercase());
        }
    }

    let literal = lexer::replace_placeholders(&probe_sql, Engine::Postgres, |name, _| {
        probe_literal(name, declared, &inferred)
    });
    debug!("{file}: probing\n{literal}");

    sqlx::query(&format!("drop table if exists {PROBE_RELATION}"))
        .execute(&mut *conn)
        .await
        .map_err(IntrospectError::query(file, "failed to drop probe table"))?;
    sqlx::query(&format!(
        "create temp table {PROBE_RELATION} as\n{}",
        probe::wrap(&literal)
    ))
    .execute(&mut *conn)
    .await
    .map_err(IntrospectError::query(file, "failed to create probe table"))?;

    let columns: Vec<ProbeColumnRow> = sqlx::query_as(PROBE_COLUMNS)
        .bind(PROBE_RELATION)
        .fetch_all(&mut *conn)
        .await
        .map_err(IntrospectError::query(file, "failed to read probe columns"))?;

    Ok((columns.into_iter().map(Column::from).collect(), inferred))
}

impl Introspect for PgIntrospect {
    type Database = Postgres;

    fn introspect_schema<'c>(
        &'c self,
        conn: &'c mut PgConnection,
    ) -> impl Future<Output = Result<Vec<Table>>> + Send + 'c {
        async move {
            let mut rows: Vec<CatalogColumn> = vec![];
            for schema in &self.selection.schemas {
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
        conn: &'c mut PgConnection,
        source: &'c QuerySource,
    ) -> impl Future<Output = Result<Query>> + Send + 'c {
        async move {
            let file = source.file_name.as_str();
            let declared = params::extract_parameters(&source.sql, Engine::Postgres);

            let mut tx = conn
                .begin()
                .await
                .map_err(IntrospectError::query(file, "failed to open probe transaction"))?;
            let probed = probe_columns(&mut *tx, source, &declared).await;
            if let Err(err) = tx.rollback().await {
                warn!("{file}: rolling back probe failed: {err}");
            }
            let (columns, inferred) = probed?;

            Ok(describe_query(
                source,
                declared,
                columns,
                &PgTranslate,
                |name| inferred.get(name).cloned(),
                "text",
            ))
        }
    }

    fn translator(&self) -> &'static dyn Translate {
        &PgTranslate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_literals_prefer_hints() {
        let declared = params::extract_parameters(
            "-- :since type: timestamptz\nselect * from t where a > :since and b = :b and c = :c",
            Engine::Postgres,
        );
        let inferred = HashMap::from([
            ("since".to_string(), "timestamp".to_string()),
            ("b".to_string(), "int4".to_string()),
        ]);
        assert_eq!(
            probe_literal("since", &declared, &inferred),
            "CAST(NULL AS timestamptz)"
        );
        assert_eq!(probe_literal("b", &declared, &inferred), "CAST(NULL AS int4)");
        assert_eq!(probe_literal("c", &declared, &inferred), "NULL");
    }

    #[test]
    fn hinted_placeholders_are_cast_before_prepare() {
        let sql = "-- :flag type: bool\nselect 1 from t where :flag is null or (a = :a and :flag)";
        let declared = params::extract_parameters(sql, Engine::Postgres);
        let executable = params::executable_text(sql, Engine::Postgres);
        let positional = params::to_positional(&hinted_text(&executable, &declared), Engine::Postgres);
        assert_eq!(
            positional.raw_query,
            "select 1 from t where CAST($1 AS bool) is null or (a = $2 and CAST($1 AS bool))"
        );
        assert_eq!(positional.params, vec!["flag", "a"]);
    }

    #[tokio::test]
    async fn hinted_parameter_without_context_prepares() {
        let Ok(url) = std::env::var("SQLXGEN_TEST_DATABASE_URL") else {
            return;
        };
        let mut conn = PgConnection::connect(&url).await.unwrap();
        let source = QuerySource {
            file_name: "flag.sql".to_string(),
            sql: "select 1 as x from pg_class where :flag is null -- :flag type: bool".to_string(),
        };
        let query = PgIntrospect::default()
            .introspect_query(&mut conn, &source)
            .await
            .unwrap();
        assert_eq!(query.params[0].type_name, "bool");
        assert_eq!(query.params[0].target.kind, crate::model::TypeKind::Bool);
        assert_eq!(query.columns[0].column_name, "x");
    }

    #[tokio::test]
    async fn enum_columns_carry_their_schema() {
        let Ok(url) = std::env::var("SQLXGEN_TEST_DATABASE_URL") else {
            return;
        };
        let mut conn = PgConnection::connect(&url).await.unwrap();
        let mut tx = conn.begin().await.unwrap();
        sqlx::query("create type pg_temp.feeling as enum ('calm', 'tense')")
            .execute(&mut *tx)
            .await
            .unwrap();
        sqlx::query("create temp table feelings (id serial primary key, feeling pg_temp.feeling)")
            .execute(&mut *tx)
            .await
            .unwrap();

        let source = QuerySource {
            file_name: "feelings.sql".to_string(),
            sql: "select id, feeling from feelings".to_string(),
        };
        let query = PgIntrospect::default()
            .introspect_query(&mut *tx, &source)
            .await
            .unwrap();
        let feeling = &query.columns[1];
        assert!(feeling.type_name.starts_with("pg_temp_"), "{}", feeling.type_name);
        assert!(feeling.type_name.ends_with(".feeling"), "{}", feeling.type_name);
        assert_eq!(query.columns[0].type_name, "int4");
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn probes_against_live_database() {
        let Ok(url) = std::env::var("SQLXGEN_TEST_DATABASE_URL") else {
            return;
        };
        let mut conn = PgConnection::connect(&url).await.unwrap();
        let mut tx = conn.begin().await.unwrap();
        sqlx::query(
            "create temp table probe_movies (id serial primary key, title text not null, tags text[])",
        )
        .execute(&mut *tx)
        .await
        .unwrap();

        let introspect = PgIntrospect::default();
        let source = QuerySource {
            file_name: "movies.sql".to_string(),
            sql: "select id, title, tags from probe_movies where id = :id and title like :title"
                .to_string(),
        };
        let query = introspect.introspect_query(&mut *tx, &source).await.unwrap();
        let names: Vec<_> = query
            .columns
            .iter()
            .map(|column| column.column_name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "title", "tags"]);
        assert!(query.columns[2].is_array);
        assert_eq!(query.params[0].type_name, "int4");
        assert_eq!(query.params[1].type_name, "text");

        // the outer transaction is still usable after the probe
        let count: i64 = sqlx::query_scalar("select count(*) from probe_movies")
            .fetch_one(&mut *tx)
            .await
            .unwrap();
        assert_eq!(count, 0);
        tx.rollback().await.unwrap();
    }
}
