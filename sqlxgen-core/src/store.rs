//! Generic relational operations over generated entities and queries.
//!
//! Every operation takes an explicit connection. Pass a transaction's
//! connection (`&mut *tx`) to make a sequence of operations atomic.

pub mod backend;
pub mod error;
pub mod field;
pub mod statement;
pub mod value;

use sqlx::{Connection, Database, FromRow};
use tracing::{debug, warn};

pub use backend::Backend;
pub use error::{Result, StoreError};
pub use field::{Binding, Field};
pub use value::{SqlValue, Value};

use crate::{Engine, params};
use statement::{Spelling, Statement};

/// A row type decodable from the database's rows.
pub trait Record<DB: Database>: for<'r> FromRow<'r, DB::Row> + Send + Unpin {}

impl<DB, T> Record<DB> for T
where
    DB: Database,
    T: for<'r> FromRow<'r, DB::Row> + Send + Unpin,
{
}

/// The capability contract of a persistable table type.
pub trait Entity: Sized + Send + Sync {
    type Database: Backend;

    /// Quoted, ready to write into a statement.
    const TABLE_NAME: &'static str;
    const PRIMARY_KEY: &'static [&'static str];
    const GENERATED_COLUMNS: &'static [&'static str] = &[];
    /// `(column, type)` for columns whose placeholders need a cast.
    const BIND_CASTS: &'static [(&'static str, &'static str)] = &[];

    const INSERT_QUERY: &'static str;
    const COUNT_QUERY: &'static str;
    const FIND_ALL_QUERY: &'static str;
    const FIND_BY_PK_QUERY: &'static str;
    const DELETE_BY_PK_QUERY: &'static str;
    const DELETE_ALL_QUERY: &'static str;

    const RETURNING: &'static str;
    const PK_WHERE: &'static str;
    const ALL_FIELDS_WHERE: &'static str;

    /// Every field in declaration order.
    fn bindings(&self) -> Vec<Binding>;
}

/// Arguments of a hand-written query.
pub trait Queryable: Send + Sync {
    type Database: Backend;
    type Row: Record<Self::Database>;

    const SQL: &'static str;
    /// The query ends in `LIMIT 1`; [`query`] rejects more than one row.
    const RETURNS_ONE: bool = false;

    fn bindings(&self) -> Vec<Binding>;
}

pub type Conn<E> = <<E as Entity>::Database as Database>::Connection;

/// 1-based page number and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub fn new(number: u32, size: u32) -> Self {
        Self { number, size }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.number.saturating_sub(1)) * u64::from(self.size)
    }

    fn validate(self) -> Result<Self> {
        match self.number >= 1 && self.size > 0 {
            true => Ok(self),
            false => Err(StoreError::InvalidPage {
                page: self.number,
                size: self.size,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }

    pub(crate) fn to_sql(&self, engine: Engine) -> String {
        let column = engine.quote_ident(&self.column);
        match self.descending {
            true => format!("{column} DESC"),
            false => format!("{column} ASC"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkOptions {
    /// Bind parameter ceiling per statement.
    pub max_parameters: usize,
}

impl BulkOptions {
    pub fn for_backend<DB: Backend>() -> Self {
        Self {
            max_parameters: DB::MAX_BIND_PARAMETERS,
        }
    }
}

fn entity_name<E>() -> &'static str {
    let name = std::any::type_name::<E>();
    name.rsplit("::").next().unwrap_or(name)
}

async fn fetch<E, T>(
    conn: &mut Conn<E>,
    operation: &'static str,
    statement: Statement,
) -> Result<Vec<T>>
where
    E: Entity,
    T: Record<E::Database>,
{
    debug!("{operation} {}: {}", E::TABLE_NAME, statement.sql);
    <E::Database as Backend>::fetch_all::<T>(conn, &statement.sql, statement.values)
        .await
        .map_err(StoreError::storage(operation, entity_name::<E>()))
}

async fn execute<E: Entity>(
    conn: &mut Conn<E>,
    operation: &'static str,
    statement: Statement,
) -> Result<u64> {
    debug!("{operation} {}: {}", E::TABLE_NAME, statement.sql);
    <E::Database as Backend>::execute(conn, &statement.sql, statement.values)
        .await
        .map_err(StoreError::storage(operation, entity_name::<E>()))
}

async fn count_matching<E: Entity>(
    conn: &mut Conn<E>,
    operation: &'static str,
    statement: Statement,
) -> Result<i64> {
    debug!("{operation} {}: {}", E::TABLE_NAME, statement.sql);
    <E::Database as Backend>::fetch_count(conn, &statement.sql, statement.values)
        .await
        .map_err(StoreError::storage(operation, entity_name::<E>()))?
        .ok_or(StoreError::NoRowReturned {
            operation,
            entity: entity_name::<E>(),
        })
}

fn compile<E: Entity>(sql: &str, bindings: &[Binding]) -> Result<Statement> {
    Statement::with_bindings(sql, <E::Database as Backend>::ENGINE, bindings)
}

fn spelling<E: Entity>() -> Spelling<'static> {
    Spelling {
        engine: <E::Database as Backend>::ENGINE,
        casts: E::BIND_CASTS,
    }
}

fn require_primary_key<E: Entity>() -> Result<()> {
    match E::PRIMARY_KEY.is_empty() {
        true => Err(StoreError::MissingPrimaryKey {
            entity: entity_name::<E>(),
        }),
        false => Ok(()),
    }
}

/// Rows matching every present field of `instance`.
pub async fn count<E: Entity>(conn: &mut Conn<E>, instance: &E) -> Result<i64> {
    let statement = compile::<E>(E::COUNT_QUERY, &instance.bindings())?;
    count_matching::<E>(conn, "count", statement).await
}

pub async fn find_all<E>(conn: &mut Conn<E>, instance: &E) -> Result<Vec<E>>
where
    E: Entity + Record<E::Database>,
{
    let statement = compile::<E>(E::FIND_ALL_QUERY, &instance.bindings())?;
    fetch::<E, E>(conn, "find-all", statement).await
}

/// First match in server order.
pub async fn find_first<E>(conn: &mut Conn<E>, instance: &E) -> Result<E>
where
    E: Entity + Record<E::Database>,
{
    let sql = statement::with_suffix(E::FIND_ALL_QUERY, "\nLIMIT 1");
    let statement = compile::<E>(&sql, &instance.bindings())?;
    fetch::<E, E>(conn, "find-first", statement)
        .await?
        .into_iter()
        .next()
        .ok_or(StoreError::NotFound {
            entity: entity_name::<E>(),
        })
}

/// The single match; more than one is an error.
pub async fn find_one<E>(conn: &mut Conn<E>, instance: &E) -> Result<E>
where
    E: Entity + Record<E::Database>,
{
    let sql = statement::with_suffix(E::FIND_ALL_QUERY, "\nLIMIT 2");
    let statement = compile::<E>(&sql, &instance.bindings())?;
    let mut rows = fetch::<E, E>(conn, "find-one", statement).await?;
    match rows.len() {
        0 => Err(StoreError::NotFound {
            entity: entity_name::<E>(),
        }),
        1 => Ok(rows.remove(0)),
        _ => Err(StoreError::FoundMultiple {
            entity: entity_name::<E>(),
        }),
    }
}

pub async fn find_by_pk<E>(conn: &mut Conn<E>, instance: &E) -> Result<E>
where
    E: Entity + Record<E::Database>,
{
    require_primary_key::<E>()?;
    let statement = compile::<E>(E::FIND_BY_PK_QUERY, &instance.bindings())?;
    fetch::<E, E>(conn, "find-by-pk", statement)
        .await?
        .into_iter()
        .next()
        .ok_or(StoreError::NotFound {
            entity: entity_name::<E>(),
        })
}

/// One page of matches, ordered by `order` or by the first selected column.
pub async fn find_page<E>(
    conn: &mut Conn<E>,
    instance: &E,
    page: Page,
    order: &[OrderBy],
) -> Result<Vec<E>>
where
    E: Entity + Record<E::Database>,
{
    let page = page.validate()?;
    let bindings = instance.bindings();
    if let Some(unknown) = order
        .iter()
        .find(|order| !bindings.iter().any(|binding| binding.column == order.column))
    {
        return Err(StoreError::UnknownColumn {
            entity: entity_name::<E>(),
            column: unknown.column.clone(),
        });
    }
    let sql = statement::page_sql(
        E::FIND_ALL_QUERY,
        page,
        order,
        <E::Database as Backend>::ENGINE,
    );
    let statement = compile::<E>(&sql, &bindings)?;
    fetch::<E, E>(conn, "find-page", statement).await
}

pub async fn insert_one<E>(conn: &mut Conn<E>, instance: &E) -> Result<E>
where
    E: Entity + Record<E::Database>,
{
    let statement = compile::<E>(E::INSERT_QUERY, &instance.bindings())?;
    fetch::<E, E>(conn, "insert", statement)
        .await?
        .into_iter()
        .next()
        .ok_or(StoreError::NoRowReturned {
            operation: "insert",
            entity: entity_name::<E>(),
        })
}

/// Inserts each instance in turn, returning the stored rows in input order.
pub async fn insert<E>(conn: &mut Conn<E>, instances: &[E]) -> Result<Vec<E>>
where
    E: Entity + Record<E::Database>,
{
    let mut inserted = Vec::with_capacity(instances.len());
    for instance in instances {
        inserted.push(insert_one(&mut *conn, instance).await?);
    }
    Ok(inserted)
}

/// Writes every present non-key field of the row identified by the primary key.
pub async fn update_by_pk<E>(conn: &mut Conn<E>, instance: &E) -> Result<E>
where
    E: Entity + Record<E::Database>,
{
    require_primary_key::<E>()?;
    let bindings = instance.bindings();
    let set = statement::set_clause(
        &bindings,
        E::PRIMARY_KEY,
        E::GENERATED_COLUMNS,
        spelling::<E>(),
    )
    .ok_or(StoreError::NothingToUpdate {
        entity: entity_name::<E>(),
    })?;
    let sql = format!(
        "UPDATE {} SET{set}{}{};",
        E::TABLE_NAME,
        E::PK_WHERE,
        E::RETURNING
    );
    let statement = compile::<E>(&sql, &bindings)?;
    fetch::<E, E>(conn, "update-by-pk", statement)
        .await?
        .into_iter()
        .next()
        .ok_or(StoreError::NotFound {
            entity: entity_name::<E>(),
        })
}

/// Updates the row identified by `keys`, which must match exactly one row.
pub async fn update_by_ak<E>(conn: &mut Conn<E>, instance: &E, keys: &[&str]) -> Result<E>
where
    E: Entity + Record<E::Database>,
{
    let entity = entity_name::<E>();
    if keys.is_empty() {
        return Err(StoreError::MissingKeyColumns { entity });
    }
    let bindings = instance.bindings();
    if let Some(unknown) = keys
        .iter()
        .find(|key| !bindings.iter().any(|binding| binding.column == **key))
    {
        return Err(StoreError::UnknownColumn {
            entity,
            column: unknown.to_string(),
        });
    }
    let set = statement::set_clause(&bindings, keys, E::GENERATED_COLUMNS, spelling::<E>())
        .ok_or(StoreError::NothingToUpdate { entity })?;

    let key_where = statement::key_where(keys, spelling::<E>());
    let count_sql = format!("SELECT COUNT(*) FROM {}{key_where}", E::TABLE_NAME);
    let matched = count_matching::<E>(
        &mut *conn,
        "update-by-ak",
        compile::<E>(&count_sql, &bindings)?,
    )
    .await?;
    if matched != 1 {
        return Err(StoreError::WouldMatch {
            operation: "update-by-ak",
            entity,
            count: matched,
        });
    }

    let sql = format!(
        "UPDATE {} SET{set}{key_where}{};",
        E::TABLE_NAME,
        E::RETURNING
    );
    let statement = compile::<E>(&sql, &bindings)?;
    fetch::<E, E>(conn, "update-by-ak", statement)
        .await?
        .into_iter()
        .next()
        .ok_or(StoreError::NotFound { entity })
}

/// Updates each instance by primary key in turn. Earlier updates stay
/// applied when a later one fails unless `conn` belongs to a transaction.
pub async fn update<E>(conn: &mut Conn<E>, instances: &[E]) -> Result<Vec<E>>
where
    E: Entity + Record<E::Database>,
{
    let mut updated = Vec::with_capacity(instances.len());
    for instance in instances {
        updated.push(update_by_pk(&mut *conn, instance).await?);
    }
    Ok(updated)
}

pub async fn delete_by_pk<E: Entity>(conn: &mut Conn<E>, instance: &E) -> Result<()> {
    require_primary_key::<E>()?;
    let statement = compile::<E>(E::DELETE_BY_PK_QUERY, &instance.bindings())?;
    match execute::<E>(conn, "delete-by-pk", statement).await? {
        1 => Ok(()),
        0 => Err(StoreError::NotFound {
            entity: entity_name::<E>(),
        }),
        count => Err(StoreError::RowsAffected {
            operation: "delete-by-pk",
            entity: entity_name::<E>(),
            count,
        }),
    }
}

/// Deletes the single row matching `instance`; refuses when the match is not unique.
pub async fn delete_one<E: Entity>(conn: &mut Conn<E>, instance: &E) -> Result<()> {
    let bindings = instance.bindings();
    let matched = count_matching::<E>(
        &mut *conn,
        "delete-one",
        compile::<E>(E::COUNT_QUERY, &bindings)?,
    )
    .await?;
    if matched != 1 {
        return Err(StoreError::WouldMatch {
            operation: "delete-one",
            entity: entity_name::<E>(),
            count: matched,
        });
    }
    let statement = compile::<E>(E::DELETE_ALL_QUERY, &bindings)?;
    execute::<E>(conn, "delete-one", statement).await?;
    Ok(())
}

/// Deletes every row matching `instance`, returning how many were removed.
pub async fn delete_all<E: Entity>(conn: &mut Conn<E>, instance: &E) -> Result<u64> {
    let statement = compile::<E>(E::DELETE_ALL_QUERY, &instance.bindings())?;
    execute::<E>(conn, "delete-all", statement).await
}

pub async fn bulk_insert<E>(conn: &mut Conn<E>, instances: &[E]) -> Result<Vec<E>>
where
    E: Entity + Record<E::Database>,
{
    bulk_insert_with(conn, instances, BulkOptions::for_backend::<E::Database>()).await
}

/// Inserts in multi-row batches sized to stay under the bind ceiling.
///
/// All batches run in one transaction; any failure rolls every batch back.
pub async fn bulk_insert_with<E>(
    conn: &mut Conn<E>,
    instances: &[E],
    options: BulkOptions,
) -> Result<Vec<E>>
where
    E: Entity + Record<E::Database>,
{
    let entity = entity_name::<E>();
    let Some(first) = instances.first() else {
        return Ok(vec![]);
    };
    let fields = first.bindings().len();
    let batch = statement::batch_size(options.max_parameters, fields).ok_or(
        StoreError::BindCeiling {
            entity,
            fields,
            ceiling: options.max_parameters,
        },
    )?;

    let mut tx = conn
        .begin()
        .await
        .map_err(StoreError::storage("bulk-insert", entity))?;
    let mut inserted = Vec::with_capacity(instances.len());
    for chunk in instances.chunks(batch) {
        match insert_batch::<E>(&mut *tx, chunk).await {
            Ok(rows) => inserted.extend(rows),
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!("rollback of bulk insert into {} failed: {rollback}", E::TABLE_NAME);
                }
                return Err(err);
            }
        }
    }
    tx.commit()
        .await
        .map_err(StoreError::storage("bulk-insert", entity))?;
    debug!("bulk inserted {} rows into {}", inserted.len(), E::TABLE_NAME);
    Ok(inserted)
}

async fn insert_batch<E>(conn: &mut Conn<E>, chunk: &[E]) -> Result<Vec<E>>
where
    E: Entity + Record<E::Database>,
{
    let entity = entity_name::<E>();
    let engine = <E::Database as Backend>::ENGINE;
    let sql = statement::expand_values(E::INSERT_QUERY, chunk.len(), engine)
        .ok_or(StoreError::NoValuesTuple { entity })?;
    let values = statement::row_values(chunk.iter().map(|instance| instance.bindings()));
    let statement = Statement::compile(&sql, engine, |name| values.get(name).cloned())?;
    let rows = fetch::<E, E>(conn, "bulk-insert", statement).await?;
    match rows.len() == chunk.len() {
        true => Ok(rows),
        false => Err(StoreError::NoRowReturned {
            operation: "bulk-insert",
            entity,
        }),
    }
}

async fn fetch_query<Q: Queryable>(
    conn: &mut <Q::Database as Database>::Connection,
    operation: &'static str,
    sql: &str,
    args: &Q,
) -> Result<Vec<Q::Row>> {
    let statement =
        Statement::with_bindings(sql, <Q::Database as Backend>::ENGINE, &args.bindings())?;
    let entity = entity_name::<Q>();
    debug!("{operation} {entity}: {}", statement.sql);
    <Q::Database as Backend>::fetch_all::<Q::Row>(conn, &statement.sql, statement.values)
        .await
        .map_err(StoreError::storage(operation, entity))
}

fn query_text<Q: Queryable>() -> String {
    params::executable_text(Q::SQL, <Q::Database as Backend>::ENGINE)
}

/// Every row of a hand-written query. A query declared to return one row
/// fails with [`StoreError::FoundMultiple`] when the server sends more.
pub async fn query<Q: Queryable>(
    conn: &mut <Q::Database as Database>::Connection,
    args: &Q,
) -> Result<Vec<Q::Row>> {
    let rows = fetch_query(conn, "query", &query_text::<Q>(), args).await?;
    if Q::RETURNS_ONE && rows.len() > 1 {
        return Err(StoreError::FoundMultiple {
            entity: entity_name::<Q>(),
        });
    }
    Ok(rows)
}

/// At most one row of a hand-written query.
pub async fn query_optional<Q: Queryable>(
    conn: &mut <Q::Database as Database>::Connection,
    args: &Q,
) -> Result<Option<Q::Row>> {
    let mut rows = fetch_query(conn, "query-optional", &query_text::<Q>(), args).await?;
    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.pop()),
        _ => Err(StoreError::FoundMultiple {
            entity: entity_name::<Q>(),
        }),
    }
}

/// Exactly one row of a hand-written query.
pub async fn query_one<Q: Queryable>(
    conn: &mut <Q::Database as Database>::Connection,
    args: &Q,
) -> Result<Q::Row> {
    query_optional(conn, args).await?.ok_or(StoreError::NotFound {
        entity: entity_name::<Q>(),
    })
}

/// The first row of a hand-written query in server order.
pub async fn query_first<Q: Queryable>(
    conn: &mut <Q::Database as Database>::Connection,
    args: &Q,
) -> Result<Q::Row> {
    fetch_query(conn, "query-first", &query_text::<Q>(), args)
        .await?
        .into_iter()
        .next()
        .ok_or(StoreError::NotFound {
            entity: entity_name::<Q>(),
        })
}

/// How many rows a hand-written query returns, counted by the server.
pub async fn count_sql<Q: Queryable>(
    conn: &mut <Q::Database as Database>::Connection,
    args: &Q,
) -> Result<i64> {
    let engine = <Q::Database as Backend>::ENGINE;
    let sql = statement::counted(&query_text::<Q>());
    let statement = Statement::with_bindings(&sql, engine, &args.bindings())?;
    let entity = entity_name::<Q>();
    debug!("count-sql {entity}: {}", statement.sql);
    <Q::Database as Backend>::fetch_count(conn, &statement.sql, statement.values)
        .await
        .map_err(StoreError::storage("count-sql", entity))?
        .ok_or(StoreError::NoRowReturned {
            operation: "count-sql",
            entity,
        })
}
