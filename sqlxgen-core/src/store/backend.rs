use std::future::Future;

use sqlx::error::BoxDynError;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::{Arguments, Database, FromRow, MySql, MySqlConnection, PgConnection, Postgres};

use super::value::Value;
use crate::Engine;

/// The per-engine primitives the runtime operations are written against.
pub trait Backend: Database {
    /// Decides placeholder style, identifier quoting and literal syntax.
    const ENGINE: Engine;
    /// Bind parameters a single bulk statement may carry by default.
    const MAX_BIND_PARAMETERS: usize;

    fn fetch_all<'c, T>(
        conn: &'c mut Self::Connection,
        sql: &'c str,
        values: Vec<Value>,
    ) -> impl Future<Output = Result<Vec<T>, sqlx::Error>> + Send + 'c
    where
        T: for<'r> FromRow<'r, Self::Row> + Send + Unpin + 'c;

    fn fetch_count<'c>(
        conn: &'c mut Self::Connection,
        sql: &'c str,
        values: Vec<Value>,
    ) -> impl Future<Output = Result<Option<i64>, sqlx::Error>> + Send + 'c;

    fn execute<'c>(
        conn: &'c mut Self::Connection,
        sql: &'c str,
        values: Vec<Value>,
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send + 'c;
}

fn pg_arguments(values: Vec<Value>) -> Result<PgArguments, sqlx::Error> {
    let mut arguments = PgArguments::default();
    for value in values {
        let added = match value {
            Value::Bool(v) => Arguments::add(&mut arguments, v),
            // Postgres has no single-byte integer.
            Value::TinyInt(v) => Arguments::add(&mut arguments, v.map(i16::from)),
            Value::SmallInt(v) => Arguments::add(&mut arguments, v),
            Value::Int(v) => Arguments::add(&mut arguments, v),
            Value::BigInt(v) => Arguments::add(&mut arguments, v),
            Value::Real(v) => Arguments::add(&mut arguments, v),
            Value::Double(v) => Arguments::add(&mut arguments, v),
            Value::Decimal(v) => Arguments::add(&mut arguments, v),
            Value::Text(v) => Arguments::add(&mut arguments, v),
            Value::Uuid(v) => Arguments::add(&mut arguments, v),
            Value::Timestamp(v) => Arguments::add(&mut arguments, v),
            Value::TimestampTz(v) => Arguments::add(&mut arguments, v),
            Value::Date(v) => Arguments::add(&mut arguments, v),
            Value::Time(v) => Arguments::add(&mut arguments, v),
            Value::Json(v) => Arguments::add(&mut arguments, v),
            Value::Bytes(v) => Arguments::add(&mut arguments, v),
            Value::BoolArray(v) => Arguments::add(&mut arguments, v),
            Value::SmallIntArray(v) => Arguments::add(&mut arguments, v),
            Value::IntArray(v) => Arguments::add(&mut arguments, v),
            Value::BigIntArray(v) => Arguments::add(&mut arguments, v),
            Value::RealArray(v) => Arguments::add(&mut arguments, v),
            Value::DoubleArray(v) => Arguments::add(&mut arguments, v),
            Value::DecimalArray(v) => Arguments::add(&mut arguments, v),
            Value::TextArray(v) => Arguments::add(&mut arguments, v),
            Value::UuidArray(v) => Arguments::add(&mut arguments, v),
            Value::TimestampArray(v) => Arguments::add(&mut arguments, v),
            Value::TimestampTzArray(v) => Arguments::add(&mut arguments, v),
            Value::DateArray(v) => Arguments::add(&mut arguments, v),
            Value::TimeArray(v) => Arguments::add(&mut arguments, v),
            Value::JsonArray(v) => Arguments::add(&mut arguments, v),
            Value::BytesArray(v) => Arguments::add(&mut arguments, v),
        };
        added.map_err(sqlx::Error::Encode)?;
    }
    Ok(arguments)
}

fn mysql_arguments(values: Vec<Value>) -> Result<MySqlArguments, sqlx::Error> {
    let mut arguments = MySqlArguments::default();
    for value in values {
        let added: Result<(), BoxDynError> = match value {
            Value::Bool(v) => Arguments::add(&mut arguments, v),
            Value::TinyInt(v) => Arguments::add(&mut arguments, v),
            Value::SmallInt(v) => Arguments::add(&mut arguments, v),
            Value::Int(v) => Arguments::add(&mut arguments, v),
            Value::BigInt(v) => Arguments::add(&mut arguments, v),
            Value::Real(v) => Arguments::add(&mut arguments, v),
            Value::Double(v) => Arguments::add(&mut arguments, v),
            Value::Decimal(v) => Arguments::add(&mut arguments, v),
            Value::Text(v) => Arguments::add(&mut arguments, v),
            Value::Uuid(v) => Arguments::add(&mut arguments, v),
            Value::Timestamp(v) => Arguments::add(&mut arguments, v),
            Value::TimestampTz(v) => Arguments::add(&mut arguments, v),
            Value::Date(v) => Arguments::add(&mut arguments, v),
            Value::Time(v) => Arguments::add(&mut arguments, v),
            Value::Json(v) => Arguments::add(&mut arguments, v),
            Value::Bytes(v) => Arguments::add(&mut arguments, v),
            _ => Err("array values cannot be bound on MySQL".into()),
        };
        added.map_err(sqlx::Error::Encode)?;
    }
    Ok(arguments)
}

impl Backend for Postgres {
    const ENGINE: Engine = Engine::Postgres;
    const MAX_BIND_PARAMETERS: usize = 500;

    fn fetch_all<'c, T>(
        conn: &'c mut PgConnection,
        sql: &'c str,
        values: Vec<Value>,
    ) -> impl Future<Output = Result<Vec<T>, sqlx::Error>> + Send + 'c
    where
        T: for<'r> FromRow<'r, Self::Row> + Send + Unpin + 'c,
    {
        async move {
            let arguments = pg_arguments(values)?;
            sqlx::query_as_with::<_, T, _>(sql, arguments)
                .fetch_all(conn)
                .await
        }
    }

    fn fetch_count<'c>(
        conn: &'c mut PgConnection,
        sql: &'c str,
        values: Vec<Value>,
    ) -> impl Future<Output = Result<Option<i64>, sqlx::Error>> + Send + 'c {
        async move {
            let arguments = pg_arguments(values)?;
            sqlx::query_scalar_with::<_, i64, _>(sql, arguments)
                .fetch_optional(conn)
                .await
        }
    }

    fn execute<'c>(
        conn: &'c mut PgConnection,
        sql: &'c str,
        values: Vec<Value>,
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send + 'c {
        async move {
            let arguments = pg_arguments(values)?;
            let result = sqlx::query_with(sql, arguments).execute(conn).await?;
            Ok(result.rows_affected())
        }
    }
}

impl Backend for MySql {
    const ENGINE: Engine = Engine::Mysql;
    const MAX_BIND_PARAMETERS: usize = 500;

    fn fetch_all<'c, T>(
        conn: &'c mut MySqlConnection,
        sql: &'c str,
        values: Vec<Value>,
    ) -> impl Future<Output = Result<Vec<T>, sqlx::Error>> + Send + 'c
    where
        T: for<'r> FromRow<'r, Self::Row> + Send + Unpin + 'c,
    {
        async move {
            let arguments = mysql_arguments(values)?;
            sqlx::query_as_with::<_, T, _>(sql, arguments)
                .fetch_all(conn)
                .await
        }
    }

    fn fetch_count<'c>(
        conn: &'c mut MySqlConnection,
        sql: &'c str,
        values: Vec<Value>,
    ) -> impl Future<Output = Result<Option<i64>, sqlx::Error>> + Send + 'c {
        async move {
            let arguments = mysql_arguments(values)?;
            sqlx::query_scalar_with::<_, i64, _>(sql, arguments)
                .fetch_optional(conn)
                .await
        }
    }

    fn execute<'c>(
        conn: &'c mut MySqlConnection,
        sql: &'c str,
        values: Vec<Value>,
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send + 'c {
        async move {
            let arguments = mysql_arguments(values)?;
            let result = sqlx::query_with(sql, arguments).execute(conn).await?;
            Ok(result.rows_affected())
        }
    }
}
