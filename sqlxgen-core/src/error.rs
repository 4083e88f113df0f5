use thiserror::Error;

/// Failures while reading catalogs or probing queries.
///
/// Each variant names the schema or file it concerns so a batch run can
/// report and skip individual inputs.
#[derive(Debug, Error)]
pub enum IntrospectError {
    #[error("invalid name pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("{schema}: {message}: {source}")]
    Schema {
        schema: String,
        message: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("{file}: {message}: {source}")]
    Query {
        file: String,
        message: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("{file}: only row-returning statements can be introspected")]
    NotRowReturning { file: String },
}

impl IntrospectError {
    pub(crate) fn schema(schema: &str, message: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Schema {
            schema: schema.to_string(),
            message,
            source,
        }
    }

    pub(crate) fn query(file: &str, message: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Query {
            file: file.to_string(),
            message,
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, IntrospectError>;
