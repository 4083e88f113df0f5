use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("multiple {entity} rows found where at most one was expected")]
    FoundMultiple { entity: &'static str },
    #[error("{operation} {entity} would have matched {count} rows")]
    WouldMatch {
        operation: &'static str,
        entity: &'static str,
        count: i64,
    },
    #[error("{operation} {entity} affected {count} rows")]
    RowsAffected {
        operation: &'static str,
        entity: &'static str,
        count: u64,
    },
    #[error("{entity} has no column {column}")]
    UnknownColumn {
        entity: &'static str,
        column: String,
    },
    #[error("{entity} has no primary key")]
    MissingPrimaryKey { entity: &'static str },
    #[error("no key columns given to identify {entity}")]
    MissingKeyColumns { entity: &'static str },
    #[error("nothing to update on {entity}")]
    NothingToUpdate { entity: &'static str },
    #[error("{operation} {entity} returned no row")]
    NoRowReturned {
        operation: &'static str,
        entity: &'static str,
    },
    #[error("invalid page {page} of size {size}")]
    InvalidPage { page: u32, size: u32 },
    #[error("{entity} binds {fields} parameters per row, the ceiling is {ceiling}")]
    BindCeiling {
        entity: &'static str,
        fields: usize,
        ceiling: usize,
    },
    #[error("no value bound for :{name}")]
    MissingBinding { name: String },
    #[error("insert statement for {entity} has no VALUES tuple")]
    NoValuesTuple { entity: &'static str },
    #[error("{operation} {entity}: {source}")]
    Storage {
        operation: &'static str,
        entity: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl StoreError {
    pub(crate) fn storage(
        operation: &'static str,
        entity: &'static str,
    ) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Storage {
            operation,
            entity,
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
