use serde::{Deserialize, Serialize};

use crate::Engine;
use crate::params;

/// Relational description of a table. Columns are kept in canonical order:
/// primary-key columns by key position, then the rest by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub schema_name: String,
    pub table_name: String,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.table_name)
    }

    /// Quoted `schema.table` as written into statements.
    pub fn sql_name(&self, engine: Engine) -> String {
        engine.quote_qualified(&self.schema_name, &self.table_name)
    }

    pub fn primary_key(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|column| column.is_primary_key())
    }

    pub fn sort_columns(&mut self) {
        self.columns.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub column_name: String,
    /// Native type name as reported by the server, element type for arrays.
    pub type_name: String,
    pub is_array: bool,
    pub nullable: bool,
    /// 1-based position within the primary key, 0 when not part of it.
    pub pk_ordinal_position: u32,
    pub generated: bool,
}

impl Column {
    pub fn is_primary_key(&self) -> bool {
        self.pk_ordinal_position > 0
    }

    fn sort_key(&self) -> (bool, u32, &str) {
        (
            !self.is_primary_key(),
            self.pk_ordinal_position,
            &self.column_name,
        )
    }
}

/// A query file as found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySource {
    pub file_name: String,
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub type_hint: Option<String>,
    pub type_name: String,
    pub is_array: bool,
    pub target: TargetType,
}

/// An introspected query: declared parameters plus the result shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub file_name: String,
    pub sql: String,
    pub params: Vec<Parameter>,
    pub columns: Vec<Column>,
    pub returns_one: bool,
}

impl Query {
    pub fn executable_sql(&self, engine: Engine) -> String {
        params::executable_text(&self.sql, engine)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum TypeKind {
    Bool,
    Int { bits: u8 },
    Float { bits: u8 },
    Decimal,
    Text,
    Uuid,
    Timestamp { tz: bool },
    Date,
    Time,
    Json,
    Bytes,
    /// Unknown server types, carried as text.
    Opaque,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dependency {
    Chrono,
    Json,
    Decimal,
    Uuid,
}

/// Target-language type for a native column or parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetType {
    pub kind: TypeKind,
    pub nullable: bool,
    pub array: bool,
}

impl TargetType {
    pub fn new(kind: TypeKind, nullable: bool, array: bool) -> Self {
        Self {
            kind,
            nullable,
            array,
        }
    }

    pub fn dependency(&self) -> Option<Dependency> {
        match self.kind {
            TypeKind::Timestamp { .. } | TypeKind::Date | TypeKind::Time => {
                Some(Dependency::Chrono)
            }
            TypeKind::Json => Some(Dependency::Json),
            TypeKind::Decimal => Some(Dependency::Decimal),
            TypeKind::Uuid => Some(Dependency::Uuid),
            _ => None,
        }
    }

    /// Rust spelling of the non-null element type.
    pub fn element_type(&self) -> &'static str {
        match self.kind {
            TypeKind::Bool => "bool",
            TypeKind::Int { bits: 8 } => "i8",
            TypeKind::Int { bits: 16 } => "i16",
            TypeKind::Int { bits: 32 } => "i32",
            TypeKind::Int { .. } => "i64",
            TypeKind::Float { bits: 32 } => "f32",
            TypeKind::Float { .. } => "f64",
            TypeKind::Decimal => "sqlx::types::Decimal",
            TypeKind::Text | TypeKind::Opaque => "String",
            TypeKind::Uuid => "sqlx::types::Uuid",
            TypeKind::Timestamp { tz: false } => "sqlx::types::chrono::NaiveDateTime",
            TypeKind::Timestamp { tz: true } => {
                "sqlx::types::chrono::DateTime<sqlx::types::chrono::Utc>"
            }
            TypeKind::Date => "sqlx::types::chrono::NaiveDate",
            TypeKind::Time => "sqlx::types::chrono::NaiveTime",
            TypeKind::Json => "sqlx::types::JsonValue",
            TypeKind::Bytes => "Vec<u8>",
        }
    }

    /// Rust spelling of the value type, arrays wrapped in `Vec`.
    pub fn rust_type(&self) -> String {
        match self.array {
            true => format!("Vec<{}>", self.element_type()),
            false => self.element_type().to_string(),
        }
    }
}
