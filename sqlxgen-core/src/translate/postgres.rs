use super::{Translate, strip_modifiers};
use crate::Engine;
use crate::model::{Column, TargetType, TypeKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct PgTranslate;

/// Lowercased element type name and whether the spelling denotes an array.
///
/// Accepts catalog names (`_int4`), driver names (`INT4[]`) and SQL
/// spellings (`integer[]`, `character varying(20)`).
pub fn normalize_type_name(type_name: &str) -> (String, bool) {
    let mut name = strip_modifiers(type_name);
    let mut array = false;
    if let Some(element) = name.strip_suffix("[]") {
        name = element.trim_end().to_string();
        array = true;
    }
    if let Some(element) = name.strip_prefix('_') {
        name = element.to_string();
        array = true;
    }
    (name, array)
}

/// `schema.type` as reported for types outside `pg_catalog`, case kept.
fn qualified_parts(type_name: &str) -> Option<(&str, &str)> {
    let trimmed = type_name.trim();
    let trimmed = trimmed.strip_suffix("[]").unwrap_or(trimmed).trim_end();
    trimmed.split_once('.')
}

/// Spelling of a type inside `CAST(... AS <type>)`: built-ins uppercased,
/// schema-qualified names quoted part by part.
pub fn cast_type(type_name: &str, array: bool) -> String {
    let (name, spelled_array) = normalize_type_name(type_name);
    let spelled = match qualified_parts(type_name) {
        Some((schema, name)) => Engine::Postgres.quote_qualified(schema, name),
        None => name.to_uppercase(),
    };
    match array || spelled_array {
        true => format!("{spelled}[]"),
        false => spelled,
    }
}

fn kind_of(name: &str) -> TypeKind {
    // extension types keep their meaning whichever schema they live in
    let name = name.rsplit('.').next().unwrap_or(name);
    match name {
        "bool" | "boolean" => TypeKind::Bool,
        "int2" | "smallint" | "smallserial" | "serial2" => TypeKind::Int { bits: 16 },
        "int4" | "int" | "integer" | "serial" | "serial4" => TypeKind::Int { bits: 32 },
        "int8" | "bigint" | "bigserial" | "serial8" => TypeKind::Int { bits: 64 },
        "float4" | "real" => TypeKind::Float { bits: 32 },
        "float8" | "double precision" => TypeKind::Float { bits: 64 },
        "numeric" | "decimal" => TypeKind::Decimal,
        "text" | "varchar" | "character varying" | "bpchar" | "char" | "character" | "name"
        | "citext" => TypeKind::Text,
        "uuid" => TypeKind::Uuid,
        "timestamp" | "timestamp without time zone" => TypeKind::Timestamp { tz: false },
        "timestamptz" | "timestamp with time zone" => TypeKind::Timestamp { tz: true },
        "date" => TypeKind::Date,
        "time" | "time without time zone" => TypeKind::Time,
        "json" | "jsonb" => TypeKind::Json,
        "bytea" => TypeKind::Bytes,
        _ => TypeKind::Opaque,
    }
}

impl Translate for PgTranslate {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    fn target(&self, type_name: &str, nullable: bool, array: bool) -> TargetType {
        let (name, spelled_array) = normalize_type_name(type_name);
        TargetType::new(kind_of(&name), nullable, array || spelled_array)
    }

    fn bind_cast(&self, column: &Column) -> Option<String> {
        (self.column_target(column).kind == TypeKind::Opaque)
            .then(|| cast_type(&column.type_name, column.is_array))
    }

    fn optional_eq(&self, column: &Column) -> String {
        let cast = format!(
            "CAST(:{} AS {})",
            column.column_name,
            cast_type(&column.type_name, column.is_array)
        );
        format!("({cast} IS NULL OR {} = {cast})", self.quote(&column.column_name))
    }

    fn text_cast(&self) -> &'static str {
        "TEXT"
    }

    fn insert_defaults(&self, table_name: &str) -> String {
        format!("INSERT INTO {table_name} DEFAULT VALUES")
    }
}
