pub mod mysql;
pub mod postgres;

use crate::Engine;
use crate::model::{Column, TargetType, TypeKind};

/// Per-engine mapping from native types to target types, plus the SQL
/// spellings that depend on them.
pub trait Translate: Send + Sync {
    fn engine(&self) -> Engine;

    fn target(&self, type_name: &str, nullable: bool, array: bool) -> TargetType;

    /// Type a bare `:col` must be cast to before the server accepts a text
    /// value for it, `None` when the server converts on its own.
    fn bind_cast(&self, column: &Column) -> Option<String>;

    /// `(<null check on :col> OR col = :col)` for the all-fields predicate.
    fn optional_eq(&self, column: &Column) -> String;

    /// Type to cast unknown server types to when reading them back.
    fn text_cast(&self) -> &'static str;

    /// Insert statement for a table with no insertable columns.
    fn insert_defaults(&self, table_name: &str) -> String;

    fn column_target(&self, column: &Column) -> TargetType {
        self.target(&column.type_name, column.nullable, column.is_array)
    }

    fn quote(&self, ident: &str) -> String {
        self.engine().quote_ident(ident)
    }

    /// Placeholder for a column value in `VALUES`, `SET` and key predicates.
    fn bind_expr(&self, column: &Column) -> String {
        let name = &column.column_name;
        match self.bind_cast(column) {
            Some(cast) => format!("CAST(:{name} AS {cast})"),
            None => format!(":{name}"),
        }
    }

    /// Select-list entry for a column; opaque values are read as text.
    fn select_expr(&self, column: &Column) -> String {
        let name = self.quote(&column.column_name);
        let target = self.column_target(column);
        match (target.kind, target.array) {
            (TypeKind::Opaque, true) => format!("CAST({name} AS {}[]) AS {name}", self.text_cast()),
            (TypeKind::Opaque, false) => format!("CAST({name} AS {}) AS {name}", self.text_cast()),
            _ => name,
        }
    }
}

/// Strips length/precision arguments: `numeric(10, 2)` becomes `numeric`.
pub(crate) fn strip_modifiers(type_name: &str) -> String {
    let lowered = type_name.trim().to_lowercase();
    match (lowered.find('('), lowered.find(')')) {
        (Some(open), Some(close)) if open < close => {
            let head = lowered[..open].trim_end();
            let tail = lowered[close + 1..].trim_start();
            match tail.is_empty() {
                true => head.to_string(),
                false => format!("{head} {tail}"),
            }
        }
        _ => lowered,
    }
}
