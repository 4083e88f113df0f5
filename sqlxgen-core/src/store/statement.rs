//! SQL text assembly for runtime operations. Nothing here touches a connection.

use std::collections::HashMap;

use super::error::{Result, StoreError};
use super::field::Binding;
use super::value::Value;
use super::{OrderBy, Page};
use crate::Engine;
use crate::lexer::{self, TokenKind};
use crate::params;

/// Positional SQL with values in bind order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub values: Vec<Value>,
}

impl Statement {
    pub fn compile(
        sql: &str,
        engine: Engine,
        lookup: impl Fn(&str) -> Option<Value>,
    ) -> Result<Self> {
        let query = params::to_positional(sql, engine);
        let values = query
            .params
            .iter()
            .map(|name| {
                lookup(name).ok_or_else(|| StoreError::MissingBinding { name: name.clone() })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            sql: query.raw_query,
            values,
        })
    }

    pub fn with_bindings(sql: &str, engine: Engine, bindings: &[Binding]) -> Result<Self> {
        Self::compile(sql, engine, |name| {
            bindings
                .iter()
                .find(|binding| binding.column == name)
                .map(|binding| binding.value.clone())
        })
    }
}

/// Statement text without surrounding whitespace or the trailing `;`.
pub fn trim_statement(sql: &str) -> &str {
    sql.trim()
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

pub fn with_suffix(sql: &str, suffix: &str) -> String {
    format!("{}{suffix}", trim_statement(sql))
}

/// How an entity's columns and their placeholders are written.
#[derive(Debug, Clone, Copy)]
pub struct Spelling<'a> {
    pub engine: Engine,
    /// `(column, type)` pairs whose placeholders are cast.
    pub casts: &'a [(&'a str, &'a str)],
}

impl Spelling<'_> {
    pub fn column(&self, name: &str) -> String {
        self.engine.quote_ident(name)
    }

    pub fn placeholder(&self, name: &str) -> String {
        match self.casts.iter().find(|(column, _)| *column == name) {
            Some((_, cast)) => format!("CAST(:{name} AS {cast})"),
            None => format!(":{name}"),
        }
    }

    /// `"col" = :col`
    pub fn equals(&self, name: &str) -> String {
        format!("{} = {}", self.column(name), self.placeholder(name))
    }
}

/// `\n  col = :col, ...` over present fields outside `keys` and `generated`.
pub fn set_clause(
    bindings: &[Binding],
    keys: &[&str],
    generated: &[&str],
    spelling: Spelling<'_>,
) -> Option<String> {
    let assignments: Vec<String> = bindings
        .iter()
        .filter(|binding| binding.present)
        .filter(|binding| !keys.contains(&binding.column) && !generated.contains(&binding.column))
        .map(|binding| format!("\n  {}", spelling.equals(binding.column)))
        .collect();
    (!assignments.is_empty()).then(|| assignments.join(","))
}

pub fn key_where(keys: &[&str], spelling: Spelling<'_>) -> String {
    format!(
        "\nWHERE {}",
        keys.iter()
            .map(|key| spelling.equals(key))
            .collect::<Vec<_>>()
            .join("\n  AND ")
    )
}

/// `SELECT COUNT(*)` over the rows `sql` returns.
pub fn counted(sql: &str) -> String {
    format!("SELECT COUNT(*) FROM (\n{}\n) counted", trim_statement(sql))
}

pub fn page_sql(find_all: &str, page: Page, order: &[OrderBy], engine: Engine) -> String {
    let order_by = match order.is_empty() {
        true => "1".to_string(),
        false => order
            .iter()
            .map(|order| order.to_sql(engine))
            .collect::<Vec<_>>()
            .join(", "),
    };
    format!(
        "{}\nORDER BY {order_by}\nLIMIT {} OFFSET {}",
        trim_statement(find_all),
        page.size,
        page.offset()
    )
}

/// Rows per bulk statement, `None` when one row alone exceeds the ceiling.
pub fn batch_size(max_parameters: usize, fields: usize) -> Option<usize> {
    if fields == 0 {
        return Some(usize::MAX);
    }
    let size = max_parameters / fields;
    (size > 0).then_some(size)
}

pub fn row_placeholder(name: &str, row: usize) -> String {
    format!("{name}__{row}")
}

/// Repeats the first `VALUES (...)` tuple once per row, suffixing every
/// placeholder inside it with the row index.
pub fn expand_values(insert: &str, rows: usize, engine: Engine) -> Option<String> {
    let tokens = lexer::tokenize(insert, engine);
    let mut depth = 0usize;
    let mut values_at = None;
    for (idx, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::OpenParen => depth += 1,
            TokenKind::CloseParen => depth = depth.saturating_sub(1),
            TokenKind::Word if depth == 0 && token.is_keyword("values") => {
                values_at = Some(idx);
                break;
            }
            _ => {}
        }
    }

    let open = tokens
        .iter()
        .enumerate()
        .skip(values_at? + 1)
        .find(|(_, token)| !token.is_trivia())
        .filter(|(_, token)| token.kind == TokenKind::OpenParen)
        .map(|(idx, _)| idx)?;

    let mut depth = 0usize;
    let mut close = None;
    for (idx, token) in tokens.iter().enumerate().skip(open) {
        match token.kind {
            TokenKind::OpenParen => depth += 1,
            TokenKind::CloseParen => {
                depth -= 1;
                if depth == 0 {
                    close = Some(idx);
                    break;
                }
            }
            _ => {}
        }
    }
    let close = close?;

    let tuples: Vec<String> = (0..rows)
        .map(|row| {
            tokens[open..=close]
                .iter()
                .map(|token| match token.placeholder_name() {
                    Some(name) => format!(":{}", row_placeholder(name, row)),
                    None => token.text.to_string(),
                })
                .collect()
        })
        .collect();

    Some(format!(
        "{}{}{}",
        &insert[..tokens[open].start],
        tuples.join(",\n"),
        &insert[tokens[close].end()..]
    ))
}

/// Values for an expanded insert keyed by row placeholder name.
pub fn row_values(rows: impl IntoIterator<Item = Vec<Binding>>) -> HashMap<String, Value> {
    rows.into_iter()
        .enumerate()
        .flat_map(|(row, bindings)| {
            bindings
                .into_iter()
                .map(move |binding| (row_placeholder(binding.column, row), binding.value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Engine::{Mysql, Postgres};
    use crate::store::field::Field;

    const PG: Spelling<'static> = Spelling {
        engine: Postgres,
        casts: &[],
    };

    fn bindings() -> Vec<Binding> {
        vec![
            Field::Value(1).bind("id"),
            Field::Value("Ana".to_string()).bind("name"),
            Field::<String>::Null.bind("nickname"),
            Field::<i32>::Absent.bind("age"),
        ]
    }

    #[test]
    fn compile_binds_by_name() {
        let statement = Statement::with_bindings(
            "select * from t where (CAST(:name AS TEXT) IS NULL OR name = :name) and id = :id",
            Postgres,
            &bindings(),
        )
        .unwrap();
        assert_eq!(
            statement.sql,
            "select * from t where (CAST($1 AS TEXT) IS NULL OR name = $1) and id = $2"
        );
        assert_eq!(
            statement.values,
            vec![Value::Text(Some("Ana".to_string())), Value::Int(Some(1))]
        );

        let statement = Statement::with_bindings(
            "select * from t where (:name IS NULL OR name = :name)",
            Mysql,
            &bindings(),
        )
        .unwrap();
        assert_eq!(statement.values.len(), 2);
    }

    #[test]
    fn compile_reports_missing_binding() {
        let err = Statement::with_bindings("select :nope", Postgres, &bindings()).unwrap_err();
        assert!(matches!(err, StoreError::MissingBinding { name } if name == "nope"));
    }

    #[test]
    fn set_clause_skips_absent_keys_and_generated() {
        let set = set_clause(&bindings(), &["id"], &[], PG).unwrap();
        assert_eq!(set, "\n  \"name\" = :name,\n  \"nickname\" = :nickname");

        let set = set_clause(&bindings(), &["id"], &["nickname"], PG).unwrap();
        assert_eq!(set, "\n  \"name\" = :name");

        assert_eq!(set_clause(&bindings(), &["id", "name"], &["nickname"], PG), None);
    }

    #[test]
    fn set_clause_casts_opaque_columns() {
        let spelling = Spelling {
            engine: Postgres,
            casts: &[("nickname", "\"public\".\"mood\"")],
        };
        let set = set_clause(&bindings(), &["id"], &[], spelling).unwrap();
        assert_eq!(
            set,
            "\n  \"name\" = :name,\n  \"nickname\" = CAST(:nickname AS \"public\".\"mood\")"
        );

        let spelling = Spelling {
            engine: Mysql,
            casts: &[],
        };
        let set = set_clause(&bindings(), &["id"], &["nickname"], spelling).unwrap();
        assert_eq!(set, "\n  `name` = :name");
    }

    #[test]
    fn alternate_key_predicate() {
        assert_eq!(key_where(&["email"], PG), "\nWHERE \"email\" = :email");
        assert_eq!(
            key_where(&["tenant", "order"], PG),
            "\nWHERE \"tenant\" = :tenant\n  AND \"order\" = :order"
        );
    }

    #[test]
    fn count_wraps_the_query() {
        assert_eq!(
            counted("select a from t where b = :b;\n"),
            "SELECT COUNT(*) FROM (\nselect a from t where b = :b\n) counted"
        );
    }

    #[test]
    fn page_clauses() {
        let sql = page_sql("SELECT a FROM t\nWHERE TRUE;", Page::new(3, 20), &[], Postgres);
        assert_eq!(sql, "SELECT a FROM t\nWHERE TRUE\nORDER BY 1\nLIMIT 20 OFFSET 40");

        let order = [OrderBy::desc("a"), OrderBy::asc("order")];
        let sql = page_sql("SELECT a FROM t", Page::new(1, 5), &order, Postgres);
        assert!(sql.ends_with("ORDER BY \"a\" DESC, \"order\" ASC\nLIMIT 5 OFFSET 0"));
        let sql = page_sql("SELECT a FROM t", Page::new(1, 5), &order, Mysql);
        assert!(sql.ends_with("ORDER BY `a` DESC, `order` ASC\nLIMIT 5 OFFSET 0"));
    }

    #[test]
    fn batches_cover_all_rows() {
        assert_eq!(batch_size(10, 3), Some(3));
        assert_eq!(10usize.div_ceil(batch_size(10, 3).unwrap()), 4);
        assert_eq!(batch_size(500, 7), Some(71));
        assert_eq!(batch_size(5, 6), None);
        assert_eq!(batch_size(5, 0), Some(usize::MAX));
    }

    #[test]
    fn values_tuple_expansion() {
        let insert = "INSERT INTO t (\n  a,\n  b\n)\nVALUES (\n  :a,\n  lower(:b)\n)\nRETURNING\n  a,\n  b;";
        let expanded = expand_values(insert, 2, Postgres).unwrap();
        assert_eq!(
            expanded,
            "INSERT INTO t (\n  a,\n  b\n)\nVALUES (\n  :a__0,\n  lower(:b__0)\n),\n(\n  :a__1,\n  lower(:b__1)\n)\nRETURNING\n  a,\n  b;"
        );
        assert_eq!(expand_values("INSERT INTO t DEFAULT VALUES", 2, Postgres), None);

        let insert = "INSERT INTO t (a) VALUES (CAST(:a AS \"public\".\"mood\"))";
        assert_eq!(
            expand_values(insert, 2, Postgres).unwrap(),
            "INSERT INTO t (a) VALUES (CAST(:a__0 AS \"public\".\"mood\")),\n(CAST(:a__1 AS \"public\".\"mood\"))"
        );
    }

    #[test]
    fn row_values_are_keyed_per_row() {
        let values = row_values(vec![
            vec![Field::Value(1).bind("a")],
            vec![Field::Value(2).bind("a")],
        ]);
        assert_eq!(values.get("a__0"), Some(&Value::Int(Some(1))));
        assert_eq!(values.get("a__1"), Some(&Value::Int(Some(2))));
    }
}
