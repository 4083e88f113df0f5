use std::fmt;

use serde::{Deserialize, Serialize};

use crate::params::PlaceholderStyle;
use crate::translate::{Translate, mysql::MysqlTranslate, postgres::PgTranslate};

pub mod contract;
pub mod error;
pub mod filter;
pub mod introspect;
pub mod lexer;
pub mod model;
pub mod params;
pub mod probe;
pub mod store;
pub mod translate;

/// Database engine a project targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    Postgres,
    Mysql,
}

impl Engine {
    pub fn translator(self) -> &'static dyn Translate {
        match self {
            Engine::Postgres => &PgTranslate,
            Engine::Mysql => &MysqlTranslate,
        }
    }

    pub fn default_schemas(self) -> Vec<String> {
        match self {
            Engine::Postgres => vec!["public".to_string()],
            // MySQL has no default schema, the connection's database is used
            Engine::Mysql => vec![],
        }
    }

    pub fn placeholders(self) -> PlaceholderStyle {
        match self {
            Engine::Postgres => PlaceholderStyle::Dollar,
            Engine::Mysql => PlaceholderStyle::QuestionMark,
        }
    }

    /// Quoted identifier, embedded quote characters doubled.
    pub fn quote_ident(self, ident: &str) -> String {
        let quote = match self {
            Engine::Postgres => '"',
            Engine::Mysql => '`',
        };
        let mut quoted = String::with_capacity(ident.len() + 2);
        quoted.push(quote);
        for c in ident.chars() {
            if c == quote {
                quoted.push(quote);
            }
            quoted.push(c);
        }
        quoted.push(quote);
        quoted
    }

    /// `schema.name` with both parts quoted; an empty schema is left out.
    pub fn quote_qualified(self, schema: &str, name: &str) -> String {
        match schema.is_empty() {
            true => self.quote_ident(name),
            false => format!("{}.{}", self.quote_ident(schema), self.quote_ident(name)),
        }
    }

    pub fn sqlx_type(self) -> &'static str {
        match self {
            Engine::Postgres => "sqlx::Postgres",
            Engine::Mysql => "sqlx::MySql",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::Postgres => write!(f, "postgres"),
            Engine::Mysql => write!(f, "mysql"),
        }
    }
}
