use std::sync::LazyLock;

use regex::Regex;

use crate::Engine;
use crate::lexer::{self, TokenKind};

/// `-- :name type: <native type>` declares the type of a placeholder.
static TYPE_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^--\s*:([A-Za-z_][A-Za-z0-9_$]*)\s+type:\s*(.+?)\s*$")
        .expect("type hint pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredParameter {
    pub name: String,
    pub type_hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1`, `$2`, ... with one index per distinct name.
    Dollar,
    /// `?` per occurrence.
    QuestionMark,
}

/// Positional query text plus the names to bind, in bind order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParametrizedQuery {
    pub raw_query: String,
    pub params: Vec<String>,
}

/// Distinct placeholder names in first-occurrence order with any type hints.
pub fn extract_parameters(query: &str, engine: Engine) -> Vec<DeclaredParameter> {
    let tokens = lexer::tokenize(query, engine);

    let hints: Vec<(&str, &str)> = tokens
        .iter()
        .filter(|token| token.kind == TokenKind::LineComment)
        .filter_map(|token| TYPE_HINT.captures(token.text))
        .filter_map(|caps| Some((caps.get(1)?.as_str(), caps.get(2)?.as_str())))
        .collect();

    let mut params: Vec<DeclaredParameter> = vec![];
    for name in tokens.iter().filter_map(|token| token.placeholder_name()) {
        if params.iter().any(|param| param.name == name) {
            continue;
        }
        let type_hint = hints
            .iter()
            .find(|(hinted, _)| *hinted == name)
            .map(|(_, hint)| hint.to_string());
        params.push(DeclaredParameter {
            name: name.to_string(),
            type_hint,
        });
    }
    params
}

pub fn strip_comments(query: &str, engine: Engine) -> String {
    lexer::tokenize(query, engine)
        .iter()
        .filter(|token| !matches!(token.kind, TokenKind::LineComment | TokenKind::BlockComment))
        .map(|token| token.text)
        .collect()
}

/// Query text as sent to the server: no comments, no trailing terminator.
pub fn executable_text(query: &str, engine: Engine) -> String {
    strip_comments(query, engine)
        .trim()
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .to_string()
}

/// `true` when the statement ends in `LIMIT 1`.
pub fn returns_one(query: &str, engine: Engine) -> bool {
    let tokens = lexer::tokenize(query, engine);
    let mut significant = tokens
        .iter()
        .rev()
        .filter(|token| !token.is_trivia() && token.kind != TokenKind::Semicolon);
    match (significant.next(), significant.next()) {
        (Some(count), Some(limit)) => count.text == "1" && limit.is_keyword("limit"),
        _ => false,
    }
}

pub fn to_positional(query: &str, engine: Engine) -> ParametrizedQuery {
    let mut params: Vec<String> = vec![];
    let raw_query = lexer::replace_placeholders(query, engine, |name, _| match engine.placeholders() {
        PlaceholderStyle::Dollar => {
            let idx = match params.iter().position(|param| param == name) {
                Some(idx) => idx,
                None => {
                    params.push(name.to_string());
                    params.len() - 1
                }
            };
            format!("${}", idx + 1)
        }
        PlaceholderStyle::QuestionMark => {
            params.push(name.to_string());
            "?".to_string()
        }
    });
    ParametrizedQuery { raw_query, params }
}
