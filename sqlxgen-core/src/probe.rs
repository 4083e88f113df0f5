//! Query text rewrites used to discover result shapes without returning rows.

use crate::Engine;
use crate::lexer::{self, Token, TokenKind};

/// Temporary relation created from a probed query.
pub const PROBE_RELATION: &str = "sqlxgen_probe";

/// Keywords that end a `WHERE` predicate at its own nesting depth.
const TERMINATORS: &[&str] = &[
    "limit",
    "offset",
    "having",
    "window",
    "union",
    "intersect",
    "except",
    "returning",
    "fetch",
];

/// Statements that can feed `create temp table ... as`.
const ROW_RETURNING: &[&str] = &["select", "with", "values", "table"];

fn next_significant<'a, 'b>(tokens: &'b [Token<'a>], from: usize) -> Option<&'b Token<'a>> {
    tokens.iter().skip(from).find(|token| !token.is_trivia())
}

fn is_terminator(tokens: &[Token<'_>], idx: usize) -> bool {
    let token = &tokens[idx];
    if token.kind != TokenKind::Word {
        return false;
    }
    if token.is_keyword("order") || token.is_keyword("group") {
        return next_significant(tokens, idx + 1).is_some_and(|next| next.is_keyword("by"));
    }
    if token.is_keyword("for") {
        return next_significant(tokens, idx + 1).is_some_and(|next| {
            ["update", "share", "no", "key"]
                .iter()
                .any(|keyword| next.is_keyword(keyword))
        });
    }
    TERMINATORS.iter().any(|keyword| token.is_keyword(keyword))
}

/// Index of the token ending the predicate that starts at `from`.
fn predicate_end(tokens: &[Token<'_>], from: usize) -> usize {
    let mut depth = 0usize;
    for idx in from..tokens.len() {
        match tokens[idx].kind {
            TokenKind::OpenParen => depth += 1,
            TokenKind::CloseParen if depth == 0 => return idx,
            TokenKind::CloseParen => depth -= 1,
            TokenKind::Semicolon if depth == 0 => return idx,
            TokenKind::Word if depth == 0 && is_terminator(tokens, idx) => return idx,
            _ => {}
        }
    }
    tokens.len()
}

/// Rewrites every `WHERE <p>` into `WHERE false and (<p>)`, nested filters included.
///
/// The rewritten statement keeps its full shape, placeholders included, but
/// matches no rows.
pub fn neutralize_where(query: &str, engine: Engine) -> String {
    let tokens = lexer::tokenize(query, engine);
    let mut out = String::with_capacity(query.len() + 32);
    let mut head = 0;
    let mut idx = 0;
    while idx < tokens.len() {
        let token = tokens[idx];
        if !token.is_keyword("where") {
            idx += 1;
            continue;
        }

        let end = predicate_end(&tokens, idx + 1);
        let predicate_start = token.end();
        let predicate_end = tokens.get(end).map_or(query.len(), |token| token.start);
        let predicate = neutralize_where(&query[predicate_start..predicate_end], engine);

        out.push_str(&query[head..token.start]);
        out.push_str(token.text);
        out.push_str(" false and (\n");
        out.push_str(predicate.trim());
        out.push_str("\n)\n");

        head = predicate_end;
        idx = end;
    }
    out.push_str(&query[head..]);
    out
}

/// Whether the statement's leading keyword produces rows.
pub fn is_row_returning(query: &str, engine: Engine) -> bool {
    let tokens = lexer::tokenize(query, engine);
    let Some(first) = tokens
        .iter()
        .find(|token| !token.is_trivia() && token.kind != TokenKind::OpenParen)
    else {
        return false;
    };
    ROW_RETURNING.iter().any(|keyword| first.is_keyword(keyword))
}

/// `select * from (<query>) probe` so any row-returning statement can seed a table.
pub fn wrap(query: &str) -> String {
    format!("select * from (\n{query}\n) {PROBE_RELATION}_source")
}
