//! A deliberately small SQL tokenizer.
//!
//! Queries are treated as opaque text; the lexer only knows enough to keep
//! rewrites out of string literals, quoted identifiers and comments. Quoting
//! rules differ per engine: MySQL strings take backslash escapes and `#`
//! starts a comment, Postgres has `E'...'` escape strings and `$tag$` bodies.

use crate::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    Number,
    /// `:name` bind placeholder. `::` casts are never placeholders.
    Placeholder,
    /// `'...'`, `"..."`, `` `...` ``, `E'...'` or `$tag$...$tag$`.
    Quoted,
    LineComment,
    BlockComment,
    OpenParen,
    CloseParen,
    Semicolon,
    Whitespace,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
}

impl<'a> Token<'a> {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    /// Whitespace and comments carry no meaning for rewrites.
    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment
        )
    }

    /// Placeholder name without the leading colon.
    pub fn placeholder_name(&self) -> Option<&'a str> {
        match self.kind {
            TokenKind::Placeholder => Some(&self.text[1..]),
            _ => None,
        }
    }
}

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_ident_continue(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$'
}

/// End of the quoted span opened at `start`. Doubled quotes always escape;
/// `backslash` additionally skips the byte after every `\`.
fn quoted_end(bytes: &[u8], start: usize, backslash: bool) -> usize {
    let quote = bytes[start];
    let mut idx = start + 1;
    while idx < bytes.len() {
        if backslash && bytes[idx] == b'\\' {
            idx += 2;
            continue;
        }
        if bytes[idx] == quote {
            if bytes.get(idx + 1) == Some(&quote) {
                idx += 2;
                continue;
            }
            return idx + 1;
        }
        idx += 1;
    }
    bytes.len().min(idx)
}

/// Length of the `$tag$` opener at `start`, if there is one.
fn dollar_tag_len(bytes: &[u8], start: usize) -> Option<usize> {
    let mut idx = start + 1;
    if bytes.get(idx).is_some_and(|byte| is_ident_start(*byte)) {
        while idx < bytes.len() && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_') {
            idx += 1;
        }
    }
    (bytes.get(idx) == Some(&b'$')).then_some(idx + 1 - start)
}

fn dollar_quoted_end(sql: &str, start: usize, tag_len: usize) -> usize {
    let tag = &sql[start..start + tag_len];
    let body = start + tag_len;
    sql[body..]
        .find(tag)
        .map_or(sql.len(), |offset| body + offset + tag_len)
}

fn line_end(sql: &str, start: usize) -> usize {
    sql[start..].find('\n').map_or(sql.len(), |offset| start + offset)
}

pub fn tokenize(sql: &str, engine: Engine) -> Vec<Token<'_>> {
    let mysql = engine == Engine::Mysql;
    let bytes = sql.as_bytes();
    let mut tokens = vec![];
    let mut idx = 0;
    while idx < bytes.len() {
        let start = idx;
        let kind = match bytes[idx] {
            b'-' if bytes.get(idx + 1) == Some(&b'-') => {
                idx = line_end(sql, idx);
                TokenKind::LineComment
            }
            b'#' if mysql => {
                idx = line_end(sql, idx);
                TokenKind::LineComment
            }
            b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                idx = sql[idx + 2..]
                    .find("*/")
                    .map_or(sql.len(), |offset| idx + 2 + offset + 2);
                TokenKind::BlockComment
            }
            b'\'' | b'"' => {
                idx = quoted_end(bytes, idx, mysql);
                TokenKind::Quoted
            }
            b'`' => {
                idx = quoted_end(bytes, idx, false);
                TokenKind::Quoted
            }
            b'$' if !mysql => match dollar_tag_len(bytes, idx) {
                Some(tag_len) => {
                    idx = dollar_quoted_end(sql, idx, tag_len);
                    TokenKind::Quoted
                }
                None => {
                    idx += 1;
                    TokenKind::Other
                }
            },
            b'(' => {
                idx += 1;
                TokenKind::OpenParen
            }
            b')' => {
                idx += 1;
                TokenKind::CloseParen
            }
            b';' => {
                idx += 1;
                TokenKind::Semicolon
            }
            b':' if bytes.get(idx + 1) == Some(&b':') => {
                idx += 2;
                TokenKind::Other
            }
            b':' if bytes.get(idx + 1).is_some_and(|byte| is_ident_start(*byte)) => {
                idx += 1;
                while idx < bytes.len() && is_ident_continue(bytes[idx]) {
                    idx += 1;
                }
                TokenKind::Placeholder
            }
            byte if byte.is_ascii_whitespace() => {
                while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
                    idx += 1;
                }
                TokenKind::Whitespace
            }
            byte if byte.is_ascii_digit() => {
                while idx < bytes.len() && (bytes[idx].is_ascii_digit() || bytes[idx] == b'.') {
                    idx += 1;
                }
                TokenKind::Number
            }
            b'e' | b'E' if !mysql && bytes.get(idx + 1) == Some(&b'\'') => {
                idx = quoted_end(bytes, idx + 1, true);
                TokenKind::Quoted
            }
            byte if is_ident_start(byte) => {
                while idx < bytes.len() && is_ident_continue(bytes[idx]) {
                    idx += 1;
                }
                TokenKind::Word
            }
            _ => {
                idx += sql[idx..].chars().next().map_or(1, char::len_utf8);
                TokenKind::Other
            }
        };
        tokens.push(Token {
            kind,
            text: &sql[start..idx],
            start,
        });
    }
    tokens
}

/// Rewrites every placeholder with `replace(name, previous significant token)`.
pub fn replace_placeholders(
    sql: &str,
    engine: Engine,
    mut replace: impl FnMut(&str, Option<&Token<'_>>) -> String,
) -> String {
    let tokens = tokenize(sql, engine);
    let mut out = String::with_capacity(sql.len());
    let mut previous: Option<Token<'_>> = None;
    for token in &tokens {
        match token.placeholder_name() {
            Some(name) => out.push_str(&replace(name, previous.as_ref())),
            None => out.push_str(token.text),
        }
        if !token.is_trivia() {
            previous = Some(*token);
        }
    }
    out
}
