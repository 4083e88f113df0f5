use std::error::Error;
use std::sync::LazyLock;

use regex::Regex;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

static NON_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("identifier pattern is valid"));

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "static", "struct", "super", "trait", "true", "type",
    "unsafe", "use", "where", "while", "abstract", "become", "box", "do", "final", "gen",
    "macro", "override", "priv", "try", "typeof", "unsized", "virtual", "yield",
];

pub fn init_logging(debug: bool) -> Result<(), Box<dyn Error>> {
    let level = match debug {
        true => Level::DEBUG,
        false => Level::WARN,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn words(name: &str) -> Vec<String> {
    let mut words = vec![];
    for chunk in NON_IDENT.split(name).filter(|chunk| !chunk.is_empty()) {
        let mut word = String::new();
        let mut previous_lower = false;
        for char in chunk.chars() {
            // camelCase boundaries split words as well
            if char.is_ascii_uppercase() && previous_lower && !word.is_empty() {
                words.push(std::mem::take(&mut word));
            }
            previous_lower = char.is_ascii_lowercase() || char.is_ascii_digit();
            word.push(char.to_ascii_lowercase());
        }
        if !word.is_empty() {
            words.push(word);
        }
    }
    words
}

pub fn to_pascal(name: &str) -> String {
    let pascal: String = words(name)
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    match pascal.chars().next() {
        Some(first) if first.is_ascii_alphabetic() => pascal,
        Some(_) => format!("T{pascal}"),
        None => "Unnamed".to_string(),
    }
}

/// Rust field name for a column; keywords get a trailing underscore.
pub fn to_field_ident(name: &str) -> String {
    let snake = words(name).join("_");
    if snake.is_empty() {
        return "column".to_string();
    }
    if snake.starts_with(|char: char| char.is_ascii_digit()) {
        return format!("_{snake}");
    }
    if KEYWORDS.contains(&snake.as_str()) {
        return format!("{snake}_");
    }
    snake
}

/// Suffixes repeated identifiers so every one is unique.
pub fn unique_idents(idents: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = vec![];
    for ident in idents {
        let mut candidate = ident.clone();
        let mut counter = 2;
        while seen.contains(&candidate) {
            candidate = format!("{ident}_{counter}");
            counter += 1;
        }
        seen.push(candidate);
    }
    seen
}

/// `r#"..."#` literal with enough hashes for the content.
pub fn raw_string_literal(text: &str) -> String {
    let mut hashes = 1;
    while text.contains(&format!("\"{}", "#".repeat(hashes))) {
        hashes += 1;
    }
    let hashes = "#".repeat(hashes);
    format!("r{hashes}\"{text}\"{hashes}")
}
