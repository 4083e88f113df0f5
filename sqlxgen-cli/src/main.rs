pub mod codegen;
mod commands;
pub mod config;
mod discover;
mod emit;
mod schema;
pub mod utils;

use std::error::Error;

use clap::*;
use commands::{Generate, Init, Schema};

/// Generates typed sqlx models from a live database schema and query files.
#[derive(Parser)]
#[command(name = "sqlxgen", bin_name = "sqlxgen", version)]
enum Command {
    Generate(Generate),
    Schema(Schema),
    Init(Init),
}

fn main() -> Result<(), Box<dyn Error>> {
    let command = Command::parse();
    match command {
        Command::Generate(args) => args.run(),
        Command::Schema(args) => args.run(),
        Command::Init(args) => args.run(),
    }
}
