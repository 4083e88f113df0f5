pub mod json;
pub mod rust;

use std::error::Error;

use sqlxgen_core::model::{Query, Table};

pub trait CodeGen {
    fn push_table(&mut self, table: &Table) -> Result<(), Box<dyn Error>>;

    /// `name` is the query file's stem.
    fn push_query(&mut self, name: &str, query: &Query) -> Result<(), Box<dyn Error>>;

    fn finalize(&self) -> Result<String, Box<dyn Error>>;
}
