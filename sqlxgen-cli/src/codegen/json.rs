use std::{collections::BTreeMap, error::Error};

use serde::Serialize;
use sqlxgen_core::{
    Engine,
    contract::EntitySql,
    model::{Column, Parameter, Query, Table, TargetType},
    translate::Translate,
};

use super::CodeGen;

#[derive(Debug, Clone, Serialize)]
pub struct TypedColumn {
    #[serde(flatten)]
    pub column: Column,
    pub target: TargetType,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableDefinition {
    pub schema_name: String,
    pub table_name: String,
    pub columns: Vec<TypedColumn>,
    pub primary_key: Vec<String>,
    pub insert: String,
    pub find_all: String,
    pub find_by_pk: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryDefinition {
    pub file_name: String,
    pub query: String,
    pub returns_one: bool,
    pub inputs: Vec<Parameter>,
    pub outputs: Vec<TypedColumn>,
}

#[derive(Serialize)]
struct Document<'a> {
    engine: Engine,
    tables: &'a BTreeMap<String, TableDefinition>,
    queries: &'a BTreeMap<String, QueryDefinition>,
}

pub struct JsonCodeGen {
    engine: Engine,
    translate: &'static dyn Translate,
    tables: BTreeMap<String, TableDefinition>,
    queries: BTreeMap<String, QueryDefinition>,
}

impl JsonCodeGen {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            translate: engine.translator(),
            tables: BTreeMap::new(),
            queries: BTreeMap::new(),
        }
    }

    fn typed(&self, columns: &[Column]) -> Vec<TypedColumn> {
        columns
            .iter()
            .map(|column| TypedColumn {
                target: self.translate.column_target(column),
                column: column.clone(),
            })
            .collect()
    }
}

impl CodeGen for JsonCodeGen {
    fn push_table(&mut self, table: &Table) -> Result<(), Box<dyn Error>> {
        let sql = EntitySql::render(table, self.translate);
        let definition = TableDefinition {
            schema_name: table.schema_name.clone(),
            table_name: table.table_name.clone(),
            columns: self.typed(&table.columns),
            primary_key: sql.primary_key,
            insert: sql.insert,
            find_all: sql.find_all,
            find_by_pk: sql.find_by_pk,
        };
        self.tables.insert(table.full_name(), definition);
        Ok(())
    }

    fn push_query(&mut self, name: &str, query: &Query) -> Result<(), Box<dyn Error>> {
        let definition = QueryDefinition {
            file_name: query.file_name.clone(),
            query: query.executable_sql(self.engine),
            returns_one: query.returns_one,
            inputs: query.params.clone(),
            outputs: self.typed(&query.columns),
        };
        self.queries.insert(name.to_string(), definition);
        Ok(())
    }

    fn finalize(&self) -> Result<String, Box<dyn Error>> {
        let document = Document {
            engine: self.engine,
            tables: &self.tables,
            queries: &self.queries,
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }
}
