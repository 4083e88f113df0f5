use std::{
    collections::{BTreeSet, HashSet},
    error::Error,
    fmt::Write,
};

use sqlxgen_core::{
    Engine,
    contract::EntitySql,
    model::{Column, Dependency, Query, Table, TargetType, TypeKind},
    translate::Translate,
};

use super::CodeGen;
use crate::utils::{raw_string_literal, to_field_ident, to_pascal, unique_idents};

const INDENT: &str = "    ";

/// Generates entity structs implementing `Entity` and argument/row structs
/// implementing `Queryable`.
pub struct RustCodeGen {
    engine: Engine,
    translate: &'static dyn Translate,
    banner: String,
    type_names: HashSet<String>,
    dependencies: BTreeSet<Dependency>,
    items: Vec<String>,
}

fn feature(dependency: Dependency) -> &'static str {
    match dependency {
        Dependency::Chrono => "chrono",
        Dependency::Json => "json",
        Dependency::Decimal => "rust_decimal",
        Dependency::Uuid => "uuid",
    }
}

fn str_slice(items: &[String]) -> String {
    let quoted: Vec<_> = items.iter().map(|item| format!("{item:?}")).collect();
    format!("&[{}]", quoted.join(", "))
}

fn cast_pairs(casts: &[(String, String)]) -> String {
    let pairs: Vec<_> = casts
        .iter()
        .map(|(column, cast)| format!("({column:?}, {cast:?})"))
        .collect();
    format!("&[{}]", pairs.join(", "))
}

fn rename_attribute(field: &str, column: &str) -> Option<String> {
    (field != column).then(|| format!("{INDENT}#[sqlx(rename = {column:?})]\n"))
}

impl RustCodeGen {
    pub fn new(engine: Engine, banner: &str) -> Self {
        Self {
            engine,
            translate: engine.translator(),
            banner: banner.to_string(),
            type_names: HashSet::new(),
            dependencies: BTreeSet::new(),
            items: vec![],
        }
    }

    fn claim(&mut self, candidates: &[String]) -> Result<String, Box<dyn Error>> {
        for candidate in candidates {
            if self.type_names.insert(candidate.clone()) {
                return Ok(candidate.clone());
            }
        }
        let taken = candidates.last().map(String::as_str).unwrap_or_default();
        Err(format!("type name {taken:?} is already taken").into())
    }

    fn target(&mut self, column: &Column) -> TargetType {
        let target = self.translate.column_target(column);
        if let Some(dependency) = target.dependency() {
            self.dependencies.insert(dependency);
        }
        target
    }

    fn entity(&mut self, name: &str, table: &Table) -> Result<String, std::fmt::Error> {
        let sql = EntitySql::render(table, self.translate);
        let idents = unique_idents(
            table
                .columns
                .iter()
                .map(|column| to_field_ident(&column.column_name))
                .collect(),
        );

        let mut out = String::new();
        writeln!(out, "/// `{}`", table.full_name())?;
        writeln!(out, "#[allow(dead_code)]")?;
        writeln!(out, "#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]")?;
        writeln!(out, "pub struct {name} {{")?;
        for (column, ident) in table.columns.iter().zip(&idents) {
            let target = self.target(column);
            if let Some(rename) = rename_attribute(ident, &column.column_name) {
                out.push_str(&rename);
            }
            writeln!(out, "{INDENT}pub {ident}: Field<{}>,", target.rust_type())?;
        }
        writeln!(out, "}}")?;
        writeln!(out)?;

        let consts = [
            ("INSERT_QUERY", sql.insert.as_str()),
            ("COUNT_QUERY", sql.count.as_str()),
            ("FIND_ALL_QUERY", sql.find_all.as_str()),
            ("FIND_BY_PK_QUERY", sql.find_by_pk.as_deref().unwrap_or_default()),
            ("DELETE_BY_PK_QUERY", sql.delete_by_pk.as_deref().unwrap_or_default()),
            ("DELETE_ALL_QUERY", sql.delete_all.as_str()),
            ("RETURNING", sql.returning.as_str()),
            ("PK_WHERE", sql.pk_where.as_deref().unwrap_or_default()),
            ("ALL_FIELDS_WHERE", sql.all_fields_where.as_str()),
        ];

        writeln!(out, "impl Entity for {name} {{")?;
        writeln!(out, "{INDENT}type Database = {};", self.engine.sqlx_type())?;
        writeln!(out)?;
        writeln!(
            out,
            "{INDENT}const TABLE_NAME: &'static str = {:?};",
            sql.table_name
        )?;
        writeln!(
            out,
            "{INDENT}const PRIMARY_KEY: &'static [&'static str] = {};",
            str_slice(&sql.primary_key)
        )?;
        if !sql.generated_columns.is_empty() {
            writeln!(
                out,
                "{INDENT}const GENERATED_COLUMNS: &'static [&'static str] = {};",
                str_slice(&sql.generated_columns)
            )?;
        }
        if !sql.bind_casts.is_empty() {
            writeln!(
                out,
                "{INDENT}const BIND_CASTS: &'static [(&'static str, &'static str)] = {};",
                cast_pairs(&sql.bind_casts)
            )?;
        }
        writeln!(out)?;
        for (constant, text) in consts {
            writeln!(
                out,
                "{INDENT}const {constant}: &'static str = {};",
                raw_string_literal(text)
            )?;
        }
        writeln!(out)?;
        writeln!(out, "{INDENT}fn bindings(&self) -> Vec<Binding> {{")?;
        writeln!(out, "{INDENT}{INDENT}vec![")?;
        for (column, ident) in table.columns.iter().zip(&idents) {
            writeln!(
                out,
                "{INDENT}{INDENT}{INDENT}self.{ident}.bind({:?}),",
                column.column_name
            )?;
        }
        writeln!(out, "{INDENT}{INDENT}]")?;
        writeln!(out, "{INDENT}}}")?;
        writeln!(out, "}}")?;
        Ok(out)
    }

    fn query(&mut self, name: &str, query: &Query) -> Result<String, std::fmt::Error> {
        let args = format!("{name}Args");
        let row = format!("{name}Row");
        let param_idents =
            unique_idents(query.params.iter().map(|param| to_field_ident(&param.name)).collect());
        let column_idents = unique_idents(
            query
                .columns
                .iter()
                .map(|column| to_field_ident(&column.column_name))
                .collect(),
        );

        let mut out = String::new();
        writeln!(out, "/// Arguments of `{}`.", query.file_name)?;
        writeln!(out, "#[allow(dead_code)]")?;
        writeln!(out, "#[derive(Debug, Clone, Default, PartialEq)]")?;
        writeln!(out, "pub struct {args} {{")?;
        for (param, ident) in query.params.iter().zip(&param_idents) {
            if let Some(dependency) = param.target.dependency() {
                self.dependencies.insert(dependency);
            }
            writeln!(out, "{INDENT}pub {ident}: Option<{}>,", param.target.rust_type())?;
        }
        writeln!(out, "}}")?;
        writeln!(out)?;

        writeln!(out, "/// A row of `{}`.", query.file_name)?;
        writeln!(out, "#[allow(dead_code)]")?;
        writeln!(out, "#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]")?;
        writeln!(out, "pub struct {row} {{")?;
        for (column, ident) in query.columns.iter().zip(&column_idents) {
            let target = self.target(column);
            if target.kind == TypeKind::Opaque {
                writeln!(
                    out,
                    "{INDENT}/// `{}` decodes as text only when the query casts it.",
                    column.type_name
                )?;
            }
            if let Some(rename) = rename_attribute(ident, &column.column_name) {
                out.push_str(&rename);
            }
            let rust_type = match target.nullable {
                true => format!("Option<{}>", target.rust_type()),
                false => target.rust_type(),
            };
            writeln!(out, "{INDENT}pub {ident}: {rust_type},")?;
        }
        writeln!(out, "}}")?;
        writeln!(out)?;

        writeln!(out, "impl Queryable for {args} {{")?;
        writeln!(out, "{INDENT}type Database = {};", self.engine.sqlx_type())?;
        writeln!(out, "{INDENT}type Row = {row};")?;
        writeln!(out)?;
        writeln!(
            out,
            "{INDENT}const SQL: &'static str = {};",
            raw_string_literal(&query.executable_sql(self.engine))
        )?;
        if query.returns_one {
            writeln!(out, "{INDENT}const RETURNS_ONE: bool = true;")?;
        }
        writeln!(out)?;
        writeln!(out, "{INDENT}fn bindings(&self) -> Vec<Binding> {{")?;
        writeln!(out, "{INDENT}{INDENT}vec![")?;
        for (param, ident) in query.params.iter().zip(&param_idents) {
            writeln!(
                out,
                "{INDENT}{INDENT}{INDENT}Field::from_option(self.{ident}.clone()).bind({:?}),",
                param.name
            )?;
        }
        writeln!(out, "{INDENT}{INDENT}]")?;
        writeln!(out, "{INDENT}}}")?;
        writeln!(out, "}}")?;
        Ok(out)
    }
}

impl CodeGen for RustCodeGen {
    fn push_table(&mut self, table: &Table) -> Result<(), Box<dyn Error>> {
        // tables of different schemas may share a name
        let name = self.claim(&[
            to_pascal(&table.table_name),
            to_pascal(&format!("{}_{}", table.schema_name, table.table_name)),
        ])?;
        let item = self.entity(&name, table)?;
        self.items.push(item);
        Ok(())
    }

    fn push_query(&mut self, name: &str, query: &Query) -> Result<(), Box<dyn Error>> {
        let name = to_pascal(name);
        self.claim(&[format!("{name}Args")])?;
        self.claim(&[format!("{name}Row")])?;
        let item = self.query(&name, query)?;
        self.items.push(item);
        Ok(())
    }

    fn finalize(&self) -> Result<String, Box<dyn Error>> {
        let mut out = String::new();
        if !self.banner.is_empty() {
            writeln!(out, "{}", self.banner)?;
        }
        let features: Vec<_> = std::iter::once(self.engine.to_string())
            .chain(self.dependencies.iter().map(|dependency| feature(*dependency).to_string()))
            .collect();
        writeln!(out, "// Requires sqlx features: {}", features.join(", "))?;
        writeln!(out)?;
        // outer attributes only, so the file can be pulled in with `include!`
        writeln!(out, "#[allow(unused_imports)]")?;
        writeln!(out, "use sqlxgen_core::store::{{Binding, Entity, Field, Queryable}};")?;
        for item in &self.items {
            writeln!(out)?;
            out.push_str(item);
        }
        Ok(out)
    }
}
