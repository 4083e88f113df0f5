use std::{cmp, fmt::Display};

use sqlxgen_core::{model::Table, translate::Translate};

#[derive(Debug, Clone)]
pub struct ColumnSchema {
    pub name: String,
    pub native_type: String,
    pub rust_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub generated: bool,
}

#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

/// Discovered tables with their translated types, printable as aligned rows.
#[derive(Debug, Clone)]
pub struct DbSchema {
    pub tables: Vec<TableSchema>,
}

impl DbSchema {
    pub fn new(tables: &[Table], translate: &dyn Translate) -> Self {
        let tables = tables
            .iter()
            .map(|table| TableSchema {
                name: table.full_name(),
                columns: table
                    .columns
                    .iter()
                    .map(|column| {
                        let native_type = match column.is_array {
                            true => format!("{}[]", column.type_name),
                            false => column.type_name.clone(),
                        };
                        ColumnSchema {
                            name: column.column_name.clone(),
                            native_type,
                            rust_type: translate.column_target(column).rust_type(),
                            nullable: column.nullable,
                            primary_key: column.is_primary_key(),
                            generated: column.generated,
                        }
                    })
                    .collect(),
            })
            .collect();
        Self { tables }
    }
}

fn aligned(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  |  ")
        .trim_end()
        .to_string()
}

impl Display for DbSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for table in &self.tables {
            writeln!(f, "{}", table.name)?;
            // `*` marks key columns, `+` generated ones, `?` nullable ones
            let names = table
                .columns
                .iter()
                .map(|col| {
                    let mut name = col.name.clone();
                    if col.primary_key {
                        name.push('*');
                    }
                    if col.generated {
                        name.push('+');
                    }
                    if col.nullable {
                        name.push('?');
                    }
                    name
                })
                .collect::<Vec<_>>();
            let native = table
                .columns
                .iter()
                .map(|col| col.native_type.clone())
                .collect::<Vec<_>>();
            let rust = table
                .columns
                .iter()
                .map(|col| col.rust_type.clone())
                .collect::<Vec<_>>();
            let widths = names
                .iter()
                .zip(&native)
                .zip(&rust)
                .map(|((name, native), rust)| cmp::max(name.len(), cmp::max(native.len(), rust.len())))
                .collect::<Vec<_>>();
            writeln!(f, "{}", aligned(&names, &widths))?;
            writeln!(f, "{}", aligned(&native, &widths))?;
            writeln!(f, "{}", aligned(&rust, &widths))?;
            writeln!(f)?;
        }
        Ok(())
    }
}
