use crate::model::{Column, Table};
use crate::translate::Translate;

/// Every SQL text an entity exposes to the runtime, rendered from a table.
///
/// Predicates and the returning clause are fragments starting with a newline
/// so the runtime can append them to statements it builds itself; complete
/// statements end with `;`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySql {
    /// Quoted `schema.table`.
    pub table_name: String,
    pub primary_key: Vec<String>,
    pub generated_columns: Vec<String>,
    /// `(column, type)` for columns whose placeholders need a cast.
    pub bind_casts: Vec<(String, String)>,
    pub all_fields_where: String,
    pub pk_where: Option<String>,
    pub returning: String,
    pub insert: String,
    pub count: String,
    pub find_all: String,
    pub find_by_pk: Option<String>,
    pub delete_by_pk: Option<String>,
    pub delete_all: String,
}

fn names<'a>(columns: impl Iterator<Item = &'a Column>) -> Vec<String> {
    columns.map(|column| column.column_name.clone()).collect()
}

impl EntitySql {
    pub fn render(table: &Table, translate: &dyn Translate) -> Self {
        let table_name = table.sql_name(translate.engine());
        let primary_key = names(table.primary_key());
        let generated_columns = names(table.columns.iter().filter(|column| column.generated));
        let bind_casts = table
            .columns
            .iter()
            .filter_map(|column| {
                translate
                    .bind_cast(column)
                    .map(|cast| (column.column_name.clone(), cast))
            })
            .collect();

        let select_list = table
            .columns
            .iter()
            .map(|column| translate.select_expr(column))
            .collect::<Vec<_>>()
            .join(",\n  ");

        let all_fields_where = format!(
            "\nWHERE TRUE\n  AND {}",
            table
                .columns
                .iter()
                .map(|column| translate.optional_eq(column))
                .collect::<Vec<_>>()
                .join("\n  AND ")
        );

        let pk_where = (!primary_key.is_empty()).then(|| {
            format!(
                "\nWHERE {}",
                table
                    .primary_key()
                    .map(|column| format!(
                        "{} = {}",
                        translate.quote(&column.column_name),
                        translate.bind_expr(column)
                    ))
                    .collect::<Vec<_>>()
                    .join("\n  AND ")
            )
        });

        let returning = format!("\nRETURNING\n  {select_list}");

        let insertable: Vec<&Column> = table
            .columns
            .iter()
            .filter(|column| !column.generated)
            .collect();
        let insert = match insertable.is_empty() {
            true => format!("{}{returning};", translate.insert_defaults(&table_name)),
            false => format!(
                "INSERT INTO {table_name} (\n  {}\n)\nVALUES (\n  {}\n){returning};",
                insertable
                    .iter()
                    .map(|column| translate.quote(&column.column_name))
                    .collect::<Vec<_>>()
                    .join(",\n  "),
                insertable
                    .iter()
                    .map(|column| translate.bind_expr(column))
                    .collect::<Vec<_>>()
                    .join(",\n  ")
            ),
        };

        let count = format!("SELECT count(*) AS count\nFROM {table_name}{all_fields_where};");
        let find_all = format!("SELECT\n  {select_list}\nFROM {table_name}{all_fields_where};");
        let find_by_pk = pk_where.as_ref().map(|pk_where| {
            format!("SELECT\n  {select_list}\nFROM {table_name}{pk_where}\nLIMIT 1;")
        });
        let delete_by_pk = pk_where
            .as_ref()
            .map(|pk_where| format!("DELETE FROM {table_name}{pk_where};"));
        let delete_all = format!("DELETE FROM {table_name}{all_fields_where};");

        Self {
            table_name,
            primary_key,
            generated_columns,
            bind_casts,
            all_fields_where,
            pk_where,
            returning,
            insert,
            count,
            find_all,
            find_by_pk,
            delete_by_pk,
            delete_all,
        }
    }
}
