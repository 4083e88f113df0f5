use super::{Translate, strip_modifiers};
use crate::Engine;
use crate::model::{Column, TargetType, TypeKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlTranslate;

/// Column type as stored in the model: `tinyint(1)` is kept as `boolean`,
/// other length arguments and the `zerofill` attribute are dropped.
pub fn normalize_type_name(column_type: &str) -> String {
    let lowered = column_type.trim().to_lowercase();
    if lowered.starts_with("tinyint(1)") && !lowered.contains("unsigned") {
        return "boolean".to_string();
    }
    strip_modifiers(&lowered)
        .trim_end_matches(" zerofill")
        .to_string()
}

fn kind_of(name: &str) -> TypeKind {
    let (base, unsigned) = match name.strip_suffix(" unsigned") {
        Some(base) => (base, true),
        None => (name, false),
    };
    match base {
        "bool" | "boolean" => TypeKind::Bool,
        "tinyint" if unsigned => TypeKind::Int { bits: 16 },
        "tinyint" => TypeKind::Int { bits: 8 },
        "smallint" if unsigned => TypeKind::Int { bits: 32 },
        "smallint" | "year" => TypeKind::Int { bits: 16 },
        "mediumint" | "int" | "integer" if unsigned => TypeKind::Int { bits: 64 },
        "mediumint" | "int" | "integer" => TypeKind::Int { bits: 32 },
        "bigint" | "signed" | "unsigned" => TypeKind::Int { bits: 64 },
        "float" => TypeKind::Float { bits: 32 },
        "double" | "double precision" | "real" => TypeKind::Float { bits: 64 },
        "decimal" | "numeric" | "dec" | "fixed" => TypeKind::Decimal,
        "char" | "varchar" | "tinytext" | "text" | "mediumtext" | "longtext" | "enum" | "set" => {
            TypeKind::Text
        }
        "date" => TypeKind::Date,
        "datetime" => TypeKind::Timestamp { tz: false },
        "timestamp" => TypeKind::Timestamp { tz: true },
        "time" => TypeKind::Time,
        "json" => TypeKind::Json,
        "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" | "bit" => {
            TypeKind::Bytes
        }
        _ => TypeKind::Opaque,
    }
}

impl Translate for MysqlTranslate {
    fn engine(&self) -> Engine {
        Engine::Mysql
    }

    fn target(&self, type_name: &str, nullable: bool, array: bool) -> TargetType {
        TargetType::new(kind_of(&normalize_type_name(type_name)), nullable, array)
    }

    // MySQL converts string parameters to the column type itself.
    fn bind_cast(&self, _column: &Column) -> Option<String> {
        None
    }

    fn optional_eq(&self, column: &Column) -> String {
        let name = &column.column_name;
        format!("(:{name} IS NULL OR {} = :{name})", self.quote(name))
    }

    fn text_cast(&self) -> &'static str {
        "CHAR"
    }

    fn insert_defaults(&self, table_name: &str) -> String {
        format!("INSERT INTO {table_name} () VALUES ()")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_types() {
        let translate = MysqlTranslate;
        let cases = [
            ("tinyint(1)", TypeKind::Bool),
            ("tinyint(4)", TypeKind::Int { bits: 8 }),
            ("int(11)", TypeKind::Int { bits: 32 }),
            ("int unsigned", TypeKind::Int { bits: 64 }),
            ("bigint(20) unsigned", TypeKind::Int { bits: 64 }),
            ("decimal(10,2)", TypeKind::Decimal),
            ("double", TypeKind::Float { bits: 64 }),
            ("varchar(255)", TypeKind::Text),
            ("enum('a','b')", TypeKind::Text),
            ("datetime(6)", TypeKind::Timestamp { tz: false }),
            ("timestamp", TypeKind::Timestamp { tz: true }),
            ("json", TypeKind::Json),
            ("longblob", TypeKind::Bytes),
            ("geometry", TypeKind::Opaque),
        ];
        for (name, kind) in cases {
            assert_eq!(translate.target(name, false, false).kind, kind, "{name}");
        }
    }

    #[test]
    fn normalized_names() {
        assert_eq!(normalize_type_name("TINYINT(1)"), "boolean");
        assert_eq!(normalize_type_name("int(10) unsigned zerofill"), "int unsigned");
        assert_eq!(normalize_type_name("varchar(64)"), "varchar");
    }

    #[test]
    fn optional_equality_is_plain() {
        let column = Column {
            column_name: "name".to_string(),
            type_name: "varchar".to_string(),
            is_array: false,
            nullable: false,
            pk_ordinal_position: 0,
            generated: false,
        };
        assert_eq!(
            MysqlTranslate.optional_eq(&column),
            "(:name IS NULL OR `name` = :name)"
        );
    }

    #[test]
    fn opaque_columns_bind_bare_and_read_as_char() {
        let column = Column {
            column_name: "area".to_string(),
            type_name: "geometry".to_string(),
            is_array: false,
            nullable: true,
            pk_ordinal_position: 0,
            generated: false,
        };
        assert_eq!(MysqlTranslate.bind_expr(&column), ":area");
        assert_eq!(MysqlTranslate.select_expr(&column), "CAST(`area` AS CHAR) AS `area`");
    }
}
