//! `.tab` table definition files and `CREATE TABLE` generation.
//!
//! Each line of a definition reads `column | type | attributes`, where the
//! attributes are whitespace separated: `pk`, `not_null`, `unique`,
//! `autoincrement`, `default=<literal>` and `fk=<table>(<column>)`. Lines
//! starting with `#` are comments.

use super::ColumnType;
use crate::{
    error::{Result, TaipanError},
    query::check_identifier,
};

/// Foreign key reference; always declared `ON DELETE CASCADE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub declared: String,
    pub column_type: ColumnType,
    pub primary_key: bool,
    pub not_null: bool,
    pub unique: bool,
    pub autoincrement: bool,
    pub default: Option<String>,
    pub references: Option<ForeignKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

/// Definitions shipped with the crate, in creation order.
static BUILTIN: &[(&str, &str)] = &[
    ("field", include_str!("../../assets/tables/field.tab")),
    ("target", include_str!("../../assets/tables/target.tab")),
    (
        "science_target",
        include_str!("../../assets/tables/science_target.tab"),
    ),
    ("target_posn", include_str!("../../assets/tables/target_posn.tab")),
    ("tile", include_str!("../../assets/tables/tile.tab")),
    (
        "target_field",
        include_str!("../../assets/tables/target_field.tab"),
    ),
    ("tiling_info", include_str!("../../assets/tables/tiling_info.tab")),
    (
        "tiling_config",
        include_str!("../../assets/tables/tiling_config.tab"),
    ),
    (
        "observing_log",
        include_str!("../../assets/tables/observing_log.tab"),
    ),
    ("version", include_str!("../../assets/tables/version.tab")),
];

impl TableDefinition {
    /// Parses the text of one definition file.
    pub fn parse(table: &str, source: &str) -> Result<Self> {
        let fail = |line: usize, reason: String| TaipanError::Definition {
            table: table.to_string(),
            line,
            reason,
        };
        check_identifier(table).map_err(|_| fail(0, "invalid table name".into()))?;

        let mut columns = Vec::new();
        for (index, raw) in source.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let parts: Vec<&str> = line.split('|').map(str::trim).collect();
            let (name, declared, attributes) = match parts.as_slice() {
                [name, declared] => (*name, *declared, ""),
                [name, declared, attributes] => (*name, *declared, *attributes),
                _ => {
                    return Err(fail(
                        line_no,
                        "expected 'column | type | attributes'".into(),
                    ))
                }
            };
            if check_identifier(name).is_err() || name.contains('.') {
                return Err(fail(line_no, format!("invalid column name '{name}'")));
            }
            let column_type = ColumnType::from_declared(declared)
                .filter(|t| *t != ColumnType::Any)
                .ok_or_else(|| fail(line_no, format!("unknown column type '{declared}'")))?;

            let mut column = ColumnDefinition {
                name: name.to_string(),
                declared: declared.to_string(),
                column_type,
                primary_key: false,
                not_null: false,
                unique: false,
                autoincrement: false,
                default: None,
                references: None,
            };
            for attribute in attributes.split_whitespace() {
                match attribute {
                    "pk" => column.primary_key = true,
                    "not_null" => column.not_null = true,
                    "unique" => column.unique = true,
                    "autoincrement" => column.autoincrement = true,
                    other => {
                        if let Some(literal) = other.strip_prefix("default=") {
                            column.default = Some(literal.to_string());
                        } else if let Some(reference) = other.strip_prefix("fk=") {
                            column.references = Some(
                                parse_reference(reference)
                                    .ok_or_else(|| fail(line_no, format!("bad reference '{reference}'")))?,
                            );
                        } else {
                            return Err(fail(line_no, format!("unknown attribute '{other}'")));
                        }
                    }
                }
            }
            if column.autoincrement && !(column.primary_key && column.column_type.is_integer()) {
                return Err(fail(
                    line_no,
                    "autoincrement requires an integer primary key".into(),
                ));
            }
            columns.push(column);
        }

        if columns.is_empty() {
            return Err(fail(0, "definition has no columns".into()));
        }
        let definition = Self {
            name: table.to_string(),
            columns,
        };
        if definition.primary_key().len() > 1
            && definition.columns.iter().any(|c| c.autoincrement)
        {
            return Err(fail(
                0,
                "autoincrement cannot be used with a composite primary key".into(),
            ));
        }
        Ok(definition)
    }

    /// Primary key column names in declaration order.
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this definition.
    pub fn create_sql(&self) -> String {
        let primary_key = self.primary_key();
        let inline_pk = primary_key.len() == 1;

        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|column| {
                let mut line = format!("{} {}", column.name, column.column_type.sql_name());
                if column.primary_key && inline_pk {
                    line.push_str(" PRIMARY KEY");
                    if column.autoincrement {
                        line.push_str(" AUTOINCREMENT");
                    }
                }
                if column.not_null {
                    line.push_str(" NOT NULL");
                }
                if column.unique {
                    line.push_str(" UNIQUE");
                }
                if let Some(default) = &column.default {
                    line.push_str(&format!(" DEFAULT {default}"));
                }
                if let Some(fk) = &column.references {
                    line.push_str(&format!(
                        " REFERENCES {}({}) ON DELETE CASCADE",
                        fk.table, fk.column
                    ));
                }
                line
            })
            .collect();

        if primary_key.len() > 1 {
            lines.push(format!("PRIMARY KEY ({})", primary_key.join(", ")));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.name,
            lines.join(",\n    ")
        )
    }
}

fn parse_reference(reference: &str) -> Option<ForeignKey> {
    let (table, rest) = reference.split_once('(')?;
    let column = rest.strip_suffix(')')?;
    if check_identifier(table).is_err() || check_identifier(column).is_err() {
        return None;
    }
    Some(ForeignKey {
        table: table.to_string(),
        column: column.to_string(),
    })
}

/// Names of every table shipped with the crate.
pub fn builtin_tables() -> impl Iterator<Item = &'static str> {
    BUILTIN.iter().map(|(name, _)| *name)
}

/// Parses the shipped definition for `table`.
pub fn builtin_definition(table: &str) -> Result<TableDefinition> {
    let (name, source) = BUILTIN
        .iter()
        .find(|(name, _)| *name == table)
        .ok_or_else(|| TaipanError::UnknownTable {
            table: table.to_string(),
        })?;
    TableDefinition::parse(name, source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_definition() {
        let definition = TableDefinition::parse(
            "widget",
            "# widgets\nid | integer | pk\nlabel | varchar(8) | not_null unique\n",
        )
        .unwrap();
        assert_eq!(definition.primary_key(), vec!["id"]);
        let label = definition.column("label").unwrap();
        assert_eq!(label.column_type, ColumnType::Text(Some(8)));
        assert!(label.not_null && label.unique);
    }

    #[test]
    fn test_create_sql_composite_key_and_cascade() {
        let definition = builtin_definition("target_posn").unwrap();
        let sql = definition.create_sql();
        assert!(sql.contains("PRIMARY KEY (target_id, field_id)"));
        assert!(sql.contains("REFERENCES field(field_id) ON DELETE CASCADE"));
    }

    #[test]
    fn test_create_sql_autoincrement() {
        let sql = builtin_definition("tile").unwrap().create_sql();
        assert!(sql.contains("tile_pk integer PRIMARY KEY AUTOINCREMENT"));
    }

    #[test]
    fn test_all_builtin_definitions_parse() {
        for table in builtin_tables() {
            let definition = builtin_definition(table).unwrap();
            assert!(!definition.primary_key().is_empty(), "{table} has no key");
        }
    }

    #[test]
    fn test_definition_errors_carry_line() {
        let err = TableDefinition::parse("t", "id | integer | pk\nx | blob\n").unwrap_err();
        assert!(matches!(err, TaipanError::Definition { line: 2, .. }));

        let err = TableDefinition::parse("t", "id | integer | pk sparkly\n").unwrap_err();
        assert!(matches!(err, TaipanError::Definition { line: 1, .. }));

        let err = TableDefinition::parse("t", "id | text | pk autoincrement\n").unwrap_err();
        assert!(matches!(err, TaipanError::Definition { .. }));
    }

    #[test]
    fn test_unknown_builtin() {
        assert!(matches!(
            builtin_definition("nope"),
            Err(TaipanError::UnknownTable { .. })
        ));
    }
}
