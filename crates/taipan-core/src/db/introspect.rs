//! Schema introspection through SQLite's table-valued pragmas.
//!
//! Live connections read `pragma_table_info` / `pragma_foreign_key_list`;
//! dry-run backends answer from the shipped table definitions. Results are
//! cached per connection until the next schema change.

use super::{ColumnSpec, Database};
use crate::{
    error::{Result, TaipanError},
    query::{check_identifier, Value},
    schema::{builtin_definition, ColumnType},
};

const TABLE_INFO_SQL: &str = "SELECT name, type, pk FROM pragma_table_info(?1) ORDER BY cid";
const FOREIGN_KEY_SQL: &str =
    "SELECT \"from\", \"table\", \"to\" FROM pragma_foreign_key_list(?1) ORDER BY id, seq";
const TABLE_EXISTS_SQL: &str =
    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyInfo {
    pub column: String,
    pub references_table: String,
    pub references_column: String,
}

/// Columns and keys of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
}

impl TableInfo {
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.name == column)
    }

    pub fn column(&self, column: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == column)
    }

    /// Primary key and foreign key columns; the only columns used to join.
    pub fn is_key_column(&self, column: &str) -> bool {
        self.primary_key.iter().any(|c| c == column)
            || self.foreign_keys.iter().any(|fk| fk.column == column)
    }

    pub(crate) fn require_column(&self, column: &str) -> Result<&ColumnSpec> {
        self.column(column).ok_or_else(|| TaipanError::UnknownColumn {
            table: self.name.clone(),
            column: column.to_string(),
        })
    }
}

impl Database {
    /// Column names, types and keys of `table`.
    pub fn table_info(&self, table: &str) -> Result<TableInfo> {
        check_identifier(table)?;
        if let Some(info) = self.table_cache.borrow().get(table) {
            return Ok(info.clone());
        }
        let info = if self.is_dry_run() {
            Self::definition_info(table)?
        } else {
            self.live_table_info(table)?
        };
        self.table_cache
            .borrow_mut()
            .insert(table.to_string(), info.clone());
        Ok(info)
    }

    fn definition_info(table: &str) -> Result<TableInfo> {
        let definition = builtin_definition(table)?;
        Ok(TableInfo {
            name: definition.name.clone(),
            columns: definition
                .columns
                .iter()
                .map(|c| ColumnSpec::new(&c.name, c.column_type))
                .collect(),
            primary_key: definition
                .primary_key()
                .into_iter()
                .map(String::from)
                .collect(),
            foreign_keys: definition
                .columns
                .iter()
                .filter_map(|c| {
                    c.references.as_ref().map(|fk| ForeignKeyInfo {
                        column: c.name.clone(),
                        references_table: fk.table.clone(),
                        references_column: fk.column.clone(),
                    })
                })
                .collect(),
        })
    }

    fn live_table_info(&self, table: &str) -> Result<TableInfo> {
        let text = || ColumnSpec::new("", ColumnType::Text(None));
        let int = || ColumnSpec::new("", ColumnType::Integer);
        let param = [Value::from(table)];

        let rows = self.query(TABLE_INFO_SQL, &param, vec![text(), text(), int()])?;
        if rows.is_empty() {
            return Err(TaipanError::UnknownTable {
                table: table.to_string(),
            });
        }

        let mut columns = Vec::with_capacity(rows.len());
        let mut keyed = Vec::new();
        for row in rows.rows() {
            let name = row[0].as_str().unwrap_or_default().to_string();
            let declared = row[1].as_str().unwrap_or_default();
            let column_type =
                ColumnType::from_declared(declared).ok_or_else(|| TaipanError::UnknownType {
                    table: table.to_string(),
                    column: name.clone(),
                    declared: declared.to_string(),
                })?;
            let pk_position = row[2].as_i64().unwrap_or(0);
            if pk_position > 0 {
                keyed.push((pk_position, name.clone()));
            }
            columns.push(ColumnSpec::new(name, column_type));
        }
        keyed.sort();

        let foreign_keys = self
            .query(FOREIGN_KEY_SQL, &param, vec![text(), text(), text()])?
            .rows()
            .iter()
            .map(|row| ForeignKeyInfo {
                column: row[0].as_str().unwrap_or_default().to_string(),
                references_table: row[1].as_str().unwrap_or_default().to_string(),
                references_column: row[2].as_str().unwrap_or_default().to_string(),
            })
            .collect();

        Ok(TableInfo {
            name: table.to_string(),
            columns,
            primary_key: keyed.into_iter().map(|(_, name)| name).collect(),
            foreign_keys,
        })
    }

    /// `(names, types)` of every column of `table`.
    pub fn get_columns(&self, table: &str) -> Result<Vec<ColumnSpec>> {
        Ok(self.table_info(table)?.columns)
    }

    /// Deduplicated union of the columns of `tables`, in table order,
    /// optionally restricted to `subset` (which is then also the output
    /// order). Unknown subset columns are an error.
    pub fn get_columns_joined(
        &self,
        tables: &[&str],
        subset: Option<&[&str]>,
    ) -> Result<Vec<ColumnSpec>> {
        let mut union: Vec<ColumnSpec> = Vec::new();
        for table in tables {
            for column in self.get_columns(table)? {
                if !union.iter().any(|c| c.name == column.name) {
                    union.push(column);
                }
            }
        }
        match subset {
            None => Ok(union),
            Some(names) => names
                .iter()
                .map(|name| {
                    union
                        .iter()
                        .find(|c| c.name == *name)
                        .cloned()
                        .ok_or_else(|| TaipanError::UnknownColumn {
                            table: tables.join(", "),
                            column: (*name).to_string(),
                        })
                })
                .collect(),
        }
    }

    pub fn primary_key(&self, table: &str) -> Result<Vec<String>> {
        Ok(self.table_info(table)?.primary_key)
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        check_identifier(table)?;
        if self.is_dry_run() {
            return Ok(builtin_definition(table).is_ok());
        }
        let count = self.query_scalar(TABLE_EXISTS_SQL, &[Value::from(table)])?;
        Ok(count.and_then(|v| v.as_i64()).unwrap_or(0) > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_introspection() {
        let db = Database::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE parent (id integer PRIMARY KEY, label varchar(8));
             CREATE TABLE child (parent_id integer REFERENCES parent(id), seq smallint,
                                 weight double precision, PRIMARY KEY (parent_id, seq));",
        )
        .unwrap();

        let info = db.table_info("child").unwrap();
        assert_eq!(info.primary_key, vec!["parent_id", "seq"]);
        assert_eq!(info.foreign_keys[0].references_table, "parent");
        assert_eq!(info.column("weight").unwrap().column_type, ColumnType::Double);
        assert_eq!(
            db.get_columns("parent").unwrap()[1].column_type,
            ColumnType::Text(Some(8))
        );
    }

    #[test]
    fn test_unknown_type_reported() {
        let db = Database::open_in_memory().unwrap();
        db.execute_batch("CREATE TABLE odd (id integer, shape geometry)")
            .unwrap();
        assert!(matches!(
            db.table_info("odd"),
            Err(TaipanError::UnknownType { ref declared, .. }) if declared == "geometry"
        ));
    }

    #[test]
    fn test_unknown_table() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.table_info("missing"),
            Err(TaipanError::UnknownTable { .. })
        ));
        assert!(!db.table_exists("missing").unwrap());
    }

    #[test]
    fn test_dry_run_uses_definitions() {
        let db = Database::dry_run();
        let columns = db
            .get_columns_joined(&["science_target", "target"], Some(&["target_id", "ra", "priority"]))
            .unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["target_id", "ra", "priority"]);
        assert!(db.statements().is_empty());
    }
}
