//! Write side: batched inserts, upserts, row-matched updates and deletes.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info, warn};

use super::{Database, TableInfo};
use crate::{
    error::{Result, TaipanError},
    query::{check_identifier, Expr, Value},
};

/// SQLite's bound-parameter ceiling per statement.
const MAX_PARAMS: usize = 32_766;
/// Parameters kept free for the filter of an inline update.
const FILTER_PARAMS: usize = 1_000;

static TEMP_TABLE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Options for [`Database::insert_many_rows`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOptions {
    /// Rows per statement; the connection's configured batch size if unset.
    pub batch_size: Option<usize>,
    /// Silently skip rows whose primary key already exists.
    pub skip_on_conflict: bool,
}

impl InsertOptions {
    pub fn skip_on_conflict() -> Self {
        Self {
            batch_size: None,
            skip_on_conflict: true,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }
}

/// One `SET` item of a broadcast update.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Set(String, Value),
    Increment(String, i64),
}

impl Assignment {
    pub fn set(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Assignment::Set(column.into(), value.into())
    }

    pub fn increment(column: impl Into<String>, by: i64) -> Self {
        Assignment::Increment(column.into(), by)
    }

    fn column(&self) -> &str {
        match self {
            Assignment::Set(column, _) | Assignment::Increment(column, _) => column,
        }
    }
}

/// Checks a `rows` batch against `columns` and the target table.
fn validate_batch(info: &TableInfo, columns: &[&str], rows: &[Vec<Value>]) -> Result<()> {
    if columns.is_empty() {
        return Err(TaipanError::shape(format!(
            "no columns given for {}",
            info.name
        )));
    }
    for column in columns {
        check_identifier(column)?;
        info.require_column(column)?;
    }
    for (i, column) in columns.iter().enumerate() {
        if columns[..i].contains(column) {
            return Err(TaipanError::shape(format!("column {column} listed twice")));
        }
    }
    if let Some((index, row)) = rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != columns.len())
    {
        return Err(TaipanError::shape(format!(
            "row {index} has {} values for {} columns of {}",
            row.len(),
            columns.len(),
            info.name
        )));
    }
    Ok(())
}

fn placeholders(rows: usize, width: usize) -> String {
    let row = format!("({})", vec!["?"; width].join(", "));
    vec![row; rows].join(", ")
}

fn rows_per_statement(batch_size: usize, width: usize) -> usize {
    batch_size.min(MAX_PARAMS / width.max(1)).max(1)
}

impl Database {
    /// Inserts one row.
    pub fn insert_row(
        &self,
        table: &str,
        columns: &[&str],
        row: Vec<Value>,
        skip_on_conflict: bool,
    ) -> Result<usize> {
        let options = InsertOptions {
            batch_size: None,
            skip_on_conflict,
        };
        self.insert_many_rows(table, columns, &[row], options)
    }

    /// Inserts `rows` in statements of at most `batch_size` rows each, all
    /// inside one transaction. Returns the number of rows inserted.
    pub fn insert_many_rows(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<Value>],
        options: InsertOptions,
    ) -> Result<usize> {
        let info = self.table_info(table)?;
        validate_batch(&info, columns, rows)?;
        if rows.is_empty() {
            return Ok(0);
        }

        let conflict = if options.skip_on_conflict {
            if info.primary_key.is_empty() {
                return Err(TaipanError::Constraint {
                    reason: format!("{table} has no primary key to skip conflicts on"),
                });
            }
            format!(" ON CONFLICT ({}) DO NOTHING", info.primary_key.join(", "))
        } else {
            String::new()
        };
        let batch_size = options.batch_size.unwrap_or(self.settings().batch_size);
        let per_statement = rows_per_statement(batch_size, columns.len());

        let inserted = self.with_transaction(|db| {
            let mut inserted = 0;
            for chunk in rows.chunks(per_statement) {
                let sql = format!(
                    "INSERT INTO {table} ({}) VALUES {}{conflict}",
                    columns.join(", "),
                    placeholders(chunk.len(), columns.len())
                );
                let params: Vec<Value> = chunk.iter().flatten().cloned().collect();
                inserted += db.execute(&sql, &params)?;
            }
            Ok(inserted)
        })?;
        debug!("Inserted {inserted} of {} rows into {table}", rows.len());
        Ok(inserted)
    }

    /// Inserts or overwrites rows keyed on the primary key, which must be
    /// the leading entries of `columns`.
    pub fn upsert_many_rows(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<Value>],
    ) -> Result<usize> {
        let info = self.table_info(table)?;
        let key = &info.primary_key;
        let leading = columns.get(..key.len()).unwrap_or_default();
        if key.is_empty() || leading.len() != key.len() || !key.iter().all(|k| leading.contains(&k.as_str())) {
            return Err(TaipanError::Constraint {
                reason: format!(
                    "upsert into {table} needs primary key ({}) as the leading columns, got ({})",
                    key.join(", "),
                    columns.join(", ")
                ),
            });
        }
        validate_batch(&info, columns, rows)?;
        if rows.is_empty() {
            return Ok(0);
        }

        let updates: Vec<String> = columns[key.len()..]
            .iter()
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();
        let action = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };
        let per_statement = rows_per_statement(self.settings().batch_size, columns.len());

        self.with_transaction(|db| {
            let mut written = 0;
            for chunk in rows.chunks(per_statement) {
                let sql = format!(
                    "INSERT INTO {table} ({}) VALUES {} ON CONFLICT ({}) {action}",
                    columns.join(", "),
                    placeholders(chunk.len(), columns.len()),
                    key.join(", ")
                );
                let params: Vec<Value> = chunk.iter().flatten().cloned().collect();
                written += db.execute(&sql, &params)?;
            }
            Ok(written)
        })
    }

    /// Splits `columns` into (match, set) after validating the batch.
    fn update_layout<'c>(
        &self,
        table: &str,
        columns: &'c [&'c str],
        rows: &[Vec<Value>],
        match_columns: usize,
    ) -> Result<(TableInfo, &'c [&'c str], &'c [&'c str])> {
        let info = self.table_info(table)?;
        validate_batch(&info, columns, rows)?;
        if match_columns == 0 || match_columns >= columns.len() {
            return Err(TaipanError::shape(format!(
                "updates need at least one match column and one value column, got {match_columns} of {}",
                columns.len()
            )));
        }
        let (matching, setting) = columns.split_at(match_columns);
        Ok((info, matching, setting))
    }

    fn update_from_sql(
        table: &str,
        source: &str,
        matching: &[&str],
        setting: &[&str],
        filter: Option<&Expr>,
        params: &mut Vec<Value>,
    ) -> Result<String> {
        let set = setting
            .iter()
            .map(|c| format!("{c} = {source}.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut conditions: Vec<String> = matching
            .iter()
            .map(|c| format!("{table}.{c} = {source}.{c}"))
            .collect();
        if let Some(filter) = filter {
            let qualify = |column: &str| -> Result<String> {
                check_identifier(column)?;
                Ok(if column.contains('.') {
                    column.to_string()
                } else {
                    format!("{table}.{column}")
                })
            };
            conditions.push(format!("({})", filter.render_with(&qualify, params)?));
        }
        Ok(format!(
            "UPDATE {table} SET {set} FROM {source} WHERE {}",
            conditions.join(" AND ")
        ))
    }

    /// Updates existing rows by joining an inline `VALUES` list on the
    /// first `match_columns` entries of `columns`; the remaining columns are
    /// written. `filter` further restricts which table rows may change.
    pub fn update_rows(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<Value>],
        match_columns: usize,
        filter: Option<&Expr>,
    ) -> Result<usize> {
        let (_, matching, setting) = self.update_layout(table, columns, rows, match_columns)?;
        if rows.is_empty() {
            return Ok(0);
        }
        const SOURCE: &str = "taipan_values";
        let per_statement = rows_per_statement(MAX_PARAMS - FILTER_PARAMS, columns.len());

        self.with_transaction(|db| {
            let mut updated = 0;
            for chunk in rows.chunks(per_statement) {
                let mut params: Vec<Value> = chunk.iter().flatten().cloned().collect();
                let update =
                    Self::update_from_sql(table, SOURCE, matching, setting, filter, &mut params)?;
                let sql = format!(
                    "WITH {SOURCE}({}) AS (VALUES {}) {update}",
                    columns.join(", "),
                    placeholders(chunk.len(), columns.len())
                );
                updated += db.execute(&sql, &params)?;
            }
            Ok(updated)
        })
    }

    /// Same contract as [`Database::update_rows`], staged through an
    /// indexed temporary table for large batches.
    ///
    /// The temporary table is created, filled, indexed on the match columns,
    /// joined in a single `UPDATE .. FROM` and dropped, all inside one
    /// transaction. It is dropped on every exit path.
    pub fn update_rows_via_temp_table(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<Value>],
        match_columns: usize,
        filter: Option<&Expr>,
    ) -> Result<usize> {
        let (info, matching, setting) = self.update_layout(table, columns, rows, match_columns)?;
        if rows.is_empty() {
            return Ok(0);
        }
        let name = format!(
            "taipan_update_{}",
            TEMP_TABLE_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let definitions = columns
            .iter()
            .map(|c| {
                let spec = info.require_column(c)?;
                Ok(format!("{c} {}", spec.column_type.sql_name()))
            })
            .collect::<Result<Vec<_>>>()?;

        self.with_transaction(|db| {
            db.execute(
                &format!("CREATE TEMP TABLE {name} ({})", definitions.join(", ")),
                &[],
            )?;
            let _guard = TempTable { db, name: &name };

            for chunk in rows.chunks(rows_per_statement(MAX_PARAMS, columns.len())) {
                let sql = format!(
                    "INSERT INTO temp.{name} ({}) VALUES {}",
                    columns.join(", "),
                    placeholders(chunk.len(), columns.len())
                );
                let params: Vec<Value> = chunk.iter().flatten().cloned().collect();
                db.execute(&sql, &params)?;
            }
            db.execute(
                &format!(
                    "CREATE INDEX temp.{name}_match ON {name} ({})",
                    matching.join(", ")
                ),
                &[],
            )?;

            let mut params = Vec::new();
            let sql = Self::update_from_sql(table, &name, matching, setting, filter, &mut params)?;
            let updated = db.execute(&sql, &params)?;
            info!("Updated {updated} rows of {table} from {} staged rows", rows.len());
            Ok(updated)
        })
    }

    /// Picks the inline or temporary-table update by batch size.
    pub fn bulk_update(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<Value>],
        match_columns: usize,
        filter: Option<&Expr>,
    ) -> Result<usize> {
        if rows.len() > self.settings().temp_table_threshold {
            self.update_rows_via_temp_table(table, columns, rows, match_columns, filter)
        } else {
            self.update_rows(table, columns, rows, match_columns, filter)
        }
    }

    /// Applies the same assignments to every row matching `filter`.
    pub fn update_rows_all(
        &self,
        table: &str,
        assignments: &[Assignment],
        filter: Option<&Expr>,
    ) -> Result<usize> {
        let info = self.table_info(table)?;
        if assignments.is_empty() {
            return Err(TaipanError::shape(format!("no assignments given for {table}")));
        }
        let mut params = Vec::new();
        let set = assignments
            .iter()
            .map(|assignment| {
                let column = assignment.column();
                check_identifier(column)?;
                info.require_column(column)?;
                Ok(match assignment {
                    Assignment::Set(_, value) => {
                        params.push(value.clone());
                        format!("{column} = ?")
                    }
                    Assignment::Increment(_, by) => {
                        params.push(Value::Int(*by));
                        format!("{column} = {column} + ?")
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut sql = format!("UPDATE {table} SET {}", set.join(", "));
        if let Some(filter) = filter {
            let fragment = filter.render_with(&|c| Self::bare_column(&info, c), &mut params)?;
            sql.push_str(&format!(" WHERE {fragment}"));
        }
        self.execute(&sql, &params)
    }

    /// [`Database::update_rows_all`] restricted to rows whose `key` is one of
    /// `ids`, issued in bounded chunks inside one transaction.
    pub fn update_rows_by_key(
        &self,
        table: &str,
        key: &str,
        ids: &[i64],
        assignments: &[Assignment],
        filter: Option<&Expr>,
    ) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.with_transaction(|db| {
            let mut updated = 0;
            for chunk in ids.chunks(MAX_PARAMS - FILTER_PARAMS) {
                let mut condition = Expr::in_list(key, chunk.iter().copied());
                if let Some(filter) = filter {
                    condition = condition.and(filter.clone());
                }
                updated += db.update_rows_all(table, assignments, Some(&condition))?;
            }
            Ok(updated)
        })
    }

    /// Deletes matching rows; dependent rows go through the schema's
    /// `ON DELETE CASCADE` declarations.
    pub fn delete_rows(&self, table: &str, filter: Option<&Expr>) -> Result<usize> {
        let info = self.table_info(table)?;
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM {table}");
        if let Some(filter) = filter {
            let fragment = filter.render_with(&|c| Self::bare_column(&info, c), &mut params)?;
            sql.push_str(&format!(" WHERE {fragment}"));
        }
        let deleted = self.execute(&sql, &params)?;
        debug!("Deleted {deleted} rows from {table}");
        Ok(deleted)
    }

    fn bare_column(info: &TableInfo, column: &str) -> Result<String> {
        check_identifier(column)?;
        info.require_column(column)?;
        Ok(column.to_string())
    }
}

/// Drops a session temporary table when it goes out of scope.
struct TempTable<'a> {
    db: &'a Database,
    name: &'a str,
}

impl Drop for TempTable<'_> {
    fn drop(&mut self) {
        let sql = format!("DROP TABLE IF EXISTS temp.{}", self.name);
        if let Err(e) = self.db.execute(&sql, &[]) {
            warn!("Failed to drop temporary table {}: {e}", self.name);
        }
    }
}
