//! Database connection handling and the execution backends.
//!
//! Every query and mutation in the crate is built as SQL text plus bound
//! parameters and handed to [`Database`], which either runs it against a
//! SQLite connection or, in dry-run mode, records it and reports an empty
//! outcome. Specialised operations live in submodules as `impl Database`
//! blocks.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    path::Path,
};

use log::debug;
use rusqlite::{params_from_iter, Connection};

use crate::{
    config::DbConfig,
    error::{DatabaseResultExt, Result},
    query::Value,
    schema::ColumnType,
};

pub mod field_queries;
pub mod introspect;
pub mod migrations;
pub mod mutate;
pub mod science_queries;
pub mod select;
pub mod table;
pub mod tile_queries;

pub use introspect::{ForeignKeyInfo, TableInfo};
pub use migrations::{Migration, MigrationDriver};
pub use mutate::{Assignment, InsertOptions};
pub use select::{Aggregate, Select};
pub use table::{ColumnSpec, Record, Table};

/// Statements captured by a dry-run backend.
#[derive(Debug, Default)]
pub struct StatementLog {
    statements: RefCell<Vec<String>>,
}

impl StatementLog {
    fn record(&self, sql: &str) {
        self.statements.borrow_mut().push(sql.to_string());
    }
}

/// Where statements go.
#[derive(Debug)]
pub enum Backend {
    Live(Connection),
    DryRun(StatementLog),
}

/// Tunables copied from [`DbConfig`] at construction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Settings {
    pub batch_size: usize,
    pub temp_table_threshold: usize,
}

impl From<&DbConfig> for Settings {
    fn from(config: &DbConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            temp_table_threshold: config.temp_table_threshold,
        }
    }
}

/// Database connection and operations handler.
#[derive(Debug)]
pub struct Database {
    backend: Backend,
    settings: Settings,
    depth: Cell<usize>,
    table_cache: RefCell<HashMap<String, TableInfo>>,
}

impl Database {
    /// Opens (creating if needed) a SQLite file with default settings.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &DbConfig::default())
    }

    /// Opens a SQLite file using the timeouts and batch sizes of `config`.
    pub fn open_with<P: AsRef<Path>>(path: P, config: &DbConfig) -> Result<Self> {
        let connection =
            Connection::open(path.as_ref()).db_context("Failed to open database connection")?;
        Self::configure(&connection, config, true)?;
        debug!("Opened database {}", path.as_ref().display());
        Ok(Self::with_backend(Backend::Live(connection), config))
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let config = DbConfig::default();
        let connection =
            Connection::open_in_memory().db_context("Failed to open in-memory database")?;
        Self::configure(&connection, &config, false)?;
        Ok(Self::with_backend(Backend::Live(connection), &config))
    }

    /// A backend that builds and records statements without executing them.
    pub fn dry_run() -> Self {
        Self::dry_run_with(&DbConfig::default())
    }

    pub fn dry_run_with(config: &DbConfig) -> Self {
        Self::with_backend(Backend::DryRun(StatementLog::default()), config)
    }

    fn with_backend(backend: Backend, config: &DbConfig) -> Self {
        Self {
            backend,
            settings: Settings::from(config),
            depth: Cell::new(0),
            table_cache: RefCell::new(HashMap::new()),
        }
    }

    fn configure(connection: &Connection, config: &DbConfig, wal: bool) -> Result<()> {
        connection
            .execute("PRAGMA foreign_keys = ON", [])
            .db_context("Failed to enable foreign keys")?;
        connection
            .busy_timeout(config.busy_timeout())
            .db_context("Failed to set busy timeout")?;
        if wal {
            let mode: String = connection
                .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
                .db_context("Failed to enable WAL journaling")?;
            debug!("Journal mode: {mode}");
        }
        Ok(())
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self.backend, Backend::DryRun(_))
    }

    /// Statements recorded so far by a dry-run backend; empty when live.
    pub fn statements(&self) -> Vec<String> {
        match &self.backend {
            Backend::DryRun(log) => log.statements.borrow().clone(),
            Backend::Live(_) => Vec::new(),
        }
    }

    pub(crate) fn settings(&self) -> Settings {
        self.settings
    }

    /// Executes one statement, returning the number of affected rows.
    pub(crate) fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        debug!("{sql} [{} params]", params.len());
        match &self.backend {
            Backend::DryRun(log) => {
                log.record(sql);
                Ok(0)
            }
            Backend::Live(connection) => connection
                .execute(sql, params_from_iter(params.iter()))
                .db_context("Failed to execute statement"),
        }
    }

    /// Runs several parameterless statements; drops cached table metadata
    /// since these are usually schema changes.
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        debug!("{sql}");
        self.table_cache.borrow_mut().clear();
        match &self.backend {
            Backend::DryRun(log) => {
                log.record(sql);
                Ok(())
            }
            Backend::Live(connection) => connection
                .execute_batch(sql)
                .db_context("Failed to execute statements"),
        }
    }

    /// Runs a query and decodes every row using `columns`.
    pub(crate) fn query(&self, sql: &str, params: &[Value], columns: Vec<ColumnSpec>) -> Result<Table> {
        debug!("{sql} [{} params]", params.len());
        let connection = match &self.backend {
            Backend::DryRun(log) => {
                log.record(sql);
                return Ok(Table::empty(columns));
            }
            Backend::Live(connection) => connection,
        };

        let mut statement = connection
            .prepare(sql)
            .db_context("Failed to prepare query")?;
        let mut rows = statement
            .query(params_from_iter(params.iter()))
            .db_context("Failed to run query")?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().db_context("Failed to read row")? {
            let values = columns
                .iter()
                .enumerate()
                .map(|(i, spec)| {
                    row.get_ref(i)
                        .map(|raw| Value::decode(raw, &spec.column_type))
                })
                .collect::<rusqlite::Result<Vec<_>>>()
                .db_context("Failed to decode row")?;
            out.push(values);
        }
        Ok(Table::new(columns, out))
    }

    /// First column of the first row, `None` for no rows or dry-run.
    pub(crate) fn query_scalar(&self, sql: &str, params: &[Value]) -> Result<Option<Value>> {
        let table = self.query(
            sql,
            params,
            vec![ColumnSpec::new("value", ColumnType::Any)],
        )?;
        Ok(table.into_rows().into_iter().next().and_then(|mut row| row.pop()))
    }

    /// Runs `f` atomically.
    ///
    /// The outermost call opens an immediate transaction; nested calls use
    /// savepoints, so helpers can be composed freely. On error everything
    /// `f` wrote is rolled back and the error returned.
    pub fn with_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let depth = self.depth.get();
        let connection = match &self.backend {
            Backend::DryRun(_) => {
                self.depth.set(depth + 1);
                let outcome = f(self);
                self.depth.set(depth);
                return outcome;
            }
            Backend::Live(connection) => connection,
        };

        let savepoint = format!("taipan_sp_{depth}");
        let outermost = depth == 0 && connection.is_autocommit();
        let (begin, commit, rollback) = if outermost {
            (
                "BEGIN IMMEDIATE".to_string(),
                "COMMIT".to_string(),
                "ROLLBACK".to_string(),
            )
        } else {
            (
                format!("SAVEPOINT {savepoint}"),
                format!("RELEASE {savepoint}"),
                format!("ROLLBACK TO {savepoint}; RELEASE {savepoint}"),
            )
        };

        connection
            .execute_batch(&begin)
            .db_context("Failed to begin transaction")?;
        self.depth.set(depth + 1);
        let outcome = f(self);
        self.depth.set(depth);

        match outcome {
            Ok(value) => {
                connection
                    .execute_batch(&commit)
                    .db_context("Failed to commit transaction")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_error) = connection.execute_batch(&rollback) {
                    log::error!("Rollback failed: {rollback_error}");
                }
                self.table_cache.borrow_mut().clear();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaipanError;

    #[test]
    fn test_dry_run_records_statements() {
        let db = Database::dry_run();
        assert!(db.is_dry_run());
        assert_eq!(db.execute("DELETE FROM tile", &[]).unwrap(), 0);
        assert_eq!(db.statements(), vec!["DELETE FROM tile".to_string()]);
    }

    #[test]
    fn test_transaction_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        db.execute_batch("CREATE TABLE t (x integer)").unwrap();

        let result: Result<()> = db.with_transaction(|db| {
            db.execute("INSERT INTO t (x) VALUES (?)", &[Value::Int(1)])?;
            Err(TaipanError::shape("forced"))
        });
        assert!(result.is_err());
        let count = db.query_scalar("SELECT COUNT(*) FROM t", &[]).unwrap();
        assert_eq!(count, Some(Value::Int(0)));
    }

    #[test]
    fn test_nested_transaction_uses_savepoint() {
        let db = Database::open_in_memory().unwrap();
        db.execute_batch("CREATE TABLE t (x integer)").unwrap();

        db.with_transaction(|db| {
            db.execute("INSERT INTO t (x) VALUES (1)", &[])?;
            let inner: Result<()> = db.with_transaction(|db| {
                db.execute("INSERT INTO t (x) VALUES (2)", &[])?;
                Err(TaipanError::shape("inner"))
            });
            assert!(inner.is_err());
            Ok(())
        })
        .unwrap();

        let count = db.query_scalar("SELECT COUNT(*) FROM t", &[]).unwrap();
        assert_eq!(count, Some(Value::Int(1)));
    }
}
