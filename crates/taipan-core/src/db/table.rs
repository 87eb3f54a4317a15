//! Structured query results: a fixed column schema plus ordered rows.

use jiff::Timestamp;

use crate::{
    error::{Result, TaipanError},
    query::Value,
    schema::ColumnType,
};

/// Name and decoded type of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Column-addressable result set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<ColumnSpec>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<ColumnSpec>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn empty(columns: Vec<ColumnSpec>) -> Self {
        Self::new(columns, Vec::new())
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    fn require_index(&self, name: &str) -> Result<usize> {
        self.index_of(name).ok_or_else(|| TaipanError::UnknownColumn {
            table: "result set".into(),
            column: name.into(),
        })
    }

    /// Cell at `row` in column `name`.
    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        let index = self.index_of(name)?;
        self.rows.get(row).map(|r| &r[index])
    }

    /// Every value of one column, in row order.
    pub fn column(&self, name: &str) -> Result<Vec<&Value>> {
        let index = self.require_index(name)?;
        Ok(self.rows.iter().map(|row| &row[index]).collect())
    }

    pub fn i64s(&self, name: &str) -> Result<Vec<i64>> {
        self.records().map(|r| r.i64(name)).collect()
    }

    pub fn f64s(&self, name: &str) -> Result<Vec<f64>> {
        self.records().map(|r| r.f64(name)).collect()
    }

    pub fn bools(&self, name: &str) -> Result<Vec<bool>> {
        self.records().map(|r| r.bool(name)).collect()
    }

    /// Appends the rows of a result with the same schema.
    pub(crate) fn append(&mut self, other: Table) {
        debug_assert_eq!(self.columns, other.columns);
        self.rows.extend(other.rows);
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(move |values| Record {
            table: self,
            values,
        })
    }
}

/// Borrowed view of one row, addressed by column name.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    table: &'a Table,
    values: &'a [Value],
}

impl<'a> Record<'a> {
    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    pub fn get(&self, name: &str) -> Result<&'a Value> {
        let index = self.table.require_index(name)?;
        Ok(&self.values[index])
    }

    fn typed<T>(&self, name: &str, what: &str, convert: impl Fn(&Value) -> Option<T>) -> Result<T> {
        let value = self.get(name)?;
        convert(value).ok_or_else(|| {
            TaipanError::data_integrity(format!("column {name} holds {value}, expected {what}"))
        })
    }

    fn optional<T>(
        &self,
        name: &str,
        what: &str,
        convert: impl Fn(&Value) -> Option<T>,
    ) -> Result<Option<T>> {
        match self.get(name)? {
            Value::Null => Ok(None),
            _ => self.typed(name, what, convert).map(Some),
        }
    }

    pub fn i64(&self, name: &str) -> Result<i64> {
        self.typed(name, "an integer", Value::as_i64)
    }

    pub fn opt_i64(&self, name: &str) -> Result<Option<i64>> {
        self.optional(name, "an integer", Value::as_i64)
    }

    pub fn f64(&self, name: &str) -> Result<f64> {
        self.typed(name, "a number", Value::as_f64)
    }

    pub fn opt_f64(&self, name: &str) -> Result<Option<f64>> {
        self.optional(name, "a number", Value::as_f64)
    }

    pub fn bool(&self, name: &str) -> Result<bool> {
        self.typed(name, "a boolean", Value::as_bool)
    }

    pub fn text(&self, name: &str) -> Result<String> {
        self.typed(name, "text", |v| v.as_str().map(str::to_string))
    }

    pub fn timestamp(&self, name: &str) -> Result<Timestamp> {
        self.typed(name, "a timestamp", Value::as_timestamp)
    }

    pub fn opt_timestamp(&self, name: &str) -> Result<Option<Timestamp>> {
        self.optional(name, "a timestamp", Value::as_timestamp)
    }
}
