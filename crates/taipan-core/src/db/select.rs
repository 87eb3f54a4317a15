//! Read side: projections, joins, counts and aggregates.

use std::fmt;

use super::{ColumnSpec, Database, Table, TableInfo};
use crate::{
    error::{Result, TaipanError},
    query::{check_identifier, Expr, Value},
    schema::ColumnType,
};

/// Keys per `IN` list in [`Database::select_joined_in`].
const KEY_CHUNK: usize = 10_000;

/// Projection options shared by every read operation.
#[derive(Debug, Clone, Default)]
pub struct Select {
    columns: Option<Vec<String>>,
    filter: Option<Expr>,
    distinct: bool,
    order_by: Vec<(String, bool)>,
    limit: Option<usize>,
}

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit column list; all columns of the source tables otherwise.
    /// Entries may be qualified as `table.column`.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn filter(mut self, filter: Expr) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Like [`Select::filter`] but accepts an optional predicate.
    pub fn maybe_filter(mut self, filter: Option<Expr>) -> Self {
        self.filter = filter;
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by.push((column.into(), false));
        self
    }

    pub fn order_by_desc(mut self, column: impl Into<String>) -> Self {
        self.order_by.push((column.into(), true));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Aggregate functions for scalar and grouped aggregate queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    CountDistinct,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    fn render(self, column: &str) -> String {
        match self {
            Aggregate::Count => format!("COUNT({column})"),
            Aggregate::CountDistinct => format!("COUNT(DISTINCT {column})"),
            Aggregate::Sum => format!("SUM({column})"),
            Aggregate::Avg => format!("AVG({column})"),
            Aggregate::Min => format!("MIN({column})"),
            Aggregate::Max => format!("MAX({column})"),
        }
    }

    fn result_type(self, input: ColumnType) -> ColumnType {
        match self {
            Aggregate::Count | Aggregate::CountDistinct => ColumnType::BigInt,
            Aggregate::Avg => ColumnType::Double,
            Aggregate::Sum => ColumnType::Any,
            Aggregate::Min | Aggregate::Max => input,
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Aggregate::Count => "count",
            Aggregate::CountDistinct => "count_distinct",
            Aggregate::Sum => "sum",
            Aggregate::Avg => "avg",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
        };
        write!(f, "{name}")
    }
}

/// How the source tables are combined.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Join<'a> {
    Inner,
    /// Left outer chain; one join column per table after the first.
    Left(&'a [&'a str]),
}

/// A resolved `FROM` clause plus the owner of every visible column.
pub(crate) struct Source {
    from: String,
    tables: Vec<TableInfo>,
    /// (column, owning table), first owner wins.
    owners: Vec<(ColumnSpec, String)>,
    qualify: bool,
}

impl Source {
    pub(crate) fn single(info: &TableInfo) -> Self {
        Self {
            from: info.name.clone(),
            tables: vec![info.clone()],
            owners: info
                .columns
                .iter()
                .map(|c| (c.clone(), info.name.clone()))
                .collect(),
            qualify: false,
        }
    }

    fn build(infos: &[TableInfo], join: Join<'_>) -> Result<Self> {
        let (first, rest) = infos
            .split_first()
            .ok_or_else(|| TaipanError::shape("no tables given"))?;
        let mut source = Self::single(first);
        if rest.is_empty() {
            return Ok(source);
        }
        source.qualify = true;

        if let Join::Left(columns) = join {
            if columns.len() != rest.len() {
                return Err(TaipanError::shape(format!(
                    "{} tables need {} join columns, got {}",
                    infos.len(),
                    rest.len(),
                    columns.len()
                )));
            }
        }

        for (i, info) in rest.iter().enumerate() {
            let clause = match join {
                Join::Inner => {
                    let conditions = source.inner_conditions(&infos[..=i], info)?;
                    format!(" JOIN {} ON {}", info.name, conditions.join(" AND "))
                }
                Join::Left(columns) => {
                    let column = columns[i];
                    check_identifier(column)?;
                    info.require_column(column)?;
                    let owner = source.owner(column).ok_or_else(|| TaipanError::UnknownColumn {
                        table: infos[..=i]
                            .iter()
                            .map(|t| t.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                        column: column.to_string(),
                    })?;
                    format!(
                        " LEFT JOIN {table} ON {owner}.{column} = {table}.{column}",
                        table = info.name
                    )
                }
            };
            source.from.push_str(&clause);
            source.tables.push(info.clone());
            for column in &info.columns {
                if source.owner(&column.name).is_none() {
                    source.owners.push((column.clone(), info.name.clone()));
                }
            }
        }
        Ok(source)
    }

    /// `left.k = right.k` for every key column `right` shares with the
    /// tables already joined.
    fn inner_conditions(&self, left: &[TableInfo], right: &TableInfo) -> Result<Vec<String>> {
        let conditions: Vec<String> = right
            .columns
            .iter()
            .filter_map(|column| {
                let name = column.name.as_str();
                let owner = left.iter().find(|t| t.has_column(name))?;
                let keyed = right.is_key_column(name)
                    || left.iter().any(|t| t.has_column(name) && t.is_key_column(name));
                keyed.then(|| format!("{}.{name} = {}.{name}", owner.name, right.name))
            })
            .collect();
        if conditions.is_empty() {
            return Err(TaipanError::NoJoinColumn {
                left: left
                    .iter()
                    .map(|t| t.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                right: right.name.clone(),
            });
        }
        Ok(conditions)
    }

    fn owner(&self, column: &str) -> Option<&str> {
        self.owners
            .iter()
            .find(|(spec, _)| spec.name == column)
            .map(|(_, owner)| owner.as_str())
    }

    fn spec(&self, column: &str) -> Option<&ColumnSpec> {
        self.owners
            .iter()
            .find(|(spec, _)| spec.name == column)
            .map(|(spec, _)| spec)
    }

    fn unknown(&self, column: &str) -> TaipanError {
        let tables: Vec<&str> = self.tables.iter().map(|t| t.name.as_str()).collect();
        TaipanError::UnknownColumn {
            table: tables.join(", "),
            column: column.to_string(),
        }
    }

    /// SQL reference for `column`, qualified with its owner when joining.
    pub(crate) fn resolve(&self, column: &str) -> Result<String> {
        check_identifier(column)?;
        if let Some((table, bare)) = column.split_once('.') {
            let known = self
                .tables
                .iter()
                .any(|t| t.name == table && t.has_column(bare));
            return if known {
                Ok(column.to_string())
            } else {
                Err(self.unknown(column))
            };
        }
        match self.owner(column) {
            Some(owner) if self.qualify => Ok(format!("{owner}.{column}")),
            Some(_) => Ok(column.to_string()),
            None => Err(self.unknown(column)),
        }
    }

    /// Result spec for a requested (possibly qualified) column.
    fn column_spec(&self, requested: &str) -> Result<ColumnSpec> {
        let bare = requested
            .split_once('.')
            .map_or(requested, |(_, column)| column);
        self.spec(bare)
            .cloned()
            .ok_or_else(|| self.unknown(requested))
    }

    /// Output column for a requested name: (SQL select item, result spec).
    fn projection(&self, requested: &str) -> Result<(String, ColumnSpec)> {
        let reference = self.resolve(requested)?;
        let spec = self.column_spec(requested)?;
        let bare = spec.name.as_str();
        let item = if reference == bare {
            reference
        } else {
            format!("{reference} AS {bare}")
        };
        Ok((item, spec))
    }

    fn where_clause(&self, filter: Option<&Expr>, params: &mut Vec<Value>) -> Result<String> {
        match filter {
            None => Ok(String::new()),
            Some(expr) => {
                let sql = expr.render_with(&|c| self.resolve(c), params)?;
                Ok(format!(" WHERE {sql}"))
            }
        }
    }
}

impl Database {
    pub(crate) fn source(&self, tables: &[&str], join: Join<'_>) -> Result<Source> {
        let infos = tables
            .iter()
            .map(|t| self.table_info(t))
            .collect::<Result<Vec<_>>>()?;
        Source::build(&infos, join)
    }

    fn run_select(&self, tables: &[&str], join: Join<'_>, options: &Select) -> Result<Table> {
        let source = self.source(tables, join)?;

        let (items, specs): (Vec<String>, Vec<ColumnSpec>) = match &options.columns {
            Some(columns) => columns
                .iter()
                .map(|c| source.projection(c))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .unzip(),
            None => source
                .owners
                .iter()
                .map(|(spec, _)| source.projection(&spec.name))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .unzip(),
        };

        let mut params = Vec::new();
        let mut sql = format!(
            "SELECT {}{} FROM {}",
            if options.distinct { "DISTINCT " } else { "" },
            items.join(", "),
            source.from
        );
        sql.push_str(&source.where_clause(options.filter.as_ref(), &mut params)?);
        if !options.order_by.is_empty() {
            let order = options
                .order_by
                .iter()
                .map(|(column, descending)| {
                    let reference = source.resolve(column)?;
                    Ok(if *descending {
                        format!("{reference} DESC")
                    } else {
                        reference
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
        }
        if let Some(limit) = options.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        self.query(&sql, &params, specs)
    }

    /// Filtered projection of one table.
    pub fn select(&self, table: &str, options: &Select) -> Result<Table> {
        self.run_select(&[table], Join::Inner, options)
    }

    /// Inner join across `tables`, each joined to the tables before it on
    /// their shared key columns. Adjacent tables with no shared key column
    /// are rejected with [`TaipanError::NoJoinColumn`].
    pub fn select_joined(&self, tables: &[&str], options: &Select) -> Result<Table> {
        self.run_select(tables, Join::Inner, options)
    }

    /// Left outer chain join; `join_columns[i]` links `tables[i + 1]` to the
    /// tables before it. Rows of the first table are always kept.
    pub fn select_left_joined(
        &self,
        tables: &[&str],
        join_columns: &[&str],
        options: &Select,
    ) -> Result<Table> {
        self.run_select(tables, Join::Left(join_columns), options)
    }

    /// [`Database::select_joined`] restricted to rows whose `key` is one of
    /// `ids`. Long ID lists are split across statements, so `distinct` and
    /// `limit` apply per statement.
    pub fn select_joined_in(
        &self,
        tables: &[&str],
        key: &str,
        ids: &[i64],
        options: &Select,
    ) -> Result<Table> {
        let chunks: Vec<&[i64]> = if ids.is_empty() {
            vec![ids]
        } else {
            ids.chunks(KEY_CHUNK).collect()
        };
        let mut merged: Option<Table> = None;
        for chunk in chunks {
            let mut chunk_options = options.clone();
            let condition = Expr::in_list(key, chunk.iter().copied());
            chunk_options.filter = Some(match chunk_options.filter.take() {
                Some(filter) => condition.and(filter),
                None => condition,
            });
            let table = self.run_select(tables, Join::Inner, &chunk_options)?;
            match merged.as_mut() {
                Some(all) => all.append(table),
                None => merged = Some(table),
            }
        }
        merged.ok_or_else(|| TaipanError::shape("no key chunks to select"))
    }

    /// Number of matching rows; 0 in dry-run mode.
    pub fn count(&self, tables: &[&str], filter: Option<&Expr>) -> Result<i64> {
        let source = self.source(tables, Join::Inner)?;
        let mut params = Vec::new();
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            source.from,
            source.where_clause(filter, &mut params)?
        );
        Ok(self
            .query_scalar(&sql, &params)?
            .and_then(|v| v.as_i64())
            .unwrap_or(0))
    }

    /// Row counts per distinct `group_by` combination, as a table with the
    /// group columns followed by `count`.
    pub fn count_grouped(
        &self,
        tables: &[&str],
        group_by: &[&str],
        filter: Option<&Expr>,
    ) -> Result<Table> {
        self.grouped(tables, group_by, "COUNT(*)", ColumnSpec::new("count", ColumnType::BigInt), filter)
    }

    /// Scalar aggregate; `None` for an empty match set or dry-run.
    pub fn select_aggregate(
        &self,
        tables: &[&str],
        aggregate: Aggregate,
        column: &str,
        filter: Option<&Expr>,
    ) -> Result<Option<Value>> {
        let source = self.source(tables, Join::Inner)?;
        let reference = source.resolve(column)?;
        let spec = source.column_spec(column)?;
        let mut params = Vec::new();
        let sql = format!(
            "SELECT {} FROM {}{}",
            aggregate.render(&reference),
            source.from,
            source.where_clause(filter, &mut params)?
        );
        let table = self.query(
            &sql,
            &params,
            vec![ColumnSpec::new(
                aggregate.to_string(),
                aggregate.result_type(spec.column_type),
            )],
        )?;
        Ok(table
            .into_rows()
            .into_iter()
            .next()
            .and_then(|mut row| row.pop())
            .filter(|v| !v.is_null()))
    }

    /// Aggregate per group: group columns followed by the aggregate column
    /// (named after the function, e.g. `sum`).
    pub fn select_grouped_aggregate(
        &self,
        tables: &[&str],
        aggregate: Aggregate,
        column: &str,
        group_by: &[&str],
        filter: Option<&Expr>,
    ) -> Result<Table> {
        let source = self.source(tables, Join::Inner)?;
        let reference = source.resolve(column)?;
        let input = source.column_spec(column)?.column_type;
        self.grouped(
            tables,
            group_by,
            &aggregate.render(&reference),
            ColumnSpec::new(aggregate.to_string(), aggregate.result_type(input)),
            filter,
        )
    }

    pub fn select_min(&self, tables: &[&str], column: &str, filter: Option<&Expr>) -> Result<Option<Value>> {
        self.select_aggregate(tables, Aggregate::Min, column, filter)
    }

    pub fn select_max(&self, tables: &[&str], column: &str, filter: Option<&Expr>) -> Result<Option<Value>> {
        self.select_aggregate(tables, Aggregate::Max, column, filter)
    }

    fn grouped(
        &self,
        tables: &[&str],
        group_by: &[&str],
        aggregate_sql: &str,
        aggregate_spec: ColumnSpec,
        filter: Option<&Expr>,
    ) -> Result<Table> {
        if group_by.is_empty() {
            return Err(TaipanError::shape("grouped queries need at least one group column"));
        }
        let source = self.source(tables, Join::Inner)?;
        let (items, mut specs): (Vec<String>, Vec<ColumnSpec>) = group_by
            .iter()
            .map(|c| source.projection(c))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .unzip();
        let keys = group_by
            .iter()
            .map(|c| source.resolve(c))
            .collect::<Result<Vec<_>>>()?;

        let mut params = Vec::new();
        let sql = format!(
            "SELECT {}, {aggregate_sql} AS {} FROM {}{} GROUP BY {} ORDER BY {}",
            items.join(", "),
            aggregate_spec.name,
            source.from,
            source.where_clause(filter, &mut params)?,
            keys.join(", "),
            keys.join(", ")
        );
        specs.push(aggregate_spec);
        self.query(&sql, &params, specs)
    }
}
