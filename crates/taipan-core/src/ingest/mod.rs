//! Catalogue loading.
//!
//! Catalogues are whitespace-delimited text: `#` lines are comments, the
//! first other line names the columns, and each following line is one row.
//! The registered [`CatalogueFormat`] chosen by the caller decides which
//! columns are read and how.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use log::info;

use crate::{
    db::Database,
    error::{Result, TaipanError},
    models::{Field, IngestReport, ScienceTarget, Target, TargetRole},
    query::Value,
};

pub mod formats;

pub use formats::{find_format, formats, CatalogueFormat, CatalogueKind, ColumnMapping};

/// One parsed row: target column name to value, plus its source line.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogueRow {
    pub line: usize,
    pub values: HashMap<&'static str, Value>,
}

/// Resolved rows ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub enum Catalogue {
    Fields(Vec<Field>),
    Targets(Vec<Target>),
    Science(Vec<ScienceTarget>),
}

impl Catalogue {
    pub fn len(&self) -> usize {
        match self {
            Catalogue::Fields(rows) => rows.len(),
            Catalogue::Targets(rows) => rows.len(),
            Catalogue::Science(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct RowContext<'a> {
    path: &'a Path,
    row: &'a CatalogueRow,
}

impl RowContext<'_> {
    fn error(&self, reason: impl Into<String>) -> TaipanError {
        TaipanError::Ingest {
            path: self.path.to_path_buf(),
            line: self.row.line,
            reason: reason.into(),
        }
    }

    fn value(&self, column: &str) -> Option<&Value> {
        self.row.values.get(column).filter(|v| !v.is_null())
    }

    fn i64(&self, column: &str) -> Result<i64> {
        self.value(column)
            .and_then(Value::as_i64)
            .ok_or_else(|| self.error(format!("missing integer {column}")))
    }

    fn f64(&self, column: &str) -> Result<f64> {
        self.value(column)
            .and_then(Value::as_f64)
            .ok_or_else(|| self.error(format!("missing number {column}")))
    }

    fn opt_i64(&self, column: &str) -> Option<i64> {
        self.value(column).and_then(Value::as_i64)
    }

    fn opt_f64(&self, column: &str) -> Option<f64> {
        self.value(column).and_then(Value::as_f64)
    }

    fn flag(&self, column: &str) -> bool {
        self.value(column).and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Splits catalogue text into rows and applies the format's transforms.
pub fn parse_rows(format: &CatalogueFormat, path: &Path, text: &str) -> Result<Vec<CatalogueRow>> {
    let error = |line: usize, reason: String| TaipanError::Ingest {
        path: path.to_path_buf(),
        line,
        reason,
    };
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'));

    let Some((header_line, header)) = lines.next() else {
        return Err(error(0, "no header line".into()));
    };
    let header: Vec<&str> = header.split_whitespace().collect();
    let positions = format
        .columns
        .iter()
        .map(|mapping| {
            header
                .iter()
                .position(|name| *name == mapping.source)
                .map(|index| (index, mapping))
                .ok_or_else(|| {
                    error(
                        header_line,
                        format!("column {} missing for format {}", mapping.source, format.id),
                    )
                })
        })
        .collect::<Result<Vec<_>>>()?;

    lines
        .map(|(line, text)| {
            let cells: Vec<&str> = text.split_whitespace().collect();
            if cells.len() != header.len() {
                return Err(error(
                    line,
                    format!("{} cells for {} header columns", cells.len(), header.len()),
                ));
            }
            let values = positions
                .iter()
                .map(|(index, mapping)| {
                    let value = (mapping.transform)(cells[*index])
                        .map_err(|reason| error(line, format!("{}: {reason}", mapping.source)))?;
                    Ok((mapping.target, value))
                })
                .collect::<Result<HashMap<_, _>>>()?;
            Ok(CatalogueRow { line, values })
        })
        .collect()
}

/// Turns parsed rows into domain records for the format's tables.
pub fn build_catalogue(format: &CatalogueFormat, path: &Path, rows: &[CatalogueRow]) -> Result<Catalogue> {
    match format.kind {
        CatalogueKind::Fields => rows
            .iter()
            .map(|row| {
                let ctx = RowContext { path, row };
                Ok(Field::new(ctx.i64("field_id")?, ctx.f64("ra")?, ctx.f64("dec")?))
            })
            .collect::<Result<Vec<_>>>()
            .map(Catalogue::Fields),
        CatalogueKind::Targets(role) => {
            let targets = rows
                .iter()
                .map(|row| {
                    let ctx = RowContext { path, row };
                    let mut target = Target::new(ctx.i64("target_id")?, ctx.f64("ra")?, ctx.f64("dec")?, role);
                    target.pm_ra = ctx.opt_f64("pm_ra").unwrap_or(0.0);
                    target.pm_dec = ctx.opt_f64("pm_dec").unwrap_or(0.0);
                    target.mag = ctx.opt_f64("mag");
                    if role != TargetRole::Science {
                        return Ok(ScienceTarget::new(target, 0));
                    }
                    let mut science = ScienceTarget::new(target, ctx.opt_i64("priority").unwrap_or(0));
                    science.difficulty = ctx.opt_i64("difficulty").unwrap_or(0);
                    science.is_h0_target = ctx.flag("is_h0_target");
                    science.is_vpec_target = ctx.flag("is_vpec_target");
                    science.is_lowz_target = ctx.flag("is_lowz_target");
                    Ok(science)
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(if role == TargetRole::Science {
                Catalogue::Science(targets)
            } else {
                Catalogue::Targets(targets.into_iter().map(|s| s.target).collect())
            })
        }
    }
}

/// Loads one catalogue file in the named format.
///
/// Rows whose key already exists are skipped, so reloading a file is
/// harmless. Nothing is written if any row fails to parse.
pub fn load_catalogue(db: &Database, format_id: &str, path: &Path) -> Result<IngestReport> {
    let format = find_format(format_id).ok_or_else(|| {
        let known: Vec<_> = formats().iter().map(|f| f.id).collect();
        TaipanError::invalid_input("format").with_reason(format!(
            "unknown catalogue format '{format_id}', expected one of {}",
            known.join(", ")
        ))
    })?;
    let text = fs::read_to_string(path).map_err(|e| TaipanError::FileSystem {
        path: path.to_path_buf(),
        source: e,
    })?;
    let rows = parse_rows(format, path, &text)?;
    let catalogue = build_catalogue(format, path, &rows)?;

    let rows_inserted = db.with_transaction(|db| match &catalogue {
        Catalogue::Fields(fields) => db.insert_fields(fields),
        Catalogue::Targets(targets) => db.insert_targets(targets),
        Catalogue::Science(targets) => db.insert_science_targets(targets),
    })?;
    info!(
        "Loaded {} as {}: {} rows read, {rows_inserted} inserted",
        path.display(),
        format.id,
        catalogue.len()
    );
    Ok(IngestReport {
        format: format.id.to_string(),
        path: PathBuf::from(path),
        rows_read: catalogue.len(),
        rows_inserted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCIENCE: &str = "\
# taipan science sample
target_id ra dec pm_ra pm_dec mag priority difficulty is_h0_target is_vpec_target is_lowz_target
1 10.0 -30.0 0.001 0.0 17.2 5 2 1 0 0
2 10.5 -30.5 0.0 0.0 nan 3 1 0 1 0
";

    #[test]
    fn test_parse_science_rows() {
        let format = find_format("science-v2").unwrap();
        let rows = parse_rows(format, Path::new("sci.txt"), SCIENCE).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line, 3);
        let Catalogue::Science(targets) = build_catalogue(format, Path::new("sci.txt"), &rows).unwrap() else {
            panic!("expected science targets");
        };
        assert_eq!(targets[0].priority, 5);
        assert!(targets[0].is_h0_target);
        assert_eq!(targets[1].target.mag, None);
        assert!(targets[1].is_vpec_target);
    }

    #[test]
    fn test_bad_cell_reports_line() {
        let format = find_format("fields").unwrap();
        let text = "id ra dec\n1 10.0 -30.0\n2 ten -30.0\n";
        let err = parse_rows(format, Path::new("f.txt"), text).unwrap_err();
        assert!(matches!(err, TaipanError::Ingest { line: 3, .. }));
    }

    #[test]
    fn test_missing_header_column() {
        let format = find_format("guides").unwrap();
        let err = parse_rows(format, Path::new("g.txt"), "objID ra dec\n").unwrap_err();
        assert!(matches!(err, TaipanError::Ingest { line: 1, .. }));
    }

    #[test]
    fn test_load_is_repeatable() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), SCIENCE).unwrap();

        let first = load_catalogue(&db, "science-v2", file.path()).unwrap();
        assert_eq!((first.rows_read, first.rows_inserted), (2, 2));
        let second = load_catalogue(&db, "science-v2", file.path()).unwrap();
        assert_eq!(second.rows_inserted, 0);
        assert_eq!(db.read_science_targets(None).unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_format() {
        let db = Database::dry_run();
        let err = load_catalogue(&db, "catalogue.fits", Path::new("x")).unwrap_err();
        assert!(matches!(err, TaipanError::InvalidInput { .. }));
    }
}
