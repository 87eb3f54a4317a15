//! Mapping from declared SQL column types to the in-memory type system.

use std::fmt;

/// In-memory type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Boolean,
    /// Character data with an optional fixed/maximum width.
    Text(Option<usize>),
    Timestamp,
    /// Expression results with no declared type (aggregates, literals).
    Any,
}

/// The single type table: declared name -> column type.
static TYPE_MAP: &[(&str, ColumnType)] = &[
    ("smallint", ColumnType::SmallInt),
    ("int2", ColumnType::SmallInt),
    ("integer", ColumnType::Integer),
    ("int", ColumnType::Integer),
    ("int4", ColumnType::Integer),
    ("bigint", ColumnType::BigInt),
    ("int8", ColumnType::BigInt),
    ("real", ColumnType::Real),
    ("float4", ColumnType::Real),
    ("double precision", ColumnType::Double),
    ("double", ColumnType::Double),
    ("float8", ColumnType::Double),
    ("boolean", ColumnType::Boolean),
    ("bool", ColumnType::Boolean),
    ("text", ColumnType::Text(None)),
    ("timestamp", ColumnType::Timestamp),
    ("timestamp without time zone", ColumnType::Timestamp),
];

static WIDTH_PREFIXES: &[&str] = &["character varying", "varchar", "character", "char"];

impl ColumnType {
    /// Looks up a declared type name; `None` if it has no mapping.
    pub fn from_declared(declared: &str) -> Option<ColumnType> {
        let normalized = declared
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();
        if normalized.is_empty() {
            return Some(ColumnType::Any);
        }
        if let Some((_, column_type)) = TYPE_MAP.iter().find(|(name, _)| *name == normalized) {
            return Some(*column_type);
        }
        WIDTH_PREFIXES.iter().find_map(|prefix| {
            let rest = normalized.strip_prefix(prefix)?.trim_start();
            let width = rest.strip_prefix('(')?.strip_suffix(')')?.trim();
            width.parse().ok().map(|n| ColumnType::Text(Some(n)))
        })
    }

    /// Declared name written into `CREATE TABLE` statements.
    pub fn sql_name(&self) -> String {
        match self {
            ColumnType::SmallInt => "smallint".into(),
            ColumnType::Integer => "integer".into(),
            ColumnType::BigInt => "bigint".into(),
            ColumnType::Real => "real".into(),
            ColumnType::Double => "double precision".into(),
            ColumnType::Boolean => "boolean".into(),
            ColumnType::Text(None) => "text".into(),
            ColumnType::Text(Some(n)) => format!("varchar({n})"),
            ColumnType::Timestamp => "timestamp".into(),
            ColumnType::Any => String::new(),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::SmallInt | ColumnType::Integer | ColumnType::BigInt
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Any => write!(f, "any"),
            other => write!(f, "{}", other.sql_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_names() {
        assert_eq!(ColumnType::from_declared("INTEGER"), Some(ColumnType::Integer));
        assert_eq!(
            ColumnType::from_declared("double  precision"),
            Some(ColumnType::Double)
        );
        assert_eq!(ColumnType::from_declared("boolean"), Some(ColumnType::Boolean));
        assert_eq!(ColumnType::from_declared(""), Some(ColumnType::Any));
    }

    #[test]
    fn test_width_extraction() {
        assert_eq!(
            ColumnType::from_declared("varchar(16)"),
            Some(ColumnType::Text(Some(16)))
        );
        assert_eq!(
            ColumnType::from_declared("char (8)"),
            Some(ColumnType::Text(Some(8)))
        );
        assert_eq!(
            ColumnType::from_declared("character varying(32)"),
            Some(ColumnType::Text(Some(32)))
        );
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(ColumnType::from_declared("geometry"), None);
        assert_eq!(ColumnType::from_declared("varchar(x)"), None);
    }

    #[test]
    fn test_sql_name_parses_back() {
        for column_type in [
            ColumnType::SmallInt,
            ColumnType::Double,
            ColumnType::Text(Some(12)),
            ColumnType::Timestamp,
        ] {
            assert_eq!(
                ColumnType::from_declared(&column_type.sql_name()),
                Some(column_type)
            );
        }
    }
}
