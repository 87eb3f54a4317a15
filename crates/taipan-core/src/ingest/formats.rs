//! Registered catalogue formats.
//!
//! Each format maps source column names onto the columns of `field` or
//! `target`/`science_target`, with a transform per column. Formats are
//! selected by identifier only.

use crate::{models::TargetRole, query::Value};

/// Converts one raw cell into a stored value.
pub type Transform = fn(&str) -> Result<Value, String>;

/// What a catalogue populates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogueKind {
    Fields,
    Targets(TargetRole),
}

/// One source column and where it lands.
#[derive(Debug, Clone, Copy)]
pub struct ColumnMapping {
    pub source: &'static str,
    pub target: &'static str,
    pub transform: Transform,
}

impl ColumnMapping {
    pub const fn new(source: &'static str, target: &'static str, transform: Transform) -> Self {
        Self {
            source,
            target,
            transform,
        }
    }
}

/// A registered catalogue layout.
#[derive(Debug, Clone, Copy)]
pub struct CatalogueFormat {
    pub id: &'static str,
    pub description: &'static str,
    pub kind: CatalogueKind,
    pub columns: &'static [ColumnMapping],
}

pub fn integer(raw: &str) -> Result<Value, String> {
    raw.parse::<i64>()
        .map(Value::Int)
        .map_err(|_| format!("'{raw}' is not an integer"))
}

pub fn float(raw: &str) -> Result<Value, String> {
    raw.parse::<f64>()
        .map(Value::Float)
        .map_err(|_| format!("'{raw}' is not a number"))
}

/// Like [`float`], with `nan`, `null` and `-` read as missing.
pub fn optional_float(raw: &str) -> Result<Value, String> {
    match raw.to_ascii_lowercase().as_str() {
        "nan" | "null" | "-" => Ok(Value::Null),
        _ => float(raw),
    }
}

pub fn boolean(raw: &str) -> Result<Value, String> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "y" | "yes" => Ok(Value::Bool(true)),
        "0" | "f" | "false" | "n" | "no" => Ok(Value::Bool(false)),
        _ => Err(format!("'{raw}' is not a boolean")),
    }
}

/// Proper motions published in arcsec/yr, stored in mas/yr.
pub fn arcsec_to_mas(raw: &str) -> Result<Value, String> {
    match float(raw)? {
        Value::Float(v) => Ok(Value::Float(v * 1000.0)),
        other => Ok(other),
    }
}

pub static FIELDS: CatalogueFormat = CatalogueFormat {
    id: "fields",
    description: "Field centres: id, ra, dec",
    kind: CatalogueKind::Fields,
    columns: &[
        ColumnMapping::new("id", "field_id", integer),
        ColumnMapping::new("ra", "ra", float),
        ColumnMapping::new("dec", "dec", float),
    ],
};

pub static GUIDES: CatalogueFormat = CatalogueFormat {
    id: "guides",
    description: "Guide stars with proper motions",
    kind: CatalogueKind::Targets(TargetRole::Guide),
    columns: &[
        ColumnMapping::new("objID", "target_id", integer),
        ColumnMapping::new("ra", "ra", float),
        ColumnMapping::new("dec", "dec", float),
        ColumnMapping::new("pmRA", "pm_ra", float),
        ColumnMapping::new("pmDEC", "pm_dec", float),
        ColumnMapping::new("Vmag", "mag", optional_float),
    ],
};

pub static STANDARDS: CatalogueFormat = CatalogueFormat {
    id: "standards",
    description: "Spectrophotometric standards with proper motions",
    kind: CatalogueKind::Targets(TargetRole::Standard),
    columns: &[
        ColumnMapping::new("objID", "target_id", integer),
        ColumnMapping::new("ra", "ra", float),
        ColumnMapping::new("dec", "dec", float),
        ColumnMapping::new("pmRA", "pm_ra", float),
        ColumnMapping::new("pmDEC", "pm_dec", float),
        ColumnMapping::new("Vmag", "mag", optional_float),
    ],
};

pub static SKIES: CatalogueFormat = CatalogueFormat {
    id: "skies",
    description: "Blank-sky fibre positions",
    kind: CatalogueKind::Targets(TargetRole::Sky),
    columns: &[
        ColumnMapping::new("pkey_id", "target_id", integer),
        ColumnMapping::new("ra", "ra", float),
        ColumnMapping::new("dec", "dec", float),
    ],
};

pub static SCIENCE_V1: CatalogueFormat = CatalogueFormat {
    id: "science-v1",
    description: "Early science catalogue with T/F sub-survey flags",
    kind: CatalogueKind::Targets(TargetRole::Science),
    columns: &[
        ColumnMapping::new("uniqid", "target_id", integer),
        ColumnMapping::new("ra", "ra", float),
        ColumnMapping::new("dec", "dec", float),
        ColumnMapping::new("priority", "priority", integer),
        ColumnMapping::new("is_H0", "is_h0_target", boolean),
        ColumnMapping::new("is_vpec", "is_vpec_target", boolean),
        ColumnMapping::new("is_lowz", "is_lowz_target", boolean),
    ],
};

pub static SCIENCE_V2: CatalogueFormat = CatalogueFormat {
    id: "science-v2",
    description: "Science catalogue with magnitudes, difficulty and proper motions in arcsec/yr",
    kind: CatalogueKind::Targets(TargetRole::Science),
    columns: &[
        ColumnMapping::new("target_id", "target_id", integer),
        ColumnMapping::new("ra", "ra", float),
        ColumnMapping::new("dec", "dec", float),
        ColumnMapping::new("pm_ra", "pm_ra", arcsec_to_mas),
        ColumnMapping::new("pm_dec", "pm_dec", arcsec_to_mas),
        ColumnMapping::new("mag", "mag", optional_float),
        ColumnMapping::new("priority", "priority", integer),
        ColumnMapping::new("difficulty", "difficulty", integer),
        ColumnMapping::new("is_h0_target", "is_h0_target", boolean),
        ColumnMapping::new("is_vpec_target", "is_vpec_target", boolean),
        ColumnMapping::new("is_lowz_target", "is_lowz_target", boolean),
    ],
};

static REGISTRY: &[&CatalogueFormat] = &[&FIELDS, &GUIDES, &STANDARDS, &SKIES, &SCIENCE_V1, &SCIENCE_V2];

/// Every registered format.
pub fn formats() -> &'static [&'static CatalogueFormat] {
    REGISTRY
}

/// Looks a format up by identifier.
pub fn find_format(id: &str) -> Option<&'static CatalogueFormat> {
    REGISTRY.iter().copied().find(|f| f.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_identifier() {
        assert_eq!(find_format("science-v2").unwrap().columns.len(), 11);
        assert!(find_format("science.fits").is_none());
        let ids: Vec<_> = formats().iter().map(|f| f.id).collect();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn test_transforms() {
        assert_eq!(boolean("T").unwrap(), Value::Bool(true));
        assert!(boolean("maybe").is_err());
        assert_eq!(optional_float("NaN").unwrap(), Value::Null);
        assert_eq!(arcsec_to_mas("0.5").unwrap(), Value::Float(500.0));
        assert!(integer("1.5").is_err());
    }
}
