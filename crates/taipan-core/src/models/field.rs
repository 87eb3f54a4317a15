//! Telescope pointing centres.

use serde::{Deserialize, Serialize};

use crate::{db::Record, error::Result, geometry::unit_vector, query::Value};

/// A fixed pointing centre on the sky.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub field_id: i64,
    pub ra: f64,
    pub dec: f64,
    pub ux: f64,
    pub uy: f64,
    pub uz: f64,
    pub is_active: bool,
}

impl Field {
    pub(crate) const COLUMNS: [&'static str; 7] =
        ["field_id", "ra", "dec", "ux", "uy", "uz", "is_active"];

    /// An active field at (`ra`, `dec`) degrees with its unit vector filled in.
    pub fn new(field_id: i64, ra: f64, dec: f64) -> Self {
        let [ux, uy, uz] = unit_vector(ra, dec);
        Self {
            field_id,
            ra,
            dec,
            ux,
            uy,
            uz,
            is_active: true,
        }
    }

    pub fn unit_vector(&self) -> [f64; 3] {
        [self.ux, self.uy, self.uz]
    }

    pub(crate) fn from_record(record: &Record<'_>) -> Result<Self> {
        Ok(Self {
            field_id: record.i64("field_id")?,
            ra: record.f64("ra")?,
            dec: record.f64("dec")?,
            ux: record.f64("ux")?,
            uy: record.f64("uy")?,
            uz: record.f64("uz")?,
            is_active: record.bool("is_active")?,
        })
    }

    pub(crate) fn to_row(&self) -> Vec<Value> {
        vec![
            self.field_id.into(),
            self.ra.into(),
            self.dec.into(),
            self.ux.into(),
            self.uy.into(),
            self.uz.into(),
            self.is_active.into(),
        ]
    }
}
