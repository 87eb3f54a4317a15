//! Fibre candidates and the science-target extension.

use std::{fmt, str::FromStr};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{
    db::Record,
    error::{Result, TaipanError},
    geometry::unit_vector,
    query::Value,
};

/// Reserved `target_id` marking an empty (sky) fibre on a tile.
pub const SKY_TARGET_ID: i64 = -1;

/// What a target is used for; exactly one role flag is set per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetRole {
    Science,
    Standard,
    Guide,
    Sky,
}

impl TargetRole {
    pub const ALL: [TargetRole; 4] = [
        TargetRole::Science,
        TargetRole::Standard,
        TargetRole::Guide,
        TargetRole::Sky,
    ];

    /// Boolean column in `target` flagging this role.
    pub fn flag_column(&self) -> &'static str {
        match self {
            TargetRole::Science => "is_science",
            TargetRole::Standard => "is_standard",
            TargetRole::Guide => "is_guide",
            TargetRole::Sky => "is_sky",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetRole::Science => "science",
            TargetRole::Standard => "standard",
            TargetRole::Guide => "guide",
            TargetRole::Sky => "sky",
        }
    }
}

impl FromStr for TargetRole {
    type Err = TaipanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "science" => Ok(TargetRole::Science),
            "standard" => Ok(TargetRole::Standard),
            "guide" => Ok(TargetRole::Guide),
            "sky" => Ok(TargetRole::Sky),
            _ => Err(TaipanError::invalid_input("role").with_reason(format!("unknown role '{s}'"))),
        }
    }
}

impl fmt::Display for TargetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub target_id: i64,
    pub ra: f64,
    pub dec: f64,
    pub pm_ra: f64,
    pub pm_dec: f64,
    pub mag: Option<f64>,
    pub ux: f64,
    pub uy: f64,
    pub uz: f64,
    pub role: TargetRole,
    pub is_active: bool,
}

impl Target {
    pub(crate) const COLUMNS: [&'static str; 14] = [
        "target_id",
        "ra",
        "dec",
        "pm_ra",
        "pm_dec",
        "mag",
        "ux",
        "uy",
        "uz",
        "is_science",
        "is_standard",
        "is_guide",
        "is_sky",
        "is_active",
    ];

    pub fn new(target_id: i64, ra: f64, dec: f64, role: TargetRole) -> Self {
        let [ux, uy, uz] = unit_vector(ra, dec);
        Self {
            target_id,
            ra,
            dec,
            pm_ra: 0.0,
            pm_dec: 0.0,
            mag: None,
            ux,
            uy,
            uz,
            role,
            is_active: true,
        }
    }

    pub fn unit_vector(&self) -> [f64; 3] {
        [self.ux, self.uy, self.uz]
    }

    pub(crate) fn from_record(record: &Record<'_>) -> Result<Self> {
        let role = TargetRole::ALL
            .into_iter()
            .map(|role| Ok((role, record.bool(role.flag_column())?)))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .find_map(|(role, set)| set.then_some(role));
        let target_id = record.i64("target_id")?;
        let role = role.ok_or_else(|| {
            TaipanError::data_integrity(format!("target {target_id} has no role flag set"))
        })?;
        Ok(Self {
            target_id,
            ra: record.f64("ra")?,
            dec: record.f64("dec")?,
            pm_ra: record.opt_f64("pm_ra")?.unwrap_or(0.0),
            pm_dec: record.opt_f64("pm_dec")?.unwrap_or(0.0),
            mag: record.opt_f64("mag")?,
            ux: record.f64("ux")?,
            uy: record.f64("uy")?,
            uz: record.f64("uz")?,
            role,
            is_active: record.bool("is_active")?,
        })
    }

    pub(crate) fn to_row(&self) -> Vec<Value> {
        let mut row = vec![
            self.target_id.into(),
            self.ra.into(),
            self.dec.into(),
            self.pm_ra.into(),
            self.pm_dec.into(),
            self.mag.into(),
            self.ux.into(),
            self.uy.into(),
            self.uz.into(),
        ];
        row.extend(TargetRole::ALL.iter().map(|r| Value::Bool(*r == self.role)));
        row.push(self.is_active.into());
        row
    }
}

/// A science target with its observing state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScienceTarget {
    pub target: Target,
    pub priority: i64,
    pub difficulty: i64,
    pub is_h0_target: bool,
    pub is_vpec_target: bool,
    pub is_lowz_target: bool,
    pub visits: i64,
    pub repeats: i64,
    pub observations: i64,
    /// Set once on first completion, never overwritten.
    pub done: Option<Timestamp>,
    pub success: bool,
}

impl ScienceTarget {
    pub(crate) const COLUMNS: [&'static str; 11] = [
        "target_id",
        "priority",
        "difficulty",
        "is_h0_target",
        "is_vpec_target",
        "is_lowz_target",
        "visits",
        "repeats",
        "observations",
        "done",
        "success",
    ];

    pub fn new(target: Target, priority: i64) -> Self {
        Self {
            target,
            priority,
            difficulty: 0,
            is_h0_target: false,
            is_vpec_target: false,
            is_lowz_target: false,
            visits: 0,
            repeats: 0,
            observations: 0,
            done: None,
            success: false,
        }
    }

    pub fn target_id(&self) -> i64 {
        self.target.target_id
    }

    pub(crate) fn from_record(record: &Record<'_>) -> Result<Self> {
        Ok(Self {
            target: Target::from_record(record)?,
            priority: record.i64("priority")?,
            difficulty: record.i64("difficulty")?,
            is_h0_target: record.bool("is_h0_target")?,
            is_vpec_target: record.bool("is_vpec_target")?,
            is_lowz_target: record.bool("is_lowz_target")?,
            visits: record.i64("visits")?,
            repeats: record.i64("repeats")?,
            observations: record.i64("observations")?,
            done: record.opt_timestamp("done")?,
            success: record.bool("success")?,
        })
    }

    pub(crate) fn to_row(&self) -> Vec<Value> {
        vec![
            self.target.target_id.into(),
            self.priority.into(),
            self.difficulty.into(),
            self.is_h0_target.into(),
            self.is_vpec_target.into(),
            self.is_lowz_target.into(),
            self.visits.into(),
            self.repeats.into(),
            self.observations.into(),
            self.done.into(),
            self.success.into(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in TargetRole::ALL {
            assert_eq!(role.as_str().parse::<TargetRole>().unwrap(), role);
        }
        assert!("planet".parse::<TargetRole>().is_err());
    }

    #[test]
    fn test_target_row_sets_single_flag() {
        let target = Target::new(3, 1.0, 2.0, TargetRole::Guide);
        let row = target.to_row();
        assert_eq!(row.len(), Target::COLUMNS.len());
        let flags: Vec<_> = row[9..13].iter().map(|v| v.as_bool().unwrap()).collect();
        assert_eq!(flags, vec![false, false, true, false]);
    }
}
