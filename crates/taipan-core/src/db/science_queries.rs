//! Target reads and science-target state transitions.
//!
//! The `done` column is a terminal marker: every write that sets it is
//! guarded with `done IS NULL`, so the first completion time is kept.

use jiff::Timestamp;
use log::info;

use super::{Assignment, InsertOptions, Select};
use crate::{
    error::{Result, TaipanError},
    models::{ScienceTarget, Target, TargetRole, SKY_TARGET_ID},
    query::{Expr, Value},
};

const TARGET_TABLES: [&str; 2] = ["target", "science_target"];

impl super::Database {
    /// Inserts catalogue targets, skipping IDs already present.
    pub fn insert_targets(&self, targets: &[Target]) -> Result<usize> {
        if let Some(sentinel) = targets.iter().find(|t| t.target_id == SKY_TARGET_ID) {
            return Err(TaipanError::invalid_input("target_id").with_reason(format!(
                "{} is reserved for empty fibres",
                sentinel.target_id
            )));
        }
        let rows: Vec<Vec<Value>> = targets.iter().map(Target::to_row).collect();
        self.insert_many_rows(
            "target",
            &Target::COLUMNS,
            &rows,
            InsertOptions::skip_on_conflict(),
        )
    }

    /// Inserts science targets: the `target` rows first, then their
    /// `science_target` extensions, in one transaction.
    pub fn insert_science_targets(&self, targets: &[ScienceTarget]) -> Result<usize> {
        if let Some(t) = targets.iter().find(|t| t.target.role != TargetRole::Science) {
            return Err(TaipanError::invalid_input("role").with_reason(format!(
                "target {} is a {} target, not science",
                t.target_id(),
                t.target.role
            )));
        }
        self.with_transaction(|db| {
            let base: Vec<Target> = targets.iter().map(|t| t.target.clone()).collect();
            db.insert_targets(&base)?;
            let rows: Vec<Vec<Value>> = targets.iter().map(ScienceTarget::to_row).collect();
            db.insert_many_rows(
                "science_target",
                &ScienceTarget::COLUMNS,
                &rows,
                InsertOptions::skip_on_conflict(),
            )
        })
    }

    /// Targets of one role (all roles when `None`), excluding the sky
    /// sentinel. Inactive targets are skipped unless `include_inactive`.
    pub fn read_targets(&self, role: Option<TargetRole>, include_inactive: bool) -> Result<Vec<Target>> {
        let mut filter = Expr::ne("target_id", SKY_TARGET_ID);
        if let Some(role) = role {
            filter = filter.and(Expr::eq(role.flag_column(), true));
        }
        if !include_inactive {
            filter = filter.and(Expr::eq("is_active", true));
        }
        let table = self.select(
            "target",
            &Select::new()
                .columns(Target::COLUMNS)
                .filter(filter)
                .order_by("target_id"),
        )?;
        table.records().map(|r| Target::from_record(&r)).collect()
    }

    /// Science targets joined with their catalogue rows.
    pub fn read_science_targets(&self, filter: Option<Expr>) -> Result<Vec<ScienceTarget>> {
        let table = self.select_joined(
            &TARGET_TABLES,
            &Select::new().maybe_filter(filter).order_by("target_id"),
        )?;
        table
            .records()
            .map(|r| ScienceTarget::from_record(&r))
            .collect()
    }

    /// Incomplete science targets that sit on no tile at all.
    pub fn unassigned_science_targets(&self) -> Result<Vec<i64>> {
        let table = self.select_left_joined(
            &["science_target", "target_field"],
            &["target_id"],
            &Select::new()
                .columns(["target_id"])
                .filter(Expr::is_null("tile_pk").and(Expr::is_null("done")))
                .order_by("target_id"),
        )?;
        table.i64s("target_id")
    }

    pub fn set_targets_active(&self, target_ids: &[i64], active: bool) -> Result<usize> {
        self.update_rows_by_key(
            "target",
            "target_id",
            target_ids,
            &[Assignment::set("is_active", active)],
            None,
        )
    }

    /// Writes `(target_id, priority)` pairs.
    pub fn set_priorities(&self, priorities: &[(i64, i64)]) -> Result<usize> {
        self.set_science_column("priority", priorities)
    }

    /// Writes `(target_id, difficulty)` pairs.
    pub fn set_difficulties(&self, difficulties: &[(i64, i64)]) -> Result<usize> {
        self.set_science_column("difficulty", difficulties)
    }

    fn set_science_column(&self, column: &str, pairs: &[(i64, i64)]) -> Result<usize> {
        let rows: Vec<Vec<Value>> = pairs
            .iter()
            .map(|(id, value)| vec![Value::Int(*id), Value::Int(*value)])
            .collect();
        let updated = self.bulk_update("science_target", &["target_id", column], &rows, 1, None)?;
        info!("Set {column} on {updated} science targets");
        Ok(updated)
    }

    /// Records one more partial observation of each target.
    pub fn increment_science_visits(&self, target_ids: &[i64]) -> Result<usize> {
        self.update_rows_by_key(
            "science_target",
            "target_id",
            target_ids,
            &[
                Assignment::increment("visits", 1),
                Assignment::increment("observations", 1),
            ],
            None,
        )
    }

    /// Closes a repeat cycle: `repeats` goes up by one and `visits` resets.
    ///
    /// With `set_done`, targets not yet complete are stamped with the current
    /// time; an existing `done` value is never overwritten. With `success`,
    /// the targets are also flagged successful.
    pub fn make_science_repeat_inc(
        &self,
        target_ids: &[i64],
        set_done: bool,
        success: bool,
    ) -> Result<usize> {
        self.with_transaction(|db| {
            let updated = db.update_rows_by_key(
                "science_target",
                "target_id",
                target_ids,
                &[
                    Assignment::increment("repeats", 1),
                    Assignment::set("visits", 0),
                ],
                None,
            )?;
            if set_done {
                let stamped = db.update_rows_by_key(
                    "science_target",
                    "target_id",
                    target_ids,
                    &[Assignment::set("done", Timestamp::now())],
                    Some(&Expr::is_null("done")),
                )?;
                info!("Marked {stamped} science targets done");
            }
            if success {
                db.update_rows_by_key(
                    "science_target",
                    "target_id",
                    target_ids,
                    &[Assignment::set("success", true)],
                    None,
                )?;
            }
            Ok(updated)
        })
    }

    /// Clears observing progress, for the listed targets or all of them.
    pub fn reset_science_progress(&self, target_ids: Option<&[i64]>) -> Result<usize> {
        let assignments = [
            Assignment::set("visits", 0),
            Assignment::set("repeats", 0),
            Assignment::set("observations", 0),
            Assignment::set("done", Value::Null),
            Assignment::set("success", false),
        ];
        match target_ids {
            Some(ids) => {
                self.update_rows_by_key("science_target", "target_id", ids, &assignments, None)
            }
            None => self.update_rows_all("science_target", &assignments, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let science: Vec<_> = (1..=4)
            .map(|i| {
                ScienceTarget::new(
                    Target::new(i, 10.0 + i as f64 * 0.1, -30.0, TargetRole::Science),
                    i,
                )
            })
            .collect();
        assert_eq!(db.insert_science_targets(&science).unwrap(), 4);
        db.insert_targets(&[Target::new(100, 10.0, -30.0, TargetRole::Guide)])
            .unwrap();
        db
    }

    fn done_of(db: &Database, id: i64) -> Option<Timestamp> {
        db.read_science_targets(Some(Expr::eq("target_id", id)))
            .unwrap()
            .remove(0)
            .done
    }

    #[test]
    fn test_read_targets_by_role() {
        let db = seeded();
        assert_eq!(db.read_targets(Some(TargetRole::Guide), false).unwrap().len(), 1);
        assert_eq!(db.read_targets(None, false).unwrap().len(), 5);
        let science = db.read_science_targets(None).unwrap();
        assert_eq!(science.iter().map(|t| t.priority).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_sentinel_id_rejected() {
        let db = seeded();
        let sentinel = Target::new(SKY_TARGET_ID, 0.0, 0.0, TargetRole::Sky);
        assert!(db.insert_targets(&[sentinel]).is_err());
    }

    #[test]
    fn test_done_is_written_once() {
        let db = seeded();
        db.make_science_repeat_inc(&[1], true, false).unwrap();
        let first = done_of(&db, 1).expect("done set");
        std::thread::sleep(std::time::Duration::from_millis(5));
        db.make_science_repeat_inc(&[1], true, true).unwrap();
        assert_eq!(done_of(&db, 1), Some(first));

        let target = db
            .read_science_targets(Some(Expr::eq("target_id", 1)))
            .unwrap()
            .remove(0);
        assert_eq!(target.repeats, 2);
        assert_eq!(target.visits, 0);
        assert!(target.success);
    }

    #[test]
    fn test_priorities_and_visits() {
        let db = seeded();
        assert_eq!(db.set_priorities(&[(1, 9), (2, 8)]).unwrap(), 2);
        assert_eq!(db.increment_science_visits(&[1, 1, 3]).unwrap(), 2);
        let targets = db.read_science_targets(None).unwrap();
        assert_eq!(targets[0].priority, 9);
        assert_eq!(targets[0].visits, 1);
        assert_eq!(targets[2].observations, 1);

        db.reset_science_progress(None).unwrap();
        assert!(db.read_science_targets(None).unwrap().iter().all(|t| t.visits == 0));
    }

    #[test]
    fn test_unassigned_targets() {
        let db = seeded();
        db.make_science_repeat_inc(&[4], true, true).unwrap();
        assert_eq!(db.unassigned_science_targets().unwrap(), vec![1, 2, 3]);
    }
}
