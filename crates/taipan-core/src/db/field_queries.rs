//! Field reads and activation switches.

use log::info;

use super::{Assignment, InsertOptions, Select};
use crate::{
    error::Result,
    models::Field,
    query::{Expr, Value},
};

impl super::Database {
    /// Fields matching `filter`, ordered by ID.
    pub fn read_fields(&self, filter: Option<Expr>) -> Result<Vec<Field>> {
        let table = self.select(
            "field",
            &Select::new()
                .columns(Field::COLUMNS)
                .maybe_filter(filter)
                .order_by("field_id"),
        )?;
        table.records().map(|r| Field::from_record(&r)).collect()
    }

    /// Fields with the given IDs; absent IDs are simply not returned.
    pub fn read_fields_by_id(&self, field_ids: &[i64]) -> Result<Vec<Field>> {
        self.read_fields(Some(Expr::in_list("field_id", field_ids.iter().copied())))
    }

    pub fn read_active_fields(&self) -> Result<Vec<Field>> {
        self.read_fields(Some(Expr::eq("is_active", true)))
    }

    /// Every field ID in the table.
    pub fn field_ids(&self) -> Result<Vec<i64>> {
        self.select(
            "field",
            &Select::new().columns(["field_id"]).order_by("field_id"),
        )?
        .i64s("field_id")
    }

    /// Inserts fields, skipping IDs that already exist.
    pub fn insert_fields(&self, fields: &[Field]) -> Result<usize> {
        let rows: Vec<Vec<Value>> = fields.iter().map(Field::to_row).collect();
        self.insert_many_rows("field", &Field::COLUMNS, &rows, InsertOptions::skip_on_conflict())
    }

    /// Switches `is_active` for the listed fields.
    pub fn set_fields_active(&self, field_ids: &[i64], active: bool) -> Result<usize> {
        if field_ids.is_empty() {
            return Ok(0);
        }
        let updated = self.update_rows_all(
            "field",
            &[Assignment::set("is_active", active)],
            Some(&Expr::in_list("field_id", field_ids.iter().copied())),
        )?;
        info!(
            "Marked {updated} fields {}",
            if active { "active" } else { "inactive" }
        );
        Ok(updated)
    }

    pub fn activate_all_fields(&self) -> Result<usize> {
        self.update_rows_all("field", &[Assignment::set("is_active", true)], None)
    }
}

#[cfg(test)]
mod tests {
    use crate::{db::Database, models::Field, query::Expr};

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let fields: Vec<_> = (1..=3).map(|i| Field::new(i, 10.0 * i as f64, -30.0)).collect();
        assert_eq!(db.insert_fields(&fields).unwrap(), 3);
        db
    }

    #[test]
    fn test_insert_fields_skips_existing() {
        let db = seeded();
        assert_eq!(db.insert_fields(&[Field::new(2, 0.0, 0.0)]).unwrap(), 0);
        assert_eq!(db.field_ids().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_activation_switches() {
        let db = seeded();
        assert_eq!(db.set_fields_active(&[1, 3], false).unwrap(), 2);
        let active: Vec<_> = db
            .read_active_fields()
            .unwrap()
            .into_iter()
            .map(|f| f.field_id)
            .collect();
        assert_eq!(active, vec![2]);

        assert_eq!(db.activate_all_fields().unwrap(), 3);
        assert_eq!(db.read_fields(Some(Expr::eq("is_active", true))).unwrap().len(), 3);
    }

    #[test]
    fn test_read_fields_by_id_round_trips_positions() {
        let db = seeded();
        let fields = db.read_fields_by_id(&[2, 9]).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0], Field::new(2, 20.0, -30.0));
    }
}
