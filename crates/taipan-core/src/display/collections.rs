//! Newtype wrappers for displaying groups of records.

use std::fmt;

use crate::{
    assemble::AssembledTile,
    ingest::CatalogueFormat,
    models::{Field, VersionRecord},
};

/// Applied schema versions, oldest first.
pub struct Versions(pub Vec<VersionRecord>);

impl fmt::Display for Versions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No migrations applied.");
        }
        writeln!(f, "# Schema versions")?;
        writeln!(f)?;
        for record in &self.0 {
            write!(f, "{record}")?;
        }
        Ok(())
    }
}

pub struct Fields(pub Vec<Field>);

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No fields found.");
        }
        for field in &self.0 {
            write!(f, "{field}")?;
        }
        Ok(())
    }
}

pub struct AssembledTiles(pub Vec<AssembledTile>);

impl fmt::Display for AssembledTiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No tiles found.");
        }
        for (i, tile) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{tile}")?;
        }
        Ok(())
    }
}

/// Registered catalogue formats.
pub struct Formats(pub &'static [&'static CatalogueFormat]);

impl fmt::Display for Formats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Catalogue formats")?;
        writeln!(f)?;
        for format in self.0 {
            writeln!(f, "- `{}`: {}", format.id, format.description)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::formats;

    #[test]
    fn test_empty_collections() {
        assert_eq!(Versions(vec![]).to_string(), "No migrations applied.\n");
        assert_eq!(Fields(vec![]).to_string(), "No fields found.\n");
    }

    #[test]
    fn test_formats_listing() {
        let output = Formats(formats()).to_string();
        assert!(output.contains("`science-v2`"));
        assert!(output.contains("`skies`"));
    }

    #[test]
    fn test_inactive_field_marked() {
        let mut field = Field::new(3, 10.0, -30.0);
        field.is_active = false;
        let output = Fields(vec![field]).to_string();
        assert!(output.contains("Field 3 at (10.0000, -30.0000) (inactive)"));
    }
}
