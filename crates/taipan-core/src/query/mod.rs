//! Typed predicates, values and condition descriptor parsing.

mod descriptor;
mod expr;
mod value;

pub use descriptor::{from_descriptors, Combinator, Descriptor, Operand};
pub use expr::{CaseBranch, CaseCondition, Expr, Op, SqlFragment};
pub use value::Value;

use crate::error::{Result, TaipanError};

/// Accepts `name` or `table.name` where each part is a plain SQL identifier.
///
/// Identifiers are interpolated into statement text, so anything else is
/// rejected before it reaches the driver.
pub(crate) fn check_identifier(name: &str) -> Result<()> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    let mut parts = name.split('.');
    let ok = match (parts.next(), parts.next(), parts.next()) {
        (Some(column), None, None) => valid_part(column),
        (Some(table), Some(column), None) => valid_part(table) && valid_part(column),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(TaipanError::invalid_input("identifier")
            .with_reason(format!("'{name}' is not a valid SQL identifier")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_identifier() {
        assert!(check_identifier("target_id").is_ok());
        assert!(check_identifier("field.ra").is_ok());
        assert!(check_identifier("_x1").is_ok());
        assert!(check_identifier("1abc").is_err());
        assert!(check_identifier("a.b.c").is_err());
        assert!(check_identifier("ra; DROP TABLE field").is_err());
        assert!(check_identifier("").is_err());
    }
}
