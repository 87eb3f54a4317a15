//! Table definitions and the column type system.

mod definition;
mod types;

pub use definition::{
    builtin_definition, builtin_tables, ColumnDefinition, ForeignKey, TableDefinition,
};
pub use types::ColumnType;
