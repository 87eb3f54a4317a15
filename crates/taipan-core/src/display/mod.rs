//! Markdown formatting for survey records and operation reports.
//!
//! Domain records and reports implement [`std::fmt::Display`] directly (see
//! [`reports`]); collections are wrapped in newtypes from [`collections`]
//! so they can carry their own headers and empty-state messages. All output
//! is markdown, rendered by the CLI through its terminal renderer.
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │ Records/Reports │    │ Newtype Wrappers│    │    Markdown     │
//! │ (Field, Report) │───▶│ & Status Lines  │───▶│     Output      │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//! ```
//!
//! ```rust
//! use taipan_core::display::OperationStatus;
//!
//! let status = OperationStatus::success("Activated 3 fields");
//! assert!(status.to_string().starts_with("Success:"));
//! ```

pub mod collections;
pub mod datetime;
pub mod reports;
pub mod status;

pub use collections::{AssembledTiles, Fields, Formats, Versions};
pub use datetime::SurveyTime;
pub use status::OperationStatus;
