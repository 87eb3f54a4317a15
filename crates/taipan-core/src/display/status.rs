//! Status lines for operations without a richer report.

use std::fmt;

/// A one-line outcome, `Success:` or `Error:` followed by the message.
pub struct OperationStatus {
    pub message: String,
    pub success: bool,
}

impl OperationStatus {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: true,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: false,
        }
    }

    /// Outcome of a bulk update keyed by ID: a failure when fewer rows
    /// changed than IDs were given, since the rest matched nothing.
    pub fn for_updated(action: &str, changed: usize, requested: usize, noun: &str) -> Self {
        let message = format!("{action} {changed} of {requested} {noun}");
        if changed < requested {
            Self::failure(format!("{message}; {} IDs not found", requested - changed))
        } else {
            Self::success(message)
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = if self.success { "Success:" } else { "Error:" };
        writeln!(f, "{label} {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_ids_updated() {
        let status = OperationStatus::for_updated("Activated", 3, 3, "fields");
        assert!(status.success);
        assert_eq!(status.to_string(), "Success: Activated 3 of 3 fields\n");
    }

    #[test]
    fn test_missing_ids_fail() {
        let status = OperationStatus::for_updated("Deactivated", 1, 3, "fields");
        assert!(!status.success);
        assert_eq!(
            status.to_string(),
            "Error: Deactivated 1 of 3 fields; 2 IDs not found\n"
        );
    }
}
