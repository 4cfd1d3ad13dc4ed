//! Required-column validation
//!
//! Compares the columns detected by server-side validation against the
//! canonical required-field contract. Comparison is case- and
//! whitespace-insensitive and order-independent; unknown extra columns are
//! ignored. A non-empty missing list blocks submission.

use crate::models::RequiredColumnSet;

/// Outcome of a column check: the required fields not found, in canonical
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnReport {
    pub missing: Vec<String>,
}

impl ColumnReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Checks detected headers against one configured required set.
#[derive(Debug, Clone)]
pub struct ColumnValidator {
    required: RequiredColumnSet,
}

impl ColumnValidator {
    pub fn new(required: RequiredColumnSet) -> Self {
        Self { required }
    }

    pub fn required(&self) -> &RequiredColumnSet {
        &self.required
    }

    /// Report the required fields missing from `detected`.
    pub fn validate<S: AsRef<str>>(&self, detected: &[S]) -> ColumnReport {
        let normalized: Vec<String> = detected
            .iter()
            .map(|c| normalize(c.as_ref()))
            .collect();

        let missing = self
            .required
            .fields()
            .iter()
            .filter(|field| !normalized.contains(&normalize(field)))
            .cloned()
            .collect();

        ColumnReport { missing }
    }
}

impl Default for ColumnValidator {
    fn default() -> Self {
        Self::new(RequiredColumnSet::default())
    }
}

fn normalize(column: &str) -> String {
    column.trim().to_lowercase()
}
