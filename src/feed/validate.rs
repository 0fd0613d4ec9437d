use std::fmt;

use serde::Serialize;

use super::{FeedError, FeedTable};

/// Which required fields a feed lacks, in the order they were required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub missing: Vec<String>,
}

impl ValidationReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn into_result(self) -> Result<(), FeedError> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(FeedError::MissingRequiredFields(self.missing))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_complete() {
            f.write_str("All required fields are present")
        } else {
            write!(f, "Missing required fields: {}", self.missing.join(", "))
        }
    }
}

/// Compare the table's canonical columns against `required`.
///
/// Required names are expected in canonical form; repeats are reported once.
pub fn validate<S: AsRef<str>>(table: &FeedTable, required: &[S]) -> ValidationReport {
    let mut missing: Vec<String> = Vec::new();
    for field in required {
        let field = field.as_ref();
        if !table.has_column(field) && !missing.iter().any(|m| m == field) {
            missing.push(field.to_string());
        }
    }
    ValidationReport { missing }
}
