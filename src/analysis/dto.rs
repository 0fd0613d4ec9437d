use serde::{Deserialize, Serialize};

use crate::feed::ValidationReport;

/// Everything an advisor gets to see about one upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub sampled_table_as_text: String,
    pub merchant_url: String,
    pub validation_report_text: String,
    pub examples_text: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub columns: Vec<String>,
    pub row_count: usize,
    pub validation: ValidationReport,
    pub sample_text: String,
    pub advice: Option<String>,
}
