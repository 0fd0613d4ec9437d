use tracing::{info, instrument, warn};

use super::{
    advisor::FeedAdvisor,
    dto::{AnalysisInput, AnalyzeResponse},
};
use crate::{
    config::FeedConfig,
    feed::{self, FeedError, FeedFormat, FeedTable, ValidationReport},
};

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error("advisor failed: {0:#}")]
    Advisor(anyhow::Error),
}

/// An upload after normalization, validation and sampling.
#[derive(Debug, Clone)]
pub struct PreparedFeed {
    pub table: FeedTable,
    pub report: ValidationReport,
    pub sample: FeedTable,
}

/// Load, validate and sample an upload. No I/O.
///
/// In strict mode a feed missing required fields is rejected; otherwise the
/// gaps are only reported.
pub fn prepare(file_name: &str, data: &[u8], config: &FeedConfig) -> Result<PreparedFeed, FeedError> {
    let format = FeedFormat::from_file_name(file_name)?;
    let table = feed::load(data, format)?;
    let report = feed::validate(&table, &config.required_fields);
    if config.strict {
        report.clone().into_result()?;
    }
    let sample = feed::sample(&table, config.sample_size);
    Ok(PreparedFeed { table, report, sample })
}

/// Run one upload through the pipeline and ask the advisor about it.
#[instrument(skip(advisor, config, data), fields(bytes = data.len()))]
pub async fn analyze(
    advisor: &dyn FeedAdvisor,
    config: &FeedConfig,
    username: &str,
    file_name: &str,
    data: &[u8],
    merchant_url: &str,
) -> Result<AnalyzeResponse, AnalysisError> {
    let prepared = prepare(file_name, data, config).map_err(|e| {
        warn!(error = %e, "feed rejected");
        e
    })?;

    let examples = match &config.knowledge_base {
        Some(path) => feed::load_examples(path).await,
        None => Vec::new(),
    };

    let sample_text = prepared.sample.to_text();
    let input = AnalysisInput {
        sampled_table_as_text: sample_text.clone(),
        merchant_url: merchant_url.to_string(),
        validation_report_text: prepared.report.to_string(),
        examples_text: feed::format_examples(&examples),
    };
    let advice = advisor.advise(&input).await.map_err(AnalysisError::Advisor)?;

    info!(
        rows = prepared.table.row_count(),
        missing = prepared.report.missing.len(),
        advised = advice.is_some(),
        "feed analyzed"
    );
    Ok(AnalyzeResponse {
        columns: prepared.table.columns().to_vec(),
        row_count: prepared.table.row_count(),
        validation: prepared.report,
        sample_text,
        advice,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::analysis::advisor::NoopAdvisor;

    const FEED: &[u8] = b"Name,Desc,Price\nRed shoe,Leather,10 EUR\nBlue hat,Wool,5 EUR\n\
Scarf,Silk,7 EUR\nGloves,Cotton,3 EUR\nBelt,Leather,12 EUR\n";

    fn config() -> FeedConfig {
        FeedConfig {
            required_fields: vec!["title".into(), "description".into(), "price".into(), "link".into()],
            ..FeedConfig::default()
        }
    }

    #[derive(Default)]
    struct Recording(Mutex<Option<AnalysisInput>>);

    #[async_trait]
    impl FeedAdvisor for Recording {
        async fn advise(&self, input: &AnalysisInput) -> anyhow::Result<Option<String>> {
            *self.0.lock().unwrap() = Some(input.clone());
            Ok(Some("Add a link column".into()))
        }
    }

    struct Failing;

    #[async_trait]
    impl FeedAdvisor for Failing {
        async fn advise(&self, _input: &AnalysisInput) -> anyhow::Result<Option<String>> {
            anyhow::bail!("upstream timeout")
        }
    }

    #[test]
    fn prepare_reports_missing_link() {
        let prepared = prepare("feed.csv", FEED, &config()).unwrap();
        assert_eq!(prepared.table.columns(), ["title", "description", "price"]);
        assert_eq!(prepared.report.missing, vec!["link"]);
        assert_eq!(prepared.sample.row_count(), 3);
        assert_eq!(prepared.table.row_count(), 5);
    }

    #[test]
    fn strict_mode_rejects_incomplete_feed() {
        let cfg = FeedConfig { strict: true, ..config() };
        let err = prepare("feed.csv", FEED, &cfg).unwrap_err();
        assert!(matches!(err, FeedError::MissingRequiredFields(ref f) if f == &["link"]));
    }

    #[test]
    fn prepare_rejects_bad_uploads() {
        assert!(matches!(
            prepare("feed.pdf", FEED, &config()),
            Err(FeedError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            prepare("feed.xlsx", FEED, &config()),
            Err(FeedError::MalformedFeed(_))
        ));
        assert!(matches!(
            prepare("feed.csv", b"title,price\n", &config()),
            Err(FeedError::EmptyFeed)
        ));
    }

    #[tokio::test]
    async fn advisor_sees_sample_report_and_url() {
        let advisor = Recording::default();
        let response = analyze(&advisor, &config(), "alice", "feed.csv", FEED, "https://shop.example")
            .await
            .unwrap();
        assert_eq!(response.advice.as_deref(), Some("Add a link column"));
        assert_eq!(response.row_count, 5);

        let input = advisor.0.lock().unwrap().clone().unwrap();
        assert_eq!(input.merchant_url, "https://shop.example");
        assert_eq!(input.validation_report_text, "Missing required fields: link");
        assert_eq!(input.sampled_table_as_text, response.sample_text);
        assert_eq!(input.sampled_table_as_text.lines().count(), 4);
        assert!(input.examples_text.is_empty());
    }

    #[tokio::test]
    async fn knowledge_base_examples_reach_the_advisor() {
        let dir = tempfile::tempdir().unwrap();
        let kb = dir.path().join("examples.txt");
        tokio::fs::write(&kb, "EXAMPLE 1\nTITLE: Shoe\nOPTIMIZED_TITLE: Red Leather Shoe\n")
            .await
            .unwrap();
        let cfg = FeedConfig {
            knowledge_base: Some(kb),
            ..config()
        };
        let advisor = Recording::default();
        analyze(&advisor, &cfg, "alice", "feed.csv", FEED, "https://shop.example")
            .await
            .unwrap();
        let input = advisor.0.lock().unwrap().clone().unwrap();
        assert_eq!(input.examples_text, "\nEXAMPLE 1:\nTITLE: Shoe\nOPTIMIZED_TITLE: Red Leather Shoe\n");
    }

    #[tokio::test]
    async fn noop_advisor_returns_outcome_only() {
        let response = analyze(&NoopAdvisor, &config(), "alice", "feed.csv", FEED, "")
            .await
            .unwrap();
        assert!(response.advice.is_none());
        assert_eq!(response.validation.missing, vec!["link"]);
    }

    #[tokio::test]
    async fn advisor_failure_is_reported() {
        let err = analyze(&Failing, &config(), "alice", "feed.csv", FEED, "")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Advisor(_)));
        assert!(err.to_string().contains("upstream timeout"));
    }
}
