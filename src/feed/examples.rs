use std::{fmt::Write as _, io::ErrorKind, path::Path};

use serde::Serialize;
use tracing::{debug, warn};

/// A curated before/after listing from the knowledge base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedExample {
    pub url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub custom_label_0: Option<String>,
    pub custom_label_1: Option<String>,
    pub feedback: Option<String>,
    pub optimized_title: Option<String>,
}

impl FeedExample {
    fn slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        Some(match key {
            "URL" => &mut self.url,
            "TITLE" => &mut self.title,
            "DESCRIPTION" => &mut self.description,
            "CUSTOM_LABEL_0" => &mut self.custom_label_0,
            "CUSTOM_LABEL_1" => &mut self.custom_label_1,
            "FEEDBACK" => &mut self.feedback,
            "OPTIMIZED_TITLE" => &mut self.optimized_title,
            _ => return None,
        })
    }

    fn fields(&self) -> [(&'static str, Option<&str>); 7] {
        [
            ("URL", self.url.as_deref()),
            ("TITLE", self.title.as_deref()),
            ("DESCRIPTION", self.description.as_deref()),
            ("CUSTOM_LABEL_0", self.custom_label_0.as_deref()),
            ("CUSTOM_LABEL_1", self.custom_label_1.as_deref()),
            ("FEEDBACK", self.feedback.as_deref()),
            ("OPTIMIZED_TITLE", self.optimized_title.as_deref()),
        ]
    }

    fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_none())
    }
}

/// Split a knowledge-base file into `EXAMPLE n` blocks of `KEY: value` lines.
///
/// Text before the first block, unknown keys, and blocks without any known
/// key are ignored.
pub fn parse_examples(content: &str) -> Vec<FeedExample> {
    content
        .split("EXAMPLE ")
        .skip(1)
        .filter_map(|block| {
            let mut example = FeedExample::default();
            for line in block.lines() {
                let Some((key, value)) = line.trim().split_once(':') else {
                    continue;
                };
                if let Some(slot) = example.slot(key.trim()) {
                    *slot = Some(value.trim().to_string());
                }
            }
            (!example.is_empty()).then_some(example)
        })
        .collect()
}

/// Render examples as numbered blocks, skipping empty values.
pub fn format_examples(examples: &[FeedExample]) -> String {
    let mut out = String::new();
    for (i, example) in examples.iter().enumerate() {
        let _ = writeln!(out, "\nEXAMPLE {}:", i + 1);
        for (key, value) in example.fields() {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                let _ = writeln!(out, "{key}: {value}");
            }
        }
    }
    out
}

/// Read the knowledge base; a missing or unreadable file means no examples.
pub async fn load_examples(path: impl AsRef<Path>) -> Vec<FeedExample> {
    let path = path.as_ref();
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            let examples = parse_examples(&content);
            debug!(path = %path.display(), count = examples.len(), "knowledge base loaded");
            examples
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no knowledge base file");
            Vec::new()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "knowledge base unreadable");
            Vec::new()
        }
    }
}
