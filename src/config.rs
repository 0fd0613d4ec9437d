use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

/// Default required columns for a Merchant Center feed.
pub const DEFAULT_REQUIRED_FIELDS: [&str; 8] = [
    "id",
    "title",
    "description",
    "link",
    "image_link",
    "availability",
    "price",
    "condition",
];

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Credential store backend, chosen with `CREDENTIAL_STORE`.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    Memory,
    JsonFile {
        path: PathBuf,
    },
    Sqlite {
        url: String,
    },
    Mongo {
        uri: String,
        database: String,
    },
    Sheets {
        base_url: String,
        spreadsheet_id: String,
        range: String,
        access_token: String,
    },
}

impl StoreConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreConfig::Memory => "memory",
            StoreConfig::JsonFile { .. } => "json",
            StoreConfig::Sqlite { .. } => "sqlite",
            StoreConfig::Mongo { .. } => "mongo",
            StoreConfig::Sheets { .. } => "sheets",
        }
    }

    fn from_env() -> anyhow::Result<Self> {
        let kind = std::env::var("CREDENTIAL_STORE").unwrap_or_else(|_| "json".into());
        let cfg = match kind.trim().to_ascii_lowercase().as_str() {
            "memory" => StoreConfig::Memory,
            "json" | "file" => StoreConfig::JsonFile {
                path: std::env::var("USERS_FILE")
                    .unwrap_or_else(|_| "users.json".into())
                    .into(),
            },
            "sqlite" | "sql" => StoreConfig::Sqlite {
                url: std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://users.db".into()),
            },
            "mongo" | "mongodb" => StoreConfig::Mongo {
                uri: std::env::var("MONGO_URI").context("MONGO_URI must be set for the mongo store")?,
                database: std::env::var("MONGO_DATABASE").unwrap_or_else(|_| "feedcoach".into()),
            },
            "sheets" | "spreadsheet" => StoreConfig::Sheets {
                base_url: std::env::var("SHEETS_BASE_URL")
                    .unwrap_or_else(|_| "https://sheets.googleapis.com".into()),
                spreadsheet_id: std::env::var("SHEETS_SPREADSHEET_ID")
                    .context("SHEETS_SPREADSHEET_ID must be set for the sheets store")?,
                range: std::env::var("SHEETS_RANGE").unwrap_or_else(|_| "Users!A:D".into()),
                access_token: std::env::var("SHEETS_ACCESS_TOKEN")
                    .context("SHEETS_ACCESS_TOKEN must be set for the sheets store")?,
            },
            other => anyhow::bail!("unknown CREDENTIAL_STORE `{other}`"),
        };
        Ok(cfg)
    }
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub sample_size: usize,
    pub required_fields: Vec<String>,
    /// Reject uploads with missing required fields instead of reporting them.
    pub strict: bool,
    pub knowledge_base: Option<PathBuf>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            sample_size: 3,
            required_fields: DEFAULT_REQUIRED_FIELDS.iter().map(|f| f.to_string()).collect(),
            strict: false,
            knowledge_base: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdvisorConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub jwt: JwtConfig,
    pub feed: FeedConfig,
    pub advisor: AdvisorConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = StoreConfig::from_env()?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "feedcoach".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "feedcoach-merchants".into()),
            ttl_minutes: parse_ttl_minutes(std::env::var("JWT_TTL_MINUTES").ok().as_deref()),
        };

        let defaults = FeedConfig::default();
        let feed = FeedConfig {
            sample_size: std::env::var("FEED_SAMPLE_SIZE")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(defaults.sample_size),
            required_fields: std::env::var("FEED_REQUIRED_FIELDS")
                .ok()
                .map(|v| parse_field_list(&v))
                .filter(|fields| !fields.is_empty())
                .unwrap_or(defaults.required_fields),
            strict: std::env::var("FEED_STRICT")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            knowledge_base: std::env::var("KNOWLEDGE_BASE_FILE").ok().map(PathBuf::from),
        };

        let advisor = AdvisorConfig {
            url: std::env::var("ADVISOR_URL").ok().filter(|v| !v.is_empty()),
            api_key: std::env::var("ADVISOR_API_KEY").ok().filter(|v| !v.is_empty()),
        };

        Ok(Self {
            store,
            jwt,
            feed,
            advisor,
        })
    }
}

/// Longest accepted access-token lifetime: one year.
pub const MAX_TTL_MINUTES: i64 = 525_600;

/// Token lifetime in minutes, defaulting to 60 and clamped to
/// `1..=MAX_TTL_MINUTES`.
fn parse_ttl_minutes(raw: Option<&str>) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(60)
        .clamp(1, MAX_TTL_MINUTES)
}

/// Split a comma-separated list of field names, normalizing each the same way
/// feed headers are normalized.
fn parse_field_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(crate::feed::canonical_header)
        .filter(|f| !f.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_list_is_normalized() {
        assert_eq!(
            parse_field_list(" ID, Title ,image link,, Name"),
            vec!["id", "title", "image_link", "title"]
        );
    }

    #[test]
    fn ttl_is_clamped() {
        assert_eq!(parse_ttl_minutes(None), 60);
        assert_eq!(parse_ttl_minutes(Some("15")), 15);
        assert_eq!(parse_ttl_minutes(Some("abc")), 60);
        assert_eq!(parse_ttl_minutes(Some("0")), 1);
        assert_eq!(parse_ttl_minutes(Some("-5")), 1);
        assert_eq!(parse_ttl_minutes(Some("9223372036854775807")), MAX_TTL_MINUTES);
    }

    #[test]
    fn default_required_fields() {
        let cfg = FeedConfig::default();
        assert_eq!(cfg.sample_size, 3);
        assert_eq!(cfg.required_fields.len(), 8);
        assert!(cfg.required_fields.iter().any(|f| f == "image_link"));
    }
}
