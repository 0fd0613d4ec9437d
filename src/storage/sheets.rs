use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use time::{macros::format_description, OffsetDateTime, PrimitiveDateTime};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{ensure_unique, StoreError, UserRecord, UserStore};

pub const HEADER: [&str; 4] = ["username", "password_hash", "email", "created_at"];

const TIMESTAMP: &[time::format_description::FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AppendBody {
    values: Vec<Vec<String>>,
    major_dimension: &'static str,
}

/// Google Sheets range with a fixed header row and append-only inserts.
///
/// The sheet has no uniqueness constraint: `insert` re-reads the whole range
/// under a process-local lock before appending. Separate processes appending
/// to the same sheet are not serialized against each other.
pub struct SheetsStore {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    range: String,
    access_token: String,
    write_lock: Mutex<()>,
}

impl SheetsStore {
    pub async fn connect(
        base_url: &str,
        spreadsheet_id: &str,
        range: &str,
        access_token: &str,
    ) -> Result<Self, StoreError> {
        let store = Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            range: range.to_string(),
            access_token: access_token.to_string(),
            write_lock: Mutex::new(()),
        };
        let values = store.fetch_values().await?;
        if values.is_empty() {
            info!(range = %store.range, "writing header row to empty sheet");
            store
                .append_row(HEADER.iter().map(|h| h.to_string()).collect())
                .await?;
        }
        Ok(store)
    }

    fn values_url(&self, suffix: &str) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid sheets base url {}", self.base_url))
            .map_err(StoreError::Unavailable)?;
        let range = format!("{}{}", self.range, suffix);
        url.path_segments_mut()
            .map_err(|_| StoreError::unavailable(anyhow!("sheets base url cannot be a base")))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                range.as_str(),
            ]);
        Ok(url)
    }

    async fn fetch_values(&self) -> Result<Vec<Vec<String>>, StoreError> {
        let url = self.values_url("")?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("sheets values.get request")
            .map_err(StoreError::Unavailable)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::unavailable(anyhow!(
                "sheets values.get error: {} - {}",
                status,
                body
            )));
        }

        let range: ValueRange = response
            .json()
            .await
            .context("parse sheets values.get response")
            .map_err(StoreError::Unavailable)?;
        Ok(range.values)
    }

    async fn fetch_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let values = self.fetch_values().await?;
        parse_rows(&values)
    }

    async fn append_row(&self, row: Vec<String>) -> Result<(), StoreError> {
        let mut url = self.values_url(":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let body = AppendBody {
            values: vec![row],
            major_dimension: "ROWS",
        };
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .context("sheets values.append request")
            .map_err(StoreError::Unavailable)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::unavailable(anyhow!(
                "sheets values.append error: {} - {}",
                status,
                body
            )));
        }
        debug!(range = %self.range, "row appended");
        Ok(())
    }
}

/// Turn a value range (header row first) into user records.
fn parse_rows(values: &[Vec<String>]) -> Result<Vec<UserRecord>, StoreError> {
    let Some((header, rows)) = values.split_first() else {
        return Ok(Vec::new());
    };
    let position = |name: &str| {
        header
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| StoreError::unavailable(anyhow!("sheet header is missing `{name}`")))
    };
    let username_at = position("username")?;
    let hash_at = position("password_hash")?;
    let email_at = position("email")?;
    let created_at = header.iter().position(|h| h.trim() == "created_at");

    let cell = |row: &Vec<String>, i: usize| row.get(i).cloned().unwrap_or_default();
    let users = rows
        .iter()
        .filter(|row| !cell(row, username_at).is_empty())
        .map(|row| UserRecord {
            username: cell(row, username_at),
            password_hash: cell(row, hash_at),
            email: cell(row, email_at),
            created_at: created_at
                .map(|i| parse_timestamp(&cell(row, i)))
                .unwrap_or(OffsetDateTime::UNIX_EPOCH),
        })
        .collect();
    Ok(users)
}

fn parse_timestamp(raw: &str) -> OffsetDateTime {
    match PrimitiveDateTime::parse(raw.trim(), TIMESTAMP) {
        Ok(ts) => ts.assume_utc(),
        Err(e) => {
            warn!(value = raw, error = %e, "unparseable created_at in sheet");
            OffsetDateTime::UNIX_EPOCH
        }
    }
}

fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.format(TIMESTAMP).unwrap_or_default()
}

fn to_row(record: &UserRecord) -> Vec<String> {
    vec![
        record.username.clone(),
        record.password_hash.clone(),
        record.email.clone(),
        format_timestamp(record.created_at),
    ]
}

#[async_trait]
impl UserStore for SheetsStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.fetch_users().await?;
        Ok(users.into_iter().find(|u| u.username == username))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.fetch_users().await?;
        Ok(users.into_iter().find(|u| u.email == email))
    }

    async fn insert(&self, record: UserRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let users = self.fetch_users().await?;
        ensure_unique(&users, &record)?;
        self.append_row(to_row(&record)).await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.fetch_users().await?.len())
    }
}
