use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{error, instrument, warn};

use super::{
    dto::AnalyzeResponse,
    services::{self, AnalysisError},
};
use crate::{auth::AuthUser, state::AppState};

pub fn feed_routes() -> Router<AppState> {
    Router::new()
        .route("/feeds/analyze", post(analyze_feed))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

impl AnalysisError {
    pub fn status(&self) -> StatusCode {
        match self {
            AnalysisError::Feed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AnalysisError::Advisor(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn into_response_parts(self) -> (StatusCode, String) {
        let status = self.status();
        match self {
            AnalysisError::Advisor(e) => {
                error!(error = %format!("{e:#}"), "advisor failed");
                (status, "Feed analysis is temporarily unavailable".into())
            }
            other => (status, other.to_string()),
        }
    }
}

fn bad_request<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    warn!(error = %e, "bad multipart upload");
    (StatusCode::BAD_REQUEST, e.to_string())
}

/// POST /feeds/analyze (multipart)
/// Fields: `file` (csv/tsv/txt or spreadsheet upload) and `merchant_url`.
#[instrument(skip(state, mp))]
pub async fn analyze_feed(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    mut mp: Multipart,
) -> Result<Json<AnalyzeResponse>, (StatusCode, String)> {
    let mut upload = None;
    let mut merchant_url = String::new();
    while let Some(field) = mp.next_field().await.map_err(bad_request)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("feed.csv").to_string();
                let data = field.bytes().await.map_err(bad_request)?;
                upload = Some((file_name, data));
            }
            Some("merchant_url") => {
                merchant_url = field.text().await.map_err(bad_request)?.trim().to_string();
            }
            _ => {}
        }
    }
    let Some((file_name, data)) = upload else {
        return Err((StatusCode::BAD_REQUEST, "file is required".into()));
    };

    let response = services::analyze(
        state.advisor.as_ref(),
        &state.config.feed,
        &username,
        &file_name,
        &data,
        &merchant_url,
    )
    .await
    .map_err(AnalysisError::into_response_parts)?;
    Ok(Json(response))
}
