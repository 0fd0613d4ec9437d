use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{error, info, instrument};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RegisterRequest, RegisterResponse},
        jwt::JwtKeys,
        services::AuthError,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidUsername | AuthError::InvalidEmail | AuthError::WeakPassword(_) => {
                StatusCode::BAD_REQUEST
            }
            AuthError::DuplicateUsername | AuthError::DuplicateEmail => StatusCode::CONFLICT,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Status plus the message shown to the user; store causes stay in the logs.
    pub fn into_response_parts(self) -> (StatusCode, String) {
        let status = self.status();
        match self {
            AuthError::StoreUnavailable(e) => {
                error!(error = %format!("{e:#}"), "credential store unavailable");
                (status, "Service temporarily unavailable, please retry".into())
            }
            AuthError::DuplicateUsername => (status, "Username already exists!".into()),
            AuthError::DuplicateEmail => (status, "Email already registered!".into()),
            AuthError::InvalidCredentials => (status, "Invalid username or password!".into()),
            other => (status, other.to_string()),
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), (StatusCode, String)> {
    state
        .credentials
        .register(&payload.username, &payload.password, &payload.email)
        .await
        .map_err(AuthError::into_response_parts)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            username: payload.username,
            message: "Registration successful!",
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    state
        .credentials
        .verify(&payload.username, &payload.password)
        .await
        .map_err(AuthError::into_response_parts)?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = match keys.sign(&payload.username) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "jwt sign failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    info!("access token issued");
    Ok(Json(AuthResponse {
        access_token,
        token_type: "Bearer",
        username: payload.username,
    }))
}
