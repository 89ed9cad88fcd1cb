use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, FromRequest, Path, Request},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    access_token::{decode_and_validate_access_token, issue_access_token, resolve_expires_in},
    config::Config,
    domain::{Chirp, DomainError, User, clean_chirp_body, validate_chirp_body},
    password::{PasswordError, verify_password},
    state::{ChirpStore, StoreError},
};


#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<ChirpStore>,
}

#[derive(Debug)]
pub struct ApiError {
    code: &'static str,
    message: String,
    status: StatusCode,
}

impl ApiError {
    fn new(code: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new("invalid_request", StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", StatusCode::NOT_FOUND, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", StatusCode::UNAUTHORIZED, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal", StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(e) => ApiError::not_found(e.to_string()),
            StoreError::Password(PasswordError::Empty) => {
                ApiError::invalid_request(value.to_string())
            }
            StoreError::Io(_) | StoreError::Decode(_) | StoreError::Password(_) => {
                error!(error = %value, "store operation failed");
                ApiError::internal(value.to_string())
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        Self::new(value.code(), StatusCode::BAD_REQUEST, value.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    axum::Json<T>: FromRequest<S>,
    <axum::Json<T> as FromRequest<S>>::Rejection: std::fmt::Display,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = axum::Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::invalid_request(e.to_string()))?;
        Ok(Self(value))
    }
}

#[derive(Debug, Deserialize)]
struct CreateChirpRequest {
    body: String,
}

#[derive(Debug, Deserialize)]
struct UserCredentialsRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
    #[serde(default)]
    expires_in_seconds: Option<i64>,
}

/// A user as clients see it: never includes the password hash.
#[derive(Debug, Serialize)]
struct PublicUser {
    id: u64,
    email: String,
}

impl From<User> for PublicUser {
    fn from(value: User) -> Self {
        Self {
            id: value.id,
            email: value.email,
        }
    }
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    id: u64,
    email: String,
    token: String,
}

pub fn build_router(config: Config, store: Arc<ChirpStore>) -> Router {
    let app_state = AppState {
        config: Arc::new(config),
        store,
    };

    let api = Router::new()
        .route("/healthz", get(healthz))
        .route("/chirps", post(create_chirp).get(list_chirps))
        .route("/chirps/:chirp_id", get(get_chirp))
        .route("/users", post(create_user).put(update_user))
        .route("/login", post(login));

    Router::new()
        .nest("/api", api)
        .fallback(fallback_not_found)
        .layer(Extension(app_state))
}

/// Store calls do blocking file I/O under a lock, so they run off the
/// async workers.
async fn with_store<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&ChirpStore) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| {
            error!(error = %e, "store task failed");
            ApiError::internal("store task failed")
        })?
}

async fn healthz() -> &'static str {
    "OK"
}

async fn fallback_not_found() -> ApiError {
    ApiError::not_found("not found")
}

async fn create_chirp(
    Extension(state): Extension<AppState>,
    ApiJson(req): ApiJson<CreateChirpRequest>,
) -> Result<(StatusCode, Json<Chirp>), ApiError> {
    validate_chirp_body(&req.body)?;
    let body = clean_chirp_body(&req.body);

    let chirp = with_store(&state, move |store| Ok(store.create_chirp(body)?)).await?;
    info!(chirp_id = chirp.id, "chirp posted");
    Ok((StatusCode::CREATED, Json(chirp)))
}

async fn list_chirps(Extension(state): Extension<AppState>) -> Result<Json<Vec<Chirp>>, ApiError> {
    let chirps = with_store(&state, |store| Ok(store.list_chirps()?)).await?;
    Ok(Json(chirps))
}

async fn get_chirp(
    Extension(state): Extension<AppState>,
    Path(chirp_id): Path<String>,
) -> Result<Json<Chirp>, ApiError> {
    let Ok(id) = chirp_id.parse::<u64>() else {
        return Err(ApiError::not_found(format!("chirp not found: {chirp_id}")));
    };
    let chirp = with_store(&state, move |store| Ok(store.get_chirp(id)?)).await?;
    Ok(Json(chirp))
}

fn validate_credentials(req: &UserCredentialsRequest) -> Result<(), ApiError> {
    if req.email.trim().is_empty() {
        return Err(ApiError::invalid_request("email is required"));
    }
    if req.password.is_empty() {
        return Err(ApiError::invalid_request("password is required"));
    }
    Ok(())
}

async fn create_user(
    Extension(state): Extension<AppState>,
    ApiJson(req): ApiJson<UserCredentialsRequest>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    validate_credentials(&req)?;

    let user = with_store(&state, move |store| {
        Ok(store.create_user(req.email, &req.password)?)
    })
    .await?;
    info!(user_id = user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

async fn login(
    Extension(state): Extension<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let LoginRequest {
        email,
        password,
        expires_in_seconds,
    } = req;
    let user = with_store(&state, move |store| {
        let user = match store.find_user_by_email(&email) {
            Ok(user) => user,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        // Argon2 verification is CPU-bound; it stays on the blocking pool.
        Ok(verify_password(&user.password_hash, &password).then_some(user))
    })
    .await?;

    let Some(user) = user else {
        warn!("login rejected");
        return Err(ApiError::unauthorized("Incorrect email or password"));
    };

    let token = issue_access_token(
        user.id,
        Utc::now(),
        resolve_expires_in(expires_in_seconds),
        &state.config.jwt_secret,
    )
    .map_err(|e| {
        error!(error = %e, "failed to issue access token");
        ApiError::internal(e.to_string())
    })?;

    info!(user_id = user.id, "user logged in");
    Ok(Json(LoginResponse {
        id: user.id,
        email: user.email,
        token,
    }))
}

async fn update_user(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<UserCredentialsRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    let Some(token) = extract_bearer_token(&headers) else {
        return Err(ApiError::unauthorized("missing or invalid authorization token"));
    };
    let user_id = decode_and_validate_access_token(&token, Utc::now(), &state.config.jwt_secret)
        .and_then(|claims| claims.user_id())
        .map_err(|e| {
            warn!(error = %e, "access token rejected");
            ApiError::unauthorized("missing or invalid authorization token")
        })?;
    validate_credentials(&req)?;

    let user = with_store(&state, move |store| {
        Ok(store.replace_user(user_id, req.email, &req.password)?)
    })
    .await?;
    info!(user_id = user.id, "user updated");
    Ok(Json(user.into()))
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::AUTHORIZATION)?;
    let raw = raw.to_str().ok()?;
    let raw = raw.strip_prefix("Bearer ")?.trim();
    if raw.is_empty() {
        return None;
    }
    Some(raw.to_string())
}
