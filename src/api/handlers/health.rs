use crate::api::state::AppState;
use crate::GIT_COMMIT_HASH;
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    /// `ok` when the volunteer repository answers, `error` otherwise.
    database: String,
}

impl Health {
    fn new(database_ok: bool) -> Self {
        Self {
            commit: GIT_COMMIT_HASH.to_string(),
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: if database_ok { "ok" } else { "error" }.to_string(),
        }
    }

    /// `name:version:short-commit`, the short commit empty for unknown builds.
    fn x_app(&self) -> String {
        let short_commit = self.commit.get(..7).filter(|_| self.commit.len() > 7);
        format!(
            "{}:{}:{}",
            self.name,
            self.version,
            short_commit.unwrap_or_default()
        )
    }
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Database is healthy", body = [Health]),
        (status = 503, description = "Database is unhealthy", body = [Health])
    ),
    tag= "health"
)]
// GET answers with the JSON body, OPTIONS only with status and headers.
pub async fn health(method: Method, state: Extension<Arc<AppState>>) -> Response {
    let database_ok = match state.volunteers().ping().await {
        Ok(()) => true,
        Err(err) => {
            error!("Failed to ping database: {err:#}");
            false
        }
    };
    let health = Health::new(database_ok);

    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(&health.x_app()) {
        Ok(value) => {
            headers.insert("X-App", value);
        }
        Err(err) => error!("Failed to build X-App header: {err}"),
    }

    let status = if database_ok {
        StatusCode::OK
    } else {
        debug!("Database connection is unhealthy");
        StatusCode::SERVICE_UNAVAILABLE
    };

    if method == Method::GET {
        (status, headers, Json(health)).into_response()
    } else {
        (status, headers, Body::empty()).into_response()
    }
}
