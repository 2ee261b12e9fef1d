use crate::{
    api::handlers::health,
    documents::LocalDocumentStore,
    email::LogEmailSender,
    otp::{spawn_sweeper, OtpConfig, OtpStore},
    volunteers::postgres::PgVolunteerRepository,
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Extension, MatchedPath},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::options,
    Router,
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    services::ServeDir,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;
mod state;

pub use openapi::openapi;
pub use state::{AppConfig, AppState};

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Everything [`new`] needs besides the database.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub port: u16,
    pub public_base_url: String,
    pub app: AppConfig,
    pub otp: OtpConfig,
    pub sweep_interval: Duration,
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(dsn: SecretString, options: ServerOptions) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn.expose_secret())
        .await
        .context("Failed to connect to database")?;

    let otp_store = Arc::new(OtpStore::new(options.otp.normalize()));
    let sweeper = spawn_sweeper(otp_store.clone(), options.sweep_interval);

    let documents = LocalDocumentStore::new(
        options.app.upload_dir().to_path_buf(),
        &options.public_base_url,
    );
    let state = Arc::new(AppState::new(
        options.app,
        otp_store,
        Arc::new(PgVolunteerRepository::new(pool)),
        Arc::new(documents),
        Arc::new(LogEmailSender),
    ));

    let app = app(state)?;

    let listener = TcpListener::bind(format!("::0:{}", options.port)).await?;

    info!("Listening on [::]:{}", options.port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Gracefully shutdown");

    Ok(())
}

/// Assemble the HTTP application around `state`.
///
/// # Errors
/// Returns an error if a configured CORS origin is not a valid URL.
pub fn app(state: Arc<AppState>) -> Result<Router> {
    let config = state.config();
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_origin(AllowOrigin::list(allowed_origins(
            config.frontend_base_url(),
            config.cors_origins(),
        )?))
        .allow_credentials(true);

    let (router, openapi) = router().split_for_parts();
    let app = router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .route("/health", options(health::health))
        .nest_service("/uploads", ServeDir::new(config.upload_dir()))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(state.clone())),
        );

    Ok(app)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

/// Frontend origin first, then any extra origins, deduplicated.
fn allowed_origins(frontend_base_url: &str, extra: &[String]) -> Result<Vec<HeaderValue>> {
    let mut origins: Vec<HeaderValue> = Vec::with_capacity(extra.len() + 1);
    for url in std::iter::once(frontend_base_url).chain(extra.iter().map(String::as_str)) {
        let origin = origin(url)?;
        if !origins.contains(&origin) {
            origins.push(origin);
        }
    }
    Ok(origins)
}

fn origin(base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(base_url).with_context(|| format!("Invalid origin URL: {base_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Origin URL must include a valid host: {base_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build origin header")
}
