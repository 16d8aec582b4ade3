use crate::config::Config;
use crate::error::{Result, WikidiceError};
use crate::graph::NodeId;
use crate::service::CategoryService;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// HTTP front end over [`CategoryService`]
pub struct HttpServer {
    service: CategoryService,
    config: Config,
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    service: CategoryService,
    article_base_url: url::Url,
}

#[derive(Debug, Deserialize)]
struct CategoryParams {
    category: Option<String>,
    levels: Option<String>,
    /// Name used by the `/random` routes for `levels`
    depth: Option<String>,
    language: Option<String>,
}

impl CategoryParams {
    fn levels(&self) -> Option<&str> {
        self.levels.as_deref().or(self.depth.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct PrefixParams {
    q: Option<String>,
    prefix: Option<String>,
    limit: Option<String>,
    language: Option<String>,
}

/// Body of `/random_with_derivation/{category}`
#[derive(Debug, Serialize)]
struct ArticleWithDerivation {
    article: NodeId,
    /// Category names from the requested category down to the article's parent
    derivation: Vec<String>,
}

impl HttpServer {
    pub fn new(service: CategoryService, config: Config) -> Self {
        Self { service, config }
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests for
    /// at most `shutdown_grace_secs`.
    pub async fn run<S>(&self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let app = self.create_router()?;
        let addr = format!("{}:{}", self.config.http_server.host, self.config.http_server.port);

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            WikidiceError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to bind to {}: {}", addr, e),
            ))
        })?;
        log::info!("Listening on http://{}", addr);

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .await
        });

        tokio::select! {
            joined = &mut server => {
                return flatten_server_result(joined);
            }
            _ = shutdown => {}
        }

        log::info!("Shutting down HTTP server");
        let _ = stop_tx.send(());
        let grace = Duration::from_secs(self.config.http_server.shutdown_grace_secs);
        match tokio::time::timeout(grace, &mut server).await {
            Ok(joined) => flatten_server_result(joined),
            Err(_) => {
                log::warn!("In-flight requests still running after {}s, dropping them", grace.as_secs());
                server.abort();
                Ok(())
            }
        }
    }

    /// Create the axum router
    pub fn create_router(&self) -> Result<Router> {
        let article_base_url = url::Url::parse(&self.config.http_server.article_base_url)
            .map_err(|e| WikidiceError::Config(format!("article_base_url: {}", e)))?;

        let allowed_origins = &self.config.http_server.allowed_origins;
        let cors = if allowed_origins.is_empty() {
            CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
        } else {
            let origins = allowed_origins
                .iter()
                .map(|o| {
                    o.parse::<axum::http::HeaderValue>().map_err(|e| {
                        WikidiceError::Config(format!("allowed_origins entry {}: {}", o, e))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        let state = AppState {
            service: self.service.clone(),
            article_base_url,
        };

        Ok(Router::new()
            .route("/lookup", get(handle_lookup))
            .route("/lookup/explain", get(handle_lookup_explain))
            .route("/random/:category", get(handle_random))
            .route(
                "/random_with_derivation/:category",
                get(handle_random_with_derivation),
            )
            .route("/category-members", get(handle_category_members))
            .route("/category-autocomplete", get(handle_autocomplete))
            .route("/autocomplete", get(handle_autocomplete))
            .route("/health", get(handle_health))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors),
            )
            .with_state(state))
    }
}

fn flatten_server_result(
    joined: std::result::Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<()> {
    match joined {
        Ok(served) => served.map_err(WikidiceError::Io),
        Err(e) => Err(WikidiceError::Internal(format!("HTTP server task failed: {}", e))),
    }
}

/// JSON error body: `{"message": ..., "internal_code": ...}`
fn error_body(status: StatusCode, message: String, internal_code: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "message": message,
            "internal_code": internal_code,
        })),
    )
        .into_response()
}

/// Map a core outcome to a response. Store faults are logged here, the
/// expected outcomes are not.
fn error_response(err: WikidiceError) -> Response {
    match &err {
        WikidiceError::CategoryNotFound(name) => error_body(
            StatusCode::BAD_REQUEST,
            format!(
                "There is no category called \"{}\". Make sure there is a page on Wikipedia called Category:{}",
                name, name
            ),
            "category_not_found",
        ),
        WikidiceError::NoMembers(_) => {
            error_body(StatusCode::NOT_FOUND, err.to_string(), "no_members")
        }
        WikidiceError::InvalidInput(message) => {
            error_body(StatusCode::BAD_REQUEST, message.clone(), "invalid_input")
        }
        WikidiceError::DeadlineExceeded { operation, .. } => {
            log::info!("{} timed out", operation);
            error_body(
                StatusCode::REQUEST_TIMEOUT,
                format!("{} took too long. Try again.", capitalized(operation)),
                "timeout",
            )
        }
        _ => {
            log::error!("Request failed: {}", err);
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                if err.is_store_fault() { "store_unavailable" } else { "internal" },
            )
        }
    }
}

fn capitalized(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Only English Wikipedia is loaded. An absent `language` means English.
fn require_english(language: Option<&str>) -> Result<()> {
    match language.map(str::trim) {
        None | Some("") | Some("en") => Ok(()),
        Some(_) => Err(WikidiceError::InvalidInput(
            "Only English is supported at this time".to_string(),
        )),
    }
}

/// Append the title as a single path segment so `?`, `#` and `/` are escaped.
fn article_url(base: &url::Url, title: &str) -> String {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(title);
    }
    url.to_string()
}

async fn redirect_to_random(state: &AppState, category: &str, params: &CategoryParams) -> Response {
    if let Err(e) = require_english(params.language.as_deref()) {
        return error_response(e);
    }
    let levels = state.service.levels(params.levels());
    match state.service.lookup_random_page(category, levels).await {
        Ok(page) => (
            StatusCode::FOUND,
            [(header::LOCATION, article_url(&state.article_base_url, &page.title))],
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// `GET /lookup?category=&levels=`: redirect to a random article
async fn handle_lookup(
    State(state): State<AppState>,
    Query(params): Query<CategoryParams>,
) -> Response {
    let category = params.category.clone().unwrap_or_default();
    redirect_to_random(&state, &category, &params).await
}

/// `GET /random/{category}?depth=&language=`
async fn handle_random(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(params): Query<CategoryParams>,
) -> Response {
    redirect_to_random(&state, &category, &params).await
}

/// `GET /random_with_derivation/{category}?depth=&language=`
async fn handle_random_with_derivation(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(params): Query<CategoryParams>,
) -> Response {
    if let Err(e) = require_english(params.language.as_deref()) {
        return error_response(e);
    }
    let levels = state.service.levels(params.levels());
    match state.service.lookup_random_page(&category, levels).await {
        Ok(page) => {
            let body = ArticleWithDerivation {
                article: page.page_id,
                derivation: page.derivation.iter().map(|c| c.replace('_', " ")).collect(),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// `GET /lookup/explain`: the drawn page plus the categories it was reached through
async fn handle_lookup_explain(
    State(state): State<AppState>,
    Query(params): Query<CategoryParams>,
) -> Response {
    if let Err(e) = require_english(params.language.as_deref()) {
        return error_response(e);
    }
    let category = params.category.clone().unwrap_or_default();
    let levels = state.service.levels(params.levels());
    match state.service.lookup_random_page(&category, levels).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => error_response(e),
    }
}

/// `GET /category-members?category=&levels=`: JSON array of page ids
async fn handle_category_members(
    State(state): State<AppState>,
    Query(params): Query<CategoryParams>,
) -> Response {
    if let Err(e) = require_english(params.language.as_deref()) {
        return error_response(e);
    }
    let category = params.category.clone().unwrap_or_default();
    let levels = state.service.levels(params.levels());
    match state.service.enumerate_members(&category, levels).await {
        Ok(ids) => (StatusCode::OK, Json(ids)).into_response(),
        Err(e) => {
            log::debug!("category members failed (category={}, levels={})", category, levels.get());
            error_response(e)
        }
    }
}

/// `GET /category-autocomplete?q=` or `GET /autocomplete?prefix=&limit=`
async fn handle_autocomplete(
    State(state): State<AppState>,
    Query(params): Query<PrefixParams>,
) -> Response {
    if let Err(e) = require_english(params.language.as_deref()) {
        return error_response(e);
    }
    let limit = state.service.autocomplete_limit(params.limit.as_deref());
    let prefix = params.q.or(params.prefix).unwrap_or_default();
    match state.service.autocomplete_category_limited(&prefix, limit).await {
        Ok(names) => (StatusCode::OK, Json(names)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Handle health check endpoint
async fn handle_health() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "wikidice",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
        .into_response()
}
