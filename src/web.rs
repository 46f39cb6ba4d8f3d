use crate::config::{IndexSource, SearchConfig, ShellVariant};
use crate::loader::{IndexLoader, SourceLoader};
use crate::markup::is_safe_target;
use crate::matcher::{CardDeck, Query as SearchQuery, match_query};
use crate::render::{SearchReport, render_error};
use crate::shell::{InlineShell, SearchSession, deep_link_url, encode_component};
use askama::Template;
use axum::{
    Json, Router,
    extract::{OriginalUri, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn};

type SharedState = Arc<AppState>;

pub const INDEX_DOCUMENT_PATH: &str = "/data/resources_index.json";

const STYLES: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; background: #fafafa; color: #222; }
main { max-width: 960px; margin: 0 auto; padding: 40px 16px; }
.search-form { display: flex; gap: 8px; }
.search-form input { flex: 1; padding: 10px 12px; font-size: 16px; border: 1px solid #ccc; border-radius: 6px; }
.search-form button { padding: 10px 18px; border: 0; border-radius: 6px; background: #1a73e8; color: #fff; font-size: 16px; }
.search-modal { display: none; position: fixed; inset: 0; z-index: 9999; }
.search-modal-backdrop { position: absolute; inset: 0; background: rgba(0, 0, 0, 0.5); }
.search-modal-content { position: absolute; top: 50%; left: 50%; transform: translate(-50%, -50%); width: 90%; max-width: 800px; max-height: 80vh; background: #fff; border-radius: 8px; display: flex; flex-direction: column; overflow: hidden; }
.search-modal-header { padding: 16px 24px; border-bottom: 1px solid #eee; display: flex; justify-content: space-between; align-items: center; }
.search-modal-title { margin: 0; font-size: 18px; }
.search-modal-close { font-size: 24px; color: #666; text-decoration: none; }
.search-modal-body { padding: 24px; overflow-y: auto; flex: 1; }
.search-results { display: flex; flex-direction: column; gap: 20px; }
.search-result-group { border: 1px solid #e5e5e5; border-radius: 8px; overflow: hidden; }
.search-result-group-header { padding: 12px 16px; background: #f8f9fa; border-bottom: 1px solid #e5e5e5; font-weight: 600; }
.search-result-type { font-weight: normal; color: #666; margin-left: 8px; }
.search-result-item { padding: 16px; border-bottom: 1px solid #f0f0f0; }
.search-result-item:last-child { border-bottom: none; }
.search-result-heading { margin: 0 0 8px 0; font-weight: 500; }
.search-result-content { color: #666; font-size: 14px; line-height: 1.5; word-break: break-word; }
.search-result-content a, .search-result-link { color: #1a73e8; text-decoration: none; }
.no-search-results { text-align: center; padding: 40px 20px; color: #999; }
.search-highlight { background: #ffeb3b; padding: 0 2px; font-weight: 500; }
.resource-grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(220px, 1fr)); gap: 16px; margin-top: 24px; }
.resource-card { background: #fff; border: 1px solid #e5e5e5; border-radius: 8px; padding: 16px; }
.resource-card[hidden] { display: none; }
.resource-status { font-size: 13px; color: #666; }
@media (max-width: 768px) {
  .search-modal-content { width: 95%; max-height: 90vh; }
  .search-modal-body { padding: 16px; }
}
"#;

#[derive(Clone)]
pub struct AppState {
    pub search: SearchConfig,
    pub loader: SourceLoader,
    pub base_url: String,
}

impl AppState {
    pub fn new(search: SearchConfig, base_url: impl Into<String>) -> Self {
        let loader = SourceLoader::new(search.index.clone());
        Self {
            search,
            loader,
            base_url: base_url.into(),
        }
    }
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub base_url: String,
    pub search: SearchConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            base_url: "http://127.0.0.1:8080".to_string(),
            search: SearchConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum WebError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn serve(config: WebConfig) -> Result<(), WebError> {
    let state = Arc::new(AppState::new(config.search.clone(), config.base_url.clone()));
    let router = build_router(state);
    info!(
        %config.addr,
        index = %config.search.index,
        variant = %config.search.variant,
        base = %config.base_url,
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/search", get(search_html))
        .route("/catalog", get(catalog_html))
        .route("/api/search", get(api_search))
        .route(INDEX_DOCUMENT_PATH, get(index_document))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
}

fn search_path(variant: ShellVariant) -> &'static str {
    match variant {
        ShellVariant::Modal => "/search",
        ShellVariant::Inline => "/catalog",
    }
}

async fn home(State(state): State<SharedState>) -> impl IntoResponse {
    let template = HomeTemplate {
        styles: STYLES,
        action: search_path(state.search.variant),
        version: env!("CARGO_PKG_VERSION"),
    };
    Html(
        template
            .render()
            .unwrap_or_else(|err| render_error(&err)),
    )
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "resource-search" }))
}

/// Modal variant. A `q` parameter is searched after the configured
/// deep-link delay.
async fn search_html(
    State(state): State<SharedState>,
    OriginalUri(uri): OriginalUri,
) -> impl IntoResponse {
    let mut session = SearchSession::new(state.loader.clone(), state.search.deep_link_delay);
    session.open_deep_link(&uri.to_string()).await;
    let session_state = session.state();
    let canonical_url = if session_state.input.is_empty() {
        format!("{}/search", state.base_url)
    } else {
        format!(
            "{}{}",
            state.base_url,
            deep_link_url("/search", &session_state.input)
        )
    };
    let template = SearchPageTemplate {
        styles: STYLES,
        input: &session_state.input,
        catalog_href: catalog_href(&session_state.input),
        canonical_url,
        modal_open: session_state.modal.is_open(),
        scroll_locked: session_state.modal.is_scroll_locked(),
        results_html: &session_state.results,
    };
    Html(
        template
            .render()
            .unwrap_or_else(|err| render_error(&err)),
    )
}

fn catalog_href(input: &str) -> String {
    if input.trim().is_empty() {
        "/catalog".to_string()
    } else {
        format!("/catalog?q={}", encode_component(input))
    }
}

/// Inline variant: every card, non-matching ones hidden.
async fn catalog_html(
    State(state): State<SharedState>,
    OriginalUri(uri): OriginalUri,
) -> impl IntoResponse {
    let index = match state.loader.load().await {
        Ok(index) => index,
        Err(err) => {
            let template = CatalogTemplate {
                styles: STYLES,
                input: "",
                cards: Vec::new(),
                notice_html: Some(render_error(&err)),
            };
            return Html(
                template
                    .render()
                    .unwrap_or_else(|err| render_error(&err)),
            );
        }
    };
    let mut shell = InlineShell::new(CardDeck::from_index(&index), state.search.deep_link_delay);
    shell.open_deep_link(&uri.to_string()).await;
    let cards = shell
        .deck()
        .cards()
        .iter()
        .enumerate()
        .map(|(position, card)| CardView {
            title: &card.title,
            status: &card.status,
            href: card
                .href
                .as_deref()
                .filter(|href| !href.trim().is_empty() && is_safe_target(href)),
            visible: shell.is_visible(position),
        })
        .collect();
    let notice_html = shell
        .placeholder()
        .filter(|placeholder| placeholder.visible)
        .map(|placeholder| placeholder.markup.clone());
    let template = CatalogTemplate {
        styles: STYLES,
        input: shell.input(),
        cards,
        notice_html,
    };
    Html(
        template
            .render()
            .unwrap_or_else(|err| render_error(&err)),
    )
}

async fn api_search(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchReport>, ApiError> {
    let query = params
        .q
        .as_deref()
        .and_then(SearchQuery::parse)
        .ok_or_else(|| ApiError::bad_request("Query parameter `q` is required"))?;
    let index = state.loader.load().await.map_err(|err| {
        warn!(error = %err, "Search API could not load the index");
        ApiError::bad_gateway(err.to_string())
    })?;
    let groups = match_query(&query, &index);
    Ok(Json(SearchReport::new(&query, &groups)))
}

async fn index_document(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let IndexSource::File(path) = &state.search.index else {
        return Err(ApiError::not_found("The index is served from a remote host"));
    };
    let bytes = tokio::fs::read(path).await.map_err(|err| {
        warn!(path = %path.display(), error = %err, "Index document unavailable");
        ApiError::not_found(format!("Index document unavailable: {err}"))
    })?;
    Ok(([(header::CONTENT_TYPE, "application/json")], bytes).into_response())
}

struct CardView<'a> {
    title: &'a str,
    status: &'a str,
    href: Option<&'a str>,
    visible: bool,
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Resource search</title>
    <style>{{ styles|safe }}</style>
  </head>
  <body>
    <main>
      <p class="eyebrow">resource-search v{{ version }}</p>
      <h1>Search the resource catalog</h1>
      <form action="{{ action }}" method="get" class="search-form">
        <input id="global-search" name="q" type="search" placeholder="Search resources" autocomplete="off" />
        <button id="global-search-button" type="submit">Search</button>
      </form>
      <p><a href="/catalog">Browse every resource</a></p>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct HomeTemplate<'a> {
    styles: &'a str,
    action: &'a str,
    version: &'a str,
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Resource search{% if !input.is_empty() %} • {{ input }}{% endif %}</title>
    <link rel="canonical" href="{{ canonical_url }}">
    <style>{{ styles|safe }}</style>
  </head>
  <body{% if scroll_locked %} style="overflow: hidden"{% endif %}>
    <main>
      <form action="/search" method="get" class="search-form">
        <input id="search-input" name="q" type="search" value="{{ input }}" placeholder="Search resources" autocomplete="off" />
        <button id="search-button" type="submit">Search</button>
      </form>
      <p><a href="{{ catalog_href }}">Show as catalog</a></p>
    </main>
    <div class="search-modal" id="search-results-modal"{% if modal_open %} style="display: block"{% endif %}>
      <a class="search-modal-backdrop" href="/search" aria-label="Close search results"></a>
      <div class="search-modal-content">
        <div class="search-modal-header">
          <h3 class="search-modal-title">Search results</h3>
          <a class="search-modal-close" href="/search" aria-label="Close">&times;</a>
        </div>
        <div class="search-modal-body">
          <div id="search-results-container" class="search-results">{{ results_html|safe }}</div>
        </div>
      </div>
    </div>
  </body>
</html>"#,
    ext = "html"
)]
struct SearchPageTemplate<'a> {
    styles: &'a str,
    input: &'a str,
    catalog_href: String,
    canonical_url: String,
    modal_open: bool,
    scroll_locked: bool,
    results_html: &'a str,
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Resource catalog</title>
    <style>{{ styles|safe }}</style>
  </head>
  <body>
    <main>
      <form action="/catalog" method="get" class="search-form">
        <input id="resource-search" name="q" type="search" value="{{ input }}" placeholder="Filter resources" autocomplete="off" />
        <button class="search-btn" type="submit">Filter</button>
      </form>
      <div class="resource-grid">
        {% for card in cards %}
        <article class="resource-card"{% if !card.visible %} hidden{% endif %}>
          <h3 class="resource-title">{{ card.title }}</h3>
          <span class="resource-status">{{ card.status }}</span>
          {% if card.href.is_some() %}
          <a class="resource-link" href="{{ card.href.unwrap() }}">Open</a>
          {% endif %}
        </article>
        {% endfor %}
      </div>
      {% if notice_html.is_some() %}
      <div class="catalog-notice">{{ notice_html.as_ref().unwrap()|safe }}</div>
      {% endif %}
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct CatalogTemplate<'a> {
    styles: &'a str,
    input: &'a str,
    cards: Vec<CardView<'a>>,
    notice_html: Option<String>,
}
