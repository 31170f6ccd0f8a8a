use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use indexer::{Classifier, QueryService};
use lemmadex_core::model::ArticleId;
use lemmadex_core::queue::JobQueues;
use lemmadex_core::{Settings, Store};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

type ApiError = (StatusCode, String);

fn internal<E: std::fmt::Display>(e: E) -> ApiError {
    tracing::error!(error = %e, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[derive(Deserialize)]
pub struct QueryParams {
    pub q: String,
    /// Postings returned per lemma.
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct QueryResponse {
    pub query: String,
    pub took_s: f64,
    pub total_lemmas: usize,
    pub lemmas: Vec<LemmaResult>,
}

#[derive(Serialize)]
pub struct LemmaResult {
    pub term: String,
    pub total_appearances: u64,
    pub total_hits: usize,
    pub hits: Vec<HitResult>,
}

#[derive(Serialize)]
pub struct HitResult {
    pub article_id: ArticleId,
    pub url: String,
    pub header: String,
    /// Header with the query terms wrapped in `<em>`.
    pub highlighted: String,
    pub appearances: u32,
    pub weight: f64,
}

#[derive(Deserialize)]
pub struct ClassifyRequest {
    pub text: String,
}

#[derive(Serialize, Default)]
pub struct ClassifyResponse {
    pub category: Option<String>,
    pub document: Option<String>,
    pub similarity: Option<f64>,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub queues: Arc<JobQueues>,
    pub query: QueryService,
    pub classifier: Classifier,
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(store: Store, settings: &Settings, admin_token: Option<String>) -> lemmadex_core::Result<Self> {
        let queues = Arc::new(JobQueues::open(store.db(), settings.max_attempts)?);
        Ok(Self {
            query: QueryService::new(store.clone()),
            classifier: Classifier::new(store.clone(), settings.idf_variant()),
            store,
            queues,
            admin_token: admin_token.filter(|t| !t.is_empty()),
        })
    }
}

/// Comma-separated origins, or any origin when unset or unparsable.
pub fn cors_layer(allow_origin: Option<&str>) -> CorsLayer {
    let origins: Vec<_> = allow_origin.unwrap_or_default().split(',').filter_map(|s| s.trim().parse().ok()).collect();
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

pub fn build_app(state: AppState, cors_allow_origin: Option<&str>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/query", get(query_handler))
        .route("/article/:article_id", get(article_handler))
        .route("/classify", post(classify_handler))
        .route("/admin/drain", post(drain_handler))
        .with_state(state)
        .layer(cors_layer(cors_allow_origin))
        .layer(TraceLayer::new_for_http())
}

pub async fn query_handler(State(state): State<AppState>, Query(params): Query<QueryParams>) -> Result<Json<QueryResponse>, ApiError> {
    let start = std::time::Instant::now();
    let terms: Vec<String> = params.q.split_whitespace().map(str::to_string).collect();
    let matches = state.query.search(&terms).map_err(internal)?;
    let k = params.k.clamp(1, 100);

    let lemmas: Vec<LemmaResult> = matches
        .into_iter()
        .map(|m| LemmaResult {
            term: m.term,
            total_appearances: m.total_appearances,
            total_hits: m.hits.len(),
            hits: m
                .hits
                .into_iter()
                .take(k)
                .map(|h| HitResult {
                    highlighted: highlight_terms(&h.header, &terms),
                    article_id: h.article_id,
                    url: h.url,
                    header: h.header,
                    appearances: h.appearances,
                    weight: h.weight,
                })
                .collect(),
        })
        .collect();
    Ok(Json(QueryResponse { query: params.q, took_s: start.elapsed().as_secs_f64(), total_lemmas: lemmas.len(), lemmas }))
}

pub async fn article_handler(State(state): State<AppState>, Path(article_id): Path<ArticleId>) -> Result<Json<serde_json::Value>, ApiError> {
    match state.store.articles.find(article_id).map_err(internal)? {
        Some(a) => Ok(Json(serde_json::json!({
            "article_id": a.id,
            "url": a.url,
            "header": a.header,
            "body": a.body,
            "tagged": a.is_tagged(),
            "indexed": a.indexed,
        }))),
        None => Err((StatusCode::NOT_FOUND, "article not found".into())),
    }
}

pub async fn classify_handler(State(state): State<AppState>, Json(req): Json<ClassifyRequest>) -> Result<Json<ClassifyResponse>, ApiError> {
    if req.text.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "text is empty".into()));
    }
    let best = state.classifier.classify(&req.text).map_err(internal)?;
    Ok(Json(match best {
        Some(c) => ClassifyResponse { category: Some(c.category), document: Some(c.document), similarity: Some(c.similarity) },
        None => ClassifyResponse::default(),
    }))
}

async fn drain_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let removed = state.queues.drain_all().map_err(internal)?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

fn highlight_terms(text: &str, terms: &[String]) -> String {
    let mut s = text.to_string();
    for t in terms {
        if t.trim().is_empty() {
            continue;
        }
        let Ok(pat) = RegexBuilder::new(&regex::escape(t)).case_insensitive(true).build() else { continue };
        s = pat.replace_all(&s, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).to_string();
    }
    s
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlights_case_insensitively() {
        let terms = vec!["flood".to_string(), "".to_string()];
        assert_eq!(highlight_terms("Floods close roads", &terms), "<em>Flood</em>s close roads");
    }
}
