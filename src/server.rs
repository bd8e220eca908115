//! HTTP API over the retention cache
//!
//! Endpoints:
//! - GET /health - Service status and selected transcriber
//! - GET /models - Accepted model names
//! - POST /transcribe - Download (through the cache) and transcribe a URL
//! - GET /cache/info - Cache statistics
//! - GET /cache/lookup?url=... - Cached artifact for a URL
//! - DELETE /cache/clear - Drop every cached artifact
//! - POST /keywords/trends - Search trends for keywords
//! - POST /keywords/related - Trends for a keyword and its related keywords
//! - GET /keywords/shopping - Shopping insight keywords
//! - GET /keywords/mock - The offline sample trend table
//!
//! Cache calls take a blocking mutex and may copy or delete files, so handlers
//! run them on the blocking pool.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::backends::download::{fetch_audio, YtDlp};
use crate::backends::transcriber::{
    is_known_model, render_transcript, transcription_timeout, TranscriberBackend,
    TranscriptLayout, AVAILABLE_MODELS, DEFAULT_MODEL,
};
use crate::backends::trends::{sample_trends, Credentials, KeywordTrend, TrendService};
use crate::cache::RetentionCache;
use crate::config::ToolConfig;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<RetentionCache>,
    pub source: Arc<YtDlp>,
    pub transcriber: Option<TranscriberBackend>,
    pub trends: TrendService,
    /// Parent of per-request scratch directories
    pub work_root: PathBuf,
}

impl AppState {
    pub fn new(
        cache: Arc<RetentionCache>,
        tools: &ToolConfig,
        credentials: Option<Credentials>,
        work_root: PathBuf,
    ) -> anyhow::Result<Self> {
        let transcriber = TranscriberBackend::select(tools);
        tracing::info!(
            dir = %cache.config().dir.display(),
            retention_hours = cache.config().retention_hours(),
            "serving retention cache"
        );
        match &transcriber {
            Some(backend) => tracing::info!(backend = backend.name(), "selected transcriber"),
            None => tracing::warn!("no transcriber available; /transcribe will fail"),
        }

        Ok(Self {
            cache,
            source: Arc::new(YtDlp::new(tools.downloader.clone())),
            transcriber,
            trends: TrendService::new(credentials)?,
            work_root,
        })
    }

    /// Run a cache call on the blocking pool
    async fn with_cache<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&RetentionCache) -> T + Send + 'static,
    {
        let cache = Arc::clone(&self.cache);
        tokio::task::spawn_blocking(move || f(cache.as_ref()))
            .await
            .map_err(ApiError::internal)
    }
}

/// Error body returned by every failing endpoint
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn internal(err: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "success": false, "error": self.message })),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct LookupParams {
    pub url: String,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    pub url: String,
    #[serde(default)]
    pub model: Option<String>,
    /// One line per timed segment instead of one per sentence
    #[serde(default = "default_true")]
    pub format_with_segments: bool,
    /// Prefix segment lines with `[MM:SS-MM:SS]`
    #[serde(default)]
    pub format_with_timestamps: bool,
}

#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub success: bool,
    pub text: String,
    pub processing_time: f64,
    pub audio_size_mb: f64,
    pub audio_duration: Option<f64>,
    pub download_time: f64,
    pub transcription_time: f64,
    pub from_cache: bool,
}

#[derive(Debug, Deserialize)]
pub struct TrendsRequest {
    pub keywords: Vec<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

fn default_max_related() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct RelatedRequest {
    #[serde(default)]
    pub keyword: String,
    #[serde(default = "default_true")]
    pub include_related: bool,
    #[serde(default = "default_max_related")]
    pub max_related: usize,
}

#[derive(Debug, Serialize)]
pub struct KeywordsResponse {
    pub success: bool,
    pub keywords: Vec<KeywordTrend>,
}

impl KeywordsResponse {
    fn ok(keywords: Vec<KeywordTrend>) -> Json<Self> {
        Json(Self {
            success: true,
            keywords,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/models", get(list_models))
        .route("/transcribe", post(transcribe))
        .route("/cache/info", get(cache_info))
        .route("/cache/lookup", get(cache_lookup))
        .route("/cache/clear", delete(cache_clear))
        .route("/keywords/trends", post(keyword_trends))
        .route("/keywords/related", post(keyword_related))
        .route("/keywords/shopping", get(keyword_shopping))
        .route("/keywords/mock", get(keyword_mock))
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    tracing::info!(bind, "listening");
    axum::serve(listener, router(state))
        .await
        .context("HTTP server stopped")?;
    Ok(())
}

/// Run the HTTP server on its own tokio runtime
pub fn run_serve(
    cache: RetentionCache,
    tools: &ToolConfig,
    credentials: Option<Credentials>,
    bind: &str,
    work_root: PathBuf,
) -> anyhow::Result<()> {
    let state = AppState::new(Arc::new(cache), tools, credentials, work_root)?;
    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    runtime.block_on(serve(state, bind))
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let stats = state.with_cache(RetentionCache::stats).await?;
    Ok(Json(json!({
        "status": "healthy",
        "transcriber": state.transcriber.as_ref().map(TranscriberBackend::name),
        "keyword_trends": if state.trends.is_live() { "live" } else { "sample" },
        "cache": stats,
    })))
}

/// GET /models
async fn list_models() -> Json<Value> {
    Json(json!({
        "models": AVAILABLE_MODELS,
        "default": DEFAULT_MODEL,
    }))
}

/// GET /cache/info
async fn cache_info(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let stats = state.with_cache(RetentionCache::stats).await?;
    Ok(Json(json!(stats)))
}

/// GET /cache/lookup?url=...
async fn cache_lookup(
    State(state): State<AppState>,
    Query(params): Query<LookupParams>,
) -> Result<Json<Value>, ApiError> {
    let hit = state
        .with_cache(move |cache| cache.lookup(&params.url))
        .await?;
    match hit {
        Some(hit) => Ok(Json(json!({
            "key": hit.key,
            "path": hit.path,
            "duration": hit.duration,
            "size_mb": hit.size_mb,
        }))),
        None => Err(ApiError::new(StatusCode::NOT_FOUND, "not cached")),
    }
}

/// DELETE /cache/clear
async fn cache_clear(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let removed = state.with_cache(RetentionCache::clear_all).await?;
    Ok(Json(json!({
        "message": "cache cleared",
        "removed_files": removed,
    })))
}

/// POST /transcribe
async fn transcribe(
    State(state): State<AppState>,
    Json(request): Json<TranscribeRequest>,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let started = Instant::now();
    let model = request.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
    if !is_known_model(&model) {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("unknown model: {}", model),
        ));
    }
    let backend = state.transcriber.clone().ok_or_else(|| {
        ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "no transcriber available")
    })?;

    std::fs::create_dir_all(&state.work_root).map_err(ApiError::internal)?;
    let work_dir = tempfile::Builder::new()
        .prefix("job-")
        .tempdir_in(&state.work_root)
        .map_err(ApiError::internal)?;

    let download_started = Instant::now();
    let fetched = {
        let cache = Arc::clone(&state.cache);
        let source = Arc::clone(&state.source);
        let url = request.url.clone();
        let dir = work_dir.path().to_path_buf();
        tokio::task::spawn_blocking(move || fetch_audio(&cache, source.as_ref(), &url, &dir))
            .await
            .map_err(ApiError::internal)?
            .map_err(|e| ApiError::new(StatusCode::BAD_GATEWAY, format!("{:#}", e)))?
    };
    let download_time = download_started.elapsed().as_secs_f64();

    let timeout = transcription_timeout(fetched.size_mb);
    let transcribe_started = Instant::now();
    let mut cmd = tokio::process::Command::from(backend.command(&fetched.path, &model, work_dir.path()));
    cmd.kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(output) => output.map_err(ApiError::internal)?,
        Err(_) => {
            return Err(ApiError::new(
                StatusCode::GATEWAY_TIMEOUT,
                format!("transcription timed out after {}s", timeout.as_secs()),
            ))
        }
    };
    if !output.status.success() {
        return Err(ApiError::internal(format!(
            "{} failed: {}",
            backend.name(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    let layout = TranscriptLayout {
        segments: request.format_with_segments,
        timestamps: request.format_with_timestamps,
    };
    let text =
        render_transcript(&fetched.path, work_dir.path(), layout).map_err(ApiError::internal)?;
    let transcription_time = transcribe_started.elapsed().as_secs_f64();

    tracing::info!(
        url = %request.url,
        from_cache = fetched.from_cache,
        download_time,
        transcription_time,
        "transcription finished"
    );

    Ok(Json(TranscribeResponse {
        success: true,
        text,
        processing_time: started.elapsed().as_secs_f64(),
        audio_size_mb: fetched.size_mb,
        audio_duration: fetched.duration,
        download_time,
        transcription_time,
        from_cache: fetched.from_cache,
    }))
}

/// POST /keywords/trends
async fn keyword_trends(
    State(state): State<AppState>,
    Json(request): Json<TrendsRequest>,
) -> Json<KeywordsResponse> {
    let keywords = state
        .trends
        .search_trends(
            &request.keywords,
            request.start_date.as_deref(),
            request.end_date.as_deref(),
        )
        .await;
    KeywordsResponse::ok(keywords)
}

/// POST /keywords/related
async fn keyword_related(
    State(state): State<AppState>,
    Json(request): Json<RelatedRequest>,
) -> Result<Json<KeywordsResponse>, ApiError> {
    let keyword = request.keyword.trim();
    if keyword.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "keyword is required"));
    }
    let keywords = state
        .trends
        .search_trends_with_related(keyword, request.include_related, request.max_related)
        .await;
    Ok(KeywordsResponse::ok(keywords))
}

/// GET /keywords/shopping
async fn keyword_shopping(State(state): State<AppState>) -> Json<KeywordsResponse> {
    KeywordsResponse::ok(state.trends.shopping_insights())
}

/// GET /keywords/mock
async fn keyword_mock() -> Json<KeywordsResponse> {
    KeywordsResponse::ok(sample_trends(&[]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    fn state() -> (TempDir, AppState) {
        let temp = tempdir().unwrap();
        let cache = RetentionCache::open(CacheConfig::new(
            temp.path().join("cache"),
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        ));
        let state = AppState {
            cache: Arc::new(cache),
            source: Arc::new(YtDlp::new("definitely-not-yt-dlp-0042")),
            transcriber: None,
            trends: TrendService::new(None).unwrap(),
            work_root: temp.path().join("work"),
        };
        (temp, state)
    }

    fn seed(temp: &TempDir, state: &AppState, url: &str) -> PathBuf {
        let src = temp.path().join("seed.mp3");
        std::fs::write(&src, vec![0u8; 1024 * 1024]).unwrap();
        state.cache.register(url, &src, Some(61.0))
    }

    #[tokio::test]
    async fn test_health_reports_cache() {
        let (_temp, state) = state();
        let Json(body) = health_check(State(state)).await.unwrap();
        assert_eq!(body["status"], "healthy");
        assert!(body["transcriber"].is_null());
        assert_eq!(body["keyword_trends"], "sample");
        assert_eq!(body["cache"]["total_files"], 0);
    }

    #[tokio::test]
    async fn test_models() {
        let Json(body) = list_models().await;
        assert_eq!(body["default"], "large");
        assert_eq!(body["models"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_lookup_hit_and_miss() {
        let (temp, state) = state();
        let stored = seed(&temp, &state, "https://ex/a");

        let Json(body) = cache_lookup(
            State(state.clone()),
            Query(LookupParams {
                url: "https://ex/a".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(body["path"], stored.to_string_lossy().as_ref());
        assert_eq!(body["duration"], 61.0);

        let err = cache_lookup(
            State(state),
            Query(LookupParams {
                url: "https://ex/b".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cache_info_and_clear() {
        let (temp, state) = state();
        seed(&temp, &state, "https://ex/a");

        let Json(info) = cache_info(State(state.clone())).await.unwrap();
        assert_eq!(info["total_files"], 1);
        assert_eq!(info["valid_files"], 1);
        assert_eq!(info["total_size_mb"], 1.0);

        let Json(cleared) = cache_clear(State(state.clone())).await.unwrap();
        assert_eq!(cleared["removed_files"], 1);

        let Json(info) = cache_info(State(state)).await.unwrap();
        assert_eq!(info["total_files"], 0);
    }

    #[tokio::test]
    async fn test_transcribe_rejects_unknown_model() {
        let (_temp, state) = state();
        let err = transcribe(
            State(state),
            Json(TranscribeRequest {
                url: "https://ex/a".to_string(),
                model: Some("gigantic".to_string()),
                format_with_segments: true,
                format_with_timestamps: false,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_transcribe_without_backend_is_unavailable() {
        let (_temp, state) = state();
        let err = transcribe(
            State(state),
            Json(TranscribeRequest {
                url: "https://ex/a".to_string(),
                model: None,
                format_with_segments: true,
                format_with_timestamps: false,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_transcribe_download_failure_is_bad_gateway() {
        let (_temp, mut state) = state();
        state.transcriber = Some(TranscriberBackend::Whisper {
            program: "whisper".to_string(),
        });
        let err = transcribe(
            State(state),
            Json(TranscribeRequest {
                url: "https://ex/a".to_string(),
                model: Some("tiny".to_string()),
                format_with_segments: true,
                format_with_timestamps: false,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_transcribe_request_defaults() {
        let request: TranscribeRequest =
            serde_json::from_value(json!({ "url": "https://ex/a" })).unwrap();
        assert!(request.model.is_none());
        assert!(request.format_with_segments);
        assert!(!request.format_with_timestamps);
    }

    #[test]
    fn test_transcribe_response_reports_size_and_total_time() {
        let response = TranscribeResponse {
            success: true,
            text: "hi".to_string(),
            processing_time: 3.5,
            audio_size_mb: 1.25,
            audio_duration: Some(61.0),
            download_time: 1.0,
            transcription_time: 2.0,
            from_cache: true,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["processing_time"], 3.5);
        assert_eq!(value["audio_size_mb"], 1.25);
    }

    #[tokio::test]
    async fn test_keyword_trends_use_samples_offline() {
        let (_temp, state) = state();
        let Json(body) = keyword_trends(
            State(state),
            Json(TrendsRequest {
                keywords: vec!["운동".to_string()],
                start_date: None,
                end_date: None,
            }),
        )
        .await;
        assert!(body.success);
        assert_eq!(body.keywords.len(), 1);
        assert_eq!(body.keywords[0].text, "운동");
    }

    #[tokio::test]
    async fn test_keyword_related_requires_keyword() {
        let (_temp, state) = state();
        let request: RelatedRequest = serde_json::from_value(json!({ "keyword": "  " })).unwrap();
        assert!(request.include_related);
        assert_eq!(request.max_related, 10);

        let err = keyword_related(State(state), Json(request)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_keyword_related_expands_keyword() {
        let (_temp, state) = state();
        let Json(body) = keyword_related(
            State(state),
            Json(RelatedRequest {
                keyword: "다이어트".to_string(),
                include_related: true,
                max_related: 5,
            }),
        )
        .await
        .unwrap();
        let texts: Vec<_> = body.keywords.iter().map(|k| k.text.as_str()).collect();
        assert_eq!(texts, vec!["건강", "운동", "다이어트"]);
    }

    #[tokio::test]
    async fn test_keyword_shopping_and_mock() {
        let (_temp, state) = state();
        let Json(shopping) = keyword_shopping(State(state)).await;
        assert_eq!(shopping.keywords.len(), 5);

        let Json(mock) = keyword_mock().await;
        assert_eq!(mock.keywords.len(), 15);
        assert!(mock.keywords.windows(2).all(|w| w[0].trend >= w[1].trend));
    }
}
