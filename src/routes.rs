use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    catalog::SnapshotStats,
    error::{AppError, AppResult},
    facade::QueryFacade,
    filter::{FilterConfig, GenreMatch},
    language::IndexStats,
    models::{GenreCount, LanguageCount, MovieSummary},
};

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

/// Floors applied by `/api/movies` when the caller does not set them.
const DEFAULT_MIN_RATING: f64 = 5.0;
const DEFAULT_MIN_VOTES: u64 = 100;

const EARLIEST_YEAR_FROM: i32 = 1900;
const LATEST_YEAR_TO: i32 = 2024;

#[derive(Clone)]
pub struct AppState {
    pub facade: QueryFacade,
    reloading: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(facade: QueryFacade) -> Self {
        Self { facade, reloading: Arc::new(AtomicBool::new(false)) }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api", get(index))
        .route("/api/movies", get(movies))
        .route("/api/movies/top", get(top_rated))
        .route("/api/movies/popular", get(popular))
        .route("/api/movies/search", get(search))
        .route("/api/movies/genres", get(by_genres))
        .route("/api/movies/collection", get(collection))
        .route("/api/genres", get(genres))
        .route("/api/languages", get(languages))
        .route("/api/languages/{code}/movies", get(by_language))
        .route("/api/stats", get(stats))
        .route("/api/reload", post(reload))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

/// Runs a catalog query off the async runtime; the first language query on a
/// snapshot scans the alternate-titles file.
async fn blocking<T, F>(f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await?)
}

/// `Query` whose rejections are reported as JSON 400s.
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
        Ok(Self(value))
    }
}

fn limit(raw: Option<i64>) -> AppResult<i64> {
    let limit = raw.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::bad_request(format!("limit must be between 1 and {MAX_LIMIT}")));
    }
    Ok(limit)
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Movie Analytics Platform API" }))
}

#[derive(Debug, Default, Deserialize)]
pub struct MoviesQuery {
    limit: Option<i64>,
    genres: Option<String>,
    #[serde(rename = "match")]
    genre_match: Option<GenreMatch>,
    min_rating: Option<f64>,
    min_votes: Option<i64>,
    language: Option<String>,
    year_from: Option<i32>,
    year_to: Option<i32>,
    runtime_min: Option<u32>,
    runtime_max: Option<u32>,
}

impl MoviesQuery {
    fn into_filter(self) -> AppResult<FilterConfig> {
        if let Some(r) = self.min_rating {
            if !(0.0..=10.0).contains(&r) {
                return Err(AppError::bad_request("min_rating must be between 0 and 10"));
            }
        }
        let min_votes = match self.min_votes {
            Some(v) => u64::try_from(v).map_err(|_| AppError::bad_request("min_votes must not be negative"))?,
            None => DEFAULT_MIN_VOTES,
        };
        if self.year_from.is_some_and(|y| y < EARLIEST_YEAR_FROM) {
            return Err(AppError::bad_request(format!("year_from must be at least {EARLIEST_YEAR_FROM}")));
        }
        if self.year_to.is_some_and(|y| y > LATEST_YEAR_TO) {
            return Err(AppError::bad_request(format!("year_to must be at most {LATEST_YEAR_TO}")));
        }
        let genres = split_list(self.genres.as_deref());

        Ok(FilterConfig {
            genres: (!genres.is_empty()).then_some(genres),
            genre_match: self.genre_match.unwrap_or_default(),
            min_rating: Some(self.min_rating.unwrap_or(DEFAULT_MIN_RATING)),
            min_votes: Some(min_votes),
            min_year: self.year_from,
            max_year: self.year_to,
            min_runtime: self.runtime_min,
            max_runtime: self.runtime_max,
            language: self.language.filter(|l| !l.trim().is_empty()),
        })
    }
}

pub async fn movies(
    State(state): State<Arc<AppState>>,
    ApiQuery(q): ApiQuery<MoviesQuery>,
) -> AppResult<Json<Vec<MovieSummary>>> {
    let limit = limit(q.limit)?;
    let filter = q.into_filter()?;
    let facade = state.facade.clone();
    Ok(Json(blocking(move || facade.with_filters(&filter, limit)).await?))
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    limit: Option<i64>,
}

pub async fn top_rated(
    State(state): State<Arc<AppState>>,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> AppResult<Json<Vec<MovieSummary>>> {
    let limit = limit(q.limit)?;
    let facade = state.facade.clone();
    Ok(Json(blocking(move || facade.top_rated(limit)).await?))
}

#[derive(Debug, Deserialize)]
pub struct PopularQuery {
    limit: Option<i64>,
    min_year: Option<i32>,
}

pub async fn popular(
    State(state): State<Arc<AppState>>,
    ApiQuery(q): ApiQuery<PopularQuery>,
) -> AppResult<Json<Vec<MovieSummary>>> {
    let limit = limit(q.limit)?;
    let facade = state.facade.clone();
    Ok(Json(blocking(move || facade.most_popular(limit, q.min_year)).await?))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: String,
    limit: Option<i64>,
    match_genre: Option<bool>,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    ApiQuery(q): ApiQuery<SearchQuery>,
) -> AppResult<Json<Vec<MovieSummary>>> {
    let limit = limit(q.limit)?;
    if q.q.trim().is_empty() {
        return Err(AppError::bad_request("q is required"));
    }
    let facade = state.facade.clone();
    let match_genre = q.match_genre.unwrap_or(true);
    Ok(Json(blocking(move || facade.search(&q.q, limit, match_genre)).await?))
}

#[derive(Debug, Deserialize)]
pub struct GenresQuery {
    genres: String,
    #[serde(rename = "match")]
    genre_match: Option<GenreMatch>,
    limit: Option<i64>,
}

pub async fn by_genres(
    State(state): State<Arc<AppState>>,
    ApiQuery(q): ApiQuery<GenresQuery>,
) -> AppResult<Json<Vec<MovieSummary>>> {
    let limit = limit(q.limit)?;
    let genres = split_list(Some(&q.genres));
    if genres.is_empty() {
        return Err(AppError::bad_request("genres is required"));
    }
    let match_all = q.genre_match.unwrap_or_default() == GenreMatch::All;
    let facade = state.facade.clone();
    Ok(Json(blocking(move || facade.by_genres(&genres, match_all, limit)).await?))
}

#[derive(Debug, Deserialize)]
pub struct CollectionQuery {
    count: Option<i64>,
}

pub async fn collection(
    State(state): State<Arc<AppState>>,
    ApiQuery(q): ApiQuery<CollectionQuery>,
) -> AppResult<Json<Vec<MovieSummary>>> {
    let count = q.count.unwrap_or(MAX_LIMIT);
    if !(1..=2 * MAX_LIMIT).contains(&count) {
        return Err(AppError::bad_request(format!("count must be between 1 and {}", 2 * MAX_LIMIT)));
    }
    let facade = state.facade.clone();
    Ok(Json(blocking(move || facade.collect(count)).await?))
}

pub async fn genres(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<GenreCount>>> {
    let facade = state.facade.clone();
    Ok(Json(blocking(move || facade.available_genres()).await?))
}

pub async fn languages(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<LanguageCount>>> {
    let facade = state.facade.clone();
    Ok(Json(blocking(move || facade.available_languages()).await?))
}

pub async fn by_language(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> AppResult<Json<Vec<MovieSummary>>> {
    let limit = limit(q.limit)?;
    let facade = state.facade.clone();
    Ok(Json(blocking(move || facade.by_language(&code, limit)).await?))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    catalog: SnapshotStats,
    languages: Option<IndexStats>,
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse { catalog: state.facade.stats(), languages: state.facade.language_stats() })
}

/// Starts a background reload unless one is already running.
pub async fn reload(State(state): State<Arc<AppState>>) -> Response {
    if state.reloading.swap(true, Ordering::AcqRel) {
        return (StatusCode::CONFLICT, Json(serde_json::json!({ "status": "already reloading" })))
            .into_response();
    }

    let facade = state.facade.clone();
    let flag = state.reloading.clone();
    tokio::task::spawn_blocking(move || {
        match facade.catalog().reload() {
            Ok(true) => info!("catalog reloaded"),
            Ok(false) => info!("catalog reload superseded"),
            Err(err) => warn!(error = %err, "catalog reload failed, keeping previous snapshot"),
        }
        flag.store(false, Ordering::Release);
    });

    (StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "reloading" }))).into_response()
}
