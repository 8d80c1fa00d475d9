use crate::error::ConfigError;
use crate::pipeline::Orchestrator;
use crate::scrapers::types::Location;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    /// Held for the whole run so at most one run is active
    run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct ScrapeQuery {
    pages: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ScrapeResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/scrape", get(scrape_handler).post(scrape_handler))
        .route("/scrape/locations", get(scrape_locations_handler).post(scrape_locations_handler))
        .route("/scrape/{city}", get(scrape_city_handler).post(scrape_city_handler))
        .route(
            "/scrape/{city}/{district}",
            get(scrape_district_handler).post(scrape_district_handler),
        )
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("🌐 Listening on 0.0.0.0:{}", port);
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn index_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = state.orchestrator.config();
    Json(json!({
        "service": "fsbo-harvester",
        "version": env!("CARGO_PKG_VERSION"),
        "target": config.search.page_url(1),
        "default_pages": config.default_pages,
        "max_pages": config.max_pages,
        "status": "ready",
    }))
}

/// Liveness only; never scrapes
async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "renderer": state.orchestrator.fetcher().renderer_name(),
        "store": state.orchestrator.reconciler().store_name(),
        "user_agents": state.orchestrator.fetcher().identity_count(),
        "run_in_progress": state.run_lock.try_lock().is_err(),
    }))
}

async fn scrape_handler(
    State(state): State<AppState>,
    query: Result<Query<ScrapeQuery>, QueryRejection>,
) -> Response {
    let pages = match requested_pages(query) {
        Ok(pages) => pages,
        Err(resp) => return resp,
    };

    let _guard = state.run_lock.lock().await;
    let result = match pages {
        Some(pages) => state.orchestrator.run(pages).await,
        None => state.orchestrator.run_default().await,
    };
    respond(result)
}

/// Every configured location, one after another
async fn scrape_locations_handler(
    State(state): State<AppState>,
    query: Result<Query<ScrapeQuery>, QueryRejection>,
) -> Response {
    let pages = match requested_pages(query) {
        Ok(pages) => pages.unwrap_or_else(|| state.orchestrator.config().default_pages.into()),
        Err(resp) => return resp,
    };

    let _guard = state.run_lock.lock().await;
    respond(state.orchestrator.run_locations(pages).await)
}

async fn scrape_city_handler(
    State(state): State<AppState>,
    Path(city): Path<String>,
    query: Result<Query<ScrapeQuery>, QueryRejection>,
) -> Response {
    scrape_location(state, Location::new(&city, None), query).await
}

async fn scrape_district_handler(
    State(state): State<AppState>,
    Path((city, district)): Path<(String, String)>,
    query: Result<Query<ScrapeQuery>, QueryRejection>,
) -> Response {
    scrape_location(state, Location::new(&city, Some(&district)), query).await
}

async fn scrape_location(
    state: AppState,
    location: Result<Location, ConfigError>,
    query: Result<Query<ScrapeQuery>, QueryRejection>,
) -> Response {
    let location = match location {
        Ok(location) => location,
        Err(err) => return config_error(err),
    };
    let pages = match requested_pages(query) {
        Ok(pages) => pages.unwrap_or_else(|| state.orchestrator.config().default_pages.into()),
        Err(resp) => return resp,
    };

    let _guard = state.run_lock.lock().await;
    respond(state.orchestrator.run_location(&location, pages).await)
}

/// `?pages=` as given, or a JSON 400 when it does not parse
fn requested_pages(query: Result<Query<ScrapeQuery>, QueryRejection>) -> Result<Option<i64>, Response> {
    match query {
        Ok(Query(query)) => Ok(query.pages),
        Err(rejection) => Err(bad_request(rejection.body_text())),
    }
}

fn respond<T: Serialize>(result: Result<T, ConfigError>) -> Response {
    match result {
        Ok(summary) => (
            StatusCode::OK,
            Json(ScrapeResponse {
                success: true,
                summary: Some(summary),
                error: None,
            }),
        )
            .into_response(),
        Err(err) => config_error(err),
    }
}

fn config_error(err: ConfigError) -> Response {
    error!("Rejected scrape request: {}", err);
    bad_request(err.to_string())
}

fn bad_request(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ScrapeResponse::<()> {
            success: false,
            summary: None,
            error: Some(message),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::pipeline::Reconciler;
    use crate::scrapers::extractor::fixtures::{card, page};
    use crate::scrapers::fetcher::test_support::{fetcher, StubRenderer};
    use crate::scrapers::types::{DelayPolicy, SearchParams};
    use crate::scrapers::ListingExtractor;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn state(renderer: Arc<StubRenderer>) -> AppState {
        let config = PipelineConfig {
            delay: DelayPolicy::none(),
            ..PipelineConfig::default()
        };
        AppState::new(Orchestrator::new(
            config,
            fetcher(renderer),
            ListingExtractor::new(SearchParams::default()).unwrap(),
            Reconciler::new(Arc::new(MemoryStore::new())),
        ))
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_does_not_scrape() {
        let renderer = Arc::new(StubRenderer::default());
        let resp = app(state(renderer.clone()))
            .oneshot(axum::http::Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["status"], "healthy");
        assert_eq!(renderer.call_count(), 0);
    }

    #[tokio::test]
    async fn scrape_uses_default_pages_when_absent() {
        let renderer = Arc::new(StubRenderer::default());
        let resp = app(state(renderer.clone()))
            .oneshot(axum::http::Request::builder().uri("/scrape").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["summary"]["requested_pages"], 3);
        assert_eq!(json["summary"]["pages_failed"], 3);
        assert_eq!(renderer.call_count(), 3);
    }

    #[tokio::test]
    async fn partial_failure_is_still_ok() {
        let renderer = Arc::new(StubRenderer::default());
        let params = SearchParams::default();
        renderer.serve(
            params.page_url(1),
            Ok(page(&[card(Some("extA"), "Sahibinden", "1.500.000 TL", "Kadıköy")])),
        );

        let resp = app(state(renderer))
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/scrape?pages=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["summary"]["pages_fetched_ok"], 1);
        assert_eq!(json["summary"]["pages_failed"], 1);
        assert_eq!(json["summary"]["records_inserted"], 1);
    }

    #[tokio::test]
    async fn zero_pages_is_a_bad_request() {
        let renderer = Arc::new(StubRenderer::default());
        let resp = app(state(renderer.clone()))
            .oneshot(axum::http::Request::builder().uri("/scrape?pages=0").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["success"], false);
        assert_eq!(renderer.call_count(), 0);
    }

    #[tokio::test]
    async fn unparsable_pages_is_a_json_bad_request() {
        let renderer = Arc::new(StubRenderer::default());
        let resp = app(state(renderer.clone()))
            .oneshot(axum::http::Request::builder().uri("/scrape?pages=abc").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().is_some());
        assert_eq!(renderer.call_count(), 0);
    }

    #[tokio::test]
    async fn district_route_scrapes_that_search() {
        let renderer = Arc::new(StubRenderer::default());
        let kadikoy = Location::new("istanbul", Some("kadikoy")).unwrap();
        let target = SearchParams::default().for_location(&kadikoy);
        renderer.serve(
            target.page_url(1),
            Ok(page(&[card(Some("extK"), "Sahibinden", "1.500.000 TL", "Kadıköy")])),
        );

        let resp = app(state(renderer.clone()))
            .oneshot(
                axum::http::Request::builder()
                    .uri("/scrape/istanbul/kadikoy?pages=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["summary"]["location"], "/satilik-daire/istanbul-kadikoy");
        assert_eq!(json["summary"]["records_inserted"], 1);
        assert_eq!(renderer.requested_urls(), vec![target.page_url(1)]);
    }

    #[tokio::test]
    async fn city_route_rejects_unusable_names() {
        let renderer = Arc::new(StubRenderer::default());
        let resp = app(state(renderer.clone()))
            .oneshot(axum::http::Request::builder().uri("/scrape/ist%3Fx%3D1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["success"], false);
        assert_eq!(renderer.call_count(), 0);
    }

    #[tokio::test]
    async fn locations_route_walks_configured_locations() {
        let renderer = Arc::new(StubRenderer::default());
        let resp = app(state(renderer.clone()))
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/scrape/locations?pages=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["summary"]["locations"].as_array().map(Vec::len), Some(5));
        assert_eq!(json["summary"]["locations_scraped"], 0);
        assert_eq!(renderer.call_count(), 5);
    }
}
