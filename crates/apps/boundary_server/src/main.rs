use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::body::Body;
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use catalog::{Catalog, CATALOG_FILE_NAME};
use clap::{Parser, ValueEnum};
use engine::{BoundaryAggregator, DissolveEngine, EngineError, EngineHandle};
use layers::{InMemoryMap, Reconciler, StyleTable};
use runtime::ReadinessPolicy;
use serde::Deserialize;
use session::{OnDemandSession, RecordedDisplay, RecordedViewport, SessionError, TiledSession};
use streaming::{ResourceSource, SourceError, TileEndpoints, open_data_root};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Variant {
    /// Pre-built per-level tiles; serves layer descriptions.
    Tiled,
    /// Raw rows dissolved per request.
    OnDemand,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "GADM boundary viewer backend")]
struct Args {
    /// Directory or http(s):// base URL holding countries.json and the
    /// per-country resources
    #[arg(long, env = "GADM_DATA_ROOT", default_value = "data")]
    data_root: String,

    #[arg(long, env = "GADM_ADDR", default_value = "127.0.0.1:9200")]
    addr: SocketAddr,

    /// Per-level tile source template; `{archive}` and `{level}` are substituted
    #[arg(long, env = "GADM_TILE_URL", default_value = streaming::DEFAULT_TILE_URL_TEMPLATE)]
    tile_url: String,

    #[arg(long, value_enum, default_value_t = Variant::OnDemand)]
    variant: Variant,
}

#[derive(Clone)]
struct AppState {
    catalog: Arc<Catalog>,
    data: Arc<dyn ResourceSource>,
    reconciler: Reconciler,
    aggregator: Option<Arc<BoundaryAggregator>>,
    policy: ReadinessPolicy,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let data = open_data_root(&args.data_root);
    let catalog = Catalog::load(data.as_ref(), CATALOG_FILE_NAME)
        .await
        .with_context(|| format!("loading catalog from {}", data.describe()))?;

    let aggregator = match args.variant {
        Variant::Tiled => None,
        Variant::OnDemand => {
            let handle = Arc::new(EngineHandle::new(Arc::new(DissolveEngine::new())));
            let init = handle.clone();
            tokio::spawn(async move {
                if let Err(err) = init.initialize().await {
                    error!("engine init failed, on-demand boundaries unavailable: {err}");
                }
            });
            Some(Arc::new(BoundaryAggregator::new(handle, data.clone())))
        }
    };

    let state = AppState {
        catalog: Arc::new(catalog),
        data,
        reconciler: Reconciler::new(TileEndpoints::new(args.tile_url), StyleTable::default()),
        aggregator,
        policy: ReadinessPolicy::default(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::OPTIONS]);

    let app = router(state).layer(cors).layer(TraceLayer::new_for_http());

    info!(variant = ?args.variant, "boundary server listening on http://{}", args.addr);
    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("bind {}", args.addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/countries.json", get(get_catalog))
        .route("/data/:file", get(get_data))
        .route("/api/boundaries/:country/:level", get(get_boundaries))
        .route("/api/layers/:country", get(get_layers))
        .with_state(state)
}

async fn healthz() -> Response {
    (StatusCode::OK, "ok").into_response()
}

async fn get_catalog(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let etag = format!("\"{}\"", state.catalog.revision());
    let fresh = headers
        .get(http::header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == etag);
    let mut out = HeaderMap::new();
    if let Ok(v) = HeaderValue::from_str(&etag) {
        out.insert(http::header::ETAG, v);
    }
    if fresh {
        return (StatusCode::NOT_MODIFIED, out).into_response();
    }
    match state.catalog.to_json_pretty() {
        Ok(body) => {
            out.insert(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            (StatusCode::OK, out, body).into_response()
        }
        Err(err) => {
            error!("catalog serialization failed: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "catalog unavailable").into_response()
        }
    }
}

async fn get_data(State(state): State<AppState>, AxumPath(file): AxumPath<String>) -> Response {
    match state.data.fetch(&file).await {
        Ok(bytes) => {
            let mut headers = HeaderMap::new();
            headers.insert(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static(content_type_for(&file)),
            );
            (StatusCode::OK, headers, Body::from(bytes)).into_response()
        }
        Err(SourceError::InvalidKey { .. }) => (StatusCode::BAD_REQUEST, "bad path").into_response(),
        Err(err) => {
            warn!("data read failed: {err}");
            (StatusCode::NOT_FOUND, "not found").into_response()
        }
    }
}

async fn get_boundaries(
    State(state): State<AppState>,
    AxumPath((country, level)): AxumPath<(String, u8)>,
) -> Response {
    let Some(aggregator) = state.aggregator.clone() else {
        return (StatusCode::NOT_FOUND, "on-demand aggregation disabled").into_response();
    };
    let mut session = OnDemandSession::new(
        state.catalog.clone(),
        aggregator,
        RecordedDisplay::default(),
        RecordedViewport::default(),
    )
    .with_policy(state.policy);
    if let Err(err) = session.select_country_level(&country, level).await {
        return (session_status(&err), err.to_string()).into_response();
    }
    match session.display().current.as_ref() {
        Some(regions) => {
            let mut headers = HeaderMap::new();
            headers.insert(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/geo+json"),
            );
            (StatusCode::OK, headers, regions.to_geojson_string()).into_response()
        }
        None => (StatusCode::INTERNAL_SERVER_ERROR, "no boundaries displayed").into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct LayersQuery {
    /// Comma-separated levels to toggle on.
    #[serde(default)]
    levels: String,
}

async fn get_layers(
    State(state): State<AppState>,
    AxumPath(country): AxumPath<String>,
    Query(query): Query<LayersQuery>,
) -> Response {
    let mut session = TiledSession::new(
        state.catalog.clone(),
        state.reconciler.clone(),
        InMemoryMap::new(),
        RecordedViewport::default(),
    );
    let mut result = session.select_country(&country);
    for part in query.levels.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if result.is_err() {
            break;
        }
        result = match part.parse::<u8>() {
            Ok(level) => session.toggle_level(level).map(|_| ()),
            Err(_) => {
                return (StatusCode::BAD_REQUEST, format!("bad level {part:?}")).into_response();
            }
        };
    }
    match result {
        Ok(()) => axum::Json(session.map().to_style_json()).into_response(),
        Err(err) => (session_status(&err), err.to_string()).into_response(),
    }
}

fn engine_status(err: &EngineError) -> StatusCode {
    match err {
        EngineError::ResourceUnreachable { .. } => StatusCode::BAD_GATEWAY,
        EngineError::NotReady { .. } => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::InitFailed(_) | EngineError::QueryFailed(_) | EngineError::GeometryParse { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn session_status(err: &SessionError) -> StatusCode {
    match err {
        SessionError::UnknownCountry(_) => StatusCode::NOT_FOUND,
        SessionError::LevelUnavailable { .. } | SessionError::NoCountrySelected => StatusCode::BAD_REQUEST,
        SessionError::Engine(e) => engine_status(e),
    }
}

fn content_type_for(file: &str) -> &'static str {
    match file.rsplit_once('.').map(|(_, ext)| ext) {
        Some("json") => "application/json",
        Some("geojson") => "application/geo+json",
        Some("parquet") => "application/vnd.apache.parquet",
        Some("pmtiles") => "application/vnd.pmtiles",
        _ => "application/octet-stream",
    }
}
