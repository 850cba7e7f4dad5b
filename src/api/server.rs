//! HTTP server for the tableroll API.
//!
//! The chat-platform command layer is a client of these endpoints; upload,
//! download and permissioning live over there.
//!
//! # API Endpoints
//!
//! | Method | Path                              | Description                        |
//! |--------|-----------------------------------|------------------------------------|
//! | GET    | `/health`                         | Health check                       |
//! | POST   | `/api/guilds/{id}/tables`         | Import a workbook (multipart)      |
//! | GET    | `/api/guilds/{id}/tables`         | Export the current workbook        |
//! | DELETE | `/api/guilds/{id}/tables`         | Irreversibly delete all tables     |
//! | POST   | `/api/guilds/{id}/roll`           | Roll a composed encounter          |
//! | GET    | `/api/guilds/{id}/regions`        | List pickable regions              |
//! | GET    | `/api/template`                   | Download the blank template        |
//! | POST   | `/api/travel/land`                | Overland travel estimate           |
//! | POST   | `/api/travel/sea`                 | Sea travel estimate                |

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use super::types::{
    DeleteResponse, ImportResponse, LandTravelRequest, RegionsResponse, RollRequest, RollResponse,
    SeaTravelRequest,
};
use crate::config::Config;
use crate::error::{ServerError, ServerResult};
use crate::travel::{calculate_sea_travel, calculate_travel, TravelEstimate};
use crate::workbook::Workbook;
use crate::{pipeline, roll, store};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
}

/// Start the HTTP server and serve until shutdown.
pub async fn start_server(pool: SqlitePool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    let cors = if config.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
    };

    let state = AppState { pool };

    let app = Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route(
            "/api/guilds/{guild_id}/tables",
            post(import_tables).get(export_tables).delete(delete_tables),
        )
        .route("/api/guilds/{guild_id}/roll", post(roll_guild))
        .route("/api/guilds/{guild_id}/regions", get(list_regions))
        .route("/api/template", get(template))
        .route("/api/travel/land", post(travel_land))
        .route("/api/travel/sea", post(travel_sea))
        .layer(cors)
        .with_state(state);

    let addr = config.server_address();
    info!("tableroll server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "tableroll",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Import a workbook for a guild, replacing any previous import.
async fn import_tables(
    State(state): State<AppState>,
    Path(guild_id): Path<i64>,
    mut multipart: Multipart,
) -> ServerResult<Json<ImportResponse>> {
    let mut file_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {e}")))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {e}")))?;
            file_data = Some(bytes.to_vec());
        }
    }

    let bytes = file_data.ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;

    info!(guild_id, size = bytes.len(), "workbook upload");
    let counts = pipeline::import_workbook_bytes(&state.pool, guild_id, &bytes).await?;

    Ok(Json(ImportResponse::from(counts)))
}

/// Export the guild's current tables as a workbook document.
async fn export_tables(
    State(state): State<AppState>,
    Path(guild_id): Path<i64>,
) -> ServerResult<Response> {
    match pipeline::export_workbook(&state.pool, guild_id)
        .await
        .map_err(ServerError::Store)?
    {
        Some(workbook) => Ok(Json(workbook).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "No encounter tables imported yet.",
                "hint": "GET /api/template for a blank workbook to fill in.",
            })),
        )
            .into_response()),
    }
}

/// Permanently delete every table, region and entry for the guild.
async fn delete_tables(
    State(state): State<AppState>,
    Path(guild_id): Path<i64>,
) -> ServerResult<Json<DeleteResponse>> {
    store::delete_guild(&state.pool, guild_id)
        .await
        .map_err(ServerError::Store)?;

    Ok(Json(DeleteResponse {
        success: true,
        message: "All encounter table data permanently deleted.".to_string(),
    }))
}

/// Roll a composed encounter for the guild.
async fn roll_guild(
    State(state): State<AppState>,
    Path(guild_id): Path<i64>,
    body: Option<Json<RollRequest>>,
) -> ServerResult<Json<RollResponse>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let rolled = roll::roll_encounter(&state.pool, guild_id, request.region_id).await?;
    Ok(Json(RollResponse::from(rolled)))
}

/// List the guild's regions in configured order, for pick-one UIs.
async fn list_regions(
    State(state): State<AppState>,
    Path(guild_id): Path<i64>,
) -> ServerResult<Json<RegionsResponse>> {
    let regions = store::fetch_regions(&state.pool, guild_id)
        .await
        .map_err(ServerError::Store)?;

    Ok(Json(RegionsResponse {
        regions: regions.into_iter().map(Into::into).collect(),
    }))
}

/// The built-in sample workbook.
async fn template() -> Json<Workbook> {
    Json(Workbook::template())
}

/// Overland travel estimate.
async fn travel_land(Json(request): Json<LandTravelRequest>) -> Json<TravelEstimate> {
    Json(calculate_travel(
        &request.hex_counts,
        request.unexplored_hexes,
        request.explored_road_hexes,
        request.forced_hours,
    ))
}

/// Sea travel estimate.
async fn travel_sea(Json(request): Json<SeaTravelRequest>) -> Json<TravelEstimate> {
    Json(calculate_sea_travel(
        request.vessel,
        request.calm_hexes,
        request.rough_hexes,
        request.unexplored_hexes,
    ))
}
