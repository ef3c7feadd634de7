//! REST API for the load planning service.
//!
//! Provides HTTP endpoints for planning container loads.
//! Uses Axum as the web framework and supports CORS.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::config::{ApiConfig, OptimizerConfig};
use crate::container::{Batch, Container};
use crate::loader::{
    ContainerInventory, Leftover, LoadingResult, LoadingType, PackingConfig, PackingMode,
    load_items_with_config, load_items_with_progress,
};
use crate::model::{ContainerSpec, ItemSpec, OrientationRules, ValidationError};
use crate::types::{Dimensional, Point, Weighted};

#[derive(Clone)]
struct ApiState {
    optimizer_config: OptimizerConfig,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>load_planner API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

fn default_true() -> bool {
    true
}

fn default_kind() -> String {
    String::from("box")
}

/// One cargo type with the number of units to load.
///
/// A positive `diameter` marks cylindrical goods; length and width are then
/// replaced by the diameter.
#[derive(Deserialize, Clone, Debug, ToSchema)]
pub struct CargoRequest {
    pub name: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    pub length: u32,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub diameter: Option<u32>,
    pub weight: u32,
    #[serde(default)]
    pub color: String,
    #[serde(default = "default_true")]
    pub stack: bool,
    #[serde(default = "default_true")]
    pub height_as_height: bool,
    #[serde(default)]
    pub length_as_height: bool,
    #[serde(default)]
    pub width_as_height: bool,
    /// Handling clearance around the footprint; the configured default when omitted.
    #[serde(default)]
    pub extension: Option<u32>,
    pub number: u32,
}

impl CargoRequest {
    fn into_spec(self, default_extension: u32) -> Result<(ItemSpec, u32), ValidationError> {
        let orientation = OrientationRules {
            height_as_height: self.height_as_height,
            length_as_height: self.length_as_height,
            width_as_height: self.width_as_height,
        };
        let mut builder =
            ItemSpec::builder(self.name, (self.length, self.width, self.height), self.weight)
                .kind(self.kind)
                .color(self.color)
                .stackable(self.stack)
                .orientation(orientation)
                .extension(self.extension.unwrap_or(default_extension));
        if let Some(diameter) = self.diameter.filter(|d| *d > 0) {
            builder = builder.diameter(diameter);
        }
        Ok((builder.build()?, self.number))
    }
}

/// One container type with the number of containers available.
#[derive(Deserialize, Clone, Debug, ToSchema)]
pub struct ContainerRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub length: u32,
    pub width: u32,
    pub height: u32,
    /// Lifting capacity in kg.
    pub weight: u32,
    pub number: u32,
}

impl ContainerRequest {
    fn into_spec(self) -> Result<(ContainerSpec, u32), ValidationError> {
        let spec = ContainerSpec::new(self.kind, (self.length, self.width, self.height), self.weight)?;
        Ok((spec, self.number))
    }
}

/// Request structure for the load endpoints.
///
/// Without `containers` the configured container catalog is used with an
/// unlimited number of containers per type.
#[derive(Deserialize, Debug, ToSchema)]
#[schema(
    example = json!({
        "cargo": [
            {
                "name": "pallet", "type": "box", "length": 120, "width": 80, "height": 100,
                "weight": 300, "color": "#ff8800", "stack": true,
                "height_as_height": true, "length_as_height": false, "width_as_height": false,
                "number": 10
            }
        ],
        "containers": [
            { "type": "20' container", "length": 589, "width": 235, "height": 239, "weight": 28200, "number": 1 }
        ],
        "loading_type": "stable",
        "with_order": true
    })
)]
pub struct LoadRequest {
    pub cargo: Vec<CargoRequest>,
    #[serde(default)]
    pub containers: Option<Vec<ContainerRequest>>,
    #[serde(default)]
    pub loading_type: Option<LoadingType>,
    #[serde(default)]
    pub with_order: Option<bool>,
    #[serde(default)]
    pub packing_mode: Option<PackingMode>,
}

#[derive(Debug)]
struct ValidatedLoadRequest {
    items: Vec<(ItemSpec, u32)>,
    inventory: ContainerInventory,
    config: PackingConfig,
}

impl ValidatedLoadRequest {
    fn unit_count(&self) -> u64 {
        self.items.iter().map(|(_, count)| u64::from(*count)).sum()
    }

    fn into_parts(self) -> (Vec<(ItemSpec, u32)>, ContainerInventory, PackingConfig) {
        (self.items, self.inventory, self.config)
    }
}

#[derive(Debug)]
enum LoadRequestValidationError {
    MissingCargo,
    MissingContainers,
    InvalidCargo(String, ValidationError),
    InvalidContainer(ValidationError),
}

/// Keeps the first position of equal keys and the count of the last one.
fn merge_counts<K: PartialEq>(entries: Vec<(K, u32)>) -> Vec<(K, u32)> {
    let mut merged: Vec<(K, u32)> = Vec::with_capacity(entries.len());
    for (key, count) in entries {
        match merged.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = count,
            None => merged.push((key, count)),
        }
    }
    merged
}

impl LoadRequest {
    fn into_validated(
        self,
        optimizer: &OptimizerConfig,
    ) -> Result<ValidatedLoadRequest, LoadRequestValidationError> {
        if self.cargo.is_empty() {
            return Err(LoadRequestValidationError::MissingCargo);
        }

        let default_extension = optimizer.default_extension();
        let items = self
            .cargo
            .into_iter()
            .map(|cargo| {
                let name = cargo.name.clone();
                cargo
                    .into_spec(default_extension)
                    .map_err(|err| LoadRequestValidationError::InvalidCargo(name, err))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let inventory = match self.containers {
            None => ContainerInventory::Auto(optimizer.catalog().to_vec()),
            Some(containers) if containers.is_empty() => {
                return Err(LoadRequestValidationError::MissingContainers);
            }
            Some(containers) => ContainerInventory::Fixed(merge_counts(
                containers
                    .into_iter()
                    .map(ContainerRequest::into_spec)
                    .collect::<Result<Vec<_>, ValidationError>>()
                    .map_err(LoadRequestValidationError::InvalidContainer)?,
            )),
        };

        let mut config = optimizer.packing_config();
        if let Some(loading_type) = self.loading_type {
            config.loading_type = loading_type;
        }
        if let Some(with_order) = self.with_order {
            config.with_order = with_order;
        }
        if let Some(packing_mode) = self.packing_mode {
            config.packing_mode = packing_mode;
        }

        Ok(ValidatedLoadRequest {
            items: merge_counts(items),
            inventory,
            config,
        })
    }
}

/// Cargo type description in responses.
#[derive(Serialize, Debug, ToSchema)]
pub struct CargoResponse {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub length: u32,
    pub width: u32,
    pub height: u32,
    pub diameter: Option<u32>,
    pub weight: u32,
    pub color: String,
    pub stack: bool,
    pub extension: u32,
}

impl From<&ItemSpec> for CargoResponse {
    fn from(spec: &ItemSpec) -> Self {
        Self {
            name: spec.name().to_string(),
            kind: spec.kind().to_string(),
            length: spec.length(),
            width: spec.width(),
            height: spec.height(),
            diameter: spec.diameter(),
            weight: spec.weight(),
            color: spec.color().to_string(),
            stack: spec.is_stackable(),
            extension: spec.volume_spec().extension(),
        }
    }
}

/// Consecutively placed units of one cargo type in one orientation.
///
/// # Fields
/// * `orientation` - Loaded (length, width, height)
/// * `points` - Min corners of the units in placement order
#[derive(Serialize, Debug, ToSchema)]
pub struct BatchResponse {
    pub cargo: CargoResponse,
    #[schema(value_type = Vec<u32>, example = json!([120, 80, 100]))]
    pub orientation: [u32; 3],
    pub points: Vec<Point>,
}

impl From<&Batch> for BatchResponse {
    fn from(batch: &Batch) -> Self {
        Self {
            cargo: CargoResponse::from(batch.spec.as_ref()),
            orientation: [batch.volume.length(), batch.volume.width(), batch.volume.height()],
            points: batch.positions.clone(),
        }
    }
}

/// One loaded container.
///
/// # Fields
/// * `id` - Container number (1-based)
/// * `loaded_volume_share` - Loaded extended volume divided by container volume
/// * `loaded_weight` - Total weight of all units in the container
#[derive(Serialize, Debug, ToSchema)]
pub struct LoadedContainerResponse {
    pub id: usize,
    #[serde(rename = "type")]
    pub kind: String,
    pub length: u32,
    pub width: u32,
    pub height: u32,
    pub weight: u32,
    pub loaded_volume_share: f64,
    pub loaded_weight: u64,
    pub batches: Vec<BatchResponse>,
}

impl From<&Container> for LoadedContainerResponse {
    fn from(container: &Container) -> Self {
        let spec = container.spec();
        Self {
            id: container.id(),
            kind: spec.name().to_string(),
            length: spec.length(),
            width: spec.width(),
            height: spec.height(),
            weight: spec.lifting_capacity(),
            loaded_volume_share: container.loaded_volume_share(),
            loaded_weight: container.loaded_weight(),
            batches: container.batches().iter().map(BatchResponse::from).collect(),
        }
    }
}

/// Units of one cargo type that were not loaded.
#[derive(Serialize, Debug, ToSchema)]
pub struct LeftCargoResponse {
    pub cargo: CargoResponse,
    pub number: u32,
}

impl From<&Leftover> for LeftCargoResponse {
    fn from(leftover: &Leftover) -> Self {
        Self {
            cargo: CargoResponse::from(leftover.spec.as_ref()),
            number: leftover.count,
        }
    }
}

/// Response structure with all loaded containers.
///
/// # Fields
/// * `containers` - Loaded containers in opening order
/// * `left_cargos` - Cargo types with units left over; types without leftovers are omitted
#[derive(Serialize, Debug, ToSchema)]
pub struct LoadResponse {
    pub containers: Vec<LoadedContainerResponse>,
    pub left_cargos: Vec<LeftCargoResponse>,
    pub is_complete: bool,
}

impl LoadResponse {
    pub fn from_loading_result(result: &LoadingResult) -> Self {
        Self {
            containers: result
                .containers
                .iter()
                .map(LoadedContainerResponse::from)
                .collect(),
            left_cargos: result
                .leftovers
                .iter()
                .filter(|leftover| leftover.count > 0)
                .map(LeftCargoResponse::from)
                .collect(),
            is_complete: result.is_complete(),
        }
    }
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid input data",
        details,
    )
}

fn container_config_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid container configuration",
        details,
    )
}

fn parse_load_request(
    payload: Result<Json<LoadRequest>, JsonRejection>,
    optimizer: &OptimizerConfig,
) -> Result<ValidatedLoadRequest, Response> {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return Err(json_deserialize_error(err)),
    };

    match payload.into_validated(optimizer) {
        Ok(validated) => Ok(validated),
        Err(LoadRequestValidationError::MissingCargo) => {
            Err(validation_error("At least one cargo type must be specified"))
        }
        Err(LoadRequestValidationError::MissingContainers) => Err(container_config_error(
            "Omit containers or specify at least one container type",
        )),
        Err(LoadRequestValidationError::InvalidCargo(name, err)) => {
            Err(validation_error(format!("Cargo '{}': {}", name, err)))
        }
        Err(LoadRequestValidationError::InvalidContainer(err)) => {
            Err(container_config_error(err.to_string()))
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_load, handle_load_stream),
    components(
        schemas(
            LoadRequest,
            CargoRequest,
            ContainerRequest,
            LoadResponse,
            LoadedContainerResponse,
            BatchResponse,
            CargoResponse,
            LeftCargoResponse,
            ErrorResponse,
            Point,
            LoadingType,
            PackingMode
        )
    ),
    tags((name = "loading", description = "Endpoints for container load planning"))
)]
struct ApiDoc;

fn router(optimizer_config: OptimizerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/load", post(handle_load))
        .route("/load_stream", post(handle_load_stream))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(ApiState { optimizer_config })
}

/// Starts the API server.
///
/// Configures CORS for cross-origin requests.
/// Blocks until the server is terminated.
pub async fn start_api_server(config: ApiConfig, optimizer_config: OptimizerConfig) {
    let app = router(optimizer_config);

    let addr = config.socket_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            log::error!("Could not bind API server to {}: {}", addr, err);
            return;
        }
    };

    log::info!(
        "Server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() {
        log::info!("Local access: http://localhost:{}", config.port());
    }
    log::info!("Endpoints: POST /load, POST /load_stream, GET /docs, GET /docs/openapi.json");

    if let Err(err) = axum::serve(listener, app).await {
        log::error!("API server terminated with an error: {err}");
    }
}

/// Handler for POST /load endpoint.
///
/// Plans the loading of all requested cargo into containers.
///
/// # Returns
/// JSON response with all loaded containers and the cargo left over
#[utoipa::path(
    post,
    path = "/load",
    request_body = LoadRequest,
    responses(
        (status = 200, description = "Load plan computed", body = LoadResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or container configuration",
            body = ErrorResponse
        )
    ),
    tag = "loading"
)]
async fn handle_load(
    State(state): State<ApiState>,
    payload: Result<Json<LoadRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_load_request(payload, &state.optimizer_config) {
        Ok(request) => request,
        Err(response) => return response,
    };

    log::info!(
        "New load request: {} cargo types, {} units",
        request.items.len(),
        request.unit_count()
    );
    let (items, inventory, config) = request.into_parts();
    let planning = tokio::task::spawn_blocking(move || load_items_with_config(items, inventory, config));
    let result = match planning.await {
        Ok(result) => result,
        Err(err) => {
            log::error!("Load planning task failed: {err}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Load planning failed",
                err.to_string(),
            );
        }
    };

    let response = LoadResponse::from_loading_result(&result);
    (StatusCode::OK, Json(response)).into_response()
}

/// Handler for POST /load_stream endpoint (SSE).
///
/// Streams loading events in real-time as Server-Sent Events (text/event-stream).
#[utoipa::path(
    post,
    path = "/load_stream",
    request_body = LoadRequest,
    responses(
        (
            status = 200,
            description = "Streams loading events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or container configuration",
            body = ErrorResponse
        )
    ),
    tag = "loading"
)]
async fn handle_load_stream(
    State(state): State<ApiState>,
    payload: Result<Json<LoadRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_load_request(payload, &state.optimizer_config) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let (items, inventory, config) = request.into_parts();
    let (tx, rx) = mpsc::channel::<String>(32);

    tokio::task::spawn_blocking(move || {
        let _ = load_items_with_progress(items, inventory, config, |evt| {
            if let Ok(json) = serde_json::to_string(evt) {
                // A closed receiver discards the remaining events.
                let _ = tx.blocking_send(json);
            }
        });
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
