//! ==============================================================================
//! export.rs - http export layer
//! ==============================================================================
//!
//! purpose:
//!     exposes the value projector to remote clients. the address space is
//!     one folder per station with one variable per projectable field; reading
//!     a variable is a single `ValueProjector::project` call.
//!
//! endpoints:
//!     GET /stations                  -> address space (folders + variables)
//!     GET /stations/:id/:field       -> { status, value } for one variable
//!
//! a missing station, a missing value or an unknown field all answer
//! 200 with status "BadDataUnavailable". nothing here ever fetches.
//!
//! ==============================================================================

use std::net::SocketAddr;

use anyhow::Result;
use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::domain::StationConfig;
use crate::projector::{DataType, Field, ProjectedValue, Projection, ValueProjector};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VariableNode {
    pub node_id: String,
    pub browse_name: &'static str,
    pub field: &'static str,
    pub data_type: DataType,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StationFolder {
    pub station_id: String,
    pub browse_name: String,
    pub variables: Vec<VariableNode>,
}

/// folder + variable layout for every station, in registry order
pub fn address_space(stations: &[StationConfig], language: &str) -> Vec<StationFolder> {
    stations
        .iter()
        .map(|station| StationFolder {
            station_id: station.id.clone(),
            browse_name: format!("{}, {}", station.id, station.display_name(language)),
            variables: Field::ALL
                .iter()
                .map(|field| VariableNode {
                    node_id: format!("s={}-{}", station.id, field.browse_name()),
                    browse_name: field.browse_name(),
                    field: field.name(),
                    data_type: field.data_type(),
                })
                .collect(),
        })
        .collect()
}

#[derive(Debug, Serialize, PartialEq)]
pub struct VariableValue {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ProjectedValue>,
}

impl From<Projection> for VariableValue {
    fn from(projection: Projection) -> Self {
        match projection {
            Projection::Value(value) => Self {
                status: "Good",
                value: Some(value),
            },
            Projection::Unavailable => Self {
                status: "BadDataUnavailable",
                value: None,
            },
        }
    }
}

#[derive(Clone)]
struct ExportState {
    projector: ValueProjector,
    folders: std::sync::Arc<Vec<StationFolder>>,
}

pub fn router(projector: ValueProjector, stations: &[StationConfig], language: &str) -> Router {
    let state = ExportState {
        projector,
        folders: std::sync::Arc::new(address_space(stations, language)),
    };

    Router::new()
        .route("/stations", get(address_space_handler))
        .route("/stations/:station/:field", get(variable_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(bind: SocketAddr, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("[EXPORT] listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn address_space_handler(State(state): State<ExportState>) -> Json<Vec<StationFolder>> {
    Json(state.folders.as_ref().clone())
}

async fn variable_handler(
    State(state): State<ExportState>,
    Path((station, field)): Path<(String, String)>,
) -> Json<VariableValue> {
    Json(state.projector.project_named(&station, &field).into())
}
