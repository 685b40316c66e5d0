//! Workstation registration and lookup handlers

use crate::api::rest::response::ApiResponse;
use crate::api::rest::state::AppState;
use crate::dns::PropagationStatus;
use crate::error::{ApiError, ApiResult};
use crate::storage::{
    EventStorage, SortField, SortOrder, WorkstationQuery, WorkstationStorage, DEFAULT_EVENT_LIMIT,
};
use crate::validation::validate_registration;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde::Deserialize;
use termfleet_types::{WorkstationEvent, WorkstationStatus, WorkstationView};

/// Largest page of events a single request may ask for
pub const MAX_EVENT_LIMIT: usize = 500;

/// Register request
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
}

/// Register a workstation, or refresh its address
pub async fn register_workstation(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<WorkstationView>> {
    let Json(request) = body.map_err(|e| ApiError::InvalidInput(e.body_text()))?;

    let name = request.name.unwrap_or_default();
    let ip = request.ip.unwrap_or_default();
    validate_registration(&name, &ip).map_err(ApiError::InvalidInput)?;

    // DNS labels are case-insensitive; records are keyed by the lowercase form.
    let name = name.to_ascii_lowercase();

    let outcome = state.registrar.register(&name, &ip).await?;

    if outcome.created {
        tracing::info!(name = %name, ip = %ip, "Registered workstation");
        state.reconciler.trigger();
        Ok(ApiResponse::created(outcome.view))
    } else {
        Ok(ApiResponse::ok(outcome.view))
    }
}

/// Query string for listings
#[derive(Debug, Default, Deserialize)]
pub struct ListWorkstationsParams {
    pub status: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

impl ListWorkstationsParams {
    fn into_query(self) -> ApiResult<WorkstationQuery> {
        let mut query = WorkstationQuery::all();

        if let Some(status) = self.status.as_deref() {
            let status: WorkstationStatus = status
                .parse()
                .map_err(|_| ApiError::InvalidInput(format!("Invalid status: {}", status)))?;
            query = query.with_status(status);
        }

        let order = match self.order.as_deref() {
            Some(order) => order
                .parse::<SortOrder>()
                .map_err(|_| ApiError::InvalidInput(format!("Invalid sort order: {}", order)))?,
            None => SortOrder::Asc,
        };

        match self.sort.as_deref() {
            Some(sort) => {
                let field: SortField = sort
                    .parse()
                    .map_err(|_| ApiError::InvalidInput(format!("Invalid sort field: {}", sort)))?;
                query = query.sorted_by(field, order);
            }
            None => query.order = order,
        }

        Ok(query)
    }
}

/// List workstations
pub async fn list_workstations(
    State(state): State<AppState>,
    Query(params): Query<ListWorkstationsParams>,
) -> ApiResult<ApiResponse<Vec<WorkstationView>>> {
    let query = params.into_query()?;
    let workstations = state.storage.list_workstations(&query).await?;

    Ok(ApiResponse::ok(
        workstations.into_iter().map(WorkstationView::from).collect(),
    ))
}

/// Get one workstation
pub async fn get_workstation(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<ApiResponse<WorkstationView>> {
    let workstation = state
        .storage
        .get_workstation(&name.to_ascii_lowercase())
        .await?
        .ok_or_else(|| ApiError::NotFound("Workstation not found".to_string()))?;

    Ok(ApiResponse::ok(workstation.into()))
}

/// Check whether a workstation's domain resolves
pub async fn check_propagation(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<ApiResponse<PropagationStatus>> {
    let status = state
        .registrar
        .check_propagation(&name.to_ascii_lowercase())
        .await?;
    Ok(ApiResponse::ok(status))
}

/// Query string for the audit log
#[derive(Debug, Default, Deserialize)]
pub struct ListEventsParams {
    pub limit: Option<String>,
}

/// Audit log of one workstation, newest first
pub async fn list_workstation_events(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<ListEventsParams>,
) -> ApiResult<ApiResponse<Vec<WorkstationEvent>>> {
    let limit = match params.limit.as_deref() {
        Some(raw) => match raw.parse::<usize>() {
            Ok(limit) if limit > 0 => limit.min(MAX_EVENT_LIMIT),
            _ => {
                return Err(ApiError::InvalidInput(format!(
                    "Invalid limit: {}",
                    raw
                )))
            }
        },
        None => DEFAULT_EVENT_LIMIT,
    };

    let name = name.to_ascii_lowercase();
    if state.storage.get_workstation(&name).await?.is_none() {
        return Err(ApiError::NotFound("Workstation not found".to_string()));
    }

    let events = state.storage.list_events(&name, limit).await?;
    Ok(ApiResponse::ok(events))
}
