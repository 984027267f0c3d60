use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use serde_json::Value;
use tokio::sync::mpsc;

use super::{authorize, dispatch, message, JsonBody, PathParam};
use crate::{
    auth::Claims,
    models::catalog::{Catalog, CatalogEntry, CatalogEntryInput},
    services::{catalog::CatalogRequest, ServiceError},
};

#[derive(Clone)]
struct CatalogState {
    channel: mpsc::Sender<CatalogRequest>,
    catalog: Catalog,
}

const SERVICE: &str = "CatalogService";

/// Routes for one catalog, mounted under its own prefix.
pub(super) fn router<S>(channel: mpsc::Sender<CatalogRequest>, catalog: Catalog) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(list_entries).post(create_entry))
        .route("/{id}", put(update_entry).delete(delete_entry))
        .with_state(CatalogState { channel, catalog })
}

async fn list_entries(
    State(state): State<CatalogState>,
) -> Result<Json<Vec<CatalogEntry>>, ServiceError> {
    let entries = dispatch(&state.channel, SERVICE, |response| CatalogRequest::List {
        response,
    })
    .await?;

    Ok(Json(entries))
}

async fn create_entry(
    State(state): State<CatalogState>,
    Extension(claims): Extension<Claims>,
    JsonBody(input): JsonBody<CatalogEntryInput>,
) -> Result<(StatusCode, Json<CatalogEntry>), ServiceError> {
    authorize(claims.role.can_edit_ledger_setup())?;

    let entry = dispatch(&state.channel, SERVICE, |response| CatalogRequest::Create {
        name: input.name,
        response,
    })
    .await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

async fn update_entry(
    State(state): State<CatalogState>,
    Extension(claims): Extension<Claims>,
    PathParam(id): PathParam<i64>,
    JsonBody(input): JsonBody<CatalogEntryInput>,
) -> Result<Json<CatalogEntry>, ServiceError> {
    authorize(claims.role.can_edit_ledger_setup())?;

    let entry = dispatch(&state.channel, SERVICE, |response| CatalogRequest::Update {
        id,
        name: input.name,
        response,
    })
    .await?;

    Ok(Json(entry))
}

async fn delete_entry(
    State(state): State<CatalogState>,
    Extension(claims): Extension<Claims>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<Value>, ServiceError> {
    authorize(claims.role.can_edit_ledger_setup())?;

    dispatch(&state.channel, SERVICE, |response| CatalogRequest::Delete {
        id,
        response,
    })
    .await?;

    Ok(message(&format!(
        "{} deleted successfully",
        state.catalog.title()
    )))
}
