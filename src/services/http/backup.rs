use axum::{extract::State, Extension, Json};
use serde_json::Value;

use super::{authorize, dispatch, message, AppState, JsonBody};
use crate::{
    auth::Claims,
    models::backup::{BackupDocument, ImportRequest},
    services::{backup::BackupRequest, ServiceError},
};

const SERVICE: &str = "BackupService";

pub(super) async fn export_backup(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<BackupDocument>, ServiceError> {
    authorize(claims.role.can_export_backup())?;
    log::info!("Backup export requested by {}.", claims.username);

    let backup = dispatch(&state.channels.backup, SERVICE, |response| {
        BackupRequest::Export { response }
    })
    .await?;

    Ok(Json(backup))
}

pub(super) async fn import_backup(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(request): JsonBody<ImportRequest>,
) -> Result<Json<Value>, ServiceError> {
    authorize(claims.role.can_import_backup())?;
    log::info!("Backup import requested by {}.", claims.username);

    dispatch(&state.channels.backup, SERVICE, |response| {
        BackupRequest::Import {
            backup_data: request.backup_data,
            response,
        }
    })
    .await?;

    Ok(message("Backup restored successfully"))
}
