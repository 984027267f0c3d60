use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::MySqlPool;
use tokio::sync::{oneshot, Mutex};

use super::{RequestHandler, Service, ServiceError};
use crate::{models::backup::BackupDocument, repositories::backup::BackupRepository};

pub enum BackupRequest {
    Export {
        response: oneshot::Sender<Result<BackupDocument, ServiceError>>,
    },
    Import {
        backup_data: Option<Value>,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
}

pub fn validate_backup(backup_data: Option<Value>) -> Result<BackupDocument, ServiceError> {
    let value =
        backup_data.ok_or_else(|| ServiceError::Validation("Backup data is required".into()))?;

    BackupDocument::from_json(value).map_err(ServiceError::Validation)
}

#[derive(Clone)]
pub struct BackupRequestHandler {
    repository: BackupRepository,
    // Held for the whole restore so two imports never interleave.
    import_lock: Arc<Mutex<()>>,
}

impl BackupRequestHandler {
    pub fn new(sql_conn: MySqlPool) -> Self {
        BackupRequestHandler {
            repository: BackupRepository::new(sql_conn),
            import_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn export(&self) -> Result<BackupDocument, ServiceError> {
        let backup = self
            .repository
            .export()
            .await
            .map_err(ServiceError::database("Failed to export backup"))?;

        log::info!(
            "Exported backup: {} institutions, {} receipt types, {} transactions.",
            backup.institutions.len(),
            backup.receipt_types.len(),
            backup.transactions.len()
        );
        Ok(backup)
    }

    async fn import(&self, backup_data: Option<Value>) -> Result<(), ServiceError> {
        let backup = validate_backup(backup_data)?;

        let _guard = self.import_lock.lock().await;
        self.repository
            .restore(&backup)
            .await
            .map_err(ServiceError::database("Failed to import backup"))?;

        log::info!(
            "Restored backup: {} institutions, {} receipt types, {} transactions, {} settings.",
            backup.institutions.len(),
            backup.receipt_types.len(),
            backup.transactions.len(),
            backup.settings.len()
        );
        Ok(())
    }
}

#[async_trait]
impl RequestHandler<BackupRequest> for BackupRequestHandler {
    async fn handle_request(&self, request: BackupRequest) {
        match request {
            BackupRequest::Export { response } => {
                let backup = self.export().await;
                let _ = response.send(backup);
            }
            BackupRequest::Import {
                backup_data,
                response,
            } => {
                let result = self.import(backup_data).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct BackupService;

impl BackupService {
    pub fn new() -> Self {
        BackupService {}
    }
}

#[async_trait]
impl Service<BackupRequest, BackupRequestHandler> for BackupService {}
