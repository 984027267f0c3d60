use async_trait::async_trait;
use sqlx::MySqlPool;
use tokio::sync::mpsc;

use crate::{auth::TokenKeys, models::catalog::Catalog, settings::Settings};

mod backup;
mod catalog;
mod http;
mod reports;
mod transactions;
mod users;

const CHANNEL_CAPACITY: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{context}: {detail}")]
    Database { context: String, detail: String },
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
    #[error("{context}: {detail}")]
    Internal { context: String, detail: String },
}

impl ServiceError {
    /// Adapter for `map_err` on repository results; `context` is what the
    /// caller gets to see.
    pub fn database(context: &str) -> impl FnOnce(anyhow::Error) -> ServiceError + '_ {
        move |e| ServiceError::Database {
            context: context.to_string(),
            detail: e.to_string(),
        }
    }

    pub fn internal(context: &str, detail: impl ToString) -> ServiceError {
        ServiceError::Internal {
            context: context.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// True when a repository call failed on a foreign key, i.e. the row gained a
/// reference after it was counted.
fn is_still_referenced(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|e| e.is_foreign_key_violation())
}

/// Trims `value` and fails with `message` when it is absent or blank.
fn required(value: Option<String>, message: &str) -> Result<String, ServiceError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ServiceError::Validation(message.to_string()))
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

pub async fn start_services(pool: MySqlPool, settings: Settings) -> Result<(), anyhow::Error> {
    let (user_tx, mut user_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (institution_tx, mut institution_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (receipt_type_tx, mut receipt_type_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (transaction_tx, mut transaction_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (report_tx, mut report_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (backup_tx, mut backup_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let keys = TokenKeys::new(&settings.auth.jwt_secret, settings.auth.token_ttl_hours);

    log::info!("Starting user service.");
    let mut user_service = users::UserService::new();
    let user_handler = users::UserRequestHandler::new(pool.clone(), keys.clone());
    tokio::spawn(async move {
        user_service.run(user_handler, &mut user_rx).await;
    });

    log::info!("Starting institution service.");
    let mut institution_service = catalog::CatalogService::new();
    let institution_handler = catalog::CatalogRequestHandler::new(pool.clone(), Catalog::Institutions);
    tokio::spawn(async move {
        institution_service
            .run(institution_handler, &mut institution_rx)
            .await;
    });

    log::info!("Starting receipt type service.");
    let mut receipt_type_service = catalog::CatalogService::new();
    let receipt_type_handler =
        catalog::CatalogRequestHandler::new(pool.clone(), Catalog::ReceiptTypes);
    tokio::spawn(async move {
        receipt_type_service
            .run(receipt_type_handler, &mut receipt_type_rx)
            .await;
    });

    log::info!("Starting transaction service.");
    let mut transaction_service = transactions::TransactionService::new();
    let transaction_handler = transactions::TransactionRequestHandler::new(pool.clone());
    tokio::spawn(async move {
        transaction_service
            .run(transaction_handler, &mut transaction_rx)
            .await;
    });

    log::info!("Starting report service.");
    let mut report_service = reports::ReportService::new();
    let report_handler = reports::ReportRequestHandler::new(pool.clone());
    tokio::spawn(async move {
        report_service.run(report_handler, &mut report_rx).await;
    });

    log::info!("Starting backup service.");
    let mut backup_service = backup::BackupService::new();
    let backup_handler = backup::BackupRequestHandler::new(pool.clone());
    tokio::spawn(async move {
        backup_service.run(backup_handler, &mut backup_rx).await;
    });

    log::info!("Starting HTTP server.");
    let channels = http::Channels {
        users: user_tx,
        institutions: institution_tx,
        receipt_types: receipt_type_tx,
        transactions: transaction_tx,
        reports: report_tx,
        backup: backup_tx,
    };
    http::start_http_server(&settings.http, channels, keys).await
}
