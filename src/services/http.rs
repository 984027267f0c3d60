use anyhow::Context;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts,
    },
    http::{HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use super::{
    backup::BackupRequest, catalog::CatalogRequest, reports::ReportRequest,
    transactions::TransactionServiceRequest, users::UserRequest, ServiceError,
};
use crate::{
    auth::{Claims, TokenKeys},
    models::{catalog::Catalog, users::Caller},
    settings::Http,
};

mod auth;
mod backup;
mod catalog;
mod reports;
mod transactions;
mod users;

/// Senders of every running service.
#[derive(Clone)]
pub struct Channels {
    pub users: mpsc::Sender<UserRequest>,
    pub institutions: mpsc::Sender<CatalogRequest>,
    pub receipt_types: mpsc::Sender<CatalogRequest>,
    pub transactions: mpsc::Sender<TransactionServiceRequest>,
    pub reports: mpsc::Sender<ReportRequest>,
    pub backup: mpsc::Sender<BackupRequest>,
}

#[derive(Clone)]
struct AppState {
    channels: Channels,
    keys: TokenKeys,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ServiceError::Validation(message) | ServiceError::Conflict(message) => {
                (StatusCode::BAD_REQUEST, message)
            }
            ServiceError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            ServiceError::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            ServiceError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ServiceError::Database { context, detail } => {
                log::error!("{context}: {detail}");
                (StatusCode::INTERNAL_SERVER_ERROR, context)
            }
            ServiceError::Internal { context, detail } => {
                log::error!("{context}: {detail}");
                (StatusCode::INTERNAL_SERVER_ERROR, context)
            }
            ServiceError::Communication(service, detail) => {
                log::error!("Communication error with {service}: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ServiceError {
    fn from(rejection: PathRejection) -> Self {
        ServiceError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ServiceError {
    fn from(rejection: QueryRejection) -> Self {
        ServiceError::Validation(rejection.body_text())
    }
}

/// Request body extractor; a body that does not decode is a 400 with the
/// usual `{"message"}` shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ServiceError))]
struct JsonBody<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ServiceError))]
struct PathParam<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ServiceError))]
struct QueryParams<T>(T);

/// Sends the request built by `request` to a service and waits for its reply.
async fn dispatch<R, T>(
    channel: &mpsc::Sender<R>,
    service: &str,
    request: impl FnOnce(oneshot::Sender<Result<T, ServiceError>>) -> R,
) -> Result<T, ServiceError> {
    let (response_tx, response_rx) = oneshot::channel();

    channel
        .send(request(response_tx))
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?;

    response_rx
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?
}

fn authorize(allowed: bool) -> Result<(), ServiceError> {
    if allowed {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "Access denied: insufficient permissions".into(),
        ))
    }
}

fn caller(claims: &Claims) -> Caller {
    Caller {
        id: claims.id,
        role: claims.role,
    }
}

fn message(text: &str) -> Json<serde_json::Value> {
    Json(json!({ "message": text }))
}

/// Any origin when `origins` is empty, otherwise only the listed ones.
fn cors_layer(origins: &[String]) -> Result<CorsLayer, anyhow::Error> {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        let origins = origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin).with_context(|| format!("Invalid CORS origin {origin}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

fn router(channels: Channels, keys: TokenKeys, cors: CorsLayer) -> Router {
    let state = AppState { channels, keys };

    let protected = Router::new()
        .route("/api/auth/me", get(auth::me))
        .nest(
            "/api/institutions",
            catalog::router(state.channels.institutions.clone(), Catalog::Institutions),
        )
        .nest(
            "/api/receipt-types",
            catalog::router(state.channels.receipt_types.clone(), Catalog::ReceiptTypes),
        )
        .route(
            "/api/transactions",
            get(transactions::list_transactions).post(transactions::new_transaction),
        )
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/users/{id}",
            put(users::update_user).delete(users::delete_user),
        )
        .route("/api/reports", get(reports::generate_report))
        .route(
            "/api/reports/opening-balance",
            put(reports::set_opening_balance),
        )
        .route("/api/backup/export", get(backup::export_backup))
        .route("/api/backup/import", post(backup::import_backup))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ));

    Router::new()
        .route(
            "/",
            get(|| async { message("Revenue Management System API") }),
        )
        .route("/health", get(|| async { "OK" }))
        .route("/api/auth/login", post(auth::login))
        .merge(protected)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(
    http: &Http,
    channels: Channels,
    keys: TokenKeys,
) -> Result<(), anyhow::Error> {
    let app = router(channels, keys, cors_layer(&http.cors_origins)?);

    let listener = tokio::net::TcpListener::bind(&http.listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
pub(super) mod testing {
    use super::*;
    use axum::body::to_bytes;

    use crate::models::users::{Role, User};

    pub struct Receivers {
        pub users: mpsc::Receiver<UserRequest>,
        pub institutions: mpsc::Receiver<CatalogRequest>,
        pub receipt_types: mpsc::Receiver<CatalogRequest>,
        pub transactions: mpsc::Receiver<TransactionServiceRequest>,
        pub reports: mpsc::Receiver<ReportRequest>,
        pub backup: mpsc::Receiver<BackupRequest>,
    }

    pub fn channels() -> (Channels, Receivers) {
        let (users, users_rx) = mpsc::channel(8);
        let (institutions, institutions_rx) = mpsc::channel(8);
        let (receipt_types, receipt_types_rx) = mpsc::channel(8);
        let (transactions, transactions_rx) = mpsc::channel(8);
        let (reports, reports_rx) = mpsc::channel(8);
        let (backup, backup_rx) = mpsc::channel(8);

        (
            Channels {
                users,
                institutions,
                receipt_types,
                transactions,
                reports,
                backup,
            },
            Receivers {
                users: users_rx,
                institutions: institutions_rx,
                receipt_types: receipt_types_rx,
                transactions: transactions_rx,
                reports: reports_rx,
                backup: backup_rx,
            },
        )
    }

    pub fn keys() -> TokenKeys {
        TokenKeys::new("test-secret", 1)
    }

    pub fn user(id: i64, role: Role) -> User {
        User {
            id,
            name: format!("User {id}"),
            email: format!("user{id}@example.com"),
            username: format!("user{id}"),
            role,
        }
    }

    pub fn claims(id: i64, role: Role) -> Claims {
        let token = keys().issue(&user(id, role)).unwrap();
        keys().verify(&token).unwrap()
    }

    pub async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
