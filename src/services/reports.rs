use std::str::FromStr;

use async_trait::async_trait;
use bigdecimal::{BigDecimal, RoundingMode};
use chrono::NaiveDate;
use serde_json::Value;
use sqlx::MySqlPool;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::catalog::Catalog;
use crate::models::reports::{Report, ReportCriteria, ReportQuery, Totals, OPENING_BALANCE_KEY};
use crate::models::transactions::{DateOrder, TransactionFilter, Visibility};
use crate::models::users::Caller;
use crate::repositories::{
    catalog::CatalogRepository, settings::SettingsRepository,
    transactions::TransactionRepository,
};

pub enum ReportRequest {
    GenerateReport {
        caller: Caller,
        query: ReportQuery,
        response: oneshot::Sender<Result<Report, ServiceError>>,
    },
    SetOpeningBalance {
        opening_balance: Option<Value>,
        response: oneshot::Sender<Result<BigDecimal, ServiceError>>,
    },
}

fn parse_date(value: Option<String>, field: &str) -> Result<NaiveDate, ServiceError> {
    let value = value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ServiceError::Validation("Start date and end date are required".into()))?;

    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ServiceError::Validation(format!("Invalid {field}: {value}")))
}

/// `None`, empty and `all` mean unfiltered.
fn parse_catalog_filter(value: Option<String>, catalog: Catalog) -> Result<Option<i64>, ServiceError> {
    match value.as_deref().map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(id) => id
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ServiceError::Validation(format!("Invalid {} filter: {id}", catalog.noun()))),
    }
}

pub fn report_criteria(query: ReportQuery) -> Result<ReportCriteria, ServiceError> {
    let start_date = parse_date(query.start_date, "start date")?;
    let end_date = parse_date(query.end_date, "end date")?;

    if start_date > end_date {
        return Err(ServiceError::Validation(
            "Start date must not be after end date".into(),
        ));
    }

    Ok(ReportCriteria {
        start_date,
        end_date,
        institution_id: parse_catalog_filter(query.institution_id, Catalog::Institutions)?,
        type_id: parse_catalog_filter(query.type_id, Catalog::ReceiptTypes)?,
    })
}

/// Accepts a JSON number or a numeric string.
pub fn parse_opening_balance(value: Option<Value>) -> Result<BigDecimal, ServiceError> {
    let invalid = || ServiceError::Validation("Valid opening balance is required".into());

    let text = match value {
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::String(text)) => text.trim().to_string(),
        _ => return Err(invalid()),
    };

    BigDecimal::from_str(&text)
        .map(|balance| balance.with_scale_round(2, RoundingMode::HalfEven))
        .map_err(|_| invalid())
}

/// Rows of the report period that `caller` may see, oldest first.
fn report_filter(criteria: &ReportCriteria, caller: Caller) -> TransactionFilter {
    TransactionFilter {
        visibility: Visibility::for_caller(caller.id, caller.role),
        date_from: Some(criteria.start_date),
        date_to: Some(criteria.end_date),
        institution_id: criteria.institution_id,
        type_id: criteria.type_id,
        order: DateOrder::Ascending,
    }
}

#[derive(Clone)]
pub struct ReportRequestHandler {
    transactions: TransactionRepository,
    settings: SettingsRepository,
    institutions: CatalogRepository,
    receipt_types: CatalogRepository,
}

impl ReportRequestHandler {
    pub fn new(sql_conn: MySqlPool) -> Self {
        ReportRequestHandler {
            transactions: TransactionRepository::new(sql_conn.clone()),
            settings: SettingsRepository::new(sql_conn.clone()),
            institutions: CatalogRepository::new(sql_conn.clone(), Catalog::Institutions),
            receipt_types: CatalogRepository::new(sql_conn, Catalog::ReceiptTypes),
        }
    }

    async fn opening_balance(&self) -> Result<BigDecimal, ServiceError> {
        let stored = self
            .settings
            .get(OPENING_BALANCE_KEY)
            .await
            .map_err(ServiceError::database("Failed to generate report"))?;

        let balance = match stored {
            None => BigDecimal::from(0),
            Some(text) => BigDecimal::from_str(text.trim()).unwrap_or_else(|_| {
                log::warn!("Stored opening balance {text:?} is not a number, using 0.");
                BigDecimal::from(0)
            }),
        };
        Ok(balance)
    }

    async fn catalog_label(
        &self,
        repository: &CatalogRepository,
        catalog: Catalog,
        id: Option<i64>,
    ) -> Result<String, ServiceError> {
        let Some(id) = id else {
            return Ok(catalog.unfiltered_label().to_string());
        };

        let entry = repository
            .get(id)
            .await
            .map_err(ServiceError::database("Failed to generate report"))?;

        Ok(entry
            .map(|e| e.name)
            .unwrap_or_else(|| catalog.unfiltered_label().to_string()))
    }

    async fn generate_report(
        &self,
        caller: Caller,
        query: ReportQuery,
    ) -> Result<Report, ServiceError> {
        let criteria = report_criteria(query)?;
        let opening_balance = self.opening_balance().await?;

        let transactions = self
            .transactions
            .query(&report_filter(&criteria, caller))
            .await
            .map_err(ServiceError::database("Failed to generate report"))?;

        let totals = Totals::reconcile(
            opening_balance,
            transactions
                .iter()
                .map(|row| (row.transaction.transaction_type, &row.transaction.amount)),
        );

        let institution_name = self
            .catalog_label(&self.institutions, Catalog::Institutions, criteria.institution_id)
            .await?;
        let type_name = self
            .catalog_label(&self.receipt_types, Catalog::ReceiptTypes, criteria.type_id)
            .await?;

        log::debug!(
            "Report {}..{} for user {}: {} rows, closing balance {}.",
            criteria.start_date,
            criteria.end_date,
            caller.id,
            transactions.len(),
            totals.closing_balance
        );

        Ok(Report {
            transactions,
            totals,
            start_date: criteria.start_date,
            end_date: criteria.end_date,
            institution_name,
            type_name,
        })
    }

    async fn set_opening_balance(&self, value: Option<Value>) -> Result<BigDecimal, ServiceError> {
        let balance = parse_opening_balance(value)?;

        self.settings
            .put(OPENING_BALANCE_KEY, &balance.to_string())
            .await
            .map_err(ServiceError::database("Failed to update opening balance"))?;

        log::info!("Opening balance set to {balance}.");
        Ok(balance)
    }
}

#[async_trait]
impl RequestHandler<ReportRequest> for ReportRequestHandler {
    async fn handle_request(&self, request: ReportRequest) {
        match request {
            ReportRequest::GenerateReport {
                caller,
                query,
                response,
            } => {
                let report = self.generate_report(caller, query).await;
                let _ = response.send(report);
            }
            ReportRequest::SetOpeningBalance {
                opening_balance,
                response,
            } => {
                let result = self.set_opening_balance(opening_balance).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct ReportService;

impl ReportService {
    pub fn new() -> Self {
        ReportService {}
    }
}

#[async_trait]
impl Service<ReportRequest, ReportRequestHandler> for ReportService {}
