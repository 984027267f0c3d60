use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::transactions::{TransactionDetails, TransactionType};

pub const OPENING_BALANCE_KEY: &str = "opening_balance";

/// Raw query string of `GET /api/reports`. Everything is optional here so the
/// service can answer with a validation message rather than a rejection.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub institution_id: Option<String>,
    pub type_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportCriteria {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub institution_id: Option<i64>,
    pub type_id: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub opening_balance: BigDecimal,
    pub total_receipts: BigDecimal,
    pub total_payments: BigDecimal,
    pub closing_balance: BigDecimal,
}

impl Totals {
    /// Folds `rows` onto `opening_balance`. Order of the rows is irrelevant.
    pub fn reconcile<'a, I>(opening_balance: BigDecimal, rows: I) -> Self
    where
        I: IntoIterator<Item = (TransactionType, &'a BigDecimal)>,
    {
        let mut total_receipts = BigDecimal::from(0);
        let mut total_payments = BigDecimal::from(0);

        for (transaction_type, amount) in rows {
            match transaction_type {
                TransactionType::Receipt => total_receipts += amount,
                TransactionType::Payment => total_payments += amount,
            }
        }

        let closing_balance = &opening_balance + &total_receipts - &total_payments;

        Totals {
            opening_balance,
            total_receipts,
            total_payments,
            closing_balance,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub transactions: Vec<TransactionDetails>,
    #[serde(flatten)]
    pub totals: Totals,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub institution_name: String,
    pub type_name: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpeningBalanceUpdate {
    pub opening_balance: Option<serde_json::Value>,
}
