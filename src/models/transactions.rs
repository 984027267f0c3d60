use std::fmt;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer, Serialize};

use super::users::Role;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Receipt,
    Payment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Receipt => "receipt",
            TransactionType::Payment => "payment",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for TransactionType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "receipt" => Ok(TransactionType::Receipt),
            "payment" => Ok(TransactionType::Payment),
            _ => Err(format!("Unknown transaction type: {value}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    #[sqlx(try_from = "String")]
    #[serde(alias = "transaction_type")]
    pub transaction_type: TransactionType,
    pub amount: BigDecimal,
    #[serde(alias = "institution_id")]
    pub institution_id: i64,
    #[serde(alias = "type_id")]
    pub type_id: i64,
    #[serde(deserialize_with = "ledger_date")]
    pub date: NaiveDate,
    #[serde(alias = "receipt_number")]
    pub receipt_number: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "created_by")]
    pub created_by: i64,
}

/// `YYYY-MM-DD`, or a timestamp whose date part is kept as written
/// (older backups stored `2023-01-15T00:00:00.000Z`).
fn ledger_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    let day = text.split_once('T').map_or(text.as_str(), |(day, _)| day);

    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(de::Error::custom)
}

/// A transaction joined with the names of the rows it references.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetails {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub transaction: Transaction,
    pub institution_name: String,
    pub type_name: String,
    pub created_by_name: String,
}

/// Body of `POST /api/transactions`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub transaction_type: Option<String>,
    pub amount: Option<BigDecimal>,
    pub institution_id: Option<i64>,
    pub type_id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub receipt_number: Option<String>,
    pub description: Option<String>,
}

/// A validated [`NewTransaction`] attributed to its author.
#[derive(Clone, Debug)]
pub struct TransactionDraft {
    pub transaction_type: TransactionType,
    pub amount: BigDecimal,
    pub institution_id: i64,
    pub type_id: i64,
    pub date: NaiveDate,
    pub receipt_number: Option<String>,
    pub description: Option<String>,
    pub created_by: i64,
}

/// Which transactions a caller may read. Listings and reports both derive it
/// from the caller through [`Visibility::for_caller`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    All,
    CreatedBy(i64),
}

impl Visibility {
    pub fn for_caller(user_id: i64, role: Role) -> Self {
        if role.sees_all_transactions() {
            Visibility::All
        } else {
            Visibility::CreatedBy(user_id)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateOrder {
    /// Oldest first, used by reports.
    Ascending,
    /// Newest first, used by the transaction listing.
    Descending,
}

#[derive(Clone, Debug)]
pub struct TransactionFilter {
    pub visibility: Visibility,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub institution_id: Option<i64>,
    pub type_id: Option<i64>,
    pub order: DateOrder,
}

impl TransactionFilter {
    pub fn new(visibility: Visibility) -> Self {
        TransactionFilter {
            visibility,
            date_from: None,
            date_to: None,
            institution_id: None,
            type_id: None,
            order: DateOrder::Descending,
        }
    }
}
