use async_trait::async_trait;
use bigdecimal::{BigDecimal, RoundingMode};
use sqlx::MySqlPool;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::catalog::Catalog;
use crate::models::transactions::{
    NewTransaction, TransactionDetails, TransactionDraft, TransactionFilter, TransactionType,
    Visibility,
};
use crate::models::users::Caller;
use crate::repositories::{catalog::CatalogRepository, transactions::TransactionRepository};

pub enum TransactionServiceRequest {
    ListTransactions {
        caller: Caller,
        response: oneshot::Sender<Result<Vec<TransactionDetails>, ServiceError>>,
    },
    NewTransaction {
        caller: Caller,
        transaction: NewTransaction,
        response: oneshot::Sender<Result<TransactionDetails, ServiceError>>,
    },
}

/// Validates a request body and attributes it to `caller`. Amounts are
/// rounded to cents, the precision of the `amount` column.
pub fn draft_transaction(
    transaction: NewTransaction,
    caller: Caller,
) -> Result<TransactionDraft, ServiceError> {
    let NewTransaction {
        transaction_type,
        amount,
        institution_id,
        type_id,
        date,
        receipt_number,
        description,
    } = transaction;

    let (Some(transaction_type), Some(amount), Some(institution_id), Some(type_id), Some(date)) =
        (transaction_type, amount, institution_id, type_id, date)
    else {
        return Err(ServiceError::Validation(
            "Transaction type, amount, institution, type, and date are required".into(),
        ));
    };

    let transaction_type = TransactionType::try_from(transaction_type).map_err(|_| {
        ServiceError::Validation("Transaction type must be receipt or payment".into())
    })?;

    let amount = amount.with_scale_round(2, RoundingMode::HalfEven);
    if amount <= BigDecimal::from(0) {
        return Err(ServiceError::Validation(
            "Amount must be greater than zero".into(),
        ));
    }

    let optional = |value: Option<String>| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    Ok(TransactionDraft {
        transaction_type,
        amount,
        institution_id,
        type_id,
        date,
        receipt_number: optional(receipt_number),
        description: optional(description),
        created_by: caller.id,
    })
}

/// Everything `caller` may see, newest first.
fn listing_filter(caller: Caller) -> TransactionFilter {
    TransactionFilter::new(Visibility::for_caller(caller.id, caller.role))
}

#[derive(Clone)]
pub struct TransactionRequestHandler {
    repository: TransactionRepository,
    institutions: CatalogRepository,
    receipt_types: CatalogRepository,
}

impl TransactionRequestHandler {
    pub fn new(sql_conn: MySqlPool) -> Self {
        TransactionRequestHandler {
            repository: TransactionRepository::new(sql_conn.clone()),
            institutions: CatalogRepository::new(sql_conn.clone(), Catalog::Institutions),
            receipt_types: CatalogRepository::new(sql_conn, Catalog::ReceiptTypes),
        }
    }

    async fn list_transactions(
        &self,
        caller: Caller,
    ) -> Result<Vec<TransactionDetails>, ServiceError> {
        self.repository
            .query(&listing_filter(caller))
            .await
            .map_err(ServiceError::database("Failed to fetch transactions"))
    }

    async fn new_transaction(
        &self,
        caller: Caller,
        transaction: NewTransaction,
    ) -> Result<TransactionDetails, ServiceError> {
        let draft = draft_transaction(transaction, caller)?;
        let context = "Failed to add transaction";

        if self
            .institutions
            .get(draft.institution_id)
            .await
            .map_err(ServiceError::database(context))?
            .is_none()
        {
            return Err(ServiceError::Validation("Institution not found".into()));
        }
        if self
            .receipt_types
            .get(draft.type_id)
            .await
            .map_err(ServiceError::database(context))?
            .is_none()
        {
            return Err(ServiceError::Validation("Receipt type not found".into()));
        }

        let id = self
            .repository
            .new_transaction(&draft)
            .await
            .map_err(ServiceError::database(context))?;

        log::info!(
            "Recorded {} {id} of {} by user {}.",
            draft.transaction_type,
            draft.amount,
            caller.id
        );

        self.repository
            .get_transaction(id)
            .await
            .map_err(ServiceError::database(context))?
            .ok_or_else(|| ServiceError::internal(context, format!("transaction {id} not readable")))
    }
}

#[async_trait]
impl RequestHandler<TransactionServiceRequest> for TransactionRequestHandler {
    async fn handle_request(&self, request: TransactionServiceRequest) {
        match request {
            TransactionServiceRequest::ListTransactions { caller, response } => {
                let result = self.list_transactions(caller).await;
                let _ = response.send(result);
            }
            TransactionServiceRequest::NewTransaction {
                caller,
                transaction,
                response,
            } => {
                let result = self.new_transaction(caller, transaction).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct TransactionService;

impl TransactionService {
    pub fn new() -> Self {
        TransactionService {}
    }
}

#[async_trait]
impl Service<TransactionServiceRequest, TransactionRequestHandler> for TransactionService {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    use chrono::NaiveDate;

    use crate::models::users::Role;
    use crate::repositories::transactions::select_transactions;

    const CLERK: Caller = Caller {
        id: 3,
        role: Role::DataEntry,
    };

    fn body() -> NewTransaction {
        NewTransaction {
            transaction_type: Some("receipt".into()),
            amount: Some(BigDecimal::from_str("4000").unwrap()),
            institution_id: Some(3),
            type_id: Some(3),
            date: NaiveDate::from_ymd_opt(2023, 2, 10),
            receipt_number: Some("REC003".into()),
            description: Some("  ".into()),
        }
    }

    #[test]
    fn drafts_are_attributed_to_the_caller() {
        let draft = draft_transaction(body(), CLERK).unwrap();

        assert_eq!(draft.created_by, 3);
        assert_eq!(draft.transaction_type, TransactionType::Receipt);
        assert_eq!(draft.receipt_number.as_deref(), Some("REC003"));
        assert_eq!(draft.description, None);
    }

    #[test]
    fn missing_fields_are_rejected() {
        let mut transaction = body();
        transaction.date = None;

        assert!(matches!(
            draft_transaction(transaction, CLERK),
            Err(ServiceError::Validation(msg)) if msg.starts_with("Transaction type, amount")
        ));
    }

    #[test]
    fn amount_must_be_positive() {
        for amount in ["0", "-15.00", "0.001"] {
            let mut transaction = body();
            transaction.amount = Some(BigDecimal::from_str(amount).unwrap());

            assert!(
                matches!(
                    draft_transaction(transaction, CLERK),
                    Err(ServiceError::Validation(msg)) if msg == "Amount must be greater than zero"
                ),
                "{amount} was accepted"
            );
        }
    }

    #[test]
    fn unknown_transaction_type_is_rejected() {
        let mut transaction = body();
        transaction.transaction_type = Some("refund".into());

        assert!(matches!(
            draft_transaction(transaction, CLERK),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn amounts_are_rounded_to_cents() {
        let mut transaction = body();
        transaction.amount = Some(BigDecimal::from_str("10.005").unwrap());

        let draft = draft_transaction(transaction, CLERK).unwrap();
        assert_eq!(draft.amount, BigDecimal::from_str("10.00").unwrap());
    }

    #[test]
    fn data_entry_listing_is_limited_to_own_rows() {
        let qry = select_transactions(&listing_filter(CLERK));

        assert!(qry.sql().contains(" AND t.created_by = ?"));
        assert!(qry.sql().contains("ORDER BY t.date DESC"));
    }

    #[test]
    fn privileged_listing_shows_every_author() {
        for role in [Role::Manager, Role::SuperAdmin] {
            let qry = select_transactions(&listing_filter(Caller { id: 2, role }));
            assert!(!qry.sql().contains("t.created_by ="), "{role} was restricted");
        }
    }
}
