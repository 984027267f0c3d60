use axum::{extract::State, http::StatusCode, Extension, Json};

use super::{caller, dispatch, AppState, JsonBody};
use crate::{
    auth::Claims,
    models::transactions::{NewTransaction, TransactionDetails},
    services::{transactions::TransactionServiceRequest, ServiceError},
};

const SERVICE: &str = "TransactionService";

pub(super) async fn list_transactions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<TransactionDetails>>, ServiceError> {
    let transactions = dispatch(&state.channels.transactions, SERVICE, |response| {
        TransactionServiceRequest::ListTransactions {
            caller: caller(&claims),
            response,
        }
    })
    .await?;

    Ok(Json(transactions))
}

pub(super) async fn new_transaction(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(transaction): JsonBody<NewTransaction>,
) -> Result<(StatusCode, Json<TransactionDetails>), ServiceError> {
    let created = dispatch(&state.channels.transactions, SERVICE, |response| {
        TransactionServiceRequest::NewTransaction {
            caller: caller(&claims),
            transaction,
            response,
        }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    use crate::models::transactions::{Transaction, TransactionType};
    use crate::models::users::{Caller, Role};
    use crate::services::http::testing;

    fn details(id: i64, created_by: i64) -> TransactionDetails {
        TransactionDetails {
            transaction: Transaction {
                id,
                transaction_type: TransactionType::Payment,
                amount: BigDecimal::from_str("1500.00").unwrap(),
                institution_id: 4,
                type_id: 4,
                date: NaiveDate::from_ymd_opt(2023, 2, 15).unwrap(),
                receipt_number: Some("PAY002".into()),
                description: Some("Office supplies".into()),
                created_by,
            },
            institution_name: "Local Council".into(),
            type_name: "Business Permit".into(),
            created_by_name: "Manager User".into(),
        }
    }

    #[tokio::test]
    async fn listing_forwards_the_callers_identity() {
        let (channels, mut receivers) = testing::channels();
        let state = AppState {
            channels,
            keys: testing::keys(),
        };

        let (seen_tx, seen_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            if let Some(TransactionServiceRequest::ListTransactions { caller, response }) =
                receivers.transactions.recv().await
            {
                let _ = seen_tx.send(caller);
                let _ = response.send(Ok(vec![details(5, caller.id)]));
            }
        });

        let Json(rows) = list_transactions(
            State(state),
            Extension(testing::claims(3, Role::DataEntry)),
        )
        .await
        .unwrap();

        assert_eq!(
            seen_rx.await.unwrap(),
            Caller {
                id: 3,
                role: Role::DataEntry
            }
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].transaction.created_by, 3);
    }

    #[tokio::test]
    async fn created_transaction_is_returned_with_names() {
        let (channels, mut receivers) = testing::channels();
        let state = AppState {
            channels,
            keys: testing::keys(),
        };

        tokio::spawn(async move {
            if let Some(TransactionServiceRequest::NewTransaction {
                caller, response, ..
            }) = receivers.transactions.recv().await
            {
                let _ = response.send(Ok(details(6, caller.id)));
            }
        });

        let body: NewTransaction = serde_json::from_value(serde_json::json!({
            "transactionType": "payment",
            "amount": 1500,
            "institutionId": 4,
            "typeId": 4,
            "date": "2023-02-15"
        }))
        .unwrap();

        let (status, Json(created)) = new_transaction(
            State(state),
            Extension(testing::claims(2, Role::Manager)),
            JsonBody(body),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        let value = serde_json::to_value(&created).unwrap();
        assert_eq!(value["institutionName"], "Local Council");
        assert_eq!(value["createdBy"], 2);
        assert_eq!(value["transactionType"], "payment");
    }
}
