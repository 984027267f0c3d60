use axum::{extract::State, Extension, Json};
use serde_json::{json, Value};

use super::{authorize, caller, dispatch, AppState, JsonBody, QueryParams};
use crate::{
    auth::Claims,
    models::reports::{OpeningBalanceUpdate, Report, ReportQuery},
    services::{reports::ReportRequest, ServiceError},
};

const SERVICE: &str = "ReportService";

pub(super) async fn generate_report(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    QueryParams(query): QueryParams<ReportQuery>,
) -> Result<Json<Report>, ServiceError> {
    let report = dispatch(&state.channels.reports, SERVICE, |response| {
        ReportRequest::GenerateReport {
            caller: caller(&claims),
            query,
            response,
        }
    })
    .await?;

    Ok(Json(report))
}

pub(super) async fn set_opening_balance(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(update): JsonBody<OpeningBalanceUpdate>,
) -> Result<Json<Value>, ServiceError> {
    authorize(claims.role.can_edit_ledger_setup())?;

    let balance = dispatch(&state.channels.reports, SERVICE, |response| {
        ReportRequest::SetOpeningBalance {
            opening_balance: update.opening_balance,
            response,
        }
    })
    .await?;

    Ok(Json(json!({
        "message": "Opening balance updated successfully",
        "openingBalance": balance,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    use axum::{http::StatusCode, response::IntoResponse};
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    use crate::models::reports::Totals;
    use crate::models::transactions::TransactionType;
    use crate::models::users::Role;
    use crate::services::http::testing;

    fn state() -> (AppState, testing::Receivers) {
        let (channels, receivers) = testing::channels();
        (
            AppState {
                channels,
                keys: testing::keys(),
            },
            receivers,
        )
    }

    #[tokio::test]
    async fn missing_dates_are_a_bad_request() {
        let (state, mut receivers) = state();

        tokio::spawn(async move {
            if let Some(ReportRequest::GenerateReport { response, .. }) =
                receivers.reports.recv().await
            {
                let _ = response.send(Err(ServiceError::Validation(
                    "Start date and end date are required".into(),
                )));
            }
        });

        let response = generate_report(
            State(state),
            Extension(testing::claims(2, Role::Manager)),
            QueryParams(ReportQuery::default()),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = testing::body_json(response).await;
        assert_eq!(body["message"], "Start date and end date are required");
    }

    #[tokio::test]
    async fn report_body_carries_flattened_totals() {
        let (state, mut receivers) = state();

        tokio::spawn(async move {
            if let Some(ReportRequest::GenerateReport { query, response, .. }) =
                receivers.reports.recv().await
            {
                let opening = BigDecimal::from_str("10000").unwrap();
                let report = Report {
                    transactions: Vec::new(),
                    totals: Totals::reconcile(
                        opening,
                        Vec::<(TransactionType, &BigDecimal)>::new(),
                    ),
                    start_date: NaiveDate::from_str(&query.start_date.unwrap()).unwrap(),
                    end_date: NaiveDate::from_str(&query.end_date.unwrap()).unwrap(),
                    institution_name: "All Institutions".into(),
                    type_name: "All Types".into(),
                };
                let _ = response.send(Ok(report));
            }
        });

        let query = ReportQuery {
            start_date: Some("2023-03-01".into()),
            end_date: Some("2023-03-31".into()),
            ..ReportQuery::default()
        };

        let response = generate_report(
            State(state),
            Extension(testing::claims(3, Role::DataEntry)),
            QueryParams(query),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let body = testing::body_json(response).await;
        assert_eq!(body["startDate"], "2023-03-01");
        assert_eq!(body["institutionName"], "All Institutions");
        assert!(body["transactions"].as_array().unwrap().is_empty());
        assert!(body.get("closingBalance").is_some());
    }

    #[tokio::test]
    async fn data_entry_cannot_set_the_opening_balance() {
        let (state, mut receivers) = state();

        let response = set_opening_balance(
            State(state),
            Extension(testing::claims(3, Role::DataEntry)),
            JsonBody(OpeningBalanceUpdate {
                opening_balance: Some(json!(500)),
            }),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(receivers.reports.try_recv().is_err());
    }

    #[tokio::test]
    async fn opening_balance_update_echoes_the_stored_value() {
        let (state, mut receivers) = state();

        tokio::spawn(async move {
            if let Some(ReportRequest::SetOpeningBalance { response, .. }) =
                receivers.reports.recv().await
            {
                let _ = response.send(Ok(BigDecimal::from_str("2500.50").unwrap()));
            }
        });

        let Json(body) = set_opening_balance(
            State(state),
            Extension(testing::claims(1, Role::SuperAdmin)),
            JsonBody(OpeningBalanceUpdate {
                opening_balance: Some(json!("2500.50")),
            }),
        )
        .await
        .unwrap();

        assert_eq!(body["message"], "Opening balance updated successfully");
        assert_eq!(body["openingBalance"], "2500.50");
    }
}
