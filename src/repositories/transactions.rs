use crate::models::transactions::{
    DateOrder, TransactionDetails, TransactionDraft, TransactionFilter, Visibility,
};

use sqlx::{MySql, MySqlPool, QueryBuilder};

const DETAILS_QUERY: &str = r#"
    SELECT
        t.id,
        t.transaction_type,
        t.amount,
        t.institution_id,
        t.type_id,
        t.date,
        t.receipt_number,
        t.description,
        t.created_by,
        i.name AS institution_name,
        rt.name AS type_name,
        u.name AS created_by_name
    FROM transactions t
    JOIN institutions i ON t.institution_id = i.id
    JOIN receipt_types rt ON t.type_id = rt.id
    JOIN users u ON t.created_by = u.id
    WHERE 1 = 1
"#;

/// The enriched select for `filter`. Visibility is enforced here, in SQL,
/// for both the listing and reports.
pub fn select_transactions(filter: &TransactionFilter) -> QueryBuilder<'static, MySql> {
    let mut qry = QueryBuilder::<MySql>::new(DETAILS_QUERY);

    if let Some(date_from) = filter.date_from {
        qry.push(" AND t.date >= ").push_bind(date_from);
    }
    if let Some(date_to) = filter.date_to {
        qry.push(" AND t.date <= ").push_bind(date_to);
    }
    if let Some(institution_id) = filter.institution_id {
        qry.push(" AND t.institution_id = ").push_bind(institution_id);
    }
    if let Some(type_id) = filter.type_id {
        qry.push(" AND t.type_id = ").push_bind(type_id);
    }
    match filter.visibility {
        Visibility::All => {}
        Visibility::CreatedBy(user_id) => {
            qry.push(" AND t.created_by = ").push_bind(user_id);
        }
    }
    match filter.order {
        DateOrder::Ascending => qry.push(" ORDER BY t.date ASC, t.id ASC"),
        DateOrder::Descending => qry.push(" ORDER BY t.date DESC, t.id DESC"),
    };

    qry
}

#[derive(Clone)]
pub struct TransactionRepository {
    conn: MySqlPool,
}

impl TransactionRepository {
    pub fn new(conn: MySqlPool) -> Self {
        TransactionRepository { conn }
    }

    pub async fn query(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionDetails>, anyhow::Error> {
        let mut qry = select_transactions(filter);

        let transactions: Vec<TransactionDetails> =
            qry.build_query_as().fetch_all(&self.conn).await?;
        Ok(transactions)
    }

    pub async fn get_transaction(
        &self,
        id: i64,
    ) -> Result<Option<TransactionDetails>, anyhow::Error> {
        let mut qry = QueryBuilder::<MySql>::new(DETAILS_QUERY);
        qry.push(" AND t.id = ").push_bind(id);

        let transaction = qry.build_query_as().fetch_optional(&self.conn).await?;
        Ok(transaction)
    }

    /// Inserts `draft` and returns the new id.
    pub async fn new_transaction(&self, draft: &TransactionDraft) -> Result<i64, anyhow::Error> {
        let result = sqlx::query(
            r#"INSERT INTO transactions
            (transaction_type, amount, institution_id, type_id, date, receipt_number, description, created_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(draft.transaction_type.as_str())
        .bind(&draft.amount)
        .bind(draft.institution_id)
        .bind(draft.type_id)
        .bind(draft.date)
        .bind(&draft.receipt_number)
        .bind(&draft.description)
        .bind(draft.created_by)
        .execute(&self.conn)
        .await?;

        Ok(result.last_insert_id() as i64)
    }
}
