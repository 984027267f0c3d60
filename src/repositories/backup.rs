use crate::models::{
    backup::{BackupDocument, Setting},
    catalog::CatalogEntry,
    transactions::Transaction,
    users::User,
};

use chrono::Utc;
use sqlx::{MySqlConnection, MySqlPool};

#[derive(Clone)]
pub struct BackupRepository {
    conn: MySqlPool,
}

impl BackupRepository {
    pub fn new(conn: MySqlPool) -> Self {
        BackupRepository { conn }
    }

    /// Snapshot of every mutable table. Password hashes are not selected.
    pub async fn export(&self) -> Result<BackupDocument, anyhow::Error> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, name, email, username, role FROM users ORDER BY id",
        )
        .fetch_all(&self.conn)
        .await?;

        let institutions =
            sqlx::query_as::<_, CatalogEntry>("SELECT id, name FROM institutions ORDER BY id")
                .fetch_all(&self.conn)
                .await?;

        let receipt_types =
            sqlx::query_as::<_, CatalogEntry>("SELECT id, name FROM receipt_types ORDER BY id")
                .fetch_all(&self.conn)
                .await?;

        let transactions = sqlx::query_as::<_, Transaction>(
            r#"SELECT id, transaction_type, amount, institution_id, type_id, date,
                receipt_number, description, created_by
            FROM transactions ORDER BY id"#,
        )
        .fetch_all(&self.conn)
        .await?;

        let settings = sqlx::query_as::<_, Setting>(
            "SELECT setting_key, setting_value FROM settings ORDER BY setting_key",
        )
        .fetch_all(&self.conn)
        .await?;

        Ok(BackupDocument {
            users,
            institutions,
            receipt_types,
            transactions,
            settings,
            timestamp: Some(Utc::now()),
        })
    }

    /// Replaces institutions, receipt types and transactions with the
    /// document's rows and upserts its settings, all in one transaction.
    /// Users are left untouched. On error nothing is applied.
    pub async fn restore(&self, backup: &BackupDocument) -> Result<(), anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        // Rolled back on drop if any step fails.
        clear_ledger(&mut tx).await?;
        insert_catalog(&mut tx, "institutions", &backup.institutions).await?;
        insert_catalog(&mut tx, "receipt_types", &backup.receipt_types).await?;
        insert_transactions(&mut tx, &backup.transactions).await?;
        upsert_settings(&mut tx, &backup.settings).await?;

        tx.commit().await?;
        Ok(())
    }
}

/// `DELETE` rather than `TRUNCATE`: the latter commits implicitly in MySQL.
async fn clear_ledger(conn: &mut MySqlConnection) -> Result<(), anyhow::Error> {
    for table in ["transactions", "receipt_types", "institutions"] {
        sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn insert_catalog(
    conn: &mut MySqlConnection,
    table: &str,
    entries: &[CatalogEntry],
) -> Result<(), anyhow::Error> {
    let sql = format!("INSERT INTO {table} (id, name) VALUES (?, ?)");
    for entry in entries {
        sqlx::query(&sql)
            .bind(entry.id)
            .bind(&entry.name)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn insert_transactions(
    conn: &mut MySqlConnection,
    transactions: &[Transaction],
) -> Result<(), anyhow::Error> {
    for transaction in transactions {
        sqlx::query(
            r#"INSERT INTO transactions
            (id, transaction_type, amount, institution_id, type_id, date, receipt_number, description, created_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(transaction.id)
        .bind(transaction.transaction_type.as_str())
        .bind(&transaction.amount)
        .bind(transaction.institution_id)
        .bind(transaction.type_id)
        .bind(transaction.date)
        .bind(&transaction.receipt_number)
        .bind(&transaction.description)
        .bind(transaction.created_by)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn upsert_settings(
    conn: &mut MySqlConnection,
    settings: &[Setting],
) -> Result<(), anyhow::Error> {
    for setting in settings {
        sqlx::query(
            r#"INSERT INTO settings (setting_key, setting_value) VALUES (?, ?)
            ON DUPLICATE KEY UPDATE setting_value = VALUES(setting_value)"#,
        )
        .bind(&setting.key)
        .bind(&setting.value)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
