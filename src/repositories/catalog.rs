use crate::models::catalog::{Catalog, CatalogEntry};

use sqlx::MySqlPool;

/// Institutions and receipt types. Table and column names come from
/// [`Catalog`], never from user input.
#[derive(Clone)]
pub struct CatalogRepository {
    conn: MySqlPool,
    catalog: Catalog,
}

impl CatalogRepository {
    pub fn new(conn: MySqlPool, catalog: Catalog) -> Self {
        CatalogRepository { conn, catalog }
    }

    pub async fn list(&self) -> Result<Vec<CatalogEntry>, anyhow::Error> {
        let entries = sqlx::query_as::<_, CatalogEntry>(&format!(
            "SELECT id, name FROM {} ORDER BY name",
            self.catalog.table()
        ))
        .fetch_all(&self.conn)
        .await?;

        Ok(entries)
    }

    pub async fn get(&self, id: i64) -> Result<Option<CatalogEntry>, anyhow::Error> {
        let entry = sqlx::query_as::<_, CatalogEntry>(&format!(
            "SELECT id, name FROM {} WHERE id = ?",
            self.catalog.table()
        ))
        .bind(id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(entry)
    }

    pub async fn insert(&self, name: &str) -> Result<CatalogEntry, anyhow::Error> {
        let result = sqlx::query(&format!(
            "INSERT INTO {} (name) VALUES (?)",
            self.catalog.table()
        ))
        .bind(name)
        .execute(&self.conn)
        .await?;

        Ok(CatalogEntry {
            id: result.last_insert_id() as i64,
            name: name.to_string(),
        })
    }

    /// Returns `None` when `id` does not exist.
    pub async fn update(&self, id: i64, name: &str) -> Result<Option<CatalogEntry>, anyhow::Error> {
        sqlx::query(&format!(
            "UPDATE {} SET name = ? WHERE id = ?",
            self.catalog.table()
        ))
        .bind(name)
        .bind(id)
        .execute(&self.conn)
        .await?;

        self.get(id).await
    }

    /// Number of transactions pointing at `id`.
    pub async fn count_references(&self, id: i64) -> Result<i64, anyhow::Error> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM transactions WHERE {} = ?",
            self.catalog.reference_column()
        ))
        .bind(id)
        .fetch_one(&self.conn)
        .await?;

        Ok(count)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, anyhow::Error> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", self.catalog.table()))
            .bind(id)
            .execute(&self.conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
