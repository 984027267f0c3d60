use sqlx::MySqlPool;

#[derive(Clone)]
pub struct SettingsRepository {
    conn: MySqlPool,
}

impl SettingsRepository {
    pub fn new(conn: MySqlPool) -> Self {
        SettingsRepository { conn }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT setting_value FROM settings WHERE setting_key = ?")
                .bind(key)
                .fetch_optional(&self.conn)
                .await?;

        Ok(value)
    }

    pub async fn put(&self, key: &str, value: &str) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"INSERT INTO settings (setting_key, setting_value) VALUES (?, ?)
            ON DUPLICATE KEY UPDATE setting_value = VALUES(setting_value)"#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.conn)
        .await?;

        Ok(())
    }
}
