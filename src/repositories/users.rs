use crate::models::users;

use sqlx::MySqlPool;

const USER_COLUMNS: &str = "id, name, email, username, role";

#[derive(Clone)]
pub struct UserRepository {
    conn: MySqlPool,
}

impl UserRepository {
    pub fn new(conn: MySqlPool) -> Self {
        Self { conn }
    }

    pub async fn get_credentials(
        &self,
        username: &str,
    ) -> Result<Option<users::UserCredentials>, anyhow::Error> {
        let user = sqlx::query_as::<_, users::UserCredentials>(&format!(
            "SELECT {USER_COLUMNS}, password FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.conn)
        .await?;

        Ok(user)
    }

    pub async fn get_user_by_id(&self, user_id: i64) -> Result<Option<users::User>, anyhow::Error> {
        let user = sqlx::query_as::<_, users::User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(user_id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<users::User>, anyhow::Error> {
        let users = sqlx::query_as::<_, users::User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY name"
        ))
        .fetch_all(&self.conn)
        .await?;

        Ok(users)
    }

    /// Whether another user already holds `username` or `email`.
    pub async fn is_taken(
        &self,
        username: &str,
        email: &str,
        except_id: Option<i64>,
    ) -> Result<bool, anyhow::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM users WHERE (username = ? OR email = ?) AND id <> ?",
        )
        .bind(username)
        .bind(email)
        .bind(except_id.unwrap_or(0))
        .fetch_one(&self.conn)
        .await?;

        Ok(count > 0)
    }

    pub async fn insert_user(
        &self,
        fields: &users::UserFields,
        password_hash: &str,
    ) -> Result<users::User, anyhow::Error> {
        let result = sqlx::query(
            "INSERT INTO users (name, email, username, password, role) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(&fields.username)
        .bind(password_hash)
        .bind(fields.role.as_str())
        .execute(&self.conn)
        .await?;

        let id = result.last_insert_id() as i64;
        self.get_user_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User {id} vanished after insert"))
    }

    /// Returns `None` when no user has `user_id`.
    pub async fn update_user(
        &self,
        user_id: i64,
        fields: &users::UserFields,
        password_hash: Option<&str>,
    ) -> Result<Option<users::User>, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        sqlx::query("UPDATE users SET name = ?, email = ?, username = ?, role = ? WHERE id = ?")
            .bind(&fields.name)
            .bind(&fields.email)
            .bind(&fields.username)
            .bind(fields.role.as_str())
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if let Some(hash) = password_hash {
            sqlx::query("UPDATE users SET password = ? WHERE id = ?")
                .bind(hash)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.get_user_by_id(user_id).await
    }

    pub async fn count_authored_transactions(&self, user_id: i64) -> Result<i64, anyhow::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM transactions WHERE created_by = ?")
            .bind(user_id)
            .fetch_one(&self.conn)
            .await?;

        Ok(count)
    }

    /// Returns `false` when nothing was deleted.
    pub async fn delete_user(&self, user_id: i64) -> Result<bool, anyhow::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&self.conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
