use async_trait::async_trait;
use sqlx::MySqlPool;
use tokio::sync::oneshot;

use super::{is_still_referenced, required, RequestHandler, Service, ServiceError};
use crate::{
    auth::{self, TokenKeys},
    models::users::{self, Role, UserFields},
    repositories::users::UserRepository,
};

const LOGIN_FAILED: &str = "Invalid username or password";

pub enum UserRequest {
    Login {
        username: Option<String>,
        password: Option<String>,
        response: oneshot::Sender<Result<users::LoginResponse, ServiceError>>,
    },
    GetUser {
        id: i64,
        response: oneshot::Sender<Result<users::User, ServiceError>>,
    },
    ListUsers {
        response: oneshot::Sender<Result<Vec<users::User>, ServiceError>>,
    },
    CreateUser {
        user: users::NewUser,
        response: oneshot::Sender<Result<users::User, ServiceError>>,
    },
    UpdateUser {
        id: i64,
        update: users::UserUpdate,
        response: oneshot::Sender<Result<users::User, ServiceError>>,
    },
    DeleteUser {
        id: i64,
        requested_by: i64,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
}

#[derive(Clone)]
pub struct UserRequestHandler {
    repository: UserRepository,
    keys: TokenKeys,
}

fn user_fields(
    name: Option<String>,
    email: Option<String>,
    username: Option<String>,
    role: Option<String>,
    message: &str,
) -> Result<UserFields, ServiceError> {
    let name = required(name, message)?;
    let email = required(email, message)?;
    let username = required(username, message)?;
    let role = required(role, message)?;
    let role = Role::try_from(role).map_err(|_| ServiceError::Validation("Invalid role".into()))?;

    Ok(UserFields {
        name,
        email,
        username,
        role,
    })
}

fn has_authored() -> ServiceError {
    ServiceError::Conflict("This user has created transactions and cannot be deleted".into())
}

fn delete_failure(error: anyhow::Error) -> ServiceError {
    if is_still_referenced(&error) {
        has_authored()
    } else {
        ServiceError::database("Failed to delete user")(error)
    }
}

async fn hash_password(password: String) -> Result<String, ServiceError> {
    tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .map_err(|e| ServiceError::internal("Failed to hash password", e))?
        .map_err(|e| ServiceError::internal("Failed to hash password", e))
}

impl UserRequestHandler {
    pub fn new(sql_conn: MySqlPool, keys: TokenKeys) -> Self {
        let repository = UserRepository::new(sql_conn);

        UserRequestHandler { repository, keys }
    }

    async fn login(
        &self,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<users::LoginResponse, ServiceError> {
        let message = "Username and password are required";
        let username = required(username, message)?;
        let password = password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ServiceError::Validation(message.into()))?;

        let credentials = self
            .repository
            .get_credentials(&username)
            .await
            .map_err(ServiceError::database("Internal server error"))?
            .ok_or_else(|| ServiceError::Unauthorized(LOGIN_FAILED.into()))?;

        let stored_hash = credentials.password;
        let matches =
            tokio::task::spawn_blocking(move || auth::verify_password(&password, &stored_hash))
                .await
                .map_err(|e| ServiceError::internal("Internal server error", e))?
                .map_err(|e| ServiceError::internal("Internal server error", e))?;

        if !matches {
            log::info!("Rejected login for {username}.");
            return Err(ServiceError::Unauthorized(LOGIN_FAILED.into()));
        }

        let token = self
            .keys
            .issue(&credentials.user)
            .map_err(|e| ServiceError::internal("Internal server error", e))?;

        log::info!("User {} logged in.", credentials.user.username);
        Ok(users::LoginResponse {
            user: credentials.user,
            token,
        })
    }

    async fn get_user(&self, id: i64) -> Result<users::User, ServiceError> {
        self.repository
            .get_user_by_id(id)
            .await
            .map_err(ServiceError::database("Internal server error"))?
            .ok_or_else(|| ServiceError::NotFound("User not found".into()))
    }

    async fn list_users(&self) -> Result<Vec<users::User>, ServiceError> {
        self.repository
            .list_users()
            .await
            .map_err(ServiceError::database("Failed to fetch users"))
    }

    async fn create_user(&self, user: users::NewUser) -> Result<users::User, ServiceError> {
        let message = "Name, email, username, password, and role are required";
        let password = required(user.password, message)?;
        let fields = user_fields(user.name, user.email, user.username, user.role, message)?;

        let taken = self
            .repository
            .is_taken(&fields.username, &fields.email, None)
            .await
            .map_err(ServiceError::database("Failed to add user"))?;
        if taken {
            return Err(ServiceError::Validation(
                "Username or email already exists".into(),
            ));
        }

        let password_hash = hash_password(password).await?;
        let user = self
            .repository
            .insert_user(&fields, &password_hash)
            .await
            .map_err(ServiceError::database("Failed to add user"))?;

        log::info!("Created user {} with role {}.", user.username, user.role);
        Ok(user)
    }

    async fn update_user(
        &self,
        id: i64,
        update: users::UserUpdate,
    ) -> Result<users::User, ServiceError> {
        let message = "Name, email, username, and role are required";
        let fields = user_fields(update.name, update.email, update.username, update.role, message)?;

        let taken = self
            .repository
            .is_taken(&fields.username, &fields.email, Some(id))
            .await
            .map_err(ServiceError::database("Failed to update user"))?;
        if taken {
            return Err(ServiceError::Validation(
                "Username or email already exists".into(),
            ));
        }

        let password_hash = match update.password.filter(|p| !p.is_empty()) {
            Some(password) => Some(hash_password(password).await?),
            None => None,
        };

        self.repository
            .update_user(id, &fields, password_hash.as_deref())
            .await
            .map_err(ServiceError::database("Failed to update user"))?
            .ok_or_else(|| ServiceError::NotFound("User not found".into()))
    }

    async fn delete_user(&self, id: i64, requested_by: i64) -> Result<(), ServiceError> {
        if id == requested_by {
            return Err(ServiceError::Validation(
                "Cannot delete your own account".into(),
            ));
        }

        let authored = self
            .repository
            .count_authored_transactions(id)
            .await
            .map_err(ServiceError::database("Failed to delete user"))?;
        if authored > 0 {
            return Err(has_authored());
        }

        let deleted = self
            .repository
            .delete_user(id)
            .await
            .map_err(delete_failure)?;
        if !deleted {
            return Err(ServiceError::NotFound("User not found".into()));
        }

        log::info!("Deleted user {id}.");
        Ok(())
    }
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::Login {
                username,
                password,
                response,
            } => {
                let result = self.login(username, password).await;
                let _ = response.send(result);
            }
            UserRequest::GetUser { id, response } => {
                let user = self.get_user(id).await;
                let _ = response.send(user);
            }
            UserRequest::ListUsers { response } => {
                let users = self.list_users().await;
                let _ = response.send(users);
            }
            UserRequest::CreateUser { user, response } => {
                let user = self.create_user(user).await;
                let _ = response.send(user);
            }
            UserRequest::UpdateUser {
                id,
                update,
                response,
            } => {
                let user = self.update_user(id, update).await;
                let _ = response.send(user);
            }
            UserRequest::DeleteUser {
                id,
                requested_by,
                response,
            } => {
                let result = self.delete_user(id, requested_by).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_fields_rejects_unknown_roles() {
        let result = user_fields(
            Some("Auditor".into()),
            Some("audit@example.com".into()),
            Some("audit".into()),
            Some("auditor".into()),
            "required",
        );

        assert!(matches!(result, Err(ServiceError::Validation(msg)) if msg == "Invalid role"));
    }

    #[test]
    fn user_fields_requires_every_field() {
        let result = user_fields(
            Some("Data Entry User".into()),
            None,
            Some("data".into()),
            Some("data_entry".into()),
            "Name, email, username, and role are required",
        );

        assert!(matches!(
            result,
            Err(ServiceError::Validation(msg)) if msg == "Name, email, username, and role are required"
        ));
    }

    #[test]
    fn user_fields_parses_roles() {
        let fields = user_fields(
            Some("Manager User".into()),
            Some("manager@example.com".into()),
            Some("manager".into()),
            Some("manager".into()),
            "required",
        )
        .unwrap();

        assert_eq!(fields.role, Role::Manager);
        assert_eq!(fields.username, "manager");
    }

    #[test]
    fn authored_row_added_during_delete_is_a_conflict() {
        let raced = delete_failure(crate::services::tests::foreign_key_violation());
        let broken = delete_failure(anyhow::anyhow!("connection reset"));

        assert!(matches!(
            raced,
            ServiceError::Conflict(msg) if msg == "This user has created transactions and cannot be deleted"
        ));
        assert!(matches!(broken, ServiceError::Database { .. }));
    }
}
