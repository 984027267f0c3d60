use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use serde_json::Value;

use super::{authorize, dispatch, message, AppState, JsonBody, PathParam};
use crate::auth::Claims;
use crate::models::users;
use crate::services::{users::UserRequest, ServiceError};

const SERVICE: &str = "UserService";

pub(super) async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<users::User>>, ServiceError> {
    authorize(claims.role.can_manage_users())?;

    let users = dispatch(&state.channels.users, SERVICE, |response| {
        UserRequest::ListUsers { response }
    })
    .await?;

    Ok(Json(users))
}

pub(super) async fn create_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(user): JsonBody<users::NewUser>,
) -> Result<(StatusCode, Json<users::User>), ServiceError> {
    authorize(claims.role.can_manage_users())?;

    let user = dispatch(&state.channels.users, SERVICE, |response| {
        UserRequest::CreateUser { user, response }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub(super) async fn update_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    PathParam(user_id): PathParam<i64>,
    JsonBody(update): JsonBody<users::UserUpdate>,
) -> Result<Json<users::User>, ServiceError> {
    authorize(claims.role.can_manage_users())?;

    let user = dispatch(&state.channels.users, SERVICE, |response| {
        UserRequest::UpdateUser {
            id: user_id,
            update,
            response,
        }
    })
    .await?;

    Ok(Json(user))
}

pub(super) async fn delete_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    PathParam(user_id): PathParam<i64>,
) -> Result<Json<Value>, ServiceError> {
    authorize(claims.role.can_manage_users())?;

    dispatch(&state.channels.users, SERVICE, |response| {
        UserRequest::DeleteUser {
            id: user_id,
            requested_by: claims.id,
            response,
        }
    })
    .await?;

    Ok(message("User deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    use crate::models::users::Role;
    use crate::services::http::testing;

    #[tokio::test]
    async fn managers_cannot_list_users() {
        let (channels, mut receivers) = testing::channels();
        let state = AppState {
            channels,
            keys: testing::keys(),
        };

        let response = list_users(State(state), Extension(testing::claims(2, Role::Manager)))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(receivers.users.try_recv().is_err());
    }

    #[tokio::test]
    async fn delete_carries_the_requesting_admin() {
        let (channels, mut receivers) = testing::channels();
        let state = AppState {
            channels,
            keys: testing::keys(),
        };

        tokio::spawn(async move {
            if let Some(UserRequest::DeleteUser {
                id,
                requested_by,
                response,
            }) = receivers.users.recv().await
            {
                let result = if id == requested_by {
                    Err(ServiceError::Validation("Cannot delete your own account".into()))
                } else {
                    Ok(())
                };
                let _ = response.send(result);
            }
        });

        let response = delete_user(
            State(state),
            Extension(testing::claims(1, Role::SuperAdmin)),
            PathParam(1),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = testing::body_json(response).await;
        assert_eq!(body["message"], "Cannot delete your own account");
    }

    #[tokio::test]
    async fn created_user_is_answered_with_201() {
        let (channels, mut receivers) = testing::channels();
        let state = AppState {
            channels,
            keys: testing::keys(),
        };

        tokio::spawn(async move {
            if let Some(UserRequest::CreateUser { response, .. }) = receivers.users.recv().await {
                let _ = response.send(Ok(testing::user(4, Role::DataEntry)));
            }
        });

        let (status, Json(user)) = create_user(
            State(state),
            Extension(testing::claims(1, Role::SuperAdmin)),
            JsonBody(users::NewUser {
                name: Some("User 4".into()),
                email: Some("user4@example.com".into()),
                username: Some("user4".into()),
                password: Some("secret".into()),
                role: Some("data_entry".into()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(user.id, 4);
    }
}
