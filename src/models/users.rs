use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Manager,
    DataEntry,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Manager => "manager",
            Role::DataEntry => "data_entry",
        }
    }

    /// Whether transaction listings and reports include rows authored by others.
    pub fn sees_all_transactions(&self) -> bool {
        match self {
            Role::SuperAdmin | Role::Manager => true,
            Role::DataEntry => false,
        }
    }

    /// Institutions, receipt types and the opening balance.
    pub fn can_edit_ledger_setup(&self) -> bool {
        match self {
            Role::SuperAdmin | Role::Manager => true,
            Role::DataEntry => false,
        }
    }

    pub fn can_manage_users(&self) -> bool {
        match self {
            Role::SuperAdmin => true,
            Role::Manager | Role::DataEntry => false,
        }
    }

    pub fn can_export_backup(&self) -> bool {
        match self {
            Role::SuperAdmin => true,
            Role::Manager | Role::DataEntry => false,
        }
    }

    pub fn can_import_backup(&self) -> bool {
        match self {
            Role::SuperAdmin => true,
            Role::Manager | Role::DataEntry => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "super_admin" => Ok(Role::SuperAdmin),
            "manager" => Ok(Role::Manager),
            "data_entry" => Ok(Role::DataEntry),
            _ => Err(format!("Unknown role: {value}")),
        }
    }
}

/// A user row as exposed over the API; the password hash never leaves the repository.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub username: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
}

/// The authenticated identity a request is served for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Caller {
    pub id: i64,
    pub role: Role,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct UserCredentials {
    #[sqlx(flatten)]
    pub user: User,
    pub password: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

/// Body of `POST /api/users`. The role stays a string so an unknown value
/// produces a validation error instead of a body rejection.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// Body of `PUT /api/users/{id}`; the password is only replaced when present.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// Validated form of [`NewUser`] / [`UserUpdate`] handed to the repository.
#[derive(Clone, Debug)]
pub struct UserFields {
    pub name: String,
    pub email: String,
    pub username: String,
    pub role: Role,
}
