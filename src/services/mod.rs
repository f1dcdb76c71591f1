pub mod auth_service;
pub mod role_service;
pub mod user_service;

pub use auth_service::{AuthService, AuthSession};
pub use role_service::RoleService;
pub use user_service::UserService;

use crate::auth::{JwtError, PasswordError};
use crate::database::manager::DatabaseError;

/// Business-rule failures shared by the services.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Password error: {0}")]
    Password(#[from] PasswordError),
    #[error("Token error: {0}")]
    Token(#[from] JwtError),
}
