//! Registration and login endpoints.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Access, ApiClient};
use crate::error::ClientError;
use crate::session::User;

/// Body of `POST /auth/register`
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Body of `POST /auth/login`
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful login
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

impl ApiClient {
    /// Create an account. The backend returns the user but no credential.
    pub async fn register(&self, request: &RegisterRequest) -> Result<User, ClientError> {
        let builder = self
            .request(Method::POST, &["auth", "register"], Access::Public)?
            .json(request);
        let user: User = self.send_json(builder).await?;
        info!(user_id = %user.id, "Registered account");
        Ok(user)
    }

    /// Exchange credentials for a bearer token
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ClientError> {
        let builder = self
            .request(Method::POST, &["auth", "login"], Access::Public)?
            .json(request);
        self.send_json(builder).await
    }
}
