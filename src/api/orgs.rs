//! Organization and invitation endpoints.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Access, ApiClient};
use crate::error::ClientError;
use crate::tenant::Organization;

/// Role of a member inside an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Member,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Member => write!(f, "member"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Membership created alongside a new organization
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub user_id: String,
    pub org_id: String,
    pub role: Role,
}

/// Only the name goes over the wire
#[derive(Debug, Serialize)]
struct CreateOrgBody<'a> {
    name: &'a str,
}

/// Result of `POST /orgs`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrgResponse {
    pub org: Organization,
    pub membership: Membership,
}

/// Body of `POST /orgs/:id/invite`
#[derive(Debug, Clone, Serialize)]
pub struct InviteRequest {
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteResponse {
    /// Invite record as the backend describes it
    pub invite: serde_json::Value,
    pub invite_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AcceptInviteBody<'a> {
    invite_token: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInviteResponse {
    pub org_id: String,
    pub user_id: String,
    pub role: Role,
}

impl ApiClient {
    /// Create an organization owned by the current user.
    ///
    /// `description` never reaches the backend; it is attached to the
    /// returned organization for local display.
    pub async fn create_org(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<CreateOrgResponse, ClientError> {
        let builder = self
            .request(Method::POST, &["orgs"], Access::Authenticated)?
            .json(&CreateOrgBody { name });
        let mut response: CreateOrgResponse = self.send_json(builder).await?;

        response.org.description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        info!(org_id = %response.org.id, "Created organization");
        Ok(response)
    }

    /// Invite someone to an organization by email
    pub async fn invite_to_org(
        &self,
        org_id: &str,
        request: &InviteRequest,
    ) -> Result<InviteResponse, ClientError> {
        let builder = self
            .request(Method::POST, &["orgs", org_id, "invite"], Access::Authenticated)?
            .json(request);
        self.send_json(builder).await
    }

    /// Redeem an invite token
    pub async fn accept_invite(
        &self,
        invite_token: &str,
    ) -> Result<AcceptInviteResponse, ClientError> {
        let builder = self
            .request(Method::POST, &["orgs", "accept-invite"], Access::Public)?
            .json(&AcceptInviteBody { invite_token });
        self.send_json(builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubBackend;

    #[test]
    fn test_role_parsing() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("member".parse::<Role>().unwrap(), Role::Member);
        assert!("owner".parse::<Role>().is_err());
        assert_eq!(Role::default().to_string(), "member");
    }

    #[tokio::test]
    async fn test_create_org_sends_name_only() {
        let backend = StubBackend::spawn().await;
        let (api, user) = backend.logged_in_client("owner@example.com").await;

        let response = api.create_org("Acme", Some("Main account")).await.unwrap();

        assert_eq!(response.org.name, "Acme");
        assert_eq!(response.org.owner_user_id, user.id);
        assert_eq!(response.org.description.as_deref(), Some("Main account"));
        assert_eq!(response.membership.role, Role::Admin);

        let body = backend.last_body("/orgs").unwrap();
        assert_eq!(body, serde_json::json!({ "name": "Acme" }));
    }

    #[tokio::test]
    async fn test_create_org_requires_credential() {
        let backend = StubBackend::spawn().await;
        let err = backend
            .api_client()
            .create_org("Acme", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotAuthenticated));
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_invite_and_accept() {
        let backend = StubBackend::spawn().await;
        let (api, _) = backend.logged_in_client("owner@example.com").await;
        let org = api.create_org("Acme", None).await.unwrap().org;
        let (_, invitee) = backend.logged_in_client("guest@example.com").await;

        let invite = api
            .invite_to_org(
                &org.id,
                &InviteRequest {
                    email: "guest@example.com".to_string(),
                    role: Role::Member,
                },
            )
            .await
            .unwrap();
        assert!(!invite.invite_token.is_empty());

        let accepted = backend
            .api_client()
            .accept_invite(&invite.invite_token)
            .await
            .unwrap();
        assert_eq!(
            accepted,
            AcceptInviteResponse {
                org_id: org.id,
                user_id: invitee.id,
                role: Role::Member,
            }
        );
    }

    #[tokio::test]
    async fn test_invite_to_unknown_org() {
        let backend = StubBackend::spawn().await;
        let (api, _) = backend.logged_in_client("owner@example.com").await;
        let err = api
            .invite_to_org(
                "missing",
                &InviteRequest {
                    email: "x@example.com".to_string(),
                    role: Role::Admin,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(reqwest::StatusCode::NOT_FOUND));
        assert_eq!(err.server_message(), Some("Organization not found"));
    }
}
