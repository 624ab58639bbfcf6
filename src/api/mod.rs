//! HTTP client for the scheduler backend.
//!
//! [`ApiClient`] owns the `reqwest` client and the normalized base URL. The
//! bearer credential lives in a shared [`AuthHeader`] slot: the session store
//! writes it, every request reads it. Endpoint methods are split by area:
//! - `auth` - register and login
//! - `orgs` - organizations and invitations
//! - `messages` - scheduled, delivered and failed messages

pub mod auth;
pub mod envelope;
pub mod messages;
pub mod orgs;
pub mod validation;

use arc_swap::ArcSwapOption;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::ClientError;

/// Header naming the organization a request is scoped to
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Current version from Cargo.toml
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared default `Authorization` header.
///
/// Cloning yields another handle to the same slot, so the session store and
/// the API client always agree on the credential in effect.
#[derive(Clone, Default)]
pub struct AuthHeader {
    value: Arc<ArcSwapOption<HeaderValue>>,
}

impl AuthHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the header value for a bearer token without installing it
    pub fn bearer_value(token: &str) -> Result<HeaderValue, ClientError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ClientError::InvalidToken)?;
        value.set_sensitive(true);
        Ok(value)
    }

    /// Install a prepared header value
    pub fn install(&self, value: HeaderValue) {
        self.value.store(Some(Arc::new(value)));
    }

    /// Install `Bearer <token>`
    pub fn set_bearer(&self, token: &str) -> Result<(), ClientError> {
        self.install(Self::bearer_value(token)?);
        Ok(())
    }

    pub fn clear(&self) {
        self.value.store(None);
    }

    pub fn get(&self) -> Option<HeaderValue> {
        self.value.load_full().map(|value| (*value).clone())
    }

    pub fn is_set(&self) -> bool {
        self.value.load().is_some()
    }

    /// The header as text, e.g. `Bearer abc`
    pub fn as_string(&self) -> Option<String> {
        self.get()
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }
}

impl fmt::Debug for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthHeader")
            .field("set", &self.is_set())
            .finish()
    }
}

/// What a request needs attached before it can be sent
#[derive(Debug, Clone, Copy)]
pub(crate) enum Access<'a> {
    /// No credential required (the default header is still sent if present)
    Public,
    /// Bearer credential required
    Authenticated,
    /// Bearer credential and tenant header required
    Tenant(&'a str),
}

/// Client for the scheduler backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    auth: AuthHeader,
}

impl ApiClient {
    /// Create a client for the configured backend sharing `auth` with the session store
    pub fn new(config: &ApiConfig, auth: AuthHeader) -> Result<Self, ClientError> {
        let normalized = normalize_base_url(&config.base_url)?;
        let base_url = Url::parse(&normalized)
            .map_err(|_| ClientError::InvalidBaseUrl(config.base_url.clone()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(config.base_url.clone()));
        }

        let http = Client::builder()
            .user_agent(format!("msgsched/{}", CLIENT_VERSION))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url,
            auth,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn auth_header(&self) -> &AuthHeader {
        &self.auth
    }

    /// The default `Authorization` header currently attached to requests
    pub fn default_authorization(&self) -> Option<String> {
        self.auth.as_string()
    }

    /// Build an endpoint URL from path segments, escaping each one
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn request(
        &self,
        method: Method,
        segments: &[&str],
        access: Access<'_>,
    ) -> Result<RequestBuilder, ClientError> {
        let url = self.endpoint(segments)?;
        let authorization = self.auth.get();

        if !matches!(access, Access::Public) && authorization.is_none() {
            return Err(ClientError::NotAuthenticated);
        }

        debug!(%method, %url, "API request");

        let mut builder = self.http.request(method, url);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        if let Access::Tenant(org_id) = access {
            if org_id.trim().is_empty() {
                return Err(ClientError::NoTenantSelected);
            }
            builder = builder.header(TENANT_HEADER, org_id);
        }
        Ok(builder)
    }

    /// Send a request and return the JSON body (`Null` for an empty body)
    pub(crate) async fn send_value(&self, builder: RequestBuilder) -> Result<Value, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            debug!(%status, "API request rejected");
            return Err(ClientError::from_response(status, &body));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Send a request and decode the JSON body into `T`
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ClientError> {
        let value = self.send_value(builder).await?;
        decode(value)
    }
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Trim and validate a base URL; it must be http(s) with a host
pub fn normalize_base_url(raw: &str) -> Result<String, ClientError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ClientError::InvalidBaseUrl(raw.to_string()));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ClientError::InvalidBaseUrl(raw.to_string()));
    }
    let Some((_, remainder)) = trimmed.split_once("://") else {
        return Err(ClientError::InvalidBaseUrl(raw.to_string()));
    };
    if remainder.trim().is_empty() || remainder.starts_with('/') {
        return Err(ClientError::InvalidBaseUrl(raw.to_string()));
    }
    Ok(trimmed.to_string())
}
