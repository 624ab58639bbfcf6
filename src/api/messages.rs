//! Scheduled, delivered and failed message endpoints.
//!
//! Scheduled messages are tenant-scoped: every call carries the organization
//! id in the tenant header. Message records keep any extra fields the backend
//! adds so they survive a decode/encode cycle untouched.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use super::envelope::decode_list;
use super::{decode, Access, ApiClient};
use crate::error::ClientError;

/// Delivery channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Whatsapp,
    Sms,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Whatsapp => write!(f, "whatsapp"),
            Channel::Sms => write!(f, "sms"),
        }
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "whatsapp" => Ok(Channel::Whatsapp),
            "sms" => Ok(Channel::Sms),
            _ => Err(format!("Unknown channel: {}", s)),
        }
    }
}

/// A message waiting to be sent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledMessage {
    pub id: String,
    pub recipient: String,
    pub message: String,
    /// Epoch milliseconds
    pub send_at: i64,
    pub channel: Channel,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A message the backend has sent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveredMessage {
    pub id: String,
    pub recipient: String,
    pub message: String,
    pub sent_at: i64,
    pub channel: Channel,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A message the backend gave up on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedMessage {
    pub id: String,
    pub recipient: String,
    pub message: String,
    pub failed_at: i64,
    pub channel: Channel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `POST /scheduled`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub recipient: String,
    pub message: String,
    pub send_at: i64,
    pub channel: Channel,
}

/// Body of `PUT /scheduled/:id`; only the fields that are set are sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
}

impl ScheduleUpdate {
    pub fn is_empty(&self) -> bool {
        self.recipient.is_none()
            && self.message.is_none()
            && self.send_at.is_none()
            && self.channel.is_none()
    }
}

impl From<ScheduleRequest> for ScheduleUpdate {
    fn from(request: ScheduleRequest) -> Self {
        Self {
            recipient: Some(request.recipient),
            message: Some(request.message),
            send_at: Some(request.send_at),
            channel: Some(request.channel),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateScheduledResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    data: Option<ScheduledMessage>,
}

#[derive(Debug, Deserialize)]
struct UpdateScheduledResponse {
    data: ScheduledMessage,
}

/// Result of `DELETE /scheduled/:id`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeleteResponse {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub id: Option<String>,
}

fn default_success() -> bool {
    true
}

impl ApiClient {
    /// List the tenant's scheduled messages
    pub async fn list_scheduled(&self, org_id: &str) -> Result<Vec<ScheduledMessage>, ClientError> {
        let builder = self.request(Method::GET, &["scheduled"], Access::Tenant(org_id))?;
        let body = self.send_value(builder).await?;
        decode_list(body)
    }

    /// Schedule a message.
    ///
    /// Older backends answer with just the new id; the record is then rebuilt
    /// from the request.
    pub async fn create_scheduled(
        &self,
        org_id: &str,
        request: &ScheduleRequest,
    ) -> Result<ScheduledMessage, ClientError> {
        let builder = self
            .request(Method::POST, &["scheduled"], Access::Tenant(org_id))?
            .json(request);
        let response: CreateScheduledResponse = self.send_json(builder).await?;

        let message = match (response.data, response.id) {
            (Some(data), _) => data,
            (None, Some(id)) => ScheduledMessage {
                id,
                recipient: request.recipient.clone(),
                message: request.message.clone(),
                send_at: request.send_at,
                channel: request.channel,
                extra: Map::new(),
            },
            (None, None) => {
                return Err(ClientError::Decode(
                    "create response has neither data nor id".to_string(),
                ))
            }
        };

        info!(message_id = %message.id, org_id, "Scheduled message");
        Ok(message)
    }

    /// Change some fields of a scheduled message
    pub async fn update_scheduled(
        &self,
        org_id: &str,
        id: &str,
        update: &ScheduleUpdate,
    ) -> Result<ScheduledMessage, ClientError> {
        let builder = self
            .request(Method::PUT, &["scheduled", id], Access::Tenant(org_id))?
            .json(update);
        let response: UpdateScheduledResponse = self.send_json(builder).await?;
        Ok(response.data)
    }

    /// Cancel a scheduled message
    pub async fn delete_scheduled(&self, org_id: &str, id: &str) -> Result<DeleteResponse, ClientError> {
        let builder = self.request(Method::DELETE, &["scheduled", id], Access::Tenant(org_id))?;
        let body = self.send_value(builder).await?;
        if body.is_null() {
            return Ok(DeleteResponse {
                success: true,
                id: Some(id.to_string()),
            });
        }
        let response: DeleteResponse = decode(body)?;
        info!(message_id = id, org_id, "Deleted scheduled message");
        Ok(response)
    }

    /// Messages the backend has delivered for the current user
    pub async fn list_delivered(&self) -> Result<Vec<DeliveredMessage>, ClientError> {
        let builder = self.request(Method::GET, &["delivered"], Access::Authenticated)?;
        let body = self.send_value(builder).await?;
        decode_list(body)
    }

    /// Messages the backend failed to deliver for the current user
    pub async fn list_failed(&self) -> Result<Vec<FailedMessage>, ClientError> {
        let builder = self.request(Method::GET, &["failed"], Access::Authenticated)?;
        let body = self.send_value(builder).await?;
        decode_list(body)
    }
}
