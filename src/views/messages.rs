//! Scheduled messages screen for the selected tenant.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::sync::Arc;

use super::{Fallback, FormStatus};
use crate::api::messages::{
    Channel, DeliveredMessage, FailedMessage, ScheduleRequest, ScheduleUpdate, ScheduledMessage,
};
use crate::api::validation::{validate_message_text, validate_recipient};
use crate::error::{ClientError, ValidationErrors};
use crate::scope::RequestScope;
use crate::AppContext;

const LOAD_FAILED: &str = "Failed to load scheduled messages.";
const SAVE_FAILED: &str = "Failed to save message.";
const DELETE_FAILED: &str = "Failed to delete message.";
const HISTORY_FAILED: &str = "Failed to load message history.";

/// Input format of the send time field
const SEND_AT_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Parse a send time into epoch milliseconds.
///
/// Accepts RFC 3339, or `YYYY-MM-DDTHH:MM[:SS]` (a space also works as the
/// separator) read as local time.
pub fn parse_send_at(input: &str) -> Result<i64, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("Send time is required".to_string());
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Ok(parsed.timestamp_millis());
    }

    let naive = [
        "%Y-%m-%dT%H:%M:%S",
        SEND_AT_FORMAT,
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ]
    .iter()
    .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
    .ok_or_else(|| format!("Invalid send time {:?}, expected YYYY-MM-DDTHH:MM", input))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.timestamp_millis())
        .ok_or_else(|| format!("{} does not exist in the local time zone", input))
}

/// Render epoch milliseconds for the send time field, in local time
pub fn format_send_at(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).earliest() {
        Some(local) => local.format(SEND_AT_FORMAT).to_string(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageForm {
    pub recipient: String,
    pub message: String,
    /// Local time as typed, see [`parse_send_at`]
    pub send_at: String,
    pub channel: Channel,
}

impl MessageForm {
    fn to_request(&self) -> Result<ScheduleRequest, ClientError> {
        let mut errors = ValidationErrors::new();
        errors.check("recipient", validate_recipient(&self.recipient));
        errors.check("message", validate_message_text(&self.message));
        let send_at = parse_send_at(&self.send_at);
        errors.check("send_at", send_at.as_ref().map(|_| ()).map_err(|e| e.clone()));
        errors.finish()?;

        Ok(ScheduleRequest {
            recipient: self.recipient.trim().to_string(),
            message: self.message.clone(),
            send_at: send_at.unwrap_or_default(),
            channel: self.channel,
        })
    }

    /// Only the fields that differ from `original`.
    ///
    /// The send time field shows minutes only, so it counts as changed only
    /// when its text differs from how `original` renders.
    fn changes_since(&self, original: &ScheduledMessage, request: ScheduleRequest) -> ScheduleUpdate {
        ScheduleUpdate {
            recipient: Some(request.recipient).filter(|r| *r != original.recipient),
            message: Some(request.message).filter(|m| *m != original.message),
            send_at: Some(request.send_at)
                .filter(|_| self.send_at.trim() != format_send_at(original.send_at)),
            channel: Some(request.channel).filter(|c| *c != original.channel),
        }
    }
}

pub struct MessagesView {
    ctx: Arc<AppContext>,
    scope: RequestScope,
    /// Delivered and failed lists are per user, not per tenant
    history_scope: RequestScope,
    org_id: Option<String>,
    pub messages: Vec<ScheduledMessage>,
    pub delivered: Vec<DeliveredMessage>,
    pub failed: Vec<FailedMessage>,
    pub form: MessageForm,
    pub editing_id: Option<String>,
    pub status: FormStatus,
}

impl MessagesView {
    /// Bind to the currently selected tenant
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let scope = ctx.scopes.tenant_scope();
        let history_scope = ctx.scopes.session_scope();
        let org_id = ctx.tenants.selected_org_id();
        Self {
            ctx,
            scope,
            history_scope,
            org_id,
            messages: Vec::new(),
            delivered: Vec::new(),
            failed: Vec::new(),
            form: MessageForm::default(),
            editing_id: None,
            status: FormStatus::default(),
        }
    }

    pub fn org_id(&self) -> Option<&str> {
        self.org_id.as_deref()
    }

    pub fn access_denied(&self) -> bool {
        !self.ctx.session.is_logged_in()
    }

    /// Rebind to the selected tenant if it changed, dropping everything shown
    /// for the previous one. Returns whether it changed.
    pub fn sync_tenant(&mut self) -> bool {
        let selected = self.ctx.tenants.selected_org_id();
        if selected == self.org_id {
            return false;
        }
        self.scope = self.ctx.scopes.tenant_scope();
        self.org_id = selected;
        self.messages.clear();
        self.form = MessageForm::default();
        self.editing_id = None;
        self.status = FormStatus::default();
        true
    }

    fn tenant(&self) -> Result<String, ClientError> {
        self.org_id.clone().ok_or(ClientError::NoTenantSelected)
    }

    /// Fetch the tenant's scheduled messages
    pub async fn load(&mut self) -> bool {
        let org_id = match self.tenant() {
            Ok(org_id) => org_id,
            Err(err) => {
                self.status.fail(&err, Fallback::Fixed(LOAD_FAILED));
                return false;
            }
        };
        self.status.begin();

        let result = self.scope.run(self.ctx.api.list_scheduled(&org_id)).await;

        let mut loaded = None;
        let ok = self.status.settle(&self.scope, result, Fallback::Fixed(LOAD_FAILED), |list| {
            loaded = Some(list);
            Ok(())
        });
        if let Some(list) = loaded {
            self.messages = list;
        }
        ok
    }

    /// Create a message, or update the one being edited
    pub async fn submit(&mut self) -> bool {
        let prepared = self
            .tenant()
            .and_then(|org_id| Ok((org_id, self.form.to_request()?)));
        let (org_id, request) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                self.status.fail(&err, Fallback::Fixed(SAVE_FAILED));
                return false;
            }
        };
        self.status.begin();

        let saved = match self.editing_id.clone() {
            Some(id) => {
                let original = self.messages.iter().find(|m| m.id == id).cloned();
                let update = match &original {
                    Some(original) => self.form.changes_since(original, request),
                    None => ScheduleUpdate::from(request),
                };
                let result = match original {
                    Some(unchanged) if update.is_empty() => Ok(unchanged),
                    _ => {
                        self.scope
                            .run(self.ctx.api.update_scheduled(&org_id, &id, &update))
                            .await
                    }
                };
                let mut updated = None;
                let ok = self.status.settle(&self.scope, result, Fallback::Fixed(SAVE_FAILED), |m| {
                    updated = Some(m);
                    Ok(())
                });
                if let Some(updated) = updated {
                    for message in self.messages.iter_mut().filter(|m| m.id == id) {
                        *message = updated.clone();
                    }
                    self.editing_id = None;
                }
                ok
            }
            None => {
                let result = self
                    .scope
                    .run(self.ctx.api.create_scheduled(&org_id, &request))
                    .await;
                let mut created = None;
                let ok = self.status.settle(&self.scope, result, Fallback::Fixed(SAVE_FAILED), |m| {
                    created = Some(m);
                    Ok(())
                });
                if let Some(created) = created {
                    self.messages.push(created);
                }
                ok
            }
        };

        if saved {
            self.form = MessageForm::default();
        }
        saved
    }

    /// Start editing `id`; returns false if it is not shown
    pub fn edit(&mut self, id: &str) -> bool {
        let Some(message) = self.messages.iter().find(|m| m.id == id) else {
            return false;
        };
        self.form = MessageForm {
            recipient: message.recipient.clone(),
            message: message.message.clone(),
            send_at: format_send_at(message.send_at),
            channel: message.channel,
        };
        self.editing_id = Some(message.id.clone());
        true
    }

    pub fn cancel_edit(&mut self) {
        self.editing_id = None;
        self.form = MessageForm::default();
    }

    /// Cancel a scheduled message
    pub async fn delete(&mut self, id: &str) -> bool {
        let org_id = match self.tenant() {
            Ok(org_id) => org_id,
            Err(err) => {
                self.status.fail(&err, Fallback::Fixed(DELETE_FAILED));
                return false;
            }
        };
        self.status.begin();

        let result = self.scope.run(self.ctx.api.delete_scheduled(&org_id, id)).await;

        let mut deleted = false;
        let ok = self.status.settle(&self.scope, result, Fallback::Fixed(DELETE_FAILED), |_| {
            deleted = true;
            Ok(())
        });
        if deleted {
            self.messages.retain(|m| m.id != id);
            if self.editing_id.as_deref() == Some(id) {
                self.cancel_edit();
            }
        }
        ok
    }

    /// Fetch delivered and failed messages together
    pub async fn load_history(&mut self) -> bool {
        self.status.begin();

        let api = &self.ctx.api;
        let result = self
            .history_scope
            .run(async { tokio::try_join!(api.list_delivered(), api.list_failed()) })
            .await;

        let mut history = None;
        let ok = self.status.settle(
            &self.history_scope,
            result,
            Fallback::PreferServer(HISTORY_FAILED),
            |lists| {
                history = Some(lists);
                Ok(())
            },
        );
        if let Some((delivered, failed)) = history {
            self.delivered = delivered;
            self.failed = failed;
        }
        ok
    }
}
