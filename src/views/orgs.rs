//! Organization screens: create, invite, accept, and the tenant selector.

use std::sync::Arc;
use tracing::info;

use super::{Fallback, FormStatus, ACCESS_DENIED};
use crate::api::orgs::{InviteRequest, Role};
use crate::api::validation::{validate_email, validate_invite_token, validate_org_name};
use crate::error::{ClientError, ValidationErrors};
use crate::scope::RequestScope;
use crate::tenant::Organization;
use crate::AppContext;

const CREATE_FAILED: &str = "Failed to create organization.";
const INVITE_FAILED: &str = "Failed to send invite.";
const ACCEPT_FAILED: &str = "Failed to accept invite.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrgForm {
    pub name: String,
    /// Kept locally, never sent
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InviteForm {
    /// Empty means the selected organization
    pub org_id: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptForm {
    pub invite_token: String,
}

pub struct OrgsView {
    ctx: Arc<AppContext>,
    scope: RequestScope,
    pub create: OrgForm,
    pub invite: InviteForm,
    pub accept: AcceptForm,
    pub status: FormStatus,
    /// Token returned by the last successful invite
    pub invite_token: Option<String>,
}

impl OrgsView {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let scope = ctx.scopes.session_scope();
        Self {
            ctx,
            scope,
            create: OrgForm::default(),
            invite: InviteForm::default(),
            accept: AcceptForm::default(),
            status: FormStatus::default(),
            invite_token: None,
        }
    }

    pub fn access_denied(&self) -> bool {
        !self.ctx.session.is_logged_in()
    }

    /// Create an organization, add it to the tenant list and select it
    pub async fn create_org(&mut self) -> bool {
        if self.access_denied() {
            self.status.error = Some(ACCESS_DENIED.to_string());
            return false;
        }
        let mut errors = ValidationErrors::new();
        errors.check("name", validate_org_name(&self.create.name));
        if let Err(err) = errors.finish() {
            self.status.fail(&err, Fallback::PreferServer(CREATE_FAILED));
            return false;
        }
        self.status.begin();

        let name = self.create.name.trim().to_string();
        let description = self.create.description.clone();
        let result = self
            .scope
            .run(self.ctx.api.create_org(&name, Some(description.as_str())))
            .await;

        let ctx = &self.ctx;
        let ok = self.status.settle(
            &self.scope,
            result,
            Fallback::PreferServer(CREATE_FAILED),
            |response| {
                ctx.scopes.reset_tenant();
                ctx.tenants.add_org(response.org)?;
                Ok(())
            },
        );
        if ok {
            self.create = OrgForm::default();
            self.status.success = Some("Organization created successfully!".to_string());
        }
        ok
    }

    /// Invite an email address to an organization
    pub async fn send_invite(&mut self) -> bool {
        if self.access_denied() {
            self.status.error = Some(ACCESS_DENIED.to_string());
            return false;
        }
        let org_id = if self.invite.org_id.trim().is_empty() {
            self.ctx.tenants.selected_org_id()
        } else {
            Some(self.invite.org_id.trim().to_string())
        };
        let Some(org_id) = org_id else {
            self.status
                .fail(&ClientError::NoTenantSelected, Fallback::PreferServer(INVITE_FAILED));
            return false;
        };
        let mut errors = ValidationErrors::new();
        errors.check("email", validate_email(&self.invite.email));
        if let Err(err) = errors.finish() {
            self.status.fail(&err, Fallback::PreferServer(INVITE_FAILED));
            return false;
        }
        self.status.begin();
        self.invite_token = None;

        let request = InviteRequest {
            email: self.invite.email.trim().to_string(),
            role: self.invite.role,
        };
        let result = self
            .scope
            .run(self.ctx.api.invite_to_org(&org_id, &request))
            .await;

        let mut token = None;
        let ok = self.status.settle(
            &self.scope,
            result,
            Fallback::PreferServer(INVITE_FAILED),
            |response| {
                token = Some(response.invite_token);
                Ok(())
            },
        );
        if ok {
            info!(org_id = %org_id, "Invite sent");
            self.invite = InviteForm::default();
            self.invite_token = token;
            self.status.success = Some(format!("Invite sent to {}.", request.email));
        }
        ok
    }

    /// Redeem an invite token
    pub async fn accept_invite(&mut self) -> bool {
        let mut errors = ValidationErrors::new();
        errors.check("invite_token", validate_invite_token(&self.accept.invite_token));
        if let Err(err) = errors.finish() {
            self.status.fail(&err, Fallback::PreferServer(ACCEPT_FAILED));
            return false;
        }
        self.status.begin();

        let token = self.accept.invite_token.trim().to_string();
        let result = self.scope.run(self.ctx.api.accept_invite(&token)).await;

        let mut joined = None;
        let ok = self.status.settle(
            &self.scope,
            result,
            Fallback::PreferServer(ACCEPT_FAILED),
            |response| {
                joined = Some(response);
                Ok(())
            },
        );
        if let Some(joined) = joined {
            self.accept = AcceptForm::default();
            self.status.success = Some(format!(
                "Joined organization {} as {}.",
                joined.org_id, joined.role
            ));
        }
        ok
    }
}

/// Tenant picker shown in the page header
pub struct OrgSelector {
    ctx: Arc<AppContext>,
}

impl OrgSelector {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Narrow the stored list to the current user's organizations and make
    /// sure one is selected.
    ///
    /// Does nothing without a user.
    pub fn mount(&self) -> Result<(), ClientError> {
        let Some(user) = self.ctx.session.user() else {
            return Ok(());
        };
        let owned: Vec<Organization> = self
            .ctx
            .tenants
            .orgs()
            .into_iter()
            .filter(|org| org.owner_user_id == user.id)
            .collect();
        self.ctx.tenants.set_orgs(owned)?;
        if let Some(org_id) = self.ctx.tenants.ensure_selection()? {
            info!(org_id = %org_id, "Selected first organization");
        }
        Ok(())
    }

    /// Switch tenant; in-flight work for the previous tenant is abandoned
    pub fn select(&self, org_id: &str) -> Result<(), ClientError> {
        self.ctx.switch_tenant(org_id)
    }

    pub fn options(&self) -> Vec<(Organization, bool)> {
        let state = self.ctx.tenants.snapshot();
        state
            .orgs
            .into_iter()
            .map(|org| {
                let selected = state.selected_org_id.as_deref() == Some(org.id.as_str());
                (org, selected)
            })
            .collect()
    }

    /// Text on the selector button
    pub fn label(&self) -> String {
        let state = self.ctx.tenants.snapshot();
        if state.orgs.is_empty() {
            return "No organizations".to_string();
        }
        match self.ctx.tenants.selected_org() {
            Some(org) => org.name,
            None => "Select an organization".to_string(),
        }
    }
}
