//! Landing screen for a logged-in user.

use std::sync::Arc;

use super::FormStatus;
use crate::session::User;
use crate::AppContext;

pub struct DashboardView {
    ctx: Arc<AppContext>,
    pub status: FormStatus,
}

impl DashboardView {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            ctx,
            status: FormStatus::default(),
        }
    }

    pub fn user(&self) -> Option<User> {
        self.ctx.session.user()
    }

    pub fn access_denied(&self) -> bool {
        self.user().is_none()
    }

    /// Label/value rows describing the current user
    pub fn details(&self) -> Vec<(&'static str, String)> {
        match self.user() {
            Some(user) => vec![("Name", user.name), ("Email", user.email), ("ID", user.id)],
            None => Vec::new(),
        }
    }

    /// Log out; the organization list and selection are left as they are
    pub fn logout(&mut self) -> bool {
        match self.ctx.logout() {
            Ok(()) => true,
            Err(err) => {
                self.status.error = Some(err.to_string());
                false
            }
        }
    }
}
