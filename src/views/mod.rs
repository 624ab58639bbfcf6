//! Screen controllers.
//!
//! Each controller owns its form values and a [`FormStatus`], runs API calls
//! inside its own [`RequestScope`](crate::scope::RequestScope) and only writes
//! to the stores while that scope is live. Handlers never return errors: they
//! report success as a `bool` and leave a user-facing message in `status`.

pub mod auth;
pub mod dashboard;
pub mod messages;
pub mod orgs;

pub use auth::{AuthForm, AuthMode, AuthView};
pub use dashboard::DashboardView;
pub use messages::{format_send_at, parse_send_at, MessageForm, MessagesView};
pub use orgs::{AcceptForm, InviteForm, OrgForm, OrgSelector, OrgsView};

use tracing::debug;

use crate::error::ClientError;
use crate::scope::RequestScope;

/// Shown when a screen that needs a user is opened without one
pub const ACCESS_DENIED: &str = "Access denied";

/// How a failed submission is described to the user
#[derive(Debug, Clone, Copy)]
pub(crate) enum Fallback {
    /// Backend message when there is one, else the fixed text
    PreferServer(&'static str),
    /// Always the fixed text
    Fixed(&'static str),
}

/// Transient submission state of a form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormStatus {
    pub loading: bool,
    pub error: Option<String>,
    pub success: Option<String>,
}

impl FormStatus {
    /// Mark a submission as started
    pub(crate) fn begin(&mut self) {
        self.loading = true;
        self.error = None;
        self.success = None;
    }

    pub(crate) fn fail(&mut self, err: &ClientError, fallback: Fallback) {
        self.loading = false;
        if matches!(err, ClientError::Cancelled) {
            return;
        }
        let message = match fallback {
            Fallback::PreferServer(text) => err.user_message(text),
            Fallback::Fixed(text) => err.fixed_message(text),
        };
        debug!(error = %err, shown = %message, "Submission failed");
        self.error = Some(message);
    }

    /// Finish a submission.
    ///
    /// On success `commit` runs only if `scope` is still live; a store write
    /// that fails is reported like a request failure.
    pub(crate) fn settle<T>(
        &mut self,
        scope: &RequestScope,
        result: Result<T, ClientError>,
        fallback: Fallback,
        commit: impl FnOnce(T) -> Result<(), ClientError>,
    ) -> bool {
        let outcome = result.and_then(|value| scope.commit(|| commit(value)).and_then(|r| r));
        match outcome {
            Ok(()) => {
                self.loading = false;
                true
            }
            Err(err) => {
                self.fail(&err, fallback);
                false
            }
        }
    }
}
