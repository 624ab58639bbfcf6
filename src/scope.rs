//! Cancellation scopes for in-flight requests.
//!
//! Tokens form a tree: root → session → tenant. Switching tenant cancels the
//! tenant token, logging out cancels the session token (and the tenant token
//! under it), teardown cancels the root. Each view takes a [`RequestScope`]
//! that is a child of one of these. A response that arrives after its scope
//! was cancelled is dropped instead of being written into a store.

use parking_lot::Mutex;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ClientError;

/// Cancellation handle owned by one view; cancelled when dropped
#[derive(Debug)]
pub struct RequestScope {
    token: CancellationToken,
}

impl RequestScope {
    /// A scope not tied to any session or tenant
    pub fn detached() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    fn child_of(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Drive `fut` to completion unless the scope is cancelled first
    pub async fn run<T, F>(&self, fut: F) -> Result<T, ClientError>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        if self.token.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                debug!("Request abandoned: scope cancelled");
                Err(ClientError::Cancelled)
            }
            result = fut => result,
        }
    }

    /// Apply a state write only if the scope is still live
    pub fn commit<R>(&self, write: impl FnOnce() -> R) -> Result<R, ClientError> {
        if self.token.is_cancelled() {
            debug!("Skipping stale write: scope cancelled");
            return Err(ClientError::Cancelled);
        }
        Ok(write())
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Root, session and tenant cancellation tokens for one application context
#[derive(Debug)]
pub struct ScopeTree {
    root: CancellationToken,
    session: Mutex<CancellationToken>,
    tenant: Mutex<CancellationToken>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    pub fn new() -> Self {
        let root = CancellationToken::new();
        let session = root.child_token();
        let tenant = session.child_token();
        Self {
            root,
            session: Mutex::new(session),
            tenant: Mutex::new(tenant),
        }
    }

    /// Scope cancelled only by teardown (login and registration)
    pub fn root_scope(&self) -> RequestScope {
        RequestScope::child_of(&self.root)
    }

    /// Scope for work that belongs to the current session
    pub fn session_scope(&self) -> RequestScope {
        RequestScope::child_of(&self.session.lock())
    }

    /// Scope for work that belongs to the current tenant
    pub fn tenant_scope(&self) -> RequestScope {
        RequestScope::child_of(&self.tenant.lock())
    }

    /// Cancel tenant-scoped work and start a fresh tenant scope
    pub fn reset_tenant(&self) {
        let session = self.session.lock();
        let mut tenant = self.tenant.lock();
        tenant.cancel();
        *tenant = session.child_token();
    }

    /// Cancel all session work (tenant work included) and start fresh scopes
    pub fn reset_session(&self) {
        let mut session = self.session.lock();
        let mut tenant = self.tenant.lock();
        session.cancel();
        *session = self.root.child_token();
        *tenant = session.child_token();
    }

    /// Cancel everything; scopes handed out afterwards start cancelled
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }
}
