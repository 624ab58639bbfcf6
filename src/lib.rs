pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod scope;
pub mod session;
pub mod storage;
pub mod tenant;
pub mod views;

#[cfg(test)]
pub(crate) mod testing;

pub use error::ClientError;

use std::sync::Arc;
use tracing::info;

use crate::api::{ApiClient, AuthHeader};
use crate::config::Config;
use crate::scope::ScopeTree;
use crate::session::SessionStore;
use crate::storage::{FileStore, KeyValueStore};
use crate::tenant::TenantStore;

/// Everything a screen needs: both stores, the API client and the request scopes.
///
/// Built once with [`AppContext::initialize`] and shared as `Arc<AppContext>`.
pub struct AppContext {
    pub config: Config,
    pub storage: Arc<dyn KeyValueStore>,
    pub session: SessionStore,
    pub tenants: TenantStore,
    pub api: ApiClient,
    pub scopes: ScopeTree,
}

impl AppContext {
    /// Open the configured data directory and restore persisted state
    pub fn initialize(config: Config) -> Result<Arc<Self>, ClientError> {
        let storage = FileStore::open(&config.storage.data_dir)?;
        Self::with_storage(config, Arc::new(storage))
    }

    /// Restore persisted state from `storage`
    pub fn with_storage(
        config: Config,
        storage: Arc<dyn KeyValueStore>,
    ) -> Result<Arc<Self>, ClientError> {
        let auth_header = AuthHeader::new();
        let api = ApiClient::new(&config.api, auth_header.clone())?;
        let session = SessionStore::hydrate(storage.clone(), auth_header)?;
        let tenants = TenantStore::hydrate(storage.clone())?;

        info!(
            base_url = api.base_url(),
            logged_in = session.is_logged_in(),
            orgs = tenants.orgs().len(),
            "Client context ready"
        );

        Ok(Arc::new(Self {
            config,
            storage,
            session,
            tenants,
            api,
            scopes: ScopeTree::new(),
        }))
    }

    /// Make `org_id` the current tenant, abandoning work for the previous one
    pub fn switch_tenant(&self, org_id: &str) -> Result<(), ClientError> {
        self.scopes.reset_tenant();
        self.tenants.select_org(org_id)?;
        Ok(())
    }

    /// End the session, abandoning all session work in flight
    pub fn logout(&self) -> Result<(), ClientError> {
        self.scopes.reset_session();
        self.session.logout()
    }

    /// Cancel everything still running; the context is unusable afterwards
    pub fn teardown(&self) {
        self.scopes.shutdown();
        info!("Client context torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::User;
    use crate::storage::MemoryStore;

    fn context(storage: Arc<MemoryStore>) -> Arc<AppContext> {
        AppContext::with_storage(Config::default(), storage).unwrap()
    }

    #[test]
    fn test_context_restores_both_stores() {
        let storage = Arc::new(MemoryStore::new());
        {
            let ctx = context(storage.clone());
            ctx.session
                .set_auth(
                    User {
                        id: "u-1".to_string(),
                        email: "a@b.com".to_string(),
                        name: "A".to_string(),
                    },
                    "jwt-u-1",
                )
                .unwrap();
            ctx.switch_tenant("org-1").unwrap();
        }

        let ctx = context(storage);
        assert!(ctx.session.is_logged_in());
        assert_eq!(ctx.api.default_authorization().as_deref(), Some("Bearer jwt-u-1"));
        assert_eq!(ctx.tenants.selected_org_id().as_deref(), Some("org-1"));
    }

    #[test]
    fn test_initialize_persists_to_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = dir.path().join("state");

        let ctx = AppContext::initialize(config.clone()).unwrap();
        ctx.switch_tenant("org-9").unwrap();
        ctx.teardown();
        drop(ctx);

        assert!(dir.path().join("state").join("selected_org_id").exists());
        let restored = AppContext::initialize(config).unwrap();
        assert_eq!(restored.tenants.selected_org_id().as_deref(), Some("org-9"));
        assert!(!restored.session.is_logged_in());
    }

    #[test]
    fn test_switch_tenant_cancels_tenant_scope() {
        let ctx = context(Arc::new(MemoryStore::new()));
        let tenant_scope = ctx.scopes.tenant_scope();
        let session_scope = ctx.scopes.session_scope();

        ctx.switch_tenant("org-2").unwrap();

        assert!(tenant_scope.is_cancelled());
        assert!(!session_scope.is_cancelled());
    }

    #[test]
    fn test_logout_keeps_tenant_state() {
        let ctx = context(Arc::new(MemoryStore::new()));
        ctx.switch_tenant("org-1").unwrap();
        let session_scope = ctx.scopes.session_scope();

        ctx.logout().unwrap();

        assert!(session_scope.is_cancelled());
        assert!(!ctx.session.is_logged_in());
        assert_eq!(ctx.tenants.selected_org_id().as_deref(), Some("org-1"));
    }

    #[test]
    fn test_teardown_cancels_new_scopes() {
        let ctx = context(Arc::new(MemoryStore::new()));
        ctx.teardown();
        assert!(ctx.scopes.tenant_scope().is_cancelled());
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let mut config = Config::default();
        config.api.base_url = "not a url".to_string();
        let result = AppContext::with_storage(config, Arc::new(MemoryStore::new()));
        assert!(matches!(result, Err(ClientError::InvalidBaseUrl(_))));
    }
}
