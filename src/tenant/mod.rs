//! Organization (tenant) list and current selection.
//!
//! Every mutation rewrites both persisted keys: the full organization list
//! and the selected id (removed when nothing is selected). Hydration reads the
//! two keys independently, so a restored selection may name an organization
//! that is not in the restored list. The selection is a soft reference:
//! [`TenantStore::selected_org`] resolves it lazily and yields `None` when it
//! dangles.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::storage::{KeyValueStore, StorageError, ORGS_KEY, SELECTED_ORG_KEY};

/// An organization the user can schedule messages under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    pub name: String,
    /// Local decoration only, never sent to the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub owner_user_id: String,
}

/// Snapshot of the tenant state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantState {
    pub orgs: Vec<Organization>,
    pub selected_org_id: Option<String>,
}

pub struct TenantStore {
    state: RwLock<TenantState>,
    storage: Arc<dyn KeyValueStore>,
}

impl TenantStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            state: RwLock::new(TenantState::default()),
            storage,
        }
    }

    /// Restore the list and selection from storage, without cross-checking them
    pub fn hydrate(storage: Arc<dyn KeyValueStore>) -> Result<Self, StorageError> {
        let orgs = match storage.get(ORGS_KEY)? {
            Some(raw) => match serde_json::from_str::<Vec<Organization>>(&raw) {
                Ok(orgs) => orgs,
                Err(e) => {
                    warn!(error = %e, "Ignoring unreadable stored organizations");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        let selected_org_id = storage.get(SELECTED_ORG_KEY)?.filter(|id| !id.is_empty());

        Ok(Self {
            state: RwLock::new(TenantState {
                orgs,
                selected_org_id,
            }),
            storage,
        })
    }

    /// Replace the full organization list
    pub fn set_orgs(&self, orgs: Vec<Organization>) -> Result<(), StorageError> {
        self.mutate(|state| state.orgs = orgs)
    }

    /// Append an organization and make it the current selection
    pub fn add_org(&self, org: Organization) -> Result<(), StorageError> {
        info!(org_id = %org.id, name = %org.name, "Added organization");
        self.mutate(|state| {
            state.selected_org_id = Some(org.id.clone());
            state.orgs.push(org);
        })
    }

    /// Select an organization by id; the id is not checked against the list.
    ///
    /// An empty id clears the selection.
    pub fn select_org(&self, org_id: impl Into<String>) -> Result<(), StorageError> {
        let org_id = org_id.into();
        info!(org_id = %org_id, "Selected organization");
        self.mutate(|state| state.selected_org_id = Some(org_id).filter(|id| !id.is_empty()))
    }

    /// Empty the list and drop the selection
    pub fn clear(&self) -> Result<(), StorageError> {
        self.mutate(|state| *state = TenantState::default())
    }

    /// Select the first organization when there is a list but no selection.
    ///
    /// Returns the id that was selected, if any.
    pub fn ensure_selection(&self) -> Result<Option<String>, StorageError> {
        let first = {
            let state = self.state.read();
            if state.selected_org_id.is_some() {
                return Ok(None);
            }
            match state.orgs.first() {
                Some(org) => org.id.clone(),
                None => return Ok(None),
            }
        };
        self.select_org(first.clone())?;
        Ok(Some(first))
    }

    pub fn snapshot(&self) -> TenantState {
        self.state.read().clone()
    }

    pub fn orgs(&self) -> Vec<Organization> {
        self.state.read().orgs.clone()
    }

    pub fn selected_org_id(&self) -> Option<String> {
        self.state.read().selected_org_id.clone()
    }

    /// Resolve the selection against the list
    pub fn selected_org(&self) -> Option<Organization> {
        let state = self.state.read();
        let id = state.selected_org_id.as_deref()?;
        state.orgs.iter().find(|org| org.id == id).cloned()
    }

    /// Apply a change and write the result through; memory is rolled back if the write fails
    fn mutate(&self, change: impl FnOnce(&mut TenantState)) -> Result<(), StorageError> {
        let mut state = self.state.write();
        let previous = state.clone();
        change(&mut state);
        if let Err(e) = self.persist(&state) {
            *state = previous;
            return Err(e);
        }
        Ok(())
    }

    fn persist(&self, state: &TenantState) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(&state.orgs).map_err(|source| StorageError::Encode {
            key: ORGS_KEY.to_string(),
            source,
        })?;
        self.storage.set(ORGS_KEY, &encoded)?;

        match state.selected_org_id.as_deref() {
            Some(id) if !id.is_empty() => self.storage.set(SELECTED_ORG_KEY, id),
            _ => self.storage.remove(SELECTED_ORG_KEY),
        }
    }
}
