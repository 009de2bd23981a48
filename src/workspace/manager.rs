//! Workspace lifecycle and short-name resolution (§4.5).

use std::sync::RwLock;

use crate::error::CoreError;
use crate::store::{Store, Workspace};

/// Tracks the in-memory active-workspace pointer over a [`Store`].
///
/// The manager does not own workspace data itself — that lives in the
/// store — it only adds short-name resolution and the active-workspace
/// cursor on top.
pub struct WorkspaceManager {
    active: RwLock<String>,
}

impl Default for WorkspaceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkspaceManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: RwLock::new(Workspace::MAIN_ID.to_owned()),
        }
    }

    /// Resolve `reference` to a canonical workspace id: try the literal
    /// id first; if that fails and `reference` has no `:`, retry against
    /// every workspace whose id ends with `:reference` (the short-name
    /// form, §4.5).
    pub fn resolve(&self, store: &Store, reference: &str) -> Result<Workspace, CoreError> {
        if let Ok(workspace) = store.workspace_get(reference) {
            return Ok(workspace);
        }
        if !reference.contains(':') {
            let suffix = format!(":{reference}");
            let matches: Vec<_> = store
                .workspace_list()
                .into_iter()
                .filter(|w| w.workspace_id.ends_with(&suffix))
                .collect();
            if let [single] = matches.as_slice() {
                return Ok(single.clone());
            }
        }
        Err(CoreError::WorkspaceNotFound {
            workspace_id: reference.to_owned(),
        })
    }

    /// Resolve an optional workspace reference, defaulting to the active
    /// workspace when `None`.
    pub fn resolve_or_active(
        &self,
        store: &Store,
        reference: Option<&str>,
    ) -> Result<Workspace, CoreError> {
        match reference {
            Some(reference) => self.resolve(store, reference),
            None => store.workspace_get(&self.active_id()),
        }
    }

    #[must_use]
    pub fn active_id(&self) -> String {
        self.active.read().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// Reject unknown ids (§4.5).
    pub fn set_active_workspace(&self, store: &Store, workspace_id: &str) -> Result<(), CoreError> {
        let workspace = self.resolve(store, workspace_id)?;
        *self.active.write().unwrap_or_else(std::sync::PoisonError::into_inner) = workspace.workspace_id;
        Ok(())
    }
}
