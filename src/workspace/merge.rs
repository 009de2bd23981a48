//! The git-like fork/merge protocol across workspaces (§4.8).

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::CoreError;
use crate::store::{AgentId, BranchStatus, Entity, Store, WorkspaceType};

/// A single merge conflict record, journaled for audit (§4.8).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub entity_id: String,
    pub conflict_type: String,
    pub source_workspace: String,
    pub target_workspace: String,
}

/// Outcome of a merge attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeResult {
    Success,
    HasConflicts,
}

/// Full merge report returned to the caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MergeReport {
    pub merge_result: MergeResult,
    pub entities_added: usize,
    pub conflicts: Vec<Conflict>,
}

/// A conflict resolution strategy (§4.8).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ResolutionStrategy {
    KeepSource,
    KeepTarget,
    ManualMerge { merged_properties: serde_json::Value },
}

/// §4.8 Fork: allocate a new branch workspace referencing `base`,
/// starting empty.
#[instrument(skip(store), fields(base_workspace_id = %base_workspace_id, owning_agent_id = %owning_agent_id))]
pub fn fork(
    store: &Store,
    name: String,
    base_workspace_id: &str,
    owning_agent_id: AgentId,
) -> Result<crate::store::Workspace, CoreError> {
    store.workspace_get(base_workspace_id)?;
    store.workspace_create(
        name,
        WorkspaceType::AgentBranch,
        Some(base_workspace_id.to_owned()),
        Some(owning_agent_id),
    )
}

/// §4.8 Merge: copy every entity from `source` into `target`, minting a
/// target-side id and recording a conflict for any id collision.
#[instrument(skip(store), fields(source_id = %source_id, target_id = %target_id))]
pub fn merge(store: &Store, source_id: &str, target_id: &str) -> Result<MergeReport, CoreError> {
    let source = store.workspace_get(source_id)?;
    store.workspace_get(target_id)?;

    if !source.can_merge() {
        return Err(CoreError::WorkspaceConflict {
            workspace_id: source_id.to_owned(),
            reason: format!(
                "source branch status is {:?}; only clean or modified branches can merge",
                source.branch_status
            ),
        });
    }

    let source_entities = store.entity_list(source_id, None, usize::MAX, 0).items;
    let mut conflicts = Vec::new();
    let mut entities_added = 0usize;

    for entity in source_entities {
        let target_entity_id = mint_target_id(&entity.entity_id, target_id);
        if store.entity_get(&target_entity_id).is_ok() {
            conflicts.push(Conflict {
                entity_id: target_entity_id,
                conflict_type: "entity_exists".to_owned(),
                source_workspace: source_id.to_owned(),
                target_workspace: target_id.to_owned(),
            });
            continue;
        }
        let mut copy = entity.clone();
        copy.entity_id = target_entity_id;
        copy.workspace_id = target_id.to_owned();
        store.entity_create(copy)?;
        entities_added += 1;
    }

    let merge_result = if conflicts.is_empty() {
        MergeResult::Success
    } else {
        MergeResult::HasConflicts
    };

    store.workspace_update(source_id, |workspace| {
        workspace.branch_status = if conflicts.is_empty() {
            BranchStatus::Merged
        } else {
            BranchStatus::Conflicted
        };
    })?;

    Ok(MergeReport {
        merge_result,
        entities_added,
        conflicts,
    })
}

/// §4.8 Conflict resolution.
#[instrument(skip(store, strategy), fields(entity_id = %entity_id, source_id = %source_id))]
pub fn resolve_conflict(
    store: &Store,
    entity_id: &str,
    source_id: &str,
    // The conflicting entity already lives at `entity_id` in the target
    // workspace; this argument documents the caller's intent rather than
    // participating in the lookup.
    _target_id: &str,
    strategy: ResolutionStrategy,
) -> Result<Entity, CoreError> {
    let source_entity_id = mint_source_id(entity_id, source_id);
    match strategy {
        ResolutionStrategy::KeepSource => {
            let source_entity = store.entity_get(&source_entity_id)?;
            store.entity_update(entity_id, |target| {
                target.properties = source_entity.properties;
                target.bounding_box = source_entity.bounding_box;
                target.is_valid = source_entity.is_valid;
                target.validation_errors = source_entity.validation_errors;
            })
        }
        ResolutionStrategy::KeepTarget => store.entity_get(entity_id),
        ResolutionStrategy::ManualMerge { merged_properties } => {
            let properties = serde_json::from_value(merged_properties).map_err(|err| {
                CoreError::InvalidParameter {
                    field: "merged_properties".to_owned(),
                    provided_value: "<object>".to_owned(),
                    reason: err.to_string(),
                }
            })?;
            store.entity_update(entity_id, |target| {
                target.properties = properties;
            })
        }
    }
}

/// Mint a target-side id by taking the source suffix after the first
/// underscore and binding it to the target workspace prefix (§4.8 step 2).
fn mint_target_id(source_entity_id: &str, target_workspace_id: &str) -> String {
    let type_and_suffix = source_entity_id.split(':').next_back().unwrap_or(source_entity_id);
    format!("{target_workspace_id}:{type_and_suffix}")
}

/// Inverse of [`mint_target_id`], used to look up the source entity that
/// produced a given (already-merged-form) target id.
fn mint_source_id(target_entity_id: &str, source_workspace_id: &str) -> String {
    let type_and_suffix = target_entity_id.split(':').next_back().unwrap_or(target_entity_id);
    format!("{source_workspace_id}:{type_and_suffix}")
}
