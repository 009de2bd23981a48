//! The persistent store (§4.1): transactional record of workspaces,
//! entities, constraints, and the operation journal.
//!
//! This reference implementation keeps everything in memory behind a
//! single `RwLock` rather than per-row locking — correctness over
//! throughput. Every derived aggregate (workspace counts, agent metrics)
//! is recomputed from the journal rather than trusted as authoritative
//! state, per §4.1's "cached but not authoritative" rule.

pub mod types;

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::CoreError;
use crate::ids;
use crate::time::now_iso8601;

pub use types::{
    AgentId, AgentMetricsReport, BoundingBox, BranchStatus, Constraint, ConstraintId,
    ConstraintParameters, ConstraintType, Entity, EntityId, EntityProperties, EntityType,
    GeometryShape, Operation, OperationId, Page, ResultStatus, SatisfactionStatus,
    SolidProperties, SolidTopology, Vec3, Workspace, WorkspaceId, WorkspaceType,
};

#[derive(Default)]
struct StoreInner {
    workspaces: HashMap<WorkspaceId, Workspace>,
    entities: HashMap<EntityId, Entity>,
    constraints: HashMap<ConstraintId, Constraint>,
    operations: Vec<Operation>,
    shapes: HashMap<String, GeometryShape>,
    solid_properties: HashMap<EntityId, SolidProperties>,
}

/// The transactional store. Cheap to clone the handle (an `Arc` around
/// this is expected at the composition root); internal mutability is
/// behind a single lock.
pub struct Store {
    inner: RwLock<StoreInner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// A fresh store containing exactly the `main` workspace.
    #[must_use]
    pub fn new() -> Self {
        let main = Workspace::main(now_iso8601());
        let mut workspaces = HashMap::new();
        workspaces.insert(main.workspace_id.clone(), main);
        Self {
            inner: RwLock::new(StoreInner {
                workspaces,
                ..StoreInner::default()
            }),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // -- workspaces ---------------------------------------------------

    pub fn workspace_create(
        &self,
        workspace_name: String,
        workspace_type: WorkspaceType,
        base_workspace_id: Option<WorkspaceId>,
        owning_agent_id: Option<AgentId>,
    ) -> Result<Workspace, CoreError> {
        let workspace_id = match (&workspace_type, &owning_agent_id) {
            (WorkspaceType::AgentBranch, Some(agent)) => {
                ids::branch_workspace_id(agent, &workspace_name)
            }
            _ => workspace_name.clone(),
        };

        let mut guard = self.write();
        if guard.workspaces.contains_key(&workspace_id) {
            return Err(CoreError::WorkspaceConflict {
                workspace_id: workspace_id.clone(),
                reason: "a workspace with this id already exists".to_owned(),
            });
        }
        let workspace = Workspace {
            workspace_id: workspace_id.clone(),
            workspace_name,
            workspace_type,
            base_workspace_id,
            owning_agent_id,
            created_at: now_iso8601(),
            entity_count: 0,
            operation_count: 0,
            branch_status: BranchStatus::Clean,
            divergence_point: None,
        };
        guard.workspaces.insert(workspace_id, workspace.clone());
        Ok(workspace)
    }

    pub fn workspace_get(&self, workspace_id: &str) -> Result<Workspace, CoreError> {
        self.read()
            .workspaces
            .get(workspace_id)
            .cloned()
            .ok_or_else(|| CoreError::WorkspaceNotFound {
                workspace_id: workspace_id.to_owned(),
            })
    }

    #[must_use]
    pub fn workspace_list(&self) -> Vec<Workspace> {
        let mut list: Vec<_> = self.read().workspaces.values().cloned().collect();
        list.sort_by(|a, b| a.workspace_id.cmp(&b.workspace_id));
        list
    }

    pub fn workspace_update<F>(&self, workspace_id: &str, mutate: F) -> Result<Workspace, CoreError>
    where
        F: FnOnce(&mut Workspace),
    {
        let mut guard = self.write();
        let workspace =
            guard
                .workspaces
                .get_mut(workspace_id)
                .ok_or_else(|| CoreError::WorkspaceNotFound {
                    workspace_id: workspace_id.to_owned(),
                })?;
        mutate(workspace);
        Ok(workspace.clone())
    }

    pub fn workspace_delete(&self, workspace_id: &str) -> Result<(), CoreError> {
        if workspace_id == Workspace::MAIN_ID {
            return Err(CoreError::OperationInvalid {
                reason: "the main workspace cannot be deleted".to_owned(),
            });
        }
        let mut guard = self.write();
        if guard.workspaces.remove(workspace_id).is_none() {
            return Err(CoreError::WorkspaceNotFound {
                workspace_id: workspace_id.to_owned(),
            });
        }
        guard
            .entities
            .retain(|_, entity| entity.workspace_id != workspace_id);
        guard
            .constraints
            .retain(|_, constraint| constraint.workspace_id != workspace_id);
        guard
            .operations
            .retain(|operation| operation.workspace_id != workspace_id);
        Ok(())
    }

    // -- entities -------------------------------------------------------

    pub fn entity_create(&self, entity: Entity) -> Result<Entity, CoreError> {
        let mut guard = self.write();
        if !guard.workspaces.contains_key(&entity.workspace_id) {
            return Err(CoreError::WorkspaceNotFound {
                workspace_id: entity.workspace_id.clone(),
            });
        }
        for parent_id in &entity.parent_entities {
            if !guard.entities.contains_key(parent_id) {
                return Err(CoreError::EntityNotFound {
                    entity_id: parent_id.clone(),
                    workspace_id: entity.workspace_id.clone(),
                });
            }
        }
        let entity_id = entity.entity_id.clone();
        for parent_id in &entity.parent_entities {
            if let Some(parent) = guard.entities.get_mut(parent_id) {
                parent.child_entities.push(entity_id.clone());
            }
        }
        guard.entities.insert(entity_id, entity.clone());
        if let Some(workspace) = guard.workspaces.get_mut(&entity.workspace_id) {
            workspace.entity_count += 1;
        }
        Ok(entity)
    }

    pub fn entity_get(&self, entity_id: &str) -> Result<Entity, CoreError> {
        let guard = self.read();
        let entity = guard.entities.get(entity_id).ok_or_else(|| {
            let workspace_id = entity_id.split(':').next().unwrap_or(entity_id).to_owned();
            CoreError::EntityNotFound {
                entity_id: entity_id.to_owned(),
                workspace_id,
            }
        })?;
        Ok(entity.clone())
    }

    #[must_use]
    pub fn entity_list(
        &self,
        workspace_id: &str,
        entity_type: Option<EntityType>,
        limit: usize,
        offset: usize,
    ) -> Page<Entity> {
        let guard = self.read();
        let mut matching: Vec<_> = guard
            .entities
            .values()
            .filter(|e| e.workspace_id == workspace_id)
            .filter(|e| entity_type.is_none_or(|t| e.entity_type() == t))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        let total_count = matching.len();
        let items = matching.into_iter().skip(offset).take(limit).collect();
        Page { items, total_count }
    }

    pub fn entity_update<F>(&self, entity_id: &str, mutate: F) -> Result<Entity, CoreError>
    where
        F: FnOnce(&mut Entity),
    {
        let mut guard = self.write();
        let entity = guard.entities.get_mut(entity_id).ok_or_else(|| {
            CoreError::EntityNotFound {
                entity_id: entity_id.to_owned(),
                workspace_id: entity_id.split(':').next().unwrap_or(entity_id).to_owned(),
            }
        })?;
        mutate(entity);
        entity.modified_at = now_iso8601();
        Ok(entity.clone())
    }

    pub fn entity_delete(&self, entity_id: &str) -> Result<(), CoreError> {
        let mut guard = self.write();
        let entity = guard.entities.remove(entity_id).ok_or_else(|| {
            CoreError::EntityNotFound {
                entity_id: entity_id.to_owned(),
                workspace_id: entity_id.split(':').next().unwrap_or(entity_id).to_owned(),
            }
        })?;
        guard
            .constraints
            .retain(|_, constraint| !constraint.entity_ids.contains(&entity.entity_id));
        guard.solid_properties.remove(entity_id);
        if let Some(workspace) = guard.workspaces.get_mut(&entity.workspace_id) {
            workspace.entity_count = workspace.entity_count.saturating_sub(1);
        }
        Ok(())
    }

    // -- constraints ------------------------------------------------------

    pub fn constraint_create(&self, constraint: Constraint) -> Result<Constraint, CoreError> {
        let mut guard = self.write();
        for entity_id in &constraint.entity_ids {
            let entity = guard.entities.get(entity_id).ok_or_else(|| CoreError::EntityNotFound {
                entity_id: entity_id.clone(),
                workspace_id: constraint.workspace_id.clone(),
            })?;
            if entity.workspace_id != constraint.workspace_id {
                return Err(CoreError::InvalidConstraint {
                    reason: format!(
                        "entity '{entity_id}' belongs to a different workspace than the constraint"
                    ),
                });
            }
        }
        let constraint_id = constraint.constraint_id.clone();
        guard.constraints.insert(constraint_id, constraint.clone());
        Ok(constraint)
    }

    pub fn constraint_get(&self, constraint_id: &str) -> Result<Constraint, CoreError> {
        self.read()
            .constraints
            .get(constraint_id)
            .cloned()
            .ok_or_else(|| CoreError::InvalidConstraint {
                reason: format!("constraint '{constraint_id}' does not exist"),
            })
    }

    #[must_use]
    pub fn constraint_list(&self, workspace_id: &str) -> Vec<Constraint> {
        let mut list: Vec<_> = self
            .read()
            .constraints
            .values()
            .filter(|c| c.workspace_id == workspace_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.constraint_id.cmp(&b.constraint_id));
        list
    }

    pub fn constraint_update<F>(
        &self,
        constraint_id: &str,
        mutate: F,
    ) -> Result<Constraint, CoreError>
    where
        F: FnOnce(&mut Constraint),
    {
        let mut guard = self.write();
        let constraint =
            guard
                .constraints
                .get_mut(constraint_id)
                .ok_or_else(|| CoreError::InvalidConstraint {
                    reason: format!("constraint '{constraint_id}' does not exist"),
                })?;
        mutate(constraint);
        Ok(constraint.clone())
    }

    pub fn constraint_delete(&self, constraint_id: &str) -> Result<(), CoreError> {
        self.write()
            .constraints
            .remove(constraint_id)
            .map(|_| ())
            .ok_or_else(|| CoreError::InvalidConstraint {
                reason: format!("constraint '{constraint_id}' does not exist"),
            })
    }

    // -- operation journal ------------------------------------------------

    pub fn operation_log(&self, operation: Operation) -> Result<Operation, CoreError> {
        let mut guard = self.write();
        if !guard.workspaces.contains_key(&operation.workspace_id) {
            return Err(CoreError::WorkspaceNotFound {
                workspace_id: operation.workspace_id.clone(),
            });
        }
        if let Some(workspace) = guard.workspaces.get_mut(&operation.workspace_id) {
            workspace.operation_count += 1;
        }
        guard.operations.push(operation.clone());
        Ok(operation)
    }

    #[must_use]
    pub fn operation_list(&self, workspace_id: &str) -> Vec<Operation> {
        self.read()
            .operations
            .iter()
            .filter(|op| op.workspace_id == workspace_id)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn operations_by_agent(&self, agent_id: &str) -> Vec<Operation> {
        self.read()
            .operations
            .iter()
            .filter(|op| op.agent_id == agent_id)
            .cloned()
            .collect()
    }

    // -- geometry shapes and derived properties ---------------------------

    pub fn geometry_shape_save(&self, shape: GeometryShape) -> GeometryShape {
        let mut guard = self.write();
        guard.shapes.insert(shape.shape_id.clone(), shape.clone());
        shape
    }

    pub fn geometry_shape_get(&self, shape_id: &str) -> Result<GeometryShape, CoreError> {
        self.read()
            .shapes
            .get(shape_id)
            .cloned()
            .ok_or_else(|| CoreError::FileNotFound {
                path: shape_id.to_owned(),
            })
    }

    pub fn solid_properties_save(&self, properties: SolidProperties) -> SolidProperties {
        let mut guard = self.write();
        guard
            .solid_properties
            .insert(properties.entity_id.clone(), properties.clone());
        properties
    }

    #[must_use]
    pub fn solid_properties_get(&self, entity_id: &str) -> Option<SolidProperties> {
        self.read().solid_properties.get(entity_id).cloned()
    }

    // -- metrics -----------------------------------------------------------

    /// Derived entirely from the journal — never trusted as cached state
    /// (§4.1).
    #[must_use]
    pub fn agent_metrics(&self, agent_id: &str, workspace_id: Option<&str>) -> AgentMetricsReport {
        let operations: Vec<_> = self
            .read()
            .operations
            .iter()
            .filter(|op| op.agent_id == agent_id)
            .filter(|op| workspace_id.is_none_or(|w| op.workspace_id == w))
            .cloned()
            .collect();

        let total_operations = operations.len() as u64;
        if total_operations == 0 {
            return AgentMetricsReport::default();
        }

        let success_count = operations
            .iter()
            .filter(|op| op.result_status == ResultStatus::Success)
            .count();
        let success_rate = success_count as f64 / total_operations as f64;

        let error_rate = |slice: &[Operation]| -> f64 {
            if slice.is_empty() {
                return 0.0;
            }
            let errors = slice
                .iter()
                .filter(|op| op.result_status == ResultStatus::Error)
                .count();
            errors as f64 / slice.len() as f64
        };

        let first10: Vec<_> = operations.iter().take(10).cloned().collect();
        let last10: Vec<_> = operations
            .iter()
            .rev()
            .take(10)
            .rev()
            .cloned()
            .collect();
        let error_rate_first_10 = error_rate(&first10);
        let error_rate_last_10 = error_rate(&last10);

        let improvement_percent = if error_rate_first_10 == 0.0 {
            if error_rate_last_10 > 0.0 {
                -100.0
            } else {
                0.0
            }
        } else {
            (error_rate_first_10 - error_rate_last_10) / error_rate_first_10 * 100.0
        };

        AgentMetricsReport {
            total_operations,
            success_rate,
            error_rate_first_10,
            error_rate_last_10,
            improvement_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_point(workspace_id: &str) -> Entity {
        let entity_id = ids::entity_id(workspace_id, "point");
        Entity {
            entity_id,
            workspace_id: workspace_id.to_owned(),
            created_at: now_iso8601(),
            modified_at: now_iso8601(),
            created_by_agent: None,
            parent_entities: vec![],
            child_entities: vec![],
            properties: EntityProperties::Point {
                coordinates: Vec3::new(1.0, 2.0, 0.0),
            },
            bounding_box: BoundingBox {
                min: Vec3::new(1.0, 2.0, 0.0),
                max: Vec3::new(1.0, 2.0, 0.0),
            },
            is_valid: true,
            validation_errors: vec![],
        }
    }

    #[test]
    fn main_workspace_exists_and_is_indestructible() {
        let store = Store::new();
        assert!(store.workspace_get("main").is_ok());
        let err = store.workspace_delete("main").unwrap_err();
        assert!(matches!(err, CoreError::OperationInvalid { .. }));
    }

    #[test]
    fn entity_create_requires_existing_workspace() {
        let store = Store::new();
        let entity = sample_point("missing");
        let err = store.entity_create(entity).unwrap_err();
        assert!(matches!(err, CoreError::WorkspaceNotFound { .. }));
    }

    #[test]
    fn entity_create_bumps_workspace_count() {
        let store = Store::new();
        store.entity_create(sample_point("main")).unwrap();
        let workspace = store.workspace_get("main").unwrap();
        assert_eq!(workspace.entity_count, 1);
    }

    #[test]
    fn delete_workspace_cascades_entities() {
        let store = Store::new();
        let ws = store
            .workspace_create(
                "ws1".to_owned(),
                WorkspaceType::AgentBranch,
                Some("main".to_owned()),
                Some("agent-1".to_owned()),
            )
            .unwrap();
        let entity = sample_point(&ws.workspace_id);
        let entity_id = entity.entity_id.clone();
        store.entity_create(entity).unwrap();
        store.workspace_delete(&ws.workspace_id).unwrap();
        assert!(store.entity_get(&entity_id).is_err());
    }

    #[test]
    fn agent_metrics_on_empty_history_is_zero() {
        let store = Store::new();
        let report = store.agent_metrics("nobody", None);
        assert_eq!(report.total_operations, 0);
        assert!((report.success_rate - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn agent_metrics_improvement_percent_clamped() {
        let store = Store::new();
        for i in 0..12 {
            let status = if i < 10 {
                ResultStatus::Error
            } else {
                ResultStatus::Success
            };
            store
                .operation_log(Operation {
                    operation_id: ids::operation_id("main"),
                    operation_type: "entity.create.point".to_owned(),
                    workspace_id: "main".to_owned(),
                    agent_id: "agent-1".to_owned(),
                    timestamp: now_iso8601(),
                    input_parameters: serde_json::json!({}),
                    input_entities: vec![],
                    output_entities: vec![],
                    result_status: status,
                    error_code: None,
                    error_message: None,
                    execution_time_ms: 1.0,
                    undo_data: serde_json::json!({}),
                })
                .unwrap();
        }
        let report = store.agent_metrics("agent-1", None);
        assert_eq!(report.total_operations, 12);
        assert!(report.error_rate_first_10 > report.error_rate_last_10);
    }
}
