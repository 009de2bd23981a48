//! In-memory constraint graph: entities as nodes, constraints as edges
//! (§4.3). Built fresh from the store's current state per workspace
//! rather than maintained incrementally — cheap enough at this scale and
//! it keeps the graph from ever diverging from persisted truth.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::store::{Constraint, ConstraintType, Entity, EntityId, EntityProperties, Vec3};

/// Result of checking a candidate constraint against the existing graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictCheck {
    pub is_conflicting: bool,
    pub conflicting_constraint_id: Option<String>,
}

impl ConflictCheck {
    const NONE: Self = Self {
        is_conflicting: false,
        conflicting_constraint_id: None,
    };
}

/// A view over one workspace's entities and constraints.
pub struct ConstraintGraph {
    entities: HashMap<EntityId, Entity>,
    constraints: Vec<Constraint>,
}

impl ConstraintGraph {
    #[must_use]
    pub fn build(entities: Vec<Entity>, constraints: Vec<Constraint>) -> Self {
        let entities = entities.into_iter().map(|e| (e.entity_id.clone(), e)).collect();
        Self {
            entities,
            constraints,
        }
    }

    /// §4.3 question 1: does `candidate` conflict with an existing
    /// constraint on the same entity set?
    #[must_use]
    pub fn check_conflict(&self, candidate: &Constraint) -> ConflictCheck {
        for existing in &self.constraints {
            if existing.constraint_id == candidate.constraint_id {
                continue;
            }
            if !same_entity_set(&existing.entity_ids, &candidate.entity_ids) {
                continue;
            }
            if existing
                .constraint_type
                .contradicts_by_type(candidate.constraint_type)
            {
                return conflict(existing);
            }
            if existing.constraint_type == candidate.constraint_type {
                match existing.constraint_type {
                    ConstraintType::Distance => {
                        if differs(
                            existing.parameters.target_distance,
                            candidate.parameters.target_distance,
                            existing.tolerance,
                        ) {
                            return conflict(existing);
                        }
                    }
                    ConstraintType::Angle => {
                        if differs(
                            existing.parameters.target_angle,
                            candidate.parameters.target_angle,
                            existing.tolerance,
                        ) {
                            return conflict(existing);
                        }
                    }
                    _ => {}
                }
            }
        }
        ConflictCheck::NONE
    }

    /// §4.3 question 2: the residual for a single constraint, given the
    /// current entity state.
    pub fn residual(&self, constraint: &Constraint) -> Result<f64, CoreError> {
        let entities = self.resolve_entities(constraint)?;
        match constraint.constraint_type {
            ConstraintType::Parallel => {
                let (d1, d2) = (direction_of(entities[0])?, direction_of(entities[1])?);
                Ok(d1.cross(d2).length())
            }
            ConstraintType::Perpendicular => {
                let (d1, d2) = (direction_of(entities[0])?, direction_of(entities[1])?);
                Ok(d1.dot(d2).abs())
            }
            ConstraintType::Coincident => {
                let (p1, p2) = (point_of(entities[0])?, point_of(entities[1])?);
                Ok(p1.sub(p2).length())
            }
            ConstraintType::Distance => {
                let (p1, p2) = (anchor_of(entities[0])?, anchor_of(entities[1])?);
                let target = constraint.parameters.target_distance.unwrap_or(0.0);
                Ok((p1.sub(p2).length() - target).abs())
            }
            ConstraintType::Angle => {
                let (d1, d2) = (direction_of(entities[0])?, direction_of(entities[1])?);
                let cos_theta = (d1.dot(d2) / (d1.length() * d2.length())).clamp(-1.0, 1.0);
                let target = constraint.parameters.target_angle.unwrap_or(0.0);
                Ok((cos_theta.acos() - target).abs())
            }
            ConstraintType::Tangent => {
                let (line, circle) = (entities[0], entities[1]);
                let (center, radius) = circle_of(circle)?;
                let dist = point_to_line_distance(center, line)?;
                Ok((dist - radius).abs())
            }
            ConstraintType::Radius => {
                let (_, radius) = circle_of(entities[0])?;
                let target = constraint.parameters.target_radius.unwrap_or(0.0);
                Ok((radius - target).abs())
            }
        }
    }

    /// §4.3 question 3: remaining degrees of freedom across all entities
    /// in the graph, after subtracting one DOF per constraint
    /// (simplified accounting).
    #[must_use]
    pub fn degrees_of_freedom_remaining(&self) -> u32 {
        let total: u32 = self.entities.values().map(|e| e.entity_type().dof()).sum();
        let constrained = self.constraints.len() as u32;
        total.saturating_sub(constrained)
    }

    fn resolve_entities(&self, constraint: &Constraint) -> Result<Vec<&Entity>, CoreError> {
        constraint
            .entity_ids
            .iter()
            .map(|id| {
                self.entities.get(id).ok_or_else(|| CoreError::EntityNotFound {
                    entity_id: id.clone(),
                    workspace_id: constraint.workspace_id.clone(),
                })
            })
            .collect()
    }
}

fn conflict(existing: &Constraint) -> ConflictCheck {
    ConflictCheck {
        is_conflicting: true,
        conflicting_constraint_id: Some(existing.constraint_id.clone()),
    }
}

fn differs(a: Option<f64>, b: Option<f64>, tolerance: f64) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).abs() > tolerance,
        _ => false,
    }
}

fn same_entity_set(a: &[EntityId], b: &[EntityId]) -> bool {
    a.len() == b.len() && a.iter().all(|id| b.contains(id))
}

fn direction_of(entity: &Entity) -> Result<Vec3, CoreError> {
    match &entity.properties {
        EntityProperties::Line { direction_vector, .. } => Ok(*direction_vector),
        _ => Err(CoreError::InvalidConstraint {
            reason: format!("entity '{}' is not a line", entity.entity_id),
        }),
    }
}

fn point_of(entity: &Entity) -> Result<Vec3, CoreError> {
    match &entity.properties {
        EntityProperties::Point { coordinates } => Ok(*coordinates),
        _ => Err(CoreError::InvalidConstraint {
            reason: format!("entity '{}' is not a point", entity.entity_id),
        }),
    }
}

/// The anchor position used for a distance constraint: a point's
/// coordinates, or a line's midpoint.
fn anchor_of(entity: &Entity) -> Result<Vec3, CoreError> {
    match &entity.properties {
        EntityProperties::Point { coordinates } => Ok(*coordinates),
        EntityProperties::Line { start, end, .. } => Ok(Vec3::new(
            (start.x + end.x) / 2.0,
            (start.y + end.y) / 2.0,
            (start.z + end.z) / 2.0,
        )),
        _ => Err(CoreError::InvalidConstraint {
            reason: format!("entity '{}' has no anchor position", entity.entity_id),
        }),
    }
}

fn circle_of(entity: &Entity) -> Result<(Vec3, f64), CoreError> {
    match &entity.properties {
        EntityProperties::Circle { center, radius, .. } => Ok((*center, *radius)),
        _ => Err(CoreError::InvalidConstraint {
            reason: format!("entity '{}' is not a circle", entity.entity_id),
        }),
    }
}

fn point_to_line_distance(point: Vec3, line: &Entity) -> Result<f64, CoreError> {
    let EntityProperties::Line { start, end, .. } = &line.properties else {
        return Err(CoreError::InvalidConstraint {
            reason: format!("entity '{}' is not a line", line.entity_id),
        });
    };
    let dir = end.sub(*start).normalized();
    let to_point = point.sub(*start);
    let projection_length = to_point.dot(dir);
    let closest = Vec3::new(
        start.x + dir.x * projection_length,
        start.y + dir.y * projection_length,
        start.z + dir.z * projection_length,
    );
    Ok(point.sub(closest).length())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BoundingBox, ConstraintParameters, SatisfactionStatus};

    fn line(id: &str, start: Vec3, end: Vec3) -> Entity {
        Entity {
            entity_id: id.to_owned(),
            workspace_id: "main".to_owned(),
            created_at: "now".to_owned(),
            modified_at: "now".to_owned(),
            created_by_agent: None,
            parent_entities: vec![],
            child_entities: vec![],
            properties: EntityProperties::line(start, end),
            bounding_box: BoundingBox { min: start, max: end },
            is_valid: true,
            validation_errors: vec![],
        }
    }

    fn perpendicular_constraint(a: &str, b: &str) -> Constraint {
        Constraint {
            constraint_id: "c1".to_owned(),
            constraint_type: ConstraintType::Perpendicular,
            workspace_id: "main".to_owned(),
            entity_ids: vec![a.to_owned(), b.to_owned()],
            parameters: ConstraintParameters::default(),
            satisfaction_status: SatisfactionStatus::Satisfied,
            degrees_of_freedom_removed: 1,
            tolerance: 1e-6,
            created_at: "now".to_owned(),
            created_by_agent: None,
        }
    }

    #[test]
    fn perpendicular_lines_have_near_zero_residual() {
        let l1 = line("main:line_1", Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0));
        let l2 = line("main:line_2", Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 10.0, 0.0));
        let constraint = perpendicular_constraint("main:line_1", "main:line_2");
        let graph = ConstraintGraph::build(vec![l1, l2], vec![constraint.clone()]);
        let residual = graph.residual(&constraint).unwrap();
        assert!(residual < 1e-6);
    }

    #[test]
    fn parallel_then_perpendicular_conflicts() {
        let l1 = line("main:line_1", Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0));
        let l2 = line("main:line_2", Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 10.0, 0.0));
        let existing = Constraint {
            constraint_type: ConstraintType::Parallel,
            ..perpendicular_constraint("main:line_1", "main:line_2")
        };
        let graph = ConstraintGraph::build(vec![l1, l2], vec![existing]);
        let candidate = Constraint {
            constraint_id: "c2".to_owned(),
            ..perpendicular_constraint("main:line_1", "main:line_2")
        };
        let check = graph.check_conflict(&candidate);
        assert!(check.is_conflicting);
        assert_eq!(check.conflicting_constraint_id.as_deref(), Some("c1"));
    }

    #[test]
    fn distinct_distance_targets_conflict() {
        let p1 = line("main:line_1", Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let p2 = line("main:line_2", Vec3::new(5.0, 0.0, 0.0), Vec3::new(6.0, 0.0, 0.0));
        let mut existing = perpendicular_constraint("main:line_1", "main:line_2");
        existing.constraint_type = ConstraintType::Distance;
        existing.parameters.target_distance = Some(5.0);
        let graph = ConstraintGraph::build(vec![p1, p2], vec![existing]);
        let mut candidate = perpendicular_constraint("main:line_1", "main:line_2");
        candidate.constraint_id = "c2".to_owned();
        candidate.constraint_type = ConstraintType::Distance;
        candidate.parameters.target_distance = Some(8.0);
        assert!(graph.check_conflict(&candidate).is_conflicting);
    }

    #[test]
    fn matching_distance_targets_do_not_conflict() {
        let p1 = line("main:line_1", Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let p2 = line("main:line_2", Vec3::new(5.0, 0.0, 0.0), Vec3::new(6.0, 0.0, 0.0));
        let mut existing = perpendicular_constraint("main:line_1", "main:line_2");
        existing.constraint_type = ConstraintType::Distance;
        existing.parameters.target_distance = Some(5.0);
        let graph = ConstraintGraph::build(vec![p1, p2], vec![existing]);
        let mut candidate = perpendicular_constraint("main:line_1", "main:line_2");
        candidate.constraint_id = "c2".to_owned();
        candidate.constraint_type = ConstraintType::Distance;
        candidate.parameters.target_distance = Some(5.0000001);
        assert!(!graph.check_conflict(&candidate).is_conflicting);
    }
}
