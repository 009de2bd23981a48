//! Task decomposition and dependency resolution (§3 TaskAssignment,
//! §4.9 "Task decomposition" / "Dependency resolution").
//!
//! The decomposition table is an ordered match over goal substrings,
//! first match wins.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Blocked,
}

/// A single unit of work handed to an agent (§3 TaskAssignment).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub task_id: String,
    pub agent_id: Option<String>,
    pub description: String,
    pub required_operations: Vec<String>,
    pub dependencies: Vec<String>,
    pub success_criteria: String,
    pub status: TaskStatus,
    pub assigned_at: Option<String>,
    pub completed_at: Option<String>,
    pub result: Option<serde_json::Value>,
}

impl TaskAssignment {
    fn new(description: &str, required_operations: &[&str], success_criteria: &str) -> Self {
        Self {
            task_id: ids::short_hex("task"),
            agent_id: None,
            description: description.to_owned(),
            required_operations: required_operations.iter().map(|s| (*s).to_owned()).collect(),
            dependencies: Vec::new(),
            success_criteria: success_criteria.to_owned(),
            status: TaskStatus::Pending,
            assigned_at: None,
            completed_at: None,
            result: None,
        }
    }

    fn depends_on(mut self, dependency: &str) -> Self {
        self.dependencies.push(dependency.to_owned());
        self
    }
}

/// §4.9 `decompose_task`: rule-based pattern matching on the goal
/// string, tried in the order listed (first match wins).
#[must_use]
pub fn decompose_task(goal: &str) -> Vec<TaskAssignment> {
    let lower = goal.to_lowercase();

    if lower.contains("box") && lower.contains("lid") {
        let base = TaskAssignment::new(
            "Create the box base",
            &["solid.extrude"],
            "base solid exists with nonzero volume",
        );
        let lid = TaskAssignment::new(
            "Create the box lid",
            &["solid.extrude"],
            "lid solid exists with nonzero volume",
        );
        let integrate = TaskAssignment::new(
            "Integrate base and lid into one assembly",
            &["solid.boolean"],
            "combined solid is manifold and closed",
        )
        .depends_on(&base.task_id)
        .depends_on(&lid.task_id);
        return vec![base, lid, integrate];
    }

    if lower.contains("bracket") {
        let profile = TaskAssignment::new(
            "Create the bracket profile sketch",
            &["entity.create.line", "constraint.apply"],
            "profile is fully constrained",
        );
        let holes = TaskAssignment::new(
            "Add mounting holes to the profile",
            &["entity.create.circle"],
            "holes are positioned on the profile",
        )
        .depends_on(&profile.task_id);
        let extrude = TaskAssignment::new(
            "Extrude the bracket profile",
            &["solid.extrude"],
            "bracket solid is manifold and closed",
        )
        .depends_on(&profile.task_id);
        return vec![profile, holes, extrude];
    }

    if lower.contains("cylinder") || lower.contains("shaft") {
        let circle = TaskAssignment::new(
            "Create the base circle",
            &["entity.create.circle"],
            "circle entity exists with the requested radius",
        );
        let extrude = TaskAssignment::new(
            "Extrude the circle into a cylinder",
            &["solid.extrude"],
            "cylinder solid is manifold and closed",
        )
        .depends_on(&circle.task_id);
        return vec![circle, extrude];
    }

    if lower.contains("assembly") || lower.contains("create") {
        let first = TaskAssignment::new(
            "Create the first component",
            &["solid.extrude"],
            "first component solid exists",
        );
        let second = TaskAssignment::new(
            "Create the second component",
            &["solid.extrude"],
            "second component solid exists",
        );
        let integrate = TaskAssignment::new(
            "Integrate components into one assembly",
            &["solid.boolean"],
            "combined solid is manifold and closed",
        )
        .depends_on(&first.task_id)
        .depends_on(&second.task_id);
        return vec![first, second, integrate];
    }

    vec![TaskAssignment::new(
        goal,
        &[],
        "goal-specific completion criteria",
    )]
}

/// §4.9 `resolve_dependencies`: group tasks into sequential phases,
/// each phase holding every task whose dependencies are all satisfied
/// by prior phases.
pub fn resolve_dependencies(tasks: &[TaskAssignment]) -> Result<Vec<Vec<TaskAssignment>>, CoreError> {
    let mut remaining: Vec<TaskAssignment> = tasks.to_vec();
    let mut completed_ids = std::collections::HashSet::new();
    let mut phases = Vec::new();

    while !remaining.is_empty() {
        let (ready, not_ready): (Vec<_>, Vec<_>) = remaining
            .into_iter()
            .partition(|task| task.dependencies.iter().all(|dep| completed_ids.contains(dep)));

        if ready.is_empty() {
            let stuck: Vec<&str> = not_ready.iter().map(|t| t.task_id.as_str()).collect();
            return Err(CoreError::CircularDependency {
                detail: format!(
                    "tasks {:?} have unresolved or circular dependencies",
                    stuck
                ),
            });
        }

        for task in &ready {
            completed_ids.insert(task.task_id.clone());
        }
        phases.push(ready);
        remaining = not_ready;
    }

    Ok(phases)
}

/// §4.9 `assign_task`: every required operation must be in the role's
/// allowed set.
pub fn assign_task(task: &mut TaskAssignment, agent_id: &str, role: &super::roles::RoleTemplate) -> Result<(), CoreError> {
    let unsupported: Vec<&str> = task
        .required_operations
        .iter()
        .map(String::as_str)
        .filter(|op| !role.allowed_operations.contains(*op))
        .collect();
    if !unsupported.is_empty() {
        return Err(CoreError::RoleViolation {
            agent_id: agent_id.to_owned(),
            role_name: role.name.clone(),
            operation: unsupported.join(", "),
        });
    }
    task.agent_id = Some(agent_id.to_owned());
    task.assigned_at = Some(crate::time::now_iso8601());
    task.status = TaskStatus::InProgress;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::roles::RoleTemplate;

    #[test]
    fn box_and_lid_produces_three_tasks_with_integrate_depending_on_both() {
        let tasks = decompose_task("Build a box with a lid");
        assert_eq!(tasks.len(), 3);
        let integrate = &tasks[2];
        assert_eq!(integrate.dependencies.len(), 2);
        assert!(integrate.dependencies.contains(&tasks[0].task_id));
        assert!(integrate.dependencies.contains(&tasks[1].task_id));
    }

    #[test]
    fn bracket_produces_three_tasks_depending_on_profile() {
        let tasks = decompose_task("Make a mounting bracket");
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[1].dependencies, vec![tasks[0].task_id.clone()]);
        assert_eq!(tasks[2].dependencies, vec![tasks[0].task_id.clone()]);
    }

    #[test]
    fn cylinder_or_shaft_produces_two_tasks() {
        assert_eq!(decompose_task("turn a shaft").len(), 2);
        assert_eq!(decompose_task("model a cylinder").len(), 2);
    }

    #[test]
    fn generic_fallback_produces_one_task() {
        let tasks = decompose_task("inspect the model");
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].dependencies.is_empty());
    }

    #[test]
    fn resolve_dependencies_orders_independent_tasks_in_one_phase() {
        let tasks = decompose_task("Build a box with a lid");
        let phases = resolve_dependencies(&tasks).unwrap();
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].len(), 2);
        assert_eq!(phases[1].len(), 1);
    }

    #[test]
    fn circular_dependency_is_rejected() {
        let mut a = TaskAssignment::new("a", &[], "x");
        let mut b = TaskAssignment::new("b", &[], "x");
        a.dependencies.push(b.task_id.clone());
        b.dependencies.push(a.task_id.clone());
        let result = resolve_dependencies(&[a, b]);
        assert!(matches!(result, Err(CoreError::CircularDependency { .. })));
    }

    #[test]
    fn assign_task_rejects_operation_outside_role() {
        let mut task = TaskAssignment::new("t", &["solid.boolean"], "x");
        let role = RoleTemplate {
            name: "drafter".to_owned(),
            description: "d".to_owned(),
            allowed_operations: ["entity.create.point".to_owned()].into_iter().collect(),
            forbidden_operations: Default::default(),
            example_tasks: vec![],
        };
        let result = assign_task(&mut task, "agent-1", &role);
        assert!(matches!(result, Err(CoreError::RoleViolation { .. })));
    }
}
