//! Data model types persisted by the store (§3).
//!
//! All identifiers are plain strings per the data model; the shapes below
//! are the wire/storage representation, not an in-memory working set —
//! the constraint graph and workspace manager build views over this data
//! rather than duplicating it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type WorkspaceId = String;
pub type EntityId = String;
pub type ConstraintId = String;
pub type OperationId = String;
pub type AgentId = String;

/// `workspace_type` (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceType {
    Main,
    AgentBranch,
}

/// `branch_status` (§3, driven by the branch/merge engine).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus {
    Clean,
    Modified,
    Conflicted,
    Merged,
}

/// A workspace record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Workspace {
    pub workspace_id: WorkspaceId,
    pub workspace_name: String,
    pub workspace_type: WorkspaceType,
    pub base_workspace_id: Option<WorkspaceId>,
    pub owning_agent_id: Option<AgentId>,
    pub created_at: String,
    pub entity_count: u64,
    pub operation_count: u64,
    pub branch_status: BranchStatus,
    pub divergence_point: Option<OperationId>,
}

impl Workspace {
    pub const MAIN_ID: &'static str = "main";

    #[must_use]
    pub fn main(created_at: String) -> Self {
        Self {
            workspace_id: Self::MAIN_ID.to_owned(),
            workspace_name: Self::MAIN_ID.to_owned(),
            workspace_type: WorkspaceType::Main,
            base_workspace_id: None,
            owning_agent_id: None,
            created_at,
            entity_count: 0,
            operation_count: 0,
            branch_status: BranchStatus::Clean,
            divergence_point: None,
        }
    }

    /// §4.5: a branch can be merged iff clean or modified.
    #[must_use]
    pub const fn can_merge(&self) -> bool {
        matches!(self.branch_status, BranchStatus::Clean | BranchStatus::Modified)
    }
}

/// `entity_type` (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Point,
    Line,
    Circle,
    Arc,
    Solid,
}

impl EntityType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Line => "line",
            Self::Circle => "circle",
            Self::Arc => "arc",
            Self::Solid => "solid",
        }
    }

    /// Degrees of freedom an entity of this type contributes in 2D
    /// sketches (§4.3, simplified accounting).
    #[must_use]
    pub const fn dof(self) -> u32 {
        match self {
            Self::Point => 2,
            Self::Line => 4,
            Self::Circle | Self::Arc | Self::Solid => 3,
        }
    }
}

/// A 3-vector, always normalized to 3D (point coordinates pad z=0).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[must_use]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    #[must_use]
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len <= f64::EPSILON {
            self
        } else {
            Self::new(self.x / len, self.y / len, self.z / len)
        }
    }
}

/// Type-specific entity properties (§3 property schemas per type).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "entity_type", rename_all = "snake_case")]
pub enum EntityProperties {
    Point {
        coordinates: Vec3,
    },
    Line {
        start: Vec3,
        end: Vec3,
        length: f64,
        direction_vector: Vec3,
    },
    Circle {
        center: Vec3,
        radius: f64,
        area: f64,
        circumference: f64,
    },
    Arc {
        center: Vec3,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        arc_length: f64,
    },
    Solid {
        volume: f64,
        surface_area: f64,
        center_of_mass: Vec3,
        topology: SolidTopology,
    },
}

impl EntityProperties {
    #[must_use]
    pub const fn entity_type(&self) -> EntityType {
        match self {
            Self::Point { .. } => EntityType::Point,
            Self::Line { .. } => EntityType::Line,
            Self::Circle { .. } => EntityType::Circle,
            Self::Arc { .. } => EntityType::Arc,
            Self::Solid { .. } => EntityType::Solid,
        }
    }

    #[must_use]
    pub fn line(start: Vec3, end: Vec3) -> Self {
        let direction_vector = end.sub(start);
        Self::Line {
            start,
            end,
            length: direction_vector.length(),
            direction_vector: direction_vector.normalized(),
        }
    }

    #[must_use]
    pub fn circle(center: Vec3, radius: f64) -> Self {
        Self::Circle {
            center,
            radius,
            area: std::f64::consts::PI * radius * radius,
            circumference: 2.0 * std::f64::consts::PI * radius,
        }
    }

    #[must_use]
    pub fn arc(center: Vec3, radius: f64, start_angle: f64, end_angle: f64) -> Self {
        let arc_length = radius * (end_angle - start_angle).abs();
        Self::Arc {
            center,
            radius,
            start_angle,
            end_angle,
            arc_length,
        }
    }
}

/// Nested `topology` record on solid entities.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolidTopology {
    pub face_count: u32,
    pub edge_count: u32,
    pub vertex_count: u32,
    pub is_closed: bool,
    pub is_manifold: bool,
}

/// Bounding box for the entity, two 3-vectors.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

/// A persisted geometric entity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: EntityId,
    pub workspace_id: WorkspaceId,
    pub created_at: String,
    pub modified_at: String,
    pub created_by_agent: Option<AgentId>,
    pub parent_entities: Vec<EntityId>,
    pub child_entities: Vec<EntityId>,
    pub properties: EntityProperties,
    pub bounding_box: BoundingBox,
    pub is_valid: bool,
    pub validation_errors: Vec<String>,
}

impl Entity {
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        self.properties.entity_type()
    }
}

/// `constraint_type` (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
    Parallel,
    Perpendicular,
    Coincident,
    Distance,
    Angle,
    Tangent,
    Radius,
}

impl ConstraintType {
    /// Required entity arity (1 or 2), per the constraint's kind.
    #[must_use]
    pub const fn required_entities(self) -> usize {
        match self {
            Self::Radius => 1,
            _ => 2,
        }
    }

    /// Whether two constraints of this and `other`'s kind on the same
    /// entity pair are logically contradictory by type alone (§4.3 case a).
    #[must_use]
    pub const fn contradicts_by_type(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::Parallel, Self::Perpendicular) | (Self::Perpendicular, Self::Parallel)
        )
    }

    #[must_use]
    pub const fn default_tolerance(self) -> f64 {
        match self {
            Self::Tangent => 1e-2,
            _ => 1e-6,
        }
    }
}

/// `satisfaction_status` (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SatisfactionStatus {
    Satisfied,
    Violated,
    Redundant,
}

/// Type-specific constraint parameters.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ConstraintParameters {
    pub target_distance: Option<f64>,
    pub target_angle: Option<f64>,
    pub target_radius: Option<f64>,
}

/// A persisted geometric constraint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Constraint {
    pub constraint_id: ConstraintId,
    pub constraint_type: ConstraintType,
    pub workspace_id: WorkspaceId,
    pub entity_ids: Vec<EntityId>,
    pub parameters: ConstraintParameters,
    pub satisfaction_status: SatisfactionStatus,
    pub degrees_of_freedom_removed: u32,
    pub tolerance: f64,
    pub created_at: String,
    pub created_by_agent: Option<AgentId>,
}

/// `result_status` (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Error,
    Warning,
}

/// A journaled operation (§3, the operation journal).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Operation {
    pub operation_id: OperationId,
    pub operation_type: String,
    pub workspace_id: WorkspaceId,
    pub agent_id: AgentId,
    pub timestamp: String,
    pub input_parameters: serde_json::Value,
    pub input_entities: Vec<EntityId>,
    pub output_entities: Vec<EntityId>,
    pub result_status: ResultStatus,
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
    pub execution_time_ms: f64,
    pub undo_data: serde_json::Value,
}

/// Opaque geometry shape blob, referenced by a solid entity via `shape_id`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeometryShape {
    pub shape_id: String,
    pub shape_type: String,
    pub blob: serde_json::Value,
}

/// Derived mass properties stored keyed by entity id (§4.1
/// `solid_properties_save`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolidProperties {
    pub entity_id: EntityId,
    pub volume: f64,
    pub surface_area: f64,
    pub center_of_mass: Vec3,
    pub topology: SolidTopology,
}

/// Per-agent aggregate metrics (§4.1 `agent_metrics`, §4.9 learning trend).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentMetricsReport {
    pub total_operations: u64,
    pub success_rate: f64,
    pub error_rate_first_10: f64,
    pub error_rate_last_10: f64,
    pub improvement_percent: f64,
}

/// Generic page of results plus a total count, for list operations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: usize,
}

pub type EntityMap = BTreeMap<EntityId, Entity>;
pub type ConstraintMap = BTreeMap<ConstraintId, Constraint>;
