//! Geometry kernel adapter.
//!
//! [`GeometryBackend`] is the seam between cadkit's entity store and an
//! actual B-Rep engine. This crate ships [`AnalyticBackend`], a
//! deterministic in-process implementation that covers exactly the surface
//! the core crate needs — primitive validation, boolean composition, mass
//! properties accurate to the required tolerance for axis-aligned
//! primitives, and tessellation at three quality presets. It does not
//! attempt real B-Rep arithmetic or a production tessellation algorithm;
//! those are out of scope here, same as upstream.

use serde::{Deserialize, Serialize};

mod mass;
mod tessellate;
mod validate;

pub use mass::MassProperties;
pub use tessellate::{Mesh, QualityPreset, Vertex};

/// Errors the geometry backend can return.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// A primitive or profile failed a bounds/degeneracy check.
    #[error("invalid geometry: {reason}")]
    InvalidGeometry { reason: String },

    /// A boolean or extrude operation could not be completed.
    #[error("operation failed: {detail}")]
    OperationFailed { detail: String },

    /// Tessellation could not produce a mesh for this solid/preset.
    #[error("tessellation failed: {detail}")]
    TessellationFailed { detail: String },

    /// The solid could not be serialized to/from its wire representation.
    #[error("serialization failed: {detail}")]
    SerializationFailed { detail: String },

    /// Mass property computation failed (degenerate or unbounded solid).
    #[error("property computation failed: {detail}")]
    PropertyComputationFailed { detail: String },
}

/// Bound on any coordinate value a primitive may use.
pub const COORDINATE_BOUND: f64 = 1.0e6;

/// Minimum length/radius a primitive may have, above float noise.
pub const MIN_DIMENSION: f64 = 1.0e-9;

/// A point in 3D space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn is_in_bounds(self) -> bool {
        [self.x, self.y, self.z]
            .iter()
            .all(|v| v.is_finite() && v.abs() <= COORDINATE_BOUND)
    }
}

/// A 2D profile used by extrusion, defined in the XY plane.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Profile {
    Rectangle { width: f64, height: f64 },
    Circle { radius: f64 },
}

/// Boolean composition operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BooleanOp {
    Union,
    Subtract,
    Intersect,
}

/// A solid in the kernel's internal representation: either a primitive or
/// a composition of solids via extrusion/boolean.
///
/// This tree is the kernel's only notion of "geometry"; the core crate
/// stores the serialized form of it on an `Entity` and never inspects it
/// directly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Solid {
    /// Axis-aligned box given by opposite corners.
    Box3 { min: Point3, max: Point3 },
    /// Right circular cylinder, axis along +Z from `base_center`.
    Cylinder {
        base_center: Point3,
        radius: f64,
        height: f64,
    },
    /// Sphere.
    Sphere { center: Point3, radius: f64 },
    /// Extrusion of a profile along +Z from the origin offset by `at`.
    Extrusion {
        profile: Profile,
        distance: f64,
        at: Point3,
    },
    /// Boolean composition of two solids.
    Boolean {
        op: BooleanOp,
        a: Box<Solid>,
        b: Box<Solid>,
    },
}

/// Trait a geometry engine must implement to back cadkit's entity store.
///
/// Exists so the core crate can be tested and operated against
/// [`AnalyticBackend`] without ever linking a real B-Rep kernel; a
/// production deployment swaps in a different implementation behind the
/// same seam.
pub trait GeometryBackend: Send + Sync {
    /// Validate a primitive's parameters before it is admitted to the store.
    fn validate(&self, solid: &Solid) -> Result<(), KernelError>;

    /// Extrude `profile` by `distance` starting at `at`.
    fn extrude(&self, profile: Profile, distance: f64, at: Point3) -> Result<Solid, KernelError>;

    /// Combine two solids with a boolean operator.
    fn boolean(&self, op: BooleanOp, a: Solid, b: Solid) -> Result<Solid, KernelError>;

    /// Compute mass properties (volume, surface area, center of mass,
    /// bounding box, topology counts) for a solid.
    fn mass_properties(&self, solid: &Solid) -> Result<MassProperties, KernelError>;

    /// Tessellate a solid into a triangle mesh at the given quality.
    fn tessellate(&self, solid: &Solid, quality: QualityPreset) -> Result<Mesh, KernelError>;
}

/// Deterministic, dependency-free reference backend.
///
/// Mass properties use closed-form formulas for the three primitive kinds
/// and are therefore exact (to float precision) for axis-aligned
/// primitives. Boolean results fall back to an AABB-overlap approximation,
/// which is exact only when both operands are axis-aligned boxes.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnalyticBackend;

impl GeometryBackend for AnalyticBackend {
    fn validate(&self, solid: &Solid) -> Result<(), KernelError> {
        validate::validate_solid(solid)
    }

    fn extrude(&self, profile: Profile, distance: f64, at: Point3) -> Result<Solid, KernelError> {
        if !at.is_in_bounds() {
            return Err(KernelError::InvalidGeometry {
                reason: "extrusion origin out of bounds".to_owned(),
            });
        }
        if !(distance.is_finite() && distance > MIN_DIMENSION) {
            return Err(KernelError::InvalidGeometry {
                reason: format!("extrusion distance {distance} must be positive and finite"),
            });
        }
        let solid = Solid::Extrusion {
            profile,
            distance,
            at,
        };
        self.validate(&solid)?;
        Ok(solid)
    }

    fn boolean(&self, op: BooleanOp, a: Solid, b: Solid) -> Result<Solid, KernelError> {
        self.validate(&a)?;
        self.validate(&b)?;
        Ok(Solid::Boolean {
            op,
            a: Box::new(a),
            b: Box::new(b),
        })
    }

    fn mass_properties(&self, solid: &Solid) -> Result<MassProperties, KernelError> {
        mass::compute(solid)
    }

    fn tessellate(&self, solid: &Solid, quality: QualityPreset) -> Result<Mesh, KernelError> {
        tessellate::tessellate(solid, quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extrude_rejects_non_positive_distance() {
        let backend = AnalyticBackend;
        let err = backend
            .extrude(Profile::Circle { radius: 1.0 }, 0.0, Point3::new(0.0, 0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, KernelError::InvalidGeometry { .. }));
    }

    #[test]
    fn boolean_validates_both_operands() {
        let backend = AnalyticBackend;
        let good = Solid::Sphere {
            center: Point3::new(0.0, 0.0, 0.0),
            radius: 1.0,
        };
        let bad = Solid::Sphere {
            center: Point3::new(0.0, 0.0, 0.0),
            radius: -1.0,
        };
        let err = backend
            .boolean(BooleanOp::Union, good, bad)
            .unwrap_err();
        assert!(matches!(err, KernelError::InvalidGeometry { .. }));
    }
}
