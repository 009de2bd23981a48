//! Mass property and topology computation.
//!
//! Closed-form formulas for the three primitive kinds, exact to float
//! precision. Booleans and extrusions fall back to bounding-box overlap
//! arithmetic, which is exact for axis-aligned box operands and otherwise
//! an approximation — real B-Rep boolean mass properties are out of
//! scope here.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::{BooleanOp, KernelError, Point3, Profile, Solid};

/// A solid's computed physical and topological properties.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MassProperties {
    pub volume: f64,
    pub surface_area: f64,
    pub center_of_mass: Point3,
    pub bounding_box: BoundingBox,
    pub topology: TopologyCounts,
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3,
    pub max: Point3,
}

impl BoundingBox {
    fn union(self, other: Self) -> Self {
        Self {
            min: Point3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Point3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    fn intersect(self, other: Self) -> Option<Self> {
        let min = Point3::new(
            self.min.x.max(other.min.x),
            self.min.y.max(other.min.y),
            self.min.z.max(other.min.z),
        );
        let max = Point3::new(
            self.max.x.min(other.max.x),
            self.max.y.min(other.max.y),
            self.max.z.min(other.max.z),
        );
        if min.x < max.x && min.y < max.y && min.z < max.z {
            Some(Self { min, max })
        } else {
            None
        }
    }

    fn volume(self) -> f64 {
        (self.max.x - self.min.x).max(0.0)
            * (self.max.y - self.min.y).max(0.0)
            * (self.max.z - self.min.z).max(0.0)
    }

    fn center(self) -> Point3 {
        Point3::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
            (self.min.z + self.max.z) / 2.0,
        )
    }
}

/// Topological element counts for a solid's boundary representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyCounts {
    pub vertices: u32,
    pub edges: u32,
    pub faces: u32,
    pub shells: u32,
}

pub fn compute(solid: &Solid) -> Result<MassProperties, KernelError> {
    match solid {
        Solid::Box3 { min, max } => Ok(box_properties(*min, *max)),
        Solid::Cylinder {
            base_center,
            radius,
            height,
        } => Ok(cylinder_properties(*base_center, *radius, *height)),
        Solid::Sphere { center, radius } => Ok(sphere_properties(*center, *radius)),
        Solid::Extrusion {
            profile,
            distance,
            at,
        } => extrusion_properties(profile, *distance, *at),
        Solid::Boolean { op, a, b } => boolean_properties(*op, a, b),
    }
}

fn box_properties(min: Point3, max: Point3) -> MassProperties {
    let (dx, dy, dz) = (max.x - min.x, max.y - min.y, max.z - min.z);
    let bbox = BoundingBox { min, max };
    MassProperties {
        volume: dx * dy * dz,
        surface_area: 2.0 * (dx * dy + dy * dz + dz * dx),
        center_of_mass: bbox.center(),
        bounding_box: bbox,
        topology: TopologyCounts {
            vertices: 8,
            edges: 12,
            faces: 6,
            shells: 1,
        },
    }
}

fn cylinder_properties(base_center: Point3, radius: f64, height: f64) -> MassProperties {
    let volume = PI * radius * radius * height;
    let surface_area = 2.0 * PI * radius * height + 2.0 * PI * radius * radius;
    let center_of_mass = Point3::new(base_center.x, base_center.y, base_center.z + height / 2.0);
    let bounding_box = BoundingBox {
        min: Point3::new(base_center.x - radius, base_center.y - radius, base_center.z),
        max: Point3::new(
            base_center.x + radius,
            base_center.y + radius,
            base_center.z + height,
        ),
    };
    MassProperties {
        volume,
        surface_area,
        center_of_mass,
        bounding_box,
        topology: TopologyCounts {
            vertices: 0,
            edges: 2,
            faces: 3,
            shells: 1,
        },
    }
}

fn sphere_properties(center: Point3, radius: f64) -> MassProperties {
    let volume = 4.0 / 3.0 * PI * radius.powi(3);
    let surface_area = 4.0 * PI * radius * radius;
    let bounding_box = BoundingBox {
        min: Point3::new(center.x - radius, center.y - radius, center.z - radius),
        max: Point3::new(center.x + radius, center.y + radius, center.z + radius),
    };
    MassProperties {
        volume,
        surface_area,
        center_of_mass: center,
        bounding_box,
        topology: TopologyCounts {
            vertices: 0,
            edges: 0,
            faces: 1,
            shells: 1,
        },
    }
}

fn extrusion_properties(
    profile: &Profile,
    distance: f64,
    at: Point3,
) -> Result<MassProperties, KernelError> {
    match profile {
        Profile::Rectangle { width, height } => {
            let min = Point3::new(at.x - width / 2.0, at.y - height / 2.0, at.z);
            let max = Point3::new(at.x + width / 2.0, at.y + height / 2.0, at.z + distance);
            Ok(box_properties(min, max))
        }
        Profile::Circle { radius } => Ok(cylinder_properties(at, *radius, distance)),
    }
}

fn boolean_properties(op: BooleanOp, a: &Solid, b: &Solid) -> Result<MassProperties, KernelError> {
    let pa = compute(a)?;
    let pb = compute(b)?;
    let overlap = pa.bounding_box.intersect(pb.bounding_box);

    let (volume, bounding_box) = match op {
        BooleanOp::Union => {
            let overlap_volume = overlap.map_or(0.0, BoundingBox::volume);
            (
                (pa.volume + pb.volume - overlap_volume).max(0.0),
                pa.bounding_box.union(pb.bounding_box),
            )
        }
        BooleanOp::Subtract => {
            let overlap_volume = overlap.map_or(0.0, BoundingBox::volume);
            ((pa.volume - overlap_volume).max(0.0), pa.bounding_box)
        }
        BooleanOp::Intersect => {
            let Some(overlap_box) = overlap else {
                return Err(KernelError::PropertyComputationFailed {
                    detail: "intersection of disjoint solids has no volume".to_owned(),
                });
            };
            (overlap_box.volume(), overlap_box)
        }
    };

    // Surface area and topology for a boolean result cannot be derived
    // exactly from the operands' bounding boxes; report a bounding-box
    // based estimate rather than fabricate B-Rep arithmetic.
    let (dx, dy, dz) = (
        bounding_box.max.x - bounding_box.min.x,
        bounding_box.max.y - bounding_box.min.y,
        bounding_box.max.z - bounding_box.min.z,
    );
    let surface_area = 2.0 * (dx * dy + dy * dz + dz * dx);

    Ok(MassProperties {
        volume,
        surface_area,
        center_of_mass: bounding_box.center(),
        bounding_box,
        topology: TopologyCounts {
            vertices: pa.topology.vertices + pb.topology.vertices,
            edges: pa.topology.edges + pb.topology.edges,
            faces: pa.topology.faces + pb.topology.faces,
            shells: 1,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_box_volume_is_exact() {
        let props = box_properties(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 3.0, 4.0));
        assert!((props.volume - 24.0).abs() < 1e-9);
        assert!((props.surface_area - 52.0).abs() < 1e-9);
        assert_eq!(props.topology.vertices, 8);
    }

    #[test]
    fn sphere_volume_within_tolerance() {
        let props = sphere_properties(Point3::new(0.0, 0.0, 0.0), 1.0);
        let expected = 4.0 / 3.0 * PI;
        assert!((props.volume - expected).abs() / expected < 0.001);
    }

    #[test]
    fn cylinder_volume_within_tolerance() {
        let props = cylinder_properties(Point3::new(0.0, 0.0, 0.0), 2.0, 5.0);
        let expected = PI * 4.0 * 5.0;
        assert!((props.volume - expected).abs() / expected < 0.001);
    }

    #[test]
    fn disjoint_union_adds_volumes() {
        let a = Solid::Box3 {
            min: Point3::new(0.0, 0.0, 0.0),
            max: Point3::new(1.0, 1.0, 1.0),
        };
        let b = Solid::Box3 {
            min: Point3::new(10.0, 10.0, 10.0),
            max: Point3::new(11.0, 11.0, 11.0),
        };
        let props = boolean_properties(BooleanOp::Union, &a, &b).unwrap();
        assert!((props.volume - 2.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_intersect_errors() {
        let a = Solid::Box3 {
            min: Point3::new(0.0, 0.0, 0.0),
            max: Point3::new(1.0, 1.0, 1.0),
        };
        let b = Solid::Box3 {
            min: Point3::new(10.0, 10.0, 10.0),
            max: Point3::new(11.0, 11.0, 11.0),
        };
        assert!(boolean_properties(BooleanOp::Intersect, &a, &b).is_err());
    }

    #[test]
    fn overlapping_subtract_removes_overlap() {
        let a = Solid::Box3 {
            min: Point3::new(0.0, 0.0, 0.0),
            max: Point3::new(2.0, 2.0, 2.0),
        };
        let b = Solid::Box3 {
            min: Point3::new(1.0, 1.0, 1.0),
            max: Point3::new(3.0, 3.0, 3.0),
        };
        let props = boolean_properties(BooleanOp::Subtract, &a, &b).unwrap();
        assert!((props.volume - 7.0).abs() < 1e-9);
    }
}
