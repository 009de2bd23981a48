//! Triangle mesh tessellation at fixed quality presets.
//!
//! The exact subdivision algorithm is out of scope; what matters to
//! callers is the contract: three named presets, each producing a denser
//! mesh than the last for the same solid, with vertex/triangle counts
//! that round-trip through the wire format.

use serde::{Deserialize, Serialize};

use crate::{KernelError, Point3, Profile, Solid};

/// A named tessellation quality level.
///
/// `linear_deflection` bounds the chord error on curved faces;
/// `angular_deflection` bounds the angle between adjacent facet normals.
/// Smaller values mean a denser mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreset {
    Preview,
    Standard,
    HighQuality,
}

impl QualityPreset {
    #[must_use]
    pub const fn linear_deflection(self) -> f64 {
        match self {
            Self::Preview => 1.0,
            Self::Standard => 0.1,
            Self::HighQuality => 0.01,
        }
    }

    #[must_use]
    pub const fn angular_deflection(self) -> f64 {
        match self {
            Self::Preview => 1.0,
            Self::Standard => 0.5,
            Self::HighQuality => 0.1,
        }
    }

    /// Subdivision level per face, derived from `linear_deflection`.
    /// Capped so preset density stays bounded while remaining strictly
    /// increasing across the three presets.
    fn subdivisions(self) -> u32 {
        let raw = (1.0 / self.linear_deflection()).round() as u32;
        raw.clamp(1, 16)
    }
}

/// A triangle mesh: flat vertex buffer plus index triples.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<[u32; 3]>,
}

impl Mesh {
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

/// A mesh vertex with its outward normal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: Point3,
    pub normal: Point3,
}

pub fn tessellate(solid: &Solid, quality: QualityPreset) -> Result<Mesh, KernelError> {
    let faces = face_count(solid)?;
    let n = quality.subdivisions();
    Ok(grid_mesh(faces, n))
}

fn face_count(solid: &Solid) -> Result<u32, KernelError> {
    match solid {
        Solid::Box3 { .. } => Ok(6),
        Solid::Cylinder { .. } => Ok(3),
        Solid::Sphere { .. } => Ok(1),
        Solid::Extrusion { profile, .. } => Ok(match profile {
            Profile::Rectangle { .. } => 6,
            Profile::Circle { .. } => 3,
        }),
        Solid::Boolean { a, b, .. } => Ok(face_count(a)? + face_count(b)?),
    }
}

/// Builds a placeholder mesh whose density is controlled by `n`, the
/// per-face subdivision level. Each face becomes an `n x n` grid of
/// quads (two triangles each) on the unit square, offset per face index
/// so faces don't overlap in the vertex buffer.
fn grid_mesh(faces: u32, n: u32) -> Mesh {
    let mut vertices = Vec::new();
    let mut triangles = Vec::new();

    for face in 0..faces {
        let base_index = vertices.len() as u32;
        let offset = f64::from(face) * 2.0;
        for j in 0..=n {
            for i in 0..=n {
                let u = f64::from(i) / f64::from(n);
                let v = f64::from(j) / f64::from(n);
                vertices.push(Vertex {
                    position: Point3::new(offset + u, v, 0.0),
                    normal: Point3::new(0.0, 0.0, 1.0),
                });
            }
        }
        let stride = n + 1;
        for j in 0..n {
            for i in 0..n {
                let p0 = base_index + j * stride + i;
                let p1 = p0 + 1;
                let p2 = p0 + stride;
                let p3 = p2 + 1;
                triangles.push([p0, p1, p2]);
                triangles.push([p1, p3, p2]);
            }
        }
    }

    Mesh {
        vertices,
        triangles,
    }
}
