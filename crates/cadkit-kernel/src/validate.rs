//! Primitive validation: bounds and degeneracy checks shared by every
//! entry point that admits a [`Solid`] into the kernel.

use crate::{KernelError, Solid, COORDINATE_BOUND, MIN_DIMENSION};

pub fn validate_solid(solid: &Solid) -> Result<(), KernelError> {
    match solid {
        Solid::Box3 { min, max } => validate_box(min, max),
        Solid::Cylinder {
            base_center,
            radius,
            height,
        } => validate_cylinder(base_center, *radius, *height),
        Solid::Sphere { center, radius } => validate_sphere(center, *radius),
        Solid::Extrusion {
            profile,
            distance,
            at,
        } => {
            if !at.is_in_bounds() {
                return Err(out_of_bounds("extrusion origin"));
            }
            if !(distance.is_finite() && *distance > MIN_DIMENSION) {
                return Err(degenerate("extrusion distance", *distance));
            }
            validate_profile(profile)
        }
        Solid::Boolean { a, b, .. } => {
            validate_solid(a)?;
            validate_solid(b)
        }
    }
}

fn validate_profile(profile: &crate::Profile) -> Result<(), KernelError> {
    match profile {
        crate::Profile::Rectangle { width, height } => {
            if !(width.is_finite() && *width > MIN_DIMENSION) {
                return Err(degenerate("rectangle width", *width));
            }
            if !(height.is_finite() && *height > MIN_DIMENSION) {
                return Err(degenerate("rectangle height", *height));
            }
            Ok(())
        }
        crate::Profile::Circle { radius } => {
            if !(radius.is_finite() && *radius > MIN_DIMENSION && *radius <= COORDINATE_BOUND) {
                return Err(degenerate("circle radius", *radius));
            }
            Ok(())
        }
    }
}

fn validate_box(min: &crate::Point3, max: &crate::Point3) -> Result<(), KernelError> {
    if !min.is_in_bounds() || !max.is_in_bounds() {
        return Err(out_of_bounds("box corner"));
    }
    let (dx, dy, dz) = (max.x - min.x, max.y - min.y, max.z - min.z);
    for (label, d) in [("x", dx), ("y", dy), ("z", dz)] {
        if !(d.is_finite() && d > MIN_DIMENSION) {
            return Err(degenerate(&format!("box extent along {label}"), d));
        }
    }
    Ok(())
}

fn validate_cylinder(
    base_center: &crate::Point3,
    radius: f64,
    height: f64,
) -> Result<(), KernelError> {
    if !base_center.is_in_bounds() {
        return Err(out_of_bounds("cylinder base center"));
    }
    if !(radius.is_finite() && radius > MIN_DIMENSION && radius <= COORDINATE_BOUND) {
        return Err(degenerate("cylinder radius", radius));
    }
    if !(height.is_finite() && height > MIN_DIMENSION) {
        return Err(degenerate("cylinder height", height));
    }
    Ok(())
}

fn validate_sphere(center: &crate::Point3, radius: f64) -> Result<(), KernelError> {
    if !center.is_in_bounds() {
        return Err(out_of_bounds("sphere center"));
    }
    if !(radius.is_finite() && radius > MIN_DIMENSION && radius <= COORDINATE_BOUND) {
        return Err(degenerate("sphere radius", radius));
    }
    Ok(())
}

fn out_of_bounds(what: &str) -> KernelError {
    KernelError::InvalidGeometry {
        reason: format!("{what} is outside the allowed range [-{COORDINATE_BOUND}, {COORDINATE_BOUND}]"),
    }
}

fn degenerate(what: &str, value: f64) -> KernelError {
    KernelError::InvalidGeometry {
        reason: format!("{what} {value} must be finite and greater than {MIN_DIMENSION}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point3;

    #[test]
    fn zero_radius_sphere_is_rejected() {
        let err = validate_sphere(&Point3::new(0.0, 0.0, 0.0), 0.0).unwrap_err();
        assert!(matches!(err, KernelError::InvalidGeometry { .. }));
    }

    #[test]
    fn radius_over_bound_is_rejected() {
        let err = validate_sphere(&Point3::new(0.0, 0.0, 0.0), COORDINATE_BOUND + 1.0).unwrap_err();
        assert!(matches!(err, KernelError::InvalidGeometry { .. }));
    }

    #[test]
    fn degenerate_box_is_rejected() {
        let err = validate_box(&Point3::new(0.0, 0.0, 0.0), &Point3::new(0.0, 1.0, 1.0)).unwrap_err();
        assert!(matches!(err, KernelError::InvalidGeometry { .. }));
    }

    #[test]
    fn valid_box_passes() {
        assert!(validate_box(&Point3::new(0.0, 0.0, 0.0), &Point3::new(1.0, 1.0, 1.0)).is_ok());
    }
}
