//! Parameter extraction and normalization (§4.6).
//!
//! A coordinate may arrive as a 2/3-element array or as `{x, y, z?}`;
//! both are normalized to a 3-element vector with `z` defaulting to 0.

use serde_json::Value;

use crate::error::CoreError;
use crate::store::Vec3;

/// A thin view over a request's `params` object, with typed accessors
/// that raise `CoreError::MissingParameter` / `InvalidParameter` the way
/// the dispatcher needs for its error-class mapping (§4.6 step 4).
pub struct Params<'a> {
    value: &'a Value,
}

impl<'a> Params<'a> {
    #[must_use]
    pub const fn new(value: &'a Value) -> Self {
        Self { value }
    }

    fn field(&self, name: &str) -> Option<&'a Value> {
        self.value.get(name)
    }

    pub fn required_str(&self, name: &str) -> Result<&'a str, CoreError> {
        self.field(name)
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::MissingParameter {
                field: name.to_owned(),
            })
    }

    #[must_use]
    pub fn optional_str(&self, name: &str) -> Option<&'a str> {
        self.field(name).and_then(Value::as_str)
    }

    pub fn required_f64(&self, name: &str) -> Result<f64, CoreError> {
        self.field(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| CoreError::MissingParameter {
                field: name.to_owned(),
            })
    }

    #[must_use]
    pub fn optional_f64(&self, name: &str) -> Option<f64> {
        self.field(name).and_then(Value::as_f64)
    }

    #[must_use]
    pub fn optional_u64(&self, name: &str) -> Option<u64> {
        self.field(name).and_then(Value::as_u64)
    }

    pub fn required_str_array(&self, name: &str) -> Result<Vec<String>, CoreError> {
        let array = self
            .field(name)
            .and_then(Value::as_array)
            .ok_or_else(|| CoreError::MissingParameter {
                field: name.to_owned(),
            })?;
        array
            .iter()
            .map(|v| {
                v.as_str().map(str::to_owned).ok_or_else(|| CoreError::InvalidParameter {
                    field: name.to_owned(),
                    provided_value: v.to_string(),
                    reason: "expected an array of strings".to_owned(),
                })
            })
            .collect()
    }

    /// Like `required_str_array`, but returns `None` rather than an error
    /// when the field is absent (used where a caller may supply either an
    /// entity reference list or a standalone parameter set).
    pub fn optional_str_array(&self, name: &str) -> Result<Option<Vec<String>>, CoreError> {
        let Some(array) = self.field(name).and_then(Value::as_array) else {
            return Ok(None);
        };
        array
            .iter()
            .map(|v| {
                v.as_str().map(str::to_owned).ok_or_else(|| CoreError::InvalidParameter {
                    field: name.to_owned(),
                    provided_value: v.to_string(),
                    reason: "expected an array of strings".to_owned(),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Normalize a coordinate parameter, accepting either `[x, y]`,
    /// `[x, y, z]`, or `{x, y, z?}`.
    pub fn coordinates(&self, name: &str) -> Result<Vec3, CoreError> {
        let raw = self.field(name).ok_or_else(|| CoreError::MissingParameter {
            field: name.to_owned(),
        })?;
        normalize_coordinates(raw).ok_or_else(|| CoreError::InvalidParameter {
            field: name.to_owned(),
            provided_value: raw.to_string(),
            reason: "expected a 2 or 3 element array, or an {x, y, z?} object".to_owned(),
        })
    }
}

fn normalize_coordinates(value: &Value) -> Option<Vec3> {
    if let Some(array) = value.as_array() {
        if array.len() < 2 || array.len() > 3 {
            return None;
        }
        let x = array[0].as_f64()?;
        let y = array[1].as_f64()?;
        let z = array.get(2).and_then(Value::as_f64).unwrap_or(0.0);
        return Some(Vec3::new(x, y, z));
    }
    if let Some(object) = value.as_object() {
        let x = object.get("x")?.as_f64()?;
        let y = object.get("y")?.as_f64()?;
        let z = object.get("z").and_then(Value::as_f64).unwrap_or(0.0);
        return Some(Vec3::new(x, y, z));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_two_element_array() {
        let v = serde_json::json!([1.0, 2.0]);
        let coords = normalize_coordinates(&v).unwrap();
        assert!((coords.z - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn accepts_object_form() {
        let v = serde_json::json!({"x": 1.0, "y": 2.0, "z": 3.0});
        let coords = normalize_coordinates(&v).unwrap();
        assert!((coords.z - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_wrong_length_array() {
        let v = serde_json::json!([1.0]);
        assert!(normalize_coordinates(&v).is_none());
    }

    #[test]
    fn missing_required_field_errors() {
        let v = serde_json::json!({});
        let params = Params::new(&v);
        assert!(matches!(
            params.required_str("workspace"),
            Err(CoreError::MissingParameter { .. })
        ));
    }
}
