//! Runtime values flowing through the corrective network.
//! All numeric components are f32.

use serde::{Deserialize, Serialize};

/// Lightweight kind enum for pattern matching and quick dispatch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Float,
    Vec3,
    Transform,
}

/// A transform split to TRS so individual channel families stay addressable.
/// Rotation is a quaternion (x, y, z, w).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Transform {
    pub pos: [f32; 3],
    pub rot: [f32; 4],
    pub scale: [f32; 3],
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            pos: [0.0, 0.0, 0.0],
            rot: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0, 1.0, 1.0],
        }
    }

    pub fn from_translation(pos: [f32; 3]) -> Self {
        Self {
            pos,
            ..Self::identity()
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    /// Scalar float (driver projections, weights)
    Float(f32),

    /// 3D vector (channel triples)
    Vec3([f32; 3]),

    /// TRS transform (driver frames, calibrated poses)
    Transform(Transform),
}

impl Value {
    /// Return the coarse kind of this value.
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Float(_) => ValueKind::Float,
            Value::Vec3(_) => ValueKind::Vec3,
            Value::Transform(_) => ValueKind::Transform,
        }
    }

    pub fn f(v: f32) -> Self {
        Value::Float(v)
    }

    pub fn vec3(x: f32, y: f32, z: f32) -> Self {
        Value::Vec3([x, y, z])
    }

    /// Coerce to a single float. Vectors yield their first component.
    pub fn as_float(&self) -> f32 {
        match self {
            Value::Float(f) => *f,
            Value::Vec3(v) => v[0],
            Value::Transform(t) => t.pos[0],
        }
    }

    /// Coerce to a vec3. Scalars broadcast to all components.
    pub fn as_vec3(&self) -> [f32; 3] {
        match self {
            Value::Vec3(v) => *v,
            Value::Float(f) => [*f, *f, *f],
            Value::Transform(t) => t.pos,
        }
    }

    /// Coerce to a transform, or identity when the value is not one.
    pub fn as_transform(&self) -> Transform {
        match self {
            Value::Transform(t) => *t,
            _ => Transform::identity(),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Float(0.0)
    }
}
