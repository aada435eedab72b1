//! Affine frames: position + orientation in one value
//!
//! A frame is a 4x4 homogeneous transform whose bottom row is implicitly
//! (0, 0, 0, 1). The 3x3 rotation columns are the frame's right, up and back
//! axes; `look` is the negated back axis.
//!
//! Frames are values. Every operation returns a new frame.

use std::fmt;
use std::ops::{Add, Mul, Sub};

use glam::{Mat3, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Relative rotations smaller than this (radians) are treated as no rotation
/// when interpolating.
const SLERP_ANGLE_EPSILON: f32 = 1.0e-6;

/// Position and orientation in 3D space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineFrame {
    /// Rotation part; columns are the right, up and back axes
    rotation: Mat3,
    /// Translation part
    translation: Vec3,
}

impl Default for AffineFrame {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AffineFrame {
    /// Origin, no rotation
    pub const IDENTITY: Self = Self {
        rotation: Mat3::IDENTITY,
        translation: Vec3::ZERO,
    };

    /// Frame at `position` with no rotation
    pub fn from_position(position: Vec3) -> Self {
        Self {
            rotation: Mat3::IDENTITY,
            translation: position,
        }
    }

    pub fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self::from_position(Vec3::new(x, y, z))
    }

    /// Build from a raw rotation matrix and translation. The rotation is not
    /// checked for orthonormality.
    pub fn from_rotation_translation(rotation: Mat3, translation: Vec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Frame at `position` rotated by a unit quaternion
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            rotation: Mat3::from_quat(rotation),
            translation: position,
        }
    }

    /// Build from the 12 components `x, y, z, r00, r01, r02, r10, r11, r12, r20, r21, r22`
    /// where `rIJ` is row I, column J of the rotation.
    pub fn from_components(c: [f32; 12]) -> Self {
        Self {
            rotation: Mat3::from_cols(
                Vec3::new(c[3], c[6], c[9]),
                Vec3::new(c[4], c[7], c[10]),
                Vec3::new(c[5], c[8], c[11]),
            ),
            translation: Vec3::new(c[0], c[1], c[2]),
        }
    }

    /// Frame at `eye` whose look axis points at `target`, with +Y as world up.
    ///
    /// When `target` is straight above or below `eye` the cross product
    /// vanishes and a fixed basis is used instead: look is set to +Y (target
    /// above) or -Y (target below). The fallback is not a continuous
    /// extension of the general case.
    pub fn look_at(eye: Vec3, target: Vec3) -> Self {
        let back = (eye - target).normalize_or_zero();
        let right = Vec3::Y.cross(back);

        let (right, up, back) = if right.length() == 0.0 {
            if back.y < 0.0 {
                (Vec3::NEG_Z, Vec3::X, Vec3::NEG_Y)
            } else {
                (Vec3::Z, Vec3::X, Vec3::Y)
            }
        } else {
            let right = right.normalize();
            (right, back.cross(right), back)
        };

        Self {
            rotation: Mat3::from_cols(right, up, back),
            translation: eye,
        }
    }

    /// Pure rotation of `angle` radians about `axis` (Rodrigues' formula
    /// applied to each basis vector). A zero-length axis yields identity.
    pub fn from_axis_angle(axis: Vec3, angle: f32) -> Self {
        let axis = axis.normalize_or_zero();
        if axis == Vec3::ZERO {
            return Self::IDENTITY;
        }
        Self {
            rotation: Mat3::from_cols(
                rotate_about(axis, Vec3::X, angle),
                rotate_about(axis, Vec3::Y, angle),
                rotate_about(axis, Vec3::Z, angle),
            ),
            translation: Vec3::ZERO,
        }
    }

    /// Composition `Rx * Ry * Rz`, so Z is applied to a vector first.
    pub fn from_euler_xyz(x: f32, y: f32, z: f32) -> Self {
        Self::from_axis_angle(Vec3::X, x)
            * Self::from_axis_angle(Vec3::Y, y)
            * Self::from_axis_angle(Vec3::Z, z)
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.translation
    }

    #[inline]
    pub fn rotation(&self) -> Mat3 {
        self.rotation
    }

    #[inline]
    pub fn right(&self) -> Vec3 {
        self.rotation.x_axis
    }

    #[inline]
    pub fn up(&self) -> Vec3 {
        self.rotation.y_axis
    }

    /// Forward direction (negated back axis)
    #[inline]
    pub fn look(&self) -> Vec3 {
        -self.rotation.z_axis
    }

    /// Same orientation, translation stripped
    pub fn rotation_only(&self) -> Self {
        Self {
            rotation: self.rotation,
            translation: Vec3::ZERO,
        }
    }

    /// The 12 components in `from_components` order
    pub fn components(&self) -> [f32; 12] {
        let r = |row: usize, col: usize| self.rotation.col(col)[row];
        let t = self.translation;
        [
            t.x,
            t.y,
            t.z,
            r(0, 0),
            r(0, 1),
            r(0, 2),
            r(1, 0),
            r(1, 1),
            r(1, 2),
            r(2, 0),
            r(2, 1),
            r(2, 2),
        ]
    }

    /// Homogeneous 4x4 form
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_cols(
            self.rotation.x_axis.extend(0.0),
            self.rotation.y_axis.extend(0.0),
            self.rotation.z_axis.extend(0.0),
            self.translation.extend(1.0),
        )
    }

    /// `self * other`: `other` expressed in this frame's local space
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// General 4x4 inverse of the homogeneous matrix.
    ///
    /// Does not assume an orthonormal rotation. A singular matrix (determinant
    /// exactly zero) is returned unchanged; callers must not treat that result
    /// as a meaningful inverse.
    pub fn inverse(&self) -> Self {
        let m = self.to_mat4();
        if m.determinant() == 0.0 {
            log::trace!("inverse of singular frame requested, returning input");
            return *self;
        }
        let inv = m.inverse();
        Self {
            rotation: Mat3::from_mat4(inv),
            translation: inv.w_axis.truncate(),
        }
    }

    /// Object space to world space for a point
    #[inline]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.translation
    }

    /// Object space to world space for a direction (translation ignored)
    #[inline]
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }

    /// Same as `compose`
    pub fn to_world(&self, other: &Self) -> Self {
        self.compose(other)
    }

    /// `inverse(self) * other`
    pub fn to_local(&self, other: &Self) -> Self {
        self.inverse().compose(other)
    }

    /// World space to object space for a point
    pub fn point_to_local(&self, point: Vec3) -> Vec3 {
        self.inverse().transform_point(point)
    }

    /// World space to object space for a direction
    pub fn vector_to_local(&self, vector: Vec3) -> Vec3 {
        self.rotation_only().inverse().transform_vector(vector)
    }

    /// Interpolate towards `goal`: the translation is lerped, the relative
    /// rotation is decomposed into axis + angle and a `t` fraction of it is
    /// applied.
    pub fn slerp(&self, goal: &Self, t: f32) -> Self {
        let relative = self.to_local(goal);
        let mut q = relative.to_quat();
        // Shortest arc
        if q.w < 0.0 {
            q = -q;
        }
        let (axis, angle) = q.to_axis_angle();
        let position = self.translation.lerp(goal.translation, t);

        if angle.abs() <= SLERP_ANGLE_EPSILON {
            return Self {
                rotation: self.rotation,
                translation: position,
            };
        }

        let rotated = self.compose(&Self::from_axis_angle(axis, angle * t));
        Self {
            rotation: rotated.rotation,
            translation: position,
        }
    }

    /// Rotation part as a unit quaternion
    pub fn to_quat(&self) -> Quat {
        Quat::from_mat3(&self.rotation)
    }

    /// Split into position and rotation for writing back to a host transform
    pub fn to_position_rotation(&self) -> (Vec3, Quat) {
        (self.translation, self.to_quat())
    }

    /// Approximate angles that rebuild this frame via `from_euler_xyz`
    pub fn to_euler_xyz(&self) -> (f32, f32, f32) {
        let r = |row: usize, col: usize| self.rotation.col(col)[row];
        let x = (-r(1, 2)).atan2(r(2, 2));
        let y = r(0, 2).clamp(-1.0, 1.0).asin();
        let z = (-r(0, 1)).atan2(r(0, 0));
        (x, y, z)
    }

    /// Component-wise comparison within `max_abs_diff`
    pub fn abs_diff_eq(&self, other: &Self, max_abs_diff: f32) -> bool {
        self.rotation.abs_diff_eq(other.rotation, max_abs_diff)
            && self.translation.abs_diff_eq(other.translation, max_abs_diff)
    }
}

/// Rodrigues' rotation of `v` about unit `axis`
fn rotate_about(axis: Vec3, v: Vec3, angle: f32) -> Vec3 {
    let (sin, cos) = angle.sin_cos();
    v * cos + axis * v.dot(axis) * (1.0 - cos) + axis.cross(v) * sin
}

impl Mul for AffineFrame {
    type Output = AffineFrame;

    fn mul(self, rhs: AffineFrame) -> AffineFrame {
        self.compose(&rhs)
    }
}

impl Mul<Vec3> for AffineFrame {
    type Output = Vec3;

    fn mul(self, rhs: Vec3) -> Vec3 {
        self.transform_point(rhs)
    }
}

/// Translate in world space
impl Add<Vec3> for AffineFrame {
    type Output = AffineFrame;

    fn add(self, rhs: Vec3) -> AffineFrame {
        Self {
            rotation: self.rotation,
            translation: self.translation + rhs,
        }
    }
}

impl Sub<Vec3> for AffineFrame {
    type Output = AffineFrame;

    fn sub(self, rhs: Vec3) -> AffineFrame {
        Self {
            rotation: self.rotation,
            translation: self.translation - rhs,
        }
    }
}

impl fmt::Display for AffineFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.components();
        for (i, v) in c.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        Ok(())
    }
}
