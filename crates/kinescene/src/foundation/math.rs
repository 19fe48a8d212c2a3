//! Math utilities and types
//!
//! Thin aliases over nalgebra so the rest of the crate speaks in poses and
//! vectors rather than raw matrix types.

pub use nalgebra::{DMatrix, Isometry3, Translation3, UnitQuaternion, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// Rotation quaternion type
pub type Quat = UnitQuaternion<f32>;

/// Rigid transform (rotation + translation). Scale never appears in a pose.
pub type Pose = Isometry3<f32>;

/// Dense, dynamically sized matrix used for Jacobians and mass matrices
pub type Matrix = DMatrix<f32>;

/// Identity pose
pub fn identity() -> Pose {
    Pose::identity()
}

/// Pose with only a translation component
pub fn pose_from_position(position: Vec3) -> Pose {
    Pose::from_parts(Translation3::from(position), Quat::identity())
}

/// Pose from a translation and a rotation
pub fn pose_from_parts(position: Vec3, rotation: Quat) -> Pose {
    Pose::from_parts(Translation3::from(position), rotation)
}

/// Flatten a pose to `[px, py, pz, qw, qx, qy, qz]`
pub fn pose_to_array(pose: &Pose) -> [f32; 7] {
    let p = pose.translation.vector;
    let q = pose.rotation.quaternion();
    [p.x, p.y, p.z, q.w, q.i, q.j, q.k]
}

/// Inverse of [`pose_to_array`]. The quaternion is renormalized.
pub fn pose_from_array(data: &[f32; 7]) -> Pose {
    let position = Vec3::new(data[0], data[1], data[2]);
    let rotation = Quat::from_quaternion(nalgebra::Quaternion::new(
        data[3], data[4], data[5], data[6],
    ));
    pose_from_parts(position, rotation)
}
