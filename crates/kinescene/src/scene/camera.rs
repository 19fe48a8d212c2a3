//! Render cameras that follow an actor

use crate::foundation::ids::ActorId;
use crate::foundation::math::Pose;
use crate::render::CameraHandle;

/// Image parameters of a mounted camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSpec {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Vertical field of view in radians
    pub fovy: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
}

impl Default for CameraSpec {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fovy: std::f32::consts::FRAC_PI_3,
            near: 0.1,
            far: 100.0,
        }
    }
}

/// A render camera whose pose follows an actor every render sync
#[derive(Debug, Clone)]
pub struct MountedCamera {
    pub(crate) name: String,
    pub(crate) camera: CameraHandle,
    /// Followed actor; `None` mounts the camera in the world frame
    pub(crate) mount: Option<ActorId>,
    pub(crate) local_pose: Pose,
    pub(crate) spec: CameraSpec,
}

impl MountedCamera {
    /// Camera name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renderer camera handle
    pub fn camera_handle(&self) -> CameraHandle {
        self.camera
    }

    /// Followed actor
    pub fn mount(&self) -> Option<ActorId> {
        self.mount
    }

    /// Pose relative to the mount
    pub fn local_pose(&self) -> Pose {
        self.local_pose
    }

    /// Image parameters
    pub fn spec(&self) -> CameraSpec {
        self.spec
    }

    /// World pose given the mount's world pose
    pub fn world_pose(&self, mount_pose: Pose) -> Pose {
        mount_pose * self.local_pose
    }
}
