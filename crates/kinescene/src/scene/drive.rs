//! Drive constraints between two bodies (or a body and the world)

use crate::foundation::ids::ActorId;
use crate::foundation::math::Pose;
use crate::physics::{DriveProperties, JointHandle};

/// A spring drive owned by the scene
///
/// Participants are referenced by id and resolved through the scene's lookup
/// tables when needed; a drive never keeps a participant alive.
#[derive(Debug, Clone)]
pub struct Drive {
    pub(crate) joint: JointHandle,
    pub(crate) actors: [Option<ActorId>; 2],
    pub(crate) poses: [Pose; 2],
    pub(crate) properties: DriveProperties,
    pub(crate) target: Pose,
}

impl Drive {
    /// First participant, `None` for the world
    pub fn actor1(&self) -> Option<ActorId> {
        self.actors[0]
    }

    /// Second participant, `None` for the world
    pub fn actor2(&self) -> Option<ActorId> {
        self.actors[1]
    }

    /// Drive frame on the first participant
    pub fn local_pose1(&self) -> Pose {
        self.poses[0]
    }

    /// Drive frame on the second participant
    pub fn local_pose2(&self) -> Pose {
        self.poses[1]
    }

    /// Spring parameters
    pub fn properties(&self) -> DriveProperties {
        self.properties
    }

    /// Target pose of frame 2 relative to frame 1
    pub fn target(&self) -> Pose {
        self.target
    }

    /// Backend constraint handle
    pub fn joint_handle(&self) -> JointHandle {
        self.joint
    }

    /// Whether `actor` takes part in this drive
    pub fn involves(&self, actor: ActorId) -> bool {
        self.actors.contains(&Some(actor))
    }
}
