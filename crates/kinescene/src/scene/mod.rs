//! Scene management
//!
//! The [`Scene`] owns every entity built for it and mediates all access to the
//! physics and render backends.
//!
//! ## Lifecycle
//!
//! ```text
//! Builder::build ──► Scene::add_* ──► Alive ──► Scene::remove_* ──► PendingRemoval
//!                                                                       │
//!                                    step cleanup (once per step) ◄─────┘
//! ```
//!
//! Removal is two-phase: `remove_*` detaches the entity from everything it
//! touches and pulls it out of the world immediately, while the entity itself
//! and its backend handles are released at the next step's cleanup point.

pub mod actor;
pub mod camera;
pub mod drive;
pub(crate) mod release;
mod scene_manager;

#[cfg(test)]
mod tests;

pub use actor::{Actor, ActorMut, BodyCore, DestroyState, RenderProxy, SceneBody};
pub use camera::{CameraSpec, MountedCamera};
pub use drive::Drive;
pub use scene_manager::{Scene, SceneError};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

slotmap::new_key_type! {
    /// Key of an actor slot
    pub struct ActorKey;
    /// Handle to an articulation owned by a scene
    pub struct ArticulationHandle;
    /// Handle to a drive owned by a scene
    pub struct DriveId;
    /// Handle to a mounted camera owned by a scene
    pub struct CameraId;
}

static NEXT_SCENE: AtomicU64 = AtomicU64::new(1);

/// Process-unique scene identity, used to bind builders and entities to their scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneId(u64);

impl SceneId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SCENE.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene#{}", self.0)
    }
}
