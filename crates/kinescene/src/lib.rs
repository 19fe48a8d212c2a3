//! # Kinescene
//!
//! Scene management for rigid-body and articulated robot simulation.
//!
//! ## Features
//!
//! - **Entity lifecycle**: Two-phase removal that keeps backend handles valid
//!   until the end of the step that observed the removal
//! - **Stable dof order**: Articulation accessors speak the order links were
//!   authored in, whatever order the solver uses internally
//! - **Contact bookkeeping**: Shape-pair keyed contact state, consistent across
//!   entity removal
//! - **Deferred builders**: Record shapes and visuals once, build any number of
//!   independent actors
//! - **Pluggable backends**: Physics and rendering behind traits, with headless
//!   implementations included
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kinescene::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut scene = Scene::headless(SceneConfig::default())?;
//!     scene.add_ground(0.0, true, None, &RenderMaterial::default())?;
//!
//!     let mut builder = scene.create_actor_builder();
//!     builder.add_box_shape(Pose::identity(), Vec3::new(0.5, 0.5, 0.5), ShapeOptions::default());
//!     let actor = builder.build(&mut scene, "crate")?;
//!     let id = scene.add_actor(actor)?;
//!
//!     for _ in 0..240 {
//!         scene.step()?;
//!     }
//!     println!("{id} at {:?}", scene.pose_of(id));
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Shared building blocks
pub mod foundation;
pub mod config;
pub mod events;
pub mod assets;

// Backends
pub mod physics;
pub mod render;

// Scene and its entities
pub mod scene;
pub mod articulation;
pub mod builder;

pub use scene::{Scene, SceneError, SceneId};

/// Common imports for scene users
pub mod prelude {
    pub use crate::{
        articulation::{Articulation, ArticulationError, ArticulationMut, Joint, Link},
        builder::{
            ActorBuilder, ArticulationBuilder, BuildError, LinkBuilder, ShapeOptions,
            ShapeRecorder,
        },
        config::{Config, SceneConfig},
        events::{Event, EventKind},
        foundation::{
            ids::{ActorId, RenderId},
            math::{Pose, Quat, Vec3},
        },
        physics::{
            BodyKind, CollisionGroups, Contact, DriveProperties, HeadlessPhysics, JointKind,
            PhysicsBackend,
        },
        render::{HeadlessRenderer, RenderBackend, RenderMaterial},
        scene::{
            Actor, ActorMut, ArticulationHandle, CameraSpec, DriveId, Scene, SceneBody,
            SceneError,
        },
    };
}
