//! Physics module: backend abstraction, geometry and contact bookkeeping
//!
//! The solver is an opaque collaborator behind [`PhysicsBackend`]. This module
//! holds everything the scene needs to talk to it:
//! - **Backend**: object creation, per-dof arrays in solver order, stepping
//! - **Geometry**: primitive and convex hull descriptions shared with the builder
//! - **Collision groups**: three-word simulation filter data
//! - **Contacts**: shape-pair state machine fed by backend notifications
//! - **Headless**: a deterministic backend without a solver, for tests and tools

pub mod backend;
pub mod collision_groups;
pub mod contact;
pub mod geometry;
pub mod headless;

pub use backend::{
    ArticulationDesc, ArticulationParts, BackendError, BackendResult, BodyHandle, BodyKind,
    CacheHandle, DofArray, DriveProperties, JointDesc, JointHandle, JointKind, LinkDesc,
    MassProperties, MaterialHandle, MultibodyHandle, PassiveForceTerms, PhysicalMaterialDesc,
    PhysicsBackend, ShapeDesc, ShapeHandle,
};
pub use collision_groups::CollisionGroups;
pub use contact::{
    Contact, ContactEvent, ContactPoint, ContactTracker, ContactTransition, PairKey,
    TriggerEvent, TriggerTransition,
};
pub use geometry::{ConvexGeometry, ConvexMesh, Geometry, HullPolygon};
pub use headless::HeadlessPhysics;
