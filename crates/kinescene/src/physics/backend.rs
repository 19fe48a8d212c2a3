//! Backend abstraction traits for the physics layer
//!
//! The solver itself is opaque to the scene. This module defines the surface
//! the scene consumes: object creation, per-dof state arrays in the solver's
//! own ordering, cache-based dynamics queries and the submit/fetch stepping
//! protocol. Contact and trigger notifications are buffered by the backend
//! during `fetch_results` and drained by the scene afterwards.

use crate::foundation::math::{Matrix, Pose, Vec3};
use crate::physics::collision_groups::CollisionGroups;
use crate::physics::contact::{ContactEvent, TriggerEvent};
use crate::physics::geometry::Geometry;
use bitflags::bitflags;
use thiserror::Error;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors reported by a physics backend
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    /// The backend could not create an object
    #[error("Failed to create {kind}: {reason}")]
    CreationFailed {
        /// Object kind ("shape", "body", ...)
        kind: &'static str,
        /// Backend-provided reason
        reason: String,
    },

    /// A handle does not name a live backend object
    #[error("Invalid {kind} handle {handle}")]
    InvalidHandle {
        /// Object kind
        kind: &'static str,
        /// Raw handle value
        handle: u64,
    },

    /// Structural changes are not allowed while a step is in flight
    #[error("Operation not allowed while the simulation is running: {0}")]
    SimulationRunning(&'static str),

    /// Input rejected by the backend
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Handle to a physical material
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialHandle(pub u64);

/// Handle to a collision shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShapeHandle(pub u64);

/// Handle to a rigid body or articulation link body
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyHandle(pub u64);

/// Handle to a reduced-coordinate multibody
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MultibodyHandle(pub u64);

/// Handle to a multibody scratch cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheHandle(pub u64);

/// Handle to a drive constraint between two bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JointHandle(pub u64);

/// Friction/restitution triple
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalMaterialDesc {
    /// Static friction coefficient
    pub static_friction: f32,
    /// Dynamic friction coefficient
    pub dynamic_friction: f32,
    /// Restitution coefficient
    pub restitution: f32,
}

/// Everything needed to create one shape
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeDesc {
    /// Geometry in the shape frame
    pub geometry: Geometry,
    /// Physical material
    pub material: MaterialHandle,
    /// Pose of the shape frame on its body
    pub local_pose: Pose,
    /// Contact offset
    pub contact_offset: f32,
    /// Torsional friction patch radius
    pub patch_radius: f32,
    /// Minimum torsional friction patch radius
    pub min_patch_radius: f32,
    /// Simulation filter data
    pub filter: CollisionGroups,
    /// Trigger shapes report overlaps instead of generating contacts
    pub is_trigger: bool,
}

/// How a rigid body participates in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyKind {
    /// Never moves
    Static,
    /// Moved by the user, pushes dynamic bodies
    Kinematic,
    /// Fully simulated
    Dynamic,
}

/// Mass properties of a body
#[derive(Debug, Clone, PartialEq)]
pub enum MassProperties {
    /// Derive from attached shapes, one density per shape in attach order
    FromDensities(Vec<f32>),
    /// Explicit values
    Explicit {
        /// Mass
        mass: f32,
        /// Center-of-mass frame relative to the body frame
        cmass_local_pose: Pose,
        /// Principal inertia in the center-of-mass frame
        inertia: Vec3,
    },
}

/// Joint connecting a link to its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointKind {
    /// No relative motion
    Fixed,
    /// Rotation about the joint x axis
    Revolute,
    /// Translation along the joint x axis
    Prismatic,
    /// Free rotation
    Spherical,
}

impl JointKind {
    /// Number of generalized coordinates contributed by the joint
    pub fn dof(self) -> usize {
        match self {
            Self::Fixed => 0,
            Self::Revolute | Self::Prismatic => 1,
            Self::Spherical => 3,
        }
    }
}

/// Joint parameters handed to the backend
#[derive(Debug, Clone, PartialEq)]
pub struct JointDesc {
    /// Joint type
    pub kind: JointKind,
    /// Joint frame expressed in the parent link frame
    pub pose_in_parent: Pose,
    /// Joint frame expressed in the child link frame
    pub pose_in_child: Pose,
    /// Lower/upper limit per dof; infinite bounds mean free
    pub limits: Vec<[f32; 2]>,
    /// Joint friction
    pub friction: f32,
    /// Joint damping
    pub damping: f32,
}

/// One link of an articulation description, in authoring order
#[derive(Debug, Clone, PartialEq)]
pub struct LinkDesc {
    /// Parent link index in authoring order; `None` for the root
    pub parent: Option<usize>,
    /// Joint to the parent (ignored for the root)
    pub joint: JointDesc,
}

/// Articulation topology handed to the backend
#[derive(Debug, Clone, PartialEq)]
pub struct ArticulationDesc {
    /// Links in authoring order, parents before children
    pub links: Vec<LinkDesc>,
    /// Whether the root is welded to the world
    pub fix_base: bool,
    /// Initial root pose
    pub root_pose: Pose,
}

/// Objects created for an articulation
#[derive(Debug, Clone, PartialEq)]
pub struct ArticulationParts {
    /// Multibody handle
    pub multibody: MultibodyHandle,
    /// Link bodies, in authoring order
    pub links: Vec<BodyHandle>,
}

/// Per-dof state arrays exposed by a multibody
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DofArray {
    /// Joint positions
    Position,
    /// Joint velocities
    Velocity,
    /// Joint accelerations
    Acceleration,
    /// Joint forces
    Force,
    /// Joint drive position targets
    DriveTarget,
    /// Joint drive velocity targets
    DriveVelocityTarget,
}

/// Spring/damper drive parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveProperties {
    /// Spring stiffness
    pub stiffness: f32,
    /// Damping
    pub damping: f32,
    /// Maximum force the drive may apply
    pub force_limit: f32,
    /// Drive acceleration instead of force
    pub is_acceleration: bool,
}

impl Default for DriveProperties {
    fn default() -> Self {
        Self {
            stiffness: 0.0,
            damping: 0.0,
            force_limit: f32::MAX,
            is_acceleration: false,
        }
    }
}

bitflags! {
    /// Terms included in a passive force query
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PassiveForceTerms: u8 {
        /// Gravity compensation
        const GRAVITY = 0b001;
        /// Coriolis and centrifugal terms
        const CORIOLIS_AND_CENTRIFUGAL = 0b010;
        /// External forces and joint damping
        const EXTERNAL = 0b100;
    }
}

/// Main physics backend trait
///
/// Every dof-indexed array crossing this boundary is in the backend's
/// internal order. Callers must not assume it matches authoring order.
pub trait PhysicsBackend {
    // === Materials and shapes ===

    /// Create a physical material
    fn create_material(&mut self, desc: &PhysicalMaterialDesc) -> BackendResult<MaterialHandle>;

    /// Create a shape that is not yet attached to any body
    fn create_shape(&mut self, desc: &ShapeDesc) -> BackendResult<ShapeHandle>;

    /// Release a shape
    fn release_shape(&mut self, shape: ShapeHandle);

    /// Realized geometry of a shape
    fn shape_geometry(&self, shape: ShapeHandle) -> Option<Geometry>;

    /// Local pose of a shape on its body
    fn shape_local_pose(&self, shape: ShapeHandle) -> Option<Pose>;

    /// Simulation filter data of a shape
    fn shape_filter(&self, shape: ShapeHandle) -> Option<CollisionGroups>;

    /// Replace the simulation filter data of a shape
    fn set_shape_filter(&mut self, shape: ShapeHandle, filter: CollisionGroups);

    // === Rigid bodies ===

    /// Create a rigid body outside of the world
    fn create_body(&mut self, kind: BodyKind, pose: Pose) -> BackendResult<BodyHandle>;

    /// Attach a shape to a body (or articulation link body)
    fn attach_shape(&mut self, body: BodyHandle, shape: ShapeHandle) -> BackendResult<()>;

    /// Set mass properties
    fn set_mass_properties(&mut self, body: BodyHandle, mass: &MassProperties)
        -> BackendResult<()>;

    /// Sleep threshold and solver iteration counts for a dynamic body
    fn configure_body(
        &mut self,
        body: BodyHandle,
        sleep_threshold: f32,
        position_iterations: u32,
        velocity_iterations: u32,
    );

    /// Insert a body into the world
    fn add_body(&mut self, body: BodyHandle) -> BackendResult<()>;

    /// Remove a body from the world without releasing it
    fn remove_body(&mut self, body: BodyHandle);

    /// Release a body and the shapes attached to it
    fn release_body(&mut self, body: BodyHandle);

    /// World pose
    fn body_pose(&self, body: BodyHandle) -> Option<Pose>;

    /// Teleport a body
    fn set_body_pose(&mut self, body: BodyHandle, pose: Pose);

    /// Linear and angular velocity
    fn body_velocity(&self, body: BodyHandle) -> Option<(Vec3, Vec3)>;

    /// Mass of a body
    fn body_mass(&self, body: BodyHandle) -> Option<f32>;

    /// Accumulate a force and torque for the next step
    fn add_force_torque(&mut self, body: BodyHandle, force: Vec3, torque: Vec3);

    /// Linear and angular damping
    fn set_damping(&mut self, body: BodyHandle, linear: f32, angular: f32);

    /// Wake a sleeping body
    fn wake_body(&mut self, body: BodyHandle);

    /// Force a body to sleep
    fn put_body_to_sleep(&mut self, body: BodyHandle);

    /// Whether a body is asleep
    fn is_body_sleeping(&self, body: BodyHandle) -> bool;

    // === Articulations ===

    /// Create a multibody and its link bodies
    fn create_articulation(&mut self, desc: &ArticulationDesc) -> BackendResult<ArticulationParts>;

    /// Internal (solver) index of a link
    fn link_internal_index(&self, multibody: MultibodyHandle, link: BodyHandle) -> Option<usize>;

    /// Insert a multibody into the world
    fn add_articulation(&mut self, multibody: MultibodyHandle) -> BackendResult<()>;

    /// Remove a multibody from the world without releasing it
    fn remove_articulation(&mut self, multibody: MultibodyHandle);

    /// Release a multibody and its links
    fn release_articulation(&mut self, multibody: MultibodyHandle);

    /// Wake a sleeping multibody
    fn wake_articulation(&mut self, multibody: MultibodyHandle);

    /// Force a multibody to sleep
    fn put_articulation_to_sleep(&mut self, multibody: MultibodyHandle);

    /// Whether a multibody is asleep
    fn is_articulation_sleeping(&self, multibody: MultibodyHandle) -> bool;

    /// Read a per-dof array (internal order)
    fn read_dofs(&self, multibody: MultibodyHandle, array: DofArray) -> BackendResult<Vec<f32>>;

    /// Write a per-dof array (internal order)
    fn write_dofs(
        &mut self,
        multibody: MultibodyHandle,
        array: DofArray,
        values: &[f32],
    ) -> BackendResult<()>;

    /// Read joint limits (internal order)
    fn read_limits(&self, multibody: MultibodyHandle) -> BackendResult<Vec<[f32; 2]>>;

    /// Write joint limits (internal order)
    fn write_limits(&mut self, multibody: MultibodyHandle, limits: &[[f32; 2]])
        -> BackendResult<()>;

    /// Root link pose
    fn root_pose(&self, multibody: MultibodyHandle) -> Option<Pose>;

    /// Teleport the root link
    fn set_root_pose(&mut self, multibody: MultibodyHandle, pose: Pose);

    /// Root linear and angular velocity
    fn set_root_velocity(&mut self, multibody: MultibodyHandle, linear: Vec3, angular: Vec3);

    /// Drive parameters of the joint connecting `link` to its parent
    fn set_joint_drive(
        &mut self,
        multibody: MultibodyHandle,
        link: BodyHandle,
        drive: &DriveProperties,
    ) -> BackendResult<()>;

    // === Multibody cache ===

    /// Allocate a scratch cache for dynamics queries
    fn create_cache(&mut self, multibody: MultibodyHandle) -> BackendResult<CacheHandle>;

    /// Discard cached data so the next query recomputes from the current state
    fn reset_cache(&mut self, multibody: MultibodyHandle, cache: CacheHandle);

    /// Free a cache
    fn release_cache(&mut self, multibody: MultibodyHandle, cache: CacheHandle);

    /// Joint forces from passive effects (internal order)
    fn compute_passive_force(
        &mut self,
        multibody: MultibodyHandle,
        cache: CacheHandle,
        terms: PassiveForceTerms,
    ) -> BackendResult<Vec<f32>>;

    /// Joint forces producing `qacc` (both internal order)
    fn compute_inverse_dynamics(
        &mut self,
        multibody: MultibodyHandle,
        cache: CacheHandle,
        qacc: &[f32],
    ) -> BackendResult<Vec<f32>>;

    /// Joint accelerations produced by `qf` (both internal order)
    fn compute_forward_dynamics(
        &mut self,
        multibody: MultibodyHandle,
        cache: CacheHandle,
        qf: &[f32],
    ) -> BackendResult<Vec<f32>>;

    /// Dense Jacobian: 6 rows per link in internal link order, columns in
    /// internal dof order (preceded by 6 root columns for a floating base)
    fn compute_jacobian(
        &mut self,
        multibody: MultibodyHandle,
        cache: CacheHandle,
    ) -> BackendResult<Matrix>;

    // === Drive constraints ===

    /// Create a drive between two bodies; `None` means the world frame
    fn create_drive_joint(
        &mut self,
        body0: Option<BodyHandle>,
        pose0: Pose,
        body1: Option<BodyHandle>,
        pose1: Pose,
    ) -> BackendResult<JointHandle>;

    /// Release a drive
    fn release_drive_joint(&mut self, joint: JointHandle);

    /// Drive spring parameters
    fn set_drive_joint_properties(&mut self, joint: JointHandle, drive: &DriveProperties);

    /// Drive target pose of body1 relative to body0
    fn set_drive_joint_target(&mut self, joint: JointHandle, target: Pose);

    // === Stepping ===

    /// Start advancing the world by `dt`
    fn simulate(&mut self, dt: f32) -> BackendResult<()>;

    /// Finish the step started by `simulate`. Returns false if results are
    /// not ready and `block` is false.
    fn fetch_results(&mut self, block: bool) -> bool;

    /// Contact notifications produced by the last fetched step
    fn drain_contact_events(&mut self) -> Vec<ContactEvent>;

    /// Trigger notifications produced by the last fetched step
    fn drain_trigger_events(&mut self) -> Vec<TriggerEvent>;

    /// Downcast to concrete backend type for advanced operations
    fn as_any(&self) -> &dyn std::any::Any;

    /// Downcast to mutable concrete backend type for advanced operations
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
