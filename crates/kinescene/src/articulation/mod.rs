//! Reduced-coordinate articulations
//!
//! An [`Articulation`] is an immutable tree of [`Link`]s, each moved relative
//! to its parent by one [`Joint`]. Every dof-indexed accessor on
//! [`ArticulationMut`] speaks authoring order and converts through the
//! articulation's [`DofIndexMap`] before touching the backend, which keeps
//! its arrays in solver order.
//!
//! Dynamics queries share one backend scratch cache per articulation. The
//! cache is never reset implicitly; call [`ArticulationMut::reset_cache`]
//! after changing state the cache depends on.

pub mod index_map;

pub use index_map::DofIndexMap;

use crate::events::{EventHandler, EventKind, EventRegistry, SubscriptionId};
use crate::foundation::math::{self, Matrix, Pose, Vec3};
use crate::physics::{
    BackendError, CacheHandle, DofArray, DriveProperties, JointKind, MultibodyHandle,
    PassiveForceTerms, PhysicsBackend,
};
use crate::scene::actor::{BodyCore, DestroyState, SceneBody};
use crate::scene::release::{Orphan, ReleaseQueue};
use crate::scene::SceneId;
use thiserror::Error;

/// Articulation accessor errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ArticulationError {
    /// Vector length does not match the dof count
    #[error("Expected {expected} values, got {actual}")]
    ShapeMismatch {
        /// Dof count of the articulation
        expected: usize,
        /// Length that was passed
        actual: usize,
    },

    /// Backend Jacobian does not have the expected dimensions
    #[error("Jacobian is {actual:?}, expected {expected:?}")]
    JacobianShape {
        /// Expected (rows, cols)
        expected: (usize, usize),
        /// Returned (rows, cols)
        actual: (usize, usize),
    },

    /// Link index out of range
    #[error("No link with index {0}")]
    UnknownLink(usize),

    /// The backend rejected the operation
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Joint connecting a link to its parent
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub(crate) name: String,
    pub(crate) kind: JointKind,
    pub(crate) pose_in_parent: Pose,
    pub(crate) pose_in_child: Pose,
    pub(crate) friction: f32,
    pub(crate) damping: f32,
}

impl Joint {
    /// Joint name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Joint type
    pub fn kind(&self) -> JointKind {
        self.kind
    }

    /// Number of dofs contributed
    pub fn dof(&self) -> usize {
        self.kind.dof()
    }

    /// Joint frame in the parent link
    pub fn pose_in_parent(&self) -> Pose {
        self.pose_in_parent
    }

    /// Joint frame in the child link
    pub fn pose_in_child(&self) -> Pose {
        self.pose_in_child
    }

    /// Joint friction
    pub fn friction(&self) -> f32 {
        self.friction
    }

    /// Joint damping
    pub fn damping(&self) -> f32 {
        self.damping
    }
}

/// One body of an articulation
#[derive(Debug)]
pub struct Link {
    pub(crate) core: BodyCore,
    pub(crate) index: usize,
    pub(crate) parent: Option<usize>,
    pub(crate) joint: Joint,
}

impl Link {
    /// Authoring index within the articulation
    pub fn index(&self) -> usize {
        self.index
    }

    /// Parent link index; `None` for the root
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Joint to the parent (a fixed joint for the root)
    pub fn joint(&self) -> &Joint {
        &self.joint
    }
}

impl SceneBody for Link {
    fn core(&self) -> &BodyCore {
        &self.core
    }
}

/// An articulated body owned by a scene
#[derive(Debug)]
pub struct Articulation {
    pub(crate) name: String,
    pub(crate) scene: SceneId,
    pub(crate) multibody: MultibodyHandle,
    pub(crate) links: Vec<Link>,
    pub(crate) index_map: DofIndexMap,
    pub(crate) cache: CacheHandle,
    pub(crate) fix_base: bool,
    pub(crate) state: DestroyState,
    pub(crate) events: EventRegistry,
    /// Set until the scene takes ownership
    pub(crate) release: Option<ReleaseQueue>,
}

impl Drop for Articulation {
    fn drop(&mut self) {
        if let Some(queue) = self.release.take() {
            log::debug!("Articulation '{}' dropped before being added; queueing release", self.name);
            queue.push(Orphan::Articulation {
                multibody: self.multibody,
                cache: self.cache,
                proxies: self.links.iter().flat_map(|link| link.core.proxy_handles()).collect(),
            });
        }
    }
}

impl Articulation {
    /// Name given at build time
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scene this articulation was built for
    pub fn scene_id(&self) -> SceneId {
        self.scene
    }

    /// Backend multibody handle
    pub fn multibody(&self) -> MultibodyHandle {
        self.multibody
    }

    /// Number of dofs
    pub fn dof(&self) -> usize {
        self.index_map.dof()
    }

    /// Whether the root is welded to the world
    pub fn is_fix_base(&self) -> bool {
        self.fix_base
    }

    /// Links in authoring order
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Link by authoring index
    pub fn link(&self, index: usize) -> Option<&Link> {
        self.links.get(index)
    }

    /// Root link
    pub fn root(&self) -> Option<&Link> {
        self.links.iter().find(|l| l.parent.is_none())
    }

    /// Link by name
    pub fn find_link_by_name(&self, name: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.core.name == name)
    }

    /// Joints of every non-root link, in authoring order
    pub fn joints(&self) -> impl Iterator<Item = &Joint> {
        self.links.iter().filter(|l| l.parent.is_some()).map(|l| &l.joint)
    }

    /// Joints that contribute at least one dof, in authoring order
    pub fn active_joints(&self) -> impl Iterator<Item = &Joint> {
        self.joints().filter(|j| j.dof() > 0)
    }

    /// Dof permutation
    pub fn index_map(&self) -> &DofIndexMap {
        &self.index_map
    }

    /// Destruction state
    pub fn destroy_state(&self) -> DestroyState {
        self.state
    }

    /// Whether removal was requested
    pub fn is_pending_removal(&self) -> bool {
        self.state == DestroyState::PendingRemoval
    }

    /// Length of a packed state vector
    pub fn packed_state_len(&self) -> usize {
        5 * self.dof() + 7
    }

    fn root_columns(&self) -> usize {
        if self.fix_base {
            0
        } else {
            6
        }
    }
}

/// Mutable view of an articulation together with the physics backend
pub struct ArticulationMut<'a> {
    pub(crate) articulation: &'a mut Articulation,
    pub(crate) physics: &'a mut Box<dyn PhysicsBackend>,
}

impl ArticulationMut<'_> {
    /// Read-only access to the articulation
    pub fn articulation(&self) -> &Articulation {
        self.articulation
    }

    /// Number of dofs
    pub fn dof(&self) -> usize {
        self.articulation.dof()
    }

    fn read(&self, array: DofArray) -> Result<Vec<f32>, ArticulationError> {
        let internal = self.physics.read_dofs(self.articulation.multibody, array)?;
        self.articulation.index_map.to_external(&internal)
    }

    fn write(&mut self, array: DofArray, values: &[f32]) -> Result<(), ArticulationError> {
        let internal = self.articulation.index_map.to_internal(values)?;
        self.physics
            .write_dofs(self.articulation.multibody, array, &internal)?;
        Ok(())
    }

    /// Joint positions
    pub fn qpos(&self) -> Result<Vec<f32>, ArticulationError> {
        self.read(DofArray::Position)
    }

    /// Set joint positions
    pub fn set_qpos(&mut self, qpos: &[f32]) -> Result<(), ArticulationError> {
        self.write(DofArray::Position, qpos)
    }

    /// Joint velocities
    pub fn qvel(&self) -> Result<Vec<f32>, ArticulationError> {
        self.read(DofArray::Velocity)
    }

    /// Set joint velocities
    pub fn set_qvel(&mut self, qvel: &[f32]) -> Result<(), ArticulationError> {
        self.write(DofArray::Velocity, qvel)
    }

    /// Joint accelerations
    pub fn qacc(&self) -> Result<Vec<f32>, ArticulationError> {
        self.read(DofArray::Acceleration)
    }

    /// Set joint accelerations
    pub fn set_qacc(&mut self, qacc: &[f32]) -> Result<(), ArticulationError> {
        self.write(DofArray::Acceleration, qacc)
    }

    /// Joint forces
    pub fn qf(&self) -> Result<Vec<f32>, ArticulationError> {
        self.read(DofArray::Force)
    }

    /// Set joint forces
    pub fn set_qf(&mut self, qf: &[f32]) -> Result<(), ArticulationError> {
        self.write(DofArray::Force, qf)
    }

    /// Joint drive position targets
    pub fn drive_target(&self) -> Result<Vec<f32>, ArticulationError> {
        self.read(DofArray::DriveTarget)
    }

    /// Set joint drive position targets
    pub fn set_drive_target(&mut self, target: &[f32]) -> Result<(), ArticulationError> {
        self.write(DofArray::DriveTarget, target)
    }

    /// Joint drive velocity targets
    pub fn drive_velocity_target(&self) -> Result<Vec<f32>, ArticulationError> {
        self.read(DofArray::DriveVelocityTarget)
    }

    /// Set joint drive velocity targets
    pub fn set_drive_velocity_target(&mut self, target: &[f32]) -> Result<(), ArticulationError> {
        self.write(DofArray::DriveVelocityTarget, target)
    }

    /// Joint limits as `[lower, upper]` per dof
    pub fn qlimits(&self) -> Result<Vec<[f32; 2]>, ArticulationError> {
        let internal = self.physics.read_limits(self.articulation.multibody)?;
        self.articulation.index_map.to_external(&internal)
    }

    /// Set joint limits
    pub fn set_qlimits(&mut self, limits: &[[f32; 2]]) -> Result<(), ArticulationError> {
        let internal = self.articulation.index_map.to_internal(limits)?;
        self.physics
            .write_limits(self.articulation.multibody, &internal)?;
        Ok(())
    }

    /// Drive parameters of the joint moving link `link`
    pub fn set_joint_drive(
        &mut self,
        link: usize,
        drive: &DriveProperties,
    ) -> Result<(), ArticulationError> {
        let body = self
            .articulation
            .links
            .get(link)
            .ok_or(ArticulationError::UnknownLink(link))?
            .core
            .body;
        self.physics
            .set_joint_drive(self.articulation.multibody, body, drive)?;
        Ok(())
    }

    /// Root link pose
    pub fn root_pose(&self) -> Pose {
        self.physics
            .root_pose(self.articulation.multibody)
            .unwrap_or_else(Pose::identity)
    }

    /// Teleport the root link
    pub fn set_root_pose(&mut self, pose: Pose) {
        self.physics.set_root_pose(self.articulation.multibody, pose);
    }

    /// Set root linear and angular velocity
    pub fn set_root_velocity(&mut self, linear: Vec3, angular: Vec3) {
        self.physics
            .set_root_velocity(self.articulation.multibody, linear, angular);
    }

    /// Discard cached dynamics data
    pub fn reset_cache(&mut self) {
        self.physics
            .reset_cache(self.articulation.multibody, self.articulation.cache);
    }

    /// Joint forces from the selected passive effects
    pub fn compute_passive_force(
        &mut self,
        gravity: bool,
        coriolis_and_centrifugal: bool,
        external: bool,
    ) -> Result<Vec<f32>, ArticulationError> {
        let mut terms = PassiveForceTerms::empty();
        terms.set(PassiveForceTerms::GRAVITY, gravity);
        terms.set(PassiveForceTerms::CORIOLIS_AND_CENTRIFUGAL, coriolis_and_centrifugal);
        terms.set(PassiveForceTerms::EXTERNAL, external);
        let internal = self.physics.compute_passive_force(
            self.articulation.multibody,
            self.articulation.cache,
            terms,
        )?;
        self.articulation.index_map.to_external(&internal)
    }

    /// Joint forces that produce `qacc`
    pub fn compute_inverse_dynamics(&mut self, qacc: &[f32]) -> Result<Vec<f32>, ArticulationError> {
        let internal = self.articulation.index_map.to_internal(qacc)?;
        let qf = self.physics.compute_inverse_dynamics(
            self.articulation.multibody,
            self.articulation.cache,
            &internal,
        )?;
        self.articulation.index_map.to_external(&qf)
    }

    /// Joint accelerations produced by `qf`
    pub fn compute_forward_dynamics(&mut self, qf: &[f32]) -> Result<Vec<f32>, ArticulationError> {
        let internal = self.articulation.index_map.to_internal(qf)?;
        let qacc = self.physics.compute_forward_dynamics(
            self.articulation.multibody,
            self.articulation.cache,
            &internal,
        )?;
        self.articulation.index_map.to_external(&qacc)
    }

    /// Jacobian with rows in authoring link order and columns in authoring dof order
    /// (preceded by 6 root columns for a floating base)
    pub fn compute_jacobian(&mut self) -> Result<Matrix, ArticulationError> {
        let internal = self
            .physics
            .compute_jacobian(self.articulation.multibody, self.articulation.cache)?;
        self.articulation
            .index_map
            .jacobian_to_external(&internal, self.articulation.root_columns())
    }

    /// Wake the articulation
    pub fn wake_up(&mut self) {
        self.physics.wake_articulation(self.articulation.multibody);
    }

    /// Force the articulation to sleep
    pub fn put_to_sleep(&mut self) {
        self.physics
            .put_articulation_to_sleep(self.articulation.multibody);
    }

    /// Whether the articulation is asleep
    pub fn is_sleeping(&self) -> bool {
        self.physics
            .is_articulation_sleeping(self.articulation.multibody)
    }

    /// Snapshot of qpos, qvel, qacc, qf, drive target and root pose
    pub fn pack_state(&self) -> Result<Vec<f32>, ArticulationError> {
        let mut data = Vec::with_capacity(self.articulation.packed_state_len());
        data.extend(self.qpos()?);
        data.extend(self.qvel()?);
        data.extend(self.qacc()?);
        data.extend(self.qf()?);
        data.extend(self.drive_target()?);
        data.extend(math::pose_to_array(&self.root_pose()));
        Ok(data)
    }

    /// Restore a snapshot taken with [`pack_state`](Self::pack_state)
    pub fn unpack_state(&mut self, data: &[f32]) -> Result<(), ArticulationError> {
        let expected = self.articulation.packed_state_len();
        if data.len() != expected {
            return Err(ArticulationError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        let dof = self.dof();
        let arrays = [
            DofArray::Position,
            DofArray::Velocity,
            DofArray::Acceleration,
            DofArray::Force,
            DofArray::DriveTarget,
        ];
        for (slot, array) in arrays.into_iter().enumerate() {
            self.write(array, &data[slot * dof..(slot + 1) * dof])?;
        }
        let mut root = [0.0; 7];
        root.copy_from_slice(&data[5 * dof..]);
        self.set_root_pose(math::pose_from_array(&root));
        Ok(())
    }

    /// Register a handler on this articulation's registry
    pub fn subscribe(&mut self, kind: EventKind, handler: Box<dyn EventHandler>) -> SubscriptionId {
        self.articulation.events.subscribe(kind, handler)
    }

    /// Remove a handler from this articulation's registry
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.articulation.events.unsubscribe(id)
    }
}
