//! Headless physics backend
//!
//! A deterministic, solver-free implementation of [`PhysicsBackend`] used by
//! tests, tools and the demo. It keeps every object in tables and models just
//! enough behaviour to exercise the scene layer:
//!
//! - Articulation links are ordered internally by a breadth-first traversal
//!   that visits children in reverse authoring order, so internal order
//!   generally differs from authoring order.
//! - Dynamics are diagonal: the inertia of a dof is the mass of the link its
//!   joint moves, passive force is `-damping * qvel`, gravity is ignored.
//! - The Jacobian is structural: in the 6-row block of link `l`, row `r` of
//!   the column of dof `d` holds `r + 1` when `d` lies on the chain from the
//!   root to `l`.
//! - `simulate` integrates `qpos += qvel * dt` and rigid body velocities;
//!   contacts and triggers are never detected, only queued by the caller with
//!   [`HeadlessPhysics::push_contact`] and delivered on the next fetch.

use crate::foundation::math::{Matrix, Pose, Quat, Translation3, Vec3};
use crate::physics::backend::{
    ArticulationDesc, ArticulationParts, BackendError, BackendResult, BodyHandle, BodyKind,
    CacheHandle, DofArray, DriveProperties, JointHandle, JointKind, MassProperties,
    MaterialHandle, MultibodyHandle, PassiveForceTerms, PhysicalMaterialDesc, PhysicsBackend,
    ShapeDesc, ShapeHandle,
};
use crate::physics::collision_groups::CollisionGroups;
use crate::physics::contact::{ContactEvent, TriggerEvent};
use crate::physics::geometry::Geometry;
use std::collections::{HashMap, HashSet};

const DOF_ARRAYS: [DofArray; 6] = [
    DofArray::Position,
    DofArray::Velocity,
    DofArray::Acceleration,
    DofArray::Force,
    DofArray::DriveTarget,
    DofArray::DriveVelocityTarget,
];

#[derive(Debug, Clone)]
struct ShapeState {
    desc: ShapeDesc,
    body: Option<BodyHandle>,
}

#[derive(Debug, Clone)]
struct BodyState {
    kind: BodyKind,
    pose: Pose,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    mass: f32,
    inertia: Vec3,
    force: Vec3,
    torque: Vec3,
    damping: (f32, f32),
    shapes: Vec<ShapeHandle>,
    in_world: bool,
    sleeping: bool,
    /// Owning multibody and authoring index for link bodies
    link_of: Option<(MultibodyHandle, usize)>,
}

impl BodyState {
    fn new(kind: BodyKind, pose: Pose) -> Self {
        Self {
            kind,
            pose,
            linear_velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            mass: 1.0,
            inertia: Vec3::new(1.0, 1.0, 1.0),
            force: Vec3::zeros(),
            torque: Vec3::zeros(),
            damping: (0.0, 0.0),
            shapes: Vec::new(),
            in_world: false,
            sleeping: false,
            link_of: None,
        }
    }
}

#[derive(Debug, Clone)]
struct MultibodyState {
    desc: ArticulationDesc,
    /// Link bodies in authoring order
    links: Vec<BodyHandle>,
    /// internal index -> authoring index
    internal_order: Vec<usize>,
    /// authoring index -> internal index
    internal_index: Vec<usize>,
    /// internal dof -> internal link index
    dof_link: Vec<usize>,
    /// authoring link index -> first internal dof of its joint
    dof_start: Vec<usize>,
    arrays: HashMap<DofArray, Vec<f32>>,
    limits: Vec<[f32; 2]>,
    damping: Vec<f32>,
    joint_drives: HashMap<BodyHandle, DriveProperties>,
    root_pose: Pose,
    root_velocity: (Vec3, Vec3),
    caches: HashSet<CacheHandle>,
    in_world: bool,
    sleeping: bool,
}

impl MultibodyState {
    fn dof(&self) -> usize {
        self.dof_link.len()
    }

    fn array(&self, array: DofArray) -> Vec<f32> {
        self.arrays
            .get(&array)
            .cloned()
            .unwrap_or_else(|| vec![0.0; self.dof()])
    }

    /// Whether internal link `ancestor` lies on the chain from the root to internal link `link`
    fn is_ancestor_or_self(&self, ancestor: usize, link: usize) -> bool {
        let target = self.internal_order[ancestor];
        let mut current = Some(self.internal_order[link]);
        while let Some(index) = current {
            if index == target {
                return true;
            }
            current = self.desc.links[index].parent;
        }
        false
    }
}

#[derive(Debug, Clone)]
struct DriveJointState {
    bodies: [Option<BodyHandle>; 2],
    poses: [Pose; 2],
    drive: DriveProperties,
    target: Pose,
}

/// Solver-free physics backend
#[derive(Debug)]
pub struct HeadlessPhysics {
    next_handle: u64,
    gravity: Vec3,
    materials: HashMap<MaterialHandle, PhysicalMaterialDesc>,
    shapes: HashMap<ShapeHandle, ShapeState>,
    bodies: HashMap<BodyHandle, BodyState>,
    multibodies: HashMap<MultibodyHandle, MultibodyState>,
    drive_joints: HashMap<JointHandle, DriveJointState>,
    simulating: bool,
    pending_dt: f32,
    step_count: u64,
    queued_contacts: Vec<ContactEvent>,
    delivered_contacts: Vec<ContactEvent>,
    queued_triggers: Vec<TriggerEvent>,
    delivered_triggers: Vec<TriggerEvent>,
    fail_shape_creation: bool,
}

impl HeadlessPhysics {
    /// Create an empty backend without gravity
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            gravity: Vec3::zeros(),
            materials: HashMap::new(),
            shapes: HashMap::new(),
            bodies: HashMap::new(),
            multibodies: HashMap::new(),
            drive_joints: HashMap::new(),
            simulating: false,
            pending_dt: 0.0,
            step_count: 0,
            queued_contacts: Vec::new(),
            delivered_contacts: Vec::new(),
            queued_triggers: Vec::new(),
            delivered_triggers: Vec::new(),
            fail_shape_creation: false,
        }
    }

    /// Apply gravity to dynamic rigid bodies
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// Queue a contact notification for delivery on the next fetch
    pub fn push_contact(&mut self, event: ContactEvent) {
        self.queued_contacts.push(event);
    }

    /// Queue a trigger notification for delivery on the next fetch
    pub fn push_trigger(&mut self, event: TriggerEvent) {
        self.queued_triggers.push(event);
    }

    /// Make every subsequent `create_shape` fail (or succeed again)
    pub fn set_fail_shape_creation(&mut self, fail: bool) {
        self.fail_shape_creation = fail;
    }

    /// Number of completed `simulate` calls
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Whether a step is in flight
    pub fn is_simulating(&self) -> bool {
        self.simulating
    }

    /// Whether a body handle is still allocated
    pub fn body_exists(&self, body: BodyHandle) -> bool {
        self.bodies.contains_key(&body)
    }

    /// Whether a body is part of the world
    pub fn is_body_in_world(&self, body: BodyHandle) -> bool {
        self.bodies.get(&body).is_some_and(|b| b.in_world)
    }

    /// Whether a shape handle is still allocated
    pub fn shape_exists(&self, shape: ShapeHandle) -> bool {
        self.shapes.contains_key(&shape)
    }

    /// Number of allocated shapes
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Number of allocated bodies (rigid bodies and links)
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Whether a multibody handle is still allocated
    pub fn articulation_exists(&self, multibody: MultibodyHandle) -> bool {
        self.multibodies.contains_key(&multibody)
    }

    /// Whether a multibody is part of the world
    pub fn is_articulation_in_world(&self, multibody: MultibodyHandle) -> bool {
        self.multibodies.get(&multibody).is_some_and(|m| m.in_world)
    }

    /// Whether a drive joint handle is still allocated
    pub fn drive_joint_exists(&self, joint: JointHandle) -> bool {
        self.drive_joints.contains_key(&joint)
    }

    /// Drive parameters of a drive joint
    pub fn drive_joint_properties(&self, joint: JointHandle) -> Option<DriveProperties> {
        self.drive_joints.get(&joint).map(|j| j.drive)
    }

    /// Drive target of a drive joint
    pub fn drive_joint_target(&self, joint: JointHandle) -> Option<Pose> {
        self.drive_joints.get(&joint).map(|j| j.target)
    }

    /// Bodies connected by a drive joint
    pub fn drive_joint_bodies(&self, joint: JointHandle) -> Option<[Option<BodyHandle>; 2]> {
        self.drive_joints.get(&joint).map(|j| j.bodies)
    }

    /// Local frames of a drive joint
    pub fn drive_joint_poses(&self, joint: JointHandle) -> Option<[Pose; 2]> {
        self.drive_joints.get(&joint).map(|j| j.poses)
    }

    /// Joint drive parameters set on a link
    pub fn joint_drive(&self, multibody: MultibodyHandle, link: BodyHandle) -> Option<DriveProperties> {
        self.multibodies
            .get(&multibody)
            .and_then(|m| m.joint_drives.get(&link).copied())
    }

    /// Number of live caches of a multibody
    pub fn cache_count(&self, multibody: MultibodyHandle) -> usize {
        self.multibodies.get(&multibody).map_or(0, |m| m.caches.len())
    }

    /// Internal link order of a multibody as authoring indices
    pub fn internal_link_order(&self, multibody: MultibodyHandle) -> Option<Vec<usize>> {
        self.multibodies.get(&multibody).map(|m| m.internal_order.clone())
    }

    /// Material parameters
    pub fn material(&self, material: MaterialHandle) -> Option<PhysicalMaterialDesc> {
        self.materials.get(&material).copied()
    }

    /// Full creation descriptor of a shape
    pub fn shape_desc(&self, shape: ShapeHandle) -> Option<&ShapeDesc> {
        self.shapes.get(&shape).map(|s| &s.desc)
    }

    /// Body a shape is attached to
    pub fn shape_body(&self, shape: ShapeHandle) -> Option<BodyHandle> {
        self.shapes.get(&shape).and_then(|s| s.body)
    }

    /// Kind of a rigid body
    pub fn body_kind(&self, body: BodyHandle) -> Option<BodyKind> {
        self.bodies.get(&body).map(|b| b.kind)
    }

    /// Accumulated damping of a body
    pub fn body_damping(&self, body: BodyHandle) -> Option<(f32, f32)> {
        self.bodies.get(&body).map(|b| b.damping)
    }

    /// Principal inertia of a body
    pub fn body_inertia(&self, body: BodyHandle) -> Option<Vec3> {
        self.bodies.get(&body).map(|b| b.inertia)
    }

    fn allocate(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn guard_structural(&self, operation: &'static str) -> BackendResult<()> {
        if self.simulating {
            log::error!("Rejected '{operation}' while a step is in flight");
            return Err(BackendError::SimulationRunning(operation));
        }
        Ok(())
    }

    fn multibody(&self, multibody: MultibodyHandle) -> BackendResult<&MultibodyState> {
        self.multibodies
            .get(&multibody)
            .ok_or(BackendError::InvalidHandle {
                kind: "articulation",
                handle: multibody.0,
            })
    }

    fn multibody_mut(&mut self, multibody: MultibodyHandle) -> BackendResult<&mut MultibodyState> {
        self.multibodies
            .get_mut(&multibody)
            .ok_or(BackendError::InvalidHandle {
                kind: "articulation",
                handle: multibody.0,
            })
    }

    fn check_cache(state: &MultibodyState, cache: CacheHandle) -> BackendResult<()> {
        if state.caches.contains(&cache) {
            Ok(())
        } else {
            Err(BackendError::InvalidHandle {
                kind: "cache",
                handle: cache.0,
            })
        }
    }

    fn check_len(expected: usize, actual: usize) -> BackendResult<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(BackendError::InvalidArgument(format!(
                "expected {expected} values, got {actual}"
            )))
        }
    }

    /// Inertia of each internal dof
    fn dof_inertia(&self, state: &MultibodyState) -> Vec<f32> {
        state
            .dof_link
            .iter()
            .map(|&link| {
                let body = state.links[state.internal_order[link]];
                self.bodies
                    .get(&body)
                    .map_or(1.0, |b| b.mass)
                    .max(f32::EPSILON)
            })
            .collect()
    }

    fn passive_force(state: &MultibodyState, terms: PassiveForceTerms) -> Vec<f32> {
        let qvel = state.array(DofArray::Velocity);
        if terms.contains(PassiveForceTerms::EXTERNAL) {
            qvel.iter()
                .zip(&state.damping)
                .map(|(v, d)| -d * v)
                .collect()
        } else {
            vec![0.0; state.dof()]
        }
    }

    /// Forward kinematics of one link from the current joint positions
    fn link_pose(&self, state: &MultibodyState, link: usize) -> Pose {
        let qpos = state.array(DofArray::Position);
        let mut chain = Vec::new();
        let mut current = Some(link);
        while let Some(index) = current {
            chain.push(index);
            current = state.desc.links[index].parent;
        }
        let mut pose = state.root_pose;
        for &index in chain.iter().rev().skip(1) {
            let joint = &state.desc.links[index].joint;
            let start = state.dof_start[index];
            let q = &qpos[start..start + joint.kind.dof()];
            let motion = match joint.kind {
                JointKind::Fixed => Pose::identity(),
                JointKind::Revolute => {
                    Pose::from_parts(Translation3::identity(), Quat::from_euler_angles(q[0], 0.0, 0.0))
                }
                JointKind::Prismatic => {
                    Pose::from_parts(Translation3::new(q[0], 0.0, 0.0), Quat::identity())
                }
                JointKind::Spherical => Pose::from_parts(
                    Translation3::identity(),
                    Quat::from_euler_angles(q[0], q[1], q[2]),
                ),
            };
            pose = pose * joint.pose_in_parent * motion * joint.pose_in_child.inverse();
        }
        pose
    }
}

impl Default for HeadlessPhysics {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsBackend for HeadlessPhysics {
    fn create_material(&mut self, desc: &PhysicalMaterialDesc) -> BackendResult<MaterialHandle> {
        let handle = MaterialHandle(self.allocate());
        self.materials.insert(handle, *desc);
        Ok(handle)
    }

    fn create_shape(&mut self, desc: &ShapeDesc) -> BackendResult<ShapeHandle> {
        if self.fail_shape_creation {
            return Err(BackendError::CreationFailed {
                kind: "shape",
                reason: format!("{} creation disabled", desc.geometry.type_name()),
            });
        }
        if !self.materials.contains_key(&desc.material) {
            return Err(BackendError::InvalidHandle {
                kind: "material",
                handle: desc.material.0,
            });
        }
        let invalid = match &desc.geometry {
            Geometry::Box { half_extents } => half_extents.iter().any(|v| *v <= 0.0),
            Geometry::Sphere { radius } => *radius <= 0.0,
            Geometry::Capsule {
                radius,
                half_length,
            } => *radius <= 0.0 || *half_length < 0.0,
            Geometry::Plane => false,
            Geometry::ConvexMesh(convex) => convex.mesh.polygons().is_empty(),
        };
        if invalid {
            return Err(BackendError::CreationFailed {
                kind: "shape",
                reason: format!("degenerate {} geometry", desc.geometry.type_name()),
            });
        }
        let handle = ShapeHandle(self.allocate());
        self.shapes.insert(
            handle,
            ShapeState {
                desc: desc.clone(),
                body: None,
            },
        );
        Ok(handle)
    }

    fn release_shape(&mut self, shape: ShapeHandle) {
        if let Some(state) = self.shapes.remove(&shape) {
            if let Some(body) = state.body.and_then(|b| self.bodies.get_mut(&b)) {
                body.shapes.retain(|s| *s != shape);
            }
        }
    }

    fn shape_geometry(&self, shape: ShapeHandle) -> Option<Geometry> {
        self.shapes.get(&shape).map(|s| s.desc.geometry.clone())
    }

    fn shape_local_pose(&self, shape: ShapeHandle) -> Option<Pose> {
        self.shapes.get(&shape).map(|s| s.desc.local_pose)
    }

    fn shape_filter(&self, shape: ShapeHandle) -> Option<CollisionGroups> {
        self.shapes.get(&shape).map(|s| s.desc.filter)
    }

    fn set_shape_filter(&mut self, shape: ShapeHandle, filter: CollisionGroups) {
        if let Some(state) = self.shapes.get_mut(&shape) {
            state.desc.filter = filter;
        }
    }

    fn create_body(&mut self, kind: BodyKind, pose: Pose) -> BackendResult<BodyHandle> {
        let handle = BodyHandle(self.allocate());
        self.bodies.insert(handle, BodyState::new(kind, pose));
        Ok(handle)
    }

    fn attach_shape(&mut self, body: BodyHandle, shape: ShapeHandle) -> BackendResult<()> {
        let state = self.shapes.get_mut(&shape).ok_or(BackendError::InvalidHandle {
            kind: "shape",
            handle: shape.0,
        })?;
        let target = self.bodies.get_mut(&body).ok_or(BackendError::InvalidHandle {
            kind: "body",
            handle: body.0,
        })?;
        if state.body.is_some() {
            return Err(BackendError::InvalidArgument(format!(
                "shape {} is already attached",
                shape.0
            )));
        }
        state.body = Some(body);
        target.shapes.push(shape);
        Ok(())
    }

    fn set_mass_properties(
        &mut self,
        body: BodyHandle,
        mass: &MassProperties,
    ) -> BackendResult<()> {
        let state = self.bodies.get(&body).ok_or(BackendError::InvalidHandle {
            kind: "body",
            handle: body.0,
        })?;
        let (total, inertia) = match mass {
            MassProperties::FromDensities(densities) => {
                Self::check_len(state.shapes.len(), densities.len())?;
                let mut total = 0.0;
                for (shape, density) in state.shapes.iter().zip(densities) {
                    let volume = self
                        .shapes
                        .get(shape)
                        .and_then(|s| s.desc.geometry.volume())
                        .unwrap_or(0.0);
                    total += volume * density;
                }
                (total, Vec3::new(total, total, total))
            }
            MassProperties::Explicit { mass, inertia, .. } => (*mass, *inertia),
        };
        if let Some(state) = self.bodies.get_mut(&body) {
            state.mass = total;
            state.inertia = inertia;
        }
        Ok(())
    }

    fn configure_body(
        &mut self,
        body: BodyHandle,
        _sleep_threshold: f32,
        _position_iterations: u32,
        _velocity_iterations: u32,
    ) {
        if !self.bodies.contains_key(&body) {
            log::warn!("configure_body on unknown body {}", body.0);
        }
    }

    fn add_body(&mut self, body: BodyHandle) -> BackendResult<()> {
        self.guard_structural("add_body")?;
        let state = self.bodies.get_mut(&body).ok_or(BackendError::InvalidHandle {
            kind: "body",
            handle: body.0,
        })?;
        state.in_world = true;
        Ok(())
    }

    fn remove_body(&mut self, body: BodyHandle) {
        if self.guard_structural("remove_body").is_err() {
            return;
        }
        if let Some(state) = self.bodies.get_mut(&body) {
            state.in_world = false;
        }
    }

    fn release_body(&mut self, body: BodyHandle) {
        if self.guard_structural("release_body").is_err() {
            return;
        }
        if let Some(state) = self.bodies.remove(&body) {
            for shape in state.shapes {
                self.shapes.remove(&shape);
            }
        }
    }

    fn body_pose(&self, body: BodyHandle) -> Option<Pose> {
        let state = self.bodies.get(&body)?;
        match state.link_of {
            Some((multibody, link)) => {
                let mb = self.multibodies.get(&multibody)?;
                Some(self.link_pose(mb, link))
            }
            None => Some(state.pose),
        }
    }

    fn set_body_pose(&mut self, body: BodyHandle, pose: Pose) {
        if let Some(state) = self.bodies.get_mut(&body) {
            if state.link_of.is_some() {
                log::warn!("Link poses follow their articulation; set the root pose instead");
                return;
            }
            state.pose = pose;
        }
    }

    fn body_velocity(&self, body: BodyHandle) -> Option<(Vec3, Vec3)> {
        self.bodies
            .get(&body)
            .map(|b| (b.linear_velocity, b.angular_velocity))
    }

    fn body_mass(&self, body: BodyHandle) -> Option<f32> {
        self.bodies.get(&body).map(|b| b.mass)
    }

    fn add_force_torque(&mut self, body: BodyHandle, force: Vec3, torque: Vec3) {
        if let Some(state) = self.bodies.get_mut(&body) {
            state.force += force;
            state.torque += torque;
            state.sleeping = false;
        }
    }

    fn set_damping(&mut self, body: BodyHandle, linear: f32, angular: f32) {
        if let Some(state) = self.bodies.get_mut(&body) {
            state.damping = (linear, angular);
        }
    }

    fn wake_body(&mut self, body: BodyHandle) {
        if let Some(state) = self.bodies.get_mut(&body) {
            state.sleeping = false;
        }
    }

    fn put_body_to_sleep(&mut self, body: BodyHandle) {
        if let Some(state) = self.bodies.get_mut(&body) {
            if state.kind == BodyKind::Dynamic {
                state.sleeping = true;
                state.linear_velocity = Vec3::zeros();
                state.angular_velocity = Vec3::zeros();
            }
        }
    }

    fn is_body_sleeping(&self, body: BodyHandle) -> bool {
        self.bodies.get(&body).is_some_and(|b| b.sleeping)
    }

    fn create_articulation(&mut self, desc: &ArticulationDesc) -> BackendResult<ArticulationParts> {
        if desc.links.is_empty() {
            return Err(BackendError::InvalidArgument(
                "articulation has no links".to_string(),
            ));
        }
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); desc.links.len()];
        let mut root = None;
        for (index, link) in desc.links.iter().enumerate() {
            match link.parent {
                None if root.is_none() => root = Some(index),
                None => {
                    return Err(BackendError::InvalidArgument(
                        "articulation has more than one root".to_string(),
                    ))
                }
                Some(parent) if parent < index => children[parent].push(index),
                Some(parent) => {
                    return Err(BackendError::InvalidArgument(format!(
                        "link {index} references parent {parent} that is not defined before it"
                    )))
                }
            }
            if link.parent.is_some() && link.joint.limits.len() != link.joint.kind.dof() {
                return Err(BackendError::InvalidArgument(format!(
                    "link {index} has {} limits for {} dofs",
                    link.joint.limits.len(),
                    link.joint.kind.dof()
                )));
            }
        }
        let root = root.ok_or_else(|| {
            BackendError::InvalidArgument("articulation has no root".to_string())
        })?;

        // Breadth-first, children in reverse authoring order
        let mut internal_order = Vec::with_capacity(desc.links.len());
        let mut queue = std::collections::VecDeque::from([root]);
        while let Some(index) = queue.pop_front() {
            internal_order.push(index);
            for &child in children[index].iter().rev() {
                queue.push_back(child);
            }
        }
        let mut internal_index = vec![0; desc.links.len()];
        for (internal, &external) in internal_order.iter().enumerate() {
            internal_index[external] = internal;
        }

        let mut dof_link = Vec::new();
        let mut dof_start = vec![0; desc.links.len()];
        let mut limits = Vec::new();
        let mut damping = Vec::new();
        for (internal, &external) in internal_order.iter().enumerate() {
            dof_start[external] = dof_link.len();
            let link = &desc.links[external];
            if link.parent.is_none() {
                continue;
            }
            for axis in 0..link.joint.kind.dof() {
                dof_link.push(internal);
                limits.push(link.joint.limits[axis]);
                damping.push(link.joint.damping);
            }
        }

        let multibody = MultibodyHandle(self.allocate());
        let mut links = Vec::with_capacity(desc.links.len());
        for index in 0..desc.links.len() {
            let handle = BodyHandle(self.allocate());
            let mut body = BodyState::new(BodyKind::Dynamic, desc.root_pose);
            body.link_of = Some((multibody, index));
            self.bodies.insert(handle, body);
            links.push(handle);
        }

        let dof = dof_link.len();
        let arrays = DOF_ARRAYS.iter().map(|a| (*a, vec![0.0; dof])).collect();
        self.multibodies.insert(
            multibody,
            MultibodyState {
                desc: desc.clone(),
                links: links.clone(),
                internal_order,
                internal_index,
                dof_link,
                dof_start,
                arrays,
                limits,
                damping,
                joint_drives: HashMap::new(),
                root_pose: desc.root_pose,
                root_velocity: (Vec3::zeros(), Vec3::zeros()),
                caches: HashSet::new(),
                in_world: false,
                sleeping: false,
            },
        );
        Ok(ArticulationParts { multibody, links })
    }

    fn link_internal_index(&self, multibody: MultibodyHandle, link: BodyHandle) -> Option<usize> {
        let state = self.multibodies.get(&multibody)?;
        let external = state.links.iter().position(|l| *l == link)?;
        Some(state.internal_index[external])
    }

    fn add_articulation(&mut self, multibody: MultibodyHandle) -> BackendResult<()> {
        self.guard_structural("add_articulation")?;
        let links = {
            let state = self.multibody_mut(multibody)?;
            state.in_world = true;
            state.links.clone()
        };
        for link in links {
            if let Some(body) = self.bodies.get_mut(&link) {
                body.in_world = true;
            }
        }
        Ok(())
    }

    fn remove_articulation(&mut self, multibody: MultibodyHandle) {
        if self.guard_structural("remove_articulation").is_err() {
            return;
        }
        let Some(state) = self.multibodies.get_mut(&multibody) else {
            return;
        };
        state.in_world = false;
        for link in state.links.clone() {
            if let Some(body) = self.bodies.get_mut(&link) {
                body.in_world = false;
            }
        }
    }

    fn release_articulation(&mut self, multibody: MultibodyHandle) {
        if self.guard_structural("release_articulation").is_err() {
            return;
        }
        if let Some(state) = self.multibodies.remove(&multibody) {
            for link in state.links {
                if let Some(body) = self.bodies.remove(&link) {
                    for shape in body.shapes {
                        self.shapes.remove(&shape);
                    }
                }
            }
        }
    }

    fn wake_articulation(&mut self, multibody: MultibodyHandle) {
        if let Some(state) = self.multibodies.get_mut(&multibody) {
            state.sleeping = false;
        }
    }

    fn put_articulation_to_sleep(&mut self, multibody: MultibodyHandle) {
        if let Some(state) = self.multibodies.get_mut(&multibody) {
            state.sleeping = true;
        }
    }

    fn is_articulation_sleeping(&self, multibody: MultibodyHandle) -> bool {
        self.multibodies.get(&multibody).is_some_and(|m| m.sleeping)
    }

    fn read_dofs(&self, multibody: MultibodyHandle, array: DofArray) -> BackendResult<Vec<f32>> {
        Ok(self.multibody(multibody)?.array(array))
    }

    fn write_dofs(
        &mut self,
        multibody: MultibodyHandle,
        array: DofArray,
        values: &[f32],
    ) -> BackendResult<()> {
        let state = self.multibody_mut(multibody)?;
        Self::check_len(state.dof(), values.len())?;
        state.arrays.insert(array, values.to_vec());
        Ok(())
    }

    fn read_limits(&self, multibody: MultibodyHandle) -> BackendResult<Vec<[f32; 2]>> {
        Ok(self.multibody(multibody)?.limits.clone())
    }

    fn write_limits(
        &mut self,
        multibody: MultibodyHandle,
        limits: &[[f32; 2]],
    ) -> BackendResult<()> {
        let state = self.multibody_mut(multibody)?;
        Self::check_len(state.dof(), limits.len())?;
        state.limits = limits.to_vec();
        Ok(())
    }

    fn root_pose(&self, multibody: MultibodyHandle) -> Option<Pose> {
        self.multibodies.get(&multibody).map(|m| m.root_pose)
    }

    fn set_root_pose(&mut self, multibody: MultibodyHandle, pose: Pose) {
        if let Some(state) = self.multibodies.get_mut(&multibody) {
            state.root_pose = pose;
        }
    }

    fn set_root_velocity(&mut self, multibody: MultibodyHandle, linear: Vec3, angular: Vec3) {
        if let Some(state) = self.multibodies.get_mut(&multibody) {
            state.root_velocity = (linear, angular);
        }
    }

    fn set_joint_drive(
        &mut self,
        multibody: MultibodyHandle,
        link: BodyHandle,
        drive: &DriveProperties,
    ) -> BackendResult<()> {
        let state = self.multibody_mut(multibody)?;
        if !state.links.contains(&link) {
            return Err(BackendError::InvalidHandle {
                kind: "link",
                handle: link.0,
            });
        }
        state.joint_drives.insert(link, *drive);
        Ok(())
    }

    fn create_cache(&mut self, multibody: MultibodyHandle) -> BackendResult<CacheHandle> {
        let handle = CacheHandle(self.allocate());
        self.multibody_mut(multibody)?.caches.insert(handle);
        Ok(handle)
    }

    fn reset_cache(&mut self, multibody: MultibodyHandle, cache: CacheHandle) {
        if let Some(state) = self.multibodies.get(&multibody) {
            if !state.caches.contains(&cache) {
                log::warn!("reset_cache on unknown cache {}", cache.0);
            }
        }
    }

    fn release_cache(&mut self, multibody: MultibodyHandle, cache: CacheHandle) {
        if let Some(state) = self.multibodies.get_mut(&multibody) {
            state.caches.remove(&cache);
        }
    }

    fn compute_passive_force(
        &mut self,
        multibody: MultibodyHandle,
        cache: CacheHandle,
        terms: PassiveForceTerms,
    ) -> BackendResult<Vec<f32>> {
        let state = self.multibody(multibody)?;
        Self::check_cache(state, cache)?;
        Ok(Self::passive_force(state, terms))
    }

    fn compute_inverse_dynamics(
        &mut self,
        multibody: MultibodyHandle,
        cache: CacheHandle,
        qacc: &[f32],
    ) -> BackendResult<Vec<f32>> {
        let state = self.multibody(multibody)?;
        Self::check_cache(state, cache)?;
        Self::check_len(state.dof(), qacc.len())?;
        let inertia = self.dof_inertia(state);
        let passive = Self::passive_force(state, PassiveForceTerms::all());
        Ok(qacc
            .iter()
            .zip(inertia)
            .zip(passive)
            .map(|((a, m), p)| m * a - p)
            .collect())
    }

    fn compute_forward_dynamics(
        &mut self,
        multibody: MultibodyHandle,
        cache: CacheHandle,
        qf: &[f32],
    ) -> BackendResult<Vec<f32>> {
        let state = self.multibody(multibody)?;
        Self::check_cache(state, cache)?;
        Self::check_len(state.dof(), qf.len())?;
        let inertia = self.dof_inertia(state);
        let passive = Self::passive_force(state, PassiveForceTerms::all());
        Ok(qf
            .iter()
            .zip(inertia)
            .zip(passive)
            .map(|((f, m), p)| (f + p) / m)
            .collect())
    }

    fn compute_jacobian(
        &mut self,
        multibody: MultibodyHandle,
        cache: CacheHandle,
    ) -> BackendResult<Matrix> {
        let state = self.multibody(multibody)?;
        Self::check_cache(state, cache)?;
        let link_count = state.links.len();
        let root_columns = if state.desc.fix_base { 0 } else { 6 };
        let mut jacobian = Matrix::zeros(6 * link_count, root_columns + state.dof());
        for link in 0..link_count {
            for r in 0..6 {
                if root_columns > 0 {
                    jacobian[(6 * link + r, r)] = 1.0;
                }
                for (dof, &dof_link) in state.dof_link.iter().enumerate() {
                    if state.is_ancestor_or_self(dof_link, link) {
                        jacobian[(6 * link + r, root_columns + dof)] = (r + 1) as f32;
                    }
                }
            }
        }
        Ok(jacobian)
    }

    fn create_drive_joint(
        &mut self,
        body0: Option<BodyHandle>,
        pose0: Pose,
        body1: Option<BodyHandle>,
        pose1: Pose,
    ) -> BackendResult<JointHandle> {
        for body in [body0, body1].into_iter().flatten() {
            if !self.bodies.contains_key(&body) {
                return Err(BackendError::InvalidHandle {
                    kind: "body",
                    handle: body.0,
                });
            }
        }
        let handle = JointHandle(self.allocate());
        self.drive_joints.insert(
            handle,
            DriveJointState {
                bodies: [body0, body1],
                poses: [pose0, pose1],
                drive: DriveProperties::default(),
                target: Pose::identity(),
            },
        );
        Ok(handle)
    }

    fn release_drive_joint(&mut self, joint: JointHandle) {
        self.drive_joints.remove(&joint);
    }

    fn set_drive_joint_properties(&mut self, joint: JointHandle, drive: &DriveProperties) {
        if let Some(state) = self.drive_joints.get_mut(&joint) {
            state.drive = *drive;
        }
    }

    fn set_drive_joint_target(&mut self, joint: JointHandle, target: Pose) {
        if let Some(state) = self.drive_joints.get_mut(&joint) {
            state.target = target;
        }
    }

    fn simulate(&mut self, dt: f32) -> BackendResult<()> {
        if self.simulating {
            return Err(BackendError::SimulationRunning("simulate"));
        }
        self.simulating = true;
        self.pending_dt = dt;
        Ok(())
    }

    fn fetch_results(&mut self, _block: bool) -> bool {
        if !self.simulating {
            return true;
        }
        let dt = self.pending_dt;
        let gravity = self.gravity;
        for body in self.bodies.values_mut() {
            if body.kind != BodyKind::Dynamic || body.link_of.is_some() || !body.in_world {
                continue;
            }
            if body.sleeping {
                body.force = Vec3::zeros();
                body.torque = Vec3::zeros();
                continue;
            }
            let inv_mass = if body.mass > 0.0 { 1.0 / body.mass } else { 0.0 };
            body.linear_velocity += (gravity + body.force * inv_mass) * dt;
            body.linear_velocity *= 1.0 / (1.0 + dt * body.damping.0);
            body.angular_velocity += body.torque.component_div(&body.inertia.map(|v| v.max(f32::EPSILON))) * dt;
            body.angular_velocity *= 1.0 / (1.0 + dt * body.damping.1);
            body.pose.translation.vector += body.linear_velocity * dt;
            body.force = Vec3::zeros();
            body.torque = Vec3::zeros();
        }
        for state in self.multibodies.values_mut() {
            if !state.in_world || state.sleeping {
                continue;
            }
            let qvel = state.array(DofArray::Velocity);
            if let Some(qpos) = state.arrays.get_mut(&DofArray::Position) {
                for (q, v) in qpos.iter_mut().zip(&qvel) {
                    *q += v * dt;
                }
            }
            if !state.desc.fix_base {
                state.root_pose.translation.vector += state.root_velocity.0 * dt;
            }
        }
        self.simulating = false;
        self.step_count += 1;
        self.delivered_contacts.append(&mut self.queued_contacts);
        self.delivered_triggers.append(&mut self.queued_triggers);
        true
    }

    fn drain_contact_events(&mut self) -> Vec<ContactEvent> {
        std::mem::take(&mut self.delivered_contacts)
    }

    fn drain_trigger_events(&mut self) -> Vec<TriggerEvent> {
        std::mem::take(&mut self.delivered_triggers)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
