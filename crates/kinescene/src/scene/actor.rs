//! Rigid actors and the body state they share with articulation links

use crate::events::{EventHandler, EventKind, EventRegistry, SubscriptionId};
use crate::foundation::ids::{ActorId, RenderId};
use crate::foundation::math::{Pose, Vec3};
use crate::physics::{BodyHandle, BodyKind, CollisionGroups, PhysicsBackend, ShapeHandle};
use crate::render::{RenderBackend, RenderBodyHandle};
use crate::scene::release::{Orphan, ReleaseQueue};
use crate::scene::{DriveId, SceneId};

/// Destruction state of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestroyState {
    /// Registered and stepped
    Alive,
    /// Removed from the world; physically erased at the next cleanup point
    PendingRemoval,
}

/// One renderer proxy owned by a body
#[derive(Debug, Clone, PartialEq)]
pub struct RenderProxy {
    /// Backend handle
    pub handle: RenderBodyHandle,
    /// Scene-unique render id
    pub render_id: RenderId,
    /// Visual name
    pub name: String,
}

/// State shared by rigid actors and articulation links
#[derive(Debug)]
pub struct BodyCore {
    pub(crate) id: ActorId,
    pub(crate) name: String,
    pub(crate) body: BodyHandle,
    pub(crate) shapes: Vec<ShapeHandle>,
    pub(crate) visuals: Vec<RenderProxy>,
    pub(crate) collision_visuals: Vec<RenderProxy>,
    pub(crate) drives: Vec<DriveId>,
    pub(crate) collision_groups: CollisionGroups,
    pub(crate) state: DestroyState,
    pub(crate) events: EventRegistry,
}

impl BodyCore {
    pub(crate) fn new(id: ActorId, name: &str, body: BodyHandle, groups: CollisionGroups) -> Self {
        Self {
            id,
            name: name.to_string(),
            body,
            shapes: Vec::new(),
            visuals: Vec::new(),
            collision_visuals: Vec::new(),
            drives: Vec::new(),
            collision_groups: groups,
            state: DestroyState::Alive,
            events: EventRegistry::new(),
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.state == DestroyState::Alive
    }

    /// Every proxy, visual and collision
    pub(crate) fn all_proxies(&self) -> impl Iterator<Item = &RenderProxy> {
        self.visuals.iter().chain(&self.collision_visuals)
    }

    pub(crate) fn proxy_handles(&self) -> Vec<RenderBodyHandle> {
        self.all_proxies().map(|proxy| proxy.handle).collect()
    }

    pub(crate) fn destroy_proxies(&self, renderer: Option<&mut Box<dyn RenderBackend>>) {
        if let Some(renderer) = renderer {
            for proxy in self.all_proxies() {
                renderer.destroy(proxy.handle);
            }
        }
    }
}

/// Read access common to actors and links
pub trait SceneBody {
    /// Shared body state
    fn core(&self) -> &BodyCore;

    /// Scene-unique id
    fn id(&self) -> ActorId {
        self.core().id
    }

    /// Name given at build time
    fn name(&self) -> &str {
        &self.core().name
    }

    /// Backend body handle
    fn body_handle(&self) -> BodyHandle {
        self.core().body
    }

    /// Collision shapes, in build order
    fn collision_shapes(&self) -> &[ShapeHandle] {
        &self.core().shapes
    }

    /// Visual proxies
    fn visual_bodies(&self) -> &[RenderProxy] {
        &self.core().visuals
    }

    /// Collision visualization proxies, one per collision shape
    fn collision_bodies(&self) -> &[RenderProxy] {
        &self.core().collision_visuals
    }

    /// Drives attached to this body
    fn drives(&self) -> &[DriveId] {
        &self.core().drives
    }

    /// Filter words every shape of this body was built with
    fn collision_groups(&self) -> CollisionGroups {
        self.core().collision_groups
    }

    /// Destruction state
    fn destroy_state(&self) -> DestroyState {
        self.core().state
    }

    /// Whether removal was requested
    fn is_pending_removal(&self) -> bool {
        self.core().state == DestroyState::PendingRemoval
    }
}

/// A rigid body owned by a scene
#[derive(Debug)]
pub struct Actor {
    pub(crate) core: BodyCore,
    pub(crate) kind: BodyKind,
    pub(crate) scene: SceneId,
    /// Set until the scene takes ownership
    pub(crate) release: Option<ReleaseQueue>,
}

impl Actor {
    pub(crate) fn new(core: BodyCore, kind: BodyKind, scene: SceneId, release: ReleaseQueue) -> Self {
        Self {
            core,
            kind,
            scene,
            release: Some(release),
        }
    }

    /// Static, kinematic or dynamic
    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    /// Scene this actor was built for
    pub fn scene_id(&self) -> SceneId {
        self.scene
    }
}

impl Drop for Actor {
    fn drop(&mut self) {
        if let Some(queue) = self.release.take() {
            log::debug!("Actor {} dropped before being added; queueing release", self.core.id);
            queue.push(Orphan::Body {
                body: self.core.body,
                proxies: self.core.proxy_handles(),
            });
        }
    }
}

impl SceneBody for Actor {
    fn core(&self) -> &BodyCore {
        &self.core
    }
}

/// Mutable view of an actor or link together with the backends it lives in
pub struct ActorMut<'a> {
    pub(crate) core: &'a mut BodyCore,
    pub(crate) physics: &'a mut Box<dyn PhysicsBackend>,
    pub(crate) renderer: &'a mut Option<Box<dyn RenderBackend>>,
    /// Links wake through their articulation
    pub(crate) wake_target: WakeTarget,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum WakeTarget {
    Body(BodyHandle),
    Articulation(crate::physics::MultibodyHandle),
}

impl ActorMut<'_> {
    /// Scene-unique id
    pub fn id(&self) -> ActorId {
        self.core.id
    }

    /// World pose
    pub fn pose(&self) -> Pose {
        self.physics.body_pose(self.core.body).unwrap_or_else(Pose::identity)
    }

    /// Teleport the body
    pub fn set_pose(&mut self, pose: Pose) {
        self.physics.set_body_pose(self.core.body, pose);
    }

    /// Linear velocity
    pub fn velocity(&self) -> Vec3 {
        self.physics.body_velocity(self.core.body).map_or_else(Vec3::zeros, |(v, _)| v)
    }

    /// Angular velocity
    pub fn angular_velocity(&self) -> Vec3 {
        self.physics.body_velocity(self.core.body).map_or_else(Vec3::zeros, |(_, w)| w)
    }

    /// Mass
    pub fn mass(&self) -> f32 {
        self.physics.body_mass(self.core.body).unwrap_or(0.0)
    }

    /// Accumulate a force and torque for the next step
    pub fn add_force_torque(&mut self, force: Vec3, torque: Vec3) {
        self.physics.add_force_torque(self.core.body, force, torque);
    }

    /// Linear and angular damping
    pub fn set_damping(&mut self, linear: f32, angular: f32) {
        self.physics.set_damping(self.core.body, linear, angular);
    }

    /// Wake the body (or its articulation)
    pub fn wake_up(&mut self) {
        match self.wake_target {
            WakeTarget::Body(body) => self.physics.wake_body(body),
            WakeTarget::Articulation(multibody) => self.physics.wake_articulation(multibody),
        }
    }

    /// Force the body (or its articulation) to sleep
    pub fn put_to_sleep(&mut self) {
        match self.wake_target {
            WakeTarget::Body(body) => self.physics.put_body_to_sleep(body),
            WakeTarget::Articulation(multibody) => {
                self.physics.put_articulation_to_sleep(multibody);
            }
        }
    }

    /// Whether the body (or its articulation) is asleep
    pub fn is_sleeping(&self) -> bool {
        match self.wake_target {
            WakeTarget::Body(body) => self.physics.is_body_sleeping(body),
            WakeTarget::Articulation(multibody) => self.physics.is_articulation_sleeping(multibody),
        }
    }

    /// Show collision proxies instead of visual ones, or switch back
    pub fn render_collision_bodies(&mut self, collision: bool) {
        let Some(renderer) = self.renderer.as_mut() else {
            log::warn!("render_collision_bodies on {} without a renderer", self.core.id);
            return;
        };
        for proxy in &self.core.visuals {
            renderer.set_visible(proxy.handle, !collision);
        }
        for proxy in &self.core.collision_visuals {
            renderer.set_visible(proxy.handle, collision);
        }
    }

    /// Hide every visual proxy
    pub fn hide_visual(&mut self) {
        self.set_visuals_visible(false);
    }

    /// Show every visual proxy
    pub fn unhide_visual(&mut self) {
        self.set_visuals_visible(true);
    }

    /// Opacity of every visual proxy
    pub fn set_display_visibility(&mut self, visibility: f32) {
        if let Some(renderer) = self.renderer.as_mut() {
            for proxy in &self.core.visuals {
                renderer.set_visibility(proxy.handle, visibility);
            }
        }
    }

    fn set_visuals_visible(&mut self, visible: bool) {
        if let Some(renderer) = self.renderer.as_mut() {
            for proxy in &self.core.visuals {
                renderer.set_visible(proxy.handle, visible);
            }
        }
    }

    /// Register a handler on this body's registry
    pub fn subscribe(&mut self, kind: EventKind, handler: Box<dyn EventHandler>) -> SubscriptionId {
        self.core.events.subscribe(kind, handler)
    }

    /// Remove a handler from this body's registry
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.core.events.unsubscribe(id)
    }
}
