//! Scene - the entity owner
//!
//! Owns actors, articulations, drives, mounted cameras and contact state, and
//! drives the physics backend through its submit/fetch protocol.
//!
//! Entities are stored in slot maps and found through id lookup tables. The
//! lookup tables only ever contain live entities: phase one of a removal
//! erases the lookup entry and marks the entity, phase two (the cleanup run
//! at the end of every step) erases the slot and releases backend handles.

use super::actor::{Actor, ActorMut, BodyCore, WakeTarget};
use super::camera::{CameraSpec, MountedCamera};
use super::drive::Drive;
use super::release::{Orphan, ReleaseQueue};
use super::{ActorKey, ArticulationHandle, CameraId, DriveId, SceneId};
use crate::articulation::{Articulation, ArticulationMut, Link};
use crate::assets::MeshCache;
use crate::builder::{ActorBuilder, ArticulationBuilder, BuildContext, BuildError};
use crate::config::{ConfigError, SceneConfig};
use crate::events::{Event, EventHandler, EventKind, EventRegistry, SubscriptionId};
use crate::foundation::ids::{ActorId, IdGenerator, RenderId};
use crate::foundation::math::{Pose, Vec3};
use crate::physics::{
    BackendError, BodyHandle, Contact, ContactTracker, DriveProperties, HeadlessPhysics,
    MaterialHandle, PhysicalMaterialDesc, PhysicsBackend, ShapeHandle,
};
use crate::render::{
    CameraHandle, HeadlessRenderer, RenderBackend, RenderBodyHandle, RenderMaterial,
};
use slotmap::SlotMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Scene-level errors
#[derive(Debug, Error)]
pub enum SceneError {
    /// Entity built for another scene
    #[error("Entity built for {owner} cannot be added to {scene}")]
    ForeignEntity {
        /// Scene the entity was built for
        owner: SceneId,
        /// Scene it was handed to
        scene: SceneId,
    },

    /// Id does not name a live actor or link of this scene
    #[error("Unknown entity {0}")]
    UnknownEntity(ActorId),

    /// `step_async` called while a step is already in flight
    #[error("A step is already in flight")]
    StepInFlight,

    /// Backend rejected the operation
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Invalid scene configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Building a convenience entity failed
    #[error("Build error: {0}")]
    Build(#[from] BuildError),
}

/// A simulation scene
pub struct Scene {
    id: SceneId,
    config: SceneConfig,
    physics: Box<dyn PhysicsBackend>,
    renderer: Option<Box<dyn RenderBackend>>,
    mesh_cache: Arc<MeshCache>,
    default_material: MaterialHandle,

    actors: SlotMap<ActorKey, Actor>,
    actor_lookup: HashMap<ActorId, ActorKey>,
    articulations: SlotMap<ArticulationHandle, Articulation>,
    link_lookup: HashMap<ActorId, (ArticulationHandle, usize)>,
    drives: SlotMap<DriveId, Drive>,
    cameras: SlotMap<CameraId, MountedCamera>,

    contacts: ContactTracker,
    /// Every shape of every registered entity, pending ones included
    shape_owner: HashMap<ShapeHandle, ActorId>,
    /// Handles of entities built here but never added
    release: ReleaseQueue,

    actor_ids: IdGenerator,
    render_ids: IdGenerator,
    events: EventRegistry,
    step_in_flight: bool,
    elapsed: f64,
}

impl Scene {
    /// Create a scene on top of the given backends
    pub fn new(
        config: SceneConfig,
        mut physics: Box<dyn PhysicsBackend>,
        renderer: Option<Box<dyn RenderBackend>>,
    ) -> Result<Self, SceneError> {
        config.validate()?;
        let default_material = physics.create_material(&PhysicalMaterialDesc {
            static_friction: config.static_friction,
            dynamic_friction: config.dynamic_friction,
            restitution: config.restitution,
        })?;
        let id = SceneId::next();
        log::info!(
            "Created {id} (dt = {}s, renderer: {})",
            config.timestep,
            if renderer.is_some() { "yes" } else { "no" }
        );
        Ok(Self {
            id,
            config,
            physics,
            renderer,
            mesh_cache: Arc::new(MeshCache::new()),
            default_material,
            actors: SlotMap::with_key(),
            actor_lookup: HashMap::new(),
            articulations: SlotMap::with_key(),
            link_lookup: HashMap::new(),
            drives: SlotMap::with_key(),
            cameras: SlotMap::with_key(),
            contacts: ContactTracker::new(),
            shape_owner: HashMap::new(),
            release: ReleaseQueue::new(),
            actor_ids: IdGenerator::new(),
            render_ids: IdGenerator::new(),
            events: EventRegistry::new(),
            step_in_flight: false,
            elapsed: 0.0,
        })
    }

    /// Scene on the headless physics backend and headless renderer
    pub fn headless(config: SceneConfig) -> Result<Self, SceneError> {
        let physics = HeadlessPhysics::new().with_gravity(Vec3::from(config.gravity));
        Self::new(config, Box::new(physics), Some(Box::new(HeadlessRenderer::new())))
    }

    /// Share a mesh cache with other scenes
    pub fn with_mesh_cache(mut self, cache: Arc<MeshCache>) -> Self {
        self.mesh_cache = cache;
        self
    }

    /// Scene identity
    pub fn id(&self) -> SceneId {
        self.id
    }

    /// Configuration the scene was created with
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Simulation timestep
    pub fn timestep(&self) -> f32 {
        self.config.timestep
    }

    /// Change the simulation timestep; non-positive values are ignored
    pub fn set_timestep(&mut self, timestep: f32) {
        if timestep > 0.0 && timestep.is_finite() {
            self.config.timestep = timestep;
        } else {
            log::warn!("Ignoring invalid timestep {timestep}");
        }
    }

    /// Simulated time since creation
    pub fn elapsed_time(&self) -> f64 {
        self.elapsed
    }

    /// Whether `step_async` was called without its `step_wait`
    pub fn is_step_in_flight(&self) -> bool {
        self.step_in_flight
    }

    /// Material used by shapes that do not name one
    pub fn default_material(&self) -> MaterialHandle {
        self.default_material
    }

    /// Create a physical material
    pub fn create_physical_material(
        &mut self,
        static_friction: f32,
        dynamic_friction: f32,
        restitution: f32,
    ) -> Result<MaterialHandle, SceneError> {
        let desc = PhysicalMaterialDesc {
            static_friction,
            dynamic_friction,
            restitution,
        };
        Ok(self.physics.create_material(&desc)?)
    }

    /// Physics backend
    pub fn physics(&self) -> &dyn PhysicsBackend {
        self.physics.as_ref()
    }

    /// Physics backend, mutable
    pub fn physics_mut(&mut self) -> &mut dyn PhysicsBackend {
        self.physics.as_mut()
    }

    /// Renderer, if the scene has one
    pub fn renderer(&self) -> Option<&dyn RenderBackend> {
        self.renderer.as_deref()
    }

    /// Renderer, mutable
    pub fn renderer_mut(&mut self) -> Option<&mut (dyn RenderBackend + 'static)> {
        self.renderer.as_deref_mut()
    }

    /// Mesh cache used by builders of this scene
    pub fn mesh_cache(&self) -> &Arc<MeshCache> {
        &self.mesh_cache
    }

    // === Builders ===

    /// Fresh actor builder bound to this scene
    pub fn create_actor_builder(&self) -> ActorBuilder {
        ActorBuilder::new(self.id)
    }

    /// Fresh articulation builder bound to this scene
    pub fn create_articulation_builder(&self) -> ArticulationBuilder {
        ArticulationBuilder::new(self.id)
    }

    pub(crate) fn build_context(&mut self) -> BuildContext<'_> {
        BuildContext {
            scene: self.id,
            physics: &mut self.physics,
            renderer: &mut self.renderer,
            mesh_cache: &self.mesh_cache,
            default_material: self.default_material,
            config: &self.config,
            actor_ids: &mut self.actor_ids,
            render_ids: &mut self.render_ids,
            release: &self.release,
        }
    }

    /// Build and add a static ground plane at `altitude`
    pub fn add_ground(
        &mut self,
        altitude: f32,
        render: bool,
        material: Option<MaterialHandle>,
        render_material: &RenderMaterial,
    ) -> Result<ActorId, SceneError> {
        let builder = self.create_actor_builder();
        let ground = builder.build_ground(self, altitude, render, material, render_material, "ground")?;
        self.add_actor(ground)
    }

    // === Ownership ===

    fn warn_if_stepping(&self, operation: &str) {
        if self.step_in_flight {
            log::warn!("{operation} called between step_async and step_wait");
        }
    }

    /// Take ownership of an actor and insert it into the world
    ///
    /// A rejected actor is dropped and its backend handles are released at
    /// the next cleanup point.
    pub fn add_actor(&mut self, mut actor: Actor) -> Result<ActorId, SceneError> {
        if actor.scene != self.id {
            log::error!("Refusing {} built for {}", actor.core.id, actor.scene);
            return Err(SceneError::ForeignEntity {
                owner: actor.scene,
                scene: self.id,
            });
        }
        self.warn_if_stepping("add_actor");
        if let Err(error) = self.physics.add_body(actor.core.body) {
            log::error!("Failed to add {}: {error}", actor.core.id);
            drop(actor);
            self.release_orphans();
            return Err(error.into());
        }

        actor.release = None;
        let id = actor.core.id;
        for &shape in &actor.core.shapes {
            self.shape_owner.insert(shape, id);
        }
        let key = self.actors.insert(actor);
        self.actor_lookup.insert(id, key);
        log::debug!("Added actor {id} to {}", self.id);
        Ok(id)
    }

    /// Take ownership of an articulation and insert it into the world
    pub fn add_articulation(
        &mut self,
        mut articulation: Articulation,
    ) -> Result<ArticulationHandle, SceneError> {
        if articulation.scene != self.id {
            log::error!(
                "Refusing articulation '{}' built for {}",
                articulation.name,
                articulation.scene
            );
            return Err(SceneError::ForeignEntity {
                owner: articulation.scene,
                scene: self.id,
            });
        }
        self.warn_if_stepping("add_articulation");
        if let Err(error) = self.physics.add_articulation(articulation.multibody) {
            log::error!("Failed to add articulation '{}': {error}", articulation.name);
            drop(articulation);
            self.release_orphans();
            return Err(error.into());
        }

        articulation.release = None;
        let handle = self.articulations.insert(articulation);
        let articulation = &self.articulations[handle];
        for link in &articulation.links {
            let id = link.core.id;
            self.link_lookup.insert(id, (handle, link.index));
            for &shape in &link.core.shapes {
                self.shape_owner.insert(shape, id);
            }
        }
        log::debug!(
            "Added articulation '{}' ({} links) to {}",
            articulation.name,
            articulation.links.len(),
            self.id
        );
        Ok(handle)
    }

    /// Phase one of removing an actor
    ///
    /// Notifies pre-destroy listeners, detaches drives and mounted cameras,
    /// destroys render proxies and takes the body out of the world. The actor
    /// is released at the next cleanup point. Returns false (and logs) if the
    /// id does not name a live actor.
    pub fn remove_actor(&mut self, id: ActorId) -> bool {
        let Some(&key) = self.actor_lookup.get(&id) else {
            log::warn!("remove_actor: {id} is not a live actor of {}", self.id);
            return false;
        };
        self.warn_if_stepping("remove_actor");
        let drives = match self.actors.get_mut(key) {
            Some(actor) => {
                actor.core.events.emit(&Event::ActorPreDestroy { actor: id });
                actor.core.drives.clone()
            }
            None => return false,
        };
        self.detach_body(id, &drives);

        if let Some(actor) = self.actors.get_mut(key) {
            actor.core.destroy_proxies(self.renderer.as_mut());
            actor.core.visuals.clear();
            actor.core.collision_visuals.clear();
            self.physics.remove_body(actor.core.body);
            actor.core.state = super::DestroyState::PendingRemoval;
        }
        self.actor_lookup.remove(&id);
        log::debug!("Marked actor {id} for removal");
        true
    }

    /// Phase one of removing an articulation and all of its links
    pub fn remove_articulation(&mut self, handle: ArticulationHandle) -> bool {
        let links = match self.articulations.get_mut(handle) {
            Some(articulation) if articulation.state == super::DestroyState::Alive => {
                articulation
                    .events
                    .emit(&Event::ArticulationPreDestroy { articulation: handle });
                articulation
                    .links
                    .iter_mut()
                    .map(|link| {
                        let id = link.core.id;
                        link.core.events.emit(&Event::ActorPreDestroy { actor: id });
                        (id, link.core.drives.clone())
                    })
                    .collect::<Vec<_>>()
            }
            _ => {
                log::warn!("remove_articulation: handle is not a live articulation of {}", self.id);
                return false;
            }
        };
        self.warn_if_stepping("remove_articulation");
        for (id, drives) in &links {
            self.detach_body(*id, drives);
        }

        if let Some(articulation) = self.articulations.get_mut(handle) {
            for link in &mut articulation.links {
                link.core.destroy_proxies(self.renderer.as_mut());
                link.core.visuals.clear();
                link.core.collision_visuals.clear();
                link.core.state = super::DestroyState::PendingRemoval;
            }
            self.physics.remove_articulation(articulation.multibody);
            articulation.state = super::DestroyState::PendingRemoval;
        }
        for (id, _) in &links {
            self.link_lookup.remove(id);
        }
        log::debug!("Marked articulation for removal ({} links)", links.len());
        true
    }

    /// Detach every drive and mounted camera referencing `id`
    fn detach_body(&mut self, id: ActorId, drives: &[DriveId]) {
        for &drive in drives {
            self.detach_drive(drive, Some(id));
        }
        let mounted: Vec<CameraId> = self
            .cameras
            .iter()
            .filter(|(_, camera)| camera.mount == Some(id))
            .map(|(key, _)| key)
            .collect();
        for camera in mounted {
            self.remove_mounted_camera(camera);
        }
    }

    /// Phase two: erase every entity marked for removal and release its handles
    ///
    /// Runs once at the end of every step. Calling it while a step is in
    /// flight does nothing. Also releases the handles of entities that were
    /// built for this scene but dropped or rejected instead of added.
    pub fn remove_clean_up(&mut self) {
        self.clean_up();
    }

    /// Cleanup body; returns the number of actors and articulations erased
    fn clean_up(&mut self) -> usize {
        if self.step_in_flight {
            log::warn!("remove_clean_up skipped: a step is in flight");
            return 0;
        }
        self.release_orphans();
        let mut released: HashSet<ShapeHandle> = HashSet::new();

        let pending: Vec<ActorKey> = self
            .actors
            .iter()
            .filter(|(_, actor)| !actor.core.is_alive())
            .map(|(key, _)| key)
            .collect();
        for key in &pending {
            if let Some(actor) = self.actors.remove(*key) {
                released.extend(actor.core.shapes.iter().copied());
                self.physics.release_body(actor.core.body);
            }
        }

        let pending_articulations: Vec<ArticulationHandle> = self
            .articulations
            .iter()
            .filter(|(_, articulation)| articulation.is_pending_removal())
            .map(|(handle, _)| handle)
            .collect();
        for handle in &pending_articulations {
            if let Some(articulation) = self.articulations.remove(*handle) {
                for link in &articulation.links {
                    released.extend(link.core.shapes.iter().copied());
                }
                self.physics
                    .release_cache(articulation.multibody, articulation.cache);
                self.physics.release_articulation(articulation.multibody);
            }
        }

        if pending.is_empty() && pending_articulations.is_empty() {
            return 0;
        }
        self.shape_owner.retain(|shape, _| !released.contains(shape));
        let dropped = self.contacts.forget_shapes(&released);
        log::debug!(
            "Cleanup released {} actors, {} articulations, {} contacts",
            pending.len(),
            pending_articulations.len(),
            dropped
        );
        pending.len() + pending_articulations.len()
    }

    /// Release queued handles of never-added entities, unless a step is in flight
    fn release_orphans(&mut self) {
        if self.step_in_flight {
            return;
        }
        let orphans = self.release.drain();
        if orphans.is_empty() {
            return;
        }
        for orphan in &orphans {
            let proxies = match orphan {
                Orphan::Body { body, proxies } => {
                    self.physics.release_body(*body);
                    proxies
                }
                Orphan::Articulation {
                    multibody,
                    cache,
                    proxies,
                } => {
                    self.physics.release_cache(*multibody, *cache);
                    self.physics.release_articulation(*multibody);
                    proxies
                }
            };
            if let Some(renderer) = self.renderer.as_mut() {
                for &proxy in proxies {
                    renderer.destroy(proxy);
                }
            }
        }
        log::debug!("Released {} never-added entities", orphans.len());
    }

    // === Stepping ===

    /// Advance the simulation by one timestep and wait for it
    pub fn step(&mut self) -> Result<(), SceneError> {
        self.step_async()?;
        self.step_wait()
    }

    /// Run pre-step hooks and submit the step without waiting
    ///
    /// No entity may be added or removed until the matching
    /// [`step_wait`](Self::step_wait).
    pub fn step_async(&mut self) -> Result<(), SceneError> {
        if self.step_in_flight {
            log::error!("step_async called twice without step_wait");
            return Err(SceneError::StepInFlight);
        }
        let timestep = self.config.timestep;
        for actor in self.actors.values_mut().filter(|a| a.core.is_alive()) {
            let id = actor.core.id;
            actor.core.events.emit(&Event::ActorStep { actor: id, timestep });
        }
        for (handle, articulation) in self.articulations.iter_mut() {
            if articulation.is_pending_removal() {
                continue;
            }
            articulation.events.emit(&Event::ArticulationStep {
                articulation: handle,
                timestep,
            });
            for link in &mut articulation.links {
                let id = link.core.id;
                link.core.events.emit(&Event::ActorStep { actor: id, timestep });
            }
        }
        self.physics.simulate(timestep)?;
        self.step_in_flight = true;
        Ok(())
    }

    /// Wait for the submitted step, dispatch contacts, clean up and notify
    pub fn step_wait(&mut self) -> Result<(), SceneError> {
        if !self.step_in_flight {
            log::warn!("step_wait called without step_async");
            return Ok(());
        }
        self.physics.fetch_results(true);
        self.step_in_flight = false;
        let timestep = self.config.timestep;
        self.elapsed += f64::from(timestep);

        self.dispatch_contacts();
        self.dispatch_triggers();
        let released = self.clean_up();
        self.events.emit(&Event::Step { timestep, released });
        Ok(())
    }

    fn dispatch_contacts(&mut self) {
        for event in self.physics.drain_contact_events() {
            let owners = (
                self.shape_owner.get(&event.shapes[0]).copied(),
                self.shape_owner.get(&event.shapes[1]).copied(),
            );
            let (Some(first), Some(second)) = owners else {
                log::warn!(
                    "Contact between unowned shapes {}/{}",
                    event.shapes[0].0,
                    event.shapes[1].0
                );
                continue;
            };
            let contact = Contact {
                actors: [first, second],
                shapes: event.shapes,
                transition: event.transition,
                points: event.points,
            };
            self.contacts.update(contact.clone());
            for (actor, other) in [(first, second), (second, first)] {
                if let Some(core) = self.live_core_mut(actor) {
                    core.events.emit(&Event::ActorContact {
                        actor,
                        other,
                        contact: contact.clone(),
                    });
                }
            }
        }
    }

    fn dispatch_triggers(&mut self) {
        for event in self.physics.drain_trigger_events() {
            let owners = (
                self.shape_owner.get(&event.trigger_shape).copied(),
                self.shape_owner.get(&event.other_shape).copied(),
            );
            let (Some(trigger_actor), Some(other_actor)) = owners else {
                log::warn!("Trigger on unowned shape {}", event.trigger_shape.0);
                continue;
            };
            let payload = Event::ActorTrigger {
                trigger_actor,
                other_actor,
                trigger_shape: event.trigger_shape,
                transition: event.transition,
            };
            for actor in [trigger_actor, other_actor] {
                if let Some(core) = self.live_core_mut(actor) {
                    core.events.emit(&payload);
                }
            }
        }
    }

    // === Lookup ===

    fn live_core(&self, id: ActorId) -> Option<&BodyCore> {
        if let Some(&key) = self.actor_lookup.get(&id) {
            return self.actors.get(key).map(|a| &a.core);
        }
        let &(handle, index) = self.link_lookup.get(&id)?;
        self.articulations
            .get(handle)
            .and_then(|a| a.links.get(index))
            .map(|l| &l.core)
    }

    fn live_core_mut(&mut self, id: ActorId) -> Option<&mut BodyCore> {
        if let Some(&key) = self.actor_lookup.get(&id) {
            return self.actors.get_mut(key).map(|a| &mut a.core);
        }
        let &(handle, index) = self.link_lookup.get(&id)?;
        self.articulations
            .get_mut(handle)
            .and_then(|a| a.links.get_mut(index))
            .map(|l| &mut l.core)
    }

    fn wake_target(&self, id: ActorId) -> Option<WakeTarget> {
        if let Some(&key) = self.actor_lookup.get(&id) {
            return self.actors.get(key).map(|a| WakeTarget::Body(a.core.body));
        }
        let &(handle, _) = self.link_lookup.get(&id)?;
        self.articulations
            .get(handle)
            .map(|a| WakeTarget::Articulation(a.multibody))
    }

    fn wake(&mut self, id: ActorId) {
        match self.wake_target(id) {
            Some(WakeTarget::Body(body)) => self.physics.wake_body(body),
            Some(WakeTarget::Articulation(multibody)) => self.physics.wake_articulation(multibody),
            None => {}
        }
    }

    fn body_of(&self, id: ActorId) -> Option<BodyHandle> {
        self.live_core(id).map(|core| core.body)
    }

    /// World pose of a live actor or link
    pub fn pose_of(&self, id: ActorId) -> Option<Pose> {
        self.physics.body_pose(self.body_of(id)?)
    }

    /// Live actor by id
    pub fn find_actor_by_id(&self, id: ActorId) -> Option<&Actor> {
        let key = self.actor_lookup.get(&id)?;
        self.actors.get(*key)
    }

    /// Live articulation link by id
    pub fn find_articulation_link_by_id(&self, id: ActorId) -> Option<&Link> {
        let &(handle, index) = self.link_lookup.get(&id)?;
        self.articulations.get(handle)?.links.get(index)
    }

    /// Every live actor, links excluded
    pub fn all_actors(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values().filter(|a| a.core.is_alive())
    }

    /// Every live articulation
    pub fn all_articulations(&self) -> impl Iterator<Item = (ArticulationHandle, &Articulation)> {
        self.articulations
            .iter()
            .filter(|(_, a)| !a.is_pending_removal())
    }

    /// Live articulation by handle
    pub fn articulation(&self, handle: ArticulationHandle) -> Option<&Articulation> {
        self.articulations
            .get(handle)
            .filter(|a| !a.is_pending_removal())
    }

    /// Mutable view of a live articulation
    pub fn articulation_mut(&mut self, handle: ArticulationHandle) -> Option<ArticulationMut<'_>> {
        let articulation = self
            .articulations
            .get_mut(handle)
            .filter(|a| !a.is_pending_removal())?;
        Some(ArticulationMut {
            articulation,
            physics: &mut self.physics,
        })
    }

    /// Mutable view of a live actor
    pub fn actor_mut(&mut self, id: ActorId) -> Option<ActorMut<'_>> {
        let key = *self.actor_lookup.get(&id)?;
        let actor = self.actors.get_mut(key)?;
        let body = actor.core.body;
        Some(ActorMut {
            core: &mut actor.core,
            physics: &mut self.physics,
            renderer: &mut self.renderer,
            wake_target: WakeTarget::Body(body),
        })
    }

    /// Mutable view of a live articulation link
    pub fn link_mut(&mut self, id: ActorId) -> Option<ActorMut<'_>> {
        let (handle, index) = *self.link_lookup.get(&id)?;
        let articulation = self.articulations.get_mut(handle)?;
        let multibody = articulation.multibody;
        let link = articulation.links.get_mut(index)?;
        Some(ActorMut {
            core: &mut link.core,
            physics: &mut self.physics,
            renderer: &mut self.renderer,
            wake_target: WakeTarget::Articulation(multibody),
        })
    }

    /// Currently touching shape pairs
    pub fn contacts(&self) -> Vec<&Contact> {
        self.contacts.contacts()
    }

    /// Contact tracker
    pub fn contact_tracker(&self) -> &ContactTracker {
        &self.contacts
    }

    /// Render id to visual name of every live visual proxy
    pub fn find_render_id_to_visual_name(&self) -> HashMap<RenderId, String> {
        let actors = self.all_actors().map(|a| &a.core);
        let links = self
            .all_articulations()
            .flat_map(|(_, a)| a.links.iter().map(|l| &l.core));
        actors
            .chain(links)
            .flat_map(|core| core.visuals.iter())
            .map(|proxy| (proxy.render_id, proxy.name.clone()))
            .collect()
    }

    // === Drives ===

    /// Create a drive between two live bodies; `None` is the world
    ///
    /// The drive is registered with both participants and both are woken.
    pub fn create_drive(
        &mut self,
        actor1: Option<ActorId>,
        pose1: Pose,
        actor2: Option<ActorId>,
        pose2: Pose,
    ) -> Result<DriveId, SceneError> {
        let resolve = |scene: &Self, id: Option<ActorId>| match id {
            Some(id) => scene
                .body_of(id)
                .map(Some)
                .ok_or(SceneError::UnknownEntity(id)),
            None => Ok(None),
        };
        let body1 = resolve(self, actor1)?;
        let body2 = resolve(self, actor2)?;
        let joint = self.physics.create_drive_joint(body1, pose1, body2, pose2)?;
        let drive = self.drives.insert(Drive {
            joint,
            actors: [actor1, actor2],
            poses: [pose1, pose2],
            properties: DriveProperties::default(),
            target: Pose::identity(),
        });
        for id in [actor1, actor2].into_iter().flatten() {
            if let Some(core) = self.live_core_mut(id) {
                core.drives.push(drive);
            }
            self.wake(id);
        }
        Ok(drive)
    }

    /// Drive by id
    pub fn drive(&self, drive: DriveId) -> Option<&Drive> {
        self.drives.get(drive)
    }

    /// Set the spring parameters of a drive
    pub fn set_drive_properties(&mut self, drive: DriveId, properties: DriveProperties) -> bool {
        let Some(record) = self.drives.get_mut(drive) else {
            log::warn!("set_drive_properties on an unknown drive");
            return false;
        };
        record.properties = properties;
        self.physics
            .set_drive_joint_properties(record.joint, &properties);
        true
    }

    /// Set the target pose of a drive
    pub fn set_drive_target(&mut self, drive: DriveId, target: Pose) -> bool {
        let Some(record) = self.drives.get_mut(drive) else {
            log::warn!("set_drive_target on an unknown drive");
            return false;
        };
        record.target = target;
        self.physics.set_drive_joint_target(record.joint, target);
        true
    }

    /// Remove a drive, detaching it from and waking both participants
    pub fn remove_drive(&mut self, drive: DriveId) -> bool {
        self.detach_drive(drive, None)
    }

    /// `removing` is a participant being destroyed; it is not woken
    fn detach_drive(&mut self, drive: DriveId, removing: Option<ActorId>) -> bool {
        let Some(record) = self.drives.remove(drive) else {
            log::warn!("remove_drive: drive is not registered with {}", self.id);
            return false;
        };
        self.physics.release_drive_joint(record.joint);
        for id in record.actors.into_iter().flatten() {
            if let Some(core) = self.live_core_mut(id) {
                core.drives.retain(|d| *d != drive);
            }
            if Some(id) != removing {
                self.wake(id);
            }
        }
        true
    }

    // === Mounted cameras ===

    /// Add a render camera that follows `mount` (or stays in the world frame)
    ///
    /// Returns `None` and logs when the scene has no renderer, the mount is
    /// not live or the renderer rejects the camera.
    pub fn add_mounted_camera(
        &mut self,
        name: &str,
        mount: Option<ActorId>,
        local_pose: Pose,
        spec: CameraSpec,
    ) -> Option<CameraId> {
        let mount_pose = match mount {
            Some(id) => match self.pose_of(id) {
                Some(pose) => pose,
                None => {
                    log::error!("Cannot mount camera '{name}' on {id}: not a live body");
                    return None;
                }
            },
            None => Pose::identity(),
        };
        let Some(renderer) = self.renderer.as_mut() else {
            log::error!("Cannot add camera '{name}': {} has no renderer", self.id);
            return None;
        };
        let camera = match renderer.add_camera(name, spec.width, spec.height, spec.fovy, spec.near, spec.far) {
            Ok(camera) => camera,
            Err(error) => {
                log::error!("Failed to add camera '{name}': {error}");
                return None;
            }
        };
        let mounted = MountedCamera {
            name: name.to_string(),
            camera,
            mount,
            local_pose,
            spec,
        };
        renderer.set_camera_pose(camera, mounted.world_pose(mount_pose));
        Some(self.cameras.insert(mounted))
    }

    /// Remove a mounted camera and its render camera
    pub fn remove_mounted_camera(&mut self, camera: CameraId) -> bool {
        let Some(mounted) = self.cameras.remove(camera) else {
            log::warn!("remove_mounted_camera: camera is not registered with {}", self.id);
            return false;
        };
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.remove_camera(mounted.camera);
        }
        true
    }

    /// Camera by name, optionally restricted to one mount
    pub fn find_mounted_camera(&self, name: &str, mount: Option<ActorId>) -> Option<CameraId> {
        self.cameras
            .iter()
            .find(|(_, c)| c.name == name && (mount.is_none() || c.mount == mount))
            .map(|(key, _)| key)
    }

    /// Mounted camera by id
    pub fn mounted_camera(&self, camera: CameraId) -> Option<&MountedCamera> {
        self.cameras.get(camera)
    }

    /// Every mounted camera
    pub fn mounted_cameras(&self) -> impl Iterator<Item = (CameraId, &MountedCamera)> {
        self.cameras.iter()
    }

    // === Rendering ===

    fn render_updates(&self) -> (Vec<(RenderBodyHandle, Pose)>, Vec<(CameraHandle, Pose)>) {
        let actors = self.all_actors().map(|a| &a.core);
        let links = self
            .all_articulations()
            .flat_map(|(_, a)| a.links.iter().map(|l| &l.core));
        let mut bodies = Vec::new();
        for core in actors.chain(links) {
            let Some(pose) = self.physics.body_pose(core.body) else {
                continue;
            };
            bodies.extend(core.all_proxies().map(|p| (p.handle, pose)));
        }
        let cameras = self
            .cameras
            .values()
            .filter_map(|c| {
                let mount_pose = match c.mount {
                    Some(id) => self.pose_of(id)?,
                    None => Pose::identity(),
                };
                Some((c.camera, c.world_pose(mount_pose)))
            })
            .collect();
        (bodies, cameras)
    }

    /// Push every live body pose and mounted camera pose to the renderer
    pub fn update_render(&mut self) {
        if self.renderer.is_none() {
            return;
        }
        let (bodies, cameras) = self.render_updates();
        if let Some(renderer) = self.renderer.as_mut() {
            for (handle, pose) in bodies {
                renderer.update_pose(handle, pose);
            }
            for (camera, pose) in cameras {
                renderer.set_camera_pose(camera, pose);
            }
        }
    }

    // === Events ===

    /// Register a scene-level handler (step-completed events)
    pub fn subscribe(&mut self, kind: EventKind, handler: Box<dyn EventHandler>) -> SubscriptionId {
        self.events.subscribe(kind, handler)
    }

    /// Remove a scene-level handler
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("id", &self.id)
            .field("actors", &self.actors.len())
            .field("articulations", &self.articulations.len())
            .field("drives", &self.drives.len())
            .field("cameras", &self.cameras.len())
            .field("contacts", &self.contacts.len())
            .finish()
    }
}
