//! Deferred "record then build" construction of actors and articulations
//!
//! Builders are created by a [`Scene`](crate::scene::Scene) and bound to it.
//! Recording is free; `build*` materializes the records into backend shapes,
//! bodies and render proxies and hands back an entity ready for
//! `Scene::add_actor` / `Scene::add_articulation`. Later changes to a
//! builder never affect what it already built.

pub mod actor_builder;
pub mod articulation_builder;
pub mod collision_visual;
pub mod records;

pub use actor_builder::ActorBuilder;
pub use articulation_builder::{ArticulationBuilder, JointRecord, LinkBuilder};
pub use records::{
    BodyRecords, ExplicitMass, ShapeOptions, ShapeRecord, ShapeRecorder, ShapeSource,
    VisualRecord, VisualSource,
};

use crate::assets::MeshCache;
use crate::config::SceneConfig;
use crate::foundation::ids::{ActorId, IdGenerator, RenderId};
use crate::foundation::math::Pose;
use crate::physics::{
    BackendError, BodyHandle, BodyKind, CollisionGroups, ConvexGeometry, Geometry,
    MassProperties, MaterialHandle, PhysicsBackend, ShapeDesc, ShapeHandle,
};
use crate::render::{RenderBackend, RenderMaterial, RenderResult};
use crate::scene::actor::RenderProxy;
use crate::scene::release::ReleaseQueue;
use crate::scene::SceneId;
use collision_visual::CollisionVisual;
use thiserror::Error;

/// Build failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    /// The backend failed to create a shape, body or articulation
    #[error("Resource creation failed: {0}")]
    ResourceCreation(#[from] BackendError),

    /// Builder used with a scene other than the one that created it
    #[error("Builder of {builder} used with {scene}")]
    ForeignScene {
        /// Scene that created the builder
        builder: SceneId,
        /// Scene passed to build
        scene: SceneId,
    },

    /// Articulation links do not form a single tree
    #[error("Invalid articulation topology: {0}")]
    InvalidTopology(String),
}

/// Scene internals a build needs
pub(crate) struct BuildContext<'a> {
    pub(crate) scene: SceneId,
    pub(crate) physics: &'a mut Box<dyn PhysicsBackend>,
    pub(crate) renderer: &'a mut Option<Box<dyn RenderBackend>>,
    pub(crate) mesh_cache: &'a MeshCache,
    pub(crate) default_material: MaterialHandle,
    pub(crate) config: &'a SceneConfig,
    pub(crate) actor_ids: &'a mut IdGenerator,
    pub(crate) render_ids: &'a mut IdGenerator,
    pub(crate) release: &'a ReleaseQueue,
}

impl BuildContext<'_> {
    pub(crate) fn check_scene(&self, builder: SceneId) -> Result<(), BuildError> {
        if builder == self.scene {
            Ok(())
        } else {
            Err(BuildError::ForeignScene {
                builder,
                scene: self.scene,
            })
        }
    }

    pub(crate) fn next_actor_id(&mut self) -> ActorId {
        ActorId(self.actor_ids.next_id())
    }

    /// Geometries of one shape record; mesh files that fail to load yield none
    fn resolve_geometry(&self, source: &ShapeSource) -> Vec<Geometry> {
        match source {
            ShapeSource::Box { half_extents } => vec![Geometry::Box {
                half_extents: *half_extents,
            }],
            ShapeSource::Sphere { radius } => vec![Geometry::Sphere { radius: *radius }],
            ShapeSource::Capsule {
                radius,
                half_length,
            } => vec![Geometry::Capsule {
                radius: *radius,
                half_length: *half_length,
            }],
            ShapeSource::Convex { mesh, scale } => vec![Geometry::ConvexMesh(ConvexGeometry {
                mesh: mesh.clone(),
                scale: *scale,
            })],
            ShapeSource::ConvexFile { path, scale } => match self.mesh_cache.load(path) {
                Ok(mesh) => vec![Geometry::ConvexMesh(ConvexGeometry { mesh, scale: *scale })],
                Err(error) => {
                    log::error!("Skipping convex shape {}: {error}", path.display());
                    Vec::new()
                }
            },
            ShapeSource::ConvexFileParts { path, scale } => {
                match self.mesh_cache.load_group(path) {
                    Ok(parts) => parts
                        .iter()
                        .map(|mesh| {
                            Geometry::ConvexMesh(ConvexGeometry {
                                mesh: mesh.clone(),
                                scale: *scale,
                            })
                        })
                        .collect(),
                    Err(error) => {
                        log::error!("Skipping convex shapes {}: {error}", path.display());
                        Vec::new()
                    }
                }
            }
        }
    }

    /// Create one backend shape per geometry
    ///
    /// Returns the shapes and their densities. On failure every shape created
    /// here is released before the error is returned.
    pub(crate) fn create_shapes(
        &mut self,
        records: &BodyRecords,
    ) -> Result<(Vec<ShapeHandle>, Vec<f32>), BuildError> {
        let mut shapes = Vec::new();
        let mut densities = Vec::new();
        for record in &records.shapes {
            for geometry in self.resolve_geometry(&record.source) {
                let desc = ShapeDesc {
                    geometry,
                    material: record.options.material.unwrap_or(self.default_material),
                    local_pose: record.pose,
                    contact_offset: self.config.contact_offset,
                    patch_radius: record.options.patch_radius,
                    min_patch_radius: record.options.min_patch_radius,
                    filter: records.collision_groups,
                    is_trigger: record.options.is_trigger,
                };
                match self.physics.create_shape(&desc) {
                    Ok(shape) => {
                        shapes.push(shape);
                        densities.push(record.options.density);
                    }
                    Err(error) => {
                        log::error!("Failed to create {} shape: {error}", desc.geometry.type_name());
                        for shape in shapes {
                            self.physics.release_shape(shape);
                        }
                        return Err(error.into());
                    }
                }
            }
        }
        Ok((shapes, densities))
    }

    /// Create a plane shape (ground)
    pub(crate) fn create_plane_shape(
        &mut self,
        pose: Pose,
        material: Option<MaterialHandle>,
        filter: CollisionGroups,
    ) -> Result<ShapeHandle, BuildError> {
        let desc = ShapeDesc {
            geometry: Geometry::Plane,
            material: material.unwrap_or(self.default_material),
            local_pose: pose,
            contact_offset: self.config.contact_offset,
            patch_radius: 0.0,
            min_patch_radius: 0.0,
            filter,
            is_trigger: false,
        };
        Ok(self.physics.create_shape(&desc)?)
    }

    /// Create, attach and weigh the shapes of one body
    ///
    /// On failure no shape created here survives; the body itself is left to
    /// the caller.
    pub(crate) fn realize_shapes(
        &mut self,
        body: BodyHandle,
        kind: BodyKind,
        records: &BodyRecords,
    ) -> Result<Vec<ShapeHandle>, BuildError> {
        let (shapes, densities) = self.create_shapes(records)?;
        if let Err(error) = self.attach_shapes(body, kind, &shapes, densities, records.mass.as_ref()) {
            for &shape in &shapes {
                self.physics.release_shape(shape);
            }
            return Err(error);
        }
        if kind == BodyKind::Dynamic {
            self.physics.configure_body(
                body,
                self.config.sleep_threshold,
                self.config.solver_iterations,
                self.config.solver_velocity_iterations,
            );
        }
        Ok(shapes)
    }

    /// Attach shapes and apply mass properties
    fn attach_shapes(
        &mut self,
        body: BodyHandle,
        kind: BodyKind,
        shapes: &[ShapeHandle],
        densities: Vec<f32>,
        mass: Option<&ExplicitMass>,
    ) -> Result<(), BuildError> {
        for &shape in shapes {
            self.physics.attach_shape(body, shape)?;
        }
        if kind == BodyKind::Static {
            return Ok(());
        }
        let properties = match mass {
            Some(explicit) => MassProperties::Explicit {
                mass: explicit.mass,
                cmass_local_pose: explicit.cmass_local_pose,
                inertia: explicit.inertia,
            },
            // Shapeless bodies keep the backend's default mass
            None if densities.is_empty() => return Ok(()),
            None => MassProperties::FromDensities(densities),
        };
        self.physics.set_mass_properties(body, &properties)?;
        Ok(())
    }

    fn tag_proxy(
        renderer: &mut Box<dyn RenderBackend>,
        render_ids: &mut IdGenerator,
        created: RenderResult<crate::render::RenderBodyHandle>,
        actor: ActorId,
        pose: Pose,
        name: &str,
    ) -> Option<RenderProxy> {
        match created {
            Ok(handle) => {
                let render_id = RenderId(render_ids.next_id());
                renderer.set_initial_pose(handle, pose);
                renderer.set_segmentation_id(handle, actor.raw());
                renderer.set_unique_id(handle, render_id);
                renderer.set_name(handle, name);
                Some(RenderProxy {
                    handle,
                    render_id,
                    name: name.to_string(),
                })
            }
            Err(error) => {
                log::error!("Skipping visual '{name}' of {actor}: {error}");
                None
            }
        }
    }

    /// Create the visual proxies of one body
    pub(crate) fn create_visuals(&mut self, records: &BodyRecords, actor: ActorId) -> Vec<RenderProxy> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Vec::new();
        };
        let mut proxies = Vec::with_capacity(records.visuals.len());
        for visual in &records.visuals {
            let default_material = RenderMaterial::default();
            let material = visual.material.as_ref().unwrap_or(&default_material);
            let created = match &visual.source {
                VisualSource::Primitive { primitive, scale } => {
                    renderer.add_primitive(*primitive, *scale, material)
                }
                VisualSource::File { path, scale } => {
                    renderer.add_mesh_file(path, *scale, visual.material.as_ref())
                }
                VisualSource::Mesh { mesh, scale } => renderer.add_mesh(mesh, *scale, material),
            };
            proxies.extend(Self::tag_proxy(
                renderer,
                self.render_ids,
                created,
                actor,
                visual.pose,
                &visual.name,
            ));
        }
        proxies
    }

    /// Create a primitive visual proxy outside of the record flow (ground plane)
    pub(crate) fn create_primitive_visual(
        &mut self,
        primitive: crate::render::RenderPrimitive,
        scale: crate::foundation::math::Vec3,
        material: &RenderMaterial,
        actor: ActorId,
        pose: Pose,
        name: &str,
    ) -> Option<RenderProxy> {
        let renderer = self.renderer.as_mut()?;
        let created = renderer.add_primitive(primitive, scale, material);
        Self::tag_proxy(renderer, self.render_ids, created, actor, pose, name)
    }

    /// Create one hidden collision proxy per realized shape
    pub(crate) fn create_collision_visuals(
        &mut self,
        shapes: &[ShapeHandle],
        actor: ActorId,
    ) -> Vec<RenderProxy> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Vec::new();
        };
        let material = RenderMaterial::from_color([0.0, 1.0, 0.0, 1.0]);
        let mut proxies = Vec::with_capacity(shapes.len());
        for &shape in shapes {
            let (Some(geometry), Some(pose)) = (
                self.physics.shape_geometry(shape),
                self.physics.shape_local_pose(shape),
            ) else {
                log::warn!("Shape {} of {actor} has no geometry", shape.0);
                continue;
            };
            let created = match collision_visual::describe(&geometry) {
                CollisionVisual::Primitive { primitive, scale } => {
                    renderer.add_primitive(primitive, scale, &material)
                }
                CollisionVisual::Mesh { mesh, scale } => renderer.add_mesh(&mesh, scale, &material),
            };
            if let Some(proxy) =
                Self::tag_proxy(renderer, self.render_ids, created, actor, pose, "collision")
            {
                renderer.set_visible(proxy.handle, false);
                renderer.set_render_mode(proxy.handle, 1);
                proxies.push(proxy);
            }
        }
        proxies
    }
}
