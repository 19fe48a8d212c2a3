//! Rigid actor builder

use super::records::{BodyRecords, ShapeRecorder};
use super::BuildError;
use crate::foundation::math::{Pose, Quat, Translation3, Vec3};
use crate::physics::{BodyKind, MaterialHandle};
use crate::render::{RenderMaterial, RenderPrimitive};
use crate::scene::actor::{Actor, BodyCore};
use crate::scene::{Scene, SceneId};

/// Records shapes and visuals, then builds any number of independent actors
///
/// ```ignore
/// let mut builder = scene.create_actor_builder();
/// builder.add_box_shape(Pose::identity(), Vec3::new(0.5, 0.5, 0.5), ShapeOptions::default());
/// let actor = builder.build(&mut scene, "crate")?;
/// let id = scene.add_actor(actor)?;
/// ```
#[derive(Debug, Clone)]
pub struct ActorBuilder {
    scene: SceneId,
    records: BodyRecords,
}

impl ActorBuilder {
    pub(crate) fn new(scene: SceneId) -> Self {
        Self {
            scene,
            records: BodyRecords::default(),
        }
    }

    /// Scene this builder is bound to
    pub fn scene_id(&self) -> SceneId {
        self.scene
    }

    /// Build a dynamic actor
    pub fn build(&self, scene: &mut Scene, name: &str) -> Result<Actor, BuildError> {
        self.build_with_kind(scene, BodyKind::Dynamic, name)
    }

    /// Build a kinematic actor
    pub fn build_kinematic(&self, scene: &mut Scene, name: &str) -> Result<Actor, BuildError> {
        self.build_with_kind(scene, BodyKind::Kinematic, name)
    }

    /// Build a static actor
    pub fn build_static(&self, scene: &mut Scene, name: &str) -> Result<Actor, BuildError> {
        self.build_with_kind(scene, BodyKind::Static, name)
    }

    /// Build a static infinite plane at `altitude` facing +z
    ///
    /// Recorded shapes and visuals are ignored; the current collision groups
    /// are copied onto the plane shape.
    pub fn build_ground(
        &self,
        scene: &mut Scene,
        altitude: f32,
        render: bool,
        material: Option<MaterialHandle>,
        render_material: &RenderMaterial,
        name: &str,
    ) -> Result<Actor, BuildError> {
        let mut ctx = scene.build_context();
        ctx.check_scene(self.scene)?;

        // Plane normal is local +x; rotate it onto world +z
        let pose = Pose::from_parts(
            Translation3::new(0.0, 0.0, altitude),
            Quat::from_euler_angles(0.0, -std::f32::consts::FRAC_PI_2, 0.0),
        );
        let groups = self.records.collision_groups;
        let shape = ctx.create_plane_shape(pose, material, groups)?;
        let body = match ctx.physics.create_body(BodyKind::Static, Pose::identity()) {
            Ok(body) => body,
            Err(error) => {
                ctx.physics.release_shape(shape);
                return Err(error.into());
            }
        };
        if let Err(error) = ctx.physics.attach_shape(body, shape) {
            ctx.physics.release_shape(shape);
            ctx.physics.release_body(body);
            return Err(error.into());
        }

        let id = ctx.next_actor_id();
        let mut core = BodyCore::new(id, name, body, groups);
        core.shapes.push(shape);
        if render {
            let scale = Vec3::new(10.0, 10.0, 10.0);
            core.visuals.extend(ctx.create_primitive_visual(
                RenderPrimitive::Plane,
                scale,
                render_material,
                id,
                pose,
                name,
            ));
        }
        core.collision_visuals = ctx.create_collision_visuals(&core.shapes, id);
        log::debug!("Built ground '{name}' ({id}) at z = {altitude}");
        Ok(Actor::new(core, BodyKind::Static, self.scene, ctx.release.clone()))
    }

    fn build_with_kind(
        &self,
        scene: &mut Scene,
        kind: BodyKind,
        name: &str,
    ) -> Result<Actor, BuildError> {
        let mut ctx = scene.build_context();
        ctx.check_scene(self.scene)?;

        let body = ctx.physics.create_body(kind, Pose::identity())?;
        let shapes = match ctx.realize_shapes(body, kind, &self.records) {
            Ok(shapes) => shapes,
            Err(error) => {
                ctx.physics.release_body(body);
                return Err(error);
            }
        };

        let id = ctx.next_actor_id();
        let mut core = BodyCore::new(id, name, body, self.records.collision_groups);
        core.shapes = shapes;
        core.visuals = ctx.create_visuals(&self.records, id);
        core.collision_visuals = ctx.create_collision_visuals(&core.shapes, id);
        log::debug!(
            "Built {kind:?} actor '{name}' ({id}) with {} shapes and {} visuals",
            core.shapes.len(),
            core.visuals.len()
        );
        Ok(Actor::new(core, kind, self.scene, ctx.release.clone()))
    }
}

impl ShapeRecorder for ActorBuilder {
    fn records(&self) -> &BodyRecords {
        &self.records
    }

    fn records_mut(&mut self) -> &mut BodyRecords {
        &mut self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ShapeOptions;
    use crate::config::SceneConfig;
    use crate::physics::HeadlessPhysics;
    use crate::scene::SceneBody;
    use approx::assert_relative_eq;

    fn headless(scene: &Scene) -> &HeadlessPhysics {
        scene
            .physics()
            .as_any()
            .downcast_ref()
            .expect("headless physics")
    }

    fn cube(scene: &Scene, options: ShapeOptions) -> ActorBuilder {
        let mut builder = scene.create_actor_builder();
        builder.add_box_shape(Pose::identity(), Vec3::new(0.5, 0.5, 0.5), options);
        builder
    }

    #[test]
    fn test_body_kinds() {
        let mut scene = Scene::headless(SceneConfig::default()).expect("scene");
        let builder = cube(&scene, ShapeOptions::default());
        let kinematic = builder.build_kinematic(&mut scene, "k").expect("kinematic");
        let fixed = builder.build_static(&mut scene, "s").expect("static");
        assert_eq!(kinematic.kind(), BodyKind::Kinematic);
        assert_eq!(fixed.kind(), BodyKind::Static);
        assert_eq!(
            headless(&scene).body_kind(kinematic.body_handle()),
            Some(BodyKind::Kinematic)
        );
        assert_eq!(headless(&scene).body_kind(fixed.body_handle()), Some(BodyKind::Static));
    }

    #[test]
    fn test_mass_from_density() {
        let mut scene = Scene::headless(SceneConfig::default()).expect("scene");
        let actor = cube(&scene, ShapeOptions::with_density(250.0))
            .build(&mut scene, "cube")
            .expect("build");
        let mass = scene.physics().body_mass(actor.body_handle()).expect("mass");
        assert_relative_eq!(mass, 250.0, epsilon = 1e-3);
    }

    #[test]
    fn test_explicit_mass_overrides_density() {
        let mut scene = Scene::headless(SceneConfig::default()).expect("scene");
        let mut builder = cube(&scene, ShapeOptions::with_density(250.0));
        builder.set_mass_and_inertia(3.0, Pose::identity(), Vec3::new(0.5, 0.5, 0.5));
        let actor = builder.build(&mut scene, "cube").expect("build");
        let body = actor.body_handle();
        assert_eq!(scene.physics().body_mass(body), Some(3.0));
        assert_eq!(headless(&scene).body_inertia(body), Some(Vec3::new(0.5, 0.5, 0.5)));
    }

    #[test]
    fn test_missing_mesh_file_is_skipped() {
        let mut scene = Scene::headless(SceneConfig::default()).expect("scene");
        let mut builder = cube(&scene, ShapeOptions::default());
        builder.add_convex_shape_from_file(
            "/nonexistent/hull.obj",
            Pose::identity(),
            Vec3::new(1.0, 1.0, 1.0),
            ShapeOptions::default(),
        );
        let actor = builder.build(&mut scene, "partial").expect("build");
        assert_eq!(actor.collision_shapes().len(), 1);
    }

    #[test]
    fn test_cached_hull_builds_shape_and_proxy() {
        use crate::physics::ConvexMesh;

        let mut scene = Scene::headless(SceneConfig::default()).expect("scene");
        let vertices = vec![
            Vec3::zeros(),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        let faces = vec![vec![0, 2, 1], vec![0, 1, 3], vec![0, 3, 2], vec![1, 2, 3]];
        let tetra = ConvexMesh::from_faces(vertices, &faces).expect("tetra");
        scene.mesh_cache().insert("memory://tetra.obj", vec![tetra]);

        let mut builder = scene.create_actor_builder();
        builder.add_convex_shape_from_file(
            "memory://tetra.obj",
            Pose::identity(),
            Vec3::new(2.0, 2.0, 2.0),
            ShapeOptions::with_density(600.0),
        );
        let actor = builder.build(&mut scene, "tetra").expect("build");
        assert_eq!(actor.collision_shapes().len(), 1);
        assert_eq!(actor.collision_bodies().len(), 1);
        let mass = scene.physics().body_mass(actor.body_handle()).expect("mass");
        assert_relative_eq!(mass, 800.0, epsilon = 1e-2);
    }
}
