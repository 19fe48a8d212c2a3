//! Headless scene demo
//!
//! Drops a stack of boxes on the ground next to a two-joint arm, steps the
//! scene for a few simulated seconds and logs contacts, removals and joint
//! state along the way.
//!
//! Usage: `scene_demo [config.toml|config.ron]`

use kinescene::prelude::*;
use std::cell::Cell;
use std::rc::Rc;

/// Demo errors
#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Articulation error: {0}")]
    Articulation(#[from] ArticulationError),

    #[error("Config error: {0}")]
    Config(#[from] kinescene::config::ConfigError),
}

struct DemoApp {
    scene: Scene,
    boxes: Vec<ActorId>,
    arm: Option<ArticulationHandle>,
    contact_events: Rc<Cell<u32>>,
}

impl DemoApp {
    fn new(config: SceneConfig) -> Result<Self, DemoError> {
        log::info!("Creating headless scene...");
        let scene = Scene::headless(config)?;
        Ok(Self {
            scene,
            boxes: Vec::new(),
            arm: None,
            contact_events: Rc::new(Cell::new(0)),
        })
    }

    fn initialize(&mut self) -> Result<(), DemoError> {
        let grey = RenderMaterial::from_color([0.6, 0.6, 0.6, 1.0]);
        self.scene.add_ground(0.0, true, None, &grey)?;

        let half = Vec3::new(0.25, 0.25, 0.25);
        let mut builder = self.scene.create_actor_builder();
        builder
            .add_box_shape(Pose::identity(), half, ShapeOptions::with_density(500.0))
            .add_box_visual(
                Pose::identity(),
                half,
                RenderMaterial::from_color([0.8, 0.5, 0.2, 1.0]),
                "crate",
            );
        for level in 0..4u8 {
            let actor = builder.build(&mut self.scene, &format!("crate_{level}"))?;
            let id = self.scene.add_actor(actor)?;
            let height = 0.3 + f32::from(level) * 0.55;
            if let Some(mut actor) = self.scene.actor_mut(id) {
                actor.set_pose(Pose::translation(0.0, 0.0, height));
            }
            let seen = Rc::clone(&self.contact_events);
            if let Some(mut actor) = self.scene.actor_mut(id) {
                actor.subscribe(
                    EventKind::ActorContact,
                    Box::new(move |_event: &Event| seen.set(seen.get() + 1)),
                );
            }
            self.boxes.push(id);
        }

        self.arm = Some(self.build_arm()?);
        if let (Some(&top), Some(arm)) = (self.boxes.last(), self.arm) {
            let tip = self
                .scene
                .articulation(arm)
                .and_then(|a| a.find_link_by_name("forearm"))
                .map(SceneBody::id);
            if let Some(tip) = tip {
                let drive = self
                    .scene
                    .create_drive(Some(tip), Pose::identity(), Some(top), Pose::identity())?;
                let properties = DriveProperties {
                    stiffness: 200.0,
                    damping: 20.0,
                    ..DriveProperties::default()
                };
                self.scene.set_drive_properties(drive, properties);
            }
        }

        self.scene.add_mounted_camera(
            "overview",
            None,
            Pose::translation(-3.0, 0.0, 1.5),
            CameraSpec::default(),
        );
        log::info!(
            "Scene ready: {} actors, {} articulations",
            self.scene.all_actors().count(),
            self.scene.all_articulations().count()
        );
        Ok(())
    }

    fn build_arm(&mut self) -> Result<ArticulationHandle, DemoError> {
        let mut builder = self.scene.create_articulation_builder();
        builder.set_fix_base(true);
        builder.set_root_pose(Pose::translation(1.0, 0.0, 0.0));

        let radius = 0.05;
        builder
            .create_link_builder(None)
            .set_name("base")
            .add_box_shape(
                Pose::identity(),
                Vec3::new(0.1, 0.1, 0.05),
                ShapeOptions::default(),
            );
        let joint_pose = Pose::translation(0.0, 0.0, 0.1);
        builder
            .create_link_builder(Some(0))
            .set_name("upper_arm")
            .set_joint_name("shoulder")
            .set_joint_properties(
                JointKind::Revolute,
                &[[-1.5, 1.5]],
                joint_pose,
                Pose::identity(),
                0.0,
                0.5,
            )
            .add_capsule_shape(Pose::identity(), radius, 0.2, ShapeOptions::default());
        builder
            .create_link_builder(Some(1))
            .set_name("forearm")
            .set_joint_name("elbow")
            .set_joint_properties(
                JointKind::Revolute,
                &[[-2.0, 2.0]],
                Pose::translation(0.4, 0.0, 0.0),
                Pose::identity(),
                0.0,
                0.5,
            )
            .add_capsule_shape(Pose::identity(), radius, 0.15, ShapeOptions::default());

        let articulation = builder.build(&mut self.scene, "arm")?;
        Ok(self.scene.add_articulation(articulation)?)
    }

    fn run(&mut self, seconds: f32) -> Result<(), DemoError> {
        let steps = (seconds / self.scene.timestep()).round() as u32;
        log::info!("Stepping {steps} times");

        if let Some(mut arm) = self.arm.and_then(|h| self.scene.articulation_mut(h)) {
            arm.set_drive_target(&[0.5, -0.5])?;
            arm.set_qvel(&[0.1, 0.0])?;
        }

        for step in 0..steps {
            self.scene.step()?;
            if step == steps / 2 {
                if let Some(id) = self.boxes.first().copied() {
                    log::info!("Removing {id} mid-run");
                    self.scene.remove_actor(id);
                }
            }
            if step % 240 == 0 {
                self.scene.update_render();
                self.report();
            }
        }
        self.report();
        Ok(())
    }

    fn report(&mut self) {
        log::info!(
            "t = {:.3}s, {} live contacts, {} contact events",
            self.scene.elapsed_time(),
            self.scene.contacts().len(),
            self.contact_events.get()
        );
        for id in &self.boxes {
            if let Some(pose) = self.scene.pose_of(*id) {
                let p = pose.translation.vector;
                log::debug!("  {id}: ({:.3}, {:.3}, {:.3})", p.x, p.y, p.z);
            }
        }
        if let Some(arm) = self.arm.and_then(|h| self.scene.articulation_mut(h)) {
            match arm.qpos() {
                Ok(qpos) => log::info!("  arm qpos {qpos:?}"),
                Err(error) => log::warn!("  arm qpos unavailable: {error}"),
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    kinescene::foundation::logging::init_with_level(log::LevelFilter::Info);

    log::info!("Starting kinescene demo");
    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading scene config from {path}");
            SceneConfig::load_from_file(&path).map_err(DemoError::from)?
        }
        None => SceneConfig::default(),
    };

    let mut app = DemoApp::new(config)?;
    app.initialize()?;
    app.run(3.0)?;

    log::info!("Demo finished");
    Ok(())
}
