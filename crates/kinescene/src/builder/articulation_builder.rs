//! Articulation builder
//!
//! Links are authored in creation order; a link's parent must be created
//! before it. The resulting authoring order is the external order every
//! articulation accessor speaks.

use super::records::{BodyRecords, ShapeRecorder};
use super::BuildError;
use crate::articulation::{Articulation, DofIndexMap, Joint, Link};
use crate::events::EventRegistry;
use crate::foundation::math::Pose;
use crate::physics::{ArticulationDesc, BodyKind, JointDesc, JointKind, LinkDesc};
use crate::scene::actor::{BodyCore, DestroyState};
use crate::scene::{Scene, SceneId};

/// Joint parameters recorded on a link builder
#[derive(Debug, Clone, PartialEq)]
pub struct JointRecord {
    /// Joint name
    pub name: String,
    /// Joint type
    pub kind: JointKind,
    /// Lower/upper limit per dof; empty means unlimited
    pub limits: Vec<[f32; 2]>,
    /// Joint frame in the parent link
    pub pose_in_parent: Pose,
    /// Joint frame in the child link
    pub pose_in_child: Pose,
    /// Joint friction
    pub friction: f32,
    /// Joint damping
    pub damping: f32,
}

impl Default for JointRecord {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: JointKind::Fixed,
            limits: Vec::new(),
            pose_in_parent: Pose::identity(),
            pose_in_child: Pose::identity(),
            friction: 0.0,
            damping: 0.0,
        }
    }
}

impl JointRecord {
    fn to_desc(&self, link: usize) -> Result<JointDesc, BuildError> {
        let dof = self.kind.dof();
        let limits = if self.limits.is_empty() {
            vec![[f32::NEG_INFINITY, f32::INFINITY]; dof]
        } else if self.limits.len() == dof {
            self.limits.clone()
        } else {
            return Err(BuildError::InvalidTopology(format!(
                "joint of link {link} has {} limits for {dof} dofs",
                self.limits.len()
            )));
        };
        Ok(JointDesc {
            kind: self.kind,
            pose_in_parent: self.pose_in_parent,
            pose_in_child: self.pose_in_child,
            limits,
            friction: self.friction,
            damping: self.damping,
        })
    }
}

/// Records one link: its shapes and visuals plus the joint to its parent
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    index: usize,
    parent: Option<usize>,
    name: String,
    joint: JointRecord,
    records: BodyRecords,
}

impl LinkBuilder {
    fn new(index: usize, parent: Option<usize>) -> Self {
        Self {
            index,
            parent,
            name: String::new(),
            joint: JointRecord::default(),
            records: BodyRecords::default(),
        }
    }

    /// Authoring index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Parent index; `None` for the root
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Re-parent the link
    pub fn set_parent(&mut self, parent: Option<usize>) -> &mut Self {
        self.parent = parent;
        self
    }

    /// Link name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the link name
    pub fn set_name(&mut self, name: &str) -> &mut Self {
        self.name = name.to_string();
        self
    }

    /// Set the joint name
    pub fn set_joint_name(&mut self, name: &str) -> &mut Self {
        self.joint.name = name.to_string();
        self
    }

    /// Joint to the parent
    pub fn joint(&self) -> &JointRecord {
        &self.joint
    }

    /// Set the joint to the parent; empty `limits` leave every dof free
    pub fn set_joint_properties(
        &mut self,
        kind: JointKind,
        limits: &[[f32; 2]],
        pose_in_parent: Pose,
        pose_in_child: Pose,
        friction: f32,
        damping: f32,
    ) -> &mut Self {
        self.joint = JointRecord {
            name: std::mem::take(&mut self.joint.name),
            kind,
            limits: limits.to_vec(),
            pose_in_parent,
            pose_in_child,
            friction,
            damping,
        };
        self
    }
}

impl ShapeRecorder for LinkBuilder {
    fn records(&self) -> &BodyRecords {
        &self.records
    }

    fn records_mut(&mut self) -> &mut BodyRecords {
        &mut self.records
    }
}

/// Records a link tree, then builds independent articulations from it
#[derive(Debug, Clone)]
pub struct ArticulationBuilder {
    scene: SceneId,
    links: Vec<LinkBuilder>,
    fix_base: bool,
    root_pose: Pose,
}

impl ArticulationBuilder {
    pub(crate) fn new(scene: SceneId) -> Self {
        Self {
            scene,
            links: Vec::new(),
            fix_base: false,
            root_pose: Pose::identity(),
        }
    }

    /// Scene this builder is bound to
    pub fn scene_id(&self) -> SceneId {
        self.scene
    }

    /// Append a link; `None` makes it the root
    pub fn create_link_builder(&mut self, parent: Option<usize>) -> &mut LinkBuilder {
        let index = self.links.len();
        self.links.push(LinkBuilder::new(index, parent));
        &mut self.links[index]
    }

    /// Link builder by authoring index
    pub fn link_builder(&mut self, index: usize) -> Option<&mut LinkBuilder> {
        self.links.get_mut(index)
    }

    /// Number of recorded links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Weld the root to the world
    pub fn set_fix_base(&mut self, fix_base: bool) -> &mut Self {
        self.fix_base = fix_base;
        self
    }

    /// Initial root pose
    pub fn set_root_pose(&mut self, pose: Pose) -> &mut Self {
        self.root_pose = pose;
        self
    }

    fn describe(&self) -> Result<ArticulationDesc, BuildError> {
        if self.links.is_empty() {
            return Err(BuildError::InvalidTopology("no links".to_string()));
        }
        let roots = self.links.iter().filter(|l| l.parent.is_none()).count();
        if roots != 1 {
            return Err(BuildError::InvalidTopology(format!(
                "expected one root link, found {roots}"
            )));
        }
        let mut links = Vec::with_capacity(self.links.len());
        for link in &self.links {
            match link.parent {
                Some(parent) if parent >= link.index => {
                    return Err(BuildError::InvalidTopology(format!(
                        "link {} has parent {parent} created after it",
                        link.index
                    )));
                }
                Some(_) => links.push(LinkDesc {
                    parent: link.parent,
                    joint: link.joint.to_desc(link.index)?,
                }),
                // The root's joint is never simulated
                None => links.push(LinkDesc {
                    parent: None,
                    joint: JointDesc {
                        kind: JointKind::Fixed,
                        pose_in_parent: Pose::identity(),
                        pose_in_child: Pose::identity(),
                        limits: Vec::new(),
                        friction: 0.0,
                        damping: 0.0,
                    },
                }),
            }
        }
        Ok(ArticulationDesc {
            links,
            fix_base: self.fix_base,
            root_pose: self.root_pose,
        })
    }

    /// Build an articulation
    ///
    /// Fails without leaving anything behind in the backend if the topology
    /// is invalid or any shape cannot be created.
    pub fn build(&self, scene: &mut Scene, name: &str) -> Result<Articulation, BuildError> {
        let desc = self.describe()?;
        let mut ctx = scene.build_context();
        ctx.check_scene(self.scene)?;

        let parts = ctx.physics.create_articulation(&desc)?;
        let mut link_shapes = Vec::with_capacity(self.links.len());
        for (link, &body) in self.links.iter().zip(&parts.links) {
            match ctx.realize_shapes(body, BodyKind::Dynamic, &link.records) {
                Ok(shapes) => link_shapes.push(shapes),
                Err(error) => {
                    ctx.physics.release_articulation(parts.multibody);
                    return Err(error);
                }
            }
        }

        let mut link_internal = Vec::with_capacity(parts.links.len());
        for &body in &parts.links {
            let Some(internal) = ctx.physics.link_internal_index(parts.multibody, body) else {
                ctx.physics.release_articulation(parts.multibody);
                return Err(BuildError::InvalidTopology(format!(
                    "backend did not order link body {}",
                    body.0
                )));
            };
            link_internal.push(internal);
        }
        let link_dofs: Vec<usize> = desc
            .links
            .iter()
            .map(|l| if l.parent.is_some() { l.joint.kind.dof() } else { 0 })
            .collect();
        let Some(index_map) = DofIndexMap::new(&link_dofs, &link_internal) else {
            ctx.physics.release_articulation(parts.multibody);
            return Err(BuildError::InvalidTopology(
                "backend link order is not a permutation".to_string(),
            ));
        };
        let cache = match ctx.physics.create_cache(parts.multibody) {
            Ok(cache) => cache,
            Err(error) => {
                ctx.physics.release_articulation(parts.multibody);
                return Err(error.into());
            }
        };

        let mut links = Vec::with_capacity(self.links.len());
        for ((record, &body), shapes) in self.links.iter().zip(&parts.links).zip(link_shapes) {
            let id = ctx.next_actor_id();
            let mut core = BodyCore::new(id, &record.name, body, record.records.collision_groups);
            core.shapes = shapes;
            core.visuals = ctx.create_visuals(&record.records, id);
            core.collision_visuals = ctx.create_collision_visuals(&core.shapes, id);
            let joint = &desc.links[record.index].joint;
            links.push(Link {
                core,
                index: record.index,
                parent: record.parent,
                joint: Joint {
                    name: record.joint.name.clone(),
                    kind: joint.kind,
                    pose_in_parent: joint.pose_in_parent,
                    pose_in_child: joint.pose_in_child,
                    friction: joint.friction,
                    damping: joint.damping,
                },
            });
        }

        log::debug!(
            "Built articulation '{name}' with {} links and {} dofs",
            links.len(),
            index_map.dof()
        );
        Ok(Articulation {
            name: name.to_string(),
            scene: self.scene,
            multibody: parts.multibody,
            links,
            index_map,
            cache,
            fix_base: self.fix_base,
            state: DestroyState::Alive,
            events: EventRegistry::new(),
            release: Some(ctx.release.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;

    fn scene() -> Scene {
        Scene::headless(SceneConfig::default()).expect("headless scene")
    }

    #[test]
    fn test_two_roots_rejected() {
        let mut scene = scene();
        let mut builder = scene.create_articulation_builder();
        builder.create_link_builder(None);
        builder.create_link_builder(None);
        let result = builder.build(&mut scene, "twins");
        assert!(matches!(result, Err(BuildError::InvalidTopology(_))));
    }

    #[test]
    fn test_parent_must_precede_child() {
        let mut scene = scene();
        let mut builder = scene.create_articulation_builder();
        builder.create_link_builder(None);
        builder.create_link_builder(Some(0)).set_parent(Some(2));
        builder.create_link_builder(Some(0));
        assert!(matches!(
            builder.build(&mut scene, "loop"),
            Err(BuildError::InvalidTopology(_))
        ));
    }

    #[test]
    fn test_limit_count_checked() {
        let mut scene = scene();
        let mut builder = scene.create_articulation_builder();
        builder.create_link_builder(None);
        builder.create_link_builder(Some(0)).set_joint_properties(
            JointKind::Revolute,
            &[[-1.0, 1.0], [-2.0, 2.0]],
            Pose::identity(),
            Pose::identity(),
            0.0,
            0.0,
        );
        assert!(matches!(
            builder.build(&mut scene, "arm"),
            Err(BuildError::InvalidTopology(_))
        ));
    }

    #[test]
    fn test_empty_limits_are_unbounded() {
        let record = JointRecord {
            kind: JointKind::Spherical,
            ..JointRecord::default()
        };
        let desc = record.to_desc(1).expect("valid joint");
        assert_eq!(desc.limits.len(), 3);
        assert!(desc.limits.iter().all(|l| l[0] == f32::NEG_INFINITY && l[1] == f32::INFINITY));
    }

    #[test]
    fn test_joint_name_survives_properties() {
        let mut scene = scene();
        let mut builder = scene.create_articulation_builder();
        builder.create_link_builder(None).set_name("base");
        builder
            .create_link_builder(Some(0))
            .set_name("arm")
            .set_joint_name("shoulder")
            .set_joint_properties(
                JointKind::Prismatic,
                &[],
                Pose::identity(),
                Pose::identity(),
                0.1,
                0.2,
            );
        let articulation = builder.build(&mut scene, "slider").expect("build");
        assert_eq!(articulation.dof(), 1);
        let joint = articulation.joints().next().expect("one joint");
        assert_eq!(joint.name(), "shoulder");
        assert_eq!(joint.kind(), JointKind::Prismatic);
        assert_eq!(articulation.find_link_by_name("arm").map(|l| l.index()), Some(1));
    }
}
