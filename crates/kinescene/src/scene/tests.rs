//! Scene scenarios on the headless backends

use super::*;
use crate::builder::{ActorBuilder, BuildError, ShapeOptions, ShapeRecorder};
use crate::config::SceneConfig;
use crate::events::{Event, EventKind};
use crate::foundation::ids::ActorId;
use crate::foundation::math::{Pose, Vec3};
use crate::physics::{
    BodyKind, CollisionGroups, ContactEvent, ContactTransition, DofArray, HeadlessPhysics,
    JointKind, PhysicsBackend,
};
use crate::render::{HeadlessRenderer, RenderMaterial};
use approx::assert_relative_eq;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn scene() -> Scene {
    Scene::headless(SceneConfig::default()).expect("headless scene")
}

fn headless(scene: &Scene) -> &HeadlessPhysics {
    scene
        .physics()
        .as_any()
        .downcast_ref()
        .expect("headless physics")
}

fn headless_mut(scene: &mut Scene) -> &mut HeadlessPhysics {
    scene
        .physics_mut()
        .as_any_mut()
        .downcast_mut()
        .expect("headless physics")
}

fn renderer(scene: &Scene) -> &HeadlessRenderer {
    scene
        .renderer()
        .and_then(|r| r.as_any().downcast_ref())
        .expect("headless renderer")
}

fn box_builder(scene: &Scene) -> ActorBuilder {
    let mut builder = scene.create_actor_builder();
    let half = Vec3::new(0.5, 0.5, 0.5);
    builder
        .add_box_shape(Pose::identity(), half, ShapeOptions::default())
        .add_box_visual(Pose::identity(), half, RenderMaterial::default(), "box");
    builder
}

fn add_box(scene: &mut Scene, name: &str) -> ActorId {
    let actor = box_builder(scene).build(scene, name).expect("build box");
    scene.add_actor(actor).expect("add box")
}

/// Root with two revolute children; the headless backend orders them reversed
fn add_fork(scene: &mut Scene) -> ArticulationHandle {
    let mut builder = scene.create_articulation_builder();
    builder.set_fix_base(true);
    builder.create_link_builder(None).set_name("base");
    for (name, density) in [("left", 1000.0), ("right", 500.0)] {
        builder
            .create_link_builder(Some(0))
            .set_name(name)
            .set_joint_name(name)
            .set_joint_properties(
                JointKind::Revolute,
                &[],
                Pose::identity(),
                Pose::identity(),
                0.0,
                0.0,
            )
            .add_box_shape(
                Pose::identity(),
                Vec3::new(0.1, 0.1, 0.1),
                ShapeOptions::with_density(density),
            );
    }
    let articulation = builder.build(scene, "fork").expect("build fork");
    scene.add_articulation(articulation).expect("add fork")
}

fn counter(kind_seen: &Rc<Cell<u32>>) -> Box<dyn crate::events::EventHandler> {
    let seen = Rc::clone(kind_seen);
    Box::new(move |_event: &Event| seen.set(seen.get() + 1))
}

#[test]
fn test_find_after_add_and_cleanup() {
    let mut scene = scene();
    let id = add_box(&mut scene, "box");

    let actor = scene.find_actor_by_id(id).expect("registered");
    assert_eq!(actor.id(), id);
    assert_eq!(actor.name(), "box");
    let body = actor.body_handle();
    let proxies: Vec<_> = actor
        .visual_bodies()
        .iter()
        .chain(actor.collision_bodies())
        .map(|p| p.handle)
        .collect();
    assert_eq!(proxies.len(), 2);
    assert!(headless(&scene).is_body_in_world(body));

    assert!(scene.remove_actor(id));
    assert!(scene.find_actor_by_id(id).is_none());
    assert!(proxies.iter().all(|h| renderer(&scene).is_destroyed(*h)));
    // Out of the world but not yet released
    assert!(headless(&scene).body_exists(body));
    assert!(!headless(&scene).is_body_in_world(body));

    scene.step().expect("step");
    assert!(scene.find_actor_by_id(id).is_none());
    assert!(!headless(&scene).body_exists(body));
    assert_eq!(scene.all_actors().count(), 0);
}

#[test]
fn test_double_remove_is_noop() {
    let mut scene = scene();
    let id = add_box(&mut scene, "box");
    assert!(scene.remove_actor(id));
    assert!(!scene.remove_actor(id));
    scene.step().expect("step");
    assert!(!scene.remove_actor(id));
}

#[test]
fn test_pre_destroy_fires_before_teardown() {
    let mut scene = scene();
    let id = add_box(&mut scene, "box");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    scene.actor_mut(id).expect("live").subscribe(
        EventKind::ActorPreDestroy,
        Box::new(move |event: &Event| {
            if let Event::ActorPreDestroy { actor } = event {
                sink.borrow_mut().push(*actor);
            }
        }),
    );
    scene.remove_actor(id);
    scene.remove_actor(id);
    assert_eq!(*seen.borrow(), vec![id]);
}

#[test]
fn test_pending_actors_are_not_stepped() {
    let mut scene = scene();
    let id = add_box(&mut scene, "box");
    let steps = Rc::new(Cell::new(0));
    scene
        .actor_mut(id)
        .expect("live")
        .subscribe(EventKind::ActorStep, counter(&steps));

    scene.step().expect("step");
    assert_eq!(steps.get(), 1);
    scene.remove_actor(id);
    scene.step().expect("step");
    scene.step().expect("step");
    assert_eq!(steps.get(), 1);
}

#[test]
fn test_step_completed_after_cleanup() {
    let mut scene = scene();
    let completed = Rc::new(Cell::new(0));
    scene.subscribe(EventKind::Step, counter(&completed));
    let dt = scene.timestep();
    for _ in 0..3 {
        scene.step().expect("step");
    }
    assert_eq!(completed.get(), 3);
    assert_relative_eq!(scene.elapsed_time(), f64::from(dt) * 3.0, epsilon = 1e-9);
}

#[test]
fn test_step_async_twice_is_rejected() {
    let mut scene = scene();
    scene.step_async().expect("submit");
    assert!(scene.is_step_in_flight());
    assert!(matches!(scene.step_async(), Err(SceneError::StepInFlight)));
    scene.step_wait().expect("wait");
    assert!(!scene.is_step_in_flight());
    assert_eq!(headless(&scene).step_count(), 1);
}

#[test]
fn test_removal_mid_step_is_erased_at_step_wait() {
    let mut scene = scene();
    let id = add_box(&mut scene, "box");
    let body = scene.find_actor_by_id(id).expect("box").body_handle();
    let released = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&released);
    scene.subscribe(
        EventKind::Step,
        Box::new(move |event: &Event| {
            if let Event::Step { released: count, .. } = event {
                sink.borrow_mut().push(*count);
            }
        }),
    );

    scene.step_async().expect("submit");
    assert!(scene.remove_actor(id));
    scene.remove_clean_up();
    assert!(scene.find_actor_by_id(id).is_none());
    assert!(headless(&scene).body_exists(body));
    assert!(released.borrow().is_empty());

    // Cleanup has run by the time step listeners hear about the step
    scene.step_wait().expect("wait");
    assert!(!headless(&scene).body_exists(body));
    assert_eq!(*released.borrow(), vec![1]);

    scene.step().expect("step");
    assert_eq!(*released.borrow(), vec![1, 0]);
}

#[test]
fn test_rejected_add_releases_handles_after_step() {
    let mut scene = scene();
    let actor = box_builder(&scene).build(&mut scene, "late").expect("build");
    let body = actor.body_handle();
    let proxies: Vec<_> = actor
        .visual_bodies()
        .iter()
        .chain(actor.collision_bodies())
        .map(|p| p.handle)
        .collect();

    scene.step_async().expect("submit");
    assert!(matches!(scene.add_actor(actor), Err(SceneError::Backend(_))));
    assert!(headless(&scene).body_exists(body));

    scene.step_wait().expect("wait");
    assert!(!headless(&scene).body_exists(body));
    assert_eq!(headless(&scene).shape_count(), 0);
    assert!(proxies.iter().all(|h| renderer(&scene).is_destroyed(*h)));
    assert_eq!(scene.all_actors().count(), 0);
}

#[test]
fn test_dropped_entities_are_released_at_cleanup() {
    let mut scene = scene();
    let actor = box_builder(&scene).build(&mut scene, "unused").expect("build");
    let body = actor.body_handle();

    let mut builder = scene.create_articulation_builder();
    builder.create_link_builder(None).add_sphere_shape(
        Pose::identity(),
        0.1,
        ShapeOptions::default(),
    );
    let articulation = builder.build(&mut scene, "unused").expect("build");
    let multibody = articulation.multibody();

    drop(actor);
    drop(articulation);
    assert!(headless(&scene).body_exists(body));
    assert!(headless(&scene).articulation_exists(multibody));

    scene.step().expect("step");
    assert!(!headless(&scene).body_exists(body));
    assert!(!headless(&scene).articulation_exists(multibody));
    assert_eq!(headless(&scene).body_count(), 0);
    assert_eq!(headless(&scene).shape_count(), 0);
    assert_eq!(renderer(&scene).live_body_count(), 0);
}

#[test]
fn test_contact_present_for_exactly_six_steps() {
    let mut scene = scene();
    let a = add_box(&mut scene, "a");
    let b = add_box(&mut scene, "b");
    let shape_a = scene.find_actor_by_id(a).expect("a").collision_shapes()[0];
    let shape_b = scene.find_actor_by_id(b).expect("b").collision_shapes()[0];
    let events = Rc::new(Cell::new(0));
    scene
        .actor_mut(a)
        .expect("a")
        .subscribe(EventKind::ActorContact, counter(&events));

    let mut present = Vec::new();
    scene.step().expect("step");
    present.push(scene.contact_tracker().contains(shape_a, shape_b));

    let mut transitions = vec![ContactTransition::Starting];
    transitions.extend([ContactTransition::Persisting; 5]);
    transitions.push(ContactTransition::Ending);
    for transition in transitions {
        headless_mut(&mut scene).push_contact(ContactEvent {
            shapes: [shape_b, shape_a],
            transition,
            points: Vec::new(),
        });
        scene.step().expect("step");
        present.push(scene.contact_tracker().contains(shape_a, shape_b));
    }
    scene.step().expect("step");
    present.push(scene.contact_tracker().contains(shape_a, shape_b));

    let mut expected = vec![false];
    expected.extend([true; 6]);
    expected.extend([false, false]);
    assert_eq!(present, expected);
    assert_eq!(events.get(), 7);
    assert_eq!(scene.contact_tracker().inconsistency_count(), 0);
}

#[test]
fn test_contact_records_carry_owners() {
    let mut scene = scene();
    let a = add_box(&mut scene, "a");
    let b = add_box(&mut scene, "b");
    let shape_a = scene.find_actor_by_id(a).expect("a").collision_shapes()[0];
    let shape_b = scene.find_actor_by_id(b).expect("b").collision_shapes()[0];
    headless_mut(&mut scene).push_contact(ContactEvent {
        shapes: [shape_a, shape_b],
        transition: ContactTransition::Starting,
        points: Vec::new(),
    });
    scene.step().expect("step");
    let contacts = scene.contacts();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].actors, [a, b]);
}

#[test]
fn test_removed_actor_contacts_are_forgotten() {
    let mut scene = scene();
    let a = add_box(&mut scene, "a");
    let b = add_box(&mut scene, "b");
    let shape_a = scene.find_actor_by_id(a).expect("a").collision_shapes()[0];
    let shape_b = scene.find_actor_by_id(b).expect("b").collision_shapes()[0];
    headless_mut(&mut scene).push_contact(ContactEvent {
        shapes: [shape_a, shape_b],
        transition: ContactTransition::Starting,
        points: Vec::new(),
    });
    scene.step().expect("step");
    assert_eq!(scene.contacts().len(), 1);

    scene.remove_actor(a);
    assert_eq!(scene.contacts().len(), 1);
    scene.step().expect("step");
    assert!(scene.contacts().is_empty());
}

#[test]
fn test_remove_drive_wakes_and_detaches_both() {
    let mut scene = scene();
    let a = add_box(&mut scene, "a");
    let b = add_box(&mut scene, "b");
    let drive = scene
        .create_drive(Some(a), Pose::identity(), Some(b), Pose::identity())
        .expect("drive");
    let joint = scene.drive(drive).expect("registered").joint_handle();
    for id in [a, b] {
        assert!(scene.find_actor_by_id(id).expect("live").drives().contains(&drive));
        let mut actor = scene.actor_mut(id).expect("live");
        actor.put_to_sleep();
        assert!(actor.is_sleeping());
    }

    assert!(scene.remove_drive(drive));
    for id in [a, b] {
        assert!(!scene.find_actor_by_id(id).expect("live").drives().contains(&drive));
        assert!(!scene.actor_mut(id).expect("live").is_sleeping());
    }
    assert!(!headless(&scene).drive_joint_exists(joint));
    assert!(!scene.remove_drive(drive));
}

#[test]
fn test_removing_participant_detaches_drive() {
    let mut scene = scene();
    let a = add_box(&mut scene, "a");
    let b = add_box(&mut scene, "b");
    let drive = scene
        .create_drive(Some(a), Pose::identity(), Some(b), Pose::identity())
        .expect("drive");
    scene.actor_mut(b).expect("b").put_to_sleep();

    scene.remove_actor(a);
    assert!(scene.drive(drive).is_none());
    let survivor = scene.find_actor_by_id(b).expect("b");
    assert!(survivor.drives().is_empty());
    assert!(!scene.actor_mut(b).expect("b").is_sleeping());
}

#[test]
fn test_drive_to_world_and_properties() {
    let mut scene = scene();
    let a = add_box(&mut scene, "a");
    let drive = scene
        .create_drive(None, Pose::identity(), Some(a), Pose::identity())
        .expect("drive");
    let properties = crate::physics::DriveProperties {
        stiffness: 100.0,
        damping: 10.0,
        ..Default::default()
    };
    assert!(scene.set_drive_properties(drive, properties));
    let joint = scene.drive(drive).expect("drive").joint_handle();
    assert_eq!(headless(&scene).drive_joint_properties(joint), Some(properties));
    let body = scene.find_actor_by_id(a).expect("a").body_handle();
    assert_eq!(headless(&scene).drive_joint_bodies(joint), Some([None, Some(body)]));

    let missing = scene.create_drive(Some(ActorId(999)), Pose::identity(), None, Pose::identity());
    assert!(matches!(missing, Err(SceneError::UnknownEntity(ActorId(999)))));
}

#[test]
fn test_qpos_follows_authoring_order() {
    let mut scene = scene();
    let handle = add_fork(&mut scene);
    let multibody = scene.articulation(handle).expect("live").multibody();
    assert_eq!(headless(&scene).internal_link_order(multibody), Some(vec![0, 2, 1]));

    let mut articulation = scene.articulation_mut(handle).expect("live");
    assert_eq!(articulation.dof(), 2);
    articulation.set_qpos(&[0.25, -0.75]).expect("set qpos");
    drop(articulation);

    let internal = headless(&scene)
        .read_dofs(multibody, DofArray::Position)
        .expect("internal qpos");
    assert_eq!(internal, vec![-0.75, 0.25]);
    let qpos = scene.articulation_mut(handle).expect("live").qpos().expect("qpos");
    assert_eq!(qpos, vec![0.25, -0.75]);
}

#[test]
fn test_malformed_vector_never_reaches_backend() {
    let mut scene = scene();
    let handle = add_fork(&mut scene);
    let mut articulation = scene.articulation_mut(handle).expect("live");
    let result = articulation.set_qvel(&[1.0]);
    assert!(matches!(
        result,
        Err(crate::articulation::ArticulationError::ShapeMismatch {
            expected: 2,
            actual: 1
        })
    ));
    assert_eq!(articulation.qvel().expect("qvel"), vec![0.0, 0.0]);
}

#[test]
fn test_dynamics_use_authoring_order() {
    let mut scene = scene();
    let handle = add_fork(&mut scene);
    let mut articulation = scene.articulation_mut(handle).expect("live");

    // left: 0.008 m^3 at 1000 kg/m^3, right: at 500 kg/m^3
    let qf = articulation.compute_inverse_dynamics(&[1.0, 1.0]).expect("inverse");
    assert_relative_eq!(qf[0], 8.0, epsilon = 1e-4);
    assert_relative_eq!(qf[1], 4.0, epsilon = 1e-4);

    let qacc = articulation.compute_forward_dynamics(&qf).expect("forward");
    assert_relative_eq!(qacc[0], 1.0, epsilon = 1e-5);
    assert_relative_eq!(qacc[1], 1.0, epsilon = 1e-5);

    let passive = articulation
        .compute_passive_force(true, true, true)
        .expect("passive");
    assert_eq!(passive, vec![0.0, 0.0]);
}

#[test]
fn test_jacobian_rows_and_columns_in_authoring_order() {
    let mut scene = scene();
    let handle = add_fork(&mut scene);
    let jacobian = scene
        .articulation_mut(handle)
        .expect("live")
        .compute_jacobian()
        .expect("jacobian");
    assert_eq!(jacobian.shape(), (18, 2));
    for r in 0..6 {
        let value = (r + 1) as f32;
        assert_eq!(jacobian[(r, 0)], 0.0);
        assert_eq!(jacobian[(r, 1)], 0.0);
        assert_eq!(jacobian[(6 + r, 0)], value);
        assert_eq!(jacobian[(6 + r, 1)], 0.0);
        assert_eq!(jacobian[(12 + r, 0)], 0.0);
        assert_eq!(jacobian[(12 + r, 1)], value);
    }
}

#[test]
fn test_pack_and_unpack_state() {
    let mut scene = scene();
    let handle = add_fork(&mut scene);
    let mut articulation = scene.articulation_mut(handle).expect("live");
    articulation.set_qpos(&[0.1, 0.2]).expect("qpos");
    articulation.set_qvel(&[-1.0, 1.0]).expect("qvel");
    let packed = articulation.pack_state().expect("pack");
    assert_eq!(packed.len(), articulation.articulation().packed_state_len());

    articulation.set_qpos(&[0.0, 0.0]).expect("qpos");
    articulation.set_qvel(&[0.0, 0.0]).expect("qvel");
    articulation.unpack_state(&packed).expect("unpack");
    assert_eq!(articulation.qpos().expect("qpos"), vec![0.1, 0.2]);
    assert_eq!(articulation.qvel().expect("qvel"), vec![-1.0, 1.0]);
    assert!(articulation.unpack_state(&packed[1..]).is_err());
}

#[test]
fn test_articulation_removal_releases_links() {
    let mut scene = scene();
    let handle = add_fork(&mut scene);
    let articulation = scene.articulation(handle).expect("live");
    let multibody = articulation.multibody();
    let link_ids: Vec<ActorId> = articulation.links().iter().map(SceneBody::id).collect();
    assert_eq!(link_ids.len(), 3);
    for &id in &link_ids {
        assert!(scene.find_articulation_link_by_id(id).is_some());
        assert!(scene.find_actor_by_id(id).is_none());
    }
    let link_events = Rc::new(Cell::new(0));
    scene
        .link_mut(link_ids[1])
        .expect("link")
        .subscribe(EventKind::ActorStep, counter(&link_events));

    assert!(scene.remove_articulation(handle));
    assert!(!scene.remove_articulation(handle));
    assert!(scene.articulation(handle).is_none());
    assert!(link_ids
        .iter()
        .all(|id| scene.find_articulation_link_by_id(*id).is_none()));
    assert!(headless(&scene).articulation_exists(multibody));
    assert!(!headless(&scene).is_articulation_in_world(multibody));

    scene.step().expect("step");
    assert_eq!(link_events.get(), 0);
    assert!(!headless(&scene).articulation_exists(multibody));
    assert_eq!(scene.all_articulations().count(), 0);
}

#[test]
fn test_ground_snapshots_collision_groups() {
    let mut scene = scene();
    let mut builder = scene.create_actor_builder();
    builder.set_collision_group(1, 2, 0);
    let ground = builder
        .build_ground(&mut scene, -1.0, true, None, &RenderMaterial::default(), "ground")
        .expect("ground");
    builder.set_collision_group(3, 3, 3);
    let id = scene.add_actor(ground).expect("add ground");

    let actor = scene.find_actor_by_id(id).expect("ground");
    assert_eq!(actor.kind(), BodyKind::Static);
    assert_eq!(actor.collision_shapes().len(), 1);
    let shape = actor.collision_shapes()[0];
    let expected = CollisionGroups { w0: 1, w1: 2, w2: 0 };
    assert_eq!(scene.physics().shape_filter(shape), Some(expected));
    assert_eq!(actor.collision_groups(), expected);

    let pose = scene.physics().shape_local_pose(shape).expect("pose");
    assert_relative_eq!(pose.translation.vector.z, -1.0);
    let normal = pose.rotation * Vec3::x();
    assert_relative_eq!(normal, Vec3::z(), epsilon = 1e-6);

    // A later build picks up the new groups, the first ground does not
    let second = builder
        .build_ground(&mut scene, 0.0, false, None, &RenderMaterial::default(), "ground2")
        .expect("second ground");
    assert_eq!(second.collision_groups(), CollisionGroups { w0: 3, w1: 3, w2: 3 });
    assert_eq!(scene.physics().shape_filter(shape), Some(expected));
}

#[test]
fn test_build_twice_gives_independent_actors() {
    let mut scene = scene();
    let builder = box_builder(&scene);
    let first = builder.build(&mut scene, "first").expect("first");
    let second = builder.build(&mut scene, "second").expect("second");

    assert_ne!(first.id(), second.id());
    assert_ne!(first.body_handle(), second.body_handle());
    assert!(first
        .collision_shapes()
        .iter()
        .all(|s| !second.collision_shapes().contains(s)));
    let handles = |actor: &Actor| -> Vec<_> {
        actor
            .visual_bodies()
            .iter()
            .chain(actor.collision_bodies())
            .map(|p| (p.handle, p.render_id))
            .collect()
    };
    for (handle, render_id) in handles(&first) {
        assert!(handles(&second)
            .iter()
            .all(|(h, r)| *h != handle && *r != render_id));
    }

    let first_id = scene.add_actor(first).expect("add first");
    let second_id = scene.add_actor(second).expect("add second");
    let second_shape = scene.find_actor_by_id(second_id).expect("second").collision_shapes()[0];
    scene.remove_actor(first_id);
    scene.step().expect("step");
    assert!(headless(&scene).shape_exists(second_shape));
    assert!(scene.find_actor_by_id(second_id).is_some());
}

#[test]
fn test_failed_build_leaves_nothing_behind() {
    let mut scene = scene();
    headless_mut(&mut scene).set_fail_shape_creation(true);

    let result = box_builder(&scene).build(&mut scene, "doomed");
    assert!(matches!(result, Err(BuildError::ResourceCreation(_))));
    assert_eq!(headless(&scene).body_count(), 0);
    assert_eq!(headless(&scene).shape_count(), 0);
    assert_eq!(renderer(&scene).live_body_count(), 0);

    let mut builder = scene.create_articulation_builder();
    builder.create_link_builder(None).add_sphere_shape(
        Pose::identity(),
        0.1,
        ShapeOptions::default(),
    );
    assert!(matches!(
        builder.build(&mut scene, "doomed"),
        Err(BuildError::ResourceCreation(_))
    ));
    assert_eq!(headless(&scene).body_count(), 0);
    assert_eq!(scene.all_articulations().count(), 0);
}

#[test]
fn test_partial_failure_releases_created_shapes() {
    let mut scene = scene();
    let mut builder = scene.create_actor_builder();
    builder
        .add_sphere_shape(Pose::identity(), 0.5, ShapeOptions::default())
        .add_sphere_shape(Pose::identity(), -1.0, ShapeOptions::default());
    assert!(builder.build(&mut scene, "bad").is_err());
    assert_eq!(headless(&scene).shape_count(), 0);
    assert_eq!(headless(&scene).body_count(), 0);
}

#[test]
fn test_foreign_builders_and_entities_are_rejected() {
    let mut home = scene();
    let mut away = scene();
    let builder = box_builder(&home);
    assert!(matches!(
        builder.build(&mut away, "stray"),
        Err(BuildError::ForeignScene { .. })
    ));

    let actor = builder.build(&mut home, "homebody").expect("build");
    assert!(matches!(
        away.add_actor(actor),
        Err(SceneError::ForeignEntity { .. })
    ));
}

#[test]
fn test_render_proxies_are_tagged() {
    let mut scene = scene();
    let id = add_box(&mut scene, "box");
    let actor = scene.find_actor_by_id(id).expect("box");
    let visual = &actor.visual_bodies()[0];
    let collision = &actor.collision_bodies()[0];

    let record = renderer(&scene).body(visual.handle).expect("visual");
    assert_eq!(record.segmentation_id, id.raw());
    assert_eq!(record.unique_id, Some(visual.render_id));
    assert!(record.visible);

    let record = renderer(&scene).body(collision.handle).expect("collision");
    assert!(!record.visible);
    assert_eq!(record.render_mode, 1);
    assert_ne!(visual.render_id, collision.render_id);

    let names = scene.find_render_id_to_visual_name();
    assert_eq!(names.get(&visual.render_id).map(String::as_str), Some("box"));
    assert!(!names.contains_key(&collision.render_id));
}

#[test]
fn test_render_collision_bodies_swaps_visibility() {
    let mut scene = scene();
    let id = add_box(&mut scene, "box");
    scene.actor_mut(id).expect("box").render_collision_bodies(true);
    let actor = scene.find_actor_by_id(id).expect("box");
    let visual = actor.visual_bodies()[0].handle;
    let collision = actor.collision_bodies()[0].handle;
    assert!(!renderer(&scene).body(visual).expect("visual").visible);
    assert!(renderer(&scene).body(collision).expect("collision").visible);
}

#[test]
fn test_update_render_follows_bodies_and_cameras() {
    let mut scene = scene();
    let id = add_box(&mut scene, "box");
    let camera = scene
        .add_mounted_camera(
            "wrist",
            Some(id),
            Pose::translation(0.0, 0.0, 1.0),
            CameraSpec::default(),
        )
        .expect("camera");
    let target = Pose::translation(1.0, 2.0, 3.0);
    scene.actor_mut(id).expect("box").set_pose(target);
    scene.update_render();

    let visual = scene.find_actor_by_id(id).expect("box").visual_bodies()[0].handle;
    assert_eq!(renderer(&scene).body(visual).expect("visual").pose, target);
    let handle = scene.mounted_camera(camera).expect("camera").camera_handle();
    let camera_pose = renderer(&scene).camera(handle).expect("camera").pose;
    assert_relative_eq!(camera_pose.translation.vector, Vec3::new(1.0, 2.0, 4.0));
}

#[test]
fn test_mounted_camera_goes_with_its_mount() {
    let mut scene = scene();
    let id = add_box(&mut scene, "box");
    let camera = scene
        .add_mounted_camera("eye", Some(id), Pose::identity(), CameraSpec::default())
        .expect("camera");
    assert_eq!(scene.find_mounted_camera("eye", Some(id)), Some(camera));
    assert_eq!(scene.find_mounted_camera("eye", None), Some(camera));
    assert_eq!(renderer(&scene).camera_count(), 1);

    scene.remove_actor(id);
    assert_eq!(scene.find_mounted_camera("eye", None), None);
    assert_eq!(renderer(&scene).camera_count(), 0);
    assert!(!scene.remove_mounted_camera(camera));
}

#[test]
fn test_camera_requires_renderer() {
    let mut scene = Scene::new(SceneConfig::default(), Box::new(HeadlessPhysics::new()), None)
        .expect("scene");
    let id = add_box(&mut scene, "box");
    assert!(scene
        .add_mounted_camera("eye", Some(id), Pose::identity(), CameraSpec::default())
        .is_none());
    assert!(scene.find_actor_by_id(id).expect("box").visual_bodies().is_empty());
}

#[test]
fn test_ids_are_unique_across_actors_and_links() {
    let mut scene = scene();
    let a = add_box(&mut scene, "a");
    let handle = add_fork(&mut scene);
    let b = add_box(&mut scene, "b");
    let mut ids = vec![a, b];
    ids.extend(
        scene
            .articulation(handle)
            .expect("fork")
            .links()
            .iter()
            .map(SceneBody::id),
    );
    let count = ids.len();
    ids.sort_by_key(|id| id.raw());
    ids.dedup();
    assert_eq!(ids.len(), count);
    assert!(ids.iter().all(|id| id.raw() != 0));
}

#[test]
fn test_link_drive_wakes_articulation() {
    let mut scene = scene();
    let handle = add_fork(&mut scene);
    let link = scene.articulation(handle).expect("fork").links()[2].id();
    let a = add_box(&mut scene, "a");
    scene.articulation_mut(handle).expect("fork").put_to_sleep();
    let drive = scene
        .create_drive(Some(a), Pose::identity(), Some(link), Pose::identity())
        .expect("drive");
    assert!(!scene.articulation_mut(handle).expect("fork").is_sleeping());
    assert_eq!(
        scene.find_articulation_link_by_id(link).expect("link").drives(),
        &[drive]
    );
}
