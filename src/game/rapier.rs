//! Rapier-backed physics world

use std::collections::HashMap;

use parking_lot::Mutex;
use rapier2d::prelude::*;

use crate::util::time::PHYSICS_STEP_SECS;

use super::physics::{
    BodyDesc, BodyId, BodyState, BodyTag, CollisionPair, JointDesc, JointId, PhysicsWorld, Shape,
    Vec2,
};

/// Downward pull in px/s² (screen coordinates, y grows downward)
const GRAVITY: f32 = 100.0;

/// Mass per square pixel
const DENSITY: f32 = 0.001;

/// Converts per-step joint stiffness into a spring rate
const SPRING_RATE: f32 = 1.0 / (PHYSICS_STEP_SECS * PHYSICS_STEP_SECS);

/// Converts per-step joint damping into a spring damping coefficient
const SPRING_DAMPING: f32 = 2.0 / PHYSICS_STEP_SECS;

/// Collects contact starts reported during a step
#[derive(Default)]
struct ContactCollector {
    started: Mutex<Vec<(ColliderHandle, ColliderHandle)>>,
}

impl EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if let CollisionEvent::Started(a, b, _) = event {
            self.started.lock().push((a, b));
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

struct Entry {
    handle: RigidBodyHandle,
    tag: Option<BodyTag>,
}

/// A 2D rigid-body world driven by rapier
pub struct RapierWorld {
    gravity: Vector<Real>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    queries: QueryPipeline,
    contacts: ContactCollector,

    entries: HashMap<BodyId, Entry>,
    joints: HashMap<JointId, ImpulseJointHandle>,
    next_id: u64,
}

impl RapierWorld {
    pub fn new() -> Self {
        Self {
            gravity: vector![0.0, GRAVITY],
            params: IntegrationParameters {
                dt: PHYSICS_STEP_SECS,
                ..IntegrationParameters::default()
            },
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            queries: QueryPipeline::new(),
            contacts: ContactCollector::default(),
            entries: HashMap::new(),
            joints: HashMap::new(),
            next_id: 0,
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn body(&self, id: BodyId) -> Option<&RigidBody> {
        self.entries.get(&id).and_then(|e| self.bodies.get(e.handle))
    }

    fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        let handle = self.entries.get(&id)?.handle;
        self.bodies.get_mut(handle)
    }

    fn owner_of(&self, collider: ColliderHandle) -> Option<BodyId> {
        self.colliders
            .get(collider)
            .map(|c| BodyId(c.user_data as u64))
    }
}

impl Default for RapierWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld for RapierWorld {
    fn add_body(&mut self, desc: BodyDesc) -> BodyId {
        let id = BodyId(self.next_id());

        let builder = if desc.fixed {
            RigidBodyBuilder::fixed()
        } else {
            RigidBodyBuilder::dynamic()
        };
        let handle = self
            .bodies
            .insert(builder.translation(vector![desc.position.x, desc.position.y]));

        let collider = match desc.shape {
            Shape::Circle { radius } => ColliderBuilder::ball(radius),
            Shape::Rect { width, height } => ColliderBuilder::cuboid(width / 2.0, height / 2.0),
        }
        .density(DENSITY)
        .restitution(desc.restitution)
        .active_events(ActiveEvents::COLLISION_EVENTS)
        .user_data(id.0 as u128);
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        self.entries.insert(id, Entry { handle, tag: desc.tag });
        id
    }

    fn remove_body(&mut self, id: BodyId) {
        let Some(entry) = self.entries.remove(&id) else {
            return;
        };
        self.bodies.remove(
            entry.handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        // Attached joints went with the body
        let live = &self.impulse_joints;
        self.joints.retain(|_, handle| live.get(*handle).is_some());
    }

    fn add_joint(&mut self, desc: JointDesc) -> JointId {
        let id = JointId(self.next_id());
        let (Some(a), Some(b)) = (self.entries.get(&desc.body_a), self.entries.get(&desc.body_b))
        else {
            return id;
        };

        let spring = SpringJointBuilder::new(
            desc.rest_length,
            desc.stiffness * SPRING_RATE,
            desc.damping * SPRING_DAMPING,
        )
        .local_anchor1(point![desc.anchor_a.x, desc.anchor_a.y])
        .local_anchor2(point![desc.anchor_b.x, desc.anchor_b.y])
        .build();

        let handle = self.impulse_joints.insert(a.handle, b.handle, spring, true);
        self.joints.insert(id, handle);
        id
    }

    fn remove_joint(&mut self, id: JointId) {
        if let Some(handle) = self.joints.remove(&id) {
            self.impulse_joints.remove(handle, true);
        }
    }

    #[cfg(test)]
    fn contains_joint(&self, id: JointId) -> bool {
        self.joints
            .get(&id)
            .is_some_and(|handle| self.impulse_joints.get(*handle).is_some())
    }

    fn body_state(&self, id: BodyId) -> Option<BodyState> {
        let body = self.body(id)?;
        let position = body.translation();
        let velocity = body.linvel();
        Some(BodyState {
            position: Vec2::new(position.x, position.y),
            angle: body.rotation().angle(),
            velocity: Vec2::new(velocity.x, velocity.y),
            angular_velocity: body.angvel(),
        })
    }

    fn body_tag(&self, id: BodyId) -> Option<BodyTag> {
        self.entries.get(&id).and_then(|e| e.tag)
    }

    fn apply_force(&mut self, id: BodyId, force: Vec2) {
        if let Some(body) = self.body_mut(id) {
            body.add_force(vector![force.x, force.y], true);
        }
    }

    fn set_velocity(&mut self, id: BodyId, velocity: Vec2) {
        if let Some(body) = self.body_mut(id) {
            body.set_linvel(vector![velocity.x, velocity.y], true);
        }
    }

    fn set_angular_velocity(&mut self, id: BodyId, angular_velocity: f32) {
        if let Some(body) = self.body_mut(id) {
            body.set_angvel(angular_velocity, true);
        }
    }

    fn step(&mut self) -> Vec<CollisionPair> {
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.queries),
            &(),
            &self.contacts,
        );

        // Forces last for one step only
        for (_, body) in self.bodies.iter_mut() {
            body.reset_forces(false);
        }

        let started = std::mem::take(&mut *self.contacts.started.lock());
        started
            .into_iter()
            .filter_map(|(a, b)| {
                Some(CollisionPair {
                    a: self.owner_of(a)?,
                    b: self.owner_of(b)?,
                })
            })
            .collect()
    }

    fn clear(&mut self) {
        let gravity = self.gravity;
        let next_id = self.next_id;
        *self = Self {
            gravity,
            next_id,
            ..Self::new()
        };
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::game::hits::PartName;
    use crate::game::physics::add_arena_borders;
    use crate::game::ragdoll::build_ragdoll;

    fn ball(world: &mut RapierWorld, x: f32, y: f32, tag: Option<BodyTag>) -> BodyId {
        world.add_body(BodyDesc {
            shape: Shape::Circle { radius: 10.0 },
            position: Vec2::new(x, y),
            restitution: 0.5,
            fixed: false,
            tag,
        })
    }

    #[test]
    fn bodies_fall_and_report_landing() {
        let mut world = RapierWorld::new();
        let floor = world.add_body(BodyDesc {
            shape: Shape::Rect { width: 400.0, height: 20.0 },
            position: Vec2::new(100.0, 200.0),
            restitution: 0.0,
            fixed: true,
            tag: None,
        });
        let tag = BodyTag {
            owner: Uuid::new_v4(),
            part: PartName::Head,
        };
        let falling = ball(&mut world, 100.0, 150.0, Some(tag));

        let mut landed = false;
        for _ in 0..240 {
            landed |= world
                .step()
                .iter()
                .any(|pair| [pair.a, pair.b] == [floor, falling] || [pair.a, pair.b] == [falling, floor]);
        }

        assert!(landed);
        let state = world.body_state(falling).unwrap();
        assert!(state.position.y > 150.0);
        assert!(state.position.y < 200.0);
        assert_eq!(world.body_tag(falling), Some(tag));
        assert_eq!(world.body_tag(floor), None);
    }

    #[test]
    fn forces_act_for_a_single_step() {
        let mut world = RapierWorld::new();
        world.gravity = vector![0.0, 0.0];
        let id = ball(&mut world, 0.0, 0.0, None);

        world.apply_force(id, Vec2::new(1000.0, 0.0));
        world.step();
        let pushed = world.body_state(id).unwrap().velocity.x;
        world.step();

        assert!(pushed > 0.0);
        assert_eq!(world.body_state(id).unwrap().velocity.x, pushed);
    }

    #[test]
    fn velocities_can_be_overridden() {
        let mut world = RapierWorld::new();
        let id = ball(&mut world, 0.0, 0.0, None);

        world.set_velocity(id, Vec2::new(-50.0, 25.0));
        world.set_angular_velocity(id, 2.0);

        let state = world.body_state(id).unwrap();
        assert_eq!(state.velocity, Vec2::new(-50.0, 25.0));
        assert_eq!(state.angular_velocity, 2.0);
    }

    #[test]
    fn removing_a_body_drops_its_joints() {
        let mut world = RapierWorld::new();
        let a = ball(&mut world, 0.0, 0.0, None);
        let b = ball(&mut world, 30.0, 0.0, None);
        let joint = world.add_joint(JointDesc {
            body_a: a,
            body_b: b,
            anchor_a: Vec2::ZERO,
            anchor_b: Vec2::ZERO,
            rest_length: 30.0,
            stiffness: 0.5,
            damping: 0.3,
        });
        assert!(world.contains_joint(joint));

        world.remove_body(b);

        assert!(!world.contains_joint(joint));
        assert!(world.body_state(b).is_none());
        assert!(world.body_state(a).is_some());
    }

    #[test]
    fn ragdoll_holds_together_and_falls_apart_when_limp() {
        let mut world = RapierWorld::new();
        add_arena_borders(&mut world, 1280.0, 720.0);
        let owner = Uuid::new_v4();
        let mut ragdoll = build_ragdoll(&mut world, Vec2::new(400.0, 300.0), owner);

        for _ in 0..60 {
            world.step();
        }
        let head = world.body_state(ragdoll.head()).unwrap().position;
        let torso = world.body_state(ragdoll.part(PartName::Body)).unwrap().position;
        assert!((torso - head).length() < 120.0);

        let joints = ragdoll.joints().to_vec();
        assert!(joints.iter().all(|j| world.contains_joint(*j)));
        ragdoll.go_limp(&mut world);
        assert!(joints.iter().all(|j| !world.contains_joint(*j)));
    }

    #[test]
    fn clear_empties_the_world_without_reusing_ids() {
        let mut world = RapierWorld::new();
        let old = ball(&mut world, 0.0, 0.0, None);

        world.clear();
        let new = ball(&mut world, 0.0, 0.0, None);

        assert!(world.body_state(old).is_none());
        assert_ne!(old, new);
        assert_eq!(world.bodies.len(), 1);
    }
}
