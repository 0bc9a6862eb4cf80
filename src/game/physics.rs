//! Physics world seam: the primitives the arena needs from a rigid-body engine

use std::ops::{Add, Mul, Sub};

use serde::Serialize;

use super::hits::PartName;
use super::ConnId;

/// 2D vector in arena pixels (y grows downwards)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn midpoint(self, other: Vec2) -> Vec2 {
        Vec2::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Handle to a body inside a [`PhysicsWorld`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u64);

/// Handle to a joint inside a [`PhysicsWorld`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointId(pub u64);

/// Collision shape, sized in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Circle { radius: f32 },
    Rect { width: f32, height: f32 },
}

/// Ownership tag carried by every ragdoll body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyTag {
    pub owner: ConnId,
    pub part: PartName,
}

/// Everything needed to insert a body
#[derive(Debug, Clone, Copy)]
pub struct BodyDesc {
    pub shape: Shape,
    pub position: Vec2,
    pub restitution: f32,
    /// Static bodies never move (arena walls)
    pub fixed: bool,
    pub tag: Option<BodyTag>,
}

/// Elastic link between two bodies, anchors are local to each body
#[derive(Debug, Clone, Copy)]
pub struct JointDesc {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub anchor_a: Vec2,
    pub anchor_b: Vec2,
    pub rest_length: f32,
    /// 0..=1, fraction of the stretch corrected per step
    pub stiffness: f32,
    /// 0..=1
    pub damping: f32,
}

/// Kinematic state of a body
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyState {
    pub position: Vec2,
    pub angle: f32,
    pub velocity: Vec2,
    pub angular_velocity: f32,
}

/// Two bodies that started touching during the last step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionPair {
    pub a: BodyId,
    pub b: BodyId,
}

/// The rigid-body engine as seen by the arena.
///
/// Forces applied between steps act for exactly one step.
pub trait PhysicsWorld: Send {
    fn add_body(&mut self, desc: BodyDesc) -> BodyId;

    /// Removes the body and every joint attached to it
    fn remove_body(&mut self, id: BodyId);

    fn add_joint(&mut self, desc: JointDesc) -> JointId;

    fn remove_joint(&mut self, id: JointId);

    #[cfg(test)]
    fn contains_joint(&self, id: JointId) -> bool;

    fn body_state(&self, id: BodyId) -> Option<BodyState>;

    fn body_tag(&self, id: BodyId) -> Option<BodyTag>;

    fn apply_force(&mut self, id: BodyId, force: Vec2);

    fn set_velocity(&mut self, id: BodyId, velocity: Vec2);

    fn set_angular_velocity(&mut self, id: BodyId, angular_velocity: f32);

    /// Advance one fixed step, returning the contacts that began during it
    fn step(&mut self) -> Vec<CollisionPair>;

    /// Remove every body and joint
    fn clear(&mut self);
}

/// Wall thickness of the arena border
const WALL_THICKNESS: f32 = 20.0;
const WALL_RESTITUTION: f32 = 0.7;

/// Surround the arena with four static walls just outside its bounds
pub fn add_arena_borders<W: PhysicsWorld + ?Sized>(world: &mut W, width: f32, height: f32) {
    let half = WALL_THICKNESS / 2.0;
    let walls = [
        (Vec2::new(width / 2.0, -half), width, WALL_THICKNESS),
        (Vec2::new(width / 2.0, height + half), width, WALL_THICKNESS),
        (Vec2::new(-half, height / 2.0), WALL_THICKNESS, height),
        (Vec2::new(width + half, height / 2.0), WALL_THICKNESS, height),
    ];

    for (position, width, height) in walls {
        world.add_body(BodyDesc {
            shape: Shape::Rect { width, height },
            position,
            restitution: WALL_RESTITUTION,
            fixed: true,
            tag: None,
        });
    }
}
