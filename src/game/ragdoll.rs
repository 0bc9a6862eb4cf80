//! Ragdoll construction: six bodies held together by five elastic joints

use super::hits::PartName;
use super::physics::{BodyDesc, BodyId, BodyTag, JointDesc, JointId, PhysicsWorld, Shape, Vec2};
use super::ConnId;

/// Head radius in pixels
pub const HEAD_RADIUS: f32 = 20.0;

/// Body layout relative to the spawn point (the head's center)
struct PartLayout {
    part: PartName,
    offset: Vec2,
    shape: Shape,
    restitution: f32,
}

const LAYOUT: [PartLayout; 6] = [
    PartLayout {
        part: PartName::Head,
        offset: Vec2::new(0.0, 0.0),
        shape: Shape::Circle { radius: HEAD_RADIUS },
        restitution: 0.8,
    },
    PartLayout {
        part: PartName::Body,
        offset: Vec2::new(0.0, 45.0),
        shape: Shape::Rect { width: 20.0, height: 50.0 },
        restitution: 0.2,
    },
    PartLayout {
        part: PartName::LeftArm,
        offset: Vec2::new(-30.0, 30.0),
        shape: Shape::Rect { width: 40.0, height: 15.0 },
        restitution: 1.0,
    },
    PartLayout {
        part: PartName::RightArm,
        offset: Vec2::new(30.0, 30.0),
        shape: Shape::Rect { width: 40.0, height: 15.0 },
        restitution: 1.0,
    },
    PartLayout {
        part: PartName::LeftLeg,
        offset: Vec2::new(-10.0, 90.0),
        shape: Shape::Rect { width: 20.0, height: 40.0 },
        restitution: 1.0,
    },
    PartLayout {
        part: PartName::RightLeg,
        offset: Vec2::new(10.0, 90.0),
        shape: Shape::Rect { width: 20.0, height: 40.0 },
        restitution: 1.0,
    },
];

/// Joint layout: (part a, anchor on a, part b, anchor on b, stiffness, damping)
const JOINTS: [(PartName, Vec2, PartName, Vec2, f32, f32); 5] = [
    (PartName::Head, Vec2::new(0.0, 20.0), PartName::Body, Vec2::new(0.0, -25.0), 0.7, 0.5),
    (PartName::Body, Vec2::new(-10.0, -15.0), PartName::LeftArm, Vec2::new(15.0, 0.0), 0.6, 0.3),
    (PartName::Body, Vec2::new(10.0, -15.0), PartName::RightArm, Vec2::new(-15.0, 0.0), 0.6, 0.3),
    (PartName::Body, Vec2::new(-6.0, 25.0), PartName::LeftLeg, Vec2::new(0.0, -15.0), 0.6, 0.3),
    (PartName::Body, Vec2::new(6.0, 25.0), PartName::RightLeg, Vec2::new(0.0, -15.0), 0.6, 0.3),
];

/// One player's articulated body inside the world
#[derive(Debug, Clone)]
pub struct Ragdoll {
    /// Bodies in layout order
    parts: [(PartName, BodyId); 6],
    /// Empty once the ragdoll has gone limp
    joints: Vec<JointId>,
}

impl Ragdoll {
    pub fn part(&self, name: PartName) -> BodyId {
        self.parts
            .iter()
            .find(|(part, _)| *part == name)
            .map(|(_, id)| *id)
            .unwrap_or(self.parts[0].1)
    }

    pub fn head(&self) -> BodyId {
        self.part(PartName::Head)
    }

    pub fn parts(&self) -> impl Iterator<Item = (PartName, BodyId)> + '_ {
        self.parts.iter().copied()
    }

    #[cfg(test)]
    pub fn joints(&self) -> &[JointId] {
        &self.joints
    }

    #[cfg(test)]
    pub fn is_limp(&self) -> bool {
        self.joints.is_empty()
    }

    /// Detach every joint so the body flops
    pub fn go_limp<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        for joint in self.joints.drain(..) {
            world.remove_joint(joint);
        }
    }

    /// Take the whole ragdoll out of the world
    pub fn despawn<W: PhysicsWorld + ?Sized>(mut self, world: &mut W) {
        self.go_limp(world);
        for (_, body) in self.parts {
            world.remove_body(body);
        }
    }
}

/// Build a ragdoll whose head is centered on `spawn`
pub fn build_ragdoll<W: PhysicsWorld + ?Sized>(world: &mut W, spawn: Vec2, owner: ConnId) -> Ragdoll {
    let parts = LAYOUT.map(|layout| {
        let id = world.add_body(BodyDesc {
            shape: layout.shape,
            position: spawn + layout.offset,
            restitution: layout.restitution,
            fixed: false,
            tag: Some(BodyTag {
                owner,
                part: layout.part,
            }),
        });
        (layout.part, id)
    });

    let offset_of = |name: PartName| {
        LAYOUT
            .iter()
            .find(|l| l.part == name)
            .map(|l| l.offset)
            .unwrap_or(Vec2::ZERO)
    };
    let body_of = |name: PartName| {
        parts
            .iter()
            .find(|(part, _)| *part == name)
            .map(|(_, id)| *id)
            .unwrap_or(parts[0].1)
    };

    let joints = JOINTS
        .iter()
        .map(|&(a, anchor_a, b, anchor_b, stiffness, damping)| {
            let world_a = offset_of(a) + anchor_a;
            let world_b = offset_of(b) + anchor_b;
            world.add_joint(JointDesc {
                body_a: body_of(a),
                body_b: body_of(b),
                anchor_a,
                anchor_b,
                rest_length: (world_b - world_a).length(),
                stiffness,
                damping,
            })
        })
        .collect();

    Ragdoll { parts, joints }
}
