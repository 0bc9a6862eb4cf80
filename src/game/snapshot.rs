//! Snapshot building for the per-tick world broadcast

use std::collections::{BTreeMap, HashMap};

use crate::ws::protocol::{PartPose, ServerMsg};

use super::physics::PhysicsWorld;
use super::ragdoll::Ragdoll;
use super::ConnId;

/// Pose every part of every live ragdoll, limp ones included
pub fn sim_state<W: PhysicsWorld + ?Sized>(
    world: &W,
    ragdolls: &HashMap<ConnId, Ragdoll>,
) -> ServerMsg {
    let poses = ragdolls
        .iter()
        .map(|(owner, ragdoll)| {
            let parts: BTreeMap<_, _> = ragdoll
                .parts()
                .filter_map(|(part, body)| {
                    world.body_state(body).map(|state| {
                        (
                            part,
                            PartPose {
                                x: state.position.x,
                                y: state.position.y,
                                angle: state.angle,
                            },
                        )
                    })
                })
                .collect();
            (*owner, parts)
        })
        .collect();

    ServerMsg::SimState(poses)
}
