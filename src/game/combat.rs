//! Combat resolution - turns contact pairs into damage, knockback and eliminations

use std::collections::HashMap;

use rand::Rng;

use super::hits::part_damage;
use super::physics::{BodyId, BodyTag, CollisionPair, PhysicsWorld, Vec2};
use super::ragdoll::Ragdoll;
use super::roster::Roster;
use super::ConnId;

/// Separation speed added to both bodies after a damaging hit (px/s)
pub const BOUNCE_SPEED: f32 = 720.0;

/// Width of the random spin added to each body after a damaging hit (rad/s)
pub const BOUNCE_SPIN: f32 = 6.0;

/// Hit points per participant for the current round
#[derive(Debug, Default, Clone)]
pub struct HpTable {
    hp: HashMap<ConnId, u32>,
}

impl HpTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give every listed participant full health, dropping everyone else
    pub fn fill(&mut self, ids: impl IntoIterator<Item = ConnId>, max_hp: u32) {
        self.hp = ids.into_iter().map(|id| (id, max_hp)).collect();
    }

    #[cfg(test)]
    pub fn get(&self, id: &ConnId) -> Option<u32> {
        self.hp.get(id).copied()
    }

    /// Subtract `amount`, clamping at zero.
    ///
    /// Returns the remaining hp, or `None` when the participant is unknown or already down.
    pub fn damage(&mut self, id: ConnId, amount: u32) -> Option<u32> {
        let hp = self.hp.get_mut(&id).filter(|hp| **hp > 0)?;
        *hp = hp.saturating_sub(amount);
        Some(*hp)
    }

    pub fn remove(&mut self, id: &ConnId) {
        self.hp.remove(id);
    }

    pub fn clear(&mut self) {
        self.hp.clear();
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.hp.is_empty()
    }

    /// Participants above zero
    pub fn alive(&self) -> Vec<ConnId> {
        self.hp
            .iter()
            .filter(|(_, hp)| **hp > 0)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn snapshot(&self) -> HashMap<ConnId, u32> {
        self.hp.clone()
    }
}

/// What one contact pair did
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HitReport {
    /// Where to draw blood; set for every contact between two live fighters
    pub blood: Option<Vec2>,
    pub hp_changed: bool,
    /// Players knocked out by this contact
    pub eliminated: Vec<ConnId>,
}

/// Borrowed view of the session state a contact can touch
pub struct Combat<'a, W: ?Sized, R> {
    pub world: &'a mut W,
    pub hp: &'a mut HpTable,
    pub roster: &'a mut Roster,
    pub ragdolls: &'a mut HashMap<ConnId, Ragdoll>,
    pub rng: &'a mut R,
}

impl<W, R> Combat<'_, W, R>
where
    W: PhysicsWorld + ?Sized,
    R: Rng,
{
    /// Resolve a single contact pair.
    ///
    /// Both directions are applied before anyone is eliminated, so a trade of
    /// finishing blows knocks out both fighters.
    pub fn resolve(&mut self, pair: CollisionPair) -> HitReport {
        let mut report = HitReport::default();

        let (Some(tag_a), Some(tag_b)) = (self.world.body_tag(pair.a), self.world.body_tag(pair.b))
        else {
            return report;
        };
        if tag_a.owner == tag_b.owner
            || self.roster.is_eliminated(&tag_a.owner)
            || self.roster.is_eliminated(&tag_b.owner)
        {
            return report;
        }
        let (Some(state_a), Some(state_b)) = (self.world.body_state(pair.a), self.world.body_state(pair.b))
        else {
            return report;
        };

        report.blood = Some(state_a.position.midpoint(state_b.position));

        let directions: [(BodyId, BodyTag, BodyId, BodyTag); 2] = [
            (pair.a, tag_a, pair.b, tag_b),
            (pair.b, tag_b, pair.a, tag_a),
        ];
        let mut knocked_out = Vec::new();

        for (attacker_body, attacker, defender_body, defender) in directions {
            let amount = part_damage(defender.part, attacker.part);
            if amount == 0 {
                continue;
            }
            if let Some(left) = self.hp.damage(defender.owner, amount) {
                report.hp_changed = true;
                if left == 0 {
                    knocked_out.push(defender.owner);
                }
            }
            self.bounce(attacker_body, defender_body);
        }

        for owner in knocked_out {
            if let Some(player) = self.roster.player_mut(&owner) {
                player.eliminated = true;
            }
            if let Some(ragdoll) = self.ragdolls.get_mut(&owner) {
                ragdoll.go_limp(&mut *self.world);
            }
            report.eliminated.push(owner);
        }

        report
    }

    /// Push two bodies apart along the line between their centers
    fn bounce(&mut self, from: BodyId, to: BodyId) {
        let (Some(a), Some(b)) = (self.world.body_state(from), self.world.body_state(to)) else {
            return;
        };

        let delta = b.position - a.position;
        let dist = match delta.length() {
            d if d > 0.0 => d,
            _ => 1.0,
        };
        let push = delta * (BOUNCE_SPEED / dist);

        self.world.set_velocity(from, a.velocity - push);
        self.world.set_velocity(to, b.velocity + push);

        let spin_a = (self.rng.gen::<f32>() - 0.5) * BOUNCE_SPIN;
        let spin_b = (self.rng.gen::<f32>() - 0.5) * BOUNCE_SPIN;
        self.world.set_angular_velocity(from, a.angular_velocity + spin_a);
        self.world.set_angular_velocity(to, b.angular_velocity + spin_b);
    }
}
