//! Hit model - which body part hurts which, and by how much

use serde::{Deserialize, Serialize};

/// The six named parts of a ragdoll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PartName {
    Head,
    Body,
    LeftArm,
    RightArm,
    LeftLeg,
    RightLeg,
}

impl PartName {
    #[cfg(test)]
    pub const ALL: [PartName; 6] = [
        PartName::Head,
        PartName::Body,
        PartName::LeftArm,
        PartName::RightArm,
        PartName::LeftLeg,
        PartName::RightLeg,
    ];

    /// Category this part is struck as
    pub fn defender_category(self) -> DefenderCategory {
        match self {
            PartName::Head => DefenderCategory::Head,
            PartName::Body => DefenderCategory::Body,
            PartName::LeftArm | PartName::RightArm => DefenderCategory::Arm,
            PartName::LeftLeg | PartName::RightLeg => DefenderCategory::Leg,
        }
    }

    /// Category this part strikes as
    pub fn attack_type(self) -> AttackType {
        match self {
            PartName::LeftLeg | PartName::RightLeg => AttackType::Foot,
            PartName::LeftArm | PartName::RightArm => AttackType::Hand,
            PartName::Head | PartName::Body => AttackType::Other,
        }
    }
}

/// Where a hit lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefenderCategory {
    Head,
    Body,
    Arm,
    Leg,
}

/// What a hit is delivered with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackType {
    Foot,
    Hand,
    Other,
}

/// Damage dealt to `defender` by a hit delivered with `attacker`
pub fn damage(defender: DefenderCategory, attacker: AttackType) -> u32 {
    use AttackType::*;
    use DefenderCategory::*;

    match (defender, attacker) {
        (Head, Foot) => 40,
        (Head, Hand) => 25,
        (Head, Other) => 15,
        (Body, Foot) => 20,
        (Body, Hand) => 15,
        (Body, Other) => 10,
        (Arm | Leg, Foot) => 10,
        (Arm | Leg, Hand) => 5,
        (Arm | Leg, Other) => 3,
    }
}

/// Damage `defender` takes when struck by `attacker`
pub fn part_damage(defender: PartName, attacker: PartName) -> u32 {
    damage(defender.defender_category(), attacker.attack_type())
}
