//! Arena simulation modules

pub mod arena;
pub mod combat;
pub mod hits;
pub mod physics;
pub mod ragdoll;
pub mod rapier;
pub mod roster;
pub mod round;
pub mod session;
pub mod snapshot;

#[cfg(test)]
mod scenarios;

pub use arena::{ArenaCommand, ArenaHandle, ArenaTask};

/// Opaque per-socket connection identifier
pub type ConnId = uuid::Uuid;
