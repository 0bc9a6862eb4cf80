//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::hits::PartName;
use crate::game::round::RoundPhase;

/// Directional keys held by a player; omitted keys count as released
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Controls {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Enter the arena, either by name or through Twitch
    Join {
        #[serde(default)]
        username: Option<String>,
        /// Twitch OAuth access token, resolved to a login server-side
        #[serde(default, alias = "twitchToken")]
        twitch_token: Option<String>,
        /// Overlay clients only ever watch
        #[serde(default)]
        spectator: bool,
    },

    /// Replace the held-key state
    Input(Controls),

    /// Ask for the countdown to begin
    StartGame,

    /// Client easter egg, accepted and ignored
    SpawnNuts,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Everyone in the arena
    PlayerList {
        players: Vec<PlayerInfo>,
        spectators: Vec<PlayerInfo>,
    },

    /// Whether a start request would currently be honored
    CanStart {
        can_start: bool,
    },

    /// Round state, on every transition and to fresh joiners
    GameState {
        state: RoundPhase,
        #[serde(skip_serializing_if = "Option::is_none")]
        countdown: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        players: Option<Vec<PlayerInfo>>,
        /// Unix millis at which the round times out
        #[serde(skip_serializing_if = "Option::is_none")]
        round_ends_at: Option<u64>,
    },

    /// Hit points of every participant, keyed by id next to the tag
    PlayerHp(HashMap<Uuid, u32>),

    /// Part poses of every live ragdoll, keyed by owner id next to the tag
    SimState(HashMap<Uuid, BTreeMap<PartName, PartPose>>),

    /// A contact between two fighters
    BloodParticle {
        x: f32,
        y: f32,
    },

    /// Round over; `None` for a draw or timeout
    GameOver {
        winner: Option<String>,
    },

    /// Identity provider rejected the join
    AuthError {
        message: String,
    },
}

/// Player info for rosters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: Uuid,
    pub username: String,
}

/// Pose of one body part
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartPose {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
}
