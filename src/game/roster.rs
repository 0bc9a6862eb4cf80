//! Player and spectator registries

use std::collections::HashMap;

use super::physics::Vec2;
use super::ConnId;

/// A participant who gets a ragdoll when the next round starts
#[derive(Debug, Clone)]
pub struct Player {
    pub id: ConnId,
    pub username: String,
    pub eliminated: bool,
    pub spawn: Option<Vec2>,
    seq: u64,
}

/// A connection watching without a ragdoll
#[derive(Debug, Clone)]
pub struct Spectator {
    pub id: ConnId,
    pub username: String,
    seq: u64,
}

/// Which registry a connection ended up in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seat {
    Player,
    Spectator,
}

/// Clean up a client-supplied username; `None` if nothing usable is left
pub fn sanitize_username(raw: &str, max_chars: usize) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(max_chars).collect())
}

/// Registries of players and spectators.
///
/// A connection id is in at most one of the two at any time.
#[derive(Debug, Default)]
pub struct Roster {
    players: HashMap<ConnId, Player>,
    spectators: HashMap<ConnId, Spectator>,
    next_seq: u64,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, replacing any earlier registration of the same id
    pub fn join(&mut self, id: ConnId, username: String, seat: Seat) {
        self.remove(id);
        self.next_seq += 1;
        let seq = self.next_seq;

        match seat {
            Seat::Player => {
                self.players.insert(
                    id,
                    Player {
                        id,
                        username,
                        eliminated: false,
                        spawn: None,
                        seq,
                    },
                );
            }
            Seat::Spectator => {
                self.spectators.insert(id, Spectator { id, username, seq });
            }
        }
    }

    /// Drop a connection from whichever registry holds it
    pub fn remove(&mut self, id: ConnId) -> Option<Seat> {
        if self.players.remove(&id).is_some() {
            Some(Seat::Player)
        } else if self.spectators.remove(&id).is_some() {
            Some(Seat::Spectator)
        } else {
            None
        }
    }

    /// Move every spectator into the player registry
    pub fn promote_spectators(&mut self) -> usize {
        let promoted = self.spectators.len();
        for (id, spectator) in self.spectators.drain() {
            self.players.insert(
                id,
                Player {
                    id,
                    username: spectator.username,
                    eliminated: false,
                    spawn: None,
                    seq: spectator.seq,
                },
            );
        }
        promoted
    }

    pub fn player(&self, id: &ConnId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn player_mut(&mut self, id: &ConnId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn is_player(&self, id: &ConnId) -> bool {
        self.players.contains_key(id)
    }

    pub fn is_spectator(&self, id: &ConnId) -> bool {
        self.spectators.contains_key(id)
    }

    pub fn is_eliminated(&self, id: &ConnId) -> bool {
        self.players.get(id).is_some_and(|p| p.eliminated)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn spectator_count(&self) -> usize {
        self.spectators.len()
    }

    /// Players in join order
    pub fn players(&self) -> Vec<&Player> {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by_key(|p| p.seq);
        players
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    /// Spectators in join order
    pub fn spectators(&self) -> Vec<&Spectator> {
        let mut spectators: Vec<&Spectator> = self.spectators.values().collect();
        spectators.sort_by_key(|s| s.seq);
        spectators
    }

    /// Player ids in join order
    pub fn player_ids(&self) -> Vec<ConnId> {
        self.players().into_iter().map(|p| p.id).collect()
    }
}
