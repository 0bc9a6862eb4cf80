//! Session context: the single owner of all arena state
//!
//! Every operation runs to completion against `&mut self`, and everything it wants
//! to tell clients is queued in the outbox for the arena task to deliver.

use std::collections::HashMap;
use std::ops::Range;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ArenaTuning;
use crate::util::time::unix_millis;
use crate::ws::protocol::{Controls, PlayerInfo, ServerMsg};

use super::combat::{Combat, HpTable};
use super::physics::{add_arena_borders, CollisionPair, PhysicsWorld, Vec2};
use super::ragdoll::{build_ragdoll, Ragdoll};
use super::roster::{sanitize_username, Roster, Seat};
use super::round::{judge, Round, RoundEnd, RoundEvent, RoundPhase};
use super::snapshot;
use super::ConnId;

/// Force applied to a head per held direction key
pub const MOVE_FORCE: f32 = 3500.0;

/// Angular velocity added to a head while steering sideways (rad/s)
pub const SPIN_NUDGE: f32 = 3.0;

/// Spawn area for ragdoll heads
const SPAWN_X: Range<f32> = 100.0..700.0;
const SPAWN_Y: Range<f32> = 100.0..500.0;

/// A message waiting to be delivered
#[derive(Debug, Clone)]
pub enum Outbound {
    /// To every connected viewer
    Broadcast(ServerMsg),
    /// To one connection only
    Direct(ConnId, ServerMsg),
}

/// Force on the head for the held keys; opposite keys cancel out
pub fn input_force(controls: Controls) -> Vec2 {
    let axis = |neg: bool, pos: bool| match (neg, pos) {
        (true, false) => -MOVE_FORCE,
        (false, true) => MOVE_FORCE,
        _ => 0.0,
    };
    Vec2::new(axis(controls.left, controls.right), axis(controls.up, controls.down))
}

/// Extra spin while exactly one horizontal key is held
pub fn spin_nudge(controls: Controls) -> Option<f32> {
    match (controls.left, controls.right) {
        (true, false) => Some(-SPIN_NUDGE),
        (false, true) => Some(SPIN_NUDGE),
        _ => None,
    }
}

/// Everything one arena knows
pub struct Session<W> {
    tuning: ArenaTuning,
    round: Round,
    roster: Roster,
    hp: HpTable,
    inputs: HashMap<ConnId, Controls>,
    ragdolls: HashMap<ConnId, Ragdoll>,
    world: W,
    rng: ChaCha8Rng,
    outbox: Vec<Outbound>,
}

impl<W: PhysicsWorld> Session<W> {
    pub fn new(world: W, tuning: ArenaTuning, seed: u64) -> Self {
        Self {
            tuning,
            round: Round::new(tuning),
            roster: Roster::new(),
            hp: HpTable::new(),
            inputs: HashMap::new(),
            ragdolls: HashMap::new(),
            world,
            rng: ChaCha8Rng::seed_from_u64(seed),
            outbox: Vec::new(),
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.round.phase()
    }

    #[cfg(test)]
    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    #[cfg(test)]
    pub fn hp(&self) -> &HpTable {
        &self.hp
    }

    #[cfg(test)]
    pub fn ragdolls(&self) -> &HashMap<ConnId, Ragdoll> {
        &self.ragdolls
    }

    #[cfg(test)]
    pub fn inputs(&self) -> &HashMap<ConnId, Controls> {
        &self.inputs
    }

    #[cfg(test)]
    pub fn world(&self) -> &W {
        &self.world
    }

    #[cfg(test)]
    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    /// Take every queued message
    pub fn drain_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    /// When the next timer wants to fire
    pub fn next_deadline(&self) -> Option<Instant> {
        self.round.next_deadline()
    }

    /// True while the synchronization loop should be stepping the world
    pub fn is_live(&self) -> bool {
        self.round.phase().is_live()
    }

    // ------------------------------------------------------------------
    // Socket-originated operations
    // ------------------------------------------------------------------

    /// Register a connection as a player (lobby) or spectator (round underway).
    ///
    /// Returns the seat taken, or `None` if the name was unusable or the
    /// connection had already joined.
    pub fn join(&mut self, conn: ConnId, username: &str, spectator: bool) -> Option<Seat> {
        if self.roster.is_player(&conn) || self.roster.is_spectator(&conn) {
            debug!(conn_id = %conn, "Duplicate join ignored");
            self.send_view(conn);
            return None;
        }

        let Some(username) = sanitize_username(username, self.tuning.max_username_chars) else {
            warn!(conn_id = %conn, "Rejected join with empty username");
            return None;
        };

        let seat = if !spectator && self.round.phase() == RoundPhase::Waiting {
            Seat::Player
        } else {
            Seat::Spectator
        };
        self.roster.join(conn, username.clone(), seat);

        info!(
            conn_id = %conn,
            username = %username,
            seat = ?seat,
            players = self.roster.player_count(),
            "Joined arena"
        );

        self.broadcast_roster();
        self.send_view(conn);
        Some(seat)
    }

    /// Store the held keys; applied on the next tick
    pub fn set_input(&mut self, conn: ConnId, controls: Controls) {
        if !self.roster.is_player(&conn) && !self.roster.is_spectator(&conn) {
            return;
        }
        self.inputs.insert(conn, controls);
    }

    /// Begin the countdown if the lobby allows it; stale requests do nothing
    pub fn request_start(&mut self, conn: ConnId, now: Instant) -> bool {
        if !self.round.begin_countdown(self.roster.player_count(), now) {
            debug!(conn_id = %conn, state = ?self.round.phase(), "Start request ignored");
            return false;
        }

        info!(
            conn_id = %conn,
            players = self.roster.player_count(),
            "Countdown started"
        );
        self.broadcast(self.game_state(false));
        true
    }

    /// Forget a connection entirely
    pub fn disconnect(&mut self, conn: ConnId, now: Instant) {
        let seat = self.roster.remove(conn);
        self.inputs.remove(&conn);
        self.hp.remove(&conn);
        if let Some(ragdoll) = self.ragdolls.remove(&conn) {
            ragdoll.despawn(&mut self.world);
        }

        let Some(seat) = seat else {
            return;
        };
        info!(
            conn_id = %conn,
            seat = ?seat,
            players = self.roster.player_count(),
            "Left arena"
        );

        self.broadcast_roster();
        self.check_for_winner(now);

        if self.round.phase() != RoundPhase::Waiting
            && self.roster.player_count() < self.tuning.min_players
        {
            info!(state = ?self.round.phase(), "Not enough players, returning to lobby");
            self.reset_to_lobby();
        }
    }

    // ------------------------------------------------------------------
    // Timer-driven operations
    // ------------------------------------------------------------------

    /// Fire every timer that is due at `now`
    pub fn fire_timers(&mut self, now: Instant) {
        while let Some(event) = self.round.poll(now) {
            match event {
                RoundEvent::Countdown(remaining) => {
                    debug!(remaining, "Countdown tick");
                    self.broadcast(self.game_state(false));
                    if remaining == 0 {
                        self.start_round(now);
                    }
                }
                RoundEvent::TimedOut => {
                    info!("Round timer expired");
                    self.end_round(RoundEnd::Timeout, now);
                }
                RoundEvent::ResetDue => self.reset_to_lobby(),
            }
        }
    }

    /// One synchronization step: inputs, physics, combat, snapshot
    pub fn tick(&mut self, now: Instant) {
        if !self.is_live() {
            return;
        }

        for (owner, ragdoll) in &self.ragdolls {
            if self.roster.is_eliminated(owner) {
                continue;
            }
            let controls = self.inputs.get(owner).copied().unwrap_or_default();
            let force = input_force(controls);
            if force == Vec2::ZERO {
                continue;
            }

            let head = ragdoll.head();
            self.world.apply_force(head, force);
            if let (Some(spin), Some(state)) = (spin_nudge(controls), self.world.body_state(head)) {
                self.world
                    .set_angular_velocity(head, state.angular_velocity + spin);
            }
        }

        let contacts = self.world.step();
        for pair in contacts {
            if self.round.phase() != RoundPhase::Running {
                break;
            }
            self.resolve_contact(pair, now);
        }

        let poses = snapshot::sim_state(&self.world, &self.ragdolls);
        self.broadcast(poses);
    }

    // ------------------------------------------------------------------
    // Round lifecycle
    // ------------------------------------------------------------------

    fn start_round(&mut self, now: Instant) {
        self.round.begin_running(now, unix_millis());
        add_arena_borders(
            &mut self.world,
            self.tuning.arena_width,
            self.tuning.arena_height,
        );

        let ids = self.roster.player_ids();
        self.hp.fill(ids.iter().copied(), self.tuning.max_hp);

        for id in ids {
            let spawn = Vec2::new(self.rng.gen_range(SPAWN_X), self.rng.gen_range(SPAWN_Y));
            if let Some(player) = self.roster.player_mut(&id) {
                player.eliminated = false;
                player.spawn = Some(spawn);
            }
            let ragdoll = build_ragdoll(&mut self.world, spawn, id);
            self.ragdolls.insert(id, ragdoll);
        }

        info!(
            players = self.ragdolls.len(),
            round_ends_at = ?self.round.round_ends_at(),
            "Round started"
        );
        self.broadcast(self.game_state(true));
        self.broadcast(ServerMsg::PlayerHp(self.hp.snapshot()));
    }

    fn resolve_contact(&mut self, pair: CollisionPair, now: Instant) {
        let report = Combat {
            world: &mut self.world,
            hp: &mut self.hp,
            roster: &mut self.roster,
            ragdolls: &mut self.ragdolls,
            rng: &mut self.rng,
        }
        .resolve(pair);

        if let Some(at) = report.blood {
            self.broadcast(ServerMsg::BloodParticle { x: at.x, y: at.y });
        }
        if report.hp_changed {
            self.broadcast(ServerMsg::PlayerHp(self.hp.snapshot()));
        }
        for id in &report.eliminated {
            info!(conn_id = %id, "Player eliminated");
        }
        if !report.eliminated.is_empty() {
            self.check_for_winner(now);
        }
    }

    /// End the round if at most one player is still standing
    fn check_for_winner(&mut self, now: Instant) {
        if self.round.phase() != RoundPhase::Running {
            return;
        }
        if let Some(end) = judge(&self.hp.alive()) {
            self.end_round(end, now);
        }
    }

    fn end_round(&mut self, end: RoundEnd, now: Instant) {
        if !self.round.finish(end, now) {
            return;
        }

        let winner = match end {
            RoundEnd::Winner(id) => self.roster.player(&id).map(|p| p.username.clone()),
            RoundEnd::Draw | RoundEnd::Timeout => None,
        };
        info!(outcome = ?end, winner = ?winner, "Round ended");

        self.broadcast(ServerMsg::GameOver { winner });
        self.broadcast(self.game_state(false));
    }

    /// Clear the round and return everyone to the lobby
    fn reset_to_lobby(&mut self) {
        self.world.clear();
        self.ragdolls.clear();
        self.inputs.clear();
        self.hp.clear();
        self.round.reset();

        for player in self.roster.players_mut() {
            player.eliminated = false;
            player.spawn = None;
        }
        let promoted = self.roster.promote_spectators();

        info!(
            players = self.roster.player_count(),
            promoted,
            "Returned to lobby"
        );
        self.broadcast(self.game_state(false));
        self.broadcast_roster();
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    fn broadcast(&mut self, msg: ServerMsg) {
        self.outbox.push(Outbound::Broadcast(msg));
    }

    fn send(&mut self, conn: ConnId, msg: ServerMsg) {
        self.outbox.push(Outbound::Direct(conn, msg));
    }

    fn player_infos(&self) -> Vec<PlayerInfo> {
        self.roster
            .players()
            .into_iter()
            .map(|p| PlayerInfo {
                id: p.id,
                username: p.username.clone(),
            })
            .collect()
    }

    fn game_state(&self, with_players: bool) -> ServerMsg {
        ServerMsg::GameState {
            state: self.round.phase(),
            countdown: self.round.countdown(),
            players: with_players.then(|| self.player_infos()),
            round_ends_at: self.round.round_ends_at(),
        }
    }

    fn broadcast_roster(&mut self) {
        let spectators = self
            .roster
            .spectators()
            .into_iter()
            .map(|s| PlayerInfo {
                id: s.id,
                username: s.username.clone(),
            })
            .collect();
        let players = self.player_infos();
        let can_start = self.roster.player_count() >= self.tuning.min_players;

        self.broadcast(ServerMsg::PlayerList {
            players,
            spectators,
        });
        self.broadcast(ServerMsg::CanStart { can_start });
    }

    /// Bring one connection up to date with the current round
    fn send_view(&mut self, conn: ConnId) {
        self.send(conn, self.game_state(true));
        self.send(
            conn,
            ServerMsg::PlayerHp(self.hp.snapshot()),
        );
    }
}
