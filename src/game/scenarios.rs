//! Whole-round scenarios driven through the session with a scripted world

use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::config::ArenaTuning;
use crate::ws::protocol::{Controls, ServerMsg};

use super::hits::PartName;
use super::physics::scripted::ScriptedWorld;
use super::physics::{BodyId, PhysicsWorld};
use super::round::RoundPhase;
use super::session::{Outbound, Session, MOVE_FORCE, SPIN_NUDGE};
use super::ConnId;

struct Harness {
    session: Session<ScriptedWorld>,
    now: Instant,
}

impl Harness {
    fn new() -> Self {
        Self {
            session: Session::new(ScriptedWorld::new(), ArenaTuning::default(), 1),
            now: Instant::now(),
        }
    }

    fn lobby(names: &[&str]) -> (Self, Vec<ConnId>) {
        let mut harness = Self::new();
        let ids = names
            .iter()
            .map(|name| {
                let id = Uuid::new_v4();
                harness.session.join(id, name, false);
                id
            })
            .collect();
        (harness, ids)
    }

    fn advance(&mut self, by: Duration) {
        self.now += by;
        self.session.fire_timers(self.now);
    }

    /// Start and count down to a running round
    fn run_round(&mut self, starter: ConnId) {
        assert!(self.session.request_start(starter, self.now));
        for _ in 0..5 {
            self.advance(Duration::from_secs(1));
        }
        assert_eq!(self.session.phase(), RoundPhase::Running);
    }

    fn body(&self, owner: ConnId, part: PartName) -> BodyId {
        self.session.ragdolls()[&owner].part(part)
    }

    /// Report a contact and run one tick
    fn collide(&mut self, a: BodyId, b: BodyId) {
        self.session.world_mut().queue_collision(a, b);
        self.session.tick(self.now);
    }

    fn broadcasts(&mut self) -> Vec<ServerMsg> {
        self.session
            .drain_outbox()
            .into_iter()
            .filter_map(|out| match out {
                Outbound::Broadcast(msg) => Some(msg),
                Outbound::Direct(..) => None,
            })
            .collect()
    }
}

fn game_overs(msgs: &[ServerMsg]) -> Vec<Option<String>> {
    msgs.iter()
        .filter_map(|msg| match msg {
            ServerMsg::GameOver { winner } => Some(winner.clone()),
            _ => None,
        })
        .collect()
}

fn phases(msgs: &[ServerMsg]) -> Vec<(RoundPhase, Option<u32>)> {
    msgs.iter()
        .filter_map(|msg| match msg {
            ServerMsg::GameState { state, countdown, .. } => Some((*state, *countdown)),
            _ => None,
        })
        .collect()
}

#[test]
fn knockout_round_from_lobby_back_to_lobby() {
    let (mut h, ids) = Harness::lobby(&["ann", "ben"]);
    let (ann, ben) = (ids[0], ids[1]);

    let msgs = h.broadcasts();
    assert!(matches!(msgs.last(), Some(ServerMsg::CanStart { can_start: true })));
    let Some(ServerMsg::PlayerList { players, .. }) = msgs.iter().rev().nth(1) else {
        panic!("expected player_list");
    };
    assert_eq!(players.len(), 2);

    h.run_round(ann);
    let msgs = h.broadcasts();
    assert_eq!(
        phases(&msgs),
        vec![
            (RoundPhase::Countdown, Some(5)),
            (RoundPhase::Countdown, Some(4)),
            (RoundPhase::Countdown, Some(3)),
            (RoundPhase::Countdown, Some(2)),
            (RoundPhase::Countdown, Some(1)),
            (RoundPhase::Countdown, Some(0)),
            (RoundPhase::Running, None),
        ]
    );
    assert_eq!(h.session.hp().get(&ann), Some(1000));
    assert_eq!(h.session.hp().get(&ben), Some(1000));
    assert_eq!(h.session.ragdolls().len(), 2);

    // Ben kicks Ann in the head until she drops
    let foot = h.body(ben, PartName::LeftLeg);
    let head = h.body(ann, PartName::Head);
    for _ in 0..25 {
        h.collide(foot, head);
    }

    assert_eq!(h.session.hp().get(&ann), Some(0));
    assert_eq!(h.session.hp().get(&ben), Some(1000 - 25 * 3));
    assert!(h.session.roster().is_eliminated(&ann));
    assert!(h.session.ragdolls()[&ann].is_limp());
    assert_eq!(h.session.phase(), RoundPhase::Ended);

    let msgs = h.broadcasts();
    assert_eq!(game_overs(&msgs), vec![Some("ben".to_string())]);
    assert_eq!(
        msgs.iter()
            .filter(|m| matches!(m, ServerMsg::BloodParticle { .. }))
            .count(),
        25
    );

    // Still simulated while ended, and nobody can be hurt any more
    h.collide(foot, head);
    assert_eq!(h.session.hp().get(&ben), Some(1000 - 25 * 3));
    let msgs = h.broadcasts();
    assert!(game_overs(&msgs).is_empty());
    assert!(matches!(msgs.last(), Some(ServerMsg::SimState(_))));

    h.advance(Duration::from_millis(4_999));
    assert_eq!(h.session.phase(), RoundPhase::Ended);
    h.advance(Duration::from_millis(1));
    assert_eq!(h.session.phase(), RoundPhase::Waiting);
    assert!(h.session.hp().is_empty());
    assert!(h.session.ragdolls().is_empty());
    assert!(h.session.inputs().is_empty());
    assert!(h.session.world().bodies.is_empty());
    assert!(!h.session.roster().is_eliminated(&ann));
}

#[test]
fn timeout_never_declares_a_winner() {
    let (mut h, ids) = Harness::lobby(&["ann", "ben"]);
    h.run_round(ids[0]);
    h.broadcasts();

    h.advance(Duration::from_secs(5 * 60));

    assert_eq!(h.session.phase(), RoundPhase::Ended);
    let msgs = h.broadcasts();
    assert_eq!(game_overs(&msgs), vec![None]);
    assert_eq!(h.session.hp().get(&ids[0]), Some(1000));

    h.advance(Duration::from_secs(4));
    assert_eq!(h.session.phase(), RoundPhase::Waiting);
}

#[test]
fn timeout_with_a_single_survivor_is_still_a_draw() {
    let (mut h, ids) = Harness::lobby(&["ann", "ben", "cat"]);
    h.run_round(ids[0]);

    let foot = h.body(ids[1], PartName::RightLeg);
    let head = h.body(ids[0], PartName::Head);
    for _ in 0..25 {
        h.collide(foot, head);
    }
    assert_eq!(h.session.phase(), RoundPhase::Running);
    h.broadcasts();

    h.advance(Duration::from_secs(5 * 60));

    assert_eq!(game_overs(&h.broadcasts()), vec![None]);
}

#[test]
fn mid_round_joiner_spectates_until_the_next_lobby() {
    let (mut h, ids) = Harness::lobby(&["ann", "ben"]);
    h.run_round(ids[0]);

    let late = Uuid::new_v4();
    h.session.join(late, "cat", false);

    assert!(h.session.roster().is_spectator(&late));
    assert!(!h.session.ragdolls().contains_key(&late));
    assert_eq!(h.session.hp().get(&late), None);

    h.advance(Duration::from_secs(5 * 60));
    h.advance(Duration::from_secs(4));

    assert_eq!(h.session.phase(), RoundPhase::Waiting);
    assert!(h.session.roster().is_player(&late));
    assert_eq!(h.session.roster().spectator_count(), 0);
    let msgs = h.broadcasts();
    let Some(ServerMsg::PlayerList { players, spectators }) = msgs
        .iter()
        .rev()
        .find(|m| matches!(m, ServerMsg::PlayerList { .. }))
    else {
        panic!("expected player_list after reset");
    };
    assert!(players.iter().any(|p| p.id == late));
    assert!(spectators.is_empty());
}

#[test]
fn disconnect_leaving_one_player_ends_and_resets() {
    let (mut h, ids) = Harness::lobby(&["ann", "ben"]);
    h.run_round(ids[0]);
    h.broadcasts();

    h.session.disconnect(ids[0], h.now);

    let msgs = h.broadcasts();
    assert_eq!(game_overs(&msgs), vec![Some("ben".to_string())]);
    assert_eq!(h.session.phase(), RoundPhase::Waiting);
    assert!(h.session.next_deadline().is_none(), "pending reset cancelled");
    assert!(h.session.ragdolls().is_empty());
    assert!(h.session.world().bodies.is_empty());
}

/// Ben kicks `victim` in the head until they drop
fn knock_out(h: &mut Harness, ben: ConnId, victim: ConnId) {
    let foot = h.body(ben, PartName::LeftLeg);
    let head = h.body(victim, PartName::Head);
    for _ in 0..25 {
        h.collide(foot, head);
    }
}

#[test]
fn disconnect_after_the_round_ended_returns_to_the_lobby_quietly() {
    let (mut h, ids) = Harness::lobby(&["ann", "ben"]);
    h.run_round(ids[0]);
    knock_out(&mut h, ids[1], ids[0]);
    assert_eq!(h.session.phase(), RoundPhase::Ended);
    h.broadcasts();

    h.session.disconnect(ids[0], h.now);

    assert_eq!(h.session.phase(), RoundPhase::Waiting);
    assert!(h.session.next_deadline().is_none());
    let msgs = h.broadcasts();
    assert!(game_overs(&msgs).is_empty());
    assert_eq!(phases(&msgs), vec![(RoundPhase::Waiting, None)]);
}

#[test]
fn disconnect_after_the_round_ended_keeps_the_reset_delay() {
    let (mut h, ids) = Harness::lobby(&["ann", "ben", "cat"]);
    let (ann, ben, cat) = (ids[0], ids[1], ids[2]);
    h.run_round(ann);
    knock_out(&mut h, ben, ann);
    assert_eq!(h.session.phase(), RoundPhase::Running);
    knock_out(&mut h, ben, cat);
    assert_eq!(h.session.phase(), RoundPhase::Ended);
    assert_eq!(game_overs(&h.broadcasts()), vec![Some("ben".to_string())]);

    h.session.disconnect(cat, h.now);

    assert_eq!(h.session.phase(), RoundPhase::Ended);
    h.advance(Duration::from_millis(4_999));
    assert_eq!(h.session.phase(), RoundPhase::Ended);
    h.advance(Duration::from_millis(1));
    assert_eq!(h.session.phase(), RoundPhase::Waiting);
    assert!(game_overs(&h.broadcasts()).is_empty());
}

#[test]
fn disconnect_with_enough_players_left_keeps_the_round_going() {
    let (mut h, ids) = Harness::lobby(&["ann", "ben", "cat"]);
    h.run_round(ids[0]);

    h.session.disconnect(ids[2], h.now);

    assert_eq!(h.session.phase(), RoundPhase::Running);
    assert!(!h.session.ragdolls().contains_key(&ids[2]));
    assert_eq!(h.session.hp().get(&ids[2]), None);
    // Ragdoll bodies left the world with their owner
    assert_eq!(h.session.world().tagged_bodies(), 12);
}

#[test]
fn disconnect_during_countdown_below_minimum_aborts_it() {
    let (mut h, ids) = Harness::lobby(&["ann", "ben"]);
    assert!(h.session.request_start(ids[0], h.now));
    h.advance(Duration::from_secs(2));

    h.session.disconnect(ids[1], h.now);

    assert_eq!(h.session.phase(), RoundPhase::Waiting);
    h.advance(Duration::from_secs(10));
    assert_eq!(h.session.phase(), RoundPhase::Waiting);
    assert!(h.session.ragdolls().is_empty());
}

#[test]
fn second_start_request_during_countdown_is_ignored() {
    let (mut h, ids) = Harness::lobby(&["ann", "ben"]);
    assert!(h.session.request_start(ids[0], h.now));
    h.advance(Duration::from_secs(1));

    assert!(!h.session.request_start(ids[1], h.now));
    assert_eq!(h.session.round().countdown(), Some(4));
}

#[test]
fn simultaneous_knockouts_are_a_draw() {
    let (mut h, ids) = Harness::lobby(&["ann", "ben"]);
    h.run_round(ids[0]);

    // Head-butts deal 15 each way; trade 66 of them to get both to 10
    let head_a = h.body(ids[0], PartName::Head);
    let head_b = h.body(ids[1], PartName::Head);
    for _ in 0..66 {
        h.collide(head_a, head_b);
    }
    assert_eq!(h.session.hp().get(&ids[0]), Some(10));
    h.broadcasts();

    h.collide(head_a, head_b);

    assert_eq!(h.session.hp().alive(), Vec::<ConnId>::new());
    assert_eq!(game_overs(&h.broadcasts()), vec![None]);
    assert!(h.session.ragdolls().values().all(|r| r.is_limp()));
}

#[test]
fn held_keys_push_the_head_each_tick() {
    let (mut h, ids) = Harness::lobby(&["ann", "ben"]);
    h.run_round(ids[0]);
    h.session.set_input(
        ids[0],
        Controls {
            up: true,
            right: true,
            ..Controls::default()
        },
    );

    h.session.tick(h.now);
    h.session.tick(h.now);

    let head = h.body(ids[0], PartName::Head);
    let body = &h.session.world().bodies[&head];
    assert_eq!(body.forces.len(), 2);
    assert_eq!(body.forces[0].x, MOVE_FORCE);
    assert_eq!(body.forces[0].y, -MOVE_FORCE);
    assert_eq!(body.state.angular_velocity, 2.0 * SPIN_NUDGE);

    // Idle players get nothing
    let other = h.body(ids[1], PartName::Head);
    assert!(h.session.world().bodies[&other].forces.is_empty());
    assert_eq!(h.session.world().steps, 2);
}

#[test]
fn eliminated_players_stop_steering() {
    let (mut h, ids) = Harness::lobby(&["ann", "ben", "cat"]);
    h.run_round(ids[0]);
    let foot = h.body(ids[1], PartName::LeftLeg);
    let head = h.body(ids[0], PartName::Head);
    for _ in 0..25 {
        h.collide(foot, head);
    }
    assert!(h.session.roster().is_eliminated(&ids[0]));

    h.session.set_input(
        ids[0],
        Controls {
            left: true,
            ..Controls::default()
        },
    );
    h.session.tick(h.now);

    assert!(h.session.world().bodies[&head].forces.is_empty());
    // The limp body is still in the snapshot
    let msgs = h.broadcasts();
    let Some(ServerMsg::SimState(ragdolls)) = msgs.last() else {
        panic!("expected sim_state");
    };
    assert_eq!(ragdolls.len(), 3);
    assert!(h
        .session
        .world()
        .joints
        .values()
        .all(|j| h.session.world().body_tag(j.body_a).map(|t| t.owner) != Some(ids[0])));
}
