//! The arena task: owns the session and serializes every event into it

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ArenaTuning;
use crate::util::time::tick_interval;
use crate::ws::protocol::{Controls, ServerMsg};

use super::physics::PhysicsWorld;
use super::round::RoundPhase;
use super::session::{Outbound, Session};
use super::ConnId;

/// Requests from sockets to the arena
#[derive(Debug)]
pub enum ArenaCommand {
    /// A socket opened; `tx` receives messages meant for it alone
    Connect {
        conn: ConnId,
        tx: mpsc::UnboundedSender<ServerMsg>,
    },
    Join {
        conn: ConnId,
        username: String,
        spectator: bool,
    },
    Input {
        conn: ConnId,
        controls: Controls,
    },
    StartGame {
        conn: ConnId,
    },
    Disconnect {
        conn: ConnId,
    },
}

/// Coarse view of the arena for health checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArenaStatus {
    pub state: RoundPhase,
    pub players: usize,
    pub spectators: usize,
}

impl Default for ArenaStatus {
    fn default() -> Self {
        Self {
            state: RoundPhase::Waiting,
            players: 0,
            spectators: 0,
        }
    }
}

/// Handle to the running arena
#[derive(Clone)]
pub struct ArenaHandle {
    cmd_tx: mpsc::Sender<ArenaCommand>,
    broadcast_tx: broadcast::Sender<ServerMsg>,
    status: Arc<RwLock<ArenaStatus>>,
}

impl ArenaHandle {
    /// Queue a command; false once the arena has stopped
    pub async fn send(&self, cmd: ArenaCommand) -> bool {
        self.cmd_tx.send(cmd).await.is_ok()
    }

    /// Receive everything broadcast from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.broadcast_tx.subscribe()
    }

    pub fn status(&self) -> ArenaStatus {
        *self.status.read()
    }
}

/// The authoritative arena loop
pub struct ArenaTask<W> {
    session: Session<W>,
    cmd_rx: mpsc::Receiver<ArenaCommand>,
    broadcast_tx: broadcast::Sender<ServerMsg>,
    direct: HashMap<ConnId, mpsc::UnboundedSender<ServerMsg>>,
    status: Arc<RwLock<ArenaStatus>>,
}

impl<W: PhysicsWorld + 'static> ArenaTask<W> {
    pub fn new(world: W, tuning: ArenaTuning, seed: u64) -> (Self, ArenaHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let (broadcast_tx, _) = broadcast::channel(256);
        let status = Arc::new(RwLock::new(ArenaStatus::default()));

        let handle = ArenaHandle {
            cmd_tx,
            broadcast_tx: broadcast_tx.clone(),
            status: status.clone(),
        };

        let task = Self {
            session: Session::new(world, tuning, seed),
            cmd_rx,
            broadcast_tx,
            direct: HashMap::new(),
            status,
        };

        (task, handle)
    }

    /// Run until every handle is dropped
    pub async fn run(mut self) {
        info!("Arena started");

        let mut ticker = interval(tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let deadline = self.session.next_deadline();
            let live = self.session.is_live();

            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
                _ = wait_for(deadline) => self.session.fire_timers(Instant::now()),
                _ = ticker.tick(), if live => self.session.tick(Instant::now()),
            }

            self.flush();
        }

        info!("Arena stopped");
    }

    fn handle(&mut self, cmd: ArenaCommand) {
        let now = Instant::now();
        match cmd {
            ArenaCommand::Connect { conn, tx } => {
                debug!(conn_id = %conn, "Connection registered");
                self.direct.insert(conn, tx);
            }
            ArenaCommand::Join {
                conn,
                username,
                spectator,
            } => {
                self.session.join(conn, &username, spectator);
            }
            ArenaCommand::Input { conn, controls } => self.session.set_input(conn, controls),
            ArenaCommand::StartGame { conn } => {
                self.session.request_start(conn, now);
            }
            ArenaCommand::Disconnect { conn } => {
                self.direct.remove(&conn);
                self.session.disconnect(conn, now);
            }
        }
    }

    /// Deliver queued messages and refresh the published status
    fn flush(&mut self) {
        for out in self.session.drain_outbox() {
            match out {
                Outbound::Broadcast(msg) => {
                    // No subscribers is fine
                    let _ = self.broadcast_tx.send(msg);
                }
                Outbound::Direct(conn, msg) => {
                    let Some(tx) = self.direct.get(&conn) else {
                        continue;
                    };
                    if tx.send(msg).is_err() {
                        warn!(conn_id = %conn, "Direct channel closed");
                        self.direct.remove(&conn);
                    }
                }
            }
        }

        *self.status.write() = ArenaStatus {
            state: self.session.phase(),
            players: self.session.roster().player_count(),
            spectators: self.session.roster().spectator_count(),
        };
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
