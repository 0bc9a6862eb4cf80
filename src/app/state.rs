//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::ArenaHandle;
use crate::identity::TwitchIdentity;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub arena: ArenaHandle,
    pub identity: TwitchIdentity,
}

impl AppState {
    pub fn new(config: Config, arena: ArenaHandle) -> Result<Self, reqwest::Error> {
        let identity = TwitchIdentity::new(&config)?;

        Ok(Self {
            config: Arc::new(config),
            arena,
            identity,
        })
    }
}
