//! Third-party identity providers

pub mod twitch;

pub use twitch::TwitchIdentity;
