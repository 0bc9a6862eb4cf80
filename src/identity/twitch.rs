//! Twitch Helix client: resolves a user access token to a display name

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::config::Config;

/// Resolves Twitch OAuth tokens into usernames
#[derive(Clone)]
pub struct TwitchIdentity {
    client: Client,
    client_id: Option<String>,
    users_url: String,
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    data: Vec<TwitchUser>,
}

#[derive(Debug, Deserialize)]
struct TwitchUser {
    login: String,
    #[serde(default)]
    display_name: Option<String>,
}

impl TwitchIdentity {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        Self::with_endpoint(
            config.twitch_client_id.clone(),
            config.twitch_users_url.clone(),
            config.twitch_timeout,
        )
    }

    /// A lookup that outlives `timeout` fails with [`IdentityError::Request`]
    pub fn with_endpoint(
        client_id: Option<String>,
        users_url: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            client_id,
            users_url,
        })
    }

    /// Public application id handed to browsers starting the OAuth flow
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Look up the user owning `token`
    pub async fn resolve(&self, token: &str) -> Result<String, IdentityError> {
        let client_id = self.client_id.as_deref().ok_or(IdentityError::NotConfigured)?;

        let response = self
            .client
            .get(&self.users_url)
            .header("Client-Id", client_id)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(IdentityError::InvalidToken);
        }
        if !status.is_success() {
            return Err(IdentityError::Api {
                status: status.as_u16(),
            });
        }

        let users: UsersResponse = response.json().await.map_err(IdentityError::Parse)?;
        users
            .data
            .into_iter()
            .next()
            .map(|user| user.display_name.filter(|name| !name.is_empty()).unwrap_or(user.login))
            .ok_or(IdentityError::NoUser)
    }
}

/// Why a token could not be turned into a username
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Twitch login is not enabled on this server")]
    NotConfigured,

    #[error("Twitch request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Twitch rejected the access token")]
    InvalidToken,

    #[error("Twitch API error (status {status})")]
    Api { status: u16 },

    #[error("Failed to parse Twitch response: {0}")]
    Parse(reqwest::Error),

    #[error("Twitch returned no user for this token")]
    NoUser,
}
