//! Server-to-server OAuth for the Zoom API

mod session;

use std::time::Duration;

use log::{info, warn};
use reqwest::Client;

use crate::config::{ClientOptions, OAuthConfig};
use crate::error::{Error, Result};
use crate::fetch::Fetch;

pub use session::*;

/// Obtains bearer credentials and keeps them fresh
pub struct TokenManager {
    /// HTTP client used for requests
    client: Client,

    /// Account and client identifiers
    oauth: OAuthConfig,

    /// Base URL of the identity provider
    oauth_base_url: String,

    request_timeout: Option<Duration>,

    /// On-disk copy of the credential
    store: CredentialStore,

    /// The current credential
    current: Option<Credential>,
}

impl TokenManager {
    /// Create a new TokenManager
    pub fn new(
        client: Client,
        oauth: OAuthConfig,
        store: CredentialStore,
        options: &ClientOptions,
    ) -> Self {
        Self {
            client,
            oauth,
            oauth_base_url: options.oauth_base_url.clone(),
            request_timeout: options.request_timeout,
            store,
            current: None,
        }
    }

    /// Return a credential that is valid right now.
    ///
    /// The in-memory credential is preferred, then the stored one. Once the
    /// held credential has expired a new one is exchanged; it is never
    /// extended in place.
    pub async fn get_credential(&mut self) -> Result<Credential> {
        if self.current.is_none() {
            self.current = self.store.load();
        }

        match &self.current {
            Some(credential) if !credential.is_expired() => Ok(credential.clone()),
            _ => self.refresh().await,
        }
    }

    /// Exchange the client credentials for a new access token and persist it
    pub async fn refresh(&mut self) -> Result<Credential> {
        let url = format!("{}/oauth/token", self.oauth_base_url);

        let response = Fetch::post(&self.client, &url)
            .basic_auth(&self.oauth.client_id, &self.oauth.client_secret)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .query("grant_type", "account_credentials")
            .query("account_id", &self.oauth.account_id)
            .timeout(self.request_timeout)
            .execute_raw()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::auth(format!(
                "token exchange rejected with {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|_| Error::auth(format!("unexpected token response: {}", body)))?;
        let access_token = token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::auth(format!("no access_token in response: {}", body)))?;

        let credential =
            Credential::new(access_token, token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN));
        info!("Obtained access token, valid until {}", credential.expires_at);

        if let Err(e) = self.store.save(&credential) {
            warn!(
                "Could not persist access token to {}: {}",
                self.store.path().display(),
                e
            );
        }

        self.current = Some(credential.clone());
        Ok(credential)
    }

    /// Get the credential currently held, valid or not
    pub fn current(&self) -> Option<&Credential> {
        self.current.as_ref()
    }
}
