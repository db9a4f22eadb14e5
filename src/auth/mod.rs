//! Authentication against the hosted auth service

mod session;
mod types;

use async_trait::async_trait;
use reqwest::Client;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

use crate::config::ClientOptions;
use crate::error::Error;
use crate::fetch::Fetch;

pub use session::*;
pub use types::*;

/// The auth operations the session router consumes
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The session currently held, if any
    fn get_session(&self) -> Option<Session>;

    /// Receive every subsequent auth state change
    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;

    /// Sign in a user with email and password
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, Error>;

    /// Register a new account. `None` when the service requires email
    /// confirmation before issuing a session.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<Option<Session>, Error>;

    /// Send the sign-up confirmation email to `email` again
    async fn resend_signup_confirmation(&self, email: &str) -> Result<(), Error>;

    /// Sign out the current user
    async fn sign_out(&self) -> Result<(), Error>;
}

/// Client for the hosted auth service
pub struct Auth {
    /// The base URL for the project
    url: String,

    /// The anonymous API key for the project
    key: String,

    /// HTTP client used for requests
    client: Client,

    /// The current session
    session: Arc<RwLock<Option<Session>>>,

    /// Auth change fan-out
    changes: broadcast::Sender<AuthChange>,

    /// Client options
    options: ClientOptions,
}

impl Auth {
    /// Create a new Auth client
    pub fn new(url: &str, key: &str, client: Client, options: ClientOptions) -> Self {
        let (changes, _) = broadcast::channel(options.auth_event_capacity.max(1));
        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            client,
            session: Arc::new(RwLock::new(None)),
            changes,
            options,
        }
    }

    fn get_auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.url, path)
    }

    fn store_session(&self, session: Option<Session>, event: AuthChangeEvent) {
        {
            let mut current = self.session.write().unwrap_or_else(PoisonError::into_inner);
            *current = session.clone();
        }
        tracing::debug!(?event, has_session = session.is_some(), "auth state changed");
        // No receivers is fine: nobody is listening yet
        let _ = self.changes.send(AuthChange::new(event, session));
    }

    fn access_token(&self) -> Result<String, Error> {
        self.get_session()
            .map(|s| s.access_token)
            .ok_or_else(|| Error::auth("Not logged in"))
    }

    /// Restore a persisted session (cold start)
    pub fn set_session(&self, session: Session) {
        self.store_session(Some(session.stamp_expiry()), AuthChangeEvent::SignedIn);
    }

    /// Exchange the refresh token for a new session
    pub async fn refresh_session(&self) -> Result<Session, Error> {
        let refresh_token = self
            .get_session()
            .map(|s| s.refresh_token)
            .ok_or_else(|| Error::auth("Not logged in"))?;

        let url = self.get_auth_url("/token");
        let result = Fetch::post(&self.client, &url)
            .query("grant_type", "refresh_token")
            .header("apikey", &self.key)
            .timeout(self.options.request_timeout)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))?
            .execute::<Session>()
            .await;

        match result {
            Ok(session) => {
                let session = session.stamp_expiry();
                self.store_session(Some(session.clone()), AuthChangeEvent::TokenRefreshed);
                Ok(session)
            }
            Err(Error::Status { status, body }) if (400..500).contains(&status) => {
                // Refresh token revoked: the session is gone
                self.store_session(None, AuthChangeEvent::SignedOut);
                Err(Error::auth(body))
            }
            Err(e) => Err(e),
        }
    }
}

/// 4xx answers from the auth endpoints are credential problems
fn credential_error(error: Error) -> Error {
    match error {
        Error::Status { status, body } if (400..500).contains(&status) => Error::Auth(body),
        other => other,
    }
}

#[async_trait]
impl AuthProvider for Auth {
    fn get_session(&self) -> Option<Session> {
        let current = self.session.read().unwrap_or_else(PoisonError::into_inner);
        current.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, Error> {
        let url = self.get_auth_url("/token");

        let session = Fetch::post(&self.client, &url)
            .query("grant_type", "password")
            .header("apikey", &self.key)
            .timeout(self.options.request_timeout)
            .json(&serde_json::json!({ "email": email, "password": password }))?
            .execute::<Session>()
            .await
            .map_err(credential_error)?
            .stamp_expiry();

        self.store_session(Some(session.clone()), AuthChangeEvent::SignedIn);
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<Option<Session>, Error> {
        let url = self.get_auth_url("/signup");

        let response = Fetch::post(&self.client, &url)
            .header("apikey", &self.key)
            .timeout(self.options.request_timeout)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": metadata,
            }))?
            .execute::<SignUpResponse>()
            .await
            .map_err(credential_error)?;

        match response {
            SignUpResponse::Session(session) => {
                let session = session.stamp_expiry();
                self.store_session(Some(session.clone()), AuthChangeEvent::SignedIn);
                Ok(Some(session))
            }
            SignUpResponse::User(user) => {
                tracing::info!(user_id = %user.id, "sign-up awaiting email confirmation");
                Ok(None)
            }
        }
    }

    async fn resend_signup_confirmation(&self, email: &str) -> Result<(), Error> {
        let url = self.get_auth_url("/resend");

        Fetch::post(&self.client, &url)
            .header("apikey", &self.key)
            .timeout(self.options.request_timeout)
            .json(&serde_json::json!({ "type": "signup", "email": email }))?
            .execute_empty()
            .await
            .map_err(credential_error)?;

        tracing::info!("sign-up confirmation email sent again");
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), Error> {
        let token = self.access_token()?;
        let url = self.get_auth_url("/logout");

        let result = Fetch::post(&self.client, &url)
            .header("apikey", &self.key)
            .bearer_auth(&token)
            .timeout(self.options.request_timeout)
            .execute_empty()
            .await;

        match result {
            Ok(()) => {}
            // The token is already dead on the server side
            Err(Error::Status { status: 401 | 403 | 404, .. }) => {
                tracing::debug!("logout with stale token, clearing local session");
            }
            Err(e) => return Err(e),
        }

        self.store_session(None, AuthChangeEvent::SignedOut);
        Ok(())
    }
}
