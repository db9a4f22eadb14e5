//! CookEase session core
//!
//! Session handling for the CookEase chef marketplace: typed clients for the
//! hosted auth and table APIs, and the router that sends every signed-in
//! identity to the screen its role and onboarding status call for.

pub mod auth;
pub mod config;
pub mod error;
pub mod fetch;
pub mod onboarding;
pub mod postgrest;
pub mod profile;
pub mod router;
pub mod validation;

use reqwest::Client;
use std::sync::Arc;

use crate::auth::Auth;
use crate::config::{ClientOptions, ProjectConfig, RouterOptions};
use crate::error::Error;
use crate::postgrest::PostgrestClient;
use crate::profile::RestProfileStore;
use crate::router::{Navigator, SessionRouter};

/// Entry point bundling the backend clients of one project
pub struct CookEase {
    /// The base URL for the project
    pub url: String,
    /// The anonymous API key for the project
    pub key: String,
    /// HTTP client used for requests
    pub http_client: Client,
    /// Client options
    pub options: ClientOptions,
    auth: Arc<Auth>,
}

impl CookEase {
    /// Create a new client
    ///
    /// # Example
    ///
    /// ```
    /// use cookease::auth::AuthProvider;
    /// use cookease::CookEase;
    ///
    /// let backend = CookEase::new("https://your-project-url.supabase.co", "your-anon-key");
    /// assert!(backend.auth().get_session().is_none());
    /// ```
    pub fn new(url: &str, key: &str) -> Self {
        Self::new_with_options(url, key, ClientOptions::default())
    }

    /// Create a new client with custom options
    pub fn new_with_options(url: &str, key: &str, options: ClientOptions) -> Self {
        let url = url.trim_end_matches('/').to_string();
        let http_client = Client::new();
        let auth = Arc::new(Auth::new(&url, key, http_client.clone(), options.clone()));

        Self {
            url,
            key: key.to_string(),
            http_client,
            options,
            auth,
        }
    }

    /// Create a client from `SUPABASE_URL` / `SUPABASE_KEY`
    pub fn from_env() -> Result<Self, Error> {
        let project = ProjectConfig::from_env()?;
        Ok(Self::new(&project.url, &project.key))
    }

    /// The auth client, shared with any router built from this client
    pub fn auth(&self) -> Arc<Auth> {
        self.auth.clone()
    }

    /// Table access for `table`
    pub fn from(&self, table: &str) -> PostgrestClient {
        PostgrestClient::new(&self.url, &self.key, table, self.http_client.clone(), &self.options)
    }

    /// Profile store reading the configured `users` / `chefs` tables
    pub fn profile_store(&self) -> RestProfileStore {
        RestProfileStore::new(&self.url, &self.key, self.http_client.clone(), self.options.clone())
    }

    /// Wire a session router to this project's auth and tables
    pub fn session_router(&self, navigator: Arc<dyn Navigator>, options: RouterOptions) -> SessionRouter {
        SessionRouter::new(
            self.auth.clone(),
            Arc::new(self.profile_store()),
            navigator,
            options,
        )
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::auth::{AuthProvider, Session};
    pub use crate::config::{ClientOptions, RouteTable, RouterOptions};
    pub use crate::error::Error;
    pub use crate::onboarding::{ChefOnboarding, OnboardingWizard};
    pub use crate::profile::{ChefProfile, ProfileStore, UserProfile, UserRole};
    pub use crate::router::{Navigator, RouterHandle, RouterState, SessionRouter};
    pub use crate::CookEase;
}
