//! Profile records and the store the router reads them from

mod models;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::auth::Session;
use crate::config::ClientOptions;
use crate::error::Error;
use crate::onboarding::ChefOnboarding;
use crate::postgrest::PostgrestClient;

pub use models::*;

/// Remote table access used by the session router.
///
/// `Ok(None)` means the row does not exist (yet); errors are reserved for
/// failed lookups.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// The `users` row of the session's identity
    async fn fetch_user_profile(&self, session: &Session) -> Result<Option<UserProfile>, Error>;

    /// Create the `users` row of a freshly registered identity
    async fn create_user_profile(
        &self,
        session: &Session,
        profile: &NewUserProfile,
    ) -> Result<UserProfile, Error>;

    /// The `chefs` row of the session's identity
    async fn fetch_chef_profile(&self, session: &Session) -> Result<Option<ChefProfile>, Error>;

    /// Store a finished onboarding and mark the chef profile complete
    async fn save_chef_onboarding(
        &self,
        session: &Session,
        onboarding: &ChefOnboarding,
    ) -> Result<ChefProfile, Error>;
}

/// Profile store backed by the hosted REST tables
pub struct RestProfileStore {
    url: String,
    key: String,
    client: Client,
    options: ClientOptions,
}

/// Body upserted into `chefs` when onboarding completes
#[derive(Debug, Serialize)]
struct ChefRecord<'a> {
    id: &'a str,
    #[serde(flatten)]
    onboarding: &'a ChefOnboarding,
    is_profile_complete: bool,
    profile_status: &'static str,
}

impl RestProfileStore {
    pub fn new(url: &str, key: &str, client: Client, options: ClientOptions) -> Self {
        Self {
            url: url.to_string(),
            key: key.to_string(),
            client,
            options,
        }
    }

    fn table(&self, table: &str, session: &Session) -> PostgrestClient {
        PostgrestClient::new(&self.url, &self.key, table, self.client.clone(), &self.options)
            .with_auth(&session.access_token)
    }
}

#[async_trait]
impl ProfileStore for RestProfileStore {
    async fn fetch_user_profile(&self, session: &Session) -> Result<Option<UserProfile>, Error> {
        self.table(&self.options.users_table, session)
            .select("id,full_name,email,phone_number,user_role,created_at")
            .eq("id", session.user_id())
            .maybe_single::<UserProfile>()
            .await
    }

    async fn create_user_profile(
        &self,
        session: &Session,
        profile: &NewUserProfile,
    ) -> Result<UserProfile, Error> {
        let rows = self
            .table(&self.options.users_table, session)
            .upsert(profile)
            .on_conflict("id")
            .execute::<UserProfile>()
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| Error::database("user profile insert returned no rows"))
    }

    async fn fetch_chef_profile(&self, session: &Session) -> Result<Option<ChefProfile>, Error> {
        self.table(&self.options.chefs_table, session)
            .select("id,bio,specialties,experience,hourly_rate,location,profile_video,is_profile_complete")
            .eq("id", session.user_id())
            .maybe_single::<ChefProfile>()
            .await
    }

    async fn save_chef_onboarding(
        &self,
        session: &Session,
        onboarding: &ChefOnboarding,
    ) -> Result<ChefProfile, Error> {
        let record = ChefRecord {
            id: session.user_id(),
            onboarding,
            is_profile_complete: true,
            profile_status: "pending_review",
        };

        let rows = self
            .table(&self.options.chefs_table, session)
            .upsert(&record)
            .on_conflict("id")
            .execute::<ChefProfile>()
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| Error::database("chef profile upsert returned no rows"))
    }
}
