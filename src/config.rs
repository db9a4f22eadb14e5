//! Configuration options for the backend clients and the session router

use std::env;
use std::time::Duration;

use crate::error::Error;

/// Configuration options for the backend clients
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// The database schema
    pub db_schema: String,

    /// Table holding one `UserProfile` per auth identity
    pub users_table: String,

    /// Table holding one `ChefProfile` per chef
    pub chefs_table: String,

    /// Capacity of the auth change broadcast channel
    pub auth_event_capacity: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            db_schema: "public".to_string(),
            users_table: "users".to_string(),
            chefs_table: "chefs".to_string(),
            auth_event_capacity: 16,
        }
    }
}

impl ClientOptions {
    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the database schema
    pub fn with_db_schema(mut self, value: &str) -> Self {
        self.db_schema = value.to_string();
        self
    }

    /// Set the users table name
    pub fn with_users_table(mut self, value: &str) -> Self {
        self.users_table = value.to_string();
        self
    }

    /// Set the chefs table name
    pub fn with_chefs_table(mut self, value: &str) -> Self {
        self.chefs_table = value.to_string();
        self
    }
}

/// Project URL and anon key, read from the environment
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub url: String,
    pub key: String,
}

impl ProjectConfig {
    /// Load `SUPABASE_URL` and `SUPABASE_KEY`, honouring a `.env` file
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();

        let url = env::var("SUPABASE_URL").map_err(|_| Error::general("SUPABASE_URL must be set"))?;
        let key = env::var("SUPABASE_KEY").map_err(|_| Error::general("SUPABASE_KEY must be set"))?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            key,
        })
    }
}

/// Navigation targets, one per resolved router state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    pub login: String,
    pub client_dashboard: String,
    pub chef_onboarding: String,
    pub chef_dashboard: String,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            client_dashboard: "/user/dashboard".to_string(),
            chef_onboarding: "/chef/profile-setup".to_string(),
            chef_dashboard: "/chef/dashboard".to_string(),
        }
    }
}

/// Configuration options for the session router
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Extra profile fetch attempts after a transient failure
    pub fetch_retries: u32,

    /// Delay between profile fetch attempts
    pub retry_delay: Duration,

    /// Route paths used by the navigator
    pub routes: RouteTable,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            fetch_retries: 2,
            retry_delay: Duration::from_millis(500),
            routes: RouteTable::default(),
        }
    }
}

impl RouterOptions {
    /// Set the number of extra fetch attempts
    pub fn with_fetch_retries(mut self, value: u32) -> Self {
        self.fetch_retries = value;
        self
    }

    /// Set the delay between fetch attempts
    pub fn with_retry_delay(mut self, value: Duration) -> Self {
        self.retry_delay = value;
        self
    }

    /// Replace the route table
    pub fn with_routes(mut self, value: RouteTable) -> Self {
        self.routes = value;
        self
    }
}
