//! Rows of the `users` and `chefs` tables

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Which side of the marketplace an account is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Booking customer
    Client,
    /// Service provider
    Chef,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Client => "client",
            UserRole::Chef => "chef",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of `users`; `user_role` never changes after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub full_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub user_role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn is_chef(&self) -> bool {
        self.user_role == UserRole::Chef
    }
}

/// Body inserted into `users` right after registration; `created_at` is
/// filled in by the database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewUserProfile {
    pub id: String,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub user_role: UserRole,
}

/// One row of `chefs`, keyed by the chef's user id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChefProfile {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bio: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub specialties: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub experience: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hourly_rate: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(default)]
    pub profile_video: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_profile_complete: bool,
}

/// Freshly created rows carry nulls in columns the app treats as empty
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
