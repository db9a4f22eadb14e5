//! Table access through the PostgREST API

mod query;

use reqwest::Client;
use serde::Serialize;

use crate::config::ClientOptions;

pub use query::{SelectBuilder, UpsertBuilder};

use query::TableRequest;

/// Client for operations on one table
pub struct PostgrestClient {
    request: TableRequest,
}

impl PostgrestClient {
    /// Create a new PostgrestClient
    pub fn new(url: &str, key: &str, table: &str, client: Client, options: &ClientOptions) -> Self {
        Self {
            request: TableRequest {
                url: format!("{}/rest/v1/{}", url.trim_end_matches('/'), table),
                key: key.to_string(),
                token: None,
                schema: options.db_schema.clone(),
                timeout: options.request_timeout,
                client,
            },
        }
    }

    /// Run the following request as the signed-in user
    pub fn with_auth(mut self, access_token: &str) -> Self {
        self.request.token = Some(access_token.to_string());
        self
    }

    /// The REST endpoint of the table
    pub fn url(&self) -> &str {
        &self.request.url
    }

    /// Select specific columns from the table
    pub fn select(&self, columns: &str) -> SelectBuilder {
        SelectBuilder::new(self.request.clone(), columns)
    }

    /// Upsert data in the table (insert or update if it exists)
    pub fn upsert<T: Serialize>(&self, values: T) -> UpsertBuilder<T> {
        UpsertBuilder::new(self.request.clone(), values)
    }
}
