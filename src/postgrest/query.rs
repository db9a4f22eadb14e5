//! Query builders for table access

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

use crate::error::Error;
use crate::fetch::{Fetch, FetchBuilder};

/// Everything a request against one table needs
#[derive(Debug, Clone)]
pub(crate) struct TableRequest {
    pub(crate) url: String,
    pub(crate) key: String,
    pub(crate) token: Option<String>,
    pub(crate) schema: String,
    pub(crate) timeout: Option<Duration>,
    pub(crate) client: Client,
}

impl TableRequest {
    fn prepare<'a>(&self, fetch: FetchBuilder<'a>) -> FetchBuilder<'a> {
        let fetch = fetch
            .header("apikey", &self.key)
            .header("Accept-Profile", &self.schema)
            .header("Content-Profile", &self.schema)
            .timeout(self.timeout);
        // Anonymous requests authenticate with the anon key itself
        let token = self.token.as_deref().unwrap_or(&self.key);
        fetch.bearer_auth(token)
    }
}

/// Builder for SELECT queries
pub struct SelectBuilder {
    request: TableRequest,

    /// Ordered query parameters (`select`, filters, `limit`)
    params: Vec<(String, String)>,
}

impl SelectBuilder {
    pub(crate) fn new(request: TableRequest, columns: &str) -> Self {
        Self {
            request,
            params: vec![("select".to_string(), columns.to_string())],
        }
    }

    /// Filter rows where column equals a value
    pub fn eq<T: ToString>(mut self, column: &str, value: T) -> Self {
        self.params
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    /// Limit the number of rows returned
    pub fn limit(mut self, count: u32) -> Self {
        self.params.push(("limit".to_string(), count.to_string()));
        self
    }

    /// The query parameters, in the order they will be sent
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Execute the query and return the results
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<Vec<T>, Error> {
        let mut fetch = self.request.prepare(Fetch::get(&self.request.client, &self.request.url));
        for (key, value) in &self.params {
            fetch = fetch.query(key, value);
        }
        fetch.execute::<Vec<T>>().await
    }

    /// Execute the query and return the first row, `None` when no row matched
    pub async fn maybe_single<T: DeserializeOwned>(self) -> Result<Option<T>, Error> {
        let rows = self.limit(1).execute::<T>().await?;
        Ok(rows.into_iter().next())
    }
}

/// Builder for UPSERT queries (insert, or merge on conflict)
pub struct UpsertBuilder<T: Serialize> {
    request: TableRequest,
    values: T,
    on_conflict: Option<String>,
}

impl<T: Serialize> UpsertBuilder<T> {
    pub(crate) fn new(request: TableRequest, values: T) -> Self {
        Self {
            request,
            values,
            on_conflict: None,
        }
    }

    /// Column whose uniqueness decides between insert and update
    pub fn on_conflict(mut self, column: &str) -> Self {
        self.on_conflict = Some(column.to_string());
        self
    }

    /// Execute the upsert and return the stored rows
    pub async fn execute<R: DeserializeOwned>(&self) -> Result<Vec<R>, Error> {
        let mut fetch = self
            .request
            .prepare(Fetch::post(&self.request.client, &self.request.url))
            .header("Prefer", "resolution=merge-duplicates,return=representation");
        if let Some(column) = &self.on_conflict {
            fetch = fetch.query("on_conflict", column);
        }
        fetch.json(&self.values)?.execute::<Vec<R>>().await
    }
}
