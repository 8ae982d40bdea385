//! NetBox REST API client.

use reqwest::{Client, Method, RequestBuilder, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::ApiError;
use crate::http;
use crate::planner::RetryPolicy;
use crate::resource::System;

use super::types::{Branch, CreateBranchRequest, ObjectRef, Page};

/// Page size for list requests.
const PAGE_LIMIT: u32 = 1000;

/// Header scoping a request to a branch.
const BRANCH_HEADER: &str = "X-NetBox-Branch";

/// Branching plugin endpoint, relative to `/api/`.
const BRANCHES_ENDPOINT: &str = "plugins/branching/branches";

/// NetBox API client.
#[derive(Debug, Clone)]
pub struct NetBoxClient {
    /// HTTP client.
    client: Client,
    /// Base URL without trailing slash.
    base_url: String,
    /// API token.
    token: String,
    /// Retry policy for reads.
    retry: RetryPolicy,
}

impl NetBoxClient {
    /// Creates a new NetBox client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, ApiError> {
        Ok(Self {
            client: http::build_client(System::NetBox, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    /// Sets the retry policy for reads.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/api/{endpoint}/", self.base_url)
    }

    fn object_url(&self, endpoint: &str, id: &str) -> String {
        format!("{}/api/{endpoint}/{id}/", self.base_url)
    }

    fn request(&self, method: Method, url: &str, branch: Option<&str>) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(header::AUTHORIZATION, format!("Token {}", self.token));
        match branch {
            Some(schema_id) => builder.header(BRANCH_HEADER, schema_id),
            None => builder,
        }
    }

    /// GETs a URL and decodes the body, retrying transient failures.
    async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
        branch: Option<&str>,
    ) -> Result<T, ApiError> {
        http::with_retry(System::NetBox, &self.retry, move || async move {
            trace!("GET {url}");
            let response = http::send(
                System::NetBox,
                self.request(Method::GET, url, branch).query(query),
            )
            .await?;
            http::json(System::NetBox, response).await
        })
        .await
    }

    /// Lists every object of an endpoint, following pagination.
    ///
    /// # Errors
    ///
    /// Returns an error if any page cannot be fetched.
    pub async fn list_all(
        &self,
        endpoint: &str,
        filters: &[(String, String)],
        branch: Option<&str>,
    ) -> Result<Vec<Value>, ApiError> {
        let mut query: Vec<(String, String)> = vec![
            (String::from("limit"), PAGE_LIMIT.to_string()),
            (String::from("offset"), String::from("0")),
        ];
        query.extend(filters.iter().cloned());

        let mut page: Page<Value> = self.get(&self.endpoint_url(endpoint), &query, branch).await?;
        let mut objects = std::mem::take(&mut page.results);

        while let Some(next) = page.next.take() {
            page = self.get(&next, &[], branch).await?;
            objects.append(&mut page.results);
        }

        debug!("Listed {} objects from {endpoint}", objects.len());
        Ok(objects)
    }

    /// Finds the id of the object whose `field` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub async fn find_id(
        &self,
        endpoint: &str,
        field: &str,
        value: &str,
        branch: Option<&str>,
    ) -> Result<Option<u64>, ApiError> {
        let query = [(field.to_string(), value.to_string())];
        let page: Page<ObjectRef> = self.get(&self.endpoint_url(endpoint), &query, branch).await?;
        Ok(page.results.first().map(|o| o.id))
    }

    /// Creates an object.
    ///
    /// # Errors
    ///
    /// Returns an error if NetBox rejects the object.
    pub async fn create<B: Serialize + Sync>(
        &self,
        endpoint: &str,
        body: &B,
        branch: Option<&str>,
    ) -> Result<Value, ApiError> {
        let url = self.endpoint_url(endpoint);
        let response = http::send(
            System::NetBox,
            self.request(Method::POST, &url, branch).json(body),
        )
        .await?;
        http::json(System::NetBox, response).await
    }

    /// Patches fields of an object.
    ///
    /// # Errors
    ///
    /// Returns an error if NetBox rejects the change.
    pub async fn patch(
        &self,
        endpoint: &str,
        id: &str,
        body: &Value,
        branch: Option<&str>,
    ) -> Result<(), ApiError> {
        let url = self.object_url(endpoint, id);
        http::send(
            System::NetBox,
            self.request(Method::PATCH, &url, branch).json(body),
        )
        .await?;
        Ok(())
    }

    /// Deletes an object.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the object does not exist, or any
    /// other error from NetBox.
    pub async fn delete(&self, endpoint: &str, id: &str, branch: Option<&str>) -> Result<(), ApiError> {
        let url = self.object_url(endpoint, id);
        http::send(System::NetBox, self.request(Method::DELETE, &url, branch)).await?;
        Ok(())
    }

    /// Finds a branch by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the branching plugin cannot be queried.
    pub async fn find_branch(&self, name: &str) -> Result<Option<Branch>, ApiError> {
        let query = [(String::from("name"), name.to_string())];
        let page: Page<Branch> = self
            .get(&self.endpoint_url(BRANCHES_ENDPOINT), &query, None)
            .await?;
        Ok(page.results.into_iter().find(|b| b.name == name))
    }

    /// Fetches a branch by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the branch cannot be fetched.
    pub async fn get_branch(&self, id: u64) -> Result<Branch, ApiError> {
        self.get(&self.object_url(BRANCHES_ENDPOINT, &id.to_string()), &[], None)
            .await
    }

    /// Creates a branch.
    ///
    /// # Errors
    ///
    /// Returns an error if NetBox rejects the branch.
    pub async fn create_branch(&self, name: &str, description: &str) -> Result<Branch, ApiError> {
        let body = CreateBranchRequest {
            name: name.to_string(),
            description: description.to_string(),
        };
        let value = self.create(BRANCHES_ENDPOINT, &body, None).await?;
        serde_json::from_value(value)
            .map_err(|e| ApiError::invalid(System::NetBox, format!("Unexpected branch payload: {e}")))
    }
}
