//! DigitalOcean API client.

use reqwest::{Client, Method, RequestBuilder, header};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::ApiError;
use crate::http;
use crate::planner::RetryPolicy;
use crate::resource::System;

use super::types::{
    CreateDropletRequest, CreateProjectRequest, DropletAction, DropletEnvelope, DropletPage,
    Project, ProjectEnvelope, ProjectPage, droplet_urn,
};

/// DigitalOcean API base URL.
pub const DIGITALOCEAN_API_URL: &str = "https://api.digitalocean.com";

/// Page size for list requests.
const PER_PAGE: u32 = 200;

/// DigitalOcean API client.
#[derive(Debug, Clone)]
pub struct DigitalOceanClient {
    /// HTTP client.
    client: Client,
    /// Base URL without trailing slash.
    base_url: String,
    /// API token.
    token: String,
    /// Retry policy for reads.
    retry: RetryPolicy,
}

impl DigitalOceanClient {
    /// Creates a new DigitalOcean client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, ApiError> {
        Ok(Self {
            client: http::build_client(System::DigitalOcean, timeout)?,
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

    fn url(&self, path: &str) -> String {
        format!("{}/v2/{path}", self.base_url)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
    }

    async fn get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T, ApiError> {
        http::with_retry(System::DigitalOcean, &self.retry, move || async move {
            trace!("GET {url}");
            let response = http::send(
                System::DigitalOcean,
                self.request(Method::GET, url).query(query),
            )
            .await?;
            http::json(System::DigitalOcean, response).await
        })
        .await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ApiError> {
        let response = http::send(
            System::DigitalOcean,
            self.request(Method::POST, &self.url(path)).json(body),
        )
        .await?;
        http::json(System::DigitalOcean, response).await
    }

    /// Lists every droplet carrying `tag`, following pagination.
    ///
    /// # Errors
    ///
    /// Returns an error if any page cannot be fetched.
    pub async fn list_droplets(&self, tag: Option<&str>) -> Result<Vec<Value>, ApiError> {
        let mut query = vec![("per_page", PER_PAGE.to_string()), ("page", String::from("1"))];
        if let Some(tag) = tag {
            query.push(("tag_name", tag.to_string()));
        }

        let mut page: DropletPage = self.get(&self.url("droplets"), &query).await?;
        let mut droplets = std::mem::take(&mut page.droplets);

        while let Some(next) = page.links.next().map(String::from) {
            page = self.get(&next, &[]).await?;
            droplets.append(&mut page.droplets);
        }

        debug!("Listed {} droplets", droplets.len());
        Ok(droplets)
    }

    /// Creates a droplet and returns it.
    ///
    /// # Errors
    ///
    /// Returns an error if DigitalOcean rejects the droplet.
    pub async fn create_droplet(&self, request: &CreateDropletRequest) -> Result<Value, ApiError> {
        let body = serde_json::to_value(request)
            .map_err(|e| ApiError::invalid(System::DigitalOcean, e.to_string()))?;
        let envelope: DropletEnvelope = self.post("droplets", &body).await?;
        Ok(envelope.droplet)
    }

    /// Deletes a droplet.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the droplet does not exist.
    pub async fn delete_droplet(&self, id: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("droplets/{id}"));
        http::send(System::DigitalOcean, self.request(Method::DELETE, &url)).await?;
        Ok(())
    }

    /// Requests a droplet action.
    ///
    /// # Errors
    ///
    /// Returns an error if the action is refused.
    pub async fn droplet_action(&self, id: &str, action: &DropletAction) -> Result<(), ApiError> {
        let url = self.url(&format!("droplets/{id}/actions"));
        http::send(
            System::DigitalOcean,
            self.request(Method::POST, &url).json(action),
        )
        .await?;
        Ok(())
    }

    /// Lists every project.
    ///
    /// # Errors
    ///
    /// Returns an error if any page cannot be fetched.
    pub async fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        let query = [("per_page", PER_PAGE.to_string())];
        let mut page: ProjectPage = self.get(&self.url("projects"), &query).await?;
        let mut projects = std::mem::take(&mut page.projects);

        while let Some(next) = page.links.next().map(String::from) {
            page = self.get(&next, &[]).await?;
            projects.append(&mut page.projects);
        }

        Ok(projects)
    }

    /// Creates a project.
    ///
    /// # Errors
    ///
    /// Returns an error if DigitalOcean rejects the project.
    pub async fn create_project(&self, request: &CreateProjectRequest) -> Result<Project, ApiError> {
        let body = serde_json::to_value(request)
            .map_err(|e| ApiError::invalid(System::DigitalOcean, e.to_string()))?;
        let envelope: ProjectEnvelope = self.post("projects", &body).await?;
        Ok(envelope.project)
    }

    /// Assigns a droplet to a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the assignment is refused.
    pub async fn assign_droplet(&self, project_id: &str, droplet_id: &str) -> Result<(), ApiError> {
        let body = json!({ "resources": [droplet_urn(droplet_id)] });
        let _: Value = self
            .post(&format!("projects/{project_id}/resources"), &body)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> DigitalOceanClient {
        DigitalOceanClient::new(&server.uri(), "do-token", Duration::from_secs(5))
            .unwrap()
            .with_retry(RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
            })
    }

    #[tokio::test]
    async fn test_list_droplets_paginates_by_tag() {
        let server = MockServer::start().await;
        let next = format!("{}/v2/droplets?page=2&per_page=200&tag_name=netbox-managed", server.uri());

        Mock::given(method("GET"))
            .and(path("/v2/droplets"))
            .and(query_param("page", "1"))
            .and(query_param("tag_name", "netbox-managed"))
            .and(header("Authorization", "Bearer do-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "droplets": [{"id": 1, "name": "host-a"}],
                "links": {"pages": {"next": next}},
                "meta": {"total": 2}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/droplets"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "droplets": [{"id": 2, "name": "host-b"}],
                "links": {},
                "meta": {"total": 2}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let droplets = client(&server).list_droplets(Some("netbox-managed")).await.unwrap();
        assert_eq!(droplets.len(), 2);
        assert_eq!(droplets[1]["name"], "host-b");
    }

    #[tokio::test]
    async fn test_rate_limit_honors_retry_after() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/projects"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let no_retry = DigitalOceanClient::new(&server.uri(), "t", Duration::from_secs(5))
            .unwrap()
            .with_retry(RetryPolicy::none());
        let err = no_retry.list_projects().await.unwrap_err();

        assert_eq!(err.retry_delay_secs(), Some(7));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_slow_response_is_transient_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/projects"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"projects": [], "links": {}}))
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = DigitalOceanClient::new(&server.uri(), "t", Duration::from_millis(50))
            .unwrap()
            .with_retry(RetryPolicy::none());
        let err = client.list_projects().await.unwrap_err();

        assert!(matches!(err, ApiError::Timeout { .. }), "{err}");
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_timed_out_read_is_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/projects"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"projects": [], "links": {}}))
                    .set_delay(Duration::from_millis(500)),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "projects": [{"id": "p-1", "name": "staging"}],
                "links": {}
            })))
            .mount(&server)
            .await;

        let client = DigitalOceanClient::new(&server.uri(), "t", Duration::from_millis(50))
            .unwrap()
            .with_retry(RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
            });
        let projects = client.list_projects().await.unwrap();
        assert_eq!(projects[0].name, "staging");
    }

    #[tokio::test]
    async fn test_droplet_action_and_assignment() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/droplets/42/actions"))
            .and(body_json(json!({"type": "power_on"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"action": {"id": 1}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/projects/p-1/resources"))
            .and(body_json(json!({"resources": ["do:droplet:42"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"resources": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        client.droplet_action("42", &DropletAction::PowerOn).await.unwrap();
        client.assign_droplet("p-1", "42").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_droplet_is_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/v2/droplets/42"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "id": "not_found",
                "message": "The resource you were accessing could not be found."
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).delete_droplet("42").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
