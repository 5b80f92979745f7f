//! Jira REST API v2 client.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Result, TicketError};
use crate::retry::RetryPolicy;
use crate::tracker::{dns_failure_text, listing_summary, Issue, TicketTracker, MAJOR_MALFUNCTION_LABEL};

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_ISSUE_TYPE: &str = "Task";
const DEFAULT_DNS_FAILURE_ISSUE_TYPE: &str = "Incident";
const DEFAULT_EXCLUDED_STATUSES: [&str; 3] = ["Done", "Closed", "Resolved"];
const SEARCH_LIMIT: &str = "10";

/// Jira client
#[derive(Clone)]
pub struct JiraClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: HttpClient,
    base_url: String,
    user: String,
    token: String,
    project: String,
    issue_type: String,
    dns_failure_issue_type: String,
    excluded_statuses: Vec<String>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for JiraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraClient")
            .field("base_url", &self.inner.base_url)
            .field("project", &self.inner.project)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<RawIssue>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    key: String,
    fields: RawFields,
}

#[derive(Debug, Deserialize)]
struct RawFields {
    #[serde(default)]
    summary: String,
    status: Option<RawStatus>,
    created: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    key: String,
}

#[derive(Debug, Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

impl From<RawIssue> for Issue {
    fn from(raw: RawIssue) -> Self {
        Self {
            key: raw.key,
            summary: raw.fields.summary,
            status: raw.fields.status.map(|s| s.name).unwrap_or_default(),
            created: raw.fields.created.as_deref().and_then(parse_jira_time),
        }
    }
}

/// Jira timestamps look like `2024-01-15T10:30:00.000+0000`.
fn parse_jira_time(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
}

impl JiraClient {
    /// Create a builder
    #[must_use]
    pub fn builder(
        server: impl Into<String>,
        user: impl Into<String>,
        token: impl Into<String>,
        project: impl Into<String>,
    ) -> JiraClientBuilder {
        JiraClientBuilder::new(server, user, token, project)
    }

    /// JQL selecting open issues whose summary mentions `ip`
    #[must_use]
    pub fn open_issue_jql(&self, ip: Ipv4Addr) -> String {
        let statuses: Vec<String> = self
            .inner
            .excluded_statuses
            .iter()
            .map(|s| format!("\"{s}\""))
            .collect();
        format!(
            "project = \"{}\" AND status NOT IN ({}) AND summary ~ \"IP {ip}\"",
            self.inner.project,
            statuses.join(",")
        )
    }

    fn build_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.inner.base_url, path))
            .map_err(|e| TicketError::Config(format!("invalid URL for {path}: {e}")))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<T> {
        let url = self.build_url(path, params)?;
        debug!(url = %url, "GET request");

        let response = self
            .inner
            .http
            .get(url)
            .basic_auth(&self.inner.user, Some(&self.inner.token))
            .send()
            .await
            .map_err(|e| TicketError::Http(e.to_string()))?;

        Self::handle_response(response).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.build_url(path, &[])?;
        debug!(url = %url, "POST request");

        let response = self
            .inner
            .http
            .post(url)
            .basic_auth(&self.inner.user, Some(&self.inner.token))
            .json(body)
            .send()
            .await
            .map_err(|e| TicketError::Http(e.to_string()))?;

        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TicketError::Http(e.to_string()))?;

        if status.is_success() {
            serde_json::from_str(&body).map_err(TicketError::Json)
        } else {
            Err(Self::api_error(status.as_u16(), body))
        }
    }

    /// Jira reports failures as `{"errorMessages": [...], "errors": {...}}`.
    fn api_error(status: u16, body: String) -> TicketError {
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                let mut parts: Vec<String> = v
                    .get("errorMessages")
                    .and_then(Value::as_array)
                    .map(|msgs| msgs.iter().filter_map(Value::as_str).map(String::from).collect())
                    .unwrap_or_default();
                if let Some(errors) = v.get("errors").and_then(Value::as_object) {
                    parts.extend(
                        errors
                            .iter()
                            .filter_map(|(k, e)| e.as_str().map(|e| format!("{k}: {e}"))),
                    );
                }
                (!parts.is_empty()).then(|| parts.join("; "))
            })
            .unwrap_or(body);

        if status == 429 {
            warn!("rate limited by Jira");
        }
        TicketError::Api { status, message }
    }

    async fn search_once(&self, jql: &str) -> Result<Vec<Issue>> {
        let response: SearchResponse = self
            .get_json(
                "/rest/api/2/search",
                &[("jql", jql), ("maxResults", SEARCH_LIMIT)],
            )
            .await?;
        Ok(response.issues.into_iter().map(Issue::from).collect())
    }

    async fn create_once(&self, fields: &Value) -> Result<String> {
        let created: CreatedIssue = self.post_json("/rest/api/2/issue", fields).await?;
        Ok(created.key)
    }

    async fn comment_once(&self, key: &str, body: &str) -> Result<()> {
        let _: Value = self
            .post_json(
                &format!("/rest/api/2/issue/{key}/comment"),
                &CommentBody { body },
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TicketTracker for JiraClient {
    async fn find_open_issue(&self, ip: Ipv4Addr) -> Result<Option<Issue>> {
        let jql = self.open_issue_jql(ip);
        let mut issues = self
            .inner
            .retry
            .run("find_open_issue", || self.search_once(&jql))
            .await?;

        if issues.len() > 1 {
            warn!(ip = %ip, count = issues.len(), "multiple open issues, using most recent");
            // None sorts first, so undated issues lose to dated ones
            issues.sort_by(|a, b| b.created.cmp(&a.created));
        }
        Ok(issues.into_iter().next())
    }

    async fn create_issue(
        &self,
        ip: Ipv4Addr,
        zones: &[String],
        description: &str,
    ) -> Result<String> {
        let fields = json!({
            "fields": {
                "project": { "key": self.inner.project },
                "summary": listing_summary(ip, zones),
                "description": description,
                "issuetype": { "name": self.inner.issue_type },
            }
        });
        let key = self
            .inner
            .retry
            .run("create_issue", || self.create_once(&fields))
            .await?;
        info!(key = %key, ip = %ip, "created issue");
        Ok(key)
    }

    async fn add_comment(&self, key: &str, body: &str) -> Result<()> {
        self.inner
            .retry
            .run("add_comment", || self.comment_once(key, body))
            .await?;
        info!(key, "added comment");
        Ok(())
    }

    async fn create_dns_failure_issue(
        &self,
        broken_fraction: f64,
        failed_zones: &[String],
    ) -> Result<String> {
        let (summary, description) = dns_failure_text(broken_fraction, failed_zones);
        let fields = json!({
            "fields": {
                "project": { "key": self.inner.project },
                "summary": summary,
                "description": description,
                "issuetype": { "name": self.inner.dns_failure_issue_type },
                "labels": [MAJOR_MALFUNCTION_LABEL],
            }
        });
        let key = self
            .inner
            .retry
            .run("create_dns_failure_issue", || self.create_once(&fields))
            .await?;
        info!(key = %key, "created DNS failure issue");
        Ok(key)
    }
}

/// Builder for configuring a [`JiraClient`]
pub struct JiraClientBuilder {
    server: String,
    user: String,
    token: String,
    project: String,
    issue_type: String,
    dns_failure_issue_type: String,
    excluded_statuses: Vec<String>,
    timeout: Duration,
    user_agent: String,
    retry: RetryPolicy,
}

impl JiraClientBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new(
        server: impl Into<String>,
        user: impl Into<String>,
        token: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            user: user.into(),
            token: token.into(),
            project: project.into(),
            issue_type: DEFAULT_ISSUE_TYPE.to_string(),
            dns_failure_issue_type: DEFAULT_DNS_FAILURE_ISSUE_TYPE.to_string(),
            excluded_statuses: DEFAULT_EXCLUDED_STATUSES.iter().map(ToString::to_string).collect(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("dnsbl-monitor/{}", env!("CARGO_PKG_VERSION")),
            retry: RetryPolicy::default(),
        }
    }

    /// Issue type for listing issues
    #[must_use]
    pub fn issue_type(mut self, name: impl Into<String>) -> Self {
        self.issue_type = name.into();
        self
    }

    /// Issue type for DNS failure issues
    #[must_use]
    pub fn dns_failure_issue_type(mut self, name: impl Into<String>) -> Self {
        self.dns_failure_issue_type = name.into();
        self
    }

    /// Statuses that count as closed when searching
    #[must_use]
    pub fn excluded_statuses(mut self, statuses: Vec<String>) -> Self {
        self.excluded_statuses = statuses;
        self
    }

    /// Set the request timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the User-Agent header
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Build the client
    pub fn build(self) -> Result<JiraClient> {
        let base_url = self.server.trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| TicketError::Config(format!("invalid server URL {base_url}: {e}")))?;
        if self.project.trim().is_empty() {
            return Err(TicketError::Config("project key must not be empty".into()));
        }

        let http = HttpClient::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .gzip(true)
            .build()
            .map_err(|e| TicketError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(JiraClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                user: self.user,
                token: self.token,
                project: self.project,
                issue_type: self.issue_type,
                dns_failure_issue_type: self.dns_failure_issue_type,
                excluded_statuses: self.excluded_statuses,
                retry: self.retry,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const IP: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 9);

    fn client(server: &MockServer) -> JiraClient {
        JiraClient::builder(server.uri(), "bot@example.com", "secret", "OPS")
            .retry(RetryPolicy::new().without_delays())
            .build()
            .unwrap()
    }

    #[test]
    fn test_jql() {
        let client = JiraClient::builder("https://jira.example.com", "u", "t", "OPS")
            .build()
            .unwrap();
        assert_eq!(
            client.open_issue_jql(IP),
            "project = \"OPS\" AND status NOT IN (\"Done\",\"Closed\",\"Resolved\") AND summary ~ \"IP 203.0.113.9\""
        );
    }

    #[test]
    fn test_build_rejects_bad_config() {
        assert!(JiraClient::builder("not a url", "u", "t", "OPS").build().is_err());
        assert!(JiraClient::builder("https://jira.example.com", "u", "t", " ").build().is_err());
    }

    #[test]
    fn test_parse_jira_time() {
        assert!(parse_jira_time("2024-01-15T10:30:00.000+0000").is_some());
        assert!(parse_jira_time("2024-01-15T10:30:00Z").is_some());
        assert!(parse_jira_time("yesterday").is_none());
    }

    #[tokio::test]
    async fn test_find_open_issue_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .and(query_param("maxResults", "10"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "issues": [] })))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client(&server).find_open_issue(IP).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_open_issue_prefers_most_recent() {
        let server = MockServer::start().await;
        let jql = client(&server).open_issue_jql(IP);
        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .and(query_param("jql", jql.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issues": [
                    { "key": "OPS-1", "fields": {
                        "summary": "IP 203.0.113.9 blacklisted by a.example",
                        "status": { "name": "Open" },
                        "created": "2024-01-10T08:00:00.000+0000" } },
                    { "key": "OPS-7", "fields": {
                        "summary": "IP 203.0.113.9 blacklisted by b.example",
                        "status": { "name": "In Progress" },
                        "created": "2024-03-02T08:00:00.000+0000" } }
                ]
            })))
            .mount(&server)
            .await;

        let issue = client(&server).find_open_issue(IP).await.unwrap().unwrap();
        assert_eq!(issue.key, "OPS-7");
        assert_eq!(issue.status, "In Progress");
    }

    #[tokio::test]
    async fn test_create_issue() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/issue"))
            .and(body_partial_json(json!({
                "fields": {
                    "project": { "key": "OPS" },
                    "summary": "IP 203.0.113.9 blacklisted by a.example,b.example",
                    "issuetype": { "name": "Task" }
                }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "10001", "key": "OPS-42", "self": "https://jira/rest/api/2/issue/10001"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let zones = vec!["b.example".to_string(), "a.example".to_string()];
        let key = client(&server)
            .create_issue(IP, &zones, "listed")
            .await
            .unwrap();
        assert_eq!(key, "OPS-42");
    }

    #[tokio::test]
    async fn test_add_comment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/issue/OPS-42/comment"))
            .and(body_partial_json(json!({ "body": "IP 203.0.113.9 is now clean (no longer listed)" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "1" })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .add_comment("OPS-42", "IP 203.0.113.9 is now clean (no longer listed)")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dns_failure_issue_is_labelled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/issue"))
            .and(body_partial_json(json!({
                "fields": {
                    "issuetype": { "name": "Outage" },
                    "labels": ["MAJOR MALFUNCTION"]
                }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "key": "OPS-99" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = JiraClient::builder(server.uri(), "u", "t", "OPS")
            .dns_failure_issue_type("Outage")
            .build()
            .unwrap();
        let key = client
            .create_dns_failure_issue(1.0, &["a.example".to_string()])
            .await
            .unwrap();
        assert_eq!(key, "OPS-99");
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/issue"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/issue"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "key": "OPS-5" })))
            .expect(1)
            .mount(&server)
            .await;

        let key = client(&server).create_issue(IP, &[], "").await.unwrap();
        assert_eq!(key, "OPS-5");
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/issue/OPS-1/comment"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "errorMessages": ["Issue does not exist or you do not have permission to see it."],
                "errors": {}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).add_comment("OPS-1", "x").await.unwrap_err();
        match err {
            TicketError::Api { status, message } => {
                assert_eq!(status, 404);
                assert!(message.starts_with("Issue does not exist"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .respond_with(ResponseTemplate::new(429))
            .expect(4)
            .mount(&server)
            .await;

        let err = client(&server).find_open_issue(IP).await.unwrap_err();
        assert!(matches!(err, TicketError::RetriesExhausted { attempts: 4, .. }));
    }
}
