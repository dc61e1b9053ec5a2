//! Storage forwarder: hands captured homepages to the downstream storage worker.
//!
//! The worker performs its own persistence; only the HTTP status is inspected.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use enrichkit_fetcher::FetchedContent;
use enrichkit_shared::{CompanyInput, EnrichKitError, ForwarderSettings, Result, WorkflowRef};

/// Header carrying the service key alongside the bearer token.
const API_KEY_HEADER: &str = "apikey";

/// JSON envelope POSTed to the storage worker.
#[derive(Debug, Serialize)]
pub struct ForwardEnvelope<'a> {
    pub workflow_id: &'a str,
    pub company_id: &'a str,
    pub company_domain: &'a str,
    pub company_name: &'a str,
    pub data: HomepageData<'a>,
}

/// Captured homepage payload inside a [`ForwardEnvelope`].
#[derive(Debug, Serialize)]
pub struct HomepageData<'a> {
    pub homepage_html: &'a str,
    pub scraped_at: DateTime<Utc>,
}

impl<'a> ForwardEnvelope<'a> {
    pub fn new(workflow: &'a WorkflowRef, company: &'a CompanyInput, content: &'a FetchedContent) -> Self {
        Self {
            workflow_id: &workflow.id,
            company_id: &company.company_id,
            company_domain: &company.company_domain,
            company_name: &company.company_name,
            data: HomepageData {
                homepage_html: &content.html,
                scraped_at: content.fetched_at,
            },
        }
    }
}

/// POSTs fetched content to the storage worker. One call, no retry.
#[derive(Debug, Clone)]
pub struct StorageForwarder {
    client: Client,
    settings: ForwarderSettings,
}

impl StorageForwarder {
    pub fn new(settings: ForwarderSettings) -> Result<Self> {
        if settings.service_key.trim().is_empty() {
            return Err(EnrichKitError::config("service key is empty"));
        }

        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| EnrichKitError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, settings })
    }

    /// Forward one company's captured homepage.
    #[instrument(skip_all, fields(company_id = %company.company_id, workflow_id = %workflow.id))]
    pub async fn forward(
        &self,
        workflow: &WorkflowRef,
        company: &CompanyInput,
        content: &FetchedContent,
    ) -> Result<()> {
        let envelope = ForwardEnvelope::new(workflow, company, content);

        let response = self
            .client
            .post(self.settings.endpoint.clone())
            .header(API_KEY_HEADER, &self.settings.service_key)
            .bearer_auth(&self.settings.service_key)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| EnrichKitError::forward(None, e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "storage worker rejected payload");
            return Err(EnrichKitError::forward(
                Some(status.as_u16()),
                format!("storage worker returned HTTP {}: {}", status.as_u16(), body.trim()),
            ));
        }

        debug!(bytes = content.html.len(), "payload forwarded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use url::Url;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn forwarder(server: &MockServer) -> StorageForwarder {
        StorageForwarder::new(ForwarderSettings {
            endpoint: Url::parse(&format!("{}/store", server.uri())).unwrap(),
            service_key: "svc-key".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn company() -> CompanyInput {
        CompanyInput {
            company_id: "c-1".into(),
            company_name: "Acme".into(),
            company_domain: "acme.com".into(),
        }
    }

    fn workflow() -> WorkflowRef {
        WorkflowRef {
            id: "wf-1".into(),
            slug: "homepage-scrape".into(),
        }
    }

    fn content() -> FetchedContent {
        FetchedContent {
            url: "https://acme.com".into(),
            html: "<html>acme</html>".into(),
            fetched_at: Utc::now(),
            status_code: 200,
        }
    }

    #[test]
    fn envelope_shape() {
        let (w, c, f) = (workflow(), company(), content());
        let json = serde_json::to_value(ForwardEnvelope::new(&w, &c, &f)).unwrap();
        assert_eq!(json["workflow_id"], "wf-1");
        assert_eq!(json["company_name"], "Acme");
        assert_eq!(json["data"]["homepage_html"], "<html>acme</html>");
        assert!(json["data"]["scraped_at"].is_string());
        assert!(json.get("workflow_slug").is_none());
    }

    #[tokio::test]
    async fn forwards_with_both_credentials() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/store"))
            .and(header("apikey", "svc-key"))
            .and(header("authorization", "Bearer svc-key"))
            .and(body_partial_json(serde_json::json!({
                "workflow_id": "wf-1",
                "company_id": "c-1",
                "company_domain": "acme.com",
                "company_name": "Acme",
                "data": { "homepage_html": "<html>acme</html>" }
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        forwarder(&server)
            .forward(&workflow(), &company(), &content())
            .await
            .expect("forward");
    }

    #[tokio::test]
    async fn non_success_includes_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("table homepage_content missing"))
            .mount(&server)
            .await;

        let err = forwarder(&server)
            .forward(&workflow(), &company(), &content())
            .await
            .unwrap_err();

        assert_eq!(err.upstream_status(), Some(422));
        assert!(err.to_string().contains("table homepage_content missing"));
    }

    #[tokio::test]
    async fn transport_error_omits_endpoint_query() {
        let forwarder = StorageForwarder::new(ForwarderSettings {
            endpoint: Url::parse("http://127.0.0.1:9/store?token=SECRET-WORKER-TOKEN").unwrap(),
            service_key: "svc-key".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let err = forwarder
            .forward(&workflow(), &company(), &content())
            .await
            .unwrap_err();

        assert!(matches!(err, EnrichKitError::Forward { status: None, .. }));
        assert!(!err.to_string().contains("SECRET-WORKER-TOKEN"));
    }

    #[test]
    fn empty_service_key_is_config_error() {
        let err = StorageForwarder::new(ForwarderSettings {
            endpoint: Url::parse("https://store.example.com").unwrap(),
            service_key: String::new(),
            timeout: Duration::from_secs(5),
        })
        .unwrap_err();
        assert!(matches!(err, EnrichKitError::Config { .. }));
    }
}
