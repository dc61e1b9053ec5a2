//! Rendering-proxy client.
//!
//! Each call issues exactly one GET to the proxy, asking it to render
//! `https://{domain}` with JavaScript through the premium pool of the
//! configured country. There are no retries.

use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{debug, instrument, warn};
use url::Url;

use enrichkit_shared::{EnrichKitError, ProxySettings, Result};

/// User-Agent string for proxy requests.
const USER_AGENT: &str = concat!("enrichkit/", env!("CARGO_PKG_VERSION"));

/// How much of an error body is kept in the fetch error message.
const ERROR_BODY_PREVIEW: usize = 200;

// ---------------------------------------------------------------------------
// FetchedContent
// ---------------------------------------------------------------------------

/// A homepage captured through the proxy.
#[derive(Debug, Clone)]
pub struct FetchedContent {
    /// Target URL that was rendered.
    pub url: String,
    /// Raw response body, passed through untouched.
    pub html: String,
    /// When the capture completed.
    pub fetched_at: DateTime<Utc>,
    /// HTTP status returned by the proxy.
    pub status_code: u16,
}

// ---------------------------------------------------------------------------
// ProxyFetcher
// ---------------------------------------------------------------------------

/// Fetches company homepages through the rendering proxy.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ProxyFetcher {
    client: Client,
    settings: ProxySettings,
}

impl ProxyFetcher {
    /// Create a fetcher. Fails with a config error if the API key is empty.
    pub fn new(settings: ProxySettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(EnrichKitError::config("scraping proxy API key is empty"));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| EnrichKitError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, settings })
    }

    /// Fetch the homepage of `domain`.
    #[instrument(skip(self), fields(domain = %domain))]
    pub async fn fetch(&self, domain: &str) -> Result<FetchedContent> {
        let target = target_url(domain);
        let request_url = self.request_url(&target);

        debug!(%target, "requesting homepage through proxy");

        let response = self
            .client
            .get(request_url)
            .send()
            .await
            .map_err(|e| EnrichKitError::fetch(None, format!("{target}: {}", e.without_url())))?;

        let status = response.status();
        let status_code = status.as_u16();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%target, status_code, "proxy returned non-success status");
            return Err(EnrichKitError::fetch(
                Some(status_code),
                error_message(status_code, &body),
            ));
        }

        let html = response.text().await.map_err(|e| {
            EnrichKitError::fetch(
                Some(status_code),
                format!("{target}: body read failed: {}", e.without_url()),
            )
        })?;

        debug!(%target, bytes = html.len(), "homepage captured");

        Ok(FetchedContent {
            url: target,
            html,
            fetched_at: Utc::now(),
            status_code,
        })
    }

    /// Build the proxy request URL for `target`.
    fn request_url(&self, target: &str) -> Url {
        let mut url = self.settings.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("api_key", &self.settings.api_key)
                .append_pair("url", target)
                .append_pair("render_js", bool_param(self.settings.render_js))
                .append_pair("premium_proxy", bool_param(self.settings.premium_proxy));
            if !self.settings.country_code.is_empty() {
                query.append_pair("country_code", &self.settings.country_code);
            }
        }
        url
    }
}

/// Build the HTTPS homepage URL for a bare domain.
///
/// Tolerates a scheme prefix, surrounding whitespace, and a trailing slash.
pub fn target_url(domain: &str) -> String {
    let host = domain
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    format!("https://{host}")
}

fn bool_param(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

fn error_message(status_code: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return format!("proxy returned HTTP {status_code}");
    }
    let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
    format!("proxy returned HTTP {status_code}: {preview}")
}
