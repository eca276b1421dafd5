/*!
 * Remote page fetching.
 *
 * Pages are fetched over plain HTTP first. When the body asks for JavaScript,
 * or the host is known to render client-side, the page is rendered by a
 * headless browser and the serialized DOM is used instead.
 */

use std::time::Duration;

use log::{info, warn};
use reqwest::{Client, header};
use url::Url;

use crate::app_config::FetchConfig;
use crate::errors::ExtractionError;
use crate::extraction::tools::run_tool;

/// Selectors that show a rendered page actually carries content
const CONTENT_MARKERS: &[&str] = &["mw-parser-output", "mw-content-text", "id=\"content\"", "<main"];

/// Virtual time given to the browser on the first render attempt
const FIRST_RENDER_BUDGET_MS: u64 = 2000;

/// A fetched page and how it was obtained
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: Url,
    pub html: String,
    /// Whether the headless browser produced the body
    pub rendered: bool,
}

impl FetchedPage {
    /// Whether the page looks like a MediaWiki/Fandom article
    pub fn is_wiki(&self, config: &FetchConfig) -> bool {
        is_dynamic_host(&self.url, &config.dynamic_hosts) || self.html.contains("mw-parser-output")
    }
}

/// Whether a response body asks the client to run JavaScript
pub fn requires_javascript(body: &str, markers: &[String]) -> bool {
    markers.iter().any(|marker| body.contains(marker.as_str()))
}

/// Whether `url` is on (or under) one of the dynamic-rendering hosts
pub fn is_dynamic_host(url: &Url, hosts: &[String]) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    hosts.iter().any(|h| host == *h || host.ends_with(&format!(".{}", h)))
}

fn has_content_marker(html: &str) -> bool {
    CONTENT_MARKERS.iter().any(|m| html.contains(m))
}

/// HTTP fetcher with headless-browser fallback
pub struct PageFetcher {
    client: Client,
    config: FetchConfig,
}

impl PageFetcher {
    pub fn new(config: FetchConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch `url`, rendering it in the browser when needed
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, ExtractionError> {
        let parsed = Url::parse(url).map_err(|e| ExtractionError::Fetch(format!("invalid URL {}: {}", url, e)))?;

        if is_dynamic_host(&parsed, &self.config.dynamic_hosts) {
            info!("{} is rendered client-side, using headless browser", parsed);
            let html = self.render(&parsed).await?;
            return Ok(FetchedPage { url: parsed, html, rendered: true });
        }

        let body = self.fetch_plain(&parsed).await?;
        if !requires_javascript(&body, &self.config.js_markers) {
            return Ok(FetchedPage { url: parsed, html: body, rendered: false });
        }

        info!("Page requires JavaScript, falling back to browser rendering");
        match self.render(&parsed).await {
            Ok(html) => Ok(FetchedPage { url: parsed, html, rendered: true }),
            Err(e) => {
                warn!("Browser rendering failed ({}), keeping plain response", e);
                Ok(FetchedPage { url: parsed, html: body, rendered: false })
            }
        }
    }

    /// Plain HTTP GET
    pub async fn fetch_plain(&self, url: &Url) -> Result<String, ExtractionError> {
        let response = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await
            .map_err(|e| ExtractionError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::Fetch(format!("{} returned HTTP {}", url, status.as_u16())));
        }
        let body = response.text().await.map_err(|e| ExtractionError::Fetch(e.to_string()))?;
        info!("Fetched {} characters from {}", body.len(), url);
        Ok(body)
    }

    /// Render in the headless browser. A short render that shows no content
    /// container is retried once with the full wait budget.
    pub async fn render(&self, url: &Url) -> Result<String, ExtractionError> {
        let first = self.dump_dom(url, FIRST_RENDER_BUDGET_MS).await?;
        if has_content_marker(&first) || self.config.browser_wait_ms <= FIRST_RENDER_BUDGET_MS {
            return Ok(first);
        }
        match self.dump_dom(url, self.config.browser_wait_ms).await {
            Ok(html) => Ok(html),
            Err(e) => {
                warn!("Extended render of {} failed: {}", url, e);
                Ok(first)
            }
        }
    }

    async fn dump_dom(&self, url: &Url, budget_ms: u64) -> Result<String, ExtractionError> {
        let args = [
            "--headless".to_string(),
            "--disable-gpu".to_string(),
            "--no-sandbox".to_string(),
            "--dump-dom".to_string(),
            format!("--virtual-time-budget={}", budget_ms),
            url.to_string(),
        ];
        let timeout = self.config.timeout_secs + budget_ms / 1000;
        let output = run_tool(&self.config.browser_command, &args, timeout).await?;
        let html = String::from_utf8_lossy(&output.stdout).into_owned();
        info!("Fetched {} characters from {} (browser)", html.len(), url);
        Ok(html)
    }
}
