/*!
 * IMSDb script archive client.
 *
 * The archive lists every script on one index page. Each entry links to a
 * detail page, which in turn links to the page holding the screenplay in a
 * `scrtext` element. Downloads are saved as HTML for the extractor.
 */

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::app_config::FetchConfig;

pub const BASE_URL: &str = "https://imsdb.com";

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static SEPARATOR_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").unwrap());
const LINKS: &str = "a[href]";
const SCRIPT_TEXT: &str = "pre.scrtext, td.scrtext";

/// One archive entry
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptLink {
    pub title: String,
    pub url: Url,
}

/// File name stem for a title: punctuation removed, separators dashed
pub fn safe_title(title: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(title, "");
    SEPARATOR_RUNS.replace_all(cleaned.trim(), "-").to_string()
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Entries on the all-scripts index page
pub fn parse_index(html: &str, base: &Url) -> Vec<ScriptLink> {
    let Some(links) = selector(LINKS) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    document
        .select(&links)
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            if !href.contains("/Movie Scripts/") {
                return None;
            }
            let title = link.text().collect::<String>().trim().to_string();
            if title.is_empty() {
                return None;
            }
            let url = base.join(href).ok()?;
            Some(ScriptLink { title, url })
        })
        .collect()
}

/// Link from a detail page to the script page
pub fn find_script_url(html: &str, base: &Url) -> Option<Url> {
    let links = selector(LINKS)?;
    let document = Html::parse_document(html);
    document
        .select(&links)
        .filter_map(|link| link.value().attr("href"))
        .find(|href| href.to_lowercase().contains("/scripts/"))
        .and_then(|href| base.join(href).ok())
}

/// Outer HTML of the screenplay element on a script page
pub fn extract_script_html(html: &str) -> Option<String> {
    let script_text = selector(SCRIPT_TEXT)?;
    let document = Html::parse_document(html);
    let element = document.select(&script_text).next()?;
    Some(element.html())
}

/// Titles matching `query` case-insensitively
pub fn search<'a>(links: &'a [ScriptLink], query: &str) -> impl Iterator<Item = &'a ScriptLink> {
    let query = query.to_lowercase();
    links.iter().filter(move |l| l.title.to_lowercase().contains(&query))
}

/// HTTP client for the archive
pub struct ImsdbClient {
    client: Client,
    base: Url,
    output_dir: PathBuf,
    delay: Duration,
}

impl ImsdbClient {
    pub fn new(config: &FetchConfig, output_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_base(config, output_dir, BASE_URL)
    }

    /// Client against another host serving the same layout
    pub fn with_base(config: &FetchConfig, output_dir: impl Into<PathBuf>, base: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_default();
        Ok(Self {
            client,
            base: Url::parse(base).with_context(|| format!("Invalid archive URL: {}", base))?,
            output_dir: output_dir.into(),
            delay: Duration::from_secs(1),
        })
    }

    /// Override the pause between requests
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn get(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;
        if !response.status().is_success() {
            return Err(anyhow!("{} returned {}", url, response.status()));
        }
        Ok(response.text().await?)
    }

    /// Every script listed on the index page
    pub async fn list_scripts(&self) -> Result<Vec<ScriptLink>> {
        info!("Fetching list of all scripts from IMSDb...");
        let index = self.base.join("/all-scripts.html")?;
        let links = parse_index(&self.get(&index).await?, &self.base);
        info!("Found {} scripts on IMSDb", links.len());
        Ok(links)
    }

    fn target_path(&self, title: &str) -> PathBuf {
        self.output_dir.join(format!("{}.html", safe_title(title)))
    }

    /// Download one script, skipping titles already on disk.
    /// `Ok(None)` means the archive had no script text for it.
    pub async fn download(&self, link: &ScriptLink) -> Result<Option<PathBuf>> {
        let path = self.target_path(&link.title);
        if path.exists() {
            info!("Script already exists: {}", link.title);
            return Ok(Some(path));
        }

        let detail = self.get(&link.url).await?;
        let Some(script_url) = find_script_url(&detail, &self.base) else {
            warn!("Could not find script URL for {}", link.title);
            return Ok(None);
        };
        tokio::time::sleep(self.delay).await;

        let page = self.get(&script_url).await?;
        let Some(content) = extract_script_html(&page) else {
            warn!("Could not find script content for {}", link.title);
            return Ok(None);
        };
        save(&path, &content).await?;
        info!("Saved script: {:?}", path);
        Ok(Some(path))
    }

    /// Download up to `limit` scripts in index order
    pub async fn download_all(&self, limit: Option<usize>) -> Result<Vec<PathBuf>> {
        let mut links = self.list_scripts().await?;
        if let Some(limit) = limit {
            links.truncate(limit);
        }

        let mut saved = Vec::new();
        for (i, link) in links.iter().enumerate() {
            info!("Processing {}/{}: {}", i + 1, links.len(), link.title);
            match self.download(link).await {
                Ok(Some(path)) => saved.push(path),
                Ok(None) => {}
                Err(e) => error!("Error downloading script {}: {}", link.title, e),
            }
            tokio::time::sleep(self.delay).await;
        }
        info!("Successfully scraped {} scripts", saved.len());
        Ok(saved)
    }

    /// Download the first script whose title contains `title`
    pub async fn download_by_title(&self, title: &str) -> Result<Option<PathBuf>> {
        let links = self.list_scripts().await?;
        match search(&links, title).next() {
            Some(link) => self.download(link).await,
            None => {
                warn!("Script not found: {}", title);
                Ok(None)
            }
        }
    }
}

async fn save(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {:?}", path))
}
