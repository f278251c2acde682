
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::config::WebConfig;
use crate::http::{agent_with_timeout, request_with_retry};

/// Elements whose text never belongs to the page content
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "nav", "header", "footer", "aside",
];

/// Readable content of a fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub title: Option<String>,
    pub language: Option<String>,
    /// Visible text, one text node per line
    pub text: String,
}

/// Blocking page fetcher. Pages are fetched once, without retries.
#[derive(Debug, Clone)]
pub struct WebClient {
    agent: ureq::Agent,
}

impl WebClient {
    #[inline]
    pub fn new(config: &WebConfig) -> Self {
        Self {
            agent: agent_with_timeout(
                Duration::from_secs(config.timeout_seconds),
                Some(&config.user_agent),
            ),
        }
    }

    /// Fetch the raw HTML of a page
    #[inline]
    pub fn fetch(&self, url: &Url) -> Result<String> {
        debug!("Making HTTP GET request to: {}", url);

        let body = request_with_retry(url.as_str(), 1, || {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .with_context(|| format!("Failed to fetch {url}"))?;

        debug!("Successfully read {} bytes from {}", body.len(), url);
        Ok(body)
    }

    /// Fetch a page and extract its readable content
    #[inline]
    pub fn load(&self, url: &str) -> Result<ExtractedPage> {
        let url = validate_url(url)?;
        let html = self.fetch(&url)?;
        Ok(extract_page(&html))
    }
}

/// Validate that a URL is absolute http(s) with a host
#[inline]
pub fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str).with_context(|| format!("Invalid URL format: {url_str}"))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(anyhow!("URL must use HTTP or HTTPS scheme: {url_str}"));
    }

    if url.host_str().is_none() {
        return Err(anyhow!("URL must have a valid host: {url_str}"));
    }

    Ok(url)
}

/// Pull title, language and visible text out of an HTML document
#[inline]
pub fn extract_page(html: &str) -> ExtractedPage {
    let document = Html::parse_document(html);

    let title_selector = Selector::parse("title").expect("valid selector");
    let html_selector = Selector::parse("html").expect("valid selector");
    let main_content_selector = Selector::parse("main, article").expect("valid selector");
    let body_selector = Selector::parse("body").expect("valid selector");

    let title = document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty());

    let language = document
        .select(&html_selector)
        .next()
        .and_then(|element| element.value().attr("lang"))
        .map(|lang| lang.trim().to_string())
        .filter(|lang| !lang.is_empty());

    let root = document
        .select(&main_content_selector)
        .next()
        .or_else(|| document.select(&body_selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut lines = Vec::new();
    collect_text(root, &mut lines);

    debug!(
        "Extracted page: title={:?}, {} text nodes",
        title,
        lines.len()
    );

    ExtractedPage {
        title,
        language,
        text: lines.join("\n"),
    }
}

fn collect_text(element: ElementRef<'_>, lines: &mut Vec<String>) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            if !SKIPPED_TAGS.contains(&child_element.value().name()) {
                collect_text(child_element, lines);
            }
        } else if let Some(text) = child.value().as_text() {
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
    }
}
