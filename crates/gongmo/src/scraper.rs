use crate::page::{PageSource, decode_html};
use crate::record::{extract_record, page_stock_name};
use crate::types::IpoRecord;

use ::scraper::Html;
use reqwest::Client;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Empty response for {0}")]
    EmptyPage(String),
    #[error("Page not found: {0}")]
    NotFound(String),
}

/// Where and how politely to crawl.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub base_url: String,
    /// Upper bound for one page load.
    pub timeout: Duration,
    /// Pause between two detail pages.
    pub delay: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: crate::BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            delay: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebScraper {
    client: Client,
    base_url: String,
}

impl WebScraper {
    pub fn new() -> Result<Self, ScraperError> {
        Self::with_config(&ScrapeConfig::default())
    }

    pub fn with_config(config: &ScrapeConfig) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches one detail page and extracts its record. Without `name` the
    /// name printed on the page is used.
    pub async fn fetch_record(
        &self,
        url_or_path: &str,
        name: Option<&str>,
    ) -> Result<IpoRecord, ScraperError> {
        let url = self.absolute_url(url_or_path);
        log::info!("Fetching detail page: {}", url);
        let html = self.get_html(&url).await?;

        let document = Html::parse_document(&html);
        let name = name.map_or_else(|| page_stock_name(&document), str::to_string);
        Ok(extract_record(&name, &url, &document))
    }

    fn absolute_url(&self, url_or_path: &str) -> String {
        if url_or_path.starts_with("http") {
            url_or_path.to_string()
        } else {
            format!("{}{}", self.base_url, url_or_path)
        }
    }

    async fn get_html(&self, url: &str) -> Result<String, ScraperError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ScraperError::NotFound(url.into()));
        }

        let response = response.error_for_status()?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .inspect_err(|e| log::error!("Body error: {e:?}"))?;
        let html = decode_html(&body, content_type.as_deref());

        if html.trim().is_empty() {
            return Err(ScraperError::EmptyPage(url.into()));
        }
        Ok(html)
    }
}

impl PageSource for WebScraper {
    async fn load(&self, url: &str) -> Result<String, ScraperError> {
        self.get_html(&self.absolute_url(url)).await
    }
}

/// Monthly IPO calendar page under `base_url`.
pub fn calendar_url(base_url: &str, year: i32, month: u32) -> String {
    format!(
        "{}/html/ipo/ipo_schedule.php?mode=goMonth&o=s&month={:02}&year={}",
        base_url.trim_end_matches('/'),
        month,
        year
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_url() {
        assert_eq!(
            calendar_url("https://www.38.co.kr/", 2025, 3),
            "https://www.38.co.kr/html/ipo/ipo_schedule.php?mode=goMonth&o=s&month=03&year=2025"
        );
    }

    #[test]
    fn test_with_config_normalizes_base_url() {
        let config = ScrapeConfig {
            base_url: "http://localhost:8080/".to_string(),
            ..ScrapeConfig::default()
        };
        let scraper = WebScraper::with_config(&config).unwrap();
        assert_eq!(scraper.base_url(), "http://localhost:8080");
        assert_eq!(
            scraper.absolute_url("/html/fund/?o=v&no=1"),
            "http://localhost:8080/html/fund/?o=v&no=1"
        );
        assert_eq!(
            scraper.absolute_url("https://www.38.co.kr/x"),
            "https://www.38.co.kr/x"
        );
    }

    #[test]
    fn test_default_config() {
        let config = ScrapeConfig::default();
        assert_eq!(config.base_url, "https://www.38.co.kr");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.delay, Duration::from_millis(300));
    }
}
