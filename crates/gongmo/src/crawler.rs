//! Sequential crawl: calendar discovery, then one detail page at a time.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::calendar::parse_calendar;
use crate::page::PageSource;
use crate::record::assemble_record;
use crate::scraper::{ScrapeConfig, calendar_url};
use crate::types::{Discovery, IpoRecord, Listing};
use crate::utils::DateWindow;

pub struct Crawler<S> {
    source: S,
    base_url: String,
    delay: Duration,
    cancel: CancellationToken,
}

impl<S: PageSource> Crawler<S> {
    pub fn new(source: S, config: &ScrapeConfig, cancel: CancellationToken) -> Self {
        Self {
            source,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            delay: config.delay,
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Scans every calendar month the window touches. A month that fails to
    /// load is logged and skipped.
    pub async fn discover(&self, window: &DateWindow) -> Discovery {
        let mut discovery = Discovery::default();

        for (year, month) in window.months() {
            if self.is_cancelled() {
                log::warn!("Discovery cancelled before {}-{:02}", year, month);
                break;
            }

            let url = calendar_url(&self.base_url, year, month);
            log::info!("Scanning calendar {}-{:02}...", year, month);
            match self.source.load(&url).await {
                Ok(html) => {
                    discovery.extend(parse_calendar(&html, year, month, window, &self.base_url))
                }
                Err(e) => log::warn!("Skipping calendar {}-{:02}: {}", year, month, e),
            }
        }

        log::info!(
            "Discovered {} listing(s) in {} ({} SPAC(s) filtered)",
            discovery.listings.len(),
            window,
            discovery.spacs_filtered
        );
        discovery
    }

    /// Extracts one record per listing, in order.
    ///
    /// A page that fails to load costs only its own record. On cancellation the
    /// records finished so far are returned.
    pub async fn collect(&self, listings: &[Listing]) -> Vec<IpoRecord> {
        let mut records = Vec::with_capacity(listings.len());

        for (i, listing) in listings.iter().enumerate() {
            if self.is_cancelled() {
                log::warn!(
                    "Crawl cancelled, keeping {} of {} record(s)",
                    records.len(),
                    listings.len()
                );
                break;
            }

            log::info!("[{}/{}] {}", i + 1, listings.len(), listing.name);
            match self.source.load(&listing.url).await {
                Ok(html) => records.push(assemble_record(&listing.name, &listing.url, &html)),
                Err(e) => log::warn!("Skipping {} ({}): {}", listing.name, listing.url, e),
            }

            if i + 1 < listings.len() && !self.delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }
        }

        records
    }

    /// Discovery followed by extraction over the same window.
    pub async fn crawl(&self, window: &DateWindow) -> Vec<IpoRecord> {
        let discovery = self.discover(window).await;
        self.collect(&discovery.listings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::ScraperError;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::fs;

    const BASE: &str = "https://www.38.co.kr";

    struct MemorySource {
        pages: HashMap<String, String>,
        cancel_on: Option<(String, CancellationToken)>,
    }

    impl MemorySource {
        fn new(pages: &[(&str, String)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, html)| (url.to_string(), html.clone()))
                    .collect(),
                cancel_on: None,
            }
        }
    }

    impl PageSource for MemorySource {
        async fn load(&self, url: &str) -> Result<String, ScraperError> {
            if let Some((trigger, token)) = &self.cancel_on
                && trigger == url
            {
                token.cancel();
            }
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| ScraperError::NotFound(url.to_string()))
        }
    }

    fn config() -> ScrapeConfig {
        ScrapeConfig {
            delay: Duration::ZERO,
            ..ScrapeConfig::default()
        }
    }

    fn listing(name: &str, no: u32) -> Listing {
        Listing {
            name: name.to_string(),
            url: format!("{BASE}/html/fund/?o=v&no={no}"),
            date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
        }
    }

    fn detail_page() -> String {
        fs::read_to_string("fixtures/detail_title_sibling.html").expect("Failed to read fixture")
    }

    #[tokio::test]
    async fn test_navigation_failure_skips_only_that_listing() {
        let listings = [listing("가", 1), listing("나", 2), listing("다", 3)];
        let source = MemorySource::new(&[
            (listings[0].url.as_str(), detail_page()),
            (listings[2].url.as_str(), detail_page()),
        ]);
        let crawler = Crawler::new(source, &config(), CancellationToken::new());

        let records = crawler.collect(&listings).await;
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["가", "다"]);
        assert_eq!(records[1].url, listings[2].url);
        assert_eq!(records[1].competition_rate, "1235:1");
    }

    #[tokio::test]
    async fn test_cancellation_keeps_finished_records() {
        let listings = [listing("가", 1), listing("나", 2), listing("다", 3)];
        let token = CancellationToken::new();
        let mut source = MemorySource::new(&[
            (listings[0].url.as_str(), detail_page()),
            (listings[1].url.as_str(), detail_page()),
            (listings[2].url.as_str(), detail_page()),
        ]);
        source.cancel_on = Some((listings[1].url.clone(), token.clone()));

        let crawler = Crawler::new(source, &config(), token);
        let records = crawler.collect(&listings).await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "나");
        assert!(crawler.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_collects_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let crawler = Crawler::new(MemorySource::new(&[]), &config(), token);
        assert!(crawler.collect(&[listing("가", 1)]).await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_delay() {
        let token = CancellationToken::new();
        let mut source = MemorySource::new(&[(
            listing("가", 1).url.as_str(),
            detail_page(),
        )]);
        source.cancel_on = Some((listing("가", 1).url, token.clone()));
        let slow = ScrapeConfig {
            delay: Duration::from_secs(3600),
            ..ScrapeConfig::default()
        };
        let crawler = Crawler::new(source, &slow, token);

        let records = tokio::time::timeout(
            Duration::from_secs(5),
            crawler.collect(&[listing("가", 1), listing("나", 2)]),
        )
        .await
        .expect("delay was not interrupted");
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_discover_skips_failed_month() {
        let window = DateWindow::new(
            NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
        );
        let calendar =
            fs::read_to_string("fixtures/calendar_2025_03.html").expect("Failed to read fixture");
        let source = MemorySource::new(&[(calendar_url(BASE, 2025, 3).as_str(), calendar)]);
        let crawler = Crawler::new(source, &config(), CancellationToken::new());

        let discovery = crawler.discover(&window).await;
        assert_eq!(discovery.listings.len(), 3);
        assert_eq!(discovery.spacs_filtered, 1);
    }

    #[tokio::test]
    async fn test_crawl_end_to_end() {
        let window = DateWindow::daily(NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(), 0).unwrap();
        let calendar =
            fs::read_to_string("fixtures/calendar_2025_03.html").expect("Failed to read fixture");
        let source = MemorySource::new(&[
            (calendar_url(BASE, 2025, 3).as_str(), calendar),
            ("https://www.38.co.kr/html/fund/?o=v&no=2101&l=&page=1", detail_page()),
        ]);
        let crawler = Crawler::new(source, &config(), CancellationToken::new());

        let records = crawler.crawl(&window).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "한빛소프트");
        assert_eq!(records[0].tradable_shares_count, "900,000주");
    }
}
