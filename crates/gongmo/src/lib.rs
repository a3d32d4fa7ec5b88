pub mod calendar;
pub mod columns;
pub mod crawler;
pub mod export;
pub mod grid;
pub mod locate;
pub mod page;
pub mod record;
pub mod scraper;
pub mod text;
pub mod types;
pub mod utils;

pub use crate::crawler::Crawler;
pub use crate::scraper::{ScrapeConfig, ScraperError, WebScraper};

pub(crate) const BASE_URL: &str = "https://www.38.co.kr";
