use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use gongmo::export::{self, ExportError};
use gongmo::types::IpoRecord;
use gongmo::utils::DateWindow;
use gongmo::{Crawler, ScrapeConfig, WebScraper};
use log::LevelFilter;
use tokio_util::sync::CancellationToken;

const BASE_URL_ENV: &str = "GONGMO_BASE_URL";

#[derive(Parser)]
#[command(name = "gongmo")]
#[command(about = "A 38.co.kr IPO listing scraper", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[arg(
        long,
        default_value_t = 30,
        global = true,
        help = "Timeout for a single page load, in seconds"
    )]
    timeout_secs: u64,

    #[arg(
        long,
        default_value_t = 300,
        global = true,
        help = "Pause between two detail pages, in milliseconds"
    )]
    delay_ms: u64,

    #[arg(
        long,
        default_value = "output",
        global = true,
        help = "Directory export files are written to"
    )]
    output_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List the new listings on one month of the IPO calendar
    List {
        #[arg(long, help = "Calendar year")]
        year: i32,

        #[arg(
            long,
            help = "Calendar month",
            value_parser = clap::value_parser!(u32).range(1..=12)
        )]
        month: u32,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Extract the record of a single IPO detail page
    Detail {
        #[arg(help = "URL or path of the detail page to fetch")]
        url: String,

        #[arg(long, help = "Name to record instead of the one printed on the page")]
        name: Option<String>,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Crawl every listing from January 1st of a year up to yesterday
    Full {
        #[arg(long, help = "First calendar year to crawl")]
        start_year: i32,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "csv",
            help = "Export format; CSV exports are merged into the existing file"
        )]
        format: ExportFormat,
    },
    /// Crawl the listings of a day and the days right after it, merging them into the CSV export
    Daily {
        #[arg(
            long,
            value_name = "YYYY-MM-DD",
            help = "First day to crawl (defaults to today)",
            value_parser = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| e.to_string()),
        )]
        date: Option<NaiveDate>,

        #[arg(long, default_value_t = 3, help = "Number of days after the first day to include")]
        days_ahead: u64,
    },
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

/// Cancels `token` on the first interrupt. Returns `true` once a second
/// interrupt arrives, `false` if listening fails.
async fn await_forced_quit<F, Fut>(mut interrupt: F, token: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if interrupt().await.is_err() {
        return false;
    }
    log::warn!("Interrupted, stopping after the current record (Ctrl-C again to quit)...");
    token.cancel();

    interrupt().await.is_ok()
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if await_forced_quit(tokio::signal::ctrl_c, token).await {
            log::error!("Interrupted again, exiting without export");
            process::exit(130);
        }
    });
    cancel
}

fn write_export(
    records: Vec<IpoRecord>,
    dir: &Path,
    format: ExportFormat,
) -> Result<(), ExportError> {
    if records.is_empty() {
        log::info!("No records collected, nothing to export");
        return Ok(());
    }

    match format {
        ExportFormat::Csv => {
            let path = export::default_path(dir, "csv");
            let total = export::merge_csv(&path, records)?;
            println!("{} now holds {} record(s)", path.display(), total);
        }
        ExportFormat::Json => {
            let path = export::default_path(dir, "json");
            export::write_json(&path, &records)?;
            println!("Wrote {} record(s) to {}", records.len(), path.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    let config = ScrapeConfig {
        base_url: std::env::var(BASE_URL_ENV)
            .unwrap_or_else(|_| ScrapeConfig::default().base_url),
        timeout: Duration::from_secs(cli.timeout_secs),
        delay: Duration::from_millis(cli.delay_ms),
    };

    let scraper = WebScraper::with_config(&config).unwrap_or_else(|e| {
        log::error!("Error creating scraper: {}", e);
        process::exit(1);
    });

    match cli.command {
        Commands::List {
            year,
            month,
            format,
        } => {
            let window = DateWindow::month(year, month).unwrap_or_else(|e| {
                log::error!("Invalid args: {e}");
                process::exit(1);
            });

            let crawler = Crawler::new(scraper, &config, CancellationToken::new());
            let discovery = crawler.discover(&window).await;

            match format {
                OutputFormat::Json => serialize_json(&discovery),
                OutputFormat::Text => {
                    if discovery.listings.is_empty() {
                        println!("No entries to display.");
                    } else {
                        for (i, listing) in discovery.listings.iter().enumerate() {
                            println!("{:>3}. {}", i + 1, listing);
                        }
                    }
                    println!("\nSPACs filtered: {}", discovery.spacs_filtered);
                }
            }
        }

        Commands::Detail { url, name, format } => {
            let record = scraper
                .fetch_record(&url, name.as_deref())
                .await
                .unwrap_or_else(|e| {
                    log::error!("Error fetching detail page: {}", e);
                    process::exit(1);
                });

            match format {
                OutputFormat::Json => serialize_json(&record),
                OutputFormat::Text => println!("{}", record),
            }
        }

        Commands::Full { start_year, format } => {
            let today = Local::now().date_naive();
            let window = DateWindow::full(start_year, today).unwrap_or_else(|e| {
                log::error!("Invalid args: {e}");
                process::exit(1);
            });
            log::info!("Full crawl over {}", window);

            let crawler = Crawler::new(scraper, &config, cancel_on_ctrl_c());
            let records = crawler.crawl(&window).await;

            write_export(records, &cli.output_dir, format).unwrap_or_else(|e| {
                log::error!("Error exporting records: {}", e);
                process::exit(1);
            });
        }

        Commands::Daily { date, days_ahead } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let window = DateWindow::daily(date, days_ahead).unwrap_or_else(|e| {
                log::error!("Invalid args: {e}");
                process::exit(1);
            });
            log::info!("Daily update over {}", window);

            let crawler = Crawler::new(scraper, &config, cancel_on_ctrl_c());
            let records = crawler.crawl(&window).await;

            write_export(records, &cli.output_dir, ExportFormat::Csv).unwrap_or_else(|e| {
                log::error!("Error exporting records: {}", e);
                process::exit(1);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::ready;
    use std::io;

    #[tokio::test]
    async fn test_second_interrupt_forces_quit() {
        let token = CancellationToken::new();
        let forced = await_forced_quit(|| ready(Ok::<(), io::Error>(())), token.clone()).await;
        assert!(forced);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_first_interrupt_only_cancels() {
        let token = CancellationToken::new();
        let mut calls = 0;
        let forced = await_forced_quit(
            || {
                calls += 1;
                ready(if calls == 1 {
                    Ok(())
                } else {
                    Err(io::Error::other("signal stream closed"))
                })
            },
            token.clone(),
        )
        .await;
        assert!(!forced);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_failed_listener_leaves_crawl_running() {
        let token = CancellationToken::new();
        let forced = await_forced_quit(
            || ready(Err::<(), _>(io::Error::other("no signal handler"))),
            token.clone(),
        )
        .await;
        assert!(!forced);
        assert!(!token.is_cancelled());
    }
}
