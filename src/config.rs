//! CLI + environment configuration.
//!
//! Every flag can also be set via a `CRAWLER_*` environment variable;
//! clap's own precedence gives an explicit CLI flag priority over the
//! environment variable of the same name. `Config::from_cli` then runs the
//! post-parse sanity checks (positivity, non-empty strings) that clap's
//! type system can't express on its own.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max-count must be positive, got {0}")]
    MaxCountNotPositive(usize),
    #[error("max-concurrent must be positive, got {0}")]
    MaxConcurrentNotPositive(usize),
    #[error("start-url is not a valid URL: {0}")]
    InvalidStartUrl(#[from] url::ParseError),
    #[error("timeout must be positive")]
    TimeoutNotPositive,
    #[error("output-dir cannot be empty")]
    OutputDirEmpty,
}

/// Raw command-line/environment arguments, parsed by `clap`.
#[derive(Debug, Parser)]
#[command(
    name = "webmirror",
    about = "Crawls a website and saves a browsable offline mirror of it."
)]
pub struct Cli {
    /// Maximum number of pages to crawl.
    #[arg(long, env = "CRAWLER_MAX_COUNT", default_value_t = 100)]
    pub max_count: usize,

    /// Maximum number of concurrent workers per pipeline stage.
    #[arg(long, env = "CRAWLER_MAX_CONCURRENT", default_value_t = 10)]
    pub max_concurrent: usize,

    /// Starting URL for crawling.
    #[arg(long, env = "CRAWLER_START_URL")]
    pub start_url: String,

    /// HTTP request timeout.
    #[arg(long, env = "CRAWLER_TIMEOUT", default_value = "30s")]
    pub timeout: humantime::Duration,

    /// Number of retry attempts for failed requests.
    #[arg(long, env = "CRAWLER_RETRY_ATTEMPTS", default_value_t = 3)]
    pub retry_attempts: u32,

    /// Delay between retry attempts.
    #[arg(long, env = "CRAWLER_RETRY_DELAY", default_value = "1s")]
    pub retry_delay: humantime::Duration,

    /// Directory to save the crawled mirror into.
    #[arg(long, env = "CRAWLER_OUTPUT_DIR", default_value = "./.tmp/")]
    pub output_dir: PathBuf,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "CRAWLER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Validated, ready-to-use configuration. Threaded explicitly through the
/// coordinator and pipeline stages rather than read from a global.
#[derive(Debug, Clone)]
pub struct Config {
    pub max_count: usize,
    pub max_concurrent: usize,
    pub start_url: Url,
    pub timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub output_dir: PathBuf,
    pub log_level: String,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        if cli.max_count == 0 {
            return Err(ConfigError::MaxCountNotPositive(cli.max_count));
        }
        if cli.max_concurrent == 0 {
            return Err(ConfigError::MaxConcurrentNotPositive(cli.max_concurrent));
        }
        let start_url = Url::parse(&cli.start_url)?;
        if cli.timeout.is_zero() {
            return Err(ConfigError::TimeoutNotPositive);
        }
        if cli.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::OutputDirEmpty);
        }

        Ok(Self {
            max_count: cli.max_count,
            max_concurrent: cli.max_concurrent,
            start_url,
            timeout: cli.timeout.into(),
            retry_attempts: cli.retry_attempts,
            retry_delay: cli.retry_delay.into(),
            output_dir: cli.output_dir,
            log_level: cli.log_level,
        })
    }
}
