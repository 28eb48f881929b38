//! YAML configuration.
//!
//! Every key has a default, so running without a config file scrapes the
//! IESE Insight listing into `./articles.jsonl`. Secrets are never read from
//! this file; they come from CLI flags or their environment variables (see
//! [`crate::cli`]).
//!
//! ```yaml
//! site:
//!   base_url: https://www.iese.edu
//!   listing_path: /search/articles/
//!   max_pages: 4
//! batch_size: 10
//! detail_concurrency: 1
//! fetch:
//!   timeout_secs: 30
//!   retries: 0
//! store:
//!   kind: airtable
//!   base_id: appXXXXXXXXXXXXXX
//!   table: IESE Articles
//! digest:
//!   top_n: 5
//!   output_dir: ./digests
//! images:
//!   folder: Insight_Crop
//! ```

use crate::store::airtable::MAX_RECORDS_PER_REQUEST;
use serde::Deserialize;
use std::error::Error;
use std::path::PathBuf;
use tracing::{info, instrument};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    /// Records buffered before the sink flushes.
    pub batch_size: usize,
    /// Detail pages fetched concurrently within one listing page.
    pub detail_concurrency: usize,
    pub fetch: FetchConfig,
    pub store: StoreConfig,
    pub digest: DigestConfig,
    pub images: ImagesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    pub listing_path: String,
    pub max_pages: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Extra attempts for retryable failures; 0 aborts on the first one.
    pub retries: usize,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    Jsonl { path: PathBuf },
    Airtable { base_id: String, table: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub top_n: usize,
    /// Write each digest as an HTML file here.
    pub output_dir: Option<String>,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub folder: String,
}

fn default_smtp_port() -> u16 {
    587
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            batch_size: 10,
            detail_concurrency: 1,
            fetch: FetchConfig::default(),
            store: StoreConfig::default(),
            digest: DigestConfig::default(),
            images: ImagesConfig::default(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.iese.edu".to_string(),
            listing_path: "/search/articles/".to_string(),
            max_pages: 4,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            retries: 0,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Jsonl {
            path: PathBuf::from("articles.jsonl"),
        }
    }
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            output_dir: None,
            smtp: None,
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            folder: "Insight_Crop".to_string(),
        }
    }
}

impl SiteConfig {
    /// The site origin used to resolve root-relative links.
    pub fn origin(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.base_url)
    }

    /// URL of listing page `page` (1-based): the bare listing path for page 1,
    /// `{listing}{page}/` afterwards.
    pub fn listing_page_url(&self, page: u32) -> String {
        let base = self.base_url.trim_end_matches('/');
        let mut listing = self.listing_path.clone();
        if !listing.starts_with('/') {
            listing.insert(0, '/');
        }
        if !listing.ends_with('/') {
            listing.push('/');
        }
        if page <= 1 {
            format!("{base}{listing}")
        } else {
            format!("{base}{listing}{page}/")
        }
    }
}

impl Config {
    /// Parse a YAML document and validate it.
    pub fn from_yaml(yaml: &str) -> Result<Self, Box<dyn Error>> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or fall back to defaults when no path is given.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&str>) -> Result<Self, Box<dyn Error>> {
        match path {
            Some(path) => {
                let yaml = tokio::fs::read_to_string(path).await?;
                let config = Self::from_yaml(&yaml)?;
                info!(config_path = path, "Loaded configuration");
                Ok(config)
            }
            None => {
                info!("No config file given; using defaults");
                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<(), Box<dyn Error>> {
        if self.batch_size == 0 {
            return Err("batch_size must be at least 1".into());
        }
        if self.site.max_pages == 0 {
            return Err("site.max_pages must be at least 1".into());
        }
        if self.detail_concurrency == 0 {
            return Err("detail_concurrency must be at least 1".into());
        }
        // A batch is one append; Airtable can only take it atomically in one request.
        if matches!(self.store, StoreConfig::Airtable { .. })
            && self.batch_size > MAX_RECORDS_PER_REQUEST
        {
            return Err(format!(
                "batch_size {} exceeds the Airtable limit of {MAX_RECORDS_PER_REQUEST} records per write",
                self.batch_size
            )
            .into());
        }
        self.site.origin()?;
        Ok(())
    }
}
