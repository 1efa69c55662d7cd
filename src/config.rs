use anyhow::{bail, Context, Result};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub origin: String,
    pub feed_url: String,
    pub feed_pages: u32,
    pub scroll_interval_ms: u64,
    pub card_selector: String,
    pub link_selector: String,
    pub content_selector: String,
    pub image_selector: String,
    pub max_concurrent_fetch: usize,
    pub fetch_timeout_secs: u64,
    pub cache_prefix: String,
    pub session_store: StoreKind,
    pub session_cookie: Option<String>,
    pub user_agent: String,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: "https://qiita.com".to_string(),
            feed_url: "https://qiita.com/timeline".to_string(),
            feed_pages: 3,
            scroll_interval_ms: 1500,
            card_selector: "article".to_string(),
            link_selector: "a[href*='/items/']".to_string(),
            content_selector: ".it-MdContent".to_string(),
            image_selector: "img".to_string(),
            max_concurrent_fetch: 3,
            fetch_timeout_secs: 10,
            cache_prefix: "qiita_has_img:".to_string(),
            session_store: StoreKind::Sqlite,
            session_cookie: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            log_json: false,
        }
    }
}

impl Config {
    /// Defaults, then `feed_sieve.toml` if present, then `FEED_SIEVE_*` variables.
    pub fn load() -> Result<Self> {
        let config: Config = config::Config::builder()
            .add_source(config::File::with_name("feed_sieve").required(false))
            .add_source(config::Environment::with_prefix("FEED_SIEVE").try_parsing(true))
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_fetch == 0 {
            bail!("max_concurrent_fetch must be at least 1");
        }
        if self.fetch_timeout_secs == 0 {
            bail!("fetch_timeout_secs must be at least 1");
        }

        let origin = self.origin_url()?;
        if origin.cannot_be_a_base() {
            bail!("origin {} cannot be used as a base URL", self.origin);
        }

        for selector in [
            &self.card_selector,
            &self.link_selector,
            &self.content_selector,
            &self.image_selector,
        ] {
            parse_selector(selector)?;
        }

        Ok(())
    }

    pub fn origin_url(&self) -> Result<Url> {
        Url::parse(&self.origin).with_context(|| format!("Invalid origin URL: {}", self.origin))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn scroll_interval(&self) -> Duration {
        Duration::from_millis(self.scroll_interval_ms)
    }
}

pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|_| anyhow::anyhow!("Failed to parse selector {:?}", selector))
}
