use anyhow::Result;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use url::Url;

use feed_sieve::config::Config;
use feed_sieve::controller::ScanController;
use feed_sieve::feed::{FeedSnapshot, HtmlFeed};
use feed_sieve::observer::spawn_rescan_trigger;
use feed_sieve::parsers::ContentClassifier;
use feed_sieve::queue::FetchQueue;
use feed_sieve::storage::open_session_store;
use feed_sieve::utils::http::{create_client, fetch_with_timeout, HtmlFetcher, HttpFetcher};
use feed_sieve::DecisionCache;

#[derive(Serialize)]
struct Report {
    generated_at: DateTime<Local>,
    feed_url: String,
    #[serde(flatten)]
    cards: FeedSnapshot,
}

fn init_logging(json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("feed_sieve=info".parse()?);

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

fn page_url(feed_url: &Url, page: u32) -> Url {
    let mut url = feed_url.clone();
    if page > 1 {
        url.query_pairs_mut().append_pair("page", &page.to_string());
    }
    url
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_logging(config.log_json)?;

    info!("Starting Feed Sieve");

    let origin = config.origin_url()?;
    let feed_url = Url::parse(&config.feed_url)?;

    let store = open_session_store(config.session_store)?;
    let cache = Arc::new(DecisionCache::new(Arc::from(store), config.cache_prefix.clone()));
    let classifier = Arc::new(ContentClassifier::from_config(&config)?);
    let fetcher: Arc<dyn HtmlFetcher> = Arc::new(HttpFetcher::new(create_client(&config)?));
    let feed = Arc::new(HtmlFeed::from_config(&config)?);
    let queue = FetchQueue::new(config.max_concurrent_fetch);

    let controller = Arc::new(ScanController::new(
        feed.clone(),
        fetcher.clone(),
        cache,
        classifier,
        queue.clone(),
        origin,
        config.fetch_timeout(),
    ));

    let trigger = spawn_rescan_trigger(controller.clone(), feed.subscribe());
    controller.scan();

    for page in 1..=config.feed_pages {
        let url = page_url(&feed_url, page);
        info!("Loading feed page {} ({})", page, url);

        match fetch_with_timeout(fetcher.as_ref(), &url, config.fetch_timeout()).await {
            Ok(html) => {
                let added = feed.append_html(&html);
                info!("Page {} rendered {} cards", page, added);
            }
            Err(e) => error!("Failed to load feed page {}: {}", page, e),
        }

        tokio::time::sleep(config.scroll_interval()).await;
    }

    // Catch anything the trigger has not rescanned yet before draining.
    controller.scan();
    queue.wait_idle().await;
    trigger.abort();

    let report = Report {
        generated_at: Local::now(),
        feed_url: config.feed_url.clone(),
        cards: feed.snapshot(),
    };
    info!(
        "Done: {} cards visible, {} hidden",
        report.cards.visible.len(),
        report.cards.hidden.len()
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_keeps_feed_url() {
        let feed = Url::parse("https://qiita.com/timeline").unwrap();
        assert_eq!(page_url(&feed, 1).as_str(), "https://qiita.com/timeline");
        assert_eq!(page_url(&feed, 3).as_str(), "https://qiita.com/timeline?page=3");
    }
}
