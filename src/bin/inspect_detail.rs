use anyhow::{bail, Result};
use url::Url;

use feed_sieve::config::Config;
use feed_sieve::models::{is_detail_page, normalize};
use feed_sieve::parsers::ContentClassifier;
use feed_sieve::utils::http::{create_client, fetch_with_timeout, HttpFetcher};

#[tokio::main]
async fn main() -> Result<()> {
    let Some(raw) = std::env::args().nth(1) else {
        bail!("usage: inspect_detail <detail-url>");
    };

    let config = Config::load()?;
    let origin = config.origin_url()?;

    let Some(url) = normalize(&raw, &origin) else {
        bail!("{} is not a valid URL", raw);
    };
    println!("Normalized: {}", url);
    println!("Detail page shape: {}", is_detail_page(&url));

    let fetcher = HttpFetcher::new(create_client(&config)?);
    let html = fetch_with_timeout(&fetcher, &Url::parse(url.as_str())?, config.fetch_timeout()).await?;
    println!("Fetched {} bytes", html.len());

    let report = ContentClassifier::from_config(&config)?.inspect(&html);
    println!("Container {:?} present: {}", config.content_selector, report.has_container);
    println!("Images inside container: {}", report.images_in_container);
    println!("Has visual content: {}", report.decision());

    Ok(())
}
