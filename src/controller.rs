use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::DecisionCache;
use crate::feed::Feed;
use crate::models::{is_detail_page, normalize, Card, CardId, NormalizedUrl};
use crate::parsers::ContentClassifier;
use crate::queue::FetchQueue;
use crate::utils::http::{fetch_with_timeout, HtmlFetcher};

/// What a single scan decided for one card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardOutcome {
    AlreadyProcessed,
    NoLink,
    NotDetailPage,
    HiddenFromCache,
    VisibleFromCache,
    Queued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanSummary {
    pub already_processed: usize,
    pub skipped: usize,
    pub hidden: usize,
    pub kept: usize,
    pub queued: usize,
}

impl ScanSummary {
    fn record(&mut self, outcome: CardOutcome) {
        match outcome {
            CardOutcome::AlreadyProcessed => self.already_processed += 1,
            CardOutcome::NoLink | CardOutcome::NotDetailPage => self.skipped += 1,
            CardOutcome::HiddenFromCache => self.hidden += 1,
            CardOutcome::VisibleFromCache => self.kept += 1,
            CardOutcome::Queued => self.queued += 1,
        }
    }
}

/// Shared pieces a fetch job needs after the scan that queued it has returned.
#[derive(Clone)]
struct JobContext {
    feed: Arc<dyn Feed>,
    fetcher: Arc<dyn HtmlFetcher>,
    cache: Arc<DecisionCache>,
    classifier: Arc<ContentClassifier>,
    timeout: Duration,
}

pub struct ScanController {
    ctx: JobContext,
    queue: FetchQueue,
    origin: Url,
    // Handles only, so cards that leave the page are not kept alive here.
    processed: Mutex<HashSet<CardId>>,
}

impl ScanController {
    pub fn new(
        feed: Arc<dyn Feed>,
        fetcher: Arc<dyn HtmlFetcher>,
        cache: Arc<DecisionCache>,
        classifier: Arc<ContentClassifier>,
        queue: FetchQueue,
        origin: Url,
        timeout: Duration,
    ) -> Self {
        Self {
            ctx: JobContext {
                feed,
                fetcher,
                cache,
                classifier,
                timeout,
            },
            queue,
            origin,
            processed: Mutex::new(HashSet::new()),
        }
    }

    pub fn queue(&self) -> &FetchQueue {
        &self.queue
    }

    /// Look at every card on the page. Never waits on fetches, so it can run any time.
    pub fn scan(&self) -> ScanSummary {
        let mut summary = ScanSummary::default();
        for card in self.ctx.feed.cards() {
            summary.record(self.scan_card(&card));
        }

        debug!(
            "Scan: {} queued, {} hidden from cache, {} kept from cache, {} skipped, {} already processed",
            summary.queued, summary.hidden, summary.kept, summary.skipped, summary.already_processed
        );
        summary
    }

    pub fn scan_card(&self, card: &Card) -> CardOutcome {
        if !self.mark_processed(card.id) {
            return CardOutcome::AlreadyProcessed;
        }

        let Some(link) = card.link.as_deref() else {
            return CardOutcome::NoLink;
        };

        let url = match normalize(link, &self.origin) {
            Some(url) if is_detail_page(&url) => url,
            _ => return CardOutcome::NotDetailPage,
        };

        match self.ctx.cache.get(&url) {
            Some(false) => {
                self.ctx.feed.hide(card.id);
                CardOutcome::HiddenFromCache
            }
            Some(true) => CardOutcome::VisibleFromCache,
            None => {
                let ctx = self.ctx.clone();
                let card = card.id;
                self.queue.submit(async move { ctx.fetch_and_decide(card, url).await });
                CardOutcome::Queued
            }
        }
    }

    /// Returns false if the card was already in the processed set.
    fn mark_processed(&self, card: CardId) -> bool {
        self.processed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(card)
    }
}

impl JobContext {
    async fn fetch_and_decide(self, card: CardId, url: NormalizedUrl) {
        let target = match Url::parse(url.as_str()) {
            Ok(target) => target,
            Err(e) => {
                warn!("Skipping {}: {}", url, e);
                return;
            }
        };

        // Any failure leaves the card visible and the cache untouched.
        let html = match fetch_with_timeout(self.fetcher.as_ref(), &target, self.timeout).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Could not fetch detail page {}: {}", url, e);
                return;
            }
        };

        let has_visual_content = self.classifier.classify(&html);
        self.cache.set(&url, has_visual_content);

        if has_visual_content {
            debug!("{} has visual content, keeping {}", url, card);
        } else {
            info!("{} has no images, hiding {}", url, card);
            self.feed.hide(card);
        }
    }
}
