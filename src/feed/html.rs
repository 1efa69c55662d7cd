use anyhow::Result;
use scraper::{Html, Selector};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use crate::config::{parse_selector, Config};
use crate::feed::{Feed, MutationBatch};
use crate::models::{Card, CardId};
use crate::parsers::clean_text;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardView {
    pub id: CardId,
    pub link: Option<String>,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FeedSnapshot {
    pub visible: Vec<CardView>,
    pub hidden: Vec<CardView>,
}

struct CardEntry {
    view: CardView,
    hidden: bool,
}

#[derive(Default)]
struct FeedState {
    entries: Vec<CardEntry>,
    next_id: u64,
}

/// Feed assembled from listing HTML, one `append_html` call per loaded page.
pub struct HtmlFeed {
    card_selector: Selector,
    link_selector: Selector,
    state: Mutex<FeedState>,
    subscribers: Mutex<Vec<UnboundedSender<MutationBatch>>>,
}

impl HtmlFeed {
    pub fn new(card_selector: &str, link_selector: &str) -> Result<Self> {
        Ok(Self {
            card_selector: parse_selector(card_selector)?,
            link_selector: parse_selector(link_selector)?,
            state: Mutex::new(FeedState::default()),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.card_selector, &config.link_selector)
    }

    /// Receives one batch per structural change from now on.
    pub fn subscribe(&self) -> UnboundedReceiver<MutationBatch> {
        let (tx, rx) = unbounded_channel();
        lock(&self.subscribers).push(tx);
        rx
    }

    /// Render the cards found in `html` at the end of the feed. Returns how many were added.
    pub fn append_html(&self, html: &str) -> usize {
        let views = self.extract_cards(html);
        let added = views.len();
        if added == 0 {
            return 0;
        }

        {
            let mut state = lock(&self.state);
            for (link, label) in views {
                let id = CardId(state.next_id);
                state.next_id += 1;
                state.entries.push(CardEntry {
                    view: CardView { id, link, label },
                    hidden: false,
                });
            }
        }

        debug!("Appended {} cards to feed", added);
        self.publish(MutationBatch { added, removed: 0 });
        added
    }

    /// Take a card off the page. Its handle is never reused.
    pub fn remove(&self, card: CardId) -> bool {
        let removed = {
            let mut state = lock(&self.state);
            let before = state.entries.len();
            state.entries.retain(|entry| entry.view.id != card);
            before != state.entries.len()
        };

        if removed {
            self.publish(MutationBatch { added: 0, removed: 1 });
        }
        removed
    }

    /// `None` once the card has left the page.
    pub fn is_hidden(&self, card: CardId) -> Option<bool> {
        lock(&self.state)
            .entries
            .iter()
            .find(|entry| entry.view.id == card)
            .map(|entry| entry.hidden)
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        let state = lock(&self.state);
        let mut snapshot = FeedSnapshot::default();
        for entry in &state.entries {
            if entry.hidden {
                snapshot.hidden.push(entry.view.clone());
            } else {
                snapshot.visible.push(entry.view.clone());
            }
        }
        snapshot
    }

    fn extract_cards(&self, html: &str) -> Vec<(Option<String>, String)> {
        let document = Html::parse_document(html);

        document
            .select(&self.card_selector)
            .map(|card| match card.select(&self.link_selector).next() {
                Some(link) => (
                    link.value().attr("href").map(str::to_string),
                    clean_text(&link.text().collect::<String>()),
                ),
                None => (None, clean_text(&card.text().collect::<String>())),
            })
            .collect()
    }

    fn publish(&self, batch: MutationBatch) {
        lock(&self.subscribers).retain(|tx| tx.send(batch).is_ok());
    }
}

impl Feed for HtmlFeed {
    fn cards(&self) -> Vec<Card> {
        lock(&self.state)
            .entries
            .iter()
            .map(|entry| Card::new(entry.view.id, entry.view.link.clone()))
            .collect()
    }

    fn hide(&self, card: CardId) {
        let mut state = lock(&self.state);
        if let Some(entry) = state.entries.iter_mut().find(|entry| entry.view.id == card) {
            if !entry.hidden {
                entry.hidden = true;
                info!("Hiding {} ({})", card, entry.view.label);
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
