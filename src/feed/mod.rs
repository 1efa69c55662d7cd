mod html;

pub use html::{CardView, FeedSnapshot, HtmlFeed};

use crate::models::{Card, CardId};

/// The page hosting the cards.
pub trait Feed: Send + Sync {
    /// Every card currently rendered, in page order.
    fn cards(&self) -> Vec<Card>;

    /// Permanently hide a card. Hiding twice is a no-op, as is hiding a card that left the page.
    fn hide(&self, card: CardId);
}

/// One batch of structural changes to the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MutationBatch {
    pub added: usize,
    pub removed: usize,
}
