use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle for a rendered card. Handles never own the card itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CardId(pub u64);

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "card#{}", self.0)
    }
}

/// Snapshot of a card as the page currently renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    /// Raw href of the card's detail link, as written in the page.
    pub link: Option<String>,
}

impl Card {
    pub fn new(id: CardId, link: Option<String>) -> Self {
        Self { id, link }
    }
}

/// Whether a detail page carries visual content.
pub type Decision = bool;
