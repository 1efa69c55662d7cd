use std::sync::Arc;
use tracing::warn;

use crate::models::{Decision, NormalizedUrl};
use crate::storage::SessionStore;

const HAS_VISUAL: &str = "1";
const NO_VISUAL: &str = "0";

/// Session-scoped decisions keyed by normalized URL.
///
/// Store failures never escape: a failed read is a miss and a failed write is dropped,
/// so an unavailable store just means every card gets fetched.
pub struct DecisionCache {
    store: Arc<dyn SessionStore>,
    prefix: String,
}

impl DecisionCache {
    pub fn new(store: Arc<dyn SessionStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// `None` means unknown and the page has to be fetched.
    pub fn get(&self, url: &NormalizedUrl) -> Option<Decision> {
        match self.store.get(&self.key(url)) {
            Ok(value) => value.map(|v| v == HAS_VISUAL),
            Err(e) => {
                warn!("Session store read failed for {}: {}", url, e);
                None
            }
        }
    }

    pub fn set(&self, url: &NormalizedUrl, decision: Decision) {
        let value = if decision { HAS_VISUAL } else { NO_VISUAL };
        if let Err(e) = self.store.set(&self.key(url), value) {
            warn!("Session store write failed for {}: {}", url, e);
        }
    }

    fn key(&self, url: &NormalizedUrl) -> String {
        format!("{}{}", self.prefix, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::normalize;
    use crate::storage::{MemorySessionStore, StoreError};
    use url::Url;

    struct BrokenStore;

    impl SessionStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("disabled".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disabled".to_string()))
        }
    }

    fn item() -> NormalizedUrl {
        let origin = Url::parse("https://qiita.com").unwrap();
        normalize("/alice/items/123", &origin).unwrap()
    }

    #[test]
    fn unknown_until_written() {
        let cache = DecisionCache::new(Arc::new(MemorySessionStore::new()), "p:");
        assert_eq!(cache.get(&item()), None);
        cache.set(&item(), false);
        assert_eq!(cache.get(&item()), Some(false));
    }

    #[test]
    fn later_write_overwrites() {
        let cache = DecisionCache::new(Arc::new(MemorySessionStore::new()), "p:");
        cache.set(&item(), false);
        cache.set(&item(), true);
        assert_eq!(cache.get(&item()), Some(true));
    }

    #[test]
    fn keys_carry_prefix_and_encoded_value() {
        let store = Arc::new(MemorySessionStore::new());
        let cache = DecisionCache::new(store.clone(), "qiita_has_img:");
        cache.set(&item(), true);
        assert_eq!(
            store.get("qiita_has_img:https://qiita.com/alice/items/123").unwrap().as_deref(),
            Some("1")
        );
    }

    #[test]
    fn unexpected_stored_value_reads_as_false() {
        let store = Arc::new(MemorySessionStore::new());
        store.set("p:https://qiita.com/alice/items/123", "yes").unwrap();
        let cache = DecisionCache::new(store, "p:");
        assert_eq!(cache.get(&item()), Some(false));
    }

    #[test]
    fn broken_store_behaves_as_miss() {
        let cache = DecisionCache::new(Arc::new(BrokenStore), "p:");
        cache.set(&item(), false);
        assert_eq!(cache.get(&item()), None);
    }
}
