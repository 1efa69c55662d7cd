use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

static DETAIL_PATH_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/[^/]+/items/[^/]+$")
        .expect("Invalid detail path regex")
});

// NewType pattern so raw hrefs and cache keys don't get mixed up
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedUrl(String);

impl NormalizedUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolve `raw` against the root of `origin` and drop query and fragment.
pub fn normalize(raw: &str, origin: &Url) -> Option<NormalizedUrl> {
    let root = origin.join("/").ok()?;
    let mut url = root.join(raw.trim()).ok()?;
    url.set_fragment(None);
    url.set_query(None);
    Some(NormalizedUrl(url.to_string()))
}

/// True only for `/<owner>/items/<id>` paths.
pub fn is_detail_page(url: &NormalizedUrl) -> bool {
    match Url::parse(url.as_str()) {
        Ok(parsed) => DETAIL_PATH_REGEX.is_match(parsed.path()),
        Err(_) => false,
    }
}
