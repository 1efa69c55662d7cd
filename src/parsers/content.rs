use anyhow::Result;
use scraper::{Html, Selector};

use crate::config::{parse_selector, Config};
use crate::models::Decision;

/// What a detail page looks like to the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentReport {
    pub has_container: bool,
    pub images_in_container: usize,
}

impl ContentReport {
    /// A page without the content container counts as having visual content.
    pub fn decision(&self) -> Decision {
        !self.has_container || self.images_in_container > 0
    }
}

pub struct ContentClassifier {
    container: Selector,
    image: Selector,
}

impl ContentClassifier {
    pub fn new(content_selector: &str, image_selector: &str) -> Result<Self> {
        Ok(Self {
            container: parse_selector(content_selector)?,
            image: parse_selector(image_selector)?,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.content_selector, &config.image_selector)
    }

    pub fn classify(&self, html: &str) -> Decision {
        self.inspect(html).decision()
    }

    pub fn inspect(&self, html: &str) -> ContentReport {
        // html5ever recovers from malformed markup, so parsing never fails here
        let document = Html::parse_document(html);

        match document.select(&self.container).next() {
            Some(container) => ContentReport {
                has_container: true,
                images_in_container: container.select(&self.image).count(),
            },
            None => ContentReport {
                has_container: false,
                images_in_container: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> ContentClassifier {
        ContentClassifier::new(".it-MdContent", "img").unwrap()
    }

    #[test]
    fn image_inside_container() {
        let html = r#"<html><body><div class="it-MdContent"><p>hi</p><img src="a.png"></div></body></html>"#;
        assert!(classifier().classify(html));
    }

    #[test]
    fn container_without_image() {
        let html = r#"<div class="it-MdContent"><p>text only</p></div>"#;
        assert!(!classifier().classify(html));
    }

    #[test]
    fn images_outside_container_do_not_count() {
        let html = r#"
            <header><img src="logo.png"></header>
            <div class="it-MdContent"><p>text only</p></div>
            <aside><img src="ad.png"></aside>
        "#;
        assert!(!classifier().classify(html));
    }

    #[test]
    fn missing_container_fails_open() {
        assert!(classifier().classify("<html><body><p>no body</p></body></html>"));
        assert!(classifier().classify(""));
    }

    #[test]
    fn malformed_markup_is_tolerated() {
        let html = r#"<div class="it-MdContent"><p><img src="x.png"</div></span>"#;
        let report = classifier().inspect(html);
        assert!(report.has_container);
        assert!(classifier().classify("<<<>>> </div class=>"));
    }

    #[test]
    fn only_first_container_is_inspected() {
        let html = r#"
            <div class="it-MdContent"><p>text</p></div>
            <div class="it-MdContent"><img src="b.png"></div>
        "#;
        assert!(!classifier().classify(html));
    }

    #[test]
    fn classification_is_deterministic() {
        let classifier = classifier();
        let html = r#"<div class="it-MdContent"><img src="a.png"><img src="b.png"></div>"#;
        let first = classifier.inspect(html);
        for _ in 0..5 {
            assert_eq!(classifier.inspect(html), first);
        }
        assert_eq!(first.images_in_container, 2);
    }
}
