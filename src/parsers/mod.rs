pub mod content;

pub use content::*;

/// Collapse runs of whitespace into single spaces.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  Rust\n  async   tips "), "Rust async tips");
    }
}
