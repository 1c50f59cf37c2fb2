//! Visible-text extraction for the direct fetch fallback.

use scraper::{Html, Node};

const SKIPPED_ELEMENTS: &[&str] = &["script", "style"];

/// Collect the document's text nodes, skipping `<script>` and `<style>`
/// subtrees, joined by single spaces.
pub fn extract_visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|el| SKIPPED_ELEMENTS.contains(&el.name()))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_text_and_skips_scripts() {
        let html = r#"<!doctype html>
            <html>
              <head>
                <title>Release notes</title>
                <style>body { color: red; }</style>
                <script>var tracking = "ignore me";</script>
              </head>
              <body>
                <h1>Version 2.0</h1>
                <p>Faster   builds and <b>smaller</b> binaries.</p>
                <script type="text/javascript">alert("nope")</script>
              </body>
            </html>"#;

        let text = extract_visible_text(html);
        assert_eq!(text, "Release notes Version 2.0 Faster   builds and smaller binaries.");
        assert!(!text.contains("tracking"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(extract_visible_text("just words"), "just words");
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(extract_visible_text(""), "");
    }
}
