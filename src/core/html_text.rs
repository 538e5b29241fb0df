use scraper::Html;

const SKIP_TAGS: [&str; 5] = ["script", "style", "head", "title", "meta"];

/// HTML 郵件轉純文字：略過 script/style/head 等區塊，文字節點以空白串接
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);

    document
        .tree
        .root()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|parent| {
                parent
                    .value()
                    .as_element()
                    .is_some_and(|el| SKIP_TAGS.contains(&el.name()))
            });
            if hidden {
                return None;
            }
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_tags_and_hidden_blocks() {
        let html = r#"
            <html>
              <head><title>Order</title><style>p { color: red; }</style></head>
              <body>
                <script>var tracking = 1;</script>
                <h1>Thanks for your order</h1>
                <table><tr><td>Item:</td><td>Ring Video Doorbell</td></tr></table>
                <p>Total: <b>$99.99</b></p>
              </body>
            </html>"#;

        assert_eq!(
            html_to_text(html),
            "Thanks for your order Item: Ring Video Doorbell Total: $99.99"
        );
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(html_to_text("just text"), "just text");
        assert_eq!(html_to_text(""), "");
    }

    #[test]
    fn test_malformed_markup_keeps_text() {
        assert_eq!(html_to_text("<div><p>Model: ABC-123<div>"), "Model: ABC-123");
    }
}
