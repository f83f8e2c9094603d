use std::sync::LazyLock;

use palmcrawl_core::domain::resolve_link;
use palmcrawl_core::error::CrawlError;
use palmcrawl_core::traits::{PageParser, ParsedPage};
use scraper::{Html, Selector};
use url::Url;

/// Elements whose text is never shown to a reader.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template"];

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

/// HTML parser built on scraper.
///
/// Extracts the `<title>`, the visible text of the document and every
/// `a[href]` resolved against the page url.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlPageParser;

impl HtmlPageParser {
    pub fn new() -> Self {
        Self
    }
}

impl PageParser for HtmlPageParser {
    fn parse(&self, url: &str, body: &str) -> Result<ParsedPage, CrawlError> {
        let base =
            Url::parse(url).map_err(|e| CrawlError::ParseError(format!("Invalid url {url}: {e}")))?;
        let document = Html::parse_document(body);

        let title = document
            .select(&TITLE)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let links = document
            .select(&LINKS)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| resolve_link(&base, href))
            .collect();

        Ok(ParsedPage {
            title,
            text: visible_text(&document),
            links,
        })
    }
}

fn visible_text(document: &Html) -> String {
    let mut parts = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| HIDDEN_TAGS.contains(&e.name()))
        });
        let text = text.trim();
        if !hidden && !text.is_empty() {
            parts.push(text);
        }
    }
    parts.join(" ")
}
