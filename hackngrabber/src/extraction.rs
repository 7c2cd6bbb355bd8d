use scraper::{Html, Selector};
use tracing::debug;

use crate::error::GrabError;

/// One headline pulled off the front page, before it gets an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedItem {
    pub title: String,
    /// `href` as written in the page; relative links are kept relative.
    pub url: String,
}

/// Where the stories live in the page markup.
#[derive(Debug, Clone)]
pub struct PageLayout {
    container: Selector,
    container_src: String,
    link: Selector,
}

impl PageLayout {
    pub fn new(container_selector: &str, link_selector: &str) -> Result<Self, GrabError> {
        Ok(Self {
            container: parse_selector(container_selector)?,
            container_src: container_selector.to_string(),
            link: parse_selector(link_selector)?,
        })
    }
}

fn parse_selector(selector: &str) -> Result<Selector, GrabError> {
    Selector::parse(selector).map_err(|e| GrabError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Extracts up to `max_items` stories from the page, in document order.
///
/// Fails with `MissingContainer` when the page has no element matching the
/// container selector, so an upstream markup change is loud instead of
/// silently producing empty cycles. A container with no matching anchors is
/// not an error.
pub fn extract_stories(
    html: &str,
    layout: &PageLayout,
    max_items: usize,
) -> Result<Vec<ScrapedItem>, GrabError> {
    let document = Html::parse_document(html);

    let container = document
        .select(&layout.container)
        .next()
        .ok_or_else(|| GrabError::MissingContainer {
            selector: layout.container_src.clone(),
        })?;

    let items: Vec<ScrapedItem> = container
        .select(&layout.link)
        .take(max_items)
        .map(|anchor| {
            let title = anchor.text().collect::<String>();
            let url = match anchor.value().attr("href") {
                Some(href) => href.to_string(),
                None => {
                    debug!(%title, "anchor without href, storing empty url");
                    String::new()
                }
            };
            ScrapedItem { title, url }
        })
        .collect();

    debug!("extraction: found {} stories", items.len());
    Ok(items)
}
