use crate::domain::is_http_link;
use scraper::{Html, Selector};
use std::sync::LazyLock;

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector is valid"));

/// Raw `href` values of every anchor, in document order, duplicates kept.
pub fn anchor_hrefs(body: &[u8]) -> Vec<String> {
    let html = String::from_utf8_lossy(body);
    let document = Html::parse_document(&html);

    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|element| element.value().attr("href"))
        .map(str::to_string)
        .collect()
}

/// Anchor targets that are absolute HTTP(S) URLs. Relative links are dropped,
/// never resolved against the page. So are targets carrying a line break,
/// which could not be stored as a single output line.
pub fn extract_links(body: &[u8]) -> Vec<String> {
    anchor_hrefs(body)
        .into_iter()
        .filter(|href| is_http_link(href) && !has_line_break(href))
        .collect()
}

pub(crate) fn has_line_break(link: &str) -> bool {
    link.contains(['\n', '\r'])
}
