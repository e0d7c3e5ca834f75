//! Metric link extraction from a yearly index page.

use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use almanac_crawler::element_text;
use almanac_shared::MetricLink;

/// Collect `(name, url)` pairs from the first table matching `table_selector`.
///
/// Only the first table is read; later tables on the page are ignored.
/// Anchors without an `href`, with blank text, or with an unresolvable
/// target are skipped. Relative hrefs resolve against `base`.
pub fn extract_metric_links(
    html: &str,
    table_selector: &Selector,
    link_selector: &Selector,
    base: &Url,
) -> Vec<MetricLink> {
    let doc = Html::parse_document(html);
    let Some(table) = doc.select(table_selector).next() else {
        return Vec::new();
    };

    let mut links = Vec::new();
    for anchor in table.select(link_selector) {
        let name = element_text(&anchor);
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            debug!(name, "anchor has no href");
            continue;
        };
        if name.is_empty() {
            debug!(href, "anchor has no text");
            continue;
        }

        match base.join(href) {
            Ok(url) => links.push(MetricLink { name, url }),
            Err(e) => warn!(name, href, error = %e, "unresolvable metric link"),
        }
    }

    links
}
