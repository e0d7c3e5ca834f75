//! Metric discovery from yearly index pages.
//!
//! A yearly index lists every leaderboard available for that season. Each
//! anchor in the first leaderboard table becomes a [`MetricLink`] the
//! scraper can walk.

mod parser;

use scraper::Selector;
use tracing::{info, instrument, warn};
use url::Url;

use almanac_crawler::{PageNavigator, parse_selector};
use almanac_shared::{AlmanacError, AppConfig, MetricLink, Result};

pub use parser::extract_metric_links;

// ---------------------------------------------------------------------------
// MetricDiscovery
// ---------------------------------------------------------------------------

/// Enumerates the metrics available on a yearly index page.
pub struct MetricDiscovery {
    table_selector: Selector,
    link_selector: Selector,
}

impl MetricDiscovery {
    pub fn new(table_selector: &str, link_selector: &str) -> Result<Self> {
        Ok(Self {
            table_selector: parse_selector(table_selector)?,
            link_selector: parse_selector(link_selector)?,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            &config.source.table_selector,
            &config.source.metric_link_selector,
        )
    }

    /// Open `index_url` and list its metrics in document order.
    ///
    /// A page whose table never renders yields an empty list rather than an
    /// error. Other navigation failures propagate.
    #[instrument(skip_all, fields(url = %index_url))]
    pub async fn discover<N: PageNavigator>(
        &self,
        navigator: &mut N,
        index_url: &Url,
    ) -> Result<Vec<MetricLink>> {
        match navigator.open(index_url).await {
            Ok(()) => {}
            Err(e @ AlmanacError::RenderTimeout { .. }) => {
                warn!(error = %e, "no metric table on index page");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        }

        let Some(page) = navigator.current_page() else {
            return Ok(Vec::new());
        };

        let links = extract_metric_links(
            &page.html,
            &self.table_selector,
            &self.link_selector,
            &page.url,
        );
        info!(metrics = links.len(), "metrics discovered");
        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use almanac_crawler::HttpNavigator;
    use almanac_shared::NavigationConfig;

    fn navigator() -> HttpNavigator {
        let config = NavigationConfig {
            render_timeout_ms: 150,
            poll_interval_ms: 20,
            min_delay_ms: 0,
            max_delay_ms: 0,
            user_agent: "almanac-test".into(),
        };
        HttpNavigator::new(config, "div.ba-table table.boxed", "Next").unwrap()
    }

    fn discovery() -> MetricDiscovery {
        MetricDiscovery::new("div.ba-table table.boxed", "td.datacolBlue a").unwrap()
    }

    #[tokio::test]
    async fn discovers_from_index_page() {
        let server = wiremock::MockServer::start().await;
        let index = std::fs::read_to_string("../../../fixtures/html/yearly_index.html")
            .expect("read index fixture");

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/yearly/yr1901a.shtml"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(index))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/yearly/yr1901a.shtml", server.uri())).unwrap();
        let mut nav = navigator();
        let links = discovery().discover(&mut nav, &url).await.unwrap();

        assert_eq!(links.len(), 3);
        assert_eq!(links[1].name, "Home Runs");
        assert_eq!(
            links[1].url.as_str(),
            format!("{}/yearly/top25.php?s=HR&l=AL", server.uri())
        );
        assert!(links.iter().all(|l| l.name != "ERA"));
    }

    #[tokio::test]
    async fn missing_table_is_empty_not_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string("<html><body><p>Season not found</p></body></html>"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/yearly/yr1850a.shtml", server.uri())).unwrap();
        let mut nav = navigator();
        let links = discovery().discover(&mut nav, &url).await.unwrap();
        assert!(links.is_empty());
    }

    #[tokio::test]
    async fn http_failure_propagates() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/yearly/yr1901a.shtml", server.uri())).unwrap();
        let mut nav = navigator();
        let err = discovery().discover(&mut nav, &url).await.unwrap_err();
        assert!(matches!(err, AlmanacError::Network(_)));
    }
}
