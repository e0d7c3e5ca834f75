//! Page navigation: load a page, wait for its table, follow pagination.
//!
//! [`PageNavigator`] is the seam the scraper and discovery drive. The shipped
//! [`HttpNavigator`] polls over HTTP: a page counts as rendered once the table
//! selector matches, and a page change counts as confirmed once the first
//! table's fingerprint differs from the previous page's.

use std::time::{Duration, Instant};

use rand::Rng;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use url::Url;

use almanac_shared::{AlmanacError, AppConfig, NavigationConfig, Result};

/// Result of trying to move to the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// A new page is loaded.
    Advanced,
    /// There is no enabled "Next" control. Terminal, not an error.
    NoMorePages,
}

/// The page a navigator currently sits on.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub url: Url,
    pub html: String,
}

/// A session that can load pages and walk pagination.
#[allow(async_fn_in_trait)]
pub trait PageNavigator {
    /// Load `url` and wait until the table is present.
    ///
    /// Fails with [`AlmanacError::RenderTimeout`] when the wait runs out.
    async fn open(&mut self, url: &Url) -> Result<()>;

    /// Follow the "Next" control, if any, and wait for the page change.
    async fn advance_to_next_page(&mut self) -> Result<Advance>;

    /// The currently loaded page, if `open` succeeded.
    fn current_page(&self) -> Option<&LoadedPage>;
}

// ---------------------------------------------------------------------------
// HttpNavigator
// ---------------------------------------------------------------------------

/// HTTP-backed navigator with bounded render waits and randomized pacing.
pub struct HttpNavigator {
    client: Client,
    config: NavigationConfig,
    table_selector: Selector,
    next_label: String,
    current: Option<LoadedPage>,
    requests: usize,
}

impl HttpNavigator {
    /// Create a navigator session.
    pub fn new(config: NavigationConfig, table_selector: &str, next_label: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AlmanacError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            table_selector: parse_selector(table_selector)?,
            next_label: next_label.to_string(),
            current: None,
            requests: 0,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            config.navigation.clone(),
            &config.source.table_selector,
            &config.source.next_label,
        )
    }

    /// Number of HTTP requests issued so far.
    pub fn requests(&self) -> usize {
        self.requests
    }

    /// End the session.
    pub fn close(self) {
        info!(requests = self.requests, "navigator closed");
    }

    async fn fetch(&mut self, url: &Url) -> Result<String> {
        self.requests += 1;
        debug!(%url, "fetching page");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| AlmanacError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AlmanacError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| AlmanacError::Network(format!("{url}: body read failed: {e}")))
    }

    /// Sleep before the next poll, or fail if that would pass the deadline.
    async fn wait_or_timeout(&self, url: &Url, started: Instant) -> Result<()> {
        let poll = self.config.poll_interval();
        if started.elapsed() + poll >= self.config.render_timeout() {
            return Err(AlmanacError::RenderTimeout {
                url: url.to_string(),
                waited_ms: started.elapsed().as_millis() as u64,
            });
        }
        tokio::time::sleep(poll).await;
        Ok(())
    }

    fn pacing_delay(&self) -> Duration {
        let lo = self.config.min_delay_ms;
        let hi = self.config.max_delay_ms.max(lo);
        let ms = rand::rng().random_range(lo..=hi);
        Duration::from_millis(ms)
    }
}

impl PageNavigator for HttpNavigator {
    #[instrument(skip_all, fields(url = %url))]
    async fn open(&mut self, url: &Url) -> Result<()> {
        self.current = None;
        let started = Instant::now();

        loop {
            let html = self.fetch(url).await?;
            if table_fingerprint(&html, &self.table_selector).is_some() {
                debug!(elapsed_ms = started.elapsed().as_millis() as u64, "table rendered");
                self.current = Some(LoadedPage {
                    url: url.clone(),
                    html,
                });
                return Ok(());
            }
            self.wait_or_timeout(url, started).await?;
        }
    }

    #[instrument(skip_all)]
    async fn advance_to_next_page(&mut self) -> Result<Advance> {
        let Some(page) = &self.current else {
            return Ok(Advance::NoMorePages);
        };

        let next_url = match find_next_control(&page.html, &page.url, &self.next_label) {
            NextControl::Enabled(url) => url,
            NextControl::Disabled => {
                debug!("next control disabled");
                return Ok(Advance::NoMorePages);
            }
            NextControl::Absent => {
                debug!("no next control");
                return Ok(Advance::NoMorePages);
            }
        };

        let previous = table_fingerprint(&page.html, &self.table_selector);
        let started = Instant::now();

        loop {
            let html = self.fetch(&next_url).await?;
            if table_fingerprint(&html, &self.table_selector) != previous {
                self.current = Some(LoadedPage {
                    url: next_url.clone(),
                    html,
                });
                break;
            }
            if let Err(e) = self.wait_or_timeout(&next_url, started).await {
                warn!(url = %next_url, "previous table never went stale");
                return Err(e);
            }
        }

        let delay = self.pacing_delay();
        debug!(url = %next_url, delay_ms = delay.as_millis() as u64, "advanced to next page");
        tokio::time::sleep(delay).await;

        Ok(Advance::Advanced)
    }

    fn current_page(&self) -> Option<&LoadedPage> {
        self.current.as_ref()
    }
}

// ---------------------------------------------------------------------------
// HTML helpers
// ---------------------------------------------------------------------------

/// State of the pagination control on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NextControl {
    Absent,
    Disabled,
    Enabled(Url),
}

/// Find the first anchor whose text contains `label`.
pub(crate) fn find_next_control(html: &str, base: &Url, label: &str) -> NextControl {
    let doc = Html::parse_document(html);
    let anchor_sel = Selector::parse("a").expect("valid selector");

    let Some(anchor) = doc
        .select(&anchor_sel)
        .find(|a| element_text(a).contains(label))
    else {
        return NextControl::Absent;
    };

    let el = anchor.value();
    let disabled = el.attr("disabled").is_some()
        || el.attr("aria-disabled") == Some("true")
        || el.classes().any(|c| c == "disabled");
    if disabled {
        return NextControl::Disabled;
    }

    match el.attr("href").map(str::trim) {
        Some(href) if !href.is_empty() && !href.starts_with('#') && !href.starts_with("javascript:") => {
            match base.join(href) {
                Ok(url) => NextControl::Enabled(url),
                Err(e) => {
                    warn!(href, error = %e, "unresolvable next link");
                    NextControl::Disabled
                }
            }
        }
        _ => NextControl::Disabled,
    }
}

/// SHA-256 of the first table matching `selector`, or `None` if none matches.
pub(crate) fn table_fingerprint(html: &str, selector: &Selector) -> Option<String> {
    let doc = Html::parse_document(html);
    let table = doc.select(selector).next()?;
    let mut hasher = Sha256::new();
    hasher.update(table.html().as_bytes());
    Some(format!("{:x}", hasher.finalize()))
}

/// Visible text of an element with whitespace runs collapsed.
pub fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a CSS selector, mapping failures to a config error.
pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| AlmanacError::config(format!("invalid CSS selector '{selector}': {e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    fn fast_config(render_timeout_ms: u64) -> NavigationConfig {
        NavigationConfig {
            render_timeout_ms,
            poll_interval_ms: 20,
            min_delay_ms: 0,
            max_delay_ms: 5,
            user_agent: "almanac-test".into(),
        }
    }

    fn navigator(render_timeout_ms: u64) -> HttpNavigator {
        HttpNavigator::new(
            fast_config(render_timeout_ms),
            "div.ba-table table.boxed",
            "Next",
        )
        .unwrap()
    }

    #[test]
    fn next_control_states() {
        let base = Url::parse("https://example.com/leaders/hr.shtml").unwrap();

        let html = fixture("home_runs_page1.html");
        assert_eq!(
            find_next_control(&html, &base, "Next"),
            NextControl::Enabled(Url::parse("https://example.com/leaders/home_runs_2.shtml").unwrap())
        );

        let html = fixture("home_runs_page2.html");
        assert_eq!(find_next_control(&html, &base, "Next"), NextControl::Disabled);

        let html = r#"<html><body><a href="/x" aria-disabled="true">Next</a></body></html>"#;
        assert_eq!(find_next_control(html, &base, "Next"), NextControl::Disabled);

        let html = "<html><body><a href=\"/prev\">Previous</a></body></html>";
        assert_eq!(find_next_control(html, &base, "Next"), NextControl::Absent);
    }

    #[test]
    fn fingerprint_tracks_first_table() {
        let sel = parse_selector("div.ba-table table.boxed").unwrap();
        let p1 = fixture("home_runs_page1.html");
        let p2 = fixture("home_runs_page2.html");

        let f1 = table_fingerprint(&p1, &sel).expect("table on page 1");
        assert_eq!(f1.len(), 64);
        assert_eq!(table_fingerprint(&p1, &sel), Some(f1.clone()));
        assert_ne!(table_fingerprint(&p2, &sel), Some(f1));
        assert_eq!(table_fingerprint("<html><body></body></html>", &sel), None);
    }

    #[test]
    fn invalid_selector_is_config_error() {
        let err = parse_selector("table[[").unwrap_err();
        assert!(err.to_string().contains("invalid CSS selector"));
    }

    #[tokio::test]
    async fn open_waits_for_table() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/hr"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_string(fixture("home_runs_page1.html")),
            )
            .mount(&server)
            .await;

        let mut nav = navigator(500);
        let url = Url::parse(&format!("{}/hr", server.uri())).unwrap();
        nav.open(&url).await.expect("open");

        let page = nav.current_page().expect("page loaded");
        assert_eq!(page.url, url);
        assert_eq!(nav.requests(), 1);
    }

    #[tokio::test]
    async fn open_without_table_times_out() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/empty"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_string("<html><body>loading</body></html>"),
            )
            .mount(&server)
            .await;

        let mut nav = navigator(150);
        let url = Url::parse(&format!("{}/empty", server.uri())).unwrap();
        let err = nav.open(&url).await.unwrap_err();

        assert!(err.is_render_timeout(), "got {err}");
        assert!(nav.current_page().is_none());
        assert!(nav.requests() > 1);
    }

    #[tokio::test]
    async fn open_propagates_http_errors() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/gone"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut nav = navigator(150);
        let url = Url::parse(&format!("{}/gone", server.uri())).unwrap();
        let err = nav.open(&url).await.unwrap_err();
        assert!(matches!(err, AlmanacError::Network(_)));
    }

    #[tokio::test]
    async fn advance_follows_next_and_stops() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/leaders/home_runs.shtml"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_string(fixture("home_runs_page1.html")),
            )
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::path("/leaders/home_runs_2.shtml"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_string(fixture("home_runs_page2.html")),
            )
            .mount(&server)
            .await;

        let mut nav = navigator(500);
        let url = Url::parse(&format!("{}/leaders/home_runs.shtml", server.uri())).unwrap();
        nav.open(&url).await.unwrap();

        assert_eq!(nav.advance_to_next_page().await.unwrap(), Advance::Advanced);
        assert!(
            nav.current_page()
                .unwrap()
                .url
                .path()
                .ends_with("home_runs_2.shtml")
        );
        assert_eq!(nav.advance_to_next_page().await.unwrap(), Advance::NoMorePages);
        assert_eq!(nav.requests(), 2);
    }

    #[tokio::test]
    async fn next_that_never_goes_stale_times_out() {
        let server = wiremock::MockServer::start().await;
        let looping = r#"<html><body>
            <div class="ba-table"><table class="boxed"><tr><td>1901</td></tr></table></div>
            <a href="/loop">Next</a>
        </body></html>"#;
        wiremock::Mock::given(wiremock::matchers::path("/loop"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(looping))
            .mount(&server)
            .await;

        let mut nav = navigator(150);
        let url = Url::parse(&format!("{}/loop", server.uri())).unwrap();
        nav.open(&url).await.unwrap();

        let err = nav.advance_to_next_page().await.unwrap_err();
        assert!(err.is_render_timeout(), "got {err}");
    }
}
