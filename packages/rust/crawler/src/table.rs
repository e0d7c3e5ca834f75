//! Per-metric leader table scraper.
//!
//! Walks every page of one metric's leader table and writes a single raw
//! file. A metric whose raw file already exists is never fetched again, and
//! a scrape that collects nothing writes nothing, so the next run retries it.

use std::path::{Path, PathBuf};

use scraper::Selector;
use tracing::{debug, info, instrument, warn};

use almanac_shared::slug::{is_sql_identifier, raw_file_name, slugify};
use almanac_shared::{AlmanacError, AppConfig, ColumnLayout, MetricLink, RawRecord, Result};

use crate::navigator::{Advance, PageNavigator, parse_selector};
use crate::raw_file::write_raw_file;
use crate::rows::{extract_rows, parse_row};

/// What a call to [`TableScraper::scrape`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeOutcome {
    /// The raw file was already there; nothing was fetched.
    AlreadyScraped { path: PathBuf },
    /// Records were collected and written.
    Written {
        path: PathBuf,
        records: usize,
        pages: usize,
        skipped_rows: usize,
    },
    /// Pages were walked but no record survived; no file written.
    Empty { pages: usize, skipped_rows: usize },
}

/// Records extracted from one page plus the number of malformed rows dropped.
#[derive(Debug, Default)]
struct PageRecords {
    records: Vec<RawRecord>,
    skipped_rows: usize,
}

/// Scrapes paired-league leader tables into raw files.
pub struct TableScraper {
    table_selector: Selector,
    layout: ColumnLayout,
}

impl TableScraper {
    pub fn new(table_selector: &str, layout: ColumnLayout) -> Result<Self> {
        layout.validate()?;
        Ok(Self {
            table_selector: parse_selector(table_selector)?,
            layout,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(&config.source.table_selector, config.layout.clone())
    }

    /// Scrape one metric into `output_dir`.
    ///
    /// Navigation failures (including render timeouts) propagate and leave
    /// no file behind. A metric name whose slug is not a plain identifier is
    /// rejected before any navigation.
    #[instrument(skip_all, fields(metric = %metric.name))]
    pub async fn scrape<N: PageNavigator>(
        &self,
        navigator: &mut N,
        metric: &MetricLink,
        output_dir: &Path,
    ) -> Result<ScrapeOutcome> {
        let slug = slugify(&metric.name);
        if !is_sql_identifier(&slug) {
            return Err(AlmanacError::validation(format!(
                "metric '{}' has unusable slug '{slug}'",
                metric.name
            )));
        }
        let file_name = raw_file_name(&metric.name);
        let path = output_dir.join(&file_name);

        if path.exists() {
            info!(file = %file_name, "skipping, raw file exists");
            return Ok(ScrapeOutcome::AlreadyScraped { path });
        }

        info!(url = %metric.url, "scraping metric");
        navigator.open(&metric.url).await?;

        let mut records = Vec::new();
        let mut pages = 0usize;
        let mut skipped_rows = 0usize;

        loop {
            pages += 1;
            let page = navigator
                .current_page()
                .ok_or_else(|| AlmanacError::parse("navigator has no loaded page"))?;

            let extracted = self.extract_page(&page.html, &metric.name);
            debug!(
                page = pages,
                records = extracted.records.len(),
                skipped_rows = extracted.skipped_rows,
                "page extracted"
            );
            records.extend(extracted.records);
            skipped_rows += extracted.skipped_rows;

            match navigator.advance_to_next_page().await? {
                Advance::Advanced => continue,
                Advance::NoMorePages => break,
            }
        }

        if records.is_empty() {
            warn!(pages, "no records collected, nothing written");
            return Ok(ScrapeOutcome::Empty {
                pages,
                skipped_rows,
            });
        }

        write_raw_file(&path, &metric.name, &records)?;
        info!(file = %file_name, records = records.len(), pages, "saved raw file");

        Ok(ScrapeOutcome::Written {
            path,
            records: records.len(),
            pages,
            skipped_rows,
        })
    }

    fn extract_page(&self, html: &str, metric_name: &str) -> PageRecords {
        let mut out = PageRecords::default();

        for (index, cells) in extract_rows(html, &self.table_selector).iter().enumerate() {
            match parse_row(cells, &self.layout) {
                Ok(Some(records)) => out.records.extend(records),
                Ok(None) => {}
                Err(e) => {
                    warn!(metric = metric_name, row = index, error = %e, "skipped row");
                    out.skipped_rows += 1;
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigator::{HttpNavigator, LoadedPage};
    use almanac_shared::NavigationConfig;
    use url::Url;
    use uuid::Uuid;

    fn fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("almanac-{tag}-{}", Uuid::now_v7()))
    }

    fn scraper() -> TableScraper {
        TableScraper::new("div.ba-table table.boxed", ColumnLayout::default()).unwrap()
    }

    /// Serves canned pages and counts every call.
    #[derive(Default)]
    struct ScriptedNavigator {
        pages: Vec<String>,
        index: usize,
        current: Option<LoadedPage>,
        calls: usize,
        fail_advance: bool,
    }

    impl PageNavigator for ScriptedNavigator {
        async fn open(&mut self, url: &Url) -> Result<()> {
            self.calls += 1;
            self.index = 0;
            self.current = Some(LoadedPage {
                url: url.clone(),
                html: self.pages[0].clone(),
            });
            Ok(())
        }

        async fn advance_to_next_page(&mut self) -> Result<Advance> {
            self.calls += 1;
            if self.fail_advance {
                return Err(AlmanacError::RenderTimeout {
                    url: "https://example.com/next".into(),
                    waited_ms: 10,
                });
            }
            if self.index + 1 >= self.pages.len() {
                return Ok(Advance::NoMorePages);
            }
            self.index += 1;
            let url = self.current.as_ref().unwrap().url.clone();
            self.current = Some(LoadedPage {
                url,
                html: self.pages[self.index].clone(),
            });
            Ok(Advance::Advanced)
        }

        fn current_page(&self) -> Option<&LoadedPage> {
            self.current.as_ref()
        }
    }

    fn metric(name: &str) -> MetricLink {
        MetricLink {
            name: name.into(),
            url: Url::parse("https://example.com/leaders/hr").unwrap(),
        }
    }

    #[tokio::test]
    async fn existing_file_means_zero_navigation() {
        let dir = temp_dir("skip");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("home_runs.csv"), "Year,League,Player,Team,Home Runs\n").unwrap();

        let mut nav = ScriptedNavigator::default();
        let outcome = scraper()
            .scrape(&mut nav, &metric("Home Runs"), &dir)
            .await
            .unwrap();

        assert!(matches!(outcome, ScrapeOutcome::AlreadyScraped { .. }));
        assert_eq!(nav.calls, 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn unsafe_metric_names_are_rejected() {
        let root = temp_dir("unsafe");
        let raw = root.join("raw");

        for name in ["../Escaped Stat", "Wins/Losses"] {
            let mut nav = ScriptedNavigator {
                pages: vec![fixture("home_runs_page1.html")],
                ..Default::default()
            };
            let err = scraper()
                .scrape(&mut nav, &metric(name), &raw)
                .await
                .unwrap_err();

            assert!(matches!(err, AlmanacError::Validation { .. }), "{name}: {err}");
            assert_eq!(nav.calls, 0);
        }

        assert!(!root.join("escaped_stat.csv").exists());
        assert!(!raw.join("wins").exists());
        assert!(!raw.exists());
    }

    #[tokio::test]
    async fn walks_all_pages_and_writes_once() {
        let dir = temp_dir("walk");
        let mut nav = ScriptedNavigator {
            pages: vec![fixture("home_runs_page1.html"), fixture("home_runs_page2.html")],
            ..Default::default()
        };

        let outcome = scraper()
            .scrape(&mut nav, &metric("Home Runs"), &dir)
            .await
            .unwrap();

        let ScrapeOutcome::Written {
            path,
            records,
            pages,
            skipped_rows,
        } = outcome
        else {
            panic!("expected Written, got {outcome:?}");
        };
        assert_eq!(records, 6);
        assert_eq!(pages, 2);
        assert_eq!(skipped_rows, 1);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "Year,League,Player,Team,Home Runs");
        assert_eq!(lines[1], "1901,AL,Nap Lajoie,PHA,14");
        assert_eq!(lines[2], "1901,NL,Sam Crawford,CIN,16");
        assert_eq!(lines[3], "1902,AL,Socks Seybold,PHA,16");
        assert_eq!(lines[6], "1904,NL,Harry Lumley,BRO,9");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn no_records_means_no_file() {
        let dir = temp_dir("empty");
        let mut nav = ScriptedNavigator {
            pages: vec![r#"<div class="ba-table"><table class="boxed">
                <tr><td>Year</td><td>Name</td><td>#</td><td>Team</td>
                    <td>Year</td><td>Name</td><td>#</td><td>Team</td></tr>
            </table></div>"#
                .to_string()],
            ..Default::default()
        };

        let outcome = scraper()
            .scrape(&mut nav, &metric("Triples"), &dir)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ScrapeOutcome::Empty {
                pages: 1,
                skipped_rows: 0
            }
        );
        assert!(!dir.join("triples.csv").exists());
    }

    #[tokio::test]
    async fn navigation_failure_leaves_no_partial_file() {
        let dir = temp_dir("timeout");
        let mut nav = ScriptedNavigator {
            pages: vec![fixture("home_runs_page1.html")],
            fail_advance: true,
            ..Default::default()
        };

        let err = scraper()
            .scrape(&mut nav, &metric("Home Runs"), &dir)
            .await
            .unwrap_err();

        assert!(err.is_render_timeout());
        assert!(!dir.join("home_runs.csv").exists());
    }

    #[tokio::test]
    async fn scrape_over_http_single_page() {
        let server = wiremock::MockServer::start().await;
        let single = fixture("home_runs_page1.html").replace("Next &raquo;", "Back to top");
        wiremock::Mock::given(wiremock::matchers::path("/leaders/hits.shtml"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(single))
            .expect(1)
            .mount(&server)
            .await;

        let config = NavigationConfig {
            render_timeout_ms: 500,
            poll_interval_ms: 20,
            min_delay_ms: 0,
            max_delay_ms: 0,
            user_agent: "almanac-test".into(),
        };
        let mut nav = HttpNavigator::new(config, "div.ba-table table.boxed", "Next").unwrap();
        let dir = temp_dir("http");
        let link = MetricLink {
            name: "Hits".into(),
            url: Url::parse(&format!("{}/leaders/hits.shtml", server.uri())).unwrap(),
        };

        let outcome = scraper().scrape(&mut nav, &link, &dir).await.unwrap();
        assert!(matches!(outcome, ScrapeOutcome::Written { records: 4, pages: 1, .. }));
        assert!(dir.join("hits.csv").exists());

        // Second run is a no-op.
        let again = scraper().scrape(&mut nav, &link, &dir).await.unwrap();
        assert!(matches!(again, ScrapeOutcome::AlreadyScraped { .. }));
        assert_eq!(nav.requests(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
