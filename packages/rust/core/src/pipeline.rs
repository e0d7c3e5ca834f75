//! The three batch stages: scrape → clean → load.
//!
//! Each stage is a standalone batch pass over a directory. Stages are
//! best-effort: one metric or file failing is recorded in the
//! [`StageReport`] and the batch moves on. Only setup problems (bad
//! selectors, unreadable input directory, unopenable store) return `Err`.

use std::collections::HashMap;
use std::path::Path;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use almanac_cleaner::RecordCleaner;
use almanac_crawler::{HttpNavigator, PageNavigator, ScrapeOutcome, TableScraper};
use almanac_discovery::MetricDiscovery;
use almanac_shared::slug::slugify;
use almanac_shared::{
    AlmanacError, AppConfig, ItemReport, MetricLink, MetricRegistry, Result, Stage, StageReport,
};
use almanac_storage::{LoadOutcome, SchemaLoader, Store};

use crate::logging::{LogSettings, StageLogger};
use crate::progress::StageProgress;

/// A validated configuration ready to run stages.
pub struct Pipeline {
    config: AppConfig,
    registry: MetricRegistry,
}

impl Pipeline {
    /// Validate `config` once and keep the resulting metric registry.
    pub fn new(config: AppConfig) -> Result<Self> {
        let registry = config.validate()?;
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // Scrape
    // -----------------------------------------------------------------------

    /// Scrape every season's metrics into the raw directory.
    ///
    /// The navigator session lives for this call only and is closed on
    /// every path.
    pub async fn scrape(
        &self,
        logger: &StageLogger,
        progress: &dyn StageProgress,
    ) -> Result<StageReport> {
        logger
            .scope(self.scrape_session(logger.run_id(), progress))
            .await
    }

    async fn scrape_session(
        &self,
        run_id: Uuid,
        progress: &dyn StageProgress,
    ) -> Result<StageReport> {
        let mut navigator = HttpNavigator::from_config(&self.config)?;
        let report = self.scrape_with(&mut navigator, run_id, progress).await;
        navigator.close();
        report
    }

    /// Scrape using a caller-provided navigator.
    #[instrument(skip_all, fields(raw_dir = %self.config.paths.raw_dir.display()))]
    pub async fn scrape_with<N: PageNavigator>(
        &self,
        navigator: &mut N,
        run_id: Uuid,
        progress: &dyn StageProgress,
    ) -> Result<StageReport> {
        let discovery = MetricDiscovery::from_config(&self.config)?;
        let scraper = TableScraper::from_config(&self.config)?;
        let raw_dir = &self.config.paths.raw_dir;
        std::fs::create_dir_all(raw_dir).map_err(|e| AlmanacError::io(raw_dir, e))?;

        let mut report = StageReport::new(Stage::Scrape, run_id);
        let mut slugs: HashMap<String, String> = HashMap::new();

        for year in self.config.source.years() {
            progress.phase(&format!("Season {year}"));
            info!(year, "processing year");

            let links = match self.config.source.year_index_url(year) {
                Ok(url) => discovery.discover(navigator, &url).await,
                Err(e) => Err(e),
            };
            let links = match links {
                Ok(links) => links,
                Err(e) => {
                    error!(year, error = %e, "metric discovery failed");
                    report.push(ItemReport::failed(format!("{year} index"), e));
                    continue;
                }
            };

            for (index, link) in links.iter().enumerate() {
                progress.item(&link.name, index + 1, links.len());
                let entry = self
                    .scrape_metric(navigator, &scraper, link, year, &mut slugs)
                    .await;
                report.push(entry);
            }
        }

        report.finish();
        info!(
            completed = report.completed(),
            skipped = report.skipped(),
            failed = report.failed(),
            "scrape finished"
        );
        progress.done(&report);
        Ok(report)
    }

    async fn scrape_metric<N: PageNavigator>(
        &self,
        navigator: &mut N,
        scraper: &TableScraper,
        link: &MetricLink,
        year: u16,
        slugs: &mut HashMap<String, String>,
    ) -> ItemReport {
        let item = format!("{year} {}", link.name);

        let slug = slugify(&link.name);
        if let Err(e) = self.registry.resolve(&slug) {
            warn!(metric = %link.name, %slug, error = %e, "unusable metric name");
            return ItemReport::failed(item, e);
        }
        match slugs.get(&slug) {
            Some(owner) if *owner != link.name => {
                warn!(metric = %link.name, %slug, owner = %owner, "slug collision");
                return ItemReport::failed(
                    item,
                    format!("slug '{slug}' is already used by metric '{owner}'"),
                );
            }
            Some(_) => {}
            None => {
                slugs.insert(slug, link.name.clone());
            }
        }

        match scraper
            .scrape(navigator, link, &self.config.paths.raw_dir)
            .await
        {
            Ok(ScrapeOutcome::Written { records, .. }) => {
                ItemReport::completed(item).with_rows(None, Some(records))
            }
            Ok(ScrapeOutcome::AlreadyScraped { .. }) => ItemReport::skipped(item, "raw file exists"),
            Ok(ScrapeOutcome::Empty { .. }) => ItemReport::skipped(item, "no records found"),
            Err(e) => {
                error!(metric = %link.name, error = %e, "scrape failed");
                ItemReport::failed(item, e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Clean
    // -----------------------------------------------------------------------

    /// Clean every raw file into the cleaned directory.
    pub async fn clean(
        &self,
        logger: &StageLogger,
        progress: &dyn StageProgress,
    ) -> Result<StageReport> {
        logger
            .scope(async { self.clean_files(logger.run_id(), progress) })
            .await
    }

    #[instrument(skip_all, fields(input = %self.config.paths.raw_dir.display()))]
    fn clean_files(&self, run_id: Uuid, progress: &dyn StageProgress) -> Result<StageReport> {
        let cleaned_dir = &self.config.paths.cleaned_dir;
        std::fs::create_dir_all(cleaned_dir).map_err(|e| AlmanacError::io(cleaned_dir, e))?;

        let files = RecordCleaner::raw_files(&self.config.paths.raw_dir)?;
        let cleaner = RecordCleaner::new(cleaned_dir);
        let mut report = StageReport::new(Stage::Clean, run_id);
        info!(files = files.len(), "cleaning raw files");

        for (index, path) in files.iter().enumerate() {
            let name = file_name(path);
            progress.item(&name, index + 1, files.len());
            info!(file = %name, "processing file");

            let entry = match cleaner.clean(path) {
                Ok(outcome) => ItemReport::completed(&name)
                    .with_rows(Some(outcome.stats.rows_in), Some(outcome.stats.rows_out)),
                Err(e) => {
                    error!(file = %name, error = %e, "clean failed");
                    ItemReport::failed(&name, e)
                }
            };
            report.push(entry);
        }

        report.finish();
        info!(
            completed = report.completed(),
            failed = report.failed(),
            "clean finished"
        );
        progress.done(&report);
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Load
    // -----------------------------------------------------------------------

    /// Load every cleaned file into the store.
    pub async fn load(
        &self,
        logger: &StageLogger,
        progress: &dyn StageProgress,
    ) -> Result<StageReport> {
        logger
            .scope(self.load_files(logger.run_id(), progress))
            .await
    }

    #[instrument(skip_all, fields(input = %self.config.paths.cleaned_dir.display()))]
    async fn load_files(&self, run_id: Uuid, progress: &dyn StageProgress) -> Result<StageReport> {
        let dir = &self.config.paths.cleaned_dir;
        let mut report = StageReport::new(Stage::Load, run_id);

        let files = SchemaLoader::cleaned_files(dir)?;
        if files.is_empty() {
            error!(dir = %dir.display(), "no _cleaned.csv files found");
            report.finish();
            progress.done(&report);
            return Ok(report);
        }

        let store = Store::open(&self.config.paths.database).await?;
        let loader = SchemaLoader::new(self.registry.clone());

        for (index, path) in files.iter().enumerate() {
            let name = file_name(path);
            progress.item(&name, index + 1, files.len());
            info!(file = %name, "processing file");

            let entry = match loader.load(path, &store).await {
                Ok(LoadOutcome::Loaded { rows, verified, .. }) => {
                    ItemReport::completed(&name).with_rows(Some(rows), Some(verified as usize))
                }
                Ok(LoadOutcome::Empty) => ItemReport::skipped(&name, "empty file"),
                Err(e) => {
                    error!(file = %name, error = %e, "load failed");
                    ItemReport::failed(&name, e)
                }
            };
            report.push(entry);
        }

        report.finish();
        info!(
            completed = report.completed(),
            skipped = report.skipped(),
            failed = report.failed(),
            "load finished"
        );
        progress.done(&report);
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // All stages
    // -----------------------------------------------------------------------

    /// Run scrape, clean and load in order, each with its own logger.
    pub async fn run_all(
        &self,
        settings: &LogSettings,
        progress: &dyn StageProgress,
    ) -> Result<Vec<StageReport>> {
        let mut reports = Vec::with_capacity(3);

        let logger = StageLogger::new(Stage::Scrape, settings)?;
        progress.phase("Scraping");
        reports.push(self.scrape(&logger, progress).await?);
        drop(logger);

        let logger = StageLogger::new(Stage::Clean, settings)?;
        progress.phase("Cleaning");
        reports.push(self.clean(&logger, progress).await?);
        drop(logger);

        let logger = StageLogger::new(Stage::Load, settings)?;
        progress.phase("Loading");
        reports.push(self.load(&logger, progress).await?);

        Ok(reports)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
