use crate::config::PipelineConfig;
use crate::error::ConfigError;
use crate::models::{MultiRunReport, PageFetchResult, ReconcileOutcome, RunState, RunSummary};
use crate::pipeline::reconcile::Reconciler;
use crate::scrapers::extractor::ListingExtractor;
use crate::scrapers::fetcher::PageFetcher;
use crate::scrapers::types::Location;
use chrono::Utc;
use tracing::{debug, info, warn};

/// Drives one bounded run: pages strictly in order, each page's records
/// reconciled before the next page is requested.
pub struct Orchestrator {
    config: PipelineConfig,
    fetcher: PageFetcher,
    extractor: ListingExtractor,
    reconciler: Reconciler,
}

impl Orchestrator {
    pub fn new(
        config: PipelineConfig,
        fetcher: PageFetcher,
        extractor: ListingExtractor,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            config,
            fetcher,
            extractor,
            reconciler,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &PageFetcher {
        &self.fetcher
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub async fn run_default(&self) -> Result<RunSummary, ConfigError> {
        self.run(self.config.default_pages as i64).await
    }

    /// Run over pages `1..=requested_pages` of the configured search.
    ///
    /// Only an invalid page count is an error; it is returned before any
    /// fetch or store access. Page and record failures land in the summary.
    pub async fn run(&self, requested_pages: i64) -> Result<RunSummary, ConfigError> {
        self.run_with(&self.fetcher, requested_pages).await
    }

    /// Same as [`run`](Self::run) against one city or district search
    pub async fn run_location(&self, location: &Location, requested_pages: i64) -> Result<RunSummary, ConfigError> {
        let fetcher = self.fetcher.retarget(self.config.search.for_location(location));
        self.run_with(&fetcher, requested_pages).await
    }

    /// Walk every configured location for `requested_pages` pages each,
    /// pausing for the normal page delay between locations
    pub async fn run_locations(&self, requested_pages: i64) -> Result<MultiRunReport, ConfigError> {
        self.config.validate_requested_pages(requested_pages)?;
        let mut report = MultiRunReport::start(Utc::now());

        for (index, location) in self.config.locations.iter().enumerate() {
            if index > 0 {
                let pause = self.config.delay.sample();
                if !pause.is_zero() {
                    debug!("Waiting {:?} before {}", pause, location);
                    tokio::time::sleep(pause).await;
                }
            }
            report.add(self.run_location(location, requested_pages).await?);
        }

        report.finish(Utc::now());
        info!(
            "🗺️ {} of {} locations scraped: {} listings, {} FSBO candidates",
            report.locations_scraped,
            self.config.locations.len(),
            report.total_listings,
            report.total_fsbo
        );
        Ok(report)
    }

    async fn run_with(&self, fetcher: &PageFetcher, requested_pages: i64) -> Result<RunSummary, ConfigError> {
        let pages = self.config.validate_requested_pages(requested_pages)?;
        let search_path = fetcher.target().search_path.clone();
        let mut summary = RunSummary::start(search_path.as_str(), pages, Utc::now());

        info!(
            "🔍 Starting run over {} page(s) of {} via {} renderer",
            pages,
            search_path,
            fetcher.renderer_name()
        );

        for page in 1..=pages {
            self.transition(&mut summary, RunState::FetchingPage(page));
            let fetched = self.fetch_page(fetcher, page, &mut summary).await;

            let html = match (fetched.html_content, fetched.fetch_error) {
                (Some(html), None) => html,
                (_, err) => {
                    summary.pages_failed += 1;
                    warn!(
                        "Skipping page {} ({}): {}",
                        page,
                        fetched.url,
                        err.map(|e| e.to_string()).unwrap_or_else(|| "no content".to_string())
                    );
                    continue;
                }
            };
            summary.pages_fetched_ok += 1;
            debug!(
                "Page {} fetched at {} as {}",
                fetched.page_number, fetched.fetched_at, fetched.user_agent
            );

            self.transition(&mut summary, RunState::ExtractingPage(page));
            let extracted = self.extractor.extract(&html);
            summary.parse_anomalies += extracted.anomalies;
            summary.records_extracted += extracted.records.len() as u32;

            self.transition(&mut summary, RunState::ReconcilingPage(page));
            for mut record in extracted {
                record.source_url = Some(fetched.url.clone());
                summary.note_candidate(&record);
                let outcome = self.reconciler.reconcile(record).await;
                if let ReconcileOutcome::Failed(cause) = &outcome {
                    debug!("Record abandoned on page {}: {}", page, cause);
                }
                summary.record_outcome(&outcome);
            }
        }

        summary.finish(Utc::now());
        info!(
            "✅ Run of {} finished: pages ok={} failed={}, records extracted={} inserted={} updated={} unchanged={} failed={}, fsbo={}",
            summary.location,
            summary.pages_fetched_ok,
            summary.pages_failed,
            summary.records_extracted,
            summary.records_inserted,
            summary.records_updated,
            summary.records_unchanged,
            summary.records_failed,
            summary.fsbo_candidates
        );
        Ok(summary)
    }

    /// Fetch with the configured number of re-attempts; each re-attempt
    /// waits `attempt * retry_backoff` on top of the normal delay.
    async fn fetch_page(&self, fetcher: &PageFetcher, page: u32, summary: &mut RunSummary) -> PageFetchResult {
        let mut attempt = 0;
        loop {
            summary.fetch_attempts += 1;
            let result = if attempt == 0 {
                fetcher.fetch(page).await
            } else {
                let extra = self.config.retry_backoff * attempt;
                fetcher.fetch_with_backoff(page, extra).await
            };
            if result.is_ok() || attempt >= self.config.fetch_retries {
                return result;
            }
            attempt += 1;
            debug!("Retrying page {} (attempt {})", page, attempt + 1);
        }
    }

    fn transition(&self, summary: &mut RunSummary, next: RunState) {
        debug!("{:?} -> {:?}", summary.state, next);
        summary.state = next;
    }
}
