use crate::error::{FetchError, StoreError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One observed for-sale-by-owner listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    /// Identifier assigned by the listings site; the only dedup key
    pub external_id: String,
    pub title: Option<String>,
    pub price: Option<i64>,
    pub price_text: Option<String>,
    pub location_text: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub posted_at: Option<NaiveDate>,
    pub posted_text: Option<String>,
    pub rooms: Option<String>,
    pub area_sqm: Option<i64>,
    pub building_age: Option<i64>,
    pub fsbo_score: u8,
    pub source_url: Option<String>,
    pub first_seen_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub raw_hash: String,
}

impl ListingRecord {
    /// Empty candidate for `external_id`; the extractor fills in whatever the card yields.
    pub fn candidate(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            title: None,
            price: None,
            price_text: None,
            location_text: None,
            url: None,
            image_urls: Vec::new(),
            posted_at: None,
            posted_text: None,
            rooms: None,
            area_sqm: None,
            building_age: None,
            fsbo_score: 0,
            source_url: None,
            first_seen_at: None,
            last_seen_at: None,
            raw_hash: String::new(),
        }
    }

    /// Fingerprint of the scraped fields.
    ///
    /// Fields are visited in a fixed order and whitespace-normalized, so markup
    /// reflow on the site does not register as a content change. Timestamps,
    /// `source_url` and the derived score are left out.
    pub fn compute_hash(&self) -> String {
        let price = self.price.map(|p| p.to_string());
        let area = self.area_sqm.map(|a| a.to_string());
        let age = self.building_age.map(|a| a.to_string());
        let posted = self.posted_at.map(|d| d.to_string());
        let fields: [(&str, Option<&str>); 11] = [
            ("external_id", Some(self.external_id.as_str())),
            ("title", self.title.as_deref()),
            ("price", price.as_deref()),
            ("price_text", self.price_text.as_deref()),
            ("location", self.location_text.as_deref()),
            ("url", self.url.as_deref()),
            ("posted_at", posted.as_deref()),
            ("posted_text", self.posted_text.as_deref()),
            ("rooms", self.rooms.as_deref()),
            ("area_sqm", area.as_deref()),
            ("building_age", age.as_deref()),
        ];

        let mut hasher = Sha256::new();
        for (name, value) in fields {
            hasher.update(name.as_bytes());
            hasher.update([0x1f]);
            hasher.update(normalize_text(value.unwrap_or("")).as_bytes());
            hasher.update([0x1e]);
        }
        for image in &self.image_urls {
            hasher.update(b"image");
            hasher.update([0x1f]);
            hasher.update(normalize_text(image).as_bytes());
            hasher.update([0x1e]);
        }
        hex::encode(hasher.finalize())
    }

    pub fn with_hash(mut self) -> Self {
        self.raw_hash = self.compute_hash();
        self
    }
}

/// Trim and collapse runs of whitespace to a single space
pub fn normalize_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Outcome of fetching one index page. Never persisted.
#[derive(Debug, Clone)]
pub struct PageFetchResult {
    pub page_number: u32,
    pub url: String,
    pub user_agent: String,
    pub html_content: Option<String>,
    pub fetch_error: Option<FetchError>,
    pub fetched_at: DateTime<Utc>,
}

impl PageFetchResult {
    pub fn is_ok(&self) -> bool {
        self.fetch_error.is_none() && self.html_content.is_some()
    }
}

/// Where a run is in its page loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "page", rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    FetchingPage(u32),
    ExtractingPage(u32),
    ReconcilingPage(u32),
    Completed,
    /// Reserved for a hard-stop condition; no current policy enters it.
    #[allow(dead_code)]
    AbortedEarly,
}

/// Aggregate outcome of one run, returned to the trigger and logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Search path the run walked, e.g. `/satilik-daire/istanbul-kadikoy`
    pub location: String,
    pub requested_pages: u32,
    pub pages_fetched_ok: u32,
    pub pages_failed: u32,
    pub fetch_attempts: u32,
    pub records_extracted: u32,
    pub records_inserted: u32,
    pub records_updated: u32,
    pub records_unchanged: u32,
    pub records_failed: u32,
    pub parse_anomalies: u32,
    /// Extracted listings scoring at least [`FSBO_CANDIDATE_MIN_SCORE`]
    pub fsbo_candidates: u32,
    /// Highest-scoring candidates, best first
    pub top_fsbo: Vec<ListingRecord>,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn start(location: impl Into<String>, requested_pages: u32, started_at: DateTime<Utc>) -> Self {
        Self {
            location: location.into(),
            requested_pages,
            pages_fetched_ok: 0,
            pages_failed: 0,
            fetch_attempts: 0,
            records_extracted: 0,
            records_inserted: 0,
            records_updated: 0,
            records_unchanged: 0,
            records_failed: 0,
            parse_anomalies: 0,
            fsbo_candidates: 0,
            top_fsbo: Vec::new(),
            state: RunState::NotStarted,
            started_at,
            finished_at: None,
        }
    }

    pub fn record_outcome(&mut self, outcome: &ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Inserted => self.records_inserted += 1,
            ReconcileOutcome::Updated => self.records_updated += 1,
            ReconcileOutcome::Unchanged => self.records_unchanged += 1,
            ReconcileOutcome::Failed(_) => self.records_failed += 1,
        }
    }

    /// Count `record` if it looks owner-posted and keep the best few.
    /// Ties keep the order in which listings were seen.
    pub fn note_candidate(&mut self, record: &ListingRecord) {
        if record.fsbo_score < FSBO_CANDIDATE_MIN_SCORE {
            return;
        }
        self.fsbo_candidates += 1;
        let slot = self
            .top_fsbo
            .iter()
            .position(|kept| kept.fsbo_score < record.fsbo_score)
            .unwrap_or(self.top_fsbo.len());
        if slot < TOP_FSBO_LEN {
            self.top_fsbo.insert(slot, record.clone());
            self.top_fsbo.truncate(TOP_FSBO_LEN);
        }
    }

    pub fn finish(&mut self, finished_at: DateTime<Utc>) {
        self.state = RunState::Completed;
        self.finished_at = Some(finished_at);
    }
}

/// Minimum score for a listing to count as an FSBO candidate
pub const FSBO_CANDIDATE_MIN_SCORE: u8 = 5;

/// How many candidates a summary keeps
pub const TOP_FSBO_LEN: usize = 3;

/// Runs over every configured location, in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiRunReport {
    pub locations: Vec<RunSummary>,
    pub total_listings: u32,
    pub total_fsbo: u32,
    /// Locations with at least one page fetched
    pub locations_scraped: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl MultiRunReport {
    pub fn start(started_at: DateTime<Utc>) -> Self {
        Self {
            locations: Vec::new(),
            total_listings: 0,
            total_fsbo: 0,
            locations_scraped: 0,
            started_at,
            finished_at: None,
        }
    }

    pub fn add(&mut self, summary: RunSummary) {
        self.total_listings += summary.records_extracted;
        self.total_fsbo += summary.fsbo_candidates;
        if summary.pages_fetched_ok > 0 {
            self.locations_scraped += 1;
        }
        self.locations.push(summary);
    }

    pub fn finish(&mut self, finished_at: DateTime<Utc>) {
        self.finished_at = Some(finished_at);
    }
}

/// What the reconciler did with one candidate
#[derive(Debug)]
pub enum ReconcileOutcome {
    Inserted,
    Updated,
    Unchanged,
    Failed(StoreError),
}
