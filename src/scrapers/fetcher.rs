use crate::error::FetchError;
use crate::models::PageFetchResult;
use crate::scrapers::extractor::has_result_rows;
use crate::scrapers::identity::{browser_headers, UserAgentPool};
use crate::scrapers::traits::{PageRequest, Renderer};
use crate::scrapers::types::{DelayPolicy, SearchParams};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Phrases of the interstitial pages served instead of results when the
/// site suspects automation
const BOT_INDICATORS: &[&str] = &["bir dakika", "please wait", "cloudflare", "captcha"];

/// Fetches one listing-index page at a time through a [`Renderer`]
pub struct PageFetcher {
    renderer: Arc<dyn Renderer>,
    params: SearchParams,
    identities: Arc<UserAgentPool>,
    delay: DelayPolicy,
}

impl PageFetcher {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        params: SearchParams,
        identities: UserAgentPool,
        delay: DelayPolicy,
    ) -> Self {
        Self {
            renderer,
            params,
            identities: Arc::new(identities),
            delay,
        }
    }

    /// Fetcher for another search sharing this one's renderer, identity
    /// rotation and delay policy
    pub fn retarget(&self, params: SearchParams) -> Self {
        Self {
            renderer: Arc::clone(&self.renderer),
            params,
            identities: Arc::clone(&self.identities),
            delay: self.delay,
        }
    }

    pub fn target(&self) -> &SearchParams {
        &self.params
    }

    pub fn renderer_name(&self) -> &'static str {
        self.renderer.name()
    }

    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    /// Fetch `page_number`, waiting the randomized delay first unless it is
    /// the first page of the run. Failures come back inside the result.
    pub async fn fetch(&self, page_number: u32) -> PageFetchResult {
        self.fetch_with_backoff(page_number, Duration::ZERO).await
    }

    /// Like [`fetch`](Self::fetch) with `extra` added on top of the sampled delay.
    /// Used by the orchestrator when re-attempting a failed page.
    pub async fn fetch_with_backoff(&self, page_number: u32, extra: Duration) -> PageFetchResult {
        let wait = if page_number > 1 {
            self.delay.sample() + extra
        } else {
            extra
        };
        if !wait.is_zero() {
            debug!("Waiting {:?} before page {}", wait, page_number);
            tokio::time::sleep(wait).await;
        }

        let url = self.params.page_url(page_number);
        let user_agent = self.identities.pick().to_string();
        let request = PageRequest {
            url: url.clone(),
            headers: browser_headers(&user_agent),
        };

        let outcome = match self.renderer.render(&request).await {
            Ok(html) => check_content(&url, html),
            Err(err) => Err(FetchError::from(err)),
        };

        let fetched_at = Utc::now();
        match outcome {
            Ok(html) => {
                info!("✅ Page {} fetched ({} bytes)", page_number, html.len());
                PageFetchResult {
                    page_number,
                    url,
                    user_agent,
                    html_content: Some(html),
                    fetch_error: None,
                    fetched_at,
                }
            }
            Err(err) => {
                warn!("❌ Page {} failed: {}", page_number, err);
                PageFetchResult {
                    page_number,
                    url,
                    user_agent,
                    html_content: None,
                    fetch_error: Some(err),
                    fetched_at,
                }
            }
        }
    }
}

fn check_content(url: &str, html: String) -> Result<String, FetchError> {
    if html.trim().is_empty() {
        return Err(FetchError::EmptyBody {
            url: url.to_string(),
        });
    }
    // Result pages may mention these phrases in scripts; only a page with no rows is a challenge
    let lowered = html.to_lowercase();
    if BOT_INDICATORS.iter().any(|needle| lowered.contains(needle)) && !has_result_rows(&html) {
        return Err(FetchError::BotChallenge {
            url: url.to_string(),
        });
    }
    Ok(html)
}
