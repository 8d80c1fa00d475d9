use crate::error::ConfigError;
use crate::scrapers::identity::{RotationMode, UserAgentPool, DEFAULT_USER_AGENTS};
use crate::scrapers::types::{DelayPolicy, Location, SearchParams};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererKind {
    Chrome,
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    File,
    Memory,
}

/// Everything a run needs, injected at construction
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub search: SearchParams,
    /// Searches walked by a multi-location run
    pub locations: Vec<Location>,
    pub default_pages: u32,
    /// Upper bound on pages per run
    pub max_pages: u32,
    pub delay: DelayPolicy,
    pub fetch_timeout: Duration,
    /// Re-attempts of a failed page before it counts as failed
    pub fetch_retries: u32,
    pub retry_backoff: Duration,
    pub render_settle: Duration,
    pub user_agents: Vec<String>,
    pub rotation: RotationMode,
    pub renderer: RendererKind,
    pub store: StoreKind,
    pub store_dir: PathBuf,
    pub port: u16,
}

/// High-value searches walked when no `FSBO_LOCATIONS` is given
const DEFAULT_LOCATIONS: &[(&str, &str)] = &[
    ("istanbul", "kadikoy"),
    ("istanbul", "atasehir"),
    ("istanbul", "besiktas"),
    ("istanbul", "beylikduzu"),
    ("ankara", "cankaya"),
];

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            search: SearchParams::default(),
            locations: DEFAULT_LOCATIONS
                .iter()
                .map(|(city, district)| Location {
                    city: city.to_string(),
                    district: Some(district.to_string()),
                })
                .collect(),
            default_pages: 3,
            max_pages: 10,
            delay: DelayPolicy::default(),
            fetch_timeout: Duration::from_secs(15),
            fetch_retries: 0,
            retry_backoff: Duration::from_secs(2),
            render_settle: Duration::from_secs(2),
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            rotation: RotationMode::Random,
            renderer: RendererKind::Chrome,
            store: StoreKind::File,
            store_dir: PathBuf::from("./data/fsbo_listings"),
            port: 8080,
        }
    }
}

impl PipelineConfig {
    /// Read `FSBO_*` variables, falling back to defaults for anything unset
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let search = SearchParams {
            base_url: env_or("FSBO_BASE_URL", defaults.search.base_url.clone()),
            search_path: env_or("FSBO_SEARCH_PATH", defaults.search.search_path.clone()),
            page_size: env_parse("FSBO_PAGE_SIZE", defaults.search.page_size)?,
            sorting: env_or("FSBO_SORTING", defaults.search.sorting.clone()),
        };

        let user_agents = match std::env::var("FSBO_USER_AGENTS") {
            Ok(raw) => raw
                .split('|')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => defaults.user_agents.clone(),
        };

        let locations = match std::env::var("FSBO_LOCATIONS") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse::<Location>)
                .collect::<Result<Vec<Location>, ConfigError>>()?,
            Err(_) => defaults.locations.clone(),
        };

        let renderer = match env_or("FSBO_RENDERER", "chrome".to_string()).to_ascii_lowercase().as_str() {
            "chrome" | "browser" => RendererKind::Chrome,
            "http" => RendererKind::Http,
            other => {
                return Err(ConfigError::InvalidSetting {
                    name: "FSBO_RENDERER",
                    reason: format!("expected chrome or http, got `{}`", other),
                })
            }
        };

        let store = match env_or("FSBO_STORE", "file".to_string()).to_ascii_lowercase().as_str() {
            "file" => StoreKind::File,
            "memory" => StoreKind::Memory,
            other => {
                return Err(ConfigError::InvalidSetting {
                    name: "FSBO_STORE",
                    reason: format!("expected file or memory, got `{}`", other),
                })
            }
        };

        let config = Self {
            search,
            locations,
            default_pages: env_parse("FSBO_DEFAULT_PAGES", defaults.default_pages)?,
            max_pages: env_parse("FSBO_MAX_PAGES", defaults.max_pages)?,
            delay: DelayPolicy {
                min: Duration::from_millis(env_parse("FSBO_DELAY_MIN_MS", 2000u64)?),
                max: Duration::from_millis(env_parse("FSBO_DELAY_MAX_MS", 4000u64)?),
            },
            fetch_timeout: Duration::from_secs(env_parse("FSBO_FETCH_TIMEOUT_SECS", 15u64)?),
            fetch_retries: env_parse("FSBO_FETCH_RETRIES", defaults.fetch_retries)?,
            retry_backoff: Duration::from_millis(env_parse("FSBO_RETRY_BACKOFF_MS", 2000u64)?),
            render_settle: Duration::from_millis(env_parse("FSBO_RENDER_SETTLE_MS", 2000u64)?),
            user_agents,
            rotation: env_parse("FSBO_UA_ROTATION", defaults.rotation)?,
            renderer,
            store,
            store_dir: std::env::var("FSBO_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_dir),
            port: env_parse("PORT", defaults.port)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user_agents.is_empty() {
            return Err(ConfigError::EmptyUserAgentPool);
        }
        if self.delay.min > self.delay.max {
            return Err(ConfigError::InvalidDelayBounds {
                min_ms: self.delay.min.as_millis() as u64,
                max_ms: self.delay.max.as_millis() as u64,
            });
        }
        if self.max_pages == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "FSBO_MAX_PAGES",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.default_pages == 0 || self.default_pages > self.max_pages {
            return Err(ConfigError::InvalidSetting {
                name: "FSBO_DEFAULT_PAGES",
                reason: format!("must be within 1..={}", self.max_pages),
            });
        }
        if self.locations.is_empty() {
            return Err(ConfigError::InvalidSetting {
                name: "FSBO_LOCATIONS",
                reason: "at least one location is required".to_string(),
            });
        }
        if self.search.page_size == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "FSBO_PAGE_SIZE",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Check a caller-supplied page count against the ceiling
    pub fn validate_requested_pages(&self, requested: i64) -> Result<u32, ConfigError> {
        if requested <= 0 {
            return Err(ConfigError::InvalidPageCount(requested));
        }
        if requested > self.max_pages as i64 {
            return Err(ConfigError::PageCountAboveCeiling {
                requested,
                ceiling: self.max_pages,
            });
        }
        Ok(requested as u32)
    }

    pub fn user_agent_pool(&self) -> UserAgentPool {
        UserAgentPool::new(self.user_agents.clone(), self.rotation)
    }
}

fn env_or(name: &str, default: String) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}

fn env_parse<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidSetting {
            name,
            reason: e.to_string(),
        }),
        _ => Ok(default),
    }
}
