use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Listing category every location search lives under
const SEARCH_CATEGORY: &str = "/satilik-daire";

/// Search target and pagination convention of the listings site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    /// Scheme and host, no trailing slash
    pub base_url: String,
    /// Path of the search, e.g. `/satilik-daire/istanbul-kadikoy`
    pub search_path: String,
    /// Rows per result page; the site pages by row offset
    pub page_size: u32,
    /// Sort key passed to the site
    pub sorting: String,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            base_url: "https://www.sahibinden.com".to_string(),
            search_path: "/satilik-daire/istanbul".to_string(),
            page_size: 20,
            sorting: "date_desc".to_string(),
        }
    }
}

impl SearchParams {
    /// Index page URL for a 1-based page number
    pub fn page_url(&self, page_number: u32) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = if self.search_path.starts_with('/') {
            self.search_path.clone()
        } else {
            format!("/{}", self.search_path)
        };
        let mut url = format!("{}{}?sorting={}", base, path, self.sorting);
        if page_number > 1 {
            let offset = (page_number - 1) * self.page_size;
            url.push_str(&format!("&pagingOffset={}&pagingSize={}", offset, self.page_size));
        }
        url
    }

    /// Same site and paging, searching `location` instead
    pub fn for_location(&self, location: &Location) -> Self {
        Self {
            search_path: location.search_path(),
            ..self.clone()
        }
    }

    /// Resolve a site-relative link (`/ilan/...`) against the base URL
    pub fn absolutize(&self, href: &str) -> String {
        let href = href.trim();
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else if let Some(rest) = href.strip_prefix("//") {
            format!("https://{}", rest)
        } else if href.starts_with('/') {
            format!("{}{}", self.base_url.trim_end_matches('/'), href)
        } else {
            format!("{}/{}", self.base_url.trim_end_matches('/'), href)
        }
    }
}

/// A city, optionally narrowed to one district
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub district: Option<String>,
}

impl Location {
    /// Normalizes both parts into the site's lowercase slugs
    pub fn new(city: &str, district: Option<&str>) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidLocation(match district {
            Some(d) => format!("{}/{}", city, d),
            None => city.to_string(),
        });
        let city = slug(city).ok_or_else(invalid)?;
        let district = match district {
            Some(d) => Some(slug(d).ok_or_else(invalid)?),
            None => None,
        };
        Ok(Self { city, district })
    }

    /// `/satilik-daire/{city}` or `/satilik-daire/{city}-{district}`
    pub fn search_path(&self) -> String {
        match &self.district {
            Some(district) => format!("{}/{}-{}", SEARCH_CATEGORY, self.city, district),
            None => format!("{}/{}", SEARCH_CATEGORY, self.city),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.district {
            Some(district) => write!(f, "{}/{}", self.city, district),
            None => write!(f, "{}", self.city),
        }
    }
}

/// `istanbul` or `istanbul/kadikoy`
impl FromStr for Location {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((city, district)) => Self::new(city, Some(district)),
            None => Self::new(s, None),
        }
    }
}

/// Lowercase slug; `İ` lowercases to `i` plus a combining dot, which is dropped
fn slug(raw: &str) -> Option<String> {
    let slug: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != '\u{307}')
        .collect();
    let valid = !slug.is_empty()
        && !slug.starts_with('-')
        && slug.chars().all(|c| c.is_alphanumeric() || c == '-');
    valid.then_some(slug)
}

/// Inclusive bounds of the randomized wait before each non-first page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPolicy {
    pub min: Duration,
    pub max: Duration,
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(2000),
            max: Duration::from_millis(4000),
        }
    }
}

impl DelayPolicy {
    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Uniform sample from `[min, max]` at millisecond resolution
    pub fn sample(&self) -> Duration {
        use rand::Rng;

        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if max <= min {
            return self.min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_has_no_offset() {
        let params = SearchParams::default();
        assert_eq!(
            params.page_url(1),
            "https://www.sahibinden.com/satilik-daire/istanbul?sorting=date_desc"
        );
    }

    #[test]
    fn later_pages_use_row_offset() {
        let params = SearchParams {
            search_path: "satilik-daire/istanbul-kadikoy".to_string(),
            ..SearchParams::default()
        };
        assert_eq!(
            params.page_url(3),
            "https://www.sahibinden.com/satilik-daire/istanbul-kadikoy?sorting=date_desc&pagingOffset=40&pagingSize=20"
        );
    }

    #[test]
    fn absolutize_handles_relative_and_absolute_links() {
        let params = SearchParams::default();
        assert_eq!(
            params.absolutize("/ilan/emlak-konut-1/detay"),
            "https://www.sahibinden.com/ilan/emlak-konut-1/detay"
        );
        assert_eq!(
            params.absolutize("https://image5.example.test/a.jpg"),
            "https://image5.example.test/a.jpg"
        );
        assert_eq!(
            params.absolutize("//image5.example.test/a.jpg"),
            "https://image5.example.test/a.jpg"
        );
    }

    #[test]
    fn location_builds_city_and_district_paths() {
        let district: Location = "İstanbul/Kadikoy".parse().expect("location");
        assert_eq!(district.search_path(), "/satilik-daire/istanbul-kadikoy");
        assert_eq!(district.to_string(), "istanbul/kadikoy");

        let city = Location::new("ankara", None).expect("location");
        let params = SearchParams::default().for_location(&city);
        assert_eq!(
            params.page_url(1),
            "https://www.sahibinden.com/satilik-daire/ankara?sorting=date_desc"
        );
    }

    #[test]
    fn location_rejects_path_and_query_characters() {
        assert!("".parse::<Location>().is_err());
        assert!("istanbul/".parse::<Location>().is_err());
        assert!("istanbul?x=1".parse::<Location>().is_err());
        assert!(Location::new("../etc", None).is_err());
        assert!("istanbul/kadikoy/moda".parse::<Location>().is_err());
    }

    #[test]
    fn delay_samples_stay_in_bounds() {
        let policy = DelayPolicy {
            min: Duration::from_millis(10),
            max: Duration::from_millis(20),
        };
        for _ in 0..200 {
            let d = policy.sample();
            assert!(d >= policy.min && d <= policy.max, "{:?}", d);
        }
        assert_eq!(DelayPolicy::none().sample(), Duration::ZERO);
    }
}
