use thiserror::Error;

/// Failure from the rendering backend (browser or plain HTTP)
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("browser error: {0}")]
    Browser(String),
}

/// Why an index page produced no content
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("bot protection page served for {url}")]
    BotChallenge { url: String },
    #[error("empty body for {url}")]
    EmptyBody { url: String },
}

/// Read or write against the listing store failed
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("stored document for {key} is unreadable: {source}")]
    Serde {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Invalid settings or run request; the only error that prevents a run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("requested pages must be positive, got {0}")]
    InvalidPageCount(i64),
    #[error("requested pages {requested} exceeds ceiling of {ceiling}")]
    PageCountAboveCeiling { requested: i64, ceiling: u32 },
    #[error("user agent pool is empty")]
    EmptyUserAgentPool,
    #[error("delay bounds are inverted: min {min_ms}ms > max {max_ms}ms")]
    InvalidDelayBounds { min_ms: u64, max_ms: u64 },
    #[error("invalid location `{0}`")]
    InvalidLocation(String),
    #[error("invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}

/// Card selectors could not be compiled
#[derive(Debug, Error)]
#[error("invalid selector `{css}`: {reason}")]
pub struct ExtractError {
    pub css: String,
    pub reason: String,
}
