use crate::error::RenderError;
use async_trait::async_trait;

/// One page request handed to a renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
    /// Header name/value pairs; always carries `User-Agent`
    pub headers: Vec<(String, String)>,
}

impl PageRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Turns a URL into stable page content.
/// Implemented by the headless browser and the plain HTTP client, so the
/// fetcher does not care which one is behind it.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Fetch and render `request.url`, honouring the renderer's own timeout
    async fn render(&self, request: &PageRequest) -> Result<String, RenderError>;

    /// Name used in logs and the health endpoint
    fn name(&self) -> &'static str;
}
