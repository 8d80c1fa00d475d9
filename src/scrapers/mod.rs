pub mod browser;
pub mod extractor;
pub mod fetcher;
pub mod fsbo;
pub mod http;
pub mod identity;
pub mod traits;
pub mod types;

pub use browser::ChromeRenderer;
pub use extractor::ListingExtractor;
pub use fetcher::PageFetcher;
pub use http::HttpRenderer;
pub use traits::Renderer;
