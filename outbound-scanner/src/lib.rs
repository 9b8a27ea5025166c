pub mod crawler;
pub mod domain;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod result;
pub mod sink;

pub use crawler::{Crawler, ProgressCallback};
pub use domain::{LinkClass, authority_of, is_same_site};
pub use error::ScanError;
pub use extract::extract_links;
pub use fetcher::{FailureKind, FetchResult, Transport, TransportConfig};
pub use result::{CrawlState, CrawlSummary, PageResult, PageStatus};
pub use sink::ExternalLinkSink;
