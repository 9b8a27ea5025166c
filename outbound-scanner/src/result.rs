use crate::fetcher::FailureKind;
use serde::{Deserialize, Serialize};

/// Position of a crawl in its round-by-round state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "depth", rename_all = "snake_case")]
pub enum CrawlState {
    Idle,
    Fetching(usize),
    Aggregating(usize),
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum PageStatus {
    Fetched,
    NonOk(u16),
    Failed(FailureKind),
}

/// What one frontier URL contributed to its round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    pub url: String,
    /// Remaining depth degree of the round that fetched this page.
    pub depth: usize,
    pub status: PageStatus,
    pub external_links: Vec<String>,
}

impl PageResult {
    pub fn new(url: String, depth: usize, status: PageStatus) -> Self {
        Self {
            url,
            depth,
            status,
            external_links: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub rounds: usize,
    pub pages_fetched: usize,
    pub non_ok: usize,
    pub transient_failures: usize,
    /// Branches that ended in an error other than a transient failure.
    pub abandoned: usize,
    /// Lines appended to the sink during this crawl.
    pub external_links_written: usize,
    /// Links discovered in the last round that were never crawled.
    pub final_frontier_len: usize,
    pub state: CrawlState,
}

impl CrawlSummary {
    pub fn new() -> Self {
        Self {
            rounds: 0,
            pages_fetched: 0,
            non_ok: 0,
            transient_failures: 0,
            abandoned: 0,
            external_links_written: 0,
            final_frontier_len: 0,
            state: CrawlState::Idle,
        }
    }

    pub fn record(&mut self, page: &PageResult) {
        match page.status {
            PageStatus::Fetched => self.pages_fetched += 1,
            PageStatus::NonOk(_) => self.non_ok += 1,
            PageStatus::Failed(_) => self.transient_failures += 1,
        }
    }
}

impl Default for CrawlSummary {
    fn default() -> Self {
        Self::new()
    }
}
