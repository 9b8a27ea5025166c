use crate::domain::{LinkClass, authority_of, classify};
use crate::error::Result;
use crate::extract::extract_links;
use crate::fetcher::{FetchResult, Transport};
use crate::result::{CrawlState, CrawlSummary, PageResult, PageStatus};
use crate::sink::ExternalLinkSink;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Invoked with (remaining depth, url) as each frontier URL is dispatched.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Breadth-first crawler that follows only external links.
///
/// Each round fetches the whole frontier concurrently, waits for every
/// fetch to finish, then makes the external links found in that round the
/// next frontier. Nothing is deduplicated: a URL seen in an earlier round is
/// fetched again if it reappears.
pub struct Crawler {
    transport: Transport,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            progress_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Crawl `depth_degree` rounds starting from `seeds`, appending every
    /// external link found to `sink`.
    ///
    /// Per-URL failures never abort the crawl; they only shrink the next
    /// frontier. The crawl ends when the depth is spent or a round yields
    /// no external links.
    pub async fn crawl(
        &self,
        seeds: Vec<String>,
        depth_degree: usize,
        sink: &ExternalLinkSink,
    ) -> CrawlSummary {
        let mut summary = CrawlSummary::new();
        let written_before = sink.written();
        let mut frontier = seeds;
        let mut depth = depth_degree;

        info!(
            "Starting crawl of {} seed(s) with depth {} ({} connection(s), {:?} timeout)",
            frontier.len(),
            depth,
            self.transport.max_connections(),
            self.transport.timeout()
        );

        while depth > 0 && !frontier.is_empty() {
            self.transition(&mut summary, CrawlState::Fetching(depth));
            info!(
                "Round {}: fetching {} URL(s)",
                summary.rounds + 1,
                frontier.len()
            );

            let outcomes = join_all(
                frontier
                    .iter()
                    .map(|url| self.process_page(url, depth, sink)),
            )
            .await;

            self.transition(&mut summary, CrawlState::Aggregating(depth));

            let mut next_frontier = Vec::new();
            for (url, outcome) in frontier.iter().zip(outcomes) {
                match outcome {
                    Ok(page) => {
                        summary.record(&page);
                        next_frontier.extend(page.external_links);
                    }
                    Err(e) => {
                        warn!("Abandoning {}: {}", url, e);
                        summary.abandoned += 1;
                    }
                }
            }

            summary.rounds += 1;
            depth -= 1;
            frontier = next_frontier;
        }

        summary.final_frontier_len = frontier.len();
        summary.external_links_written = sink.written() - written_before;
        self.transition(&mut summary, CrawlState::Done);

        info!(
            "Crawl complete after {} round(s). {} external link(s) written to {}",
            summary.rounds,
            summary.external_links_written,
            sink.path().display()
        );

        summary
    }

    fn transition(&self, summary: &mut CrawlSummary, next: CrawlState) {
        debug!("Crawl state {:?} -> {:?}", summary.state, next);
        summary.state = next;
    }

    /// Fetch one URL and persist the external links on it.
    ///
    /// Links are classified against this page's own authority, not the seed's.
    async fn process_page(
        &self,
        url: &str,
        depth: usize,
        sink: &ExternalLinkSink,
    ) -> Result<PageResult> {
        if let Some(ref callback) = self.progress_callback {
            callback(depth, url.to_string());
        }

        let authority = authority_of(url)?;

        let body = match self.transport.fetch(url).await? {
            FetchResult::Success(body) => body,
            FetchResult::NonOkStatus(code) => {
                return Ok(PageResult::new(url.to_string(), depth, PageStatus::NonOk(code)));
            }
            FetchResult::Failure(kind) => {
                warn!("Fetch of {} failed: {:?}", url, kind);
                return Ok(PageResult::new(
                    url.to_string(),
                    depth,
                    PageStatus::Failed(kind),
                ));
            }
        };

        let mut page = PageResult::new(url.to_string(), depth, PageStatus::Fetched);

        for link in extract_links(&body) {
            match classify(&link, authority) {
                LinkClass::External => {
                    debug!("External link on {}: {}", url, link);
                    sink.persist(&link).await?;
                    page.external_links.push(link);
                }
                LinkClass::SameSite => debug!("Same site, skipping {}", link),
                LinkClass::NonHttp => {}
            }
        }

        debug!(
            "{} yielded {} external link(s)",
            url,
            page.external_links.len()
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::TransportConfig;
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn test_crawler(timeout: Duration) -> Crawler {
        let transport = Transport::with_config(TransportConfig {
            max_connections: 8,
            timeout,
            trust_env: false,
            ..TransportConfig::default()
        })
        .unwrap();
        Crawler::new(transport)
    }

    async fn mount_page(server: &MockServer, route: &str, links: &[String]) {
        let mut html = String::from("<html><body>");
        for link in links {
            html.push_str(&format!(r#"<a href="{}">link</a>"#, link));
        }
        html.push_str("</body></html>");

        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(html.as_bytes()),
            )
            .mount(server)
            .await;
    }

    fn sink_lines(dir: &TempDir) -> Vec<String> {
        std::fs::read_to_string(dir.path().join("links.txt"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    async fn open_sink(dir: &TempDir) -> ExternalLinkSink {
        ExternalLinkSink::open(dir.path().join("links.txt"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_only_external_links_are_persisted() {
        let site_a = MockServer::start().await;
        let site_b = MockServer::start().await;
        let a = site_a.uri();
        let b = site_b.uri();

        mount_page(
            &site_a,
            "/",
            &[
                format!("{}/x", a),
                format!("{}/y", b),
                "/relative".to_string(),
                format!("{}/z", a),
            ],
        )
        .await;

        let dir = TempDir::new().unwrap();
        let sink = open_sink(&dir).await;
        let crawler = test_crawler(Duration::from_secs(5));

        let summary = crawler.crawl(vec![format!("{}/", a)], 1, &sink).await;

        assert_eq!(sink_lines(&dir), vec![format!("{}/y", b)]);
        assert_eq!(summary.rounds, 1);
        assert_eq!(summary.pages_fetched, 1);
        assert_eq!(summary.external_links_written, 1);
        assert_eq!(summary.final_frontier_len, 1);
        assert_eq!(summary.state, CrawlState::Done);
    }

    #[tokio::test]
    async fn test_zero_depth_makes_no_fetches() {
        let site = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&site)
            .await;

        let dir = TempDir::new().unwrap();
        let sink = open_sink(&dir).await;
        let crawler = test_crawler(Duration::from_secs(5));

        let summary = crawler.crawl(vec![format!("{}/", site.uri())], 0, &sink).await;

        assert_eq!(summary.rounds, 0);
        assert_eq!(summary.state, CrawlState::Done);
        assert_eq!(summary.final_frontier_len, 1);
        assert!(sink_lines(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_empty_seeds_finish_immediately() {
        let dir = TempDir::new().unwrap();
        let sink = open_sink(&dir).await;
        let crawler = test_crawler(Duration::from_secs(5));

        let summary = crawler.crawl(Vec::new(), 3, &sink).await;

        assert_eq!(summary.rounds, 0);
        assert_eq!(summary.state, CrawlState::Done);
        assert_eq!(sink.written(), 0);
    }

    #[tokio::test]
    async fn test_two_site_cycle_stops_at_depth() {
        let site_a = MockServer::start().await;
        let site_b = MockServer::start().await;
        let a_root = format!("{}/", site_a.uri());
        let b_root = format!("{}/", site_b.uri());

        let mut a_html = String::from("<html><body>");
        a_html.push_str(&format!(r#"<a href="{}">b</a>"#, b_root));
        a_html.push_str("</body></html>");
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(a_html.as_bytes()))
            .expect(1)
            .mount(&site_a)
            .await;

        mount_page(&site_b, "/", &[a_root.clone()]).await;

        let dir = TempDir::new().unwrap();
        let sink = open_sink(&dir).await;
        let crawler = test_crawler(Duration::from_secs(5));

        let summary = crawler.crawl(vec![a_root.clone()], 2, &sink).await;

        let written: HashSet<String> = sink_lines(&dir).into_iter().collect();
        let expected: HashSet<String> = [a_root, b_root].into_iter().collect();
        assert_eq!(written, expected);
        assert_eq!(summary.rounds, 2);
        assert_eq!(summary.pages_fetched, 2);
        assert_eq!(summary.final_frontier_len, 1);
        assert_eq!(summary.state, CrawlState::Done);
    }

    #[tokio::test]
    async fn test_timeout_does_not_block_round() {
        let slow = MockServer::start().await;
        let fast = MockServer::start().await;
        let elsewhere = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(format!(r#"<a href="{}/never">n</a>"#, elsewhere.uri()).as_bytes())
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&slow)
            .await;
        mount_page(&fast, "/", &[format!("{}/found", elsewhere.uri())]).await;

        let dir = TempDir::new().unwrap();
        let sink = open_sink(&dir).await;
        let crawler = test_crawler(Duration::from_millis(300));

        let summary = crawler
            .crawl(
                vec![format!("{}/", slow.uri()), format!("{}/", fast.uri())],
                1,
                &sink,
            )
            .await;

        assert_eq!(sink_lines(&dir), vec![format!("{}/found", elsewhere.uri())]);
        assert_eq!(summary.transient_failures, 1);
        assert_eq!(summary.pages_fetched, 1);
        assert_eq!(summary.rounds, 1);
    }

    #[tokio::test]
    async fn test_all_fetches_failing_still_completes() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let dir = TempDir::new().unwrap();
        let sink = open_sink(&dir).await;
        let crawler = test_crawler(Duration::from_secs(5));

        let summary = crawler
            .crawl(vec![format!("http://127.0.0.1:{}/", port)], 5, &sink)
            .await;

        assert_eq!(summary.rounds, 1);
        assert_eq!(summary.transient_failures, 1);
        assert_eq!(summary.final_frontier_len, 0);
        assert_eq!(summary.state, CrawlState::Done);
    }

    #[tokio::test]
    async fn test_bad_seeds_are_abandoned_not_fatal() {
        let site = MockServer::start().await;
        let other = MockServer::start().await;
        mount_page(&site, "/", &[format!("{}/", other.uri())]).await;

        let dir = TempDir::new().unwrap();
        let sink = open_sink(&dir).await;
        let crawler = test_crawler(Duration::from_secs(5));

        let summary = crawler
            .crawl(
                vec![
                    "no-scheme-here".to_string(),
                    "http://exa mple.com/".to_string(),
                    format!("{}/", site.uri()),
                ],
                1,
                &sink,
            )
            .await;

        assert_eq!(summary.abandoned, 2);
        assert_eq!(summary.pages_fetched, 1);
        assert_eq!(sink_lines(&dir), vec![format!("{}/", other.uri())]);
    }

    #[tokio::test]
    async fn test_non_ok_page_yields_no_links() {
        let site = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_bytes(b"<a href=\"http://elsewhere.example/\">x</a>"),
            )
            .mount(&site)
            .await;

        let dir = TempDir::new().unwrap();
        let sink = open_sink(&dir).await;
        let crawler = test_crawler(Duration::from_secs(5));

        let summary = crawler.crawl(vec![format!("{}/", site.uri())], 2, &sink).await;

        assert_eq!(summary.non_ok, 1);
        assert_eq!(summary.rounds, 1);
        assert!(sink_lines(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_link_with_line_break_is_not_recorded() {
        let site = MockServer::start().await;
        let target = MockServer::start().await;
        let clean = format!("{}/clean", target.uri());
        mount_page(
            &site,
            "/",
            &[format!("{}/x\nhttp://forged.example/", target.uri()), clean.clone()],
        )
        .await;

        let dir = TempDir::new().unwrap();
        let sink = open_sink(&dir).await;
        let crawler = test_crawler(Duration::from_secs(5));

        let summary = crawler.crawl(vec![format!("{}/", site.uri())], 1, &sink).await;

        assert_eq!(sink_lines(&dir), vec![clean]);
        assert_eq!(summary.external_links_written, 1);
        assert_eq!(summary.abandoned, 0);
    }

    #[tokio::test]
    async fn test_duplicates_are_written_and_refetched() {
        let site = MockServer::start().await;
        let target = MockServer::start().await;
        let target_url = format!("{}/page", target.uri());

        mount_page(&site, "/", &[target_url.clone(), target_url.clone()]).await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<html></html>"))
            .expect(2)
            .mount(&target)
            .await;

        let dir = TempDir::new().unwrap();
        let sink = open_sink(&dir).await;
        let crawler = test_crawler(Duration::from_secs(5));

        let summary = crawler.crawl(vec![format!("{}/", site.uri())], 2, &sink).await;

        assert_eq!(sink_lines(&dir), vec![target_url.clone(), target_url]);
        assert_eq!(summary.pages_fetched, 3);
        assert_eq!(summary.rounds, 2);
    }

    #[tokio::test]
    async fn test_next_frontier_keeps_seed_order() {
        let first = MockServer::start().await;
        let second = MockServer::start().await;
        let target = MockServer::start().await;
        let t = target.uri();

        let mut first_html = String::new();
        for page in ["/1", "/2"] {
            first_html.push_str(&format!(r#"<a href="{}{}">x</a>"#, t, page));
        }
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(first_html.as_bytes())
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&first)
            .await;
        mount_page(&second, "/", &[format!("{}/3", t)]).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&target)
            .await;

        let dispatched: Arc<StdMutex<Vec<(usize, String)>>> = Arc::new(StdMutex::new(Vec::new()));
        let dispatched_clone = dispatched.clone();
        let crawler = test_crawler(Duration::from_secs(5)).with_progress_callback(Arc::new(
            move |depth: usize, url: String| {
                dispatched_clone.lock().unwrap().push((depth, url));
            },
        ));

        let dir = TempDir::new().unwrap();
        let sink = open_sink(&dir).await;
        let summary = crawler
            .crawl(
                vec![format!("{}/", first.uri()), format!("{}/", second.uri())],
                2,
                &sink,
            )
            .await;

        let second_round: Vec<String> = dispatched
            .lock()
            .unwrap()
            .iter()
            .filter(|(depth, _)| *depth == 1)
            .map(|(_, url)| url.clone())
            .collect();
        assert_eq!(
            second_round,
            vec![format!("{}/1", t), format!("{}/2", t), format!("{}/3", t)]
        );
        assert_eq!(summary.non_ok, 3);
    }
}
