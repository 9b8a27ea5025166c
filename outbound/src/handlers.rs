use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use outbound_scanner::sink::DEFAULT_OUTPUT_FILE;
use outbound_scanner::{
    CrawlState, CrawlSummary, Crawler, ExternalLinkSink, Transport, TransportConfig,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{Level, warn};
use url::Url;

/// Install the fmt subscriber on stderr. `verbose` lowers the bar to DEBUG.
pub fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Load seeds from either a hosts file or the `--url` arguments.
///
/// Seeds are kept as typed: no case folding, port or path normalisation, so
/// authority comparison during the crawl sees the exact text.
pub fn load_urls_from_source(
    urls: &[String],
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        load_urls_from_file(hosts_file_path)
    } else if !urls.is_empty() {
        let seeds: Vec<String> = urls.iter().filter_map(|url| parse_url_line(url)).collect();
        if seeds.is_empty() {
            return Err("No valid URLs given with --url".to_string());
        }
        Ok(seeds)
    } else {
        Err("Either --url or --hosts-file must be provided".to_string())
    }
}

/// Load and parse seed URLs from a file
pub fn load_urls_from_file(path: &PathBuf) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| parse_url_line(line.trim()))
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as an HTTP(S) seed, adding http:// to bare hosts
pub fn parse_url_line(line: &str) -> Option<String> {
    if let Ok(url) = Url::parse(line) {
        if matches!(url.scheme(), "http" | "https") {
            return Some(line.to_string());
        }
        if url.has_host() {
            warn!("Skipping non-HTTP seed '{}'", line);
            return None;
        }
    }

    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok_and(|url| url.has_host()) {
        return Some(with_scheme);
    }

    warn!("Skipping invalid URL '{}'", line);
    None
}

pub fn expand_output_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Render a human-readable summary of a finished crawl
pub fn generate_crawl_report(summary: &CrawlSummary, output: &Path) -> String {
    let divider = "━".repeat(52);
    let mut report = String::new();

    report.push_str(&format!("{}\n\n", divider.bright_blue()));
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Rounds completed: {}\n", summary.rounds));
    report.push_str(&format!("  Pages fetched: {}\n", summary.pages_fetched));
    report.push_str(&format!("  Non-200 responses: {}\n", summary.non_ok));
    report.push_str(&format!(
        "  Transient failures: {}\n",
        summary.transient_failures
    ));
    report.push_str(&format!("  Abandoned URLs: {}\n", summary.abandoned));
    report.push_str(&format!(
        "  External links written: {}\n",
        summary.external_links_written
    ));
    report.push_str(&format!(
        "  Uncrawled frontier: {}\n",
        summary.final_frontier_len
    ));
    report.push_str(&format!("  Output: {}\n", output.display()));

    if summary.state != CrawlState::Done {
        report.push_str(&format!(
            "  {} crawl stopped in state {:?}\n",
            "!".yellow().bold(),
            summary.state
        ));
    }

    report.push_str(&format!("\n{}\n", divider.bright_blue()));
    report
}

/// Resolve the `crawl` subcommand's seed arguments into crawl seeds.
pub fn seeds_from_matches(sub_matches: &ArgMatches) -> Result<Vec<String>> {
    let urls: Vec<String> = sub_matches
        .get_many::<String>("url")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let hosts_file = sub_matches.get_one::<PathBuf>("hosts-file");

    load_urls_from_source(&urls, hosts_file).map_err(anyhow::Error::msg)
}

pub async fn handle_crawl(sub_matches: &ArgMatches, quiet: bool) -> Result<CrawlSummary> {
    let depth = *sub_matches.get_one::<usize>("depth").unwrap_or(&1);
    let connections = *sub_matches.get_one::<usize>("connections").unwrap_or(&100);
    let timeout_secs = *sub_matches.get_one::<u64>("timeout").unwrap_or(&15);
    let trust_env = !sub_matches.get_flag("no-proxy");
    let output = expand_output_path(
        sub_matches
            .get_one::<String>("output")
            .map(String::as_str)
            .unwrap_or(DEFAULT_OUTPUT_FILE),
    );
    let format = sub_matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("text");

    let seeds = seeds_from_matches(sub_matches)?;

    let transport = Transport::with_config(TransportConfig {
        max_connections: connections,
        timeout: Duration::from_secs(timeout_secs),
        trust_env,
        ..TransportConfig::default()
    })
    .context("Failed to build HTTP client")?;

    let sink = ExternalLinkSink::open(&output)
        .await
        .with_context(|| format!("Failed to open output file {}", output.display()))?;

    let mut crawler = Crawler::new(transport);

    let progress_bar = if quiet {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!(
            "Crawling {} seed(s), depth {}, {} connection(s)",
            seeds.len(),
            depth,
            connections
        ));
        Some(pb)
    };

    if let Some(ref pb) = progress_bar {
        let pb = pb.clone();
        let dispatched = Arc::new(AtomicUsize::new(0));
        crawler = crawler.with_progress_callback(Arc::new(move |remaining: usize, url: String| {
            let count = dispatched.fetch_add(1, Ordering::Relaxed) + 1;
            pb.set_message(format!(
                "depth {} | {} URL(s) dispatched | {}",
                remaining, count, url
            ));
        }));
    }

    let summary = crawler.crawl(seeds, depth, &sink).await;

    sink.close()
        .await
        .with_context(|| format!("Failed to flush output file {}", output.display()))?;

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    if !quiet {
        match format {
            "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
            _ => print!("{}", generate_crawl_report(&summary, &output)),
        }
    }

    Ok(summary)
}
