use crate::error::{Result, ScanError};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

pub const DEFAULT_MAX_CONNECTIONS: usize = 100;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_USER_AGENT: &str = "Outbound/0.1 (https://github.com/trapdoorsec/outbound)";

/// Network failures that are absorbed into an empty result instead of
/// aborting the branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ConnectionError,
    Disconnected,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Success(Vec<u8>),
    NonOkStatus(u16),
    Failure(FailureKind),
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Ceiling on simultaneous in-flight requests across every fetch sharing
    /// the transport.
    pub max_connections: usize,
    /// Per-request timeout, covering connect, headers and body.
    pub timeout: Duration,
    pub user_agent: String,
    /// Pick up proxy settings from `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY`.
    pub trust_env: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            trust_env: true,
        }
    }
}

/// HTTP client shared by all concurrent fetches of a crawl.
///
/// Cloning is cheap and clones share both the connection pool and the
/// connection cap.
#[derive(Clone)]
pub struct Transport {
    client: Client,
    permits: Arc<Semaphore>,
    max_connections: usize,
    timeout: Duration,
}

impl Transport {
    pub fn with_config(config: TransportConfig) -> Result<Self> {
        let max_connections = config.max_connections.max(1);

        let mut builder = Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .pool_max_idle_per_host(max_connections)
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::limited(10));
        if !config.trust_env {
            builder = builder.no_proxy();
        }

        Ok(Self {
            client: builder.build()?,
            permits: Arc::new(Semaphore::new(max_connections)),
            max_connections,
            timeout: config.timeout,
        })
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Issue one GET for `url`.
    ///
    /// Waits for a free connection slot first; the timeout starts once the
    /// slot is held. Only a 200 yields a body. Connection failures, server
    /// disconnects and timeouts come back as `FetchResult::Failure`; any
    /// other client error is returned as `Err`.
    pub async fn fetch(&self, url: &str) -> Result<FetchResult> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ScanError::Other(format!("Connection cap closed: {}", e)))?;

        debug!("Fetching {}", url);

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return absorb_transient(e),
        };

        let status = response.status();
        if status != StatusCode::OK {
            debug!("{} answered {}", url, status.as_u16());
            return Ok(FetchResult::NonOkStatus(status.as_u16()));
        }

        match response.bytes().await {
            Ok(body) => Ok(FetchResult::Success(body.to_vec())),
            Err(e) => absorb_transient(e),
        }
    }
}

fn absorb_transient(error: reqwest::Error) -> Result<FetchResult> {
    match failure_kind(&error) {
        Some(kind) => Ok(FetchResult::Failure(kind)),
        None => Err(error.into()),
    }
}

/// Map a client error onto one of the transient failure kinds, if it is one.
pub fn failure_kind(error: &reqwest::Error) -> Option<FailureKind> {
    if error.is_timeout() {
        Some(FailureKind::Timeout)
    } else if error.is_connect() {
        Some(FailureKind::ConnectionError)
    } else if (error.is_request() || error.is_body()) && is_disconnect(error) {
        Some(FailureKind::Disconnected)
    } else {
        None
    }
}

fn is_disconnect(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(io) = err.downcast_ref::<std::io::Error>()
            && matches!(
                io.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
            )
        {
            return true;
        }

        // hyper reports an early close without an io source
        if let Some(hyper_error) = err.downcast_ref::<hyper::Error>()
            && hyper_error.is_incomplete_message()
        {
            return true;
        }

        current = err.source();
    }
    false
}
