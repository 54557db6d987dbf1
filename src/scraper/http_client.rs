use crate::config::ScraperConfig;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Statuses worth another attempt: rate limiting and flaky upstreams.
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("gave up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Connection problems, timeouts and retryable statuses.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => RETRYABLE_STATUSES.contains(status),
            FetchError::Exhausted { .. } => false,
        }
    }
}

/// Connect and read timeouts for page requests, plus the warm-up budget.
#[derive(Debug, Clone, Copy)]
pub struct FetchTimeouts {
    pub connect: Duration,
    pub read: Duration,
    pub warmup: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.backoff_base.saturating_mul(1u32 << exp)
    }
}

/// A page body plus how hard it was to get.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub body: String,
    pub attempts: u32,
    pub backoffs: Vec<Duration>,
}

/// In-flight bookkeeping for one `fetch` call.
struct FetchAttempt<'a> {
    url: &'a str,
    attempt: u32,
    backoffs: Vec<Duration>,
}

/// Session-holding HTTP client with browser headers, cookie warm-up and retry.
pub struct HttpClient {
    inner: reqwest::Client,
    site_url: Option<String>,
    timeouts: FetchTimeouts,
    retry: RetryPolicy,
    warmed_up: OnceCell<()>,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig, site_url: Option<String>) -> Result<Self> {
        let timeouts = FetchTimeouts {
            connect: config.connect_timeout(),
            read: config.read_timeout(),
            warmup: config.warmup_timeout(),
        };
        let retry = RetryPolicy {
            max_attempts: config.max_attempts.max(1),
            backoff_base: config.backoff_base(),
        };

        let inner = reqwest::Client::builder()
            .default_headers(browser_headers(config)?)
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read)
            .gzip(true)
            // Accept cookies so anti-bot challenges set during warm-up stick
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            site_url,
            timeouts,
            retry,
            warmed_up: OnceCell::new(),
        })
    }

    /// GET `url`, retrying transient failures with exponential backoff.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.warm_up().await;

        let mut state = FetchAttempt {
            url,
            attempt: 0,
            backoffs: Vec::new(),
        };

        loop {
            state.attempt += 1;
            debug!("GET {} (attempt {}/{})", url, state.attempt, self.retry.max_attempts);

            let err = match self.get_once(url).await {
                Ok((status, body)) => {
                    return Ok(FetchedPage {
                        url: url.to_string(),
                        status,
                        body,
                        attempts: state.attempt,
                        backoffs: state.backoffs,
                    });
                }
                Err(e) => e,
            };

            if !err.is_transient() {
                return Err(err);
            }
            if state.attempt >= self.retry.max_attempts {
                return Err(FetchError::Exhausted {
                    url: url.to_string(),
                    attempts: state.attempt,
                    last: Box::new(err),
                });
            }

            let wait = self.retry.backoff(state.attempt);
            warn!(
                "Request failed (attempt {}/{}) for {}: {}. Retrying in {:?}",
                state.attempt, self.retry.max_attempts, state.url, err, wait
            );
            state.backoffs.push(wait);
            sleep(wait).await;
        }
    }

    async fn get_once(&self, url: &str) -> Result<(u16, String), FetchError> {
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let resp = self.inner.get(url).send().await.map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = resp.text().await.map_err(transport)?;
        Ok((status.as_u16(), body))
    }

    /// Visit the site root once so any anti-bot cookies are set. Failures only warn.
    async fn warm_up(&self) {
        let Some(site) = self.site_url.as_deref() else {
            return;
        };
        self.warmed_up
            .get_or_init(|| async {
                debug!("Warm-up GET {}", site);
                match self
                    .inner
                    .get(site)
                    .timeout(self.timeouts.warmup)
                    .send()
                    .await
                {
                    Ok(resp) if resp.status().is_success() => {}
                    Ok(resp) => warn!("Warm-up visit to {} returned {}", site, resp.status()),
                    Err(e) => warn!("Warm-up visit to {} failed: {}", site, e),
                }
            })
            .await;
    }
}

fn browser_headers(config: &ScraperConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in [
        (USER_AGENT, &config.user_agent),
        (ACCEPT, &config.accept),
        (ACCEPT_LANGUAGE, &config.accept_language),
        (REFERER, &config.referer),
    ] {
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("Invalid {} header value {:?}", name, value))?;
        headers.insert(name, value);
    }
    Ok(headers)
}
