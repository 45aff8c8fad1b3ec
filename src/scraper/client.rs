//! Blocking HTTP client with configurable politeness (delay between requests)
//! and bounded retry with growing backoff on transient failures.

use std::time::{Duration, Instant};

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DELAY_SECS: u64 = 1;
const MAX_REDIRECTS: usize = 10;

/// Default number of attempts for get_with_retry (initial plus retries).
const DEFAULT_RETRY_COUNT: u32 = 3;
/// Default backoff delays in seconds after each failed attempt.
const DEFAULT_BACKOFF_SECS: [u64; 3] = [1, 2, 4];

/// HTTP statuses worth retrying: rate limiting and transient server errors.
pub(crate) fn retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Backoff delay for the given zero-based attempt. The last schedule entry is
/// reused when the schedule is shorter than the attempt count.
pub(crate) fn backoff_delay_secs(schedule: &[u64], attempt: usize) -> u64 {
    schedule
        .get(attempt)
        .or_else(|| schedule.last())
        .copied()
        .unwrap_or(1)
}

/// Blocking HTTP client that enforces a delay between requests.
#[derive(Debug)]
pub struct PoliteClient {
    inner: reqwest::blocking::Client,
    delay: Duration,
    last_request: Option<Instant>,
    retry_count: u32,
    backoff_secs: Vec<u64>,
}

impl PoliteClient {
    /// Build a polite client with default User-Agent, timeout, and delay.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    /// Builder for custom User-Agent, delay, timeout, and retry settings.
    pub fn builder() -> PoliteClientBuilder {
        PoliteClientBuilder::default()
    }

    /// Perform a GET request with bounded retries for transient failures.
    ///
    /// Retries on timeout, connection errors, HTTP 5xx, and HTTP 429, sleeping
    /// for the configured backoff between attempts. Non-retryable errors are
    /// returned immediately. A response with a retryable status on the final
    /// attempt is returned as-is; the caller maps it to a typed error. On
    /// return, the last-request time is updated for politeness.
    pub fn get_with_retry(
        &mut self,
        url: &str,
    ) -> Result<reqwest::blocking::Response, reqwest::Error> {
        let max_attempts = self.retry_count.max(1);
        let mut attempt = 0u32;
        loop {
            self.wait_delay();
            let last = attempt + 1 >= max_attempts;
            match self.inner.get(url).send() {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if retryable_status(status) && !last {
                        std::thread::sleep(Duration::from_secs(backoff_delay_secs(
                            &self.backoff_secs,
                            attempt as usize,
                        )));
                        attempt += 1;
                        continue;
                    }
                    self.last_request = Some(Instant::now());
                    return Ok(response);
                }
                Err(e) => {
                    if (e.is_timeout() || e.is_connect()) && !last {
                        std::thread::sleep(Duration::from_secs(backoff_delay_secs(
                            &self.backoff_secs,
                            attempt as usize,
                        )));
                        attempt += 1;
                        continue;
                    }
                    self.last_request = Some(Instant::now());
                    return Err(e);
                }
            }
        }
    }

    fn wait_delay(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
    }
}

/// Builder for [PoliteClient].
#[derive(Debug)]
pub struct PoliteClientBuilder {
    user_agent: Option<String>,
    delay_secs: u64,
    timeout_secs: u64,
    retry_count: u32,
    retry_backoff_secs: Vec<u64>,
}

impl Default for PoliteClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            delay_secs: DEFAULT_DELAY_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_backoff_secs: DEFAULT_BACKOFF_SECS.to_vec(),
        }
    }
}

impl PoliteClientBuilder {
    /// Set a custom User-Agent. If not set, a browser-like default is used;
    /// some hosts reject unrecognized clients.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set delay between requests in seconds. Default 1.
    pub fn delay_secs(mut self, secs: u64) -> Self {
        self.delay_secs = secs;
        self
    }

    /// Set request timeout in seconds. Default 30.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set number of HTTP attempts for transient failures (default 3).
    pub fn retry_count(mut self, n: u32) -> Self {
        self.retry_count = n.max(1);
        self
    }

    /// Set backoff delays in seconds before each retry (e.g. [1, 2, 4]).
    /// If shorter than the attempt count, the last value is reused.
    pub fn retry_backoff_secs(mut self, secs: Vec<u64>) -> Self {
        self.retry_backoff_secs = secs;
        self
    }

    /// Build the blocking client and polite wrapper.
    pub fn build(self) -> Result<PoliteClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        let backoff_secs = if self.retry_backoff_secs.is_empty() {
            // Exponential: 1, 2, 4, ... for (retry_count - 1) steps
            let n = self.retry_count.saturating_sub(1) as usize;
            (0..n).map(|i| 1u64 << i.min(4)).collect::<Vec<_>>()
        } else {
            self.retry_backoff_secs
        };
        Ok(PoliteClient {
            inner,
            delay: Duration::from_secs(self.delay_secs),
            last_request: None,
            retry_count: self.retry_count,
            backoff_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_status_covers_transient_codes() {
        for code in [429, 500, 502, 503, 504] {
            assert!(retryable_status(code), "{} should be retryable", code);
        }
    }

    #[test]
    fn retryable_status_rejects_client_and_success_codes() {
        for code in [200, 301, 400, 403, 404, 418] {
            assert!(!retryable_status(code), "{} should not be retryable", code);
        }
    }

    #[test]
    fn backoff_delay_follows_schedule() {
        let schedule = [1, 2, 4];
        assert_eq!(backoff_delay_secs(&schedule, 0), 1);
        assert_eq!(backoff_delay_secs(&schedule, 1), 2);
        assert_eq!(backoff_delay_secs(&schedule, 2), 4);
    }

    #[test]
    fn backoff_delay_reuses_last_entry_past_schedule_end() {
        let schedule = [1, 2];
        assert_eq!(backoff_delay_secs(&schedule, 5), 2);
    }

    #[test]
    fn backoff_delay_empty_schedule_falls_back_to_one_second() {
        assert_eq!(backoff_delay_secs(&[], 0), 1);
    }

    #[test]
    fn builder_defaults_build() {
        let client = PoliteClient::new();
        assert!(client.is_ok());
    }

    #[test]
    fn builder_empty_backoff_generates_exponential_schedule() {
        let client = PoliteClient::builder()
            .retry_count(4)
            .retry_backoff_secs(vec![])
            .build()
            .unwrap();
        assert_eq!(client.backoff_secs, vec![1, 2, 4]);
    }
}
