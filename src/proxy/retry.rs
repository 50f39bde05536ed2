// Retry orchestration
//
// Each failure class gets its own budget and backoff schedule:
//
//   429 rate limit     - 5 attempts, 2/5/10/20/40 s (Retry-After wins)
//   503 unavailable    - 3 attempts, 1/2/4 s
//   transport failure  - 5 attempts, exponential from 1 s
//
// Any other status is surfaced immediately - the client decides what a
// 400 or 500 means, not the proxy. Exhausting a budget returns the last
// real outcome (status and body), never a synthetic error, so the client
// sees the upstream's actual rejection.
//
// The schedules are pure table lookups over per-class attempt counters;
// the async driver only sleeps and loops, which keeps the policy
// testable without a transport.

use std::future::Future;
use std::time::Duration;

/// Backoff between 429 attempts, indexed by how many retries happened so
/// far and clamped to the last entry.
const RATE_LIMIT_BACKOFF: &[Duration] = &[
    Duration::from_secs(2),
    Duration::from_secs(5),
    Duration::from_secs(10),
    Duration::from_secs(20),
    Duration::from_secs(40),
];
const RATE_LIMIT_MAX_ATTEMPTS: u32 = 5;

const UNAVAILABLE_BACKOFF: &[Duration] = &[
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];
const UNAVAILABLE_MAX_ATTEMPTS: u32 = 3;

const TRANSPORT_MAX_ATTEMPTS: u32 = 5;

/// Minimal view of one attempt's outcome the policy needs.
pub trait Attempted {
    fn status_code(&self) -> u16;
    fn retry_after_secs(&self) -> Option<u64>;
}

/// Per-class retry counters for one client-visible request.
#[derive(Debug, Default)]
pub struct RetryState {
    rate_limit_retries: u32,
    unavailable_retries: u32,
    transport_retries: u32,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a response status warrants another attempt and, if
    /// so, how long to wait first. `None` means surface this outcome.
    pub fn next_status_delay(&mut self, status: u16, retry_after: Option<u64>) -> Option<Duration> {
        match status {
            429 => {
                if self.rate_limit_retries + 1 >= RATE_LIMIT_MAX_ATTEMPTS {
                    return None;
                }
                let delay = retry_after.map(Duration::from_secs).unwrap_or_else(|| {
                    let idx = (self.rate_limit_retries as usize).min(RATE_LIMIT_BACKOFF.len() - 1);
                    RATE_LIMIT_BACKOFF[idx]
                });
                self.rate_limit_retries += 1;
                Some(delay)
            }
            503 => {
                if self.unavailable_retries + 1 >= UNAVAILABLE_MAX_ATTEMPTS {
                    return None;
                }
                let idx = (self.unavailable_retries as usize).min(UNAVAILABLE_BACKOFF.len() - 1);
                self.unavailable_retries += 1;
                Some(UNAVAILABLE_BACKOFF[idx])
            }
            _ => None,
        }
    }

    /// Same decision for a transport-level failure (connect error,
    /// timeout before any byte reached the client).
    pub fn next_transport_delay(&mut self) -> Option<Duration> {
        if self.transport_retries + 1 >= TRANSPORT_MAX_ATTEMPTS {
            return None;
        }
        let delay = Duration::from_secs(1 << self.transport_retries);
        self.transport_retries += 1;
        Some(delay)
    }
}

/// Drive an attempt closure until an outcome is surfaced.
///
/// Returns the last attempt's response (success or the final rejection)
/// or, when every attempt failed at the transport level, the last
/// transport error message.
pub async fn send_with_retries<T, F, Fut>(mut attempt: F) -> Result<T, String>
where
    T: Attempted,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let mut state = RetryState::new();
    loop {
        match attempt().await {
            Ok(response) => {
                let status = response.status_code();
                if !(status == 429 || status == 503) {
                    return Ok(response);
                }
                match state.next_status_delay(status, response.retry_after_secs()) {
                    Some(delay) => {
                        tracing::debug!(status, delay_secs = delay.as_secs(), "retrying upstream");
                        tokio::time::sleep(delay).await;
                    }
                    None => return Ok(response),
                }
            }
            Err(message) => match state.next_transport_delay() {
                Some(delay) => {
                    tracing::debug!(error = %message, delay_secs = delay.as_secs(), "retrying after transport failure");
                    tokio::time::sleep(delay).await;
                }
                None => return Err(message),
            },
        }
    }
}
