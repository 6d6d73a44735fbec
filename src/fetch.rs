use std::future::Future;
use std::time::Duration;

use bytes::Bytes;

use crate::error::FetchError;

/// Status and body of an HTTP response
#[derive(Debug, Clone)]
pub struct FeedResponse {
    pub status: u16,
    pub body: Bytes,
}

impl FeedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

/// Something that can perform a single GET request
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> impl Future<Output = Result<FeedResponse, FetchError>> + Send;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<FeedResponse, FetchError> {
        tracing::debug!(url, "Sending request");

        let response = self.client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response.bytes().await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        tracing::debug!(url, status, bytes = body.len(), "Received response");
        Ok(FeedResponse { status, body })
    }
}

/// How often and how patiently to retry a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self { max_retries, base_delay }
    }

    /// Backoff before the retry that follows attempt `attempt_index` (0-based)
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt_index).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(500))
    }
}

/// GET `url`, retrying transport failures and 5xx responses with exponential backoff.
///
/// Any response below 500 is returned as-is; interpreting 4xx is up to the caller.
pub async fn fetch_with_retry<T>(
    transport: &T,
    url: &str,
    policy: &RetryPolicy,
) -> Result<FeedResponse, FetchError>
where
    T: Transport + ?Sized,
{
    let attempts = policy.total_attempts();
    let mut last = String::new();

    for attempt in 0..attempts {
        match transport.get(url).await {
            Ok(response) if !response.is_server_error() => return Ok(response),
            Ok(response) => last = format!("status {}", response.status),
            Err(e) => last = e.to_string(),
        }

        if attempt + 1 < attempts {
            let delay = policy.delay_for(attempt);
            tracing::warn!(
                url,
                attempt = attempt + 1,
                reason = %last,
                delay_ms = delay.as_millis() as u64,
                "Request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    Err(FetchError::Exhausted {
        url: url.to_string(),
        attempts,
        last,
    })
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedTransport;
    use super::*;

    const URL: &str = "http://feed.test/vehicles";

    fn quick_policy() -> RetryPolicy {
        RetryPolicy::new(2, Duration::from_millis(1))
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.total_attempts(), 3);
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::new(100, Duration::from_secs(1));
        assert_eq!(policy.delay_for(64), Duration::from_secs(u32::MAX as u64));
    }

    #[tokio::test]
    async fn test_three_failures_exhaust_after_three_attempts() {
        let transport = ScriptedTransport::new();
        transport.fail(URL).respond(URL, 503, "busy");

        let err = fetch_with_retry(&transport, URL, &quick_policy()).await.unwrap_err();

        assert_eq!(transport.calls(URL), 3);
        match err {
            FetchError::Exhausted { url, attempts, last } => {
                assert_eq!(url, URL);
                assert_eq!(attempts, 3);
                assert_eq!(last, "status 503");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_success_on_second_attempt_stops_retrying() {
        let transport = ScriptedTransport::new();
        transport.respond(URL, 500, "oops").respond(URL, 200, "ok").respond(URL, 500, "never");

        let response = fetch_with_retry(&transport, URL, &quick_policy()).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(&response.body[..], b"ok");
        assert_eq!(transport.calls(URL), 2);
    }

    #[tokio::test]
    async fn test_client_error_is_returned_without_retry() {
        let transport = ScriptedTransport::new();
        transport.respond(URL, 404, "missing");

        let response = fetch_with_retry(&transport, URL, &quick_policy()).await.unwrap();

        assert_eq!(response.status, 404);
        assert!(!response.is_success());
        assert_eq!(transport.calls(URL), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_makes_one_attempt() {
        let transport = ScriptedTransport::new();
        transport.fail(URL);

        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        assert!(fetch_with_retry(&transport, URL, &policy).await.is_err());
        assert_eq!(transport.calls(URL), 1);
    }
}
