//! Exponential backoff for backend HTTP calls

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{Error, Result};

/// Outcome of a failed attempt
#[derive(Debug)]
pub enum AttemptError {
    /// Transport failure, timeout, 429 or 5xx: worth retrying
    Transient(Error),
    /// Anything else (bad key, malformed request, unparseable body)
    Fatal(Error),
}

impl AttemptError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: reqwest::StatusCode, error: Error) -> Self {
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Self::Transient(error)
        } else {
            Self::Fatal(error)
        }
    }
}

/// Retry settings shared by the HTTP clients
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each attempt
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(1),
        }
    }

    /// Run `operation` until it succeeds, fails fatally, or retries run out
    pub async fn run<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<T, AttemptError>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Transient(e)) => {
                    if attempt < self.max_retries {
                        let delay = self.base_delay * 2u32.pow(attempt);
                        tracing::warn!(
                            "Request failed (attempt {}/{}): {}, retrying in {:?}",
                            attempt + 1,
                            self.max_retries + 1,
                            e,
                            delay
                        );
                        sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::llm("Unknown error")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let result = fast(2)
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(AttemptError::Transient(Error::llm("503")))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast(5)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AttemptError::Fatal(Error::llm("401"))) }
            })
            .await;

        assert!(matches!(result, Err(Error::Llm(m)) if m == "401"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast(1)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AttemptError::Transient(Error::llm("timeout"))) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_status_classification() {
        use reqwest::StatusCode;
        assert!(matches!(
            AttemptError::from_status(StatusCode::BAD_GATEWAY, Error::llm("x")),
            AttemptError::Transient(_)
        ));
        assert!(matches!(
            AttemptError::from_status(StatusCode::TOO_MANY_REQUESTS, Error::llm("x")),
            AttemptError::Transient(_)
        ));
        assert!(matches!(
            AttemptError::from_status(StatusCode::UNAUTHORIZED, Error::llm("x")),
            AttemptError::Fatal(_)
        ));
    }
}
