use anyhow::Error;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Delay between attempts of a provider request.
pub const RETRY_DELAY_MS: u64 = 500;

/// Retries an async HTTP operation with a fixed delay between attempts
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
///
/// # Returns
/// Either the successful result or the last error once all attempts are used
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) if attempt >= retries => return Err(err.into()),
            Err(err) => {
                attempt += 1;
                debug!("Attempt {}/{} failed: {}. Retrying...", attempt, retries + 1, err);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&mock_server)
            .await;

        let url = format!("{}/flaky", mock_server.uri());
        let client = reqwest::Client::new();
        let result = with_retry(
            || async { client.get(&url).send().await?.error_for_status() },
            2,
            1,
        )
        .await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_returns_first_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("fine"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = format!("{}/ok", mock_server.uri());
        let client = reqwest::Client::new();
        let response = with_retry(|| async { client.get(&url).send().await }, 3, 1)
            .await
            .unwrap();
        assert_eq!(response.text().await.unwrap(), "fine");
    }
}
