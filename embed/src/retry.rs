use std::time::Duration;

use crate::provider::EmbedError;

const INITIAL_BACKOFF_MS: u64 = 200;
const MAX_BACKOFF_MS: u64 = 2_000;
const MAX_RETRIES: u32 = 2;

/// Shared HTTP retry policy for every embedder client: retry on 429/5xx with exponential
/// backoff (200ms initial, 2s cap) up to 2 retries; any other non-OK status surfaces the
/// response body verbatim as the error.
pub async fn send_with_retry<F, Fut>(mut attempt: F) -> Result<reqwest::Response, EmbedError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut backoff_ms = INITIAL_BACKOFF_MS;
    let mut tries = 0u32;

    loop {
        let response = attempt().await.map_err(|e| EmbedError::Http(e.to_string()))?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let retryable = status.as_u16() == 429 || status.is_server_error();
        if !retryable || tries >= MAX_RETRIES {
            let status_code = status.as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::BadStatus {
                status: status_code,
                body,
            });
        }

        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
        tries += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_schedule_doubles_and_caps() {
        let mut backoff = INITIAL_BACKOFF_MS;
        let mut seen = vec![backoff];
        for _ in 0..5 {
            backoff = (backoff * 2).min(MAX_BACKOFF_MS);
            seen.push(backoff);
        }
        assert_eq!(seen, vec![200, 400, 800, 1600, 2000, 2000]);
    }
}
