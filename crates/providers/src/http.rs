//! HTTP helpers shared by the adapters.

use std::time::Duration;

use joi_core::error::ProviderError;
use tracing::warn;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Longest silence allowed between two reads. A stream may run for as long
/// as the provider keeps sending.
const READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Build the shared HTTP client.
pub(crate) fn client() -> reqwest::Client {
    client_with(CONNECT_TIMEOUT, READ_TIMEOUT)
}

fn client_with(connect: Duration, read: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(connect)
        .read_timeout(read)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to build configured HTTP client, using defaults");
            reqwest::Client::new()
        })
}

/// Map a non-success response to a `ProviderError`; pass success through.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();
    if (200..300).contains(&status) {
        return Ok(response);
    }

    let retry_after_secs = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(5);
    let body = response.text().await.unwrap_or_default();
    warn!(status, body = %body, "Provider returned error");

    Err(match status {
        429 => ProviderError::RateLimited { retry_after_secs },
        401 | 403 => ProviderError::AuthenticationFailed(
            api_error_message(&body)
                .unwrap_or_else(|| "Invalid API key or insufficient permissions".into()),
        ),
        _ => ProviderError::ApiError {
            status_code: status,
            message: api_error_message(&body).unwrap_or(body),
        },
    })
}

/// Pull `error.message` out of a JSON error body, if there is one.
///
/// Both OpenAI and Google wrap errors as `{"error": {"message": ...}}`.
pub(crate) fn api_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value["error"]["message"].as_str().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_nested_error_message() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "code": 401}}"#;
        assert_eq!(
            api_error_message(body).as_deref(),
            Some("Incorrect API key provided")
        );
        assert_eq!(api_error_message("<html>bad gateway</html>"), None);
    }

    #[tokio::test]
    async fn slow_but_steady_responses_are_not_cut_off() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("ok")
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let client = client_with(Duration::from_secs(1), Duration::from_secs(2));
        let body = client.get(server.uri()).send().await.unwrap().text().await.unwrap();
        assert_eq!(body, "ok");
    }
}
