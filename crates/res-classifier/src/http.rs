//! HTTP classifier gateway.
//!
//! POSTs a [`ClassificationRequest`] as JSON to a classification service and
//! reads back the wire response described in [`crate::wire`]. The full round
//! trip (connect, send, read body) is bounded by one timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::gateway::{ClassificationRequest, ClassificationResult, ClassifierGateway};
use crate::wire;

/// Classifier backed by a JSON-over-HTTP service.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
    client: Client,
}

impl HttpClassifier {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key,
            timeout,
            client: Client::new(),
        }
    }

    async fn round_trip(&self, request: &ClassificationRequest) -> Result<String, String> {
        let mut req = self.client.post(&self.endpoint).json(request);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("failed to read response: {}", e))?;
        if !status.is_success() {
            return Err(format!("service returned {}: {}", status, body));
        }
        Ok(body)
    }
}

#[async_trait]
impl ClassifierGateway for HttpClassifier {
    async fn classify(&self, request: &ClassificationRequest) -> ClassificationResult {
        let body = match tokio::time::timeout(self.timeout, self.round_trip(request)).await {
            Err(_) => {
                tracing::warn!(endpoint = %self.endpoint, timeout = ?self.timeout, "classifier timed out");
                return ClassificationResult::unavailable(format!(
                    "timed out after {} ms",
                    self.timeout.as_millis()
                ));
            }
            Ok(Err(reason)) => {
                tracing::warn!(endpoint = %self.endpoint, %reason, "classifier unreachable");
                return ClassificationResult::unavailable(reason);
            }
            Ok(Ok(body)) => body,
        };

        match wire::parse_response(&body) {
            Ok(result) => {
                tracing::debug!(kind = result.kind(), "classifier responded");
                result
            }
            Err(reason) => {
                tracing::warn!(%reason, "classifier response rejected");
                ClassificationResult::unavailable(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use res_goal::Goal;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/classify", addr)
    }

    fn request_for(goal: &Goal) -> ClassificationRequest {
        ClassificationRequest::new("finished book 3", [goal])
    }

    #[tokio::test]
    async fn matched_round_trip() {
        let app = Router::new().route(
            "/classify",
            post(|Json(body): Json<Value>| async move {
                let goal_id = body["goals"][0]["goal_id"].clone();
                Json(json!({
                    "status": "matched",
                    "goal_id": goal_id,
                    "confidence": 0.9,
                    "extracted_delta": {"amount": 1, "unit": "books"}
                }))
            }),
        );
        let url = serve(app).await;
        let goal = Goal::new("Read 24 books").with_target(24.0, Some("books"));
        let classifier = HttpClassifier::new(url, None, Duration::from_secs(5));

        match classifier.classify(&request_for(&goal)).await {
            ClassificationResult::Matched {
                goal_id, confidence, ..
            } => {
                assert_eq!(goal_id, goal.id);
                assert_eq!(confidence, 0.9);
            }
            other => panic!("expected Matched, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_unavailable() {
        let app = Router::new().route(
            "/classify",
            post(|| async { Json(json!({"status": "matched", "vibes": "good"})) }),
        );
        let url = serve(app).await;
        let goal = Goal::new("Floss");
        let classifier = HttpClassifier::new(url, None, Duration::from_secs(5));
        assert!(matches!(
            classifier.classify(&request_for(&goal)).await,
            ClassificationResult::Unavailable { .. }
        ));
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let app = Router::new().route(
            "/classify",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let url = serve(app).await;
        let goal = Goal::new("Floss");
        let classifier = HttpClassifier::new(url, None, Duration::from_secs(5));
        match classifier.classify(&request_for(&goal)).await {
            ClassificationResult::Unavailable { reason } => assert!(reason.contains("500")),
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let app = Router::new().route(
            "/classify",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"status": "no_match"}))
            }),
        );
        let url = serve(app).await;
        let goal = Goal::new("Floss");
        let classifier = HttpClassifier::new(url, None, Duration::from_millis(100));
        match classifier.classify(&request_for(&goal)).await {
            ClassificationResult::Unavailable { reason } => assert!(reason.contains("timed out")),
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        // Bind and drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let goal = Goal::new("Floss");
        let classifier = HttpClassifier::new(
            format!("http://{}/classify", addr),
            None,
            Duration::from_secs(2),
        );
        assert!(matches!(
            classifier.classify(&request_for(&goal)).await,
            ClassificationResult::Unavailable { .. }
        ));
    }

    #[tokio::test]
    async fn sends_bearer_token() {
        let app = Router::new().route(
            "/classify",
            post(|headers: axum::http::HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                if auth == "Bearer secret" {
                    (StatusCode::OK, Json(json!({"status": "no_match"})))
                } else {
                    (StatusCode::UNAUTHORIZED, Json(json!({})))
                }
            }),
        );
        let url = serve(app).await;
        let goal = Goal::new("Floss");
        let classifier =
            HttpClassifier::new(url, Some("secret".to_string()), Duration::from_secs(5));
        assert!(matches!(
            classifier.classify(&request_for(&goal)).await,
            ClassificationResult::NoMatch { .. }
        ));
    }
}
