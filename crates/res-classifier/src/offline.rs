// offline.rs - Gateway for running without any classifier.

use async_trait::async_trait;

use crate::gateway::{ClassificationRequest, ClassificationResult, ClassifierGateway};

/// Gateway used when classification is switched off. Every submission goes
/// straight to manual selection.
#[derive(Debug, Clone, Default)]
pub struct OfflineClassifier;

#[async_trait]
impl ClassifierGateway for OfflineClassifier {
    async fn classify(&self, _request: &ClassificationRequest) -> ClassificationResult {
        ClassificationResult::unavailable("classifier disabled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_unavailable() {
        let request = ClassificationRequest {
            text: "ran 3 miles".to_string(),
            goals: Vec::new(),
        };
        assert_eq!(
            OfflineClassifier.classify(&request).await,
            ClassificationResult::unavailable("classifier disabled")
        );
        assert_eq!(OfflineClassifier.analyze_goal("Read 24 books").await, None);
    }
}
