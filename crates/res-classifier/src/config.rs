//! Classifier configuration structures

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::gateway::ClassifierGateway;
use crate::http::HttpClassifier;
use crate::messages::{self, MessagesClassifier, MessagesSettings};
use crate::offline::OfflineClassifier;

/// Which gateway implementation to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Hosted LLM messages API.
    #[default]
    Messages,
    /// JSON classification service speaking the wire format.
    Http,
    /// No classification; everything goes to manual selection.
    Offline,
}

/// `[classifier]` section of the engine config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub backend: Backend,

    /// Service URL for the `http` backend.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// API root for the `messages` backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key. Keys are never stored in
    /// the config file itself.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Upper bound on one classification round trip.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            endpoint: None,
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_ms: default_timeout_ms(),
            max_tokens: default_max_tokens(),
        }
    }
}

// Serde default functions
fn default_base_url() -> String {
    messages::DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    messages::DEFAULT_MODEL.to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_tokens() -> u32 {
    1024
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ClassifierConfigError {
    #[error("classifier backend 'http' requires an endpoint")]
    MissingEndpoint,

    #[error("invalid classifier setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ClassifierConfigError> {
        if self.timeout_ms == 0 {
            return Err(ClassifierConfigError::Invalid {
                field: "timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_tokens == 0 {
            return Err(ClassifierConfigError::Invalid {
                field: "max_tokens",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.backend == Backend::Http
            && self.endpoint.as_deref().map_or(true, |e| e.trim().is_empty())
        {
            return Err(ClassifierConfigError::MissingEndpoint);
        }
        Ok(())
    }

    fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Build the configured gateway.
///
/// A missing API key is not an error here: the gateway reports
/// `Unavailable` at call time so logging still works offline.
pub fn build_gateway(
    config: &ClassifierConfig,
) -> Result<Arc<dyn ClassifierGateway>, ClassifierConfigError> {
    config.validate()?;
    let gateway: Arc<dyn ClassifierGateway> = match config.backend {
        Backend::Offline => Arc::new(OfflineClassifier),
        Backend::Http => Arc::new(HttpClassifier::new(
            config.endpoint.clone().unwrap_or_default(),
            config.api_key(),
            config.timeout(),
        )),
        Backend::Messages => {
            let api_key = config.api_key();
            if api_key.is_none() {
                tracing::info!(
                    env = %config.api_key_env,
                    "no API key set, updates will need manual goal selection"
                );
            }
            Arc::new(MessagesClassifier::new(MessagesSettings {
                base_url: config.base_url.clone(),
                model: config.model.clone(),
                api_key,
                api_key_env: config.api_key_env.clone(),
                max_tokens: config.max_tokens,
                timeout: config.timeout(),
            }))
        }
    };
    tracing::debug!(backend = ?config.backend, "classifier gateway built");
    Ok(gateway)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: ClassifierConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ClassifierConfig::default());
        assert_eq!(config.backend, Backend::Messages);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.api_key_env, "ANTHROPIC_API_KEY");
    }

    #[test]
    fn http_backend_needs_endpoint() {
        let config = ClassifierConfig {
            backend: Backend::Http,
            ..ClassifierConfig::default()
        };
        assert_eq!(config.validate(), Err(ClassifierConfigError::MissingEndpoint));
        assert!(build_gateway(&config).is_err());

        let config = ClassifierConfig {
            endpoint: Some("http://localhost:8080/classify".to_string()),
            ..config
        };
        assert!(build_gateway(&config).is_ok());
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = ClassifierConfig {
            timeout_ms: 0,
            ..ClassifierConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ClassifierConfigError::Invalid {
                field: "timeout_ms",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn messages_backend_without_key_is_unavailable() {
        let config = ClassifierConfig {
            api_key_env: "RES_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..ClassifierConfig::default()
        };
        let gateway = build_gateway(&config).unwrap();
        let request = crate::ClassificationRequest {
            text: "ran".to_string(),
            goals: Vec::new(),
        };
        assert!(matches!(
            gateway.classify(&request).await,
            crate::ClassificationResult::Unavailable { .. }
        ));
    }
}
