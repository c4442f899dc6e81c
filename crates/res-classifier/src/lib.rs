//! # res-classifier
//!
//! The seam between free-text progress updates and goals.
//!
//! [`ClassifierGateway`] takes the update text plus the non-archived goals
//! and answers with a closed [`ClassificationResult`]: `Matched`, `NoMatch`,
//! or `Unavailable`. Transport and parse failures never escape as errors.
//! It can also suggest fields for a goal being added ([`GoalAnalysis`]).
//!
//! Backends:
//! - [`MessagesClassifier`]: hosted LLM messages API
//! - [`HttpClassifier`]: JSON service speaking the [`wire`] format
//! - [`OfflineClassifier`]: always unavailable

pub mod config;
pub mod gateway;
pub mod http;
pub mod messages;
pub mod offline;
pub mod wire;

pub use config::{build_gateway, Backend, ClassifierConfig, ClassifierConfigError};
pub use gateway::{
    ClassificationRequest, ClassificationResult, ClassifierGateway, Extraction, GoalAnalysis,
    GoalCandidate, ScoredGoal,
};
pub use http::HttpClassifier;
pub use messages::{extract_json, MessagesClassifier, MessagesSettings};
pub use offline::OfflineClassifier;
