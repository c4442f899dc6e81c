// messages.rs - Classifier backed by a hosted LLM messages API.
//
// Goals are listed in the prompt by position (1..n) so the model never has
// to echo a UUID. The reply is free text that should contain one JSON object;
// it is dug out leniently, then mapped onto the wire shape and validated the
// same way an HTTP service response is. The same round trip also backs goal
// analysis when a goal is added.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::gateway::{
    ClassificationRequest, ClassificationResult, ClassifierGateway, GoalAnalysis,
};
use crate::wire::{WireDelta, WireResponse, WireStatus};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";
const API_VERSION: &str = "2023-06-01";

const SYSTEM_PROMPT: &str =
    "You are a helpful assistant for tracking personal resolutions and goals.";

/// Settings for [`MessagesClassifier`].
#[derive(Debug, Clone)]
pub struct MessagesSettings {
    pub base_url: String,
    pub model: String,
    /// `None` when the key variable is unset; every call then reports
    /// `Unavailable` naming `api_key_env`.
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MessagesClassifier {
    settings: MessagesSettings,
    client: Client,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// What the model is asked to return. Unknown keys are tolerated here;
/// the converted [`WireResponse`] is still checked strictly.
#[derive(Debug, Default, Deserialize)]
struct ModelReply {
    #[serde(default)]
    goal: Option<usize>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    value: Option<f64>,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    parsed_update: Option<String>,
    #[serde(default)]
    sentiment: Option<String>,
    #[serde(default)]
    suggested_goal: Option<String>,
}

/// What the model is asked to return for a new goal.
#[derive(Debug, Default, Deserialize)]
struct GoalReply {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    target: Option<f64>,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    priority: Option<i64>,
    #[serde(default)]
    reasoning: Option<String>,
}

impl MessagesClassifier {
    pub fn new(settings: MessagesSettings) -> Self {
        Self {
            settings,
            client: Client::new(),
        }
    }

    /// One bounded prompt/reply exchange. A missing key fails before any I/O.
    async fn ask(&self, prompt: String) -> Result<String, String> {
        let Some(api_key) = self.settings.api_key.as_deref() else {
            return Err(format!("{} is not set", self.settings.api_key_env));
        };
        match tokio::time::timeout(self.settings.timeout, self.call(api_key, prompt)).await {
            Ok(reply) => reply,
            Err(_) => {
                tracing::warn!(model = %self.settings.model, "messages API timed out");
                Err(format!(
                    "timed out after {} ms",
                    self.settings.timeout.as_millis()
                ))
            }
        }
    }

    async fn call(&self, api_key: &str, prompt: String) -> Result<String, String> {
        let url = format!("{}/v1/messages", self.settings.base_url.trim_end_matches('/'));
        let body = MessagesRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| format!("failed to read response: {}", e))?;
        if !status.is_success() {
            return Err(format!("messages API returned {}: {}", status, text));
        }

        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| format!("unexpected messages API body: {}", e))?;
        parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| "messages API reply had no text block".to_string())
    }
}

#[async_trait]
impl ClassifierGateway for MessagesClassifier {
    async fn classify(&self, request: &ClassificationRequest) -> ClassificationResult {
        let reply = match self.ask(build_prompt(request)).await {
            Ok(reply) => reply,
            Err(reason) => {
                tracing::warn!(%reason, "messages API call failed");
                return ClassificationResult::unavailable(reason);
            }
        };

        match interpret_reply(&reply, request) {
            Ok(result) => {
                tracing::debug!(kind = result.kind(), "model reply interpreted");
                result
            }
            Err(reason) => {
                tracing::warn!(%reason, "model reply rejected");
                ClassificationResult::unavailable(reason)
            }
        }
    }

    async fn analyze_goal(&self, title: &str) -> Option<GoalAnalysis> {
        let analysis = self
            .ask(build_goal_prompt(title))
            .await
            .and_then(|reply| interpret_goal_reply(&reply));
        match analysis {
            Ok(analysis) => Some(analysis),
            Err(reason) => {
                tracing::warn!(%reason, "goal analysis unavailable");
                None
            }
        }
    }
}

fn build_prompt(request: &ClassificationRequest) -> String {
    let goals = request
        .goals
        .iter()
        .enumerate()
        .map(|(i, g)| format!("{}. {} (category: {})", i + 1, g.title, g.category))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Parse this progress update and match it to the most relevant goal.

Update: "{text}"

Available goals:
{goals}

Return a JSON object with:
- goal: the number of the matching goal from the list, or null if none fits
- confidence: how sure you are of the match, from 0.0 to 1.0
- value: numeric amount if mentioned (e.g. 3 for "ran 3 miles"), or null
- unit: unit of measurement if applicable (e.g. "miles", "pages"), or null
- done: true if the update reports a one-off completion with no amount
- parsed_update: a clean summary of what was accomplished
- sentiment: one of [positive, neutral, struggling] based on tone
- suggested_goal: if no goal fits, a short title for a new goal, else null

Return ONLY the JSON object, no other text."#,
        text = request.text,
        goals = goals,
    )
}

fn build_goal_prompt(title: &str) -> String {
    format!(
        r#"Analyze this personal resolution/goal and extract structured information.

Goal: "{title}"

Return a JSON object with these fields:
- category: one of [fitness, health, learning, reading, finance, career, relationships, creativity, mindfulness, productivity, general]
- target: the numeric total to reach if the goal is measurable (e.g. 12 for "read 12 books"), or null
- unit: unit of the target (e.g. "books", "miles"), or null
- priority: 1-10 where 1 is highest priority (infer from urgency/importance)
- reasoning: brief explanation of your categorization

Return ONLY the JSON object, no other text."#,
        title = title,
    )
}

fn interpret_goal_reply(reply: &str) -> Result<GoalAnalysis, String> {
    let value = extract_json(reply)?;
    let reply: GoalReply =
        serde_json::from_value(value).map_err(|e| format!("unexpected reply fields: {}", e))?;
    Ok(GoalAnalysis {
        category: reply.category,
        target: reply.target,
        unit: reply.unit,
        priority: reply.priority.and_then(|p| u8::try_from(p).ok()),
        reasoning: reply.reasoning.filter(|r| !r.trim().is_empty()),
    })
}

/// Pull a JSON object out of a model reply.
///
/// Tries the whole reply, then a fenced code block, then the outermost
/// `{...}` span.
pub fn extract_json(reply: &str) -> Result<Value, String> {
    let trimmed = reply.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let fenced = Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").map_err(|e| e.to_string())?;
    if let Some(inner) = fenced.captures(trimmed).and_then(|c| c.get(1)) {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(inner.as_str()) {
            return Ok(value);
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value @ Value::Object(_)) =
                serde_json::from_str::<Value>(&trimmed[start..=end])
            {
                return Ok(value);
            }
        }
    }

    Err("no JSON object found in model reply".to_string())
}

fn interpret_reply(
    reply: &str,
    request: &ClassificationRequest,
) -> Result<ClassificationResult, String> {
    let value = extract_json(reply)?;
    let reply: ModelReply =
        serde_json::from_value(value).map_err(|e| format!("unexpected reply fields: {}", e))?;

    let goal_id = match reply.goal {
        Some(n) => {
            let candidate = n
                .checked_sub(1)
                .and_then(|i| request.goals.get(i))
                .ok_or_else(|| format!("model picked goal {} of {}", n, request.goals.len()))?;
            Some(candidate.goal_id.to_string())
        }
        None => None,
    };

    let amount = reply.value.filter(|v| *v > 0.0);
    let extracted_delta = if amount.is_some() || reply.done {
        Some(WireDelta {
            amount,
            unit: reply.unit,
            done: reply.done && amount.is_none(),
        })
    } else {
        None
    };

    let wire = WireResponse {
        status: if goal_id.is_some() {
            WireStatus::Matched
        } else {
            WireStatus::NoMatch
        },
        confidence: goal_id.as_ref().and(reply.confidence),
        goal_id,
        extracted_delta,
        parsed_update: reply.parsed_update,
        sentiment: reply.sentiment,
        alternatives: Vec::new(),
        suggested_goal: reply.suggested_goal,
    };
    wire.into_result()
}
