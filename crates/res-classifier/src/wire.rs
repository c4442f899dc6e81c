// wire.rs - JSON shape of a classification service response.
//
//   {
//     "status": "matched" | "no_match",
//     "goal_id": "<uuid>" | null,
//     "confidence": 0.9 | null,
//     "extracted_delta": {"amount": 1, "unit": "books"} | {"done": true} | null,
//     "parsed_update": "...",            (optional)
//     "sentiment": "positive",           (optional)
//     "alternatives": [{"goal_id": "<uuid>", "confidence": 0.8}],  (optional)
//     "suggested_goal": "..."            (optional)
//   }
//
// Anything outside this shape is rejected rather than coerced.

use res_goal::{Delta, Sentiment};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gateway::{ClassificationResult, Extraction, ScoredGoal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireStatus {
    Matched,
    NoMatch,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireDelta {
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireCandidate {
    pub goal_id: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireResponse {
    pub status: WireStatus,
    #[serde(default)]
    pub goal_id: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub extracted_delta: Option<WireDelta>,
    #[serde(default)]
    pub parsed_update: Option<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub alternatives: Vec<WireCandidate>,
    #[serde(default)]
    pub suggested_goal: Option<String>,
}

impl WireDelta {
    /// Convert to a domain delta. `Ok(None)` means nothing was extracted.
    pub fn into_delta(self) -> Result<Option<Delta>, String> {
        match (self.amount, self.done) {
            (Some(_), true) => Err("delta has both amount and done".to_string()),
            (Some(amount), false) => Delta::quantity(amount, self.unit.as_deref())
                .map(Some)
                .map_err(|e| e.to_string()),
            (None, true) => Ok(Some(Delta::Done)),
            (None, false) => Ok(None),
        }
    }
}

impl WireResponse {
    /// Validate and convert into the closed result type.
    ///
    /// Errors describe why the response was malformed; callers turn them
    /// into `Unavailable`.
    pub fn into_result(self) -> Result<ClassificationResult, String> {
        let delta = match self.extracted_delta {
            Some(wire) => wire.into_delta()?,
            None => None,
        };
        let extracted = Extraction {
            delta,
            parsed_update: non_empty(self.parsed_update),
            sentiment: self
                .sentiment
                .as_deref()
                .map(Sentiment::from_label)
                .unwrap_or_default(),
        };

        match self.status {
            WireStatus::Matched => {
                let goal_id = self
                    .goal_id
                    .as_deref()
                    .ok_or("matched response without goal_id")
                    .and_then(|id| parse_id(id).map_err(|_| "matched response with bad goal_id"))?;
                let confidence = self
                    .confidence
                    .filter(|c| valid_confidence(*c))
                    .ok_or("matched response without a confidence in 0..=1")?;
                let alternatives = self
                    .alternatives
                    .into_iter()
                    .map(|c| {
                        if !valid_confidence(c.confidence) {
                            return Err(format!(
                                "alternative {} has confidence {} outside 0..=1",
                                c.goal_id, c.confidence
                            ));
                        }
                        Ok(ScoredGoal {
                            goal_id: parse_id(&c.goal_id)?,
                            confidence: c.confidence,
                        })
                    })
                    .collect::<Result<Vec<_>, String>>()?;
                Ok(ClassificationResult::Matched {
                    goal_id,
                    confidence,
                    extracted,
                    alternatives,
                })
            }
            WireStatus::NoMatch => {
                if self.goal_id.is_some() {
                    return Err("no_match response carries a goal_id".to_string());
                }
                Ok(ClassificationResult::NoMatch {
                    extracted,
                    suggested_title: non_empty(self.suggested_goal),
                })
            }
        }
    }
}

fn parse_id(raw: &str) -> Result<Uuid, String> {
    Uuid::parse_str(raw.trim()).map_err(|e| format!("bad goal id '{}': {}", raw, e))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn valid_confidence(confidence: f64) -> bool {
    (0.0..=1.0).contains(&confidence)
}

/// Parse a raw response body and validate it in one step.
pub fn parse_response(body: &str) -> Result<ClassificationResult, String> {
    let wire: WireResponse =
        serde_json::from_str(body).map_err(|e| format!("malformed response: {}", e))?;
    wire.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matched_response_converts() {
        let id = Uuid::new_v4();
        let body = format!(
            r#"{{"status":"matched","goal_id":"{}","confidence":0.9,
                "extracted_delta":{{"amount":1,"unit":"books"}},
                "parsed_update":"Finished book 3","sentiment":"positive"}}"#,
            id
        );
        match parse_response(&body).unwrap() {
            ClassificationResult::Matched {
                goal_id,
                confidence,
                extracted,
                alternatives,
            } => {
                assert_eq!(goal_id, id);
                assert_eq!(confidence, 0.9);
                assert_eq!(extracted.delta.unwrap().amount(), 1.0);
                assert_eq!(extracted.parsed_update.as_deref(), Some("Finished book 3"));
                assert_eq!(extracted.sentiment, Sentiment::Positive);
                assert!(alternatives.is_empty());
            }
            other => panic!("expected Matched, got {:?}", other),
        }
    }

    #[test]
    fn no_match_keeps_delta_and_suggestion() {
        let body = r#"{"status":"no_match","extracted_delta":{"done":true},"suggested_goal":"Learn piano"}"#;
        match parse_response(body).unwrap() {
            ClassificationResult::NoMatch {
                extracted,
                suggested_title,
            } => {
                assert_eq!(extracted.delta, Some(Delta::Done));
                assert_eq!(suggested_title.as_deref(), Some("Learn piano"));
            }
            other => panic!("expected NoMatch, got {:?}", other),
        }
    }

    #[test]
    fn rejects_shapes_outside_the_contract() {
        let id = Uuid::new_v4();
        let cases = [
            r#"{"status":"maybe"}"#.to_string(),
            r#"{"status":"matched","confidence":0.9}"#.to_string(),
            format!(r#"{{"status":"matched","goal_id":"{}"}}"#, id),
            format!(r#"{{"status":"matched","goal_id":"{}","confidence":1.5}}"#, id),
            format!(r#"{{"status":"matched","goal_id":"{}","confidence":-0.1}}"#, id),
            format!(
                r#"{{"status":"matched","goal_id":"{}","confidence":0.9,
                    "alternatives":[{{"goal_id":"{}","confidence":2.0}}]}}"#,
                id,
                Uuid::new_v4()
            ),
            r#"{"status":"matched","goal_id":"nope","confidence":0.9}"#.to_string(),
            format!(r#"{{"status":"no_match","goal_id":"{}"}}"#, id),
            r#"{"status":"no_match","mood":"great"}"#.to_string(),
            r#"{"status":"no_match","extracted_delta":{"amount":-1}}"#.to_string(),
            r#"{"status":"no_match","extracted_delta":{"amount":2,"done":true}}"#.to_string(),
            "[]".to_string(),
        ];
        for body in cases {
            assert!(parse_response(&body).is_err(), "accepted: {}", body);
        }
    }

    #[test]
    fn alternatives_are_parsed() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let body = format!(
            r#"{{"status":"matched","goal_id":"{}","confidence":0.8,
                "alternatives":[{{"goal_id":"{}","confidence":0.8}}]}}"#,
            a, b
        );
        let result = parse_response(&body).unwrap();
        let scored = result.scored_goals();
        assert_eq!(scored[1].goal_id, b);
        assert_eq!(scored[1].confidence, 0.8);
    }
}
