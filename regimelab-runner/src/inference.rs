//! Hosted-model reasoning collaborator.
//!
//! Talks to an OpenAI-compatible chat-completions endpoint (Groq by
//! default) in three roles: portfolio manager (propose), risk manager
//! (critique) and chief investment officer (adjust). Each reply must be a
//! single JSON object; it is parsed into the typed artifact through the
//! artifact's own constructor, so upstream identities are always recorded
//! by this side, never by the model.
//!
//! Error mapping:
//! - transport timeout → `Timeout`
//! - connection failure or non-2xx status → `Unavailable`
//! - malformed envelope, JSON or fields → `ContractViolation`

use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use regimelab_core::classifier::{ClassifierConfig, RegimeAssessment};
use regimelab_core::metrics::MetricsSnapshot;
use regimelab_core::reasoning::{
    risk_flags, CollaboratorError, Critique, FinalDecision, ReasoningCollaborator, RiskFlag,
    Severity, StrategyProposal,
};

use crate::config::InferenceConfig;

/// Deadline applied by the HTTP client when no collaborator timeout is set.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const STRATEGIST_PROMPT: &str = "You are a Portfolio Manager. Given the market regime and \
technical snapshot, propose exactly one trading strategy for the regime. Reply with a single \
JSON object and nothing else: {\"action\": string, \"rationale\": string, \
\"position_sizing_hint\": number between 0 and 1}.";

const RISK_MANAGER_PROMPT: &str = "You are a Risk Manager. Critique the proposed strategy \
against the technical snapshot and list what could go wrong. Reply with a single JSON object \
and nothing else: {\"concerns\": [string], \"severity\": \"Minor\" | \"Moderate\" | \
\"Critical\"}.";

const CIO_PROMPT: &str = "You are the Chief Investment Officer. Given a proposed strategy and \
the risk critique, make the final call. If the critique severity is Critical, override the \
strategy with \"Stay in Cash\" and a position size of 0. Otherwise keep the proposed action and \
list your adjustments. Reply with a single JSON object and nothing else: {\"final_action\": \
string, \"adjustments\": [string], \"position_size\": number between 0 and 1, \"overridden\": \
boolean}.";

// ── Wire types ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

// ── Role replies ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ProposalReply {
    action: String,
    #[serde(default)]
    rationale: String,
    position_sizing_hint: f64,
}

#[derive(Debug, Deserialize)]
struct CritiqueReply {
    #[serde(default)]
    concerns: Vec<String>,
    severity: Severity,
}

#[derive(Debug, Deserialize)]
struct DecisionReply {
    final_action: String,
    #[serde(default)]
    adjustments: Vec<String>,
    position_size: f64,
    overridden: bool,
}

/// Strip Markdown code fences and surrounding prose, then parse the JSON
/// object inside.
fn parse_reply<T: DeserializeOwned>(content: &str) -> Result<T, CollaboratorError> {
    let trimmed = content.trim();
    let body = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => {
            return Err(CollaboratorError::ContractViolation(format!(
                "reply contains no JSON object: {}",
                preview(trimmed)
            )))
        }
    };
    serde_json::from_str(body).map_err(|e| {
        CollaboratorError::ContractViolation(format!("malformed reply ({e}): {}", preview(body)))
    })
}

fn preview(text: &str) -> String {
    const MAX: usize = 200;
    match text.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

fn snapshot_json(metrics: &MetricsSnapshot) -> serde_json::Value {
    let short = metrics.sma_short_reading();
    let long = metrics.sma_long_reading();
    let mut map = serde_json::Map::new();
    map.insert("as_of".into(), json!(metrics.as_of_date().to_string()));
    map.insert("price".into(), json!(metrics.price()));
    map.insert(format!("sma_{}", short.period), json!(short.value));
    map.insert(format!("sma_{}", long.period), json!(long.value));
    map.insert(
        "volatility_annualized".into(),
        json!(metrics.volatility_annualized()),
    );
    map.insert("daily_return".into(), json!(metrics.daily_return()));
    serde_json::Value::Object(map)
}

/// Reasoning collaborator backed by a chat-completions endpoint.
pub struct InferenceReasoner {
    client: reqwest::blocking::Client,
    settings: InferenceConfig,
    api_key: String,
    thresholds: ClassifierConfig,
    http_timeout: Duration,
    name: String,
}

impl InferenceReasoner {
    /// `timeout` bounds each HTTP exchange; the machine may enforce its own
    /// deadline on top.
    pub fn new(
        settings: InferenceConfig,
        api_key: String,
        thresholds: ClassifierConfig,
        timeout: Option<Duration>,
    ) -> Result<Self, reqwest::Error> {
        let http_timeout = timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT);
        let client = reqwest::blocking::Client::builder()
            .timeout(http_timeout)
            .user_agent(concat!("regimelab/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let name = format!("inference:{}", settings.model);
        Ok(Self {
            client,
            settings,
            api_key,
            thresholds,
            http_timeout,
            name,
        })
    }

    /// One chat exchange; returns the assistant message text.
    fn chat(&self, role: &str, system: &str, user: &str) -> Result<String, CollaboratorError> {
        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        debug!("{role}: POST {} (model {})", self.settings.endpoint, self.settings.model);
        let response = self
            .client
            .post(&self.settings.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    CollaboratorError::Timeout(self.http_timeout)
                } else {
                    CollaboratorError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CollaboratorError::Unavailable(format!(
                "HTTP {status}: {}",
                preview(&body)
            )));
        }

        let envelope: ChatResponse = response.json().map_err(|e| {
            if e.is_timeout() {
                CollaboratorError::Timeout(self.http_timeout)
            } else {
                CollaboratorError::ContractViolation(format!("unreadable response envelope: {e}"))
            }
        })?;

        envelope
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| CollaboratorError::ContractViolation("empty completion".into()))
    }
}

impl ReasoningCollaborator for InferenceReasoner {
    fn name(&self) -> &str {
        &self.name
    }

    fn propose(
        &self,
        assessment: &RegimeAssessment,
        metrics: &MetricsSnapshot,
    ) -> Result<StrategyProposal, CollaboratorError> {
        let user = json!({
            "regime": assessment.regime().label(),
            "volatility_band": assessment.volatility_band().to_string(),
            "snapshot": snapshot_json(metrics),
        })
        .to_string();
        let reply: ProposalReply = parse_reply(&self.chat("strategist", STRATEGIST_PROMPT, &user)?)?;
        Ok(StrategyProposal::new(
            assessment,
            reply.action,
            reply.rationale,
            reply.position_sizing_hint,
        ))
    }

    fn critique(
        &self,
        proposal: &StrategyProposal,
        metrics: &MetricsSnapshot,
    ) -> Result<Critique, CollaboratorError> {
        let user = json!({
            "regime": proposal.regime().label(),
            "action": proposal.action(),
            "rationale": proposal.rationale(),
            "position_sizing_hint": proposal.position_sizing_hint(),
            "snapshot": snapshot_json(metrics),
        })
        .to_string();
        let reply: CritiqueReply =
            parse_reply(&self.chat("risk manager", RISK_MANAGER_PROMPT, &user)?)?;

        // Rule-detected risks are always reported and set the severity floor.
        let flags = risk_flags(metrics, &self.thresholds);
        let floor = flags
            .iter()
            .map(RiskFlag::severity)
            .max()
            .unwrap_or(Severity::Minor);
        let mut concerns: Vec<String> = flags.iter().map(RiskFlag::describe).collect();
        concerns.extend(reply.concerns.into_iter().filter(|c| !c.trim().is_empty()));
        Ok(Critique::new(
            proposal,
            flags,
            concerns,
            reply.severity.max(floor),
        ))
    }

    fn adjust(
        &self,
        proposal: &StrategyProposal,
        critique: &Critique,
        metrics: &MetricsSnapshot,
    ) -> Result<FinalDecision, CollaboratorError> {
        let user = json!({
            "proposal": {
                "action": proposal.action(),
                "rationale": proposal.rationale(),
                "position_sizing_hint": proposal.position_sizing_hint(),
            },
            "critique": {
                "concerns": critique.concerns(),
                "severity": critique.severity(),
            },
            "snapshot": snapshot_json(metrics),
        })
        .to_string();
        let reply: DecisionReply = parse_reply(&self.chat("cio", CIO_PROMPT, &user)?)?;
        Ok(FinalDecision::new(
            proposal,
            critique,
            reply.final_action,
            reply.adjustments,
            reply.position_size,
            reply.overridden,
        ))
    }
}
