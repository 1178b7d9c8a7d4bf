//! Pipeline configuration: TOML file → validated machine settings.
//!
//! Every section has defaults, so an empty file (or no file) is a valid
//! configuration. Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use regimelab_core::classifier::ClassifierConfig;
use regimelab_core::fingerprint::ContentHasher;
use regimelab_core::metrics::MetricsConfig;
use regimelab_core::reasoning::{ReasoningCollaborator, RuleBasedReasoner};
use regimelab_core::reflexion::{ReflexionConfig, ReflexionMachine};

use crate::inference::InferenceReasoner;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("environment variable {var} is not set (needed by the inference collaborator)")]
    MissingApiKey { var: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Which reasoning collaborator a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorKind {
    #[default]
    RuleBased,
    Inference,
}

/// Settings for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.groq.com/openai/v1/chat/completions".into(),
            model: "llama-3.1-8b-instant".into(),
            api_key_env: "GROQ_API_KEY".into(),
            temperature: 0.0,
            max_tokens: 800,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollaboratorConfig {
    pub kind: CollaboratorKind,
    /// Per-call deadline in milliseconds. Absent means no deadline.
    pub timeout_ms: Option<u64>,
    pub inference: InferenceConfig,
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub metrics: MetricsConfig,
    pub classifier: ClassifierConfig,
    pub collaborator: CollaboratorConfig,
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.metrics
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("[metrics] {e}")))?;
        self.classifier
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("[classifier] {e}")))?;
        if self.collaborator.timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "[collaborator] timeout_ms must be > 0".into(),
            ));
        }
        let inference = &self.collaborator.inference;
        if self.collaborator.kind == CollaboratorKind::Inference {
            if inference.endpoint.trim().is_empty() || inference.model.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "[collaborator.inference] endpoint and model are required".into(),
                ));
            }
            if !(0.0..=2.0).contains(&inference.temperature) {
                return Err(ConfigError::Invalid(format!(
                    "[collaborator.inference] temperature must be within [0, 2], got {}",
                    inference.temperature
                )));
            }
        }
        Ok(())
    }

    /// BLAKE3 over the canonical JSON form of the whole configuration.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        let mut h = ContentHasher::new("pipeline-config");
        h.text(&json);
        h.finish_hex()
    }

    pub fn collaborator_timeout(&self) -> Option<Duration> {
        self.collaborator.timeout_ms.map(Duration::from_millis)
    }

    pub fn to_reflexion_config(&self) -> ReflexionConfig {
        ReflexionConfig {
            metrics: self.metrics.clone(),
            classifier: self.classifier.clone(),
            collaborator_timeout: self.collaborator_timeout(),
        }
    }

    /// Build the configured collaborator. The inference collaborator reads
    /// its API key from the environment here, so a missing key fails fast.
    pub fn build_collaborator(&self) -> Result<Arc<dyn ReasoningCollaborator>, ConfigError> {
        match self.collaborator.kind {
            CollaboratorKind::RuleBased => {
                Ok(Arc::new(RuleBasedReasoner::new(self.classifier.clone())))
            }
            CollaboratorKind::Inference => {
                let settings = &self.collaborator.inference;
                let api_key = std::env::var(&settings.api_key_env).map_err(|_| {
                    ConfigError::MissingApiKey {
                        var: settings.api_key_env.clone(),
                    }
                })?;
                let reasoner = InferenceReasoner::new(
                    settings.clone(),
                    api_key,
                    self.classifier.clone(),
                    self.collaborator_timeout(),
                )
                .map_err(|e| ConfigError::Client(e.to_string()))?;
                Ok(Arc::new(reasoner))
            }
        }
    }

    pub fn build_machine(&self) -> Result<ReflexionMachine, ConfigError> {
        self.validate()?;
        Ok(ReflexionMachine::new(
            self.build_collaborator()?,
            self.to_reflexion_config(),
        ))
    }
}
