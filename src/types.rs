//! Wire types for the research backend.
//!
//! These mirror the backend's JSON DTOs (camelCase on the wire) and are
//! shared by the API client, the chat session and the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Report style sent when the caller does not pick one.
pub const DEFAULT_REPORT_STYLE: &str = "COMPREHENSIVE";

// =============================================================================
// Chat
// =============================================================================

/// Per-request chat switches.
///
/// Deserialized from the `chat` section of the configuration, so the keys
/// are snake_case here; [`ChatRequest`] carries them on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Ask the backend for extended reasoning.
    #[serde(default)]
    pub enable_deep_thinking: bool,
    /// Let the backend run a background web investigation first.
    #[serde(default = "default_true")]
    pub enable_background_investigation: bool,
    /// Report style identifier understood by the backend.
    #[serde(default = "default_report_style")]
    pub report_style: String,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            enable_deep_thinking: false,
            enable_background_investigation: true,
            report_style: DEFAULT_REPORT_STYLE.to_string(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_report_style() -> String {
    DEFAULT_REPORT_STYLE.to_string()
}

/// Body of `POST /chat/stream`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,
    pub enable_deep_thinking: bool,
    pub enable_background_investigation: bool,
    pub report_style: String,
}

impl ChatRequest {
    /// Build a request for `message` with the given switches.
    pub fn new(message: impl Into<String>, options: &ChatOptions) -> Self {
        Self {
            message: message.into(),
            enable_deep_thinking: options.enable_deep_thinking,
            enable_background_investigation: options.enable_background_investigation,
            report_style: options.report_style.clone(),
        }
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A message shown in the chat transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Client-side identifier.
    pub id: uuid::Uuid,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Report produced by this exchange, if the backend announced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_id: Option<String>,
}

impl ChatMessage {
    /// Create a user message stamped with the current time.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content.into(), None)
    }

    /// Create an assistant message stamped with the current time.
    pub fn assistant(content: impl Into<String>, research_id: Option<String>) -> Self {
        Self::new(MessageRole::Assistant, content.into(), research_id)
    }

    fn new(role: MessageRole, content: String, research_id: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            role,
            content,
            timestamp: Utc::now(),
            research_id,
        }
    }
}

// =============================================================================
// Research
// =============================================================================

/// Body of `POST /research`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchRequest {
    /// What to investigate.
    pub query: String,
    /// Company the research is about, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default)]
    pub focus_areas: Vec<String>,
}

/// A research report as returned by `GET /research/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchReport {
    pub id: String,
    pub title: String,
    pub company: String,
    pub summary: String,
    pub key_findings: Vec<String>,
    pub sources: Vec<ResearchSource>,
    pub analysis: RiskAnalysis,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A source cited by a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchSource {
    pub title: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    #[serde(default)]
    pub url: Option<String>,
    pub date: DateTime<Utc>,
    /// Relevance score in `0.0..=1.0`.
    pub relevance: f64,
}

/// Kind of a [`ResearchSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    Legal,
    News,
    Financial,
    Interview,
    Document,
}

/// Risk assessment attached to a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAnalysis {
    pub level: RiskLevel,
    pub score: i32,
    pub recommendations: Vec<String>,
    pub concerns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

// =============================================================================
// Configuration
// =============================================================================

/// Backend capabilities as returned by `GET /config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfiguration {
    pub models: ModelConfiguration,
    #[serde(default)]
    pub features: FeatureConfiguration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rag: Option<RagConfiguration>,
}

/// Model names available per tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfiguration {
    pub basic: Vec<String>,
    #[serde(default)]
    pub reasoning: Option<Vec<String>>,
}

/// Feature switches the backend supports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureConfiguration {
    #[serde(default)]
    pub deep_thinking: bool,
    #[serde(default)]
    pub background_investigation: bool,
    #[serde(default)]
    pub report_styles: Vec<String>,
}

/// Retrieval backend in use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagConfiguration {
    pub provider: String,
}
