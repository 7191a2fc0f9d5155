//! Generation gateway: the seam between the session and an external
//! text-completion service.
//!
//! A gateway performs exactly one attempt per call. Authentication failures,
//! rate limiting, transport errors, timeouts, and malformed replies all come
//! back as [`FormError::Gateway`]; the caller decides what to do about them.
//!
//! Two backends ship with the crate:
//!
//! - [`OpenAiGateway`] posts chat completions over HTTP (`ureq`).
//! - [`CommandGateway`] pipes the prompt into a user-configured local command
//!   and reads the reply from stdout, so any CLI model wrapper can be used.
mod command;
mod openai;
pub mod prompt;

pub use command::CommandGateway;
pub use openai::{OpenAiGateway, DEFAULT_API_BASE};

use crate::error::{FormError, Result};
use serde::{Deserialize, Serialize};

/// Lowest accepted rating.
pub const MIN_RATING: u8 = 1;
/// Highest accepted rating.
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// A single completion request: model identifier, role-tagged messages, and
/// sampling temperature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
}

impl CompletionRequest {
    /// Build a request carrying one user message.
    pub fn user(model: impl Into<String>, prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message {
                role: Role::User,
                content: prompt.into(),
            }],
            temperature,
        }
    }

    /// Flatten the messages into the text a plain-stdin backend receives.
    pub fn prompt_text(&self) -> String {
        match self.messages.as_slice() {
            [only] => only.content.clone(),
            messages => messages
                .iter()
                .map(|message| format!("[{}]\n{}", message.role, message.content))
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

/// External text-generation service.
pub trait TextGenerator {
    /// Short backend label for logs.
    fn name(&self) -> &str;

    fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Backend used when neither an API key nor a local command is configured.
/// Every call fails, which drives the session through its fallback paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredGateway;

impl TextGenerator for UnconfiguredGateway {
    fn name(&self) -> &str {
        "unconfigured"
    }

    fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        Err(FormError::Gateway(
            "no generation backend configured (set OPENAI_API_KEY or an LM command)".to_string(),
        ))
    }
}

/// Request a completion for `prompt`.
///
/// The temperature must lie in `[0, 1]`; the reply is trimmed and must be
/// non-empty.
pub fn request_completion(
    gateway: &dyn TextGenerator,
    prompt: &str,
    model: &str,
    temperature: f32,
) -> Result<String> {
    if !(0.0..=1.0).contains(&temperature) {
        return Err(FormError::Gateway(format!(
            "temperature {temperature} is outside [0, 1]"
        )));
    }
    let request = CompletionRequest::user(model, prompt, temperature);
    let start = std::time::Instant::now();
    let reply = gateway.complete(&request)?;
    tracing::info!(
        backend = gateway.name(),
        model,
        elapsed_ms = start.elapsed().as_millis() as u64,
        prompt_bytes = prompt.len(),
        response_bytes = reply.len(),
        "completion received"
    );
    let reply = reply.trim();
    if reply.is_empty() {
        return Err(FormError::Gateway("empty completion".to_string()));
    }
    Ok(reply.to_string())
}

/// Request a 1..=5 rating. Gateway failures propagate; a reply that is not a
/// usable number never does (see [`sanitize_rating`]).
pub fn request_rating(
    gateway: &dyn TextGenerator,
    prompt: &str,
    model: &str,
    temperature: f32,
) -> Result<u8> {
    let reply = request_completion(gateway, prompt, model, temperature)?;
    let rating = sanitize_rating(&reply);
    if reply.trim() != rating.to_string() {
        tracing::warn!(reply = %reply, rating, "rating reply sanitized");
    }
    Ok(rating)
}

/// Parse `raw` as a number, truncate it toward zero, and clamp it into
/// `[MIN_RATING, MAX_RATING]`. Anything that is not a finite number maps to
/// `MIN_RATING`.
pub fn sanitize_rating(raw: &str) -> u8 {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => {
            value
                .trunc()
                .clamp(f64::from(MIN_RATING), f64::from(MAX_RATING)) as u8
        }
        _ => MIN_RATING,
    }
}
