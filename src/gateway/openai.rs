//! Chat-completions client over HTTP.
use super::{CompletionRequest, TextGenerator};
use crate::error::{FormError, Result};
use serde::Deserialize;
use std::time::Duration;
use ureq::Agent;

/// Default endpoint root for the hosted API.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAiGateway {
    agent: Agent,
    api_base: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiGateway {
    /// Build a client whose every call is bounded by `timeout` end to end.
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: Agent::new_with_config(config),
            api_base: api_base.into(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

impl TextGenerator for OpenAiGateway {
    fn name(&self) -> &str {
        "openai"
    }

    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let endpoint = self.endpoint();
        let mut response = self
            .agent
            .post(endpoint.as_str())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send_json(request)
            .map_err(describe_error)?;
        let completion: ChatCompletion = response
            .body_mut()
            .read_json()
            .map_err(|err| FormError::Gateway(format!("malformed completion response: {err}")))?;
        first_choice_text(completion)
    }
}

fn first_choice_text(completion: ChatCompletion) -> Result<String> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| FormError::Gateway("completion response carried no text".to_string()))
}

fn describe_error(err: ureq::Error) -> FormError {
    let detail = match err {
        ureq::Error::StatusCode(code @ (401 | 403)) => {
            format!("authentication rejected (HTTP {code})")
        }
        ureq::Error::StatusCode(429) => "rate limited (HTTP 429)".to_string(),
        ureq::Error::StatusCode(code) => format!("service answered HTTP {code}"),
        ureq::Error::Timeout(kind) => format!("request timed out ({kind:?})"),
        other => other.to_string(),
    };
    FormError::Gateway(detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_choice_text_reads_message_content() {
        let completion: ChatCompletion = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Good."}}]}"#,
        )
        .unwrap();
        assert_eq!(first_choice_text(completion).unwrap(), "Good.");
    }

    #[test]
    fn first_choice_text_rejects_empty_choices() {
        let completion: ChatCompletion = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            first_choice_text(completion),
            Err(FormError::Gateway(_))
        ));
        let completion: ChatCompletion =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(first_choice_text(completion).is_err());
    }

    #[test]
    fn status_codes_map_to_coarse_gateway_errors() {
        assert_eq!(
            describe_error(ureq::Error::StatusCode(401)),
            FormError::Gateway("authentication rejected (HTTP 401)".to_string())
        );
        assert_eq!(
            describe_error(ureq::Error::StatusCode(429)),
            FormError::Gateway("rate limited (HTTP 429)".to_string())
        );
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let gateway = OpenAiGateway::new("http://localhost:9/v1/", "key", Duration::from_secs(1));
        assert_eq!(gateway.endpoint(), "http://localhost:9/v1/chat/completions");
    }
}
