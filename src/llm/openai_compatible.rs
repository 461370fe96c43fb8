use super::{ChatMessage, GeneratedObject, LlmClient, Role, Usage};
use crate::error::CollaboratorError;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

const MAX_SCHEMA_RETRIES: u32 = 2;

/// Talks to any OpenAI-compatible `/chat/completions` endpoint using
/// `response_format: json_schema` for structured output. This is the
/// default `LlmClient`; a test double or a provider-specific client can
/// implement the same trait without touching the scheduler.
pub struct OpenAiCompatibleLlm {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout_secs: u64,
}

impl OpenAiCompatibleLlm {
    pub fn new(base_url: String, api_key: Option<String>, model: String, timeout_secs: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
            model,
            timeout_secs,
        }
    }

    fn request_role(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    async fn call_once(
        &self,
        schema: &Value,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<(Value, Usage), CollaboratorError> {
        let mut wire_messages = vec![json!({ "role": "system", "content": system })];
        wire_messages.extend(messages.iter().map(|m| {
            json!({ "role": Self::request_role(m.role), "content": m.content })
        }));

        let body = json!({
            "model": self.model,
            "messages": wire_messages,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "step_decision",
                    "strict": true,
                    "schema": schema,
                }
            }
        });

        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CollaboratorError::Llm(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Llm(format!(
                "LLM endpoint returned {status}: {text}"
            )));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Llm(e.to_string()))?;

        let content = envelope["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| CollaboratorError::Llm("response had no message content".into()))?;

        let value: Value = serde_json::from_str(content).map_err(|e| {
            CollaboratorError::SchemaViolation(format!("content was not valid JSON: {e}"))
        })?;

        let usage = Usage {
            prompt_tokens: envelope["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
            completion_tokens: envelope["usage"]["completion_tokens"].as_u64().unwrap_or(0),
        };

        validate_required_fields(schema, &value)?;

        Ok((value, usage))
    }
}

/// Shallow schema check: every name in the schema's top-level `required`
/// array must be present in the returned object. Full JSON Schema
/// validation is unnecessary here — `strict: true` already constrains the
/// model's output shape; this is a defense against providers that ignore it.
fn validate_required_fields(schema: &Value, value: &Value) -> Result<(), CollaboratorError> {
    let Some(required) = schema.get("required").and_then(Value::as_array) else {
        return Ok(());
    };
    let Some(object) = value.as_object() else {
        return Err(CollaboratorError::SchemaViolation(
            "expected a JSON object".into(),
        ));
    };
    for field in required {
        let Some(name) = field.as_str() else { continue };
        if !object.contains_key(name) {
            return Err(CollaboratorError::SchemaViolation(format!(
                "missing required field `{name}`"
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl LlmClient for OpenAiCompatibleLlm {
    async fn generate_object(
        &self,
        schema: &Value,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<GeneratedObject, CollaboratorError> {
        let mut conversation = messages.to_vec();
        let mut last_error = None;

        for attempt in 0..=MAX_SCHEMA_RETRIES {
            match self.call_once(schema, system, &conversation).await {
                Ok((value, usage)) => return Ok(GeneratedObject { value, usage }),
                Err(CollaboratorError::SchemaViolation(reason)) => {
                    warn!(attempt, %reason, "LLM response violated schema, retrying");
                    conversation.push(ChatMessage::assistant(format!(
                        "Previous response was invalid: {reason}. Respond again, strictly matching the schema."
                    )));
                    last_error = Some(CollaboratorError::SchemaViolation(reason));
                }
                Err(other) => return Err(other),
            }
        }

        debug!("exhausted schema retries");
        Err(last_error.unwrap_or_else(|| {
            CollaboratorError::SchemaViolation("exhausted retries".into())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_required_fields_passes_when_all_present() {
        let schema = json!({ "required": ["action", "think"] });
        let value = json!({ "action": "search", "think": "because" });
        assert!(validate_required_fields(&schema, &value).is_ok());
    }

    #[test]
    fn validate_required_fields_fails_on_missing_field() {
        let schema = json!({ "required": ["action", "think"] });
        let value = json!({ "action": "search" });
        assert!(validate_required_fields(&schema, &value).is_err());
    }

    #[test]
    fn validate_required_fields_is_noop_without_required_array() {
        let schema = json!({});
        let value = json!({ "anything": true });
        assert!(validate_required_fields(&schema, &value).is_ok());
    }
}
