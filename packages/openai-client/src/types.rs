//! Wire types for the chat completions endpoint.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// "system" or "user"
    pub role: &'static str,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// A chat completion constrained by a strict JSON schema.
#[derive(Debug, Serialize)]
pub struct StructuredRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub response_format: ResponseFormat,
}

impl StructuredRequest {
    /// Deterministic (temperature 0) request with one system and one user
    /// message.
    ///
    /// Strict mode requires every property to be listed as required and
    /// `additionalProperties` to be false.
    pub fn new(
        model: impl Into<String>,
        system: impl Into<String>,
        user: impl Into<String>,
        schema: serde_json::Value,
    ) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::system(system), Message::user(user)],
            temperature: 0.0,
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: "structured_response".to_string(),
                    strict: true,
                    schema,
                },
            },
        }
    }

    /// Name reported to the API alongside the schema.
    pub fn schema_name(mut self, name: impl Into<String>) -> Self {
        self.response_format.json_schema.name = name.into();
        self
    }
}

#[derive(Debug, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: &'static str,
    pub json_schema: JsonSchemaFormat,
}

#[derive(Debug, Serialize)]
pub struct JsonSchemaFormat {
    pub name: String,
    pub strict: bool,
    pub schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionBody {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChoiceMessage {
    /// Null when the model refuses
    pub content: Option<String>,
    #[serde(default)]
    pub refusal: Option<String>,
}

/// Strip a markdown code fence some models wrap JSON in.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_request_wire_format() {
        let schema = serde_json::json!({"type": "object", "properties": {}});
        let req = StructuredRequest::new("gpt-4o-mini", "sys", "user", schema)
            .schema_name("moderation_verdict");

        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "moderation_verdict");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "user");
    }

    #[test]
    fn test_refusal_deserializes_without_content() {
        let body: CompletionBody = serde_json::from_str(
            r#"{"choices":[{"message":{"content":null,"refusal":"no"}}],"usage":null}"#,
        )
        .unwrap();
        assert!(body.choices[0].message.content.is_none());
        assert_eq!(body.choices[0].message.refusal.as_deref(), Some("no"));
    }

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("{}"), "{}");
    }
}
