//! Serde types for the Gemini `generateContent` wire format. Requests and
//! responses are modeled separately; the API emits camelCase keys while
//! accepting snake_case on the way in.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    pub fn new(parts: Vec<Part>, config: GenerationConfig) -> Self {
        Self {
            contents: vec![Content { parts }],
            generation_config: Some(config),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "inline_data", skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn jpeg(base64_payload: impl Into<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: "image/jpeg".to_string(),
                data: base64_payload.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineData {
    #[serde(rename = "mime_type")]
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    #[serde(rename = "topK")]
    pub top_k: u32,
    #[serde(rename = "topP")]
    pub top_p: f32,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(rename = "inlineData", alias = "inline_data", default)]
    pub inline_data: Option<ResponseInlineData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseInlineData {
    #[serde(rename = "mimeType", alias = "mime_type", default)]
    pub mime_type: Option<String>,
    pub data: String,
}

impl GenerateContentResponse {
    /// Text of the first candidate part carrying any.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .find_map(|p| p.text.as_deref())
    }

    /// Base64 payload of the first inline image in any candidate part.
    pub fn first_inline_image(&self) -> Option<&str> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .find_map(|p| p.inline_data.as_ref().map(|d| d.data.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_expected_keys() {
        let request = GenerateContentRequest::new(
            vec![Part::jpeg("QUJD"), Part::text("repaint the walls")],
            GenerationConfig {
                temperature: 0.4,
                top_k: 32,
                top_p: 0.8,
                max_output_tokens: Some(8192),
            },
        );
        let value = serde_json::to_value(&request).expect("serialize");

        assert_eq!(
            value["contents"][0]["parts"][0]["inline_data"]["mime_type"],
            "image/jpeg"
        );
        assert_eq!(value["contents"][0]["parts"][0]["inline_data"]["data"], "QUJD");
        assert_eq!(value["contents"][0]["parts"][1]["text"], "repaint the walls");
        assert_eq!(value["generationConfig"]["topK"], 32);
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 8192);
        // Absent fields stay off the wire entirely.
        assert!(value["contents"][0]["parts"][1]
            .as_object()
            .expect("part object")
            .get("inline_data")
            .is_none());
    }

    #[test]
    fn omitted_max_tokens_is_not_serialized() {
        let request = GenerateContentRequest::new(
            vec![Part::text("hello")],
            GenerationConfig {
                temperature: 0.7,
                top_k: 20,
                top_p: 0.8,
                max_output_tokens: None,
            },
        );
        let value = serde_json::to_value(&request).expect("serialize");
        assert!(value["generationConfig"]
            .as_object()
            .expect("config object")
            .get("maxOutputTokens")
            .is_none());
    }

    #[test]
    fn response_text_extraction() {
        let payload = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "A cozy reading nook." }] }
            }]
        });
        let response: GenerateContentResponse =
            serde_json::from_value(payload).expect("parse");
        assert_eq!(response.first_text(), Some("A cozy reading nook."));
        assert!(response.first_inline_image().is_none());
    }

    #[test]
    fn response_image_extraction_walks_parts() {
        let payload = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "Here is the updated room." },
                    { "inlineData": { "mimeType": "image/png", "data": "aW1n" } }
                ]}
            }]
        });
        let response: GenerateContentResponse =
            serde_json::from_value(payload).expect("parse");
        assert_eq!(response.first_inline_image(), Some("aW1n"));
    }

    #[test]
    fn empty_response_yields_nothing() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({})).expect("parse");
        assert!(response.first_text().is_none());
        assert!(response.first_inline_image().is_none());
    }
}
