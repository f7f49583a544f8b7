//! Google Gemini `generateContent` client.
//!
//! # Responsibility
//! - Serialize a `VisionRequest` into the Gemini wire format.
//! - POST it with the API key as the `key` query parameter.
//! - Return the text at `candidates[0].content.parts[0].text`.
//!
//! # Invariants
//! - The API key never reaches logs; transport errors are stripped of URLs.
//! - Non-2xx responses always map to `VisionError::Status`.

use crate::config::VisionConfig;
use crate::vision::client::{VisionError, VisionModelClient, VisionRequest};
use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

/// Gemini-backed `VisionModelClient`.
pub struct GeminiClient {
    http: Client,
    endpoint: String,
}

impl GeminiClient {
    /// Builds a client with the configured endpoint and request timeout.
    ///
    /// # Errors
    /// - `VisionError::Transport` when the HTTP client cannot be constructed.
    pub fn new(config: &VisionConfig) -> Result<Self, VisionError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| VisionError::Transport(err.to_string()))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl VisionModelClient for GeminiClient {
    async fn generate(
        &self,
        api_key: &str,
        request: &VisionRequest,
    ) -> Result<String, VisionError> {
        let started_at = Instant::now();
        let body = build_request_body(request);
        debug!(
            "event=vision_request module=vision status=start image_b64_len={}",
            request.image_base64.len()
        );

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|err| transport_error("send", err))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| transport_error("read_body", err))?;

        if !status.is_success() {
            error!(
                "event=vision_request module=vision status=error http_status={} duration_ms={}",
                status.as_u16(),
                started_at.elapsed().as_millis()
            );
            return Err(VisionError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        info!(
            "event=vision_request module=vision status=ok http_status={} duration_ms={} body_len={}",
            status.as_u16(),
            started_at.elapsed().as_millis(),
            text.len()
        );
        Ok(extract_answer_text(&text))
    }
}

fn transport_error(stage: &'static str, err: reqwest::Error) -> VisionError {
    // The request URL carries the API key in its query string.
    let message = err.without_url().to_string();
    error!("event=vision_request module=vision status=error stage={stage} error={message}");
    VisionError::Transport(message)
}

/// Builds the Gemini JSON payload for one photo prompt.
pub fn build_request_body(request: &VisionRequest) -> serde_json::Value {
    let payload = GenerateContentRequest {
        contents: vec![Content {
            parts: vec![
                Part::Text {
                    text: &request.prompt,
                },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: request.mime_type,
                        data: &request.image_base64,
                    },
                },
            ],
        }],
        generation_config: GenerationConfig {
            response_mime_type: request.json_response.then_some("application/json"),
        },
    };
    serde_json::to_value(payload).unwrap_or(serde_json::Value::Null)
}

/// Reads `candidates[0].content.parts[0].text`; any missing link yields `""`.
pub fn extract_answer_text(body: &str) -> String {
    serde_json::from_str::<GenerateContentResponse>(body)
        .unwrap_or_default()
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{build_request_body, extract_answer_text};
    use crate::vision::client::{VisionRequest, JPEG_MIME_TYPE};
    use serde_json::json;

    fn sample_request() -> VisionRequest {
        VisionRequest {
            prompt: "describe".to_string(),
            mime_type: JPEG_MIME_TYPE,
            image_base64: "AAEC".to_string(),
            json_response: true,
        }
    }

    #[test]
    fn request_body_matches_generate_content_shape() {
        let body = build_request_body(&sample_request());
        assert_eq!(
            body,
            json!({
                "contents": [{
                    "parts": [
                        { "text": "describe" },
                        { "inlineData": { "mimeType": "image/jpeg", "data": "AAEC" } }
                    ]
                }],
                "generationConfig": { "responseMimeType": "application/json" }
            })
        );
    }

    #[test]
    fn request_body_omits_mime_type_when_json_not_requested() {
        let mut request = sample_request();
        request.json_response = false;
        let body = build_request_body(&request);
        assert_eq!(body["generationConfig"], json!({}));
    }

    #[test]
    fn extracts_first_candidate_first_part_text() {
        let body = json!({
            "candidates": [
                { "content": { "parts": [{ "text": "{\"items\":[]}" }, { "text": "ignored" }] } },
                { "content": { "parts": [{ "text": "second candidate" }] } }
            ],
            "usageMetadata": { "totalTokenCount": 12 }
        })
        .to_string();
        assert_eq!(extract_answer_text(&body), "{\"items\":[]}");
    }

    #[test]
    fn missing_answer_path_yields_empty_text() {
        assert_eq!(extract_answer_text("{}"), "");
        assert_eq!(extract_answer_text("{\"candidates\":[]}"), "");
        assert_eq!(
            extract_answer_text("{\"candidates\":[{\"finishReason\":\"SAFETY\"}]}"),
            ""
        );
        assert_eq!(extract_answer_text("<html>oops</html>"), "");
    }
}
