//! Vision model client contract.

use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// MIME type of every photo sent for analysis.
pub const JPEG_MIME_TYPE: &str = "image/jpeg";

/// One multimodal prompt: an instruction plus one inline image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionRequest {
    pub prompt: String,
    pub mime_type: &'static str,
    /// Base64 (standard alphabet, padded) image bytes.
    pub image_base64: String,
    /// Ask the model for a JSON-typed answer.
    pub json_response: bool,
}

/// Transport-level failure of one model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisionError {
    /// Endpoint answered with a non-success HTTP status.
    Status { status: u16, body: String },
    /// Request could not be sent or the response body could not be read.
    Transport(String),
}

impl Display for VisionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status { status, body } => write!(f, "vision endpoint returned {status}: {body}"),
            Self::Transport(message) => write!(f, "vision request failed: {message}"),
        }
    }
}

impl Error for VisionError {}

/// Single-call interface to a hosted multimodal model.
///
/// Implementations perform exactly one outbound request per call and return
/// the model's raw answer text. A response without an answer yields an
/// empty string rather than an error.
#[async_trait]
pub trait VisionModelClient: Send + Sync {
    async fn generate(&self, api_key: &str, request: &VisionRequest)
        -> Result<String, VisionError>;
}

#[async_trait]
impl<T: VisionModelClient + ?Sized> VisionModelClient for Arc<T> {
    async fn generate(
        &self,
        api_key: &str,
        request: &VisionRequest,
    ) -> Result<String, VisionError> {
        (**self).generate(api_key, request).await
    }
}
