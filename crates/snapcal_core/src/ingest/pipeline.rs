//! Photo ingestion pipeline.
//!
//! # Responsibility
//! - Encode a meal photo and send it to the vision model with a fixed prompt.
//! - Decode the answer into model-estimated entries.
//! - Record the whole batch in the entry store in one mutation.
//!
//! # Invariants
//! - Missing credentials fail before any network call.
//! - Exactly one model call per submission.
//! - The store is touched only after the answer fully validates; any failure
//!   leaves it unchanged.

use crate::config::Credentials;
use crate::ingest::answer::{parse_answer, AnswerError};
use crate::model::entry::{CalorieEntry, NewEntry};
use crate::repo::snapshot_repo::SnapshotRepository;
use crate::service::entry_store::{EntryStore, StoreError};
use crate::vision::client::{VisionError, VisionModelClient, VisionRequest, JPEG_MIME_TYPE};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

/// Fixed instruction sent with every photo.
pub const MEAL_PROMPT: &str = "You are a nutrition assistant. Identify every distinct food \
or beverage item in this photo. For each item give its English name, its total calories in \
kcal, and its estimated portion in grams. Do not break items down into ingredients and do not \
add totals or any other fields. Respond with JSON only, exactly in this form: \
{\"items\":[{\"name\":\"\",\"kcal\":0,\"qty_g\":0}]}";

pub type IngestResult<T> = Result<T, IngestError>;

/// Failure of one photo submission.
#[derive(Debug)]
pub enum IngestError {
    /// Required credential missing.
    Configuration(String),
    /// No photo bytes supplied.
    EmptyPhoto,
    /// Model endpoint answered with a non-success status.
    Upstream { status: u16, body: String },
    /// Request never completed.
    Transport(String),
    /// Answer text is not JSON.
    Parse { raw_text_prefix: String },
    /// Answer JSON lacks the `items` shape.
    Validation(String),
    /// Store rejected the normalized batch.
    Store(StoreError),
}

impl IngestError {
    /// Stable machine-readable code for envelopes and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::EmptyPhoto => "empty_photo",
            Self::Upstream { .. } => "upstream",
            Self::Transport(_) => "transport",
            Self::Parse { .. } => "parse",
            Self::Validation(_) => "validation",
            Self::Store(_) => "store",
        }
    }
}

impl Display for IngestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(message) => write!(f, "configuration error: {message}"),
            Self::EmptyPhoto => write!(f, "photo is empty"),
            Self::Upstream { status, body } => write!(f, "vision model returned {status}: {body}"),
            Self::Transport(message) => write!(f, "vision request failed: {message}"),
            Self::Parse { raw_text_prefix } => {
                write!(f, "model answer is not JSON: {raw_text_prefix}")
            }
            Self::Validation(message) => write!(f, "model answer has unexpected shape: {message}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for IngestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<VisionError> for IngestError {
    fn from(value: VisionError) -> Self {
        match value {
            VisionError::Status { status, body } => Self::Upstream { status, body },
            VisionError::Transport(message) => Self::Transport(message),
        }
    }
}

impl From<AnswerError> for IngestError {
    fn from(value: AnswerError) -> Self {
        match value {
            AnswerError::Parse { raw_text_prefix } => Self::Parse { raw_text_prefix },
            AnswerError::Validation(message) => Self::Validation(message),
        }
    }
}

impl From<StoreError> for IngestError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Photo → vision model → entry store.
pub struct IngestionPipeline<C: VisionModelClient> {
    client: C,
}

impl<C: VisionModelClient> IngestionPipeline<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Builds the model request for one photo.
    pub fn build_request(photo: &[u8]) -> VisionRequest {
        VisionRequest {
            prompt: MEAL_PROMPT.to_string(),
            mime_type: JPEG_MIME_TYPE,
            image_base64: STANDARD.encode(photo),
            json_response: true,
        }
    }

    /// Runs one submission and records the estimated items dated today.
    ///
    /// # Errors
    /// - See `IngestError`; on any error the store is unchanged.
    pub async fn submit<P: SnapshotRepository>(
        &self,
        store: &EntryStore<P>,
        photo: &[u8],
        credentials: &Credentials,
    ) -> IngestResult<Vec<CalorieEntry>> {
        let started_at = Instant::now();
        info!(
            "event=ingest_submit module=ingest status=start photo_bytes={}",
            photo.len()
        );

        match self.run(store, photo, credentials).await {
            Ok(entries) => {
                info!(
                    "event=ingest_submit module=ingest status=ok items={} duration_ms={}",
                    entries.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(entries)
            }
            Err(err) => {
                error!(
                    "event=ingest_submit module=ingest status=error error_code={} duration_ms={}",
                    err.code(),
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }

    async fn run<P: SnapshotRepository>(
        &self,
        store: &EntryStore<P>,
        photo: &[u8],
        credentials: &Credentials,
    ) -> IngestResult<Vec<CalorieEntry>> {
        if photo.is_empty() {
            return Err(IngestError::EmptyPhoto);
        }
        let request = Self::build_request(photo);
        let api_key = credentials.api_key().ok_or_else(|| {
            IngestError::Configuration("vision API key is not configured".to_string())
        })?;

        let answer = self.client.generate(api_key, &request).await?;
        let batch = parse_answer(&answer)?
            .into_iter()
            .map(|item| item.into_new_entry())
            .collect::<Vec<NewEntry>>();

        Ok(store.add_entries(batch)?)
    }
}

impl<C: VisionModelClient + 'static> IngestionPipeline<C> {
    /// Runs `submit` on a spawned task.
    ///
    /// Dropping the handle does not cancel the model call; a successful
    /// answer is still recorded.
    pub fn submit_detached<P>(
        self: &Arc<Self>,
        store: Arc<EntryStore<P>>,
        photo: Vec<u8>,
        credentials: Credentials,
    ) -> JoinHandle<IngestResult<Vec<CalorieEntry>>>
    where
        P: SnapshotRepository + 'static,
    {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move { pipeline.submit(&store, &photo, &credentials).await })
    }
}
