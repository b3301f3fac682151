//! HTTP client for the external speech-to-text service.
//!
//! The media file is streamed in fixed-size chunks; the whole file is never
//! held in memory. Segment-level timestamps are requested explicitly so the
//! response stays bounded for long recordings.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Body, Client, StatusCode};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::SpeechError;
use crate::transcribe::{SpeechToText, TranscriptHints, TranscriptResponse, TranscriptSegment};

/// Upload chunk size. Small and fixed so concurrent transcriptions stay
/// within the admission controller's assumptions.
pub const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// Per-request ceiling; transcription of long media is slow but bounded.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Maximum error-body length carried into logs and error messages.
const MAX_ERROR_BODY_LENGTH: usize = 200;

fn truncate_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        format!("{}... (truncated)", &body[..MAX_ERROR_BODY_LENGTH])
    } else {
        body.to_string()
    }
}

/// Wire format of a transcription response.
#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    segments: Vec<WireSegment>,
}

#[derive(Debug, Deserialize)]
struct WireSegment {
    text: String,
    #[serde(default)]
    start_ms: u64,
    #[serde(default)]
    end_ms: u64,
}

pub struct HttpSpeechClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HttpSpeechClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    /// Maps a transport-level failure to its typed category at the call
    /// site.
    fn classify_transport(e: reqwest::Error) -> SpeechError {
        if e.is_timeout() {
            SpeechError::Timeout(e.to_string())
        } else {
            SpeechError::Service(e.to_string())
        }
    }

    fn classify_status(status: StatusCode, body: &str) -> SpeechError {
        let detail = format!("HTTP {}: {}", status.as_u16(), truncate_body(body));
        match status {
            StatusCode::PAYLOAD_TOO_LARGE => SpeechError::SizeExceeded(detail),
            StatusCode::UNSUPPORTED_MEDIA_TYPE | StatusCode::UNPROCESSABLE_ENTITY => {
                SpeechError::InvalidFormat(detail)
            }
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                SpeechError::Timeout(detail)
            }
            _ => SpeechError::Service(detail),
        }
    }
}

#[async_trait]
impl SpeechToText for HttpSpeechClient {
    async fn transcribe(
        &self,
        media_path: &Path,
        hints: &TranscriptHints,
    ) -> Result<TranscriptResponse, SpeechError> {
        let file = tokio::fs::File::open(media_path)
            .await
            .map_err(|e| SpeechError::Service(format!("Failed to open media: {}", e)))?;

        let stream = ReaderStream::with_capacity(file, UPLOAD_CHUNK_BYTES);
        let body = Body::wrap_stream(stream);

        let mime = mime_guess::from_path(media_path)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        debug!(path = %media_path.display(), mime = %mime, "Streaming media to transcription service");

        let mut request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, mime)
            // Segment-level timing only; word-level responses grow with
            // recording length.
            .query(&[("timestamps", "segment")])
            .timeout(REQUEST_TIMEOUT)
            .body(body);

        if let Some(ref language) = hints.language {
            request = request.query(&[("language", language.as_str())]);
        }

        let response = request.send().await.map_err(Self::classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::Service(format!("Malformed response: {}", e)))?;

        Ok(TranscriptResponse {
            segments: wire
                .segments
                .into_iter()
                .map(|s| TranscriptSegment {
                    text: s.text,
                    start_ms: s.start_ms,
                    end_ms: s.end_ms,
                })
                .collect(),
            language: wire.language.unwrap_or_else(|| "unknown".to_string()),
        })
    }
}
