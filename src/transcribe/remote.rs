//! [`RemoteTranscriber`] — the backend transcription path.
//!
//! Uploads a recorded clip as a multipart WAV to the backend's
//! `/api/transcribe-audio` endpoint and returns the `{text}` it answers
//! with.  No local model involved; every failure (transport, non-2xx,
//! unparseable body) surfaces as a single [`RemoteError`] with no retry.

use thiserror::Error;

use crate::capture::AudioClip;
use crate::config::TranscribeConfig;

// ---------------------------------------------------------------------------
// RemoteError
// ---------------------------------------------------------------------------

/// Errors from the backend transcription path.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The clip could not be encoded as WAV.
    #[error("failed to encode clip: {0}")]
    Encode(String),

    /// HTTP transport or connection error.
    #[error("transcription upload failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("transcription request timed out")]
    Timeout,

    /// The backend answered with a non-2xx status.
    #[error("transcription backend returned HTTP {0}")]
    Status(u16),

    /// The response body was not the expected `{text}` JSON.
    #[error("failed to parse transcription response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RemoteError::Timeout
        } else {
            RemoteError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteTranscriber
// ---------------------------------------------------------------------------

/// HTTP client for the backend transcription service.
pub struct RemoteTranscriber {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteTranscriber {
    /// Build a `RemoteTranscriber` from the transcription config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.remote_timeout_secs`.  A default (no-timeout) client is the
    /// last-resort fallback if the builder fails (should never happen in
    /// practice).
    pub fn from_config(config: &TranscribeConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.remote_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.remote_base_url.clone(),
        }
    }

    /// Upload `clip` and return the transcribed text.
    pub async fn transcribe(&self, clip: &AudioClip) -> Result<String, RemoteError> {
        let wav = clip
            .to_wav_bytes()
            .map_err(|e| RemoteError::Encode(e.to_string()))?;

        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("clip.wav")
            .mime_str("audio/wav")?;
        let form = reqwest::multipart::Form::new().part("audio", part);

        let url = format!("{}/api/transcribe-audio", self.base_url);
        log::debug!(
            "remote: uploading {:.1} s clip to {url}",
            clip.duration_secs()
        );

        let response = self.client.post(&url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;

        let text = json["text"]
            .as_str()
            .ok_or_else(|| RemoteError::Parse("missing `text` field".into()))?
            .trim()
            .to_string();

        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config() -> TranscribeConfig {
        TranscribeConfig {
            remote_base_url: "http://localhost:8080".into(),
            remote_timeout_secs: 5,
            ..TranscribeConfig::default()
        }
    }

    #[test]
    fn from_config_builds_without_panic() {
        let _client = RemoteTranscriber::from_config(&make_config());
    }

    #[test]
    fn status_error_display_includes_code() {
        let err = RemoteError::Status(500);
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_single_request_error() {
        // Port 9 (discard) is not listening; the upload must reject once
        // with a transport error, not hang or panic.
        let config = TranscribeConfig {
            remote_base_url: "http://127.0.0.1:9".into(),
            remote_timeout_secs: 2,
            ..TranscribeConfig::default()
        };
        let client = RemoteTranscriber::from_config(&config);
        let clip = AudioClip::new(vec![0.0f32; 16_000], 16_000);

        let err = client.transcribe(&clip).await.unwrap_err();
        assert!(
            matches!(err, RemoteError::Request(_) | RemoteError::Timeout),
            "got: {err:?}"
        );
    }
}
