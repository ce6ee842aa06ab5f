use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart;

use crate::{retry, Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const MODEL: &str = "whisper-1";

// provider outages are assumed transient, so every failure of the
// network call is retried.
const ATTEMPTS: u32 = 3;

#[async_trait]
pub trait Transcriber: Send + Sync {
  async fn transcribe(&self, audio_path: &Path) -> Result<String>;
}

pub struct Whisper {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
}

impl Whisper {
  pub fn new(api_key: String) -> Self {
    Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
  }

  // point the client at a custom base URL (useful for testing).
  pub fn with_base_url(api_key: String, base_url: String) -> Self {
    let client = reqwest::Client::builder()
      .connect_timeout(Duration::from_secs(10))
      .timeout(Duration::from_secs(120))
      .build()
      .expect("failed to build HTTP client");

    Self {
      client,
      api_key,
      base_url,
    }
  }

  async fn request(&self, file_name: &str, audio: Bytes) -> Result<String> {
    let part = multipart::Part::bytes(audio.to_vec())
      .file_name(file_name.to_string())
      .mime_str("audio/wav")?;
    let form = multipart::Form::new()
      .part("file", part)
      .text("model", MODEL)
      .text("response_format", "json");

    let resp = self
      .client
      .post(format!("{}/v1/audio/transcriptions", self.base_url))
      .bearer_auth(&self.api_key)
      .multipart(form)
      .send()
      .await
      .map_err(|e| Error::Transcription(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
      let message = resp
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
      return Err(Error::Transcription(format!(
        "status {status}: {message}"
      )));
    }

    #[derive(serde::Deserialize)]
    struct TranscriptionResponse {
      text: String,
    }

    let body: TranscriptionResponse = resp.json().await?;
    Ok(body.text)
  }
}

#[async_trait]
impl Transcriber for Whisper {
  async fn transcribe(&self, audio_path: &Path) -> Result<String> {
    // validate the artifact before touching the network: a missing,
    // unreadable or empty file is terminal.
    let audio = tokio::fs::read(audio_path).await?;
    if audio.is_empty() {
      return Err(Error::EmptyAudio(audio_path.to_owned()));
    }
    let audio = Bytes::from(audio);

    let file_name = audio_path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_else(|| "audio.wav".to_string());

    let text = retry::with_retry(ATTEMPTS, |_| true, || {
      self.request(&file_name, audio.clone())
    })
    .await?;

    if text.trim().is_empty() {
      return Err(Error::EmptyTranscript);
    }

    Ok(text)
  }
}
