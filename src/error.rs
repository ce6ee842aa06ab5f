use std::path::PathBuf;

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde_json::json;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("configuration error: {0}")]
  Config(String),

  #[error("missing required field: {0}")]
  MissingField(&'static str),

  #[error("unsupported video extension: {0}")]
  UnsupportedExtension(String),

  #[error("unsupported url {0}: {1}")]
  UnsupportedUrl(String, &'static str),

  #[error("invalid multipart upload: {0}")]
  Multipart(String),

  #[error("no response from {0}")]
  Unreachable(String),

  #[error("download timed out: {0}")]
  DownloadTimeout(String),

  #[error("upstream returned status {status} for {url}")]
  UpstreamStatus { url: String, status: u16 },

  #[error("download exceeds the {limit} byte limit")]
  DownloadTooLarge { limit: u64 },

  #[error("malformed page: {0}")]
  InvalidHtml(&'static str),

  #[error("malformed player config: {0}")]
  PlayerConfig(serde_json::Error),

  #[error("no progressive stream in player config")]
  NoProgressiveStream,

  #[error("audio extraction failed: {0}")]
  Extraction(String),

  #[error("audio file is empty: {}", .0.display())]
  EmptyAudio(PathBuf),

  #[error("transcription provider error: {0}")]
  Transcription(String),

  #[error("transcription returned empty text")]
  EmptyTranscript,

  #[error("rate limited by generation provider")]
  RateLimited,

  #[error("generation provider error (status {status}): {message}")]
  Generation { status: u16, message: String },

  #[error("malformed quiz payload: {0}")]
  MalformedQuiz(serde_json::Error),

  #[error(transparent)]
  Http(#[from] reqwest::Error),

  #[error(transparent)]
  IO(#[from] std::io::Error),

  #[error(transparent)]
  Json(#[from] serde_json::Error),
}

impl Error {
  pub fn status(&self) -> StatusCode {
    match self {
      Error::MissingField(_)
      | Error::UnsupportedExtension(_)
      | Error::UnsupportedUrl(..)
      | Error::Multipart(_) => StatusCode::BAD_REQUEST,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  // stable category for the `error` field; the full message goes into
  // `details`.
  pub fn summary(&self) -> &'static str {
    match self {
      Error::MissingField(_)
      | Error::UnsupportedExtension(_)
      | Error::UnsupportedUrl(..)
      | Error::Multipart(_) => "invalid request",
      Error::Unreachable(_)
      | Error::DownloadTimeout(_)
      | Error::UpstreamStatus { .. }
      | Error::DownloadTooLarge { .. }
      | Error::InvalidHtml(_)
      | Error::PlayerConfig(_)
      | Error::NoProgressiveStream => "failed to download video",
      Error::Extraction(_) | Error::EmptyAudio(_) => {
        "failed to extract audio"
      }
      Error::Transcription(_) | Error::EmptyTranscript => {
        "failed to transcribe audio"
      }
      Error::RateLimited
      | Error::Generation { .. }
      | Error::MalformedQuiz(_) => "failed to generate content",
      Error::Config(_) => "service misconfigured",
      Error::Http(_) | Error::IO(_) | Error::Json(_) => "internal error",
    }
  }

  pub fn is_rate_limited(&self) -> bool {
    matches!(self, Error::RateLimited)
  }

  pub fn is_unreachable(&self) -> bool {
    matches!(self, Error::Unreachable(_))
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!("request failed: {self}");
    }

    let body = Json(json!({
      "error": self.summary(),
      "details": self.to_string(),
    }));

    (status, body).into_response()
  }
}
