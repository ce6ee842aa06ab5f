use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::{Error, Result};

// run ffmpeg to demux a video into transcription-ready audio.
// requires the ffmpeg executable to be in PATH.
#[async_trait]
pub trait AudioExtractor: Send + Sync {
  // deterministic: the extractor writes next to the video, swapping
  // the extension.
  fn output_path(&self, video_path: &Path) -> PathBuf {
    video_path.with_extension("wav")
  }

  async fn extract(&self, video_path: &Path) -> Result<PathBuf>;
}

pub struct Ffmpeg;

#[async_trait]
impl AudioExtractor for Ffmpeg {
  async fn extract(&self, video_path: &Path) -> Result<PathBuf> {
    let audio_path = self.output_path(video_path);

    // 16-bit PCM mono at 16kHz, the input format the transcription
    // provider expects.
    let output = Command::new("ffmpeg")
      .arg("-y")
      .arg("-i")
      .arg(video_path)
      .arg("-vn")
      .arg("-acodec")
      .arg("pcm_s16le")
      .arg("-ar")
      .arg("16000")
      .arg("-ac")
      .arg("1")
      .arg(&audio_path)
      .output()
      .await?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(Error::Extraction(stderr.trim().to_string()));
    }

    Ok(audio_path)
  }
}
