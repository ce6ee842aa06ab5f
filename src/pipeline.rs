use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rand::Rng;
use tracing::{debug, warn};

use crate::audio::AudioExtractor;
use crate::transcribe::Transcriber;
use crate::{fetcher, Error, Result};

pub const ALLOWED_VIDEO_EXTENSIONS: [&str; 4] =
  ["mp4", "avi", "mov", "wmv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Received,
  Downloading,
  Extracting,
  Transcribing,
  Cleanup,
  Responded,
}

// One request's worth of pipeline state. Every transient file the job
// creates is claimed here and unlinked before the handler returns,
// success or failure.
pub struct Job {
  id: String,
  stage: Stage,
  artifacts: Vec<PathBuf>,
}

impl Job {
  pub fn new() -> Self {
    // timestamp plus a random suffix keeps concurrent jobs disjoint on
    // the shared media directory without any locking
    let id = format!(
      "{}-{:08x}",
      chrono::Utc::now().timestamp_millis(),
      rand::thread_rng().gen::<u32>()
    );

    Self {
      id,
      stage: Stage::Received,
      artifacts: Vec::new(),
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  fn enter(&mut self, stage: Stage) {
    debug!(job = %self.id, ?stage, "stage transition");
    self.stage = stage;
  }

  // claim paths before the operation that writes them, so partial
  // outputs are swept too
  fn claim(&mut self, path: PathBuf) {
    self.artifacts.push(path);
  }

  // unlink failures are logged and swallowed: cleanup must never mask
  // the pipeline result.
  async fn cleanup(&mut self) {
    self.enter(Stage::Cleanup);

    for path in self.artifacts.drain(..) {
      match tokio::fs::remove_file(&path).await {
        Ok(()) => debug!(job = %self.id, path = %path.display(), "deleted"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(
          job = %self.id,
          path = %path.display(),
          "failed to delete transient file: {err}"
        ),
      }
    }
  }
}

pub struct Pipeline {
  media_dir: PathBuf,
  http: reqwest::Client,
  extractor: Arc<dyn AudioExtractor>,
  transcriber: Arc<dyn Transcriber>,
}

impl Pipeline {
  pub fn new(
    media_dir: PathBuf,
    extractor: Arc<dyn AudioExtractor>,
    transcriber: Arc<dyn Transcriber>,
  ) -> Self {
    let http = reqwest::Client::builder()
      .connect_timeout(Duration::from_secs(10))
      .build()
      .expect("failed to build HTTP client");

    Self {
      media_dir,
      http,
      extractor,
      transcriber,
    }
  }

  // entry point for uploaded files: skips the download stage.
  pub async fn transcribe_upload(
    &self,
    file_name: &str,
    data: Bytes,
  ) -> Result<String> {
    let ext = allowed_extension(file_name)?;

    let mut job = Job::new();
    let result = self.run_upload(&mut job, &ext, data).await;
    job.cleanup().await;
    job.enter(Stage::Responded);

    result
  }

  // entry point for remote locators: the full download → extract →
  // transcribe chain.
  pub async fn process_remote(&self, locator: &str) -> Result<String> {
    let mut job = Job::new();
    let result = self.run_remote(&mut job, locator).await;
    job.cleanup().await;
    job.enter(Stage::Responded);

    result
  }

  async fn run_upload(
    &self,
    job: &mut Job,
    ext: &str,
    data: Bytes,
  ) -> Result<String> {
    let video_path = self.media_dir.join(format!("{}.{ext}", job.id()));
    job.claim(video_path.clone());
    tokio::fs::write(&video_path, &data).await?;

    self.extract_and_transcribe(job, &video_path).await
  }

  async fn run_remote(&self, job: &mut Job, locator: &str) -> Result<String> {
    job.enter(Stage::Downloading);
    let video_path = self.media_dir.join(format!("{}.mp4", job.id()));
    job.claim(video_path.clone());
    fetcher::resolve_and_download(&self.http, locator, &video_path).await?;

    self.extract_and_transcribe(job, &video_path).await
  }

  async fn extract_and_transcribe(
    &self,
    job: &mut Job,
    video_path: &Path,
  ) -> Result<String> {
    job.enter(Stage::Extracting);
    job.claim(self.extractor.output_path(video_path));
    let audio_path = self.extractor.extract(video_path).await?;

    job.enter(Stage::Transcribing);
    self.transcriber.transcribe(&audio_path).await
  }
}

fn allowed_extension(file_name: &str) -> Result<String> {
  let ext = Path::new(file_name)
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| ext.to_ascii_lowercase())
    .ok_or_else(|| Error::UnsupportedExtension(file_name.to_string()))?;

  if ALLOWED_VIDEO_EXTENSIONS.contains(&ext.as_str()) {
    Ok(ext)
  } else {
    Err(Error::UnsupportedExtension(ext))
  }
}

#[cfg(test)]
mod test {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use async_trait::async_trait;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  use super::*;

  // writes a marker file where the real extractor would write audio
  struct StubExtractor {
    calls: AtomicUsize,
  }

  impl StubExtractor {
    fn new() -> Arc<Self> {
      Arc::new(Self {
        calls: AtomicUsize::new(0),
      })
    }
  }

  #[async_trait]
  impl AudioExtractor for StubExtractor {
    async fn extract(&self, video_path: &Path) -> Result<PathBuf> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      let audio_path = self.output_path(video_path);
      tokio::fs::write(&audio_path, b"fake-wav").await?;
      Ok(audio_path)
    }
  }

  struct StubTranscriber {
    fail: bool,
  }

  #[async_trait]
  impl Transcriber for StubTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String> {
      assert!(audio_path.exists(), "audio must exist while transcribing");
      if self.fail {
        Err(Error::EmptyTranscript)
      } else {
        Ok("a transcript".to_string())
      }
    }
  }

  fn pipeline(
    dir: &Path,
    extractor: Arc<StubExtractor>,
    fail_transcription: bool,
  ) -> Pipeline {
    Pipeline::new(
      dir.to_path_buf(),
      extractor,
      Arc::new(StubTranscriber {
        fail: fail_transcription,
      }),
    )
  }

  fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
  }

  #[tokio::test]
  async fn upload_flow_transcribes_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let extractor = StubExtractor::new();
    let pipeline = pipeline(dir.path(), extractor.clone(), false);

    let transcript = pipeline
      .transcribe_upload("lecture.mp4", Bytes::from_static(b"fake-video"))
      .await
      .unwrap();

    assert_eq!(transcript, "a transcript");
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    assert!(dir_is_empty(dir.path()), "artifacts must not outlive the job");
  }

  #[tokio::test]
  async fn failed_transcription_still_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let extractor = StubExtractor::new();
    let pipeline = pipeline(dir.path(), extractor, true);

    let result = pipeline
      .transcribe_upload("lecture.mov", Bytes::from_static(b"fake-video"))
      .await;

    assert!(matches!(result, Err(Error::EmptyTranscript)));
    assert!(dir_is_empty(dir.path()), "artifacts must not outlive the job");
  }

  #[tokio::test]
  async fn unsupported_extension_is_rejected_before_any_work() {
    let dir = tempfile::tempdir().unwrap();
    let extractor = StubExtractor::new();
    let pipeline = pipeline(dir.path(), extractor.clone(), false);

    let result = pipeline
      .transcribe_upload("movie.mkv", Bytes::from_static(b"fake-video"))
      .await;

    assert!(matches!(result, Err(Error::UnsupportedExtension(_))));
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    assert!(dir_is_empty(dir.path()));
  }

  #[test]
  fn extension_check_is_case_insensitive() {
    assert_eq!(allowed_extension("CLIP.MP4").unwrap(), "mp4");
    assert!(allowed_extension("notes.txt").is_err());
    assert!(allowed_extension("no-extension").is_err());
  }

  #[tokio::test]
  async fn remote_flow_downloads_extracts_and_cleans_up() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/talk.mp4"))
      .respond_with(
        ResponseTemplate::new(200).set_body_bytes(b"fake-video".to_vec()),
      )
      .mount(&server)
      .await;

    let dir = tempfile::tempdir().unwrap();
    let extractor = StubExtractor::new();
    let pipeline = pipeline(dir.path(), extractor, false);

    let transcript = pipeline
      .process_remote(&format!("{}/talk.mp4", server.uri()))
      .await
      .unwrap();

    assert_eq!(transcript, "a transcript");
    assert!(dir_is_empty(dir.path()), "artifacts must not outlive the job");
  }

  #[tokio::test]
  async fn failed_download_leaves_nothing_behind() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/missing.mp4"))
      .respond_with(ResponseTemplate::new(404))
      .mount(&server)
      .await;

    let dir = tempfile::tempdir().unwrap();
    let extractor = StubExtractor::new();
    let pipeline = pipeline(dir.path(), extractor.clone(), false);

    let result = pipeline
      .process_remote(&format!("{}/missing.mp4", server.uri()))
      .await;

    assert!(matches!(result, Err(Error::UpstreamStatus { .. })));
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    assert!(dir_is_empty(dir.path()));
  }

  #[test]
  fn job_ids_namespace_concurrent_work() {
    let a = Job::new();
    let b = Job::new();
    assert_ne!(a.id(), b.id());
  }
}
