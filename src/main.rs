use std::net::SocketAddr;
use std::sync::Arc;

mod api;
mod audio;
mod config;
mod error;
mod fetcher;
mod intelligence;
mod pipeline;
mod retry;
mod transcribe;

pub use error::{Error, Result};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let config = config::Config::from_env()?;
  tokio::fs::create_dir_all(&config.media_dir).await?;

  let extractor = Arc::new(audio::Ffmpeg);
  let transcriber = Arc::new(transcribe::Whisper::new(
    config.transcription_api_key.clone(),
  ));
  let generator = Arc::new(intelligence::Anthropic::new(
    config.generation_api_key.clone(),
  ));

  let app = Arc::new(api::App {
    pipeline: pipeline::Pipeline::new(
      config.media_dir.clone(),
      extractor,
      transcriber,
    ),
    generator,
  });

  let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
  tracing::info!("listening on {addr}");

  axum::Server::bind(&addr)
    .serve(api::router(app).into_make_service())
    .await
    .expect("failed to start server");

  Ok(())
}
