use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::intelligence::{self, Generator, Quiz};
use crate::pipeline::Pipeline;
use crate::{fetcher, Error, Result};

pub struct App {
  pub pipeline: Pipeline,
  pub generator: Arc<dyn Generator>,
}

pub fn router(app: Arc<App>) -> Router {
  Router::new()
    .route("/", get(index))
    .route("/api/transcribe", post(transcribe))
    .route("/api/process-vimeo", post(process_vimeo))
    .route("/api/summarize", post(summarize))
    .route("/api/generate-quiz", post(generate_quiz))
    .route("/api/qa", post(qa))
    .route("/api/translate", post(translate))
    .route("/api/search", post(search))
    // uploads are whole videos; match the remote download cap
    .layer(DefaultBodyLimit::max(fetcher::MAX_DOWNLOAD_BYTES as usize))
    .with_state(app)
}

async fn index() -> impl IntoResponse {
  "video-insight is running".to_owned()
}

#[derive(Serialize)]
struct TranscriptResponse {
  transcript: String,
}

async fn transcribe(
  State(app): State<Arc<App>>,
  mut multipart: Multipart,
) -> Result<Json<TranscriptResponse>> {
  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|err| Error::Multipart(err.to_string()))?
  {
    if field.name() != Some("video") {
      continue;
    }

    let file_name = field.file_name().unwrap_or("upload").to_string();
    let data = field
      .bytes()
      .await
      .map_err(|err| Error::Multipart(err.to_string()))?;

    let transcript =
      app.pipeline.transcribe_upload(&file_name, data).await?;
    return Ok(Json(TranscriptResponse { transcript }));
  }

  Err(Error::MissingField("video"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessVimeoRequest {
  video_url: Option<String>,
}

async fn process_vimeo(
  State(app): State<Arc<App>>,
  Json(req): Json<ProcessVimeoRequest>,
) -> Result<Json<TranscriptResponse>> {
  let video_url = required(req.video_url, "videoUrl")?;
  let transcript = app.pipeline.process_remote(&video_url).await?;

  Ok(Json(TranscriptResponse { transcript }))
}

#[derive(Deserialize)]
struct SummarizeRequest {
  text: Option<String>,
}

#[derive(Serialize)]
struct SummaryResponse {
  summary: String,
}

async fn summarize(
  State(app): State<Arc<App>>,
  Json(req): Json<SummarizeRequest>,
) -> Result<Json<SummaryResponse>> {
  let text = required(req.text, "text")?;
  let summary =
    intelligence::summarize(app.generator.as_ref(), &text).await?;

  Ok(Json(SummaryResponse { summary }))
}

#[derive(Deserialize)]
struct QuizRequest {
  text: Option<String>,
}

#[derive(Serialize)]
struct QuizResponse {
  quiz: Quiz,
}

async fn generate_quiz(
  State(app): State<Arc<App>>,
  Json(req): Json<QuizRequest>,
) -> Result<Json<QuizResponse>> {
  let text = required(req.text, "text")?;
  let quiz =
    intelligence::generate_quiz(app.generator.as_ref(), &text).await?;

  Ok(Json(QuizResponse { quiz }))
}

#[derive(Deserialize)]
struct QaRequest {
  context: Option<String>,
  question: Option<String>,
}

#[derive(Serialize)]
struct AnswerResponse {
  answer: String,
}

async fn qa(
  State(app): State<Arc<App>>,
  Json(req): Json<QaRequest>,
) -> Result<Json<AnswerResponse>> {
  let context = required(req.context, "context")?;
  let question = required(req.question, "question")?;
  let answer =
    intelligence::answer(app.generator.as_ref(), &context, &question)
      .await?;

  Ok(Json(AnswerResponse { answer }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateRequest {
  text: Option<String>,
  target_language: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslationResponse {
  translated_text: String,
}

async fn translate(
  State(app): State<Arc<App>>,
  Json(req): Json<TranslateRequest>,
) -> Result<Json<TranslationResponse>> {
  let text = required(req.text, "text")?;
  let target_language = required(req.target_language, "targetLanguage")?;
  let translated_text =
    intelligence::translate(app.generator.as_ref(), &text, &target_language)
      .await?;

  Ok(Json(TranslationResponse { translated_text }))
}

#[derive(Deserialize)]
struct SearchRequest {
  query: Option<String>,
}

#[derive(Serialize)]
struct SearchResponse {
  results: Vec<serde_json::Value>,
}

async fn search(
  Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
  let _query = required(req.query, "query")?;

  // no index behind this yet; the endpoint keeps its shape for clients
  Ok(Json(SearchResponse {
    results: Vec::new(),
  }))
}

fn required(
  value: Option<String>,
  name: &'static str,
) -> Result<String> {
  value
    .filter(|value| !value.trim().is_empty())
    .ok_or(Error::MissingField(name))
}
