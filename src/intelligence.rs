use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{retry, Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 2048;

// generation calls are only worth re-issuing when the provider is
// shedding load; everything else is terminal.
const ATTEMPTS: u32 = 5;

#[async_trait]
pub trait Generator: Send + Sync {
  async fn generate(&self, prompt: &str) -> Result<String>;
}

pub struct Anthropic {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
}

impl Anthropic {
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
}

#[derive(Serialize)]
struct MessagesRequest {
  model: String,
  max_tokens: u32,
  messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
  role: String,
  content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
  content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
  text: String,
}

#[async_trait]
impl Generator for Anthropic {
  async fn generate(&self, prompt: &str) -> Result<String> {
    let req = MessagesRequest {
      model: MODEL.to_string(),
      max_tokens: MAX_TOKENS,
      messages: vec![Message {
        role: "user".to_string(),
        content: prompt.to_string(),
      }],
    };

    let resp = self
      .client
      .post(format!("{}/v1/messages", self.base_url))
      .header("x-api-key", &self.api_key)
      .header("anthropic-version", "2023-06-01")
      .json(&req)
      .send()
      .await?;

    let status = resp.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
      return Err(Error::RateLimited);
    }
    if !status.is_success() {
      let message = resp
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
      return Err(Error::Generation {
        status: status.as_u16(),
        message,
      });
    }

    let body: MessagesResponse = resp.json().await?;
    body
      .content
      .into_iter()
      .next()
      .map(|block| block.text)
      .ok_or(Error::Generation {
        status: status.as_u16(),
        message: "provider returned no content".to_string(),
      })
  }
}

async fn generate_with_retry(
  generator: &dyn Generator,
  prompt: &str,
) -> Result<String> {
  retry::with_retry(ATTEMPTS, Error::is_rate_limited, || {
    generator.generate(prompt)
  })
  .await
}

pub async fn summarize(
  generator: &dyn Generator,
  text: &str,
) -> Result<String> {
  let prompt =
    format!("Provide a clear, concise summary of the following text:\n\n{text}");
  generate_with_retry(generator, &prompt).await
}

pub async fn translate(
  generator: &dyn Generator,
  text: &str,
  target_language: &str,
) -> Result<String> {
  let prompt = format!(
    "Translate the following text to {target_language}. \
     Respond with the translation only, no commentary.\n\n{text}"
  );
  generate_with_retry(generator, &prompt).await
}

// deliberately asks for the main idea of the context rather than a
// literal answer lookup.
pub async fn answer(
  generator: &dyn Generator,
  context: &str,
  question: &str,
) -> Result<String> {
  let prompt = format!(
    "Based on the following context, provide a concise summary of the \
     main idea that addresses the question.\n\n\
     Context:\n{context}\n\nQuestion: {question}"
  );
  generate_with_retry(generator, &prompt).await
}

pub async fn generate_quiz(
  generator: &dyn Generator,
  text: &str,
) -> Result<Quiz> {
  let prompt = format!(
    "Generate a quiz from the text below. Respond with JSON only, no \
     commentary, using exactly this shape:\n\
     {{\"multipleChoice\":[{{\"question\":\"...\",\"options\":{{\"A\":\
     \"...\",\"B\":\"...\",\"C\":\"...\",\"D\":\"...\"}},\
     \"correctAnswer\":\"A\"}}],\"trueFalse\":[{{\"question\":\"...\",\
     \"answer\":true}}]}}\n\
     The multipleChoice array must contain exactly 3 items and the \
     trueFalse array exactly 2 items.\n\nText:\n{text}"
  );
  let raw = generate_with_retry(generator, &prompt).await?;
  parse_quiz(&raw)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
  #[serde(rename = "multipleChoice")]
  pub multiple_choice: Vec<MultipleChoice>,
  #[serde(rename = "trueFalse")]
  pub true_false: Vec<TrueFalse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipleChoice {
  pub question: String,
  pub options: Options,
  #[serde(rename = "correctAnswer")]
  pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Options {
  #[serde(rename = "A")]
  pub a: String,
  #[serde(rename = "B")]
  pub b: String,
  #[serde(rename = "C")]
  pub c: String,
  #[serde(rename = "D")]
  pub d: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrueFalse {
  pub question: String,
  pub answer: bool,
}

// a parse failure here is the provider's output shape, not a transient
// fault, so the whole operation fails with no partial quiz.
pub fn parse_quiz(raw: &str) -> Result<Quiz> {
  let body = strip_code_fence(raw);
  serde_json::from_str(body).map_err(Error::MalformedQuiz)
}

// models habitually wrap JSON answers in fenced-code markers, with or
// without a language tag.
fn strip_code_fence(raw: &str) -> &str {
  let trimmed = raw.trim();
  let Some(inner) = trimmed.strip_prefix("```") else {
    return trimmed;
  };
  let inner = inner.strip_suffix("```").unwrap_or(inner);

  match inner.split_once('\n') {
    Some((first_line, rest))
      if !first_line.trim_start().starts_with('{') =>
    {
      rest.trim()
    }
    _ => inner.trim(),
  }
}
