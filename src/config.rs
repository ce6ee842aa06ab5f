use std::path::PathBuf;

use itertools::Itertools;

use crate::{Error, Result};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MEDIA_DIR: &str = "media";

#[derive(Debug, Clone)]
pub struct Config {
  pub port: u16,
  pub media_dir: PathBuf,
  pub transcription_api_key: String,
  pub generation_api_key: String,
}

impl Config {
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  // all missing credentials are reported in one diagnostic so a fresh
  // deployment fails exactly once with the full list.
  fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let mut missing = Vec::new();

    let transcription_api_key = required(&lookup, "OPENAI_API_KEY")
      .unwrap_or_else(|| {
        missing.push("OPENAI_API_KEY");
        String::new()
      });
    let generation_api_key = required(&lookup, "ANTHROPIC_API_KEY")
      .unwrap_or_else(|| {
        missing.push("ANTHROPIC_API_KEY");
        String::new()
      });

    if !missing.is_empty() {
      return Err(Error::Config(format!(
        "missing required environment variables: {}",
        missing.iter().join(", ")
      )));
    }

    let port = match lookup("PORT") {
      Some(raw) => raw
        .parse()
        .map_err(|_| Error::Config(format!("PORT is not a number: {raw}")))?,
      None => DEFAULT_PORT,
    };

    let media_dir = lookup("MEDIA_DIR")
      .map(PathBuf::from)
      .unwrap_or_else(|| PathBuf::from(DEFAULT_MEDIA_DIR));

    Ok(Self {
      port,
      media_dir,
      transcription_api_key,
      generation_api_key,
    })
  }
}

fn required(
  lookup: impl Fn(&str) -> Option<String>,
  key: &str,
) -> Option<String> {
  lookup(key).filter(|value| !value.trim().is_empty())
}
