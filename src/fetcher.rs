mod vimeo;

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use http_types::Url;
use tokio::io::AsyncWriteExt;

use crate::{retry, Error, Result};

pub const MAX_DOWNLOAD_BYTES: u64 = 500 * 1024 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(30);

// DNS hiccups resolve themselves quickly; one bounded re-attempt
// replaces the unbounded self-call this logic once used.
const ATTEMPTS: u32 = 2;

// Resolve `locator` to a direct media stream and write it to `dest`.
// Hosting-page URLs are scraped for their player config first; direct
// URLs stream as-is.
pub async fn resolve_and_download(
  client: &reqwest::Client,
  locator: &str,
  dest: &Path,
) -> Result<()> {
  let url = parse_locator(locator)?;

  retry::with_retry(ATTEMPTS, Error::is_unreachable, || {
    attempt(client, &url, dest)
  })
  .await
}

fn parse_locator(locator: &str) -> Result<Url> {
  let url: Url = locator
    .parse()
    .map_err(|_| Error::UnsupportedUrl(locator.into(), "not an absolute url"))?;

  match url.scheme() {
    "http" | "https" => Ok(url),
    _ => Err(Error::UnsupportedUrl(locator.into(), "unsupported scheme")),
  }
}

async fn attempt(
  client: &reqwest::Client,
  url: &Url,
  dest: &Path,
) -> Result<()> {
  let stream_url = if vimeo::is_player_page(url) {
    vimeo::resolve_progressive(client, url.as_str()).await?
  } else {
    url.to_string()
  };

  match download_to(client, &stream_url, dest, MAX_DOWNLOAD_BYTES).await {
    Ok(()) => Ok(()),
    Err(err) => {
      // never leave a partial file behind for the next stage to trip on
      tokio::fs::remove_file(dest).await.ok();
      Err(err)
    }
  }
}

async fn download_to(
  client: &reqwest::Client,
  url: &str,
  dest: &Path,
  max_bytes: u64,
) -> Result<()> {
  let resp = client.get(url).send().await.map_err(map_transport)?;

  let status = resp.status();
  if !status.is_success() {
    return Err(Error::UpstreamStatus {
      url: url.to_string(),
      status: status.as_u16(),
    });
  }

  if let Some(len) = resp.content_length() {
    if len > max_bytes {
      return Err(Error::DownloadTooLarge { limit: max_bytes });
    }
  }

  let mut file = tokio::fs::File::create(dest).await?;
  let mut stream = resp.bytes_stream();
  let mut written: u64 = 0;

  loop {
    let chunk = match tokio::time::timeout(READ_TIMEOUT, stream.next()).await
    {
      Err(_) => return Err(Error::DownloadTimeout(url.to_string())),
      Ok(None) => break,
      Ok(Some(chunk)) => chunk.map_err(map_transport)?,
    };

    written += chunk.len() as u64;
    if written > max_bytes {
      return Err(Error::DownloadTooLarge { limit: max_bytes });
    }

    file.write_all(&chunk).await?;
  }

  file.flush().await?;
  Ok(())
}

fn map_transport(err: reqwest::Error) -> Error {
  let url = err
    .url()
    .map(|u| u.to_string())
    .unwrap_or_else(|| "upstream".to_string());

  if err.is_timeout() {
    Error::DownloadTimeout(url)
  } else if err.is_connect() {
    Error::Unreachable(url)
  } else {
    Error::Http(err)
  }
}
