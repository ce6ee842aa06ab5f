use http_types::Url;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::{Error, Result};

pub fn is_player_page(url: &Url) -> bool {
  url
    .host_str()
    .map(|host| host == "vimeo.com" || host.ends_with(".vimeo.com"))
    .unwrap_or(false)
}

// Scrape the hosting page for its player configuration resource, fetch
// it, and pick the direct URL of the best progressive rendition.
pub async fn resolve_progressive(
  client: &reqwest::Client,
  page_url: &str,
) -> Result<String> {
  let page = fetch_text(client, page_url).await?;
  let config_url = find_config_url(&page)?;

  let config = fetch_text(client, &config_url).await?;
  let config: PlayerConfig =
    serde_json::from_str(&config).map_err(Error::PlayerConfig)?;

  best_progressive(config.progressive).map(|stream| stream.url)
}

async fn fetch_text(
  client: &reqwest::Client,
  url: &str,
) -> Result<String> {
  let resp = client
    .get(url)
    .header("User-Agent", "Mozilla/5.0")
    .send()
    .await
    .map_err(super::map_transport)?;

  let status = resp.status();
  if !status.is_success() {
    return Err(Error::UpstreamStatus {
      url: url.to_string(),
      status: status.as_u16(),
    });
  }

  Ok(resp.text().await?)
}

static CONFIG_URL_REGEX: Lazy<Regex> =
  Lazy::new(|| Regex::new(r#""config_url"\s*:\s*"([^"]+)""#).unwrap());

fn find_config_url(html: &str) -> Result<String> {
  let dom = tl::parse(html, tl::ParserOptions::default())
    .map_err(|_| Error::InvalidHtml("unparseable document"))?;

  // embed markup carries the config location as a data attribute
  let mut nodes = dom
    .query_selector("div[data-config-url]")
    .expect("selector is hard-coded, thus must be valid");
  if let Some(node) = nodes.next() {
    let url = node
      .get(dom.parser())
      .expect("queried node must be within dom")
      .as_tag()
      .ok_or(Error::InvalidHtml("div[data-config-url]"))?
      .attributes()
      .get("data-config-url")
      .expect("attribute must exist")
      .ok_or(Error::InvalidHtml("data-config-url value"))?
      .as_utf8_str();

    return Ok(unescape_json_url(&url));
  }

  // newer pages inline the player state in a script tag instead
  let scripts = dom
    .query_selector("script")
    .expect("selector should be valid");
  for node in scripts {
    let Some(tag) = node
      .get(dom.parser())
      .expect("queried node must be within dom")
      .as_tag()
    else {
      continue;
    };

    let script = tag.inner_text(dom.parser());
    if let Some(caps) = CONFIG_URL_REGEX.captures(&script) {
      return Ok(unescape_json_url(&caps[1]));
    }
  }

  Err(Error::InvalidHtml("player config url not found"))
}

fn unescape_json_url(raw: &str) -> String {
  raw.replace("\\/", "/").replace("\\u0026", "&")
}

#[derive(serde_query::Deserialize)]
struct PlayerConfig {
  #[query(".request.files.progressive")]
  progressive: Vec<ProgressiveStream>,
}

#[derive(Debug, Deserialize)]
struct ProgressiveStream {
  url: String,
  #[serde(default)]
  width: u32,
  #[serde(default)]
  height: u32,
}

// highest resolution wins; equal resolutions fall back to the widest
// frame.
fn best_progressive(
  streams: Vec<ProgressiveStream>,
) -> Result<ProgressiveStream> {
  streams
    .into_iter()
    .max_by_key(|stream| (stream.height, stream.width))
    .ok_or(Error::NoProgressiveStream)
}

#[cfg(test)]
mod test {
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  use super::*;

  fn stream(url: &str, width: u32, height: u32) -> ProgressiveStream {
    ProgressiveStream {
      url: url.to_string(),
      width,
      height,
    }
  }

  #[test]
  fn detects_hosting_pages_by_host() {
    let page: Url = "https://vimeo.com/76979871".parse().unwrap();
    let player: Url =
      "https://player.vimeo.com/video/76979871".parse().unwrap();
    let other: Url = "https://example.com/clip.mp4".parse().unwrap();

    assert!(is_player_page(&page));
    assert!(is_player_page(&player));
    assert!(!is_player_page(&other));
  }

  #[test]
  fn picks_the_widest_stream() {
    let streams = vec![
      stream("https://cdn.example.com/640.mp4", 640, 0),
      stream("https://cdn.example.com/1280.mp4", 1280, 0),
      stream("https://cdn.example.com/480.mp4", 480, 0),
    ];

    let best = best_progressive(streams).unwrap();
    assert_eq!(best.url, "https://cdn.example.com/1280.mp4");
  }

  #[test]
  fn resolution_beats_width() {
    let streams = vec![
      stream("https://cdn.example.com/wide-sd.mp4", 1280, 540),
      stream("https://cdn.example.com/hd.mp4", 1080, 720),
    ];

    let best = best_progressive(streams).unwrap();
    assert_eq!(best.url, "https://cdn.example.com/hd.mp4");
  }

  #[test]
  fn empty_stream_list_is_an_error() {
    let result = best_progressive(Vec::new());
    assert!(matches!(result, Err(Error::NoProgressiveStream)));
  }

  #[test]
  fn reads_the_config_url_from_embed_markup() {
    let html = r#"<html><body>
      <div class="player" data-config-url="https://player.vimeo.com/video/1/config?token=abc"></div>
    </body></html>"#;

    let url = find_config_url(html).unwrap();
    assert_eq!(url, "https://player.vimeo.com/video/1/config?token=abc");
  }

  #[test]
  fn falls_back_to_inline_script_state() {
    let html = r#"<html><head><script>
      window.vimeo = {"config_url":"https:\/\/player.vimeo.com\/video\/2\/config?a=1&b=2"};
    </script></head><body></body></html>"#;

    let url = find_config_url(html).unwrap();
    assert_eq!(url, "https://player.vimeo.com/video/2/config?a=1&b=2");
  }

  #[test]
  fn missing_config_reference_is_an_error() {
    let result = find_config_url("<html><body>nothing here</body></html>");
    assert!(matches!(result, Err(Error::InvalidHtml(_))));
  }

  #[test]
  fn player_config_deserializes_the_nested_stream_list() {
    let config: PlayerConfig = serde_json::from_str(
      r#"{"request": {"files": {"progressive": [
        {"url": "https://cdn.example.com/720.mp4", "width": 1280, "height": 720}
      ]}}}"#,
    )
    .unwrap();

    assert_eq!(config.progressive.len(), 1);
    assert_eq!(config.progressive[0].height, 720);
  }

  #[tokio::test]
  async fn resolves_a_page_end_to_end() {
    let server = MockServer::start().await;
    let config_path = "/video/3/config";
    let page = format!(
      r#"<html><body><div data-config-url="{}{}"></div></body></html>"#,
      server.uri(),
      config_path
    );
    Mock::given(method("GET"))
      .and(path("/page"))
      .respond_with(ResponseTemplate::new(200).set_body_string(page))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path(config_path))
      .respond_with(ResponseTemplate::new(200).set_body_json(
        serde_json::json!({"request": {"files": {"progressive": [
          {"url": "https://cdn.example.com/640.mp4", "width": 640, "height": 360},
          {"url": "https://cdn.example.com/1280.mp4", "width": 1280, "height": 720}
        ]}}}),
      ))
      .mount(&server)
      .await;

    let url = resolve_progressive(
      &reqwest::Client::new(),
      &format!("{}/page", server.uri()),
    )
    .await
    .unwrap();
    assert_eq!(url, "https://cdn.example.com/1280.mp4");
  }
}
