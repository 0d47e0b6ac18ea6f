use crate::error::{NetworkError, NetworkErrorKind};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Proxy};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

pub fn default_user_agent() -> &'static str {
  "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
}

/// `host:port` becomes `socks5h://host:port` so the proxy resolves names; full URLs pass through.
pub fn socks_proxy_url(addr: &str) -> String {
  let a = addr.trim();
  if a.contains("://") {
    a.to_string()
  } else {
    format!("socks5h://{a}")
  }
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
  /// Per-attempt timeout.
  pub timeout: Duration,
  /// Total attempts including the first one.
  pub max_attempts: u32,
  /// Delay before the second attempt; doubles per attempt up to `backoff_max`.
  pub backoff_base: Duration,
  pub backoff_max: Duration,
  /// Random extra delay in `[0, jitter)`.
  pub jitter: Duration,
  pub user_agent: String,
  pub headers: Vec<(String, String)>,
  pub proxy: Option<String>,
}

impl Default for FetcherConfig {
  fn default() -> Self {
    Self {
      timeout: Duration::from_secs(30),
      max_attempts: 3,
      backoff_base: Duration::from_secs(1),
      backoff_max: Duration::from_secs(8),
      jitter: Duration::from_millis(250),
      user_agent: default_user_agent().to_string(),
      headers: Vec::new(),
      proxy: None,
    }
  }
}

impl FetcherConfig {
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn with_max_attempts(mut self, attempts: u32) -> Self {
    self.max_attempts = attempts;
    self
  }

  pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
    self.proxy = proxy;
    self
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  /// Options every plain `fetch` uses.
  pub fn options(&self) -> FetchOptions {
    FetchOptions {
      headers: self.headers.clone(),
      timeout: self.timeout,
      proxy: self.proxy.clone(),
    }
  }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
  pub headers: Vec<(String, String)>,
  pub timeout: Duration,
  pub proxy: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
  pub status: u16,
  pub body: Bytes,
  /// `charset` from `Content-Type`, if the server declared one.
  pub encoding_hint: Option<String>,
}

impl HttpResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Body decoded with the declared charset; UTF-8 when absent or unknown.
  pub fn text(&self) -> String {
    let encoding = self
      .encoding_hint
      .as_deref()
      .and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes()))
      .unwrap_or(encoding_rs::UTF_8);
    let (text, _, _) = encoding.decode(&self.body);
    text.into_owned()
  }
}

pub fn charset_from_content_type(content_type: &str) -> Option<String> {
  content_type.split(';').skip(1).find_map(|param| {
    let (k, v) = param.split_once('=')?;
    if !k.trim().eq_ignore_ascii_case("charset") {
      return None;
    }
    let v = v.trim().trim_matches('"').trim();
    if v.is_empty() {
      None
    } else {
      Some(v.to_ascii_lowercase())
    }
  })
}

/// One HTTP GET. Implementations map their own failures onto `NetworkError`.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn get(&self, url: &Url, opts: &FetchOptions) -> Result<HttpResponse, NetworkError>;
}

pub struct ReqwestTransport {
  client: Client,
  user_agent: String,
}

impl ReqwestTransport {
  pub fn new(user_agent: &str) -> Result<Self, NetworkError> {
    Ok(Self {
      client: build_client(None, user_agent)?,
      user_agent: user_agent.to_string(),
    })
  }
}

fn build_client(proxy_url: Option<&str>, ua: &str) -> Result<Client, NetworkError> {
  let mut builder = Client::builder()
    .user_agent(ua)
    .redirect(reqwest::redirect::Policy::limited(10));
  if let Some(p) = proxy_url {
    let proxy = Proxy::all(socks_proxy_url(p))
      .map_err(|e| NetworkError::invalid_url(format!("invalid proxy url {p}: {e}")))?;
    builder = builder.proxy(proxy);
  }
  builder
    .build()
    .map_err(|e| NetworkError::connection(format!("client build failed: {e}")))
}

#[async_trait]
impl Transport for ReqwestTransport {
  async fn get(&self, url: &Url, opts: &FetchOptions) -> Result<HttpResponse, NetworkError> {
    // Proxied requests get their own client; the shared one stays direct.
    let proxied;
    let client = match &opts.proxy {
      Some(p) => {
        proxied = build_client(Some(p), &self.user_agent)?;
        &proxied
      }
      None => &self.client,
    };

    let mut req = client.get(url.clone()).timeout(opts.timeout);
    for (k, v) in &opts.headers {
      req = req.header(k.as_str(), v.as_str());
    }
    let resp = req.send().await?;
    let status = resp.status().as_u16();
    let encoding_hint = resp
      .headers()
      .get(reqwest::header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .and_then(charset_from_content_type);
    let body = resp.bytes().await?;
    Ok(HttpResponse {
      status,
      body,
      encoding_hint,
    })
  }
}

/// HTTP GET with per-attempt timeout, bounded retries and exponential backoff.
pub struct Fetcher<T = ReqwestTransport> {
  transport: T,
  config: FetcherConfig,
}

impl Fetcher<ReqwestTransport> {
  pub fn new(config: FetcherConfig) -> Result<Self, NetworkError> {
    let transport = ReqwestTransport::new(&config.user_agent)?;
    Ok(Self { transport, config })
  }
}

impl<T: Transport> Fetcher<T> {
  pub fn with_transport(transport: T, config: FetcherConfig) -> Self {
    Self { transport, config }
  }

  pub async fn fetch(&self, url: &str) -> Result<HttpResponse, NetworkError> {
    let opts = self.config.options();
    self.fetch_with(url, &opts).await
  }

  pub async fn fetch_with(&self, url: &str, opts: &FetchOptions) -> Result<HttpResponse, NetworkError> {
    let url = validate_url(url)?;
    let max_attempts = self.config.max_attempts.max(1);

    let mut attempt = 0;
    loop {
      attempt += 1;
      debug!(stage = "fetch", %url, attempt, "request");
      let err = match tokio::time::timeout(opts.timeout, self.transport.get(&url, opts)).await {
        Err(_) => NetworkError::timeout(format!("no response within {} ms", opts.timeout.as_millis())),
        Ok(Err(e)) => e,
        Ok(Ok(resp)) if resp.is_success() => return Ok(resp),
        Ok(Ok(resp)) => NetworkError::http_status(resp.status),
      };

      if !err.kind.is_retryable() || attempt >= max_attempts {
        warn!(stage = "fetch", %url, attempt, error = %err, "giving up");
        return Err(err);
      }
      let delay = self.backoff(attempt);
      warn!(stage = "fetch", %url, attempt, error = %err, delay_ms = delay.as_millis() as u64, "retrying");
      sleep(delay).await;
    }
  }

  /// Delay after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`, capped, plus jitter.
  fn backoff(&self, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let backoff = self
      .config
      .backoff_base
      .saturating_mul(1u32 << exp)
      .min(self.config.backoff_max.max(self.config.backoff_base));
    backoff + rand_jitter(self.config.jitter)
  }
}

fn rand_jitter(max: Duration) -> Duration {
  let max_ms = max.as_millis() as u64;
  if max_ms == 0 {
    Duration::ZERO
  } else {
    Duration::from_millis(fastrand::u64(0..max_ms))
  }
}

fn validate_url(raw: &str) -> Result<Url, NetworkError> {
  let s = raw.trim();
  if s.is_empty() {
    return Err(NetworkError::invalid_url("empty url"));
  }
  let url = Url::parse(s).map_err(|e| NetworkError::invalid_url(format!("{s}: {e}")))?;
  if !matches!(url.scheme(), "http" | "https") || url.host_str().map_or(true, str::is_empty) {
    return Err(NetworkError::new(
      NetworkErrorKind::InvalidUrl,
      format!("{s}: not an http(s) url"),
    ));
  }
  Ok(url)
}
