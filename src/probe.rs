use crate::codec;
use crate::error::{CodecError, NetworkError, ProbeError};
use crate::fetch::socks_proxy_url;
use crate::node::{CanonicalNode, Protocol};
use futures::stream::{self, StreamExt};
use reqwest::{Client, Proxy};
use serde::Serialize;
use std::borrow::Cow;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

pub const DEFAULT_ENDPOINTS: [&str; 6] = [
  "https://www.google.com/generate_204",
  "https://www.cloudflare.com/",
  "https://www.apple.com/",
  "https://www.microsoft.com/",
  "https://www.baidu.com/",
  "https://www.bing.com/",
];

#[derive(Debug, Clone)]
pub struct ProberConfig {
  /// Candidate endpoints; only the first `endpoints_per_node` are requested.
  pub endpoints: Vec<String>,
  pub endpoints_per_node: usize,
  /// Per-request timeout.
  pub timeout: Duration,
  /// Max probes in flight.
  pub concurrency: usize,
  /// `host:port` of a local SOCKS5 endpoint; direct when `None`.
  pub local_proxy: Option<String>,
  /// Results at or above this are dropped by `passing_configs`.
  pub max_latency_ms: u64,
}

impl Default for ProberConfig {
  fn default() -> Self {
    Self {
      endpoints: DEFAULT_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
      endpoints_per_node: 2,
      timeout: Duration::from_secs(10),
      concurrency: 8,
      local_proxy: None,
      max_latency_ms: 3000,
    }
  }
}

impl ProberConfig {
  pub fn with_endpoints(mut self, endpoints: Vec<String>) -> Self {
    self.endpoints = endpoints;
    self
  }

  pub fn with_concurrency(mut self, concurrency: usize) -> Self {
    self.concurrency = concurrency;
    self
  }

  pub fn with_local_proxy(mut self, proxy: Option<String>) -> Self {
    self.local_proxy = proxy;
    self
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }
}

/// What the caller hands in: a raw descriptor line or an already parsed node.
#[derive(Debug, Clone)]
pub enum NodeDescriptor {
  Raw(String),
  Node(CanonicalNode),
}

impl NodeDescriptor {
  /// The line written to the output file.
  pub fn config(&self) -> Cow<'_, str> {
    match self {
      NodeDescriptor::Raw(s) => Cow::Borrowed(s.as_str()),
      NodeDescriptor::Node(n) => Cow::Owned(codec::serialize(n)),
    }
  }
}

impl From<String> for NodeDescriptor {
  fn from(s: String) -> Self {
    NodeDescriptor::Raw(s)
  }
}

impl From<&str> for NodeDescriptor {
  fn from(s: &str) -> Self {
    NodeDescriptor::Raw(s.to_string())
  }
}

impl From<CanonicalNode> for NodeDescriptor {
  fn from(n: CanonicalNode) -> Self {
    NodeDescriptor::Node(n)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
  pub protocol: Protocol,
  pub server: String,
  pub port: u16,
}

/// Unknown schemes are unsupported; a known scheme that fails to parse is unreachable.
pub fn resolve_target(desc: &NodeDescriptor) -> Result<ProbeTarget, ProbeError> {
  let node = match desc {
    NodeDescriptor::Node(n) => Cow::Borrowed(n),
    NodeDescriptor::Raw(s) => match codec::parse(s) {
      Ok(n) => Cow::Owned(n),
      Err(CodecError::UnsupportedScheme(_)) | Err(CodecError::UnsupportedProtocol(_)) => {
        return Err(ProbeError::UnsupportedProtocol)
      }
      Err(e) => return Err(ProbeError::Unreachable(e.to_string())),
    },
  };
  Ok(ProbeTarget {
    protocol: node.protocol(),
    server: node.server.clone(),
    port: node.port,
  })
}

/// Outcome for one node. Borrows its descriptor from the input batch.
#[derive(Debug, Clone)]
pub struct ProbeResult<'a> {
  pub source: &'a NodeDescriptor,
  pub outcome: Result<u64, ProbeError>,
  pub target: Option<ProbeTarget>,
}

impl<'a> ProbeResult<'a> {
  pub fn latency_ms(&self) -> Option<u64> {
    self.outcome.as_ref().ok().copied()
  }

  /// Present exactly when the latency is unmeasured.
  pub fn error_reason(&self) -> Option<String> {
    self.outcome.as_ref().err().map(|e| e.to_string())
  }

  pub fn record(&self) -> ProbeRecord {
    ProbeRecord {
      config: self.source.config().into_owned(),
      latency: self.latency_ms().map(|ms| ms as i64).unwrap_or(-1),
      protocol: self.target.as_ref().map(|t| t.protocol),
      server: self.target.as_ref().map(|t| t.server.clone()),
      port: self.target.as_ref().map(|t| t.port),
      error: self.error_reason(),
    }
  }
}

/// One JSONL line of probe output. `latency` is -1 when unmeasured.
#[derive(Debug, Serialize)]
pub struct ProbeRecord {
  pub config: String,
  pub latency: i64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub protocol: Option<Protocol>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub server: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub port: Option<u16>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

pub struct Prober {
  config: ProberConfig,
}

impl Prober {
  pub fn new(config: ProberConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &ProberConfig {
    &self.config
  }

  /// Probes every descriptor with at most `concurrency` in flight. Completion order, not input order.
  pub async fn probe_batch<'a>(&self, nodes: &'a [NodeDescriptor]) -> Vec<ProbeResult<'a>> {
    stream::iter(nodes)
      .map(|desc| self.probe_node(desc))
      .buffer_unordered(self.config.concurrency.max(1))
      .collect()
      .await
  }

  pub async fn probe_node<'a>(&self, desc: &'a NodeDescriptor) -> ProbeResult<'a> {
    let target = match resolve_target(desc) {
      Ok(t) => t,
      Err(e) => {
        debug!(stage = "probe", error = %e, "not probed");
        return ProbeResult {
          source: desc,
          outcome: Err(e),
          target: None,
        };
      }
    };

    let outcome = self.measure().await;
    match &outcome {
      Ok(ms) => info!(stage = "probe", server = %target.server, port = target.port, latency_ms = *ms, "reachable"),
      Err(e) => info!(stage = "probe", server = %target.server, port = target.port, error = %e, "unreachable"),
    }
    ProbeResult {
      source: desc,
      outcome,
      target: Some(target),
    }
  }

  /// Mean latency over the endpoints that answered 200/204.
  async fn measure(&self) -> Result<u64, ProbeError> {
    let mut latencies = Vec::new();
    for endpoint in self.config.endpoints.iter().take(self.config.endpoints_per_node) {
      match self.probe_endpoint(endpoint).await {
        Ok(ms) => latencies.push(ms),
        Err(e) => debug!(stage = "probe", endpoint = %endpoint, error = %e, "endpoint failed"),
      }
    }
    if latencies.is_empty() {
      return Err(ProbeError::connection_failed());
    }
    let sum: u64 = latencies.iter().sum();
    Ok((sum as f64 / latencies.len() as f64).round() as u64)
  }

  async fn probe_endpoint(&self, endpoint: &str) -> Result<u64, NetworkError> {
    // Fresh client per request: no pooled connection carries over between endpoints.
    let mut builder = Client::builder()
      .timeout(self.config.timeout)
      .pool_max_idle_per_host(0);
    builder = match &self.config.local_proxy {
      Some(addr) => builder.proxy(
        Proxy::all(socks_proxy_url(addr))
          .map_err(|e| NetworkError::invalid_url(format!("invalid proxy address {addr}: {e}")))?,
      ),
      None => builder.no_proxy(),
    };
    let client = builder.build()?;

    let t0 = Instant::now();
    let resp = tokio::time::timeout(self.config.timeout, client.get(endpoint).send())
      .await
      .map_err(|_| NetworkError::timeout(format!("{endpoint} did not answer")))??;
    let status = resp.status().as_u16();
    if status == 200 || status == 204 {
      Ok(t0.elapsed().as_millis() as u64)
    } else {
      Err(NetworkError::http_status(status))
    }
  }
}

/// One-shot batch with default endpoints and thresholds.
pub async fn probe_batch<'a>(
  nodes: &'a [NodeDescriptor],
  concurrency: usize,
  local_proxy: Option<&str>,
) -> Vec<ProbeResult<'a>> {
  let config = ProberConfig::default()
    .with_concurrency(concurrency)
    .with_local_proxy(local_proxy.map(str::to_string));
  Prober::new(config).probe_batch(nodes).await
}

/// Ascending latency; unmeasured results last. Stable for equal latencies.
pub fn sort_by_latency(results: &mut [ProbeResult<'_>]) {
  results.sort_by_key(|r| match r.latency_ms() {
    Some(ms) => (0u8, ms),
    None => (1u8, 0),
  });
}

/// Reachable results under `max_latency_ms`, fastest first.
pub fn rank<'r, 'a>(results: &'r [ProbeResult<'a>], max_latency_ms: u64) -> Vec<&'r ProbeResult<'a>> {
  let mut kept: Vec<&ProbeResult<'a>> = results
    .iter()
    .filter(|r| r.latency_ms().is_some_and(|ms| ms < max_latency_ms))
    .collect();
  kept.sort_by_key(|r| r.latency_ms());
  kept
}

/// Descriptor lines for the output file.
pub fn passing_configs(results: &[ProbeResult<'_>], max_latency_ms: u64) -> Vec<String> {
  rank(results, max_latency_ms)
    .into_iter()
    .map(|r| r.source.config().into_owned())
    .collect()
}
