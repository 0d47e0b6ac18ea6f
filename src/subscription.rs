use crate::b64;
use crate::codec;
use crate::extract;
use crate::fetch::{Fetcher, Transport};
use crate::node::CanonicalNode;
use std::collections::HashSet;
use tracing::{debug, info, warn};

fn looks_like_clash_yaml(raw: &str) -> bool {
  raw.lines().any(|line| {
    let t = line.trim_start();
    t.starts_with("proxies:") || t.starts_with("proxy-groups:")
  })
}

/// Same server, port and credential published twice counts once.
pub fn dedupe_nodes(nodes: Vec<CanonicalNode>) -> Vec<CanonicalNode> {
  let mut seen = HashSet::<String>::new();
  nodes
    .into_iter()
    .filter(|n| seen.insert(n.identity_key()))
    .collect()
}

/// The text node URIs should be extracted from: the base64-decoded body when that
/// decodes to something holding node URIs, otherwise the body itself.
pub fn unwrap_payload(raw: &str) -> String {
  let trimmed = raw.trim();
  if b64::looks_like_base64(trimmed) {
    if let Some(decoded) = b64::decode_to_utf8(trimmed) {
      if extract::contains_node(&decoded) {
        return decoded;
      }
    }
  }
  trimmed.to_string()
}

/// Decodes a subscription body. Entries that fail to parse are skipped.
pub fn decode_subscription_text(text: &str) -> Vec<CanonicalNode> {
  let raw = text.trim();
  if raw.is_empty() {
    return vec![];
  }

  if looks_like_clash_yaml(raw) {
    let mut out = Vec::new();
    for result in codec::parse_clash_yaml(raw) {
      match result {
        Ok(node) => out.push(node),
        Err(e) => debug!(stage = "decode", error = %e, "skipping clash proxy"),
      }
    }
    if !out.is_empty() {
      return dedupe_nodes(out);
    }
  }

  let body = unwrap_payload(raw);
  let mut out = Vec::new();
  for uri in extract::dedupe(extract::extract_all(&body)) {
    match codec::parse(&uri) {
      Ok(node) => out.push(node),
      Err(e) => debug!(stage = "decode", error = %e, uri = %uri, "skipping entry"),
    }
  }
  out
}

/// Fetches one subscription and decodes it. A fetch failure resolves to no nodes.
pub async fn resolve<T: Transport>(fetcher: &Fetcher<T>, url: &str) -> Vec<CanonicalNode> {
  let resp = match fetcher.fetch(url).await {
    Ok(r) => r,
    Err(e) => {
      warn!(stage = "fetch", url, error = %e, "subscription unavailable");
      return vec![];
    }
  };
  let nodes = decode_subscription_text(&resp.text());
  info!(stage = "decode", url, nodes = nodes.len(), "subscription resolved");
  nodes
}

/// Resolves several subscriptions one after another and merges their nodes.
pub async fn resolve_all<T, I, S>(fetcher: &Fetcher<T>, urls: I) -> Vec<CanonicalNode>
where
  T: Transport,
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  let mut all = Vec::new();
  for url in urls {
    all.extend(resolve(fetcher, url.as_ref()).await);
  }
  dedupe_nodes(all)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::NetworkError;
  use crate::fetch::{FetchOptions, FetcherConfig, HttpResponse};
  use crate::node::{NodeSettings, Protocol};
  use async_trait::async_trait;
  use bytes::Bytes;
  use std::collections::HashMap;
  use std::time::Duration;
  use url::Url;

  /// Serves fixed bodies by URL; anything else is refused.
  struct Bodies(HashMap<String, String>);

  #[async_trait]
  impl Transport for Bodies {
    async fn get(&self, url: &Url, _opts: &FetchOptions) -> Result<HttpResponse, NetworkError> {
      match self.0.get(url.as_str()) {
        Some(body) => Ok(HttpResponse {
          status: 200,
          body: Bytes::from(body.clone().into_bytes()),
          encoding_hint: None,
        }),
        None => Err(NetworkError::connection("connection refused")),
      }
    }
  }

  fn fetcher(pairs: &[(&str, String)]) -> Fetcher<Bodies> {
    let map = pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
    let config = FetcherConfig::default()
      .with_max_attempts(1)
      .with_timeout(Duration::from_secs(5));
    Fetcher::with_transport(Bodies(map), config)
  }

  #[test]
  fn base64_wrapped_single_vless() {
    let body = b64::encode_standard(b"vless://uuid@h.example:443?security=tls#n");
    let nodes = decode_subscription_text(&body);
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].server, "h.example");
    assert_eq!(nodes[0].port, 443);
    assert_eq!(nodes[0].name, "n");
    assert_eq!(nodes[0].protocol(), Protocol::Vless);
  }

  #[test]
  fn plaintext_body_with_noise_and_bad_entries() {
    let text = "# free nodes\n\
      trojan://pw@t.example:443#ok\n\
      vmess://%%%broken%%%\n\
      vless://uuid@:443#no-host\n\
      trojan://pw@t.example:443#ok\n\
      ss://YWVzLTI1Ni1nY206cHc@s.example:8388#ss\n";
    let nodes = decode_subscription_text(text);
    let servers: Vec<&str> = nodes.iter().map(|n| n.server.as_str()).collect();
    assert_eq!(servers, ["t.example", "s.example"]);
  }

  #[test]
  fn base64_lookalike_without_nodes_stays_plaintext() {
    assert_eq!(unwrap_payload("aGVsbG8gd29ybGQgaGVsbG8gd29ybGQ="), "aGVsbG8gd29ybGQgaGVsbG8gd29ybGQ=");
    assert!(decode_subscription_text("aGVsbG8gd29ybGQgaGVsbG8gd29ybGQ=").is_empty());
  }

  #[test]
  fn empty_and_unparseable_bodies_yield_nothing() {
    assert!(decode_subscription_text("").is_empty());
    assert!(decode_subscription_text("<html><body>nothing</body></html>").is_empty());
    assert!(decode_subscription_text("vmess://bm90IGpzb24=").is_empty());
  }

  #[test]
  fn clash_yaml_body() {
    let text = "proxies:\n  - {name: a, type: trojan, server: a.example, port: 443, password: pw}\n  - {name: a2, type: trojan, server: a.example, port: 443, password: pw}\n";
    let nodes = decode_subscription_text(text);
    assert_eq!(nodes.len(), 1);
    assert!(matches!(nodes[0].settings, NodeSettings::Trojan(_)));
  }

  #[tokio::test]
  async fn resolve_fetches_and_decodes() {
    let body = b64::encode_standard(b"vless://uuid@h.example:443?security=tls#n");
    let fetcher = fetcher(&[("https://sub.example/link", body)]);
    let nodes = resolve(&fetcher, "https://sub.example/link").await;
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].server, "h.example");
  }

  #[tokio::test]
  async fn fetch_failure_resolves_to_nothing() {
    let fetcher = fetcher(&[]);
    assert!(resolve(&fetcher, "https://down.example/sub").await.is_empty());
    assert!(resolve(&fetcher, "not-a-url").await.is_empty());
  }

  #[tokio::test]
  async fn resolve_all_merges_and_dedupes() {
    let a = "trojan://pw@t.example:443#one\nhysteria2://pw@h.example:443#hy".to_string();
    let b = b64::encode_standard(b"trojan://pw@t.example:443#same-node-other-name");
    let fetcher = fetcher(&[("https://a.example/sub", a), ("https://b.example/sub", b)]);
    let nodes = resolve_all(
      &fetcher,
      ["https://a.example/sub", "https://b.example/sub", "https://gone.example/sub"],
    )
    .await;
    let names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, ["one", "hy"]);
  }
}
