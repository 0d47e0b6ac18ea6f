use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// `ss` comes after `ssr` so the alternation prefers the longer scheme. Matching is
/// leftmost-first, so `vless://` is consumed from its `v` before `ss://` can start inside it.
const NODE_PATTERN: &str = r#"(?i)(?:vmess|vless|trojan|ssr|ss|hysteria2|hy2)://[^\s<>"']+"#;

const SUBSCRIPTION_PATTERN: &str =
  r#"(?i)https?://(?:raw\.githubusercontent\.com/[^\s<>"']+\.(?:txt|yaml|yml)|[^\s<>"']+/(?:sub|subscribe|link)\b[^\s<>"']*)"#;

fn node_regex() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(NODE_PATTERN).expect("node pattern compiles"))
}

fn subscription_regex() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(SUBSCRIPTION_PATTERN).expect("subscription pattern compiles"))
}

/// Every node URI in `text`, in source order, duplicates kept. No validation happens here.
pub fn extract_all(text: &str) -> Vec<String> {
  node_regex()
    .find_iter(text)
    .map(|m| m.as_str().to_string())
    .collect()
}

/// True when `text` holds at least one node URI.
pub fn contains_node(text: &str) -> bool {
  node_regex().is_match(text)
}

/// Drops repeats by exact equality after trimming; first occurrence wins.
pub fn dedupe<I, S>(uris: I) -> Vec<String>
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  let mut seen = HashSet::new();
  let mut out = Vec::new();
  for uri in uris {
    let s = uri.as_ref().trim();
    if s.is_empty() || !seen.insert(s.to_string()) {
      continue;
    }
    out.push(s.to_string());
  }
  out
}

/// Subscription URLs published on a page: GitHub raw lists and `/sub`-style endpoints.
pub fn find_subscription_links(text: &str) -> Vec<String> {
  dedupe(subscription_regex().find_iter(text).map(|m| m.as_str()))
}
