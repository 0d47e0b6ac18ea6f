use anyhow::{bail, Context, Result};
use clap::Args as ClapArgs;
use nodesift::codec;
use nodesift::fetch::{Fetcher, FetcherConfig};
use nodesift::subscription;
use std::time::Duration;

#[derive(ClapArgs, Debug, Clone)]
pub struct Args {
  /// Subscription URLs (comma/space/semicolon separated).
  #[arg(long)]
  pub urls: Option<String>,

  /// Read subscription URLs from stdin (one per line).
  #[arg(long, default_value_t = false)]
  pub stdin: bool,

  /// Per-attempt timeout (ms).
  #[arg(long, default_value_t = 30_000)]
  pub timeout_ms: u64,

  /// Attempts per URL, first one included.
  #[arg(long, default_value_t = 3)]
  pub attempts: u32,

  /// Local SOCKS5 proxy (host:port) for fetching.
  #[arg(long)]
  pub proxy: Option<String>,

  /// Extra request header as `Name: value`. Repeatable.
  #[arg(long = "header")]
  pub headers: Vec<String>,

  /// Print CanonicalNode JSONL instead of URIs.
  #[arg(long, default_value_t = false)]
  pub json: bool,
}

fn split_header(raw: &str) -> Result<(&str, &str)> {
  match raw.split_once(':') {
    Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value.trim())),
    _ => bail!("invalid header {raw:?} (expected `Name: value`)"),
  }
}

pub async fn run(args: Args) -> Result<()> {
  let mut urls = args.urls.as_deref().map(super::split_list).unwrap_or_default();
  if args.stdin {
    let text = super::read_text(None).await?;
    urls.extend(super::split_list(&text));
  }
  if urls.is_empty() {
    bail!("missing subscription urls (provide --urls or --stdin)");
  }

  let mut config = FetcherConfig::default()
    .with_timeout(Duration::from_millis(args.timeout_ms))
    .with_max_attempts(args.attempts)
    .with_proxy(args.proxy);
  for raw in &args.headers {
    let (name, value) = split_header(raw)?;
    config = config.with_header(name, value);
  }
  let fetcher = Fetcher::new(config).context("build http client")?;

  let nodes = subscription::resolve_all(&fetcher, &urls).await;
  tracing::info!(stage = "resolve", subscriptions = urls.len(), nodes = nodes.len(), "done");
  if args.json {
    super::print_jsonl(&nodes);
  } else {
    for n in &nodes {
      println!("{}", codec::serialize(n));
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn headers_split_on_first_colon() {
    assert_eq!(split_header("Referer: https://a.example/x").unwrap(), ("Referer", "https://a.example/x"));
    assert_eq!(split_header("X-Empty:").unwrap(), ("X-Empty", ""));
    assert!(split_header("no colon").is_err());
    assert!(split_header(": value").is_err());
  }
}
