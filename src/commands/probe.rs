use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use nodesift::probe::{self, NodeDescriptor, Prober, ProberConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(ClapArgs, Debug, Clone)]
pub struct Args {
  /// File with one node descriptor per line.
  #[arg(long)]
  pub input: PathBuf,

  /// Where passing descriptors go, fastest first. Stdout when omitted.
  #[arg(long)]
  pub output: Option<PathBuf>,

  /// Local SOCKS5 proxy (host:port) probes are routed through.
  #[arg(long)]
  pub local_proxy: Option<String>,

  /// Max concurrent probes.
  #[arg(long, default_value_t = 8)]
  pub concurrency: usize,

  /// Per-request timeout (ms).
  #[arg(long, default_value_t = 10_000)]
  pub timeout_ms: u64,

  /// Keep nodes strictly faster than this (ms).
  #[arg(long, default_value_t = 3_000)]
  pub max_latency_ms: u64,

  /// Override the endpoint list (comma/space/semicolon separated).
  #[arg(long)]
  pub endpoints: Option<String>,

  /// Print every result as JSONL on stdout.
  #[arg(long, default_value_t = false)]
  pub json: bool,
}

pub async fn run(args: Args) -> Result<()> {
  let text = tokio::fs::read_to_string(&args.input)
    .await
    .with_context(|| format!("read {}", args.input.display()))?;
  let nodes: Vec<NodeDescriptor> = text
    .lines()
    .map(str::trim)
    .filter(|l| !l.is_empty() && !l.starts_with('#'))
    .map(NodeDescriptor::from)
    .collect();

  let mut config = ProberConfig::default()
    .with_concurrency(args.concurrency)
    .with_timeout(Duration::from_millis(args.timeout_ms))
    .with_local_proxy(args.local_proxy);
  config.max_latency_ms = args.max_latency_ms;
  if let Some(list) = args.endpoints.as_deref() {
    config = config.with_endpoints(super::split_list(list));
  }
  let prober = Prober::new(config);

  let mut results = prober.probe_batch(&nodes).await;
  probe::sort_by_latency(&mut results);
  let passing = probe::passing_configs(&results, prober.config().max_latency_ms);
  info!(stage = "probe", probed = results.len(), passing = passing.len(), "done");

  if args.json {
    super::print_jsonl(results.iter().map(|r| r.record()));
  }
  match &args.output {
    Some(path) => {
      let mut body = passing.join("\n");
      if !body.is_empty() {
        body.push('\n');
      }
      tokio::fs::write(path, body)
        .await
        .with_context(|| format!("write {}", path.display()))?;
    }
    None if !args.json => {
      for line in &passing {
        println!("{line}");
      }
    }
    None => {}
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("nodesift-{}-{name}", std::process::id()))
  }

  fn args(input: PathBuf, output: PathBuf) -> Args {
    Args {
      input,
      output: Some(output),
      local_proxy: None,
      concurrency: 2,
      timeout_ms: 1_000,
      max_latency_ms: 3_000,
      endpoints: None,
      json: false,
    }
  }

  #[tokio::test]
  async fn blank_input_truncates_stale_output() {
    let input = scratch("blank.in");
    let output = scratch("blank.out");
    tokio::fs::write(&input, "\n   \n\n").await.unwrap();
    tokio::fs::write(&output, "trojan://pw@stale.example:443\n").await.unwrap();

    run(args(input.clone(), output.clone())).await.unwrap();
    assert_eq!(tokio::fs::read_to_string(&output).await.unwrap(), "");

    let _ = tokio::fs::remove_file(&input).await;
    let _ = tokio::fs::remove_file(&output).await;
  }

  #[tokio::test]
  async fn unsupported_only_input_writes_empty_output() {
    let input = scratch("tuic.in");
    let output = scratch("tuic.out");
    tokio::fs::write(&input, "tuic://u:p@h.example:443\n# comment\n").await.unwrap();
    tokio::fs::write(&output, "old\n").await.unwrap();

    run(args(input.clone(), output.clone())).await.unwrap();
    assert_eq!(tokio::fs::read_to_string(&output).await.unwrap(), "");

    let _ = tokio::fs::remove_file(&input).await;
    let _ = tokio::fs::remove_file(&output).await;
  }
}
