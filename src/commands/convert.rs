use anyhow::Result;
use clap::Args as ClapArgs;
use nodesift::codec;
use serde_json::Value;
use tracing::warn;

#[derive(ClapArgs, Debug, Clone)]
pub struct Args {
  /// Proxy objects as JSON lines (or one JSON array). Reads stdin when omitted.
  #[arg(long)]
  pub text: Option<String>,
}

fn proxy_maps(input: &str) -> Vec<Value> {
  if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(input.trim()) {
    return items;
  }
  input
    .lines()
    .map(str::trim)
    .filter(|l| !l.is_empty())
    .filter_map(|l| match serde_json::from_str(l) {
      Ok(v) => Some(v),
      Err(e) => {
        warn!(stage = "convert", error = %e, "skipping line");
        None
      }
    })
    .collect()
}

pub async fn run(args: Args) -> Result<()> {
  let input = super::read_text(args.text).await?;
  for map in proxy_maps(&input) {
    match codec::convert(&map) {
      Ok(uri) => println!("{uri}"),
      Err(e) => warn!(stage = "convert", name = map["name"].as_str().unwrap_or_default(), error = %e, "not converted"),
    }
  }
  Ok(())
}
