pub mod convert;
pub mod extract;
pub mod probe;
pub mod resolve;
pub mod sub_parse;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::{AsyncReadExt, BufReader};
use tracing::warn;

/// `--text` wins; otherwise the whole of stdin.
pub async fn read_text(text: Option<String>) -> Result<String> {
  if let Some(t) = text {
    return Ok(t);
  }
  let mut buf = String::new();
  let mut stdin = BufReader::new(tokio::io::stdin());
  stdin
    .read_to_string(&mut buf)
    .await
    .context("read stdin")?;
  Ok(buf)
}

pub fn split_list(s: &str) -> Vec<String> {
  s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
    .map(|x| x.trim())
    .filter(|x| !x.is_empty())
    .map(|x| x.to_string())
    .collect()
}

pub fn print_jsonl<T: Serialize>(items: impl IntoIterator<Item = T>) {
  for item in items {
    match serde_json::to_string(&item) {
      Ok(line) => println!("{line}"),
      Err(e) => warn!(error = %e, "skipping unserializable record"),
    }
  }
}
