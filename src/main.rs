mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
  /// Log filter used when RUST_LOG is unset.
  #[arg(long, global = true, default_value = "info")]
  log_level: String,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Scan text for node URIs (vmess/vless/trojan/ss/ssr/hysteria2) and print them one per line.
  Extract(commands::extract::Args),

  /// Decode a subscription body (base64, plaintext or Clash YAML) and output Canonical Node JSONL.
  SubParse(commands::sub_parse::Args),

  /// Fetch subscription URLs with retries and print the nodes they publish.
  Resolve(commands::resolve::Args),

  /// Convert Clash-style proxy objects (JSON) into node URIs.
  Convert(commands::convert::Args),

  /// Measure node latency through a local SOCKS5 proxy and keep the fast ones.
  Probe(commands::probe::Args),
}

fn init_tracing(level: &str) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .init();
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing(&cli.log_level);
  match cli.command {
    Commands::Extract(args) => commands::extract::run(args).await,
    Commands::SubParse(args) => commands::sub_parse::run(args).await,
    Commands::Resolve(args) => commands::resolve::run(args).await,
    Commands::Convert(args) => commands::convert::run(args).await,
    Commands::Probe(args) => commands::probe::run(args).await,
  }
}
