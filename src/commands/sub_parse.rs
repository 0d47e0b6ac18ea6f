use anyhow::Result;
use clap::Args as ClapArgs;
use nodesift::subscription;

#[derive(ClapArgs, Debug, Clone)]
pub struct Args {
  /// Subscription body (base64, plaintext or Clash YAML). Prefer stdin for large inputs.
  #[arg(long)]
  pub text: Option<String>,
}

pub async fn run(args: Args) -> Result<()> {
  let input = super::read_text(args.text).await?;
  super::print_jsonl(subscription::decode_subscription_text(&input));
  Ok(())
}
