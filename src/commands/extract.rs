use anyhow::Result;
use clap::Args as ClapArgs;
use nodesift::extract;

#[derive(ClapArgs, Debug, Clone)]
pub struct Args {
  /// Text to scan. Reads stdin when omitted.
  #[arg(long)]
  pub text: Option<String>,

  /// Print subscription links found in the text instead of node URIs.
  #[arg(long, default_value_t = false)]
  pub links: bool,

  /// Keep duplicate URIs.
  #[arg(long, default_value_t = false)]
  pub keep_duplicates: bool,
}

pub async fn run(args: Args) -> Result<()> {
  let text = super::read_text(args.text).await?;
  let found = if args.links {
    extract::find_subscription_links(&text)
  } else if args.keep_duplicates {
    extract::extract_all(&text)
  } else {
    extract::dedupe(extract::extract_all(&text))
  };
  for uri in found {
    println!("{uri}");
  }
  Ok(())
}
