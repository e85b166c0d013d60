use clap::Parser;

use fiscal_ops::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli::run(cli).await?;
    Ok(())
}
