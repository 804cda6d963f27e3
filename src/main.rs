use anyhow::Result;
use meetdir::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
