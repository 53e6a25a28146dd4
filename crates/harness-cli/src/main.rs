#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = harness_cli::run().await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
