use anyhow::Result;
use rampart::cli::start;

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    // Parse arguments and set up logging
    let action = start()?;

    // Run the gateway
    action.execute().await?;

    Ok(())
}
