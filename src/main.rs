use anyhow::Result;
use sei_process_search::utils::logging;
use sei_process_search::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let config = Config::from_env();

    App::initialize(config).await?.run().await?;

    Ok(())
}
