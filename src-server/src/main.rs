use clap::Parser;
use dotenv::dotenv;
use scrub_server_lib::{ServerConfig, init_logging, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before clap reads the SCRUB_* fallbacks
    dotenv().ok();

    let config = ServerConfig::parse();
    init_logging(&config.log_level);

    run(config).await
}
