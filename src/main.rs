use clap::Parser; // for cli

mod cache;
mod clock;
mod config;
mod error;
mod gate;
mod handlers;
mod metrics;
mod models;
mod rate_limit;
mod server;
mod state;
mod telemetry;
mod upstream;

use config::{Args, Config};

// this is main async function with tokio
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional, real environment wins
    dotenvy::dotenv().ok();

    // parse cli arguments, falling back to the environment
    let args = Args::parse();
    let config = Config::try_from(args)?;

    telemetry::init(config.log_format);

    server::serve(config).await
}
