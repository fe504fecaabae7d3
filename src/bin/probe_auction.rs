//! probe_auction — read the auction house once and show what the watcher would do.
//!
//! Prints the decoded snapshot as JSON along with the delay the poll policy
//! picks for it right now. Useful to check RPC_URL / AUCTION_HOUSE_ADDRESS.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;

use mint_watch::chain::{AuctionOracle, ChainClient};
use mint_watch::config::{AppConfig, CONFIG_PATH};
use mint_watch::engine::next_poll_delay;

#[derive(Parser)]
#[command(name = "probe_auction", about = "Read the current auction once")]
struct Cli {
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let settings = AppConfig::load_with_env(&cli.config)?.validate()?;
    let chain = ChainClient::new(
        settings.rpc_url.clone(),
        settings.auction_house,
        settings.token,
        settings.artwork_retry,
    );

    println!("=== Probe: auction() ===");
    println!("Auction house: {}", settings.auction_house);

    let start = Instant::now();
    let auction = chain.read_auction().await?;
    println!("Latency: {:?}", start.elapsed());
    println!("{}", serde_json::to_string_pretty(&auction)?);

    let now = Utc::now();
    let remaining = auction.end_time - now;
    if remaining.num_seconds() > 0 {
        println!("Auction open, ends in {}s", remaining.num_seconds());
    } else if auction.settled {
        println!("Auction ended and settled; next auction not started yet");
    } else {
        println!("Auction ended {}s ago, awaiting settlement", -remaining.num_seconds());
    }
    println!(
        "Next poll in: {}s",
        next_poll_delay(&auction, now, &settings.poll).as_secs()
    );

    Ok(())
}
