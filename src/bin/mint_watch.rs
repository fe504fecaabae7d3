use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing::{debug, info, warn};

use mint_watch::chain::ChainClient;
use mint_watch::config::{AppConfig, CONFIG_PATH};
use mint_watch::engine::next_poll_delay;
use mint_watch::publisher::AnyPublisher;
use mint_watch::render::SvgRasterizer;
use mint_watch::reporter;
use mint_watch::state::RunStats;
use mint_watch::watcher::{ColdStart, Watcher};

#[derive(Parser)]
#[command(name = "mint-watch", about = "Post every newly minted auction item to X")]
struct Args {
    /// Path to the TOML config file (optional; environment variables fill the rest)
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Log posts instead of publishing them, even when credentials are present
    #[arg(long)]
    dry_run: bool,

    /// Treat this item id as already handled and replay every later item
    #[arg(long)]
    replay_after: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = AppConfig::load_with_env(&args.config)?;
    if args.replay_after.is_some() {
        config.startup.replay_after = args.replay_after;
    }
    let settings = config.validate()?;

    let chain = ChainClient::new(
        settings.rpc_url.clone(),
        settings.auction_house,
        settings.token,
        settings.artwork_retry,
    );
    let publisher = AnyPublisher::select(settings.credentials.clone(), args.dry_run)?;
    if settings.credentials.is_none() {
        warn!("Missing X credentials, falling back to mock posts");
    }
    let converter = SvgRasterizer::new(settings.render_scale, settings.load_system_fonts);
    let poll = settings.poll;

    info!(
        "Starting mint-watch ({}) — auction={} token={} long={}s short={}s",
        publisher.label(),
        settings.auction_house,
        settings.token,
        poll.long.as_secs(),
        poll.short.as_secs(),
    );

    let watcher = Watcher::new(
        chain.clone(),
        chain,
        converter,
        publisher,
        settings.caption.clone(),
    );

    // --- Baseline ---
    let cold_start = ColdStart::from(settings.replay_after);
    let (mut state, auction) = loop {
        match watcher.initialize(cold_start).await {
            Ok(baseline) => break baseline,
            Err(e) => {
                warn!("Initial auction read failed: {e} — retrying in {}s", poll.retry.as_secs());
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Shutdown signal received before startup completed");
                        return Ok(());
                    }
                    _ = tokio::time::sleep(poll.retry) => {}
                }
            }
        }
    };
    let mut stats = RunStats::new(state);

    // A replay baseline behind the oracle is worked off immediately.
    let mut delay = if state.last_known_item_id < auction.current_item_id {
        Duration::ZERO
    } else {
        next_poll_delay(&auction, Utc::now(), &poll)
    };

    // --- Polling loop ---
    info!("Entering polling loop (first poll in {}s). Press Ctrl+C to stop.", delay.as_secs());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            _ = tokio::time::sleep(delay) => {
                let tick = watcher.tick(state, &poll).await;
                for report in &tick.reports {
                    reporter::report_item(report);
                }
                if tick.poll_error.is_some() {
                    stats.record_failed_poll();
                } else {
                    stats.record_poll(&tick.reports);
                }
                state = tick.state;
                delay = tick.delay;
                debug!("Next poll in {}s (last known item: {})", delay.as_secs(), state.last_known_item_id);
            }
        }
    }

    reporter::report_exit_summary(&stats.exit_summary(state));
    Ok(())
}
