//! render_token — fetch one token's on-chain artwork and write it as PNG.
//!
//! Runs the artwork and conversion stages without publishing anything.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use mint_watch::chain::{ArtworkFetcher, ChainClient};
use mint_watch::config::{AppConfig, CONFIG_PATH};
use mint_watch::render::{ImageConverter, SvgRasterizer};

#[derive(Parser)]
#[command(name = "render_token", about = "Render a token's on-chain SVG to a PNG file")]
struct Cli {
    /// Token id to render
    item_id: u64,

    /// Output file (defaults to token_<id>.png)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Also write the decoded SVG next to the PNG
    #[arg(long)]
    save_svg: bool,

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

    let svg = chain.read_token_artwork(cli.item_id).await?;
    let png = SvgRasterizer::new(settings.render_scale, settings.load_system_fonts)
        .to_raster_image(&svg)?;

    let out = cli
        .out
        .unwrap_or_else(|| PathBuf::from(format!("token_{}.png", cli.item_id)));
    std::fs::write(&out, &png).with_context(|| format!("failed to write {}", out.display()))?;
    println!("Wrote {} ({} bytes)", out.display(), png.len());

    if cli.save_svg {
        let svg_path = out.with_extension("svg");
        std::fs::write(&svg_path, &svg)
            .with_context(|| format!("failed to write {}", svg_path.display()))?;
        println!("Wrote {} ({} bytes)", svg_path.display(), svg.len());
    }

    Ok(())
}
