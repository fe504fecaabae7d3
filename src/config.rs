use std::path::Path;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::chain::ArtworkRetry;
use crate::engine::PollPolicy;
use crate::publisher::{CaptionTemplate, XCredentials};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Top-level application config deserialized from `config.toml`.
///
/// Every section is optional; the environment fills in endpoints and
/// credentials (see [`AppConfig::apply_env`]).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub artwork: ArtworkConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub startup: StartupConfig,
}

/// Chain endpoint and contract addresses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainConfig {
    /// HTTP JSON-RPC endpoint.
    pub rpc_url: Option<String>,
    /// Auction house contract exposing `auction()`.
    pub auction_house_address: Option<String>,
    /// ERC-721 token contract exposing `tokenURI(uint256)`.
    pub token_address: Option<String>,
}

/// Poll cadence, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    /// Used while the current auction is still open.
    #[serde(default = "default_long_interval")]
    pub long_interval_secs: u64,
    /// Used once the auction has ended and settlement is pending.
    #[serde(default = "default_short_interval")]
    pub short_interval_secs: u64,
    /// Used after a failed oracle read.
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,
}

fn default_long_interval() -> u64 {
    300
}

fn default_short_interval() -> u64 {
    30
}

fn default_retry_interval() -> u64 {
    60
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            long_interval_secs: default_long_interval(),
            short_interval_secs: default_short_interval(),
            retry_interval_secs: default_retry_interval(),
        }
    }
}

/// Retry settings for the `tokenURI` read of a freshly minted item.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtworkConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure.
    #[serde(default = "default_initial_retry_delay")]
    pub initial_retry_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_retry_delay() -> u64 {
    1_000
}

impl Default for ArtworkConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_retry_delay_ms: default_initial_retry_delay(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Output size relative to the SVG's intrinsic size.
    #[serde(default = "default_scale")]
    pub scale: f32,
    /// Load system fonts so `<text>` elements render.
    #[serde(default = "default_true")]
    pub load_system_fonts: bool,
}

fn default_scale() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            load_system_fonts: default_true(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    /// Post text; `{id}` is replaced by the item id.
    #[serde(default = "default_caption_template")]
    pub caption_template: String,
    /// OAuth 1.0a user credentials. Without all four, posts are only logged.
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

fn default_caption_template() -> String {
    "New Boun minted! #{id}".to_string()
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            caption_template: default_caption_template(),
            credentials: CredentialsConfig::default(),
        }
    }
}

/// The four X keys as written in the file. Any of them may be blank or absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub access_secret: Option<String>,
}

impl CredentialsConfig {
    /// All four keys when each is non-blank. A partial set is reported and
    /// treated as absent.
    pub fn resolve(&self) -> Option<XCredentials> {
        let field = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        match [
            field(&self.api_key),
            field(&self.api_secret),
            field(&self.access_token),
            field(&self.access_secret),
        ] {
            [Some(api_key), Some(api_secret), Some(access_token), Some(access_secret)] => {
                Some(XCredentials {
                    api_key,
                    api_secret,
                    access_token,
                    access_secret,
                })
            }
            [None, None, None, None] => None,
            _ => {
                warn!("Ignoring incomplete publisher credentials; posts will be mocked");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartupConfig {
    /// Start with this id as the last known item, replaying everything after it.
    /// Unset means items minted before startup are skipped.
    pub replay_after: Option<u64>,
}

/// Validated, typed settings the bot runs with.
#[derive(Debug, Clone)]
pub struct Settings {
    pub rpc_url: Url,
    pub auction_house: Address,
    pub token: Address,
    pub poll: PollPolicy,
    pub artwork_retry: ArtworkRetry,
    pub render_scale: f32,
    pub load_system_fonts: bool,
    pub caption: CaptionTemplate,
    pub credentials: Option<XCredentials>,
    pub replay_after: Option<u64>,
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Load config from `path` if it exists, otherwise start from defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load `path` if present, then overlay the process environment.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let mut config = Self::load_or_default(path)?;
        config.apply_env();
        Ok(config)
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay values from `lookup`. Empty values are ignored.
    ///
    /// Credentials are only taken from the environment when all four are set;
    /// a partial set is reported and ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("RPC_URL") {
            self.chain.rpc_url = Some(v);
        }
        if let Some(v) = get("CONTRACT_ADDRESS") {
            self.chain.token_address = Some(v);
        }
        if let Some(v) = get("AUCTION_HOUSE_ADDRESS") {
            self.chain.auction_house_address = Some(v);
        }

        let creds = [
            get("TWITTER_API_KEY"),
            get("TWITTER_API_SECRET"),
            get("TWITTER_ACCESS_TOKEN"),
            get("TWITTER_ACCESS_SECRET"),
        ];
        match creds {
            [Some(api_key), Some(api_secret), Some(access_token), Some(access_secret)] => {
                self.publisher.credentials = CredentialsConfig {
                    api_key: Some(api_key),
                    api_secret: Some(api_secret),
                    access_token: Some(access_token),
                    access_secret: Some(access_secret),
                };
            }
            [None, None, None, None] => {}
            _ => warn!("Ignoring partial TWITTER_* credentials in environment"),
        }
    }

    /// Check the config and convert it into typed [`Settings`].
    pub fn validate(&self) -> Result<Settings> {
        let rpc_url = self
            .chain
            .rpc_url
            .as_deref()
            .context("missing chain.rpc_url (or RPC_URL)")?;
        let rpc_url: Url = rpc_url
            .parse()
            .with_context(|| format!("invalid rpc url {rpc_url:?}"))?;

        let auction_house = parse_address(
            self.chain.auction_house_address.as_deref(),
            "chain.auction_house_address (or AUCTION_HOUSE_ADDRESS)",
        )?;
        let token = parse_address(
            self.chain.token_address.as_deref(),
            "chain.token_address (or CONTRACT_ADDRESS)",
        )?;

        let p = &self.polling;
        if p.long_interval_secs == 0 || p.short_interval_secs == 0 || p.retry_interval_secs == 0 {
            bail!("poll intervals must be positive");
        }
        if p.short_interval_secs > p.long_interval_secs {
            bail!(
                "short_interval_secs ({}) must not exceed long_interval_secs ({})",
                p.short_interval_secs,
                p.long_interval_secs
            );
        }

        if self.artwork.max_attempts == 0 {
            bail!("artwork.max_attempts must be at least 1");
        }
        if !(self.render.scale.is_finite() && self.render.scale > 0.0) {
            bail!("render.scale must be a positive number");
        }

        Ok(Settings {
            rpc_url,
            auction_house,
            token,
            poll: PollPolicy {
                long: Duration::from_secs(p.long_interval_secs),
                short: Duration::from_secs(p.short_interval_secs),
                retry: Duration::from_secs(p.retry_interval_secs),
            },
            artwork_retry: ArtworkRetry {
                max_attempts: self.artwork.max_attempts,
                initial_delay: Duration::from_millis(self.artwork.initial_retry_delay_ms),
            },
            render_scale: self.render.scale,
            load_system_fonts: self.render.load_system_fonts,
            caption: CaptionTemplate::new(self.publisher.caption_template.clone()),
            credentials: self.publisher.credentials.resolve(),
            replay_after: self.startup.replay_after,
        })
    }
}

fn parse_address(value: Option<&str>, name: &str) -> Result<Address> {
    let raw = value.with_context(|| format!("missing {name}"))?;
    raw.trim()
        .parse::<Address>()
        .map_err(|e| anyhow::anyhow!("invalid {name} {raw:?}: {e}"))
}
