use std::future::Future;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::providers::RootProvider;
use alloy::sol;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use url::Url;

use crate::error::PipelineError;
use crate::metadata;
use crate::types::AuctionState;

/// Upper bound for a single `eth_call`.
const RPC_TIMEOUT: Duration = Duration::from_secs(20);

sol! {
    // Nouns-style auction house. V2 packs the struct into smaller uints, which
    // still ABI-encode as full words, so the uint256 view decodes both.
    #[sol(rpc)]
    interface IAuctionHouse {
        function auction() external view returns (
            uint256 nounId,
            uint256 amount,
            uint256 startTime,
            uint256 endTime,
            address bidder,
            bool settled
        );
    }

    #[sol(rpc)]
    interface IERC721Metadata {
        function tokenURI(uint256 tokenId) external view returns (string memory);
    }
}

/// Reads the current auction snapshot.
pub trait AuctionOracle {
    fn read_auction(&self) -> impl Future<Output = Result<AuctionState, PipelineError>> + Send;
}

/// Resolves an item id to its SVG artwork.
pub trait ArtworkFetcher {
    fn read_token_artwork(
        &self,
        item_id: u64,
    ) -> impl Future<Output = Result<Vec<u8>, PipelineError>> + Send;
}

/// Bounded retry for `tokenURI` reads of freshly minted items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtworkRetry {
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure.
    pub initial_delay: Duration,
}

impl Default for ArtworkRetry {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
        }
    }
}

/// JSON-RPC client for the auction house and token contracts.
#[derive(Clone)]
pub struct ChainClient {
    provider: RootProvider,
    auction_house: Address,
    token: Address,
    retry: ArtworkRetry,
}

impl ChainClient {
    pub fn new(rpc_url: Url, auction_house: Address, token: Address, retry: ArtworkRetry) -> Self {
        Self {
            provider: RootProvider::new_http(rpc_url),
            auction_house,
            token,
            retry,
        }
    }

    /// Raw `tokenURI(item_id)` call.
    pub async fn token_uri(&self, item_id: u64) -> Result<String, String> {
        let contract = IERC721Metadata::new(self.token, self.provider.clone());
        let call = contract.tokenURI(U256::from(item_id));
        match tokio::time::timeout(RPC_TIMEOUT, call.call()).await {
            Ok(Ok(uri)) => Ok(uri),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {}s", RPC_TIMEOUT.as_secs())),
        }
    }

    /// `tokenURI` with the configured retry schedule.
    async fn token_uri_with_retry(&self, item_id: u64) -> Result<String, PipelineError> {
        retry_with_backoff(self.retry, &format!("tokenURI for item {item_id}"), |_| {
            self.token_uri(item_id)
        })
        .await
        .map_err(|e| PipelineError::artwork(item_id, e))
    }
}

/// Run `op` until it succeeds or `retry.max_attempts` calls have failed.
///
/// The delay before attempt `n + 1` is `initial_delay * 2^(n - 1)`.
pub async fn retry_with_backoff<T, F, Fut>(
    retry: ArtworkRetry,
    what: &str,
    mut op: F,
) -> Result<T, String>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let mut delay = retry.initial_delay;
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= retry.max_attempts => {
                return Err(format!("{what} failed after {attempt} attempt(s): {e}"));
            }
            Err(e) => {
                warn!(
                    "{what} failed (attempt {attempt}/{}): {e} — retrying in {}ms",
                    retry.max_attempts,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
        }
    }
}

impl AuctionOracle for ChainClient {
    async fn read_auction(&self) -> Result<AuctionState, PipelineError> {
        let contract = IAuctionHouse::new(self.auction_house, self.provider.clone());
        let call = contract.auction();
        let raw = tokio::time::timeout(RPC_TIMEOUT, call.call())
            .await
            .map_err(|_| {
                PipelineError::TransientFetch(format!(
                    "auction() timed out after {}s",
                    RPC_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| PipelineError::TransientFetch(format!("auction(): {e}")))?;

        let state = auction_from_raw(raw.nounId, raw.endTime, raw.settled)?;
        debug!(
            "auction: item={} end={} settled={}",
            state.current_item_id, state.end_time, state.settled
        );
        Ok(state)
    }
}

impl ArtworkFetcher for ChainClient {
    async fn read_token_artwork(&self, item_id: u64) -> Result<Vec<u8>, PipelineError> {
        let uri = self.token_uri_with_retry(item_id).await?;
        let svg = metadata::svg_from_token_uri(&uri)
            .map_err(|e| PipelineError::artwork(item_id, e))?;
        debug!("item {item_id}: decoded {} bytes of svg", svg.len());
        Ok(svg)
    }
}

/// Convert the raw `auction()` words into a snapshot.
pub fn auction_from_raw(
    item_id: U256,
    end_time: U256,
    settled: bool,
) -> Result<AuctionState, PipelineError> {
    let current_item_id = u64::try_from(item_id)
        .map_err(|_| PipelineError::TransientFetch(format!("item id {item_id} exceeds u64")))?;
    let end_secs = i64::try_from(end_time)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .ok_or_else(|| PipelineError::TransientFetch(format!("end time {end_time} out of range")))?;

    Ok(AuctionState {
        current_item_id,
        end_time: end_secs,
        settled,
    })
}
