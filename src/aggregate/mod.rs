//! Fetches from the upstream providers, derives the financial summaries and
//! serves them through per-topic TTL caches.

pub mod charity;

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{info, warn};

use crate::cache::{CacheRead, TtlCache};
use crate::config::CharityConfig;
use crate::error::{AggregationError, AggregationResult, ProviderError};
use crate::format::format_usd;
use crate::providers::{Chain, PriceQuote, Providers};
use charity::{CharityFigures, CharityProgress, ProgressInputs};

const USD: &str = "USD";

#[derive(Debug, Clone, PartialEq)]
pub struct TokenInfo {
    pub price_rate: Decimal,
    pub holders_count: u64,
}

/// Token info as served by `/token-info`: the provider payload, untouched,
/// with the fields the bot needs already extracted.
#[derive(Debug, Clone)]
pub struct TokenInfoSnapshot {
    pub info: TokenInfo,
    pub raw: Value,
}

pub type Read<T> = Result<CacheRead<T, AggregationError>, Arc<AggregationError>>;

/// What the Ethereum side of the charity wallet contributes.
struct EthHoldings {
    balance: Decimal,
    usd_rate: Decimal,
    token_usd_rate: Decimal,
    token_decimals: u32,
    token_balance: Decimal,
    token_last_updated: i64,
}

pub struct Aggregator {
    providers: Providers,
    charity: CharityConfig,
    token_info: TtlCache<TokenInfoSnapshot, AggregationError>,
    charity_progress: TtlCache<CharityProgress, AggregationError>,
}

impl Aggregator {
    pub fn new(providers: Providers, charity: CharityConfig, ttl: Duration) -> Self {
        Self {
            providers,
            charity,
            token_info: TtlCache::new("token-info", ttl),
            charity_progress: TtlCache::new("charity-progress", ttl),
        }
    }

    pub async fn token_info(&self) -> Read<TokenInfoSnapshot> {
        let read = self
            .token_info
            .get_or_refresh(|| self.fetch_token_info())
            .await;
        log_stale(self.token_info.topic(), &read);
        read
    }

    pub async fn charity_progress(&self) -> Read<CharityProgress> {
        let read = self
            .charity_progress
            .get_or_refresh(|| async {
                let figures = self.fetch_charity_figures().await?;
                info!(
                    "Charity progress refreshed: total {} ({} without excluded tokens)",
                    format_usd(figures.total_usd),
                    format_usd(figures.total_usd_adjusted)
                );
                Ok::<_, AggregationError>(CharityProgress::from(&figures))
            })
            .await;
        log_stale(self.charity_progress.topic(), &read);
        read
    }

    async fn fetch_token_info(&self) -> AggregationResult<TokenInfoSnapshot> {
        let response = self
            .providers
            .token_info
            .token_info(&self.charity.token_contract)
            .await?;

        let price_rate = response
            .price_rate
            .ok_or_else(|| AggregationError::MissingData("token price".to_string()))?;

        Ok(TokenInfoSnapshot {
            info: TokenInfo {
                price_rate,
                holders_count: response.holders_count,
            },
            raw: response.raw,
        })
    }

    /// Gather every input and derive the figures. The Ethereum, Dogecoin and
    /// Litecoin sides are fetched concurrently; the first failure aborts the lot.
    pub async fn fetch_charity_figures(&self) -> AggregationResult<CharityFigures> {
        let (eth, (doge_balance, doge_usd_rate), (ltc_balance, ltc_usd_rate)) = futures::try_join!(
            self.fetch_eth_holdings(),
            self.fetch_chain(Chain::Dogecoin, &self.charity.doge_wallet),
            self.fetch_chain(Chain::Litecoin, &self.charity.ltc_wallet),
        )?;

        let inputs = ProgressInputs {
            eth_balance: eth.balance,
            eth_usd_rate: eth.usd_rate,
            token_usd_rate: eth.token_usd_rate,
            token_decimals: eth.token_decimals,
            token_balance: eth.token_balance,
            token_last_updated: eth.token_last_updated,
            doge_balance,
            doge_usd_rate,
            ltc_balance,
            ltc_usd_rate,
        };

        CharityFigures::derive(&inputs, self.charity.excluded_token_amount)
    }

    async fn fetch_eth_holdings(&self) -> AggregationResult<EthHoldings> {
        let contract = &self.charity.token_contract;
        let wallet = &self.charity.eth_wallet;

        // The address-info token balance lags by days, so the live balance
        // comes from the on-chain source.
        let (address, raw_balance) = futures::try_join!(
            self.providers.address_info.address_info(wallet),
            self.providers.token_balance.token_balance(contract, wallet),
        )?;

        let token = address.find_token(contract).ok_or_else(|| {
            AggregationError::MissingData(format!("token {} not held by {}", contract, wallet))
        })?;
        let token_usd_rate = token
            .usd_rate
            .ok_or_else(|| AggregationError::MissingData("token USD price".to_string()))?;
        let token_last_updated = token
            .last_updated
            .ok_or_else(|| AggregationError::MissingData("token lastUpdated".to_string()))?;
        let usd_rate = address
            .eth_usd_rate
            .ok_or_else(|| AggregationError::MissingData("ETH USD price".to_string()))?;

        Ok(EthHoldings {
            balance: address.eth_balance,
            usd_rate,
            token_usd_rate,
            token_decimals: token.decimals,
            token_balance: token_amount(raw_balance, self.charity.token_balance_decimals)?,
            token_last_updated,
        })
    }

    async fn fetch_chain(
        &self,
        chain: Chain,
        address: &str,
    ) -> AggregationResult<(Decimal, Decimal)> {
        let (balance, quotes) = futures::try_join!(
            self.providers.chain_balance.confirmed_balance(chain, address),
            self.providers.chain_price.prices(chain),
        )?;
        Ok((balance, usd_quote(chain, &quotes)?))
    }
}

/// Convert a balance in smallest units to whole tokens.
pub fn token_amount(raw: i128, decimals: u32) -> AggregationResult<Decimal> {
    Decimal::try_from_i128_with_scale(raw, decimals).map_err(|e| {
        AggregationError::Upstream(ProviderError::malformed(
            "etherscan",
            format!("balance {} out of range: {}", raw, e),
        ))
    })
}

fn usd_quote(chain: Chain, quotes: &[PriceQuote]) -> AggregationResult<Decimal> {
    quotes
        .iter()
        .find(|quote| quote.base == USD)
        .map(|quote| quote.price)
        .ok_or_else(|| AggregationError::MissingData(format!("{} USD price", chain)))
}

fn log_stale<T>(topic: &str, read: &Read<T>) {
    if let Ok(CacheRead::Stale { error, .. }) = read {
        warn!("Serving stale {}: {}", topic, error);
    }
}
