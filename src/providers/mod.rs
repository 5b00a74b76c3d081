//! Clients for the external data providers.
//!
//! Each trait wraps exactly one remote call. Calls are never retried; the
//! caller decides what a failure means.

pub mod chainso;
pub mod etherscan;
pub mod ethplorer;

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::ProviderError;
use chainso::ChainSoClient;
use etherscan::EtherscanClient;
use ethplorer::EthplorerClient;

/// Token metadata exactly as the provider returned it, plus the fields we read.
#[derive(Debug, Clone)]
pub struct TokenInfoResponse {
    pub raw: Value,
    pub price_rate: Option<Decimal>,
    pub holders_count: u64,
}

/// Holdings of one Ethereum address.
#[derive(Debug, Clone)]
pub struct AddressInfo {
    pub eth_balance: Decimal,
    pub eth_usd_rate: Option<Decimal>,
    pub tokens: Vec<HeldToken>,
}

#[derive(Debug, Clone)]
pub struct HeldToken {
    pub address: String,
    pub decimals: u32,
    pub usd_rate: Option<Decimal>,
    /// Unix seconds of the provider's last refresh of this token
    pub last_updated: Option<i64>,
}

impl AddressInfo {
    /// Find a token by contract address, ignoring case.
    pub fn find_token(&self, contract: &str) -> Option<&HeldToken> {
        self.tokens
            .iter()
            .find(|token| token.address.eq_ignore_ascii_case(contract))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chain {
    Dogecoin,
    Litecoin,
}

impl Chain {
    pub fn symbol(self) -> &'static str {
        match self {
            Chain::Dogecoin => "DOGE",
            Chain::Litecoin => "LTC",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub price: Decimal,
    pub base: String,
}

#[async_trait]
pub trait TokenInfoSource: Send + Sync {
    async fn token_info(&self, contract: &str) -> Result<TokenInfoResponse, ProviderError>;
}

#[async_trait]
pub trait AddressInfoSource: Send + Sync {
    async fn address_info(&self, address: &str) -> Result<AddressInfo, ProviderError>;
}

/// Live token balance, in the token's smallest unit.
#[async_trait]
pub trait TokenBalanceSource: Send + Sync {
    async fn token_balance(&self, contract: &str, address: &str) -> Result<i128, ProviderError>;
}

#[async_trait]
pub trait ChainBalanceSource: Send + Sync {
    async fn confirmed_balance(&self, chain: Chain, address: &str)
        -> Result<Decimal, ProviderError>;
}

#[async_trait]
pub trait ChainPriceSource: Send + Sync {
    async fn prices(&self, chain: Chain) -> Result<Vec<PriceQuote>, ProviderError>;
}

/// The full set of upstream clients used by the aggregator.
#[derive(Clone)]
pub struct Providers {
    pub token_info: Arc<dyn TokenInfoSource>,
    pub address_info: Arc<dyn AddressInfoSource>,
    pub token_balance: Arc<dyn TokenBalanceSource>,
    pub chain_balance: Arc<dyn ChainBalanceSource>,
    pub chain_price: Arc<dyn ChainPriceSource>,
}

impl Providers {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.upstream.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let ethplorer = Arc::new(EthplorerClient::new(
            client.clone(),
            &config.ethplorer.base_url,
            config.ethplorer.api_key.clone(),
        )?);
        let etherscan = Arc::new(EtherscanClient::new(
            client.clone(),
            &config.etherscan.base_url,
            config.etherscan.api_key.clone(),
        )?);
        let chainso = Arc::new(ChainSoClient::new(client, &config.chainso.base_url)?);

        Ok(Self {
            token_info: ethplorer.clone(),
            address_info: ethplorer,
            token_balance: etherscan,
            chain_balance: chainso.clone(),
            chain_price: chainso,
        })
    }
}

/// Parse a configured base URL, rejecting ones that cannot take path segments.
pub(crate) fn parse_base_url(provider: &str, base: &str) -> Result<Url> {
    let url = Url::parse(base).with_context(|| format!("Invalid {} base URL: {}", provider, base))?;
    if url.cannot_be_a_base() {
        anyhow::bail!("Invalid {} base URL: {}", provider, base);
    }
    Ok(url)
}

/// Append path segments to `base`.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// GET `url` and return its JSON body. The query string is kept out of logs
/// since it carries API keys.
pub(crate) async fn get_json(
    client: &Client,
    provider: &'static str,
    url: Url,
) -> Result<Value, ProviderError> {
    debug!("Sending request to {}: {}", provider, url.path());

    let response = client
        .get(url)
        .header("accept", "application/json")
        .send()
        .await
        .map_err(|e| ProviderError::from_reqwest(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Status {
            provider,
            status,
            body,
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| ProviderError::from_reqwest(provider, e))?;

    serde_json::from_slice(&body).map_err(|e| ProviderError::malformed(provider, e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(
    provider: &'static str,
    value: Value,
) -> Result<T, ProviderError> {
    serde_json::from_value(value).map_err(|e| ProviderError::malformed(provider, e.to_string()))
}

/// Integers that some providers send as strings.
pub(crate) fn lenient_u32<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(u32),
        Text(String),
    }

    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
