use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::{
    decode, endpoint, get_json, parse_base_url, Chain, ChainBalanceSource, ChainPriceSource,
    PriceQuote,
};
use crate::error::ProviderError;

const PROVIDER: &str = "chain.so";

/// SoChain API: Dogecoin and Litecoin balances and prices.
pub struct ChainSoClient {
    client: Client,
    base: Url,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct WireBalance {
    confirmed_balance: Decimal,
}

#[derive(Debug, Deserialize)]
struct WirePrices {
    #[serde(default)]
    prices: Vec<WirePrice>,
}

#[derive(Debug, Deserialize)]
struct WirePrice {
    price: Decimal,
    price_base: String,
}

/// Unwrap the `{status, data}` envelope every endpoint answers with.
fn unwrap_data<T: DeserializeOwned>(raw: Value) -> Result<T, ProviderError> {
    let envelope: Envelope = decode(PROVIDER, raw)?;
    if envelope.status != "success" {
        return Err(ProviderError::malformed(
            PROVIDER,
            format!("status {}: {}", envelope.status, envelope.data),
        ));
    }
    decode(PROVIDER, envelope.data)
}

pub(crate) fn parse_balance(raw: Value) -> Result<Decimal, ProviderError> {
    unwrap_data::<WireBalance>(raw).map(|b| b.confirmed_balance)
}

pub(crate) fn parse_prices(raw: Value) -> Result<Vec<PriceQuote>, ProviderError> {
    let wire: WirePrices = unwrap_data(raw)?;
    Ok(wire
        .prices
        .into_iter()
        .map(|p| PriceQuote {
            price: p.price,
            base: p.price_base,
        })
        .collect())
}

impl ChainSoClient {
    pub fn new(client: Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            base: parse_base_url(PROVIDER, base_url)?,
        })
    }
}

#[async_trait]
impl ChainBalanceSource for ChainSoClient {
    async fn confirmed_balance(
        &self,
        chain: Chain,
        address: &str,
    ) -> Result<Decimal, ProviderError> {
        let url = endpoint(&self.base, &["get_address_balance", chain.symbol(), address]);
        parse_balance(get_json(&self.client, PROVIDER, url).await?)
    }
}

#[async_trait]
impl ChainPriceSource for ChainSoClient {
    async fn prices(&self, chain: Chain) -> Result<Vec<PriceQuote>, ProviderError> {
        let url = endpoint(&self.base, &["get_price", chain.symbol()]);
        parse_prices(get_json(&self.client, PROVIDER, url).await?)
    }
}
