use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::{
    decode, endpoint, get_json, lenient_u32, parse_base_url, AddressInfo, AddressInfoSource,
    HeldToken, TokenInfoResponse, TokenInfoSource,
};
use crate::error::ProviderError;

const PROVIDER: &str = "ethplorer";

/// Ethplorer API: token metadata and address holdings.
///
/// Token balances in address holdings lag by days; use an on-chain source for
/// live balances.
pub struct EthplorerClient {
    client: Client,
    base: Url,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct WirePrice {
    rate: Decimal,
}

#[derive(Debug, Deserialize)]
struct WireTokenInfo {
    #[serde(default, deserialize_with = "price_or_false")]
    price: Option<WirePrice>,
    #[serde(rename = "holdersCount")]
    holders_count: u64,
}

#[derive(Debug, Deserialize)]
struct WireAddressInfo {
    #[serde(rename = "ETH")]
    eth: WireEth,
    #[serde(default)]
    tokens: Vec<WireHeldToken>,
}

#[derive(Debug, Deserialize)]
struct WireEth {
    balance: Decimal,
    #[serde(default, deserialize_with = "price_or_false")]
    price: Option<WirePrice>,
}

#[derive(Debug, Deserialize)]
struct WireHeldToken {
    #[serde(rename = "tokenInfo")]
    token_info: WireHeldTokenInfo,
}

#[derive(Debug, Deserialize)]
struct WireHeldTokenInfo {
    address: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    decimals: u32,
    #[serde(default, deserialize_with = "price_or_false")]
    price: Option<WirePrice>,
    #[serde(rename = "lastUpdated", default)]
    last_updated: Option<i64>,
}

/// Ethplorer sends `"price": false` for tokens it has no quote for.
fn price_or_false<'de, D>(deserializer: D) -> std::result::Result<Option<WirePrice>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PriceField {
        Price(WirePrice),
        Flag(bool),
    }

    Ok(match Option::<PriceField>::deserialize(deserializer)? {
        Some(PriceField::Price(price)) => Some(price),
        Some(PriceField::Flag(_)) | None => None,
    })
}

pub(crate) fn parse_token_info(raw: Value) -> Result<TokenInfoResponse, ProviderError> {
    let wire: WireTokenInfo = decode(PROVIDER, raw.clone())?;
    Ok(TokenInfoResponse {
        raw,
        price_rate: wire.price.map(|p| p.rate),
        holders_count: wire.holders_count,
    })
}

pub(crate) fn parse_address_info(raw: Value) -> Result<AddressInfo, ProviderError> {
    let wire: WireAddressInfo = decode(PROVIDER, raw)?;
    Ok(AddressInfo {
        eth_balance: wire.eth.balance,
        eth_usd_rate: wire.eth.price.map(|p| p.rate),
        tokens: wire
            .tokens
            .into_iter()
            .map(|t| HeldToken {
                address: t.token_info.address,
                decimals: t.token_info.decimals,
                usd_rate: t.token_info.price.map(|p| p.rate),
                last_updated: t.token_info.last_updated,
            })
            .collect(),
    })
}

impl EthplorerClient {
    pub fn new(client: Client, base_url: &str, api_key: String) -> Result<Self> {
        Ok(Self {
            client,
            base: parse_base_url(PROVIDER, base_url)?,
            api_key,
        })
    }

    fn url(&self, method: &str, subject: &str) -> Url {
        let mut url = endpoint(&self.base, &[method, subject]);
        url.query_pairs_mut().append_pair("apiKey", &self.api_key);
        url
    }
}

#[async_trait]
impl TokenInfoSource for EthplorerClient {
    async fn token_info(&self, contract: &str) -> Result<TokenInfoResponse, ProviderError> {
        let raw = get_json(&self.client, PROVIDER, self.url("getTokenInfo", contract)).await?;
        parse_token_info(raw)
    }
}

#[async_trait]
impl AddressInfoSource for EthplorerClient {
    async fn address_info(&self, address: &str) -> Result<AddressInfo, ProviderError> {
        let raw = get_json(&self.client, PROVIDER, self.url("getAddressInfo", address)).await?;
        parse_address_info(raw)
    }
}
