use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;

use super::{decode, get_json, parse_base_url, TokenBalanceSource};
use crate::error::ProviderError;

const PROVIDER: &str = "etherscan";

/// Etherscan API, used for the live token balance at the latest block.
pub struct EtherscanClient {
    client: Client,
    base: Url,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct WireTokenBalance {
    status: String,
    #[serde(default)]
    message: String,
    result: Value,
}

pub(crate) fn parse_token_balance(raw: Value) -> Result<i128, ProviderError> {
    let wire: WireTokenBalance = decode(PROVIDER, raw)?;
    if wire.status != "1" {
        return Err(ProviderError::malformed(
            PROVIDER,
            format!("status {} ({}): {}", wire.status, wire.message, wire.result),
        ));
    }

    let amount = match &wire.result {
        Value::String(s) => s.trim(),
        other => {
            return Err(ProviderError::malformed(
                PROVIDER,
                format!("unexpected balance: {}", other),
            ))
        }
    };
    amount
        .parse::<i128>()
        .map_err(|e| ProviderError::malformed(PROVIDER, format!("balance {:?}: {}", amount, e)))
}

impl EtherscanClient {
    pub fn new(client: Client, base_url: &str, api_key: String) -> Result<Self> {
        Ok(Self {
            client,
            base: parse_base_url(PROVIDER, base_url)?,
            api_key,
        })
    }

    fn token_balance_url(&self, contract: &str, address: &str) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair("module", "account")
            .append_pair("action", "tokenbalance")
            .append_pair("contractaddress", contract)
            .append_pair("address", address)
            .append_pair("tag", "latest")
            .append_pair("apikey", &self.api_key);
        url
    }
}

#[async_trait]
impl TokenBalanceSource for EtherscanClient {
    async fn token_balance(&self, contract: &str, address: &str) -> Result<i128, ProviderError> {
        let raw = get_json(
            &self.client,
            PROVIDER,
            self.token_balance_url(contract, address),
        )
        .await?;
        parse_token_balance(raw)
    }
}
