//! In-memory stand-ins for the upstream providers and the chat platform.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::config::CharityConfig;
use crate::error::{DeliveryError, ProviderError};
use crate::platform::ChatReplier;
use crate::providers::{
    AddressInfo, AddressInfoSource, Chain, ChainBalanceSource, ChainPriceSource, HeldToken,
    PriceQuote, Providers, TokenBalanceSource, TokenInfoResponse, TokenInfoSource,
};

pub const TOKEN_CONTRACT: &str = "0x93b2fff814fcaeffb01406e80b4ecd89ca6a021b";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    TokenInfo,
    AddressInfo,
    TokenBalance,
    ChainBalance,
    ChainPrice,
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Answers every provider call with fixed figures:
/// 2 ETH at $2000, 1,000,000,001,000 tokens at $0.000000005,
/// 500 DOGE at $0.08 and 3 LTC at $70.
#[derive(Default)]
pub struct FakeUpstream {
    failing: Mutex<HashSet<Call>>,
    calls: Mutex<HashMap<Call, usize>>,
    no_tokens: AtomicBool,
    unpriced: AtomicBool,
}

impl FakeUpstream {
    pub const TOKEN_LAST_UPDATED: i64 = 1_700_000_000;

    pub fn raw_token_info() -> Value {
        json!({
            "address": TOKEN_CONTRACT,
            "name": "Grumpy.finance",
            "decimals": "9",
            "holdersCount": 4321,
            "price": { "rate": 0.0000000012345, "currency": "USD" }
        })
    }

    pub fn charity_config() -> CharityConfig {
        CharityConfig {
            token_contract: TOKEN_CONTRACT.to_string(),
            eth_wallet: "0x405715ab97d667be039396adbc99b440d327febb".to_string(),
            doge_wallet: "D7FhT7L1hCeBYUou7kLyaHs75zKGUrv2c9".to_string(),
            ltc_wallet: "ltc1qcyl0n27pmgyxyvgc0c8djewtdhqecg2gej36ga".to_string(),
            excluded_token_amount: Decimal::from(1_000_000_000_000i64),
            token_balance_decimals: 9,
        }
    }

    pub fn providers(self: &Arc<Self>) -> Providers {
        Providers {
            token_info: self.clone(),
            address_info: self.clone(),
            token_balance: self.clone(),
            chain_balance: self.clone(),
            chain_price: self.clone(),
        }
    }

    pub fn fail(&self, call: Call) {
        self.failing.lock().unwrap().insert(call);
    }

    pub fn hold_no_tokens(&self) {
        self.no_tokens.store(true, Ordering::SeqCst);
    }

    pub fn unprice_token(&self) {
        self.unpriced.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self, call: Call) -> usize {
        self.calls.lock().unwrap().get(&call).copied().unwrap_or(0)
    }

    fn record(&self, call: Call) -> Result<(), ProviderError> {
        *self.calls.lock().unwrap().entry(call).or_insert(0) += 1;
        if self.failing.lock().unwrap().contains(&call) {
            return Err(ProviderError::Status {
                provider: "fake",
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: format!("{:?} unavailable", call),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TokenInfoSource for FakeUpstream {
    async fn token_info(&self, _contract: &str) -> Result<TokenInfoResponse, ProviderError> {
        self.record(Call::TokenInfo)?;
        let price_rate = if self.unpriced.load(Ordering::SeqCst) {
            None
        } else {
            Some(dec("0.0000000012345"))
        };
        Ok(TokenInfoResponse {
            raw: Self::raw_token_info(),
            price_rate,
            holders_count: 4321,
        })
    }
}

#[async_trait]
impl AddressInfoSource for FakeUpstream {
    async fn address_info(&self, _address: &str) -> Result<AddressInfo, ProviderError> {
        self.record(Call::AddressInfo)?;
        let tokens = if self.no_tokens.load(Ordering::SeqCst) {
            Vec::new()
        } else {
            vec![HeldToken {
                // Checksummed casing, as the provider reports it
                address: "0x93B2FfF814FCaEFFB01406e80B4Ecd89Ca6A021b".to_string(),
                decimals: 9,
                usd_rate: Some(dec("0.000000005")),
                last_updated: Some(Self::TOKEN_LAST_UPDATED),
            }]
        };
        Ok(AddressInfo {
            eth_balance: dec("2.0"),
            eth_usd_rate: Some(dec("2000")),
            tokens,
        })
    }
}

#[async_trait]
impl TokenBalanceSource for FakeUpstream {
    async fn token_balance(&self, _contract: &str, _address: &str) -> Result<i128, ProviderError> {
        self.record(Call::TokenBalance)?;
        Ok(1_000_000_001_000_000_000_000)
    }
}

#[async_trait]
impl ChainBalanceSource for FakeUpstream {
    async fn confirmed_balance(
        &self,
        chain: Chain,
        _address: &str,
    ) -> Result<Decimal, ProviderError> {
        self.record(Call::ChainBalance)?;
        Ok(match chain {
            Chain::Dogecoin => dec("500"),
            Chain::Litecoin => dec("3"),
        })
    }
}

#[async_trait]
impl ChainPriceSource for FakeUpstream {
    async fn prices(&self, chain: Chain) -> Result<Vec<PriceQuote>, ProviderError> {
        self.record(Call::ChainPrice)?;
        let usd = match chain {
            Chain::Dogecoin => dec("0.08"),
            Chain::Litecoin => dec("70"),
        };
        Ok(vec![
            PriceQuote {
                price: dec("0.000002"),
                base: "BTC".to_string(),
            },
            PriceQuote {
                price: usd,
                base: "USD".to_string(),
            },
        ])
    }
}

/// Records replies instead of sending them.
#[derive(Default)]
pub struct FakeReplier {
    sent: Mutex<Vec<(i64, String)>>,
    failing: AtomicBool,
}

impl FakeReplier {
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatReplier for FakeReplier {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError {
                chat_id,
                source: "chat not found".into(),
            });
        }
        Ok(())
    }
}
