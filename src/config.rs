use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default = "default_server_config")]
    pub server: ServerConfig,
    #[serde(default = "default_ethplorer_config")]
    pub ethplorer: EthplorerConfig,
    #[serde(default = "default_etherscan_config")]
    pub etherscan: EtherscanConfig,
    #[serde(default = "default_chainso_config")]
    pub chainso: ChainSoConfig,
    #[serde(default = "default_charity_config")]
    pub charity: CharityConfig,
    #[serde(default = "default_cache_config")]
    pub cache: CacheConfig,
    #[serde(default = "default_admission_config")]
    pub admission: AdmissionConfig,
    #[serde(default = "default_upstream_config")]
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Public URL Telegram should deliver updates to. Registration is skipped when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_public_key_path")]
    pub public_key_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EthplorerConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_ethplorer_base_url")]
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EtherscanConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_etherscan_base_url")]
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainSoConfig {
    #[serde(default = "default_chainso_base_url")]
    pub base_url: String,
}

/// Addresses tracked by the charity progress report.
#[derive(Debug, Deserialize, Clone)]
pub struct CharityConfig {
    #[serde(default = "default_token_contract")]
    pub token_contract: String,
    #[serde(default = "default_eth_wallet")]
    pub eth_wallet: String,
    #[serde(default = "default_doge_wallet")]
    pub doge_wallet: String,
    #[serde(default = "default_ltc_wallet")]
    pub ltc_wallet: String,
    /// Token hoard subtracted for the "without 1T" figures
    #[serde(default = "default_excluded_token_amount")]
    pub excluded_token_amount: Decimal,
    /// Scale of the raw on-chain balance (smallest unit -> whole tokens)
    #[serde(default = "default_token_balance_decimals")]
    pub token_balance_decimals: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdmissionConfig {
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
    #[serde(default = "default_seen_capacity")]
    pub seen_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_public_key_path() -> PathBuf {
    PathBuf::from("crt.pem")
}

fn default_ethplorer_base_url() -> String {
    "https://api.ethplorer.io".to_string()
}

fn default_etherscan_base_url() -> String {
    "https://api.etherscan.io/api".to_string()
}

fn default_chainso_base_url() -> String {
    "https://chain.so/api/v2".to_string()
}

fn default_token_contract() -> String {
    "0x93b2fff814fcaeffb01406e80b4ecd89ca6a021b".to_string()
}

fn default_eth_wallet() -> String {
    "0x405715ab97d667be039396adbc99b440d327febb".to_string()
}

fn default_doge_wallet() -> String {
    "D7FhT7L1hCeBYUou7kLyaHs75zKGUrv2c9".to_string()
}

fn default_ltc_wallet() -> String {
    "ltc1qcyl0n27pmgyxyvgc0c8djewtdhqecg2gej36ga".to_string()
}

fn default_excluded_token_amount() -> Decimal {
    Decimal::from(1_000_000_000_000i64)
}

fn default_token_balance_decimals() -> u32 {
    9
}

fn default_cache_ttl_secs() -> u64 {
    5 * 60
}

fn default_command() -> String {
    "/price".to_string()
}

fn default_max_age_secs() -> u64 {
    5 * 60
}

fn default_seen_capacity() -> usize {
    10_000
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_server_config() -> ServerConfig {
    ServerConfig {
        bind: default_bind(),
        port: default_port(),
        public_key_path: default_public_key_path(),
    }
}

fn default_ethplorer_config() -> EthplorerConfig {
    EthplorerConfig {
        api_key: String::new(),
        base_url: default_ethplorer_base_url(),
    }
}

fn default_etherscan_config() -> EtherscanConfig {
    EtherscanConfig {
        api_key: String::new(),
        base_url: default_etherscan_base_url(),
    }
}

fn default_chainso_config() -> ChainSoConfig {
    ChainSoConfig {
        base_url: default_chainso_base_url(),
    }
}

fn default_charity_config() -> CharityConfig {
    CharityConfig {
        token_contract: default_token_contract(),
        eth_wallet: default_eth_wallet(),
        doge_wallet: default_doge_wallet(),
        ltc_wallet: default_ltc_wallet(),
        excluded_token_amount: default_excluded_token_amount(),
        token_balance_decimals: default_token_balance_decimals(),
    }
}

fn default_cache_config() -> CacheConfig {
    CacheConfig {
        ttl_secs: default_cache_ttl_secs(),
    }
}

fn default_admission_config() -> AdmissionConfig {
    AdmissionConfig {
        command: default_command(),
        max_age_secs: default_max_age_secs(),
        seen_capacity: default_seen_capacity(),
    }
}

fn default_upstream_config() -> UpstreamConfig {
    UpstreamConfig {
        timeout_secs: default_timeout_secs(),
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl AdmissionConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::parse(&content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Secrets and the listen port may be supplied through the environment,
    /// taking precedence over the file.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Some(key) = lookup("ETHPLORER_API_KEY") {
            self.ethplorer.api_key = key;
        }
        if let Some(key) = lookup("ETHERSCAN_API_KEY") {
            self.etherscan.api_key = key;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid PORT value: {}", port))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!(
                "telegram.bot_token is empty (set it in the config file or TELEGRAM_BOT_TOKEN)"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::parse("[telegram]\nbot_token = \"abc\"\n").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert_eq!(config.admission.command, "/price");
        assert_eq!(config.admission.max_age(), Duration::from_secs(300));
        assert_eq!(
            config.charity.excluded_token_amount,
            Decimal::from(1_000_000_000_000i64)
        );
        assert_eq!(config.charity.token_balance_decimals, 9);
        assert_eq!(config.telegram.webhook_url, None);
    }

    #[test]
    fn test_explicit_sections_override_defaults() {
        let config = Config::parse(
            r#"
            [telegram]
            bot_token = "abc"
            webhook_url = "https://example.com/"

            [server]
            port = 8080

            [cache]
            ttl_secs = 60

            [charity]
            doge_wallet = "Dxyz"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.charity.doge_wallet, "Dxyz");
        assert_eq!(config.charity.ltc_wallet, default_ltc_wallet());
        assert_eq!(
            config.telegram.webhook_url.as_deref(),
            Some("https://example.com/")
        );
    }

    #[test]
    fn test_env_overrides_take_precedence() {
        let mut config = Config::parse("[telegram]\nbot_token = \"file\"\n").unwrap();
        let env: HashMap<&str, &str> = [
            ("TELEGRAM_BOT_TOKEN", "env-token"),
            ("ETHPLORER_API_KEY", "eth-key"),
            ("PORT", "4000"),
        ]
        .into_iter()
        .collect();

        config
            .apply_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.telegram.bot_token, "env-token");
        assert_eq!(config.ethplorer.api_key, "eth-key");
        assert_eq!(config.etherscan.api_key, "");
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn test_invalid_port_override_is_an_error() {
        let mut config = Config::parse("[telegram]\nbot_token = \"x\"\n").unwrap();
        let result = config.apply_env_overrides(|key| {
            (key == "PORT").then(|| "not-a-port".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_token_fails_validation() {
        let config = Config::parse("[telegram]\n").unwrap();
        assert!(config.validate().is_err());
    }
}
