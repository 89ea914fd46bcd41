//! Token Data Gateway: resolves a symbol or contract address into a
//! [`TokenSnapshot`] using a market-data provider, a security-scan provider
//! and, optionally, a socials provider.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::utils::requests::REQUEST_TIMEOUT;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("no trading pairs found for {0}")]
    NotFound(String),
    #[error("chain {0} is not supported")]
    UnsupportedChain(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportedChain {
    /// Chain id as reported by DexScreener
    pub dexscreener_id: &'static str,
    /// Numeric chain id used by GoPlus
    pub goplus_id: u64,
    /// Chain slug used by Dextools
    pub dextools_id: &'static str,
}

pub const SUPPORTED_CHAINS: &[SupportedChain] = &[
    SupportedChain {
        dexscreener_id: "ethereum",
        goplus_id: 1,
        dextools_id: "ether",
    },
    SupportedChain {
        dexscreener_id: "bsc",
        goplus_id: 56,
        dextools_id: "bsc",
    },
    SupportedChain {
        dexscreener_id: "polygon",
        goplus_id: 137,
        dextools_id: "polygon",
    },
    SupportedChain {
        dexscreener_id: "arbitrum",
        goplus_id: 42161,
        dextools_id: "arbitrum",
    },
    SupportedChain {
        dexscreener_id: "base",
        goplus_id: 8453,
        dextools_id: "base",
    },
    SupportedChain {
        dexscreener_id: "avalanche",
        goplus_id: 43114,
        dextools_id: "avalanche",
    },
    SupportedChain {
        dexscreener_id: "optimism",
        goplus_id: 10,
        dextools_id: "optimism",
    },
];

pub fn resolve_chain(dexscreener_id: &str) -> Option<&'static SupportedChain> {
    SUPPORTED_CHAINS
        .iter()
        .find(|chain| chain.dexscreener_id == dexscreener_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxnCount {
    pub buys: u64,
    pub sells: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transactions {
    pub m5: Option<TxnCount>,
    pub h1: Option<TxnCount>,
    pub h6: Option<TxnCount>,
    pub h24: Option<TxnCount>,
}

/// Percentages, as reported upstream (`-3.5` means -3.5%)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PriceChange {
    pub m5: Option<f64>,
    pub h1: Option<f64>,
    pub h6: Option<f64>,
    pub h24: Option<f64>,
}

/// The best-matching trading pair for a query
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MarketPair {
    pub name: String,
    pub symbol: String,
    pub chain_id: String,
    /// Base token contract address
    pub address: String,
    pub url: Option<String>,
    /// Kept as the upstream string so small prices aren't rounded
    pub price_usd: Option<String>,
    pub liquidity_usd: Option<f64>,
    pub volume_h24: Option<f64>,
    pub fdv: Option<f64>,
    pub market_cap: Option<f64>,
    pub transactions: Transactions,
    pub price_change: PriceChange,
    pub pair_created_at: Option<DateTime<Utc>>,
}

/// A boolean-ish security flag. Upstream sends `"1"` / `"0"` or nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flag {
    Yes,
    No,
    #[default]
    Unknown,
}

impl Flag {
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            None => Flag::Unknown,
            Some("0") => Flag::No,
            Some(_) => Flag::Yes,
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            Flag::Yes => "Yes",
            Flag::No => "No",
            Flag::Unknown => "Unknown",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Flag::Yes => "🔴",
            Flag::No => "🟢",
            Flag::Unknown => "⚪",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecurityProfile {
    pub holder_count: Option<String>,
    pub buy_tax: Option<String>,
    pub sell_tax: Option<String>,
    pub anti_whale_modifiable: Flag,
    pub can_take_back_ownership: Flag,
    pub cannot_buy: Flag,
    pub cannot_sell_all: Flag,
    pub is_anti_whale: Flag,
    pub is_blacklisted: Flag,
    pub is_whitelisted: Flag,
    pub is_honeypot: Flag,
    pub is_mintable: Flag,
    pub is_proxy: Flag,
    pub trading_cooldown: Flag,
    pub lp_locked: Flag,
    pub creator_address: Option<String>,
    pub creator_percent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Socials {
    pub telegram: Option<String>,
    pub twitter: Option<String>,
    pub website: Option<String>,
}

impl Socials {
    pub fn links(&self) -> Vec<&str> {
        [&self.telegram, &self.twitter, &self.website]
            .into_iter()
            .filter_map(|link| link.as_deref())
            .filter(|link| !link.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenSnapshot {
    pub pair: MarketPair,
    pub security: SecurityProfile,
    pub socials: Socials,
}

#[async_trait]
pub trait TokenGateway: Send + Sync + 'static {
    async fn lookup(&self, query: &str) -> Result<TokenSnapshot, LookupError>;
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync + 'static {
    /// Pairs matching the query, best match first
    async fn search_pairs(&self, query: &str) -> Result<Vec<MarketPair>, anyhow::Error>;
}

#[async_trait]
pub trait SecurityScanProvider: Send + Sync + 'static {
    /// `Ok(None)` if the provider knows nothing about the token
    async fn token_security(
        &self,
        chain_id: u64,
        address: &str,
    ) -> Result<Option<SecurityProfile>, anyhow::Error>;
}

#[async_trait]
pub trait SocialsProvider: Send + Sync + 'static {
    async fn socials(
        &self,
        chain: &SupportedChain,
        address: &str,
    ) -> Result<Socials, anyhow::Error>;
}

pub struct ProviderGateway {
    market: Arc<dyn MarketDataProvider>,
    security: Arc<dyn SecurityScanProvider>,
    socials: Option<Arc<dyn SocialsProvider>>,
    timeout: Duration,
}

impl ProviderGateway {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        security: Arc<dyn SecurityScanProvider>,
    ) -> Self {
        Self {
            market,
            security,
            socials: None,
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn with_socials(mut self, socials: Arc<dyn SocialsProvider>) -> Self {
        self.socials = Some(socials);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn bounded<T>(
        &self,
        provider: &str,
        call: impl Future<Output = Result<T, anyhow::Error>>,
    ) -> Result<T, LookupError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                log::warn!("{provider} request failed: {err:?}");
                Err(LookupError::UpstreamUnavailable(format!("{provider}: {err}")))
            }
            Err(_) => {
                log::warn!("{provider} request timed out after {:?}", self.timeout);
                Err(LookupError::UpstreamUnavailable(format!(
                    "{provider}: timed out"
                )))
            }
        }
    }
}

#[async_trait]
impl TokenGateway for ProviderGateway {
    async fn lookup(&self, query: &str) -> Result<TokenSnapshot, LookupError> {
        let query = query.trim();
        let pairs = self
            .bounded("Market data", self.market.search_pairs(query))
            .await?;
        let Some(pair) = pairs.into_iter().next() else {
            return Err(LookupError::NotFound(query.to_string()));
        };
        let chain = resolve_chain(&pair.chain_id)
            .ok_or_else(|| LookupError::UnsupportedChain(pair.chain_id.clone()))?;

        let security = self
            .bounded(
                "Security scan",
                self.security.token_security(chain.goplus_id, &pair.address),
            )
            .await?
            .unwrap_or_else(|| {
                log::debug!("No security data for {} on {}", pair.address, pair.chain_id);
                SecurityProfile::default()
            });

        let socials = if let Some(provider) = &self.socials {
            match self
                .bounded("Socials", provider.socials(chain, &pair.address))
                .await
            {
                Ok(socials) => socials,
                Err(_) => Socials::default(),
            }
        } else {
            Socials::default()
        };

        Ok(TokenSnapshot {
            pair,
            security,
            socials,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use pretty_assertions::assert_eq;

    struct FakeMarket(Vec<MarketPair>);

    #[async_trait]
    impl MarketDataProvider for FakeMarket {
        async fn search_pairs(&self, _query: &str) -> Result<Vec<MarketPair>, anyhow::Error> {
            Ok(self.0.clone())
        }
    }

    struct SlowMarket;

    #[async_trait]
    impl MarketDataProvider for SlowMarket {
        async fn search_pairs(&self, _query: &str) -> Result<Vec<MarketPair>, anyhow::Error> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct CountingSecurity {
        calls: AtomicUsize,
        profile: Option<SecurityProfile>,
    }

    #[async_trait]
    impl SecurityScanProvider for CountingSecurity {
        async fn token_security(
            &self,
            _chain_id: u64,
            _address: &str,
        ) -> Result<Option<SecurityProfile>, anyhow::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.profile.clone())
        }
    }

    struct FailingSocials;

    #[async_trait]
    impl SocialsProvider for FailingSocials {
        async fn socials(
            &self,
            _chain: &SupportedChain,
            _address: &str,
        ) -> Result<Socials, anyhow::Error> {
            Err(anyhow::anyhow!("401 Unauthorized"))
        }
    }

    fn pair_on(chain_id: &str) -> MarketPair {
        MarketPair {
            name: "Pepe".to_string(),
            symbol: "PEPE".to_string(),
            chain_id: chain_id.to_string(),
            address: "0x6982508145454Ce325dDbE47a25d4ec3d2311933".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn chain_table() {
        assert_eq!(resolve_chain("ethereum").map(|c| c.goplus_id), Some(1));
        assert_eq!(resolve_chain("bsc").map(|c| c.goplus_id), Some(56));
        assert_eq!(resolve_chain("solana"), None);
    }

    #[test]
    fn flags_from_raw_values() {
        assert_eq!(Flag::from_raw(Some("1")), Flag::Yes);
        assert_eq!(Flag::from_raw(Some("0")), Flag::No);
        assert_eq!(Flag::from_raw(None), Flag::Unknown);
        assert_eq!(
            (Flag::Yes.text(), Flag::Yes.emoji()),
            ("Yes", "🔴")
        );
        assert_eq!((Flag::No.text(), Flag::No.emoji()), ("No", "🟢"));
        assert_eq!(Flag::Unknown.text(), "Unknown");
    }

    #[tokio::test]
    async fn unsupported_chain_skips_security_scan() {
        let security = Arc::new(CountingSecurity::default());
        let gateway = ProviderGateway::new(
            Arc::new(FakeMarket(vec![pair_on("solana")])),
            Arc::clone(&security) as Arc<dyn SecurityScanProvider>,
        );
        assert_eq!(
            gateway.lookup("bonk").await,
            Err(LookupError::UnsupportedChain("solana".to_string()))
        );
        assert_eq!(security.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_pairs_is_not_found() {
        let gateway = ProviderGateway::new(
            Arc::new(FakeMarket(Vec::new())),
            Arc::new(CountingSecurity::default()),
        );
        assert_eq!(
            gateway.lookup(" nothing ").await,
            Err(LookupError::NotFound("nothing".to_string()))
        );
    }

    #[tokio::test]
    async fn missing_security_entry_is_unknown_and_socials_failure_is_ignored() {
        let gateway = ProviderGateway::new(
            Arc::new(FakeMarket(vec![pair_on("ethereum"), pair_on("bsc")])),
            Arc::new(CountingSecurity::default()),
        )
        .with_socials(Arc::new(FailingSocials));
        let snapshot = gateway.lookup("pepe").await.unwrap();
        assert_eq!(snapshot.pair.chain_id, "ethereum");
        assert_eq!(snapshot.security, SecurityProfile::default());
        assert_eq!(snapshot.socials, Socials::default());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let gateway = ProviderGateway::new(
            Arc::new(SlowMarket),
            Arc::new(CountingSecurity::default()),
        )
        .with_timeout(Duration::from_secs(5));
        assert!(matches!(
            gateway.lookup("pepe").await,
            Err(LookupError::UpstreamUnavailable(_))
        ));
    }
}
