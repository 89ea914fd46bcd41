use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::gateway::{
    Flag, MarketDataProvider, MarketPair, PriceChange, SecurityProfile, SecurityScanProvider,
    Socials, SocialsProvider, SupportedChain, Transactions, TxnCount,
};

use super::requests::{get_not_cached, get_with_key_cached_1h};

const DEXSCREENER_API: &str = "https://api.dexscreener.com/latest/dex";
const GOPLUS_API: &str = "https://api.gopluslabs.io/api/v1";
const DEXTOOLS_API: &str = "https://public-api.dextools.io/trial/v2";

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DexScreenerSearchResponse {
    #[serde(default)]
    pairs: Option<Vec<DexScreenerPair>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DexScreenerPair {
    chain_id: String,
    url: Option<String>,
    base_token: DexScreenerToken,
    price_usd: Option<String>,
    #[serde(default)]
    txns: Option<DexScreenerTxns>,
    #[serde(default)]
    volume: Option<HashMap<String, f64>>,
    #[serde(default)]
    price_change: Option<HashMap<String, f64>>,
    #[serde(default)]
    liquidity: Option<DexScreenerLiquidity>,
    fdv: Option<f64>,
    market_cap: Option<f64>,
    /// Unix milliseconds
    pair_created_at: Option<i64>,
}

#[derive(Deserialize, Debug)]
struct DexScreenerToken {
    address: String,
    name: String,
    symbol: String,
}

#[derive(Deserialize, Debug)]
struct DexScreenerTxns {
    m5: Option<DexScreenerTxnCount>,
    h1: Option<DexScreenerTxnCount>,
    h6: Option<DexScreenerTxnCount>,
    h24: Option<DexScreenerTxnCount>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
struct DexScreenerTxnCount {
    buys: u64,
    sells: u64,
}

#[derive(Deserialize, Debug)]
struct DexScreenerLiquidity {
    usd: Option<f64>,
}

impl From<DexScreenerPair> for MarketPair {
    fn from(pair: DexScreenerPair) -> Self {
        let count = |c: Option<DexScreenerTxnCount>| {
            c.map(|c| TxnCount {
                buys: c.buys,
                sells: c.sells,
            })
        };
        let transactions = pair
            .txns
            .map(|t| Transactions {
                m5: count(t.m5),
                h1: count(t.h1),
                h6: count(t.h6),
                h24: count(t.h24),
            })
            .unwrap_or_default();
        let price_change = pair
            .price_change
            .map(|p| PriceChange {
                m5: p.get("m5").copied(),
                h1: p.get("h1").copied(),
                h6: p.get("h6").copied(),
                h24: p.get("h24").copied(),
            })
            .unwrap_or_default();
        MarketPair {
            name: pair.base_token.name,
            symbol: pair.base_token.symbol,
            chain_id: pair.chain_id,
            address: pair.base_token.address,
            url: pair.url,
            price_usd: pair.price_usd,
            liquidity_usd: pair.liquidity.and_then(|l| l.usd),
            volume_h24: pair.volume.and_then(|v| v.get("h24").copied()),
            fdv: pair.fdv,
            market_cap: pair.market_cap,
            transactions,
            price_change,
            pair_created_at: pair
                .pair_created_at
                .and_then(DateTime::<Utc>::from_timestamp_millis),
        }
    }
}

pub struct DexScreenerClient;

#[async_trait]
impl MarketDataProvider for DexScreenerClient {
    async fn search_pairs(&self, query: &str) -> Result<Vec<MarketPair>, anyhow::Error> {
        let response: DexScreenerSearchResponse = get_not_cached(&format!(
            "{DEXSCREENER_API}/search?q={}",
            urlencoding::encode(query)
        ))
        .await?;
        Ok(response
            .pairs
            .unwrap_or_default()
            .into_iter()
            .map(MarketPair::from)
            .collect())
    }
}

#[derive(Deserialize, Debug)]
struct GoPlusResponse {
    code: i64,
    message: Option<String>,
    #[serde(default)]
    result: Option<HashMap<String, GoPlusTokenSecurity>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct GoPlusTokenSecurity {
    holder_count: Option<String>,
    buy_tax: Option<String>,
    sell_tax: Option<String>,
    anti_whale_modifiable: Option<String>,
    can_take_back_ownership: Option<String>,
    cannot_buy: Option<String>,
    cannot_sell_all: Option<String>,
    is_anti_whale: Option<String>,
    is_blacklisted: Option<String>,
    is_whitelisted: Option<String>,
    is_honeypot: Option<String>,
    is_mintable: Option<String>,
    is_proxy: Option<String>,
    trading_cooldown: Option<String>,
    creator_address: Option<String>,
    creator_percent: Option<String>,
    lp_holders: Option<Vec<GoPlusLpHolder>>,
}

#[derive(Deserialize, Debug)]
struct GoPlusLpHolder {
    #[serde(default, deserialize_with = "number_or_string")]
    is_locked: Option<String>,
}

/// GoPlus is inconsistent about quoting numbers
fn number_or_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(if b { "1" } else { "0" }.to_string()),
        _ => None,
    })
}

impl From<GoPlusTokenSecurity> for SecurityProfile {
    fn from(s: GoPlusTokenSecurity) -> Self {
        let flag = |raw: &Option<String>| Flag::from_raw(raw.as_deref());
        let lp_locked = s
            .lp_holders
            .as_ref()
            .and_then(|holders| holders.first())
            .map(|holder| flag(&holder.is_locked))
            .unwrap_or_default();
        SecurityProfile {
            anti_whale_modifiable: flag(&s.anti_whale_modifiable),
            can_take_back_ownership: flag(&s.can_take_back_ownership),
            cannot_buy: flag(&s.cannot_buy),
            cannot_sell_all: flag(&s.cannot_sell_all),
            is_anti_whale: flag(&s.is_anti_whale),
            is_blacklisted: flag(&s.is_blacklisted),
            is_whitelisted: flag(&s.is_whitelisted),
            is_honeypot: flag(&s.is_honeypot),
            is_mintable: flag(&s.is_mintable),
            is_proxy: flag(&s.is_proxy),
            trading_cooldown: flag(&s.trading_cooldown),
            lp_locked,
            holder_count: s.holder_count,
            buy_tax: s.buy_tax,
            sell_tax: s.sell_tax,
            creator_address: s.creator_address,
            creator_percent: s.creator_percent,
        }
    }
}

fn parse_goplus_response(
    response: GoPlusResponse,
    address: &str,
) -> Result<Option<SecurityProfile>, anyhow::Error> {
    if response.code != 1 {
        return Err(anyhow::anyhow!(
            "GoPlus returned code {}: {}",
            response.code,
            response.message.unwrap_or_default()
        ));
    }
    Ok(response
        .result
        .and_then(|mut result| result.remove(&address.to_lowercase()))
        .map(SecurityProfile::from))
}

pub struct GoPlusClient;

#[async_trait]
impl SecurityScanProvider for GoPlusClient {
    async fn token_security(
        &self,
        chain_id: u64,
        address: &str,
    ) -> Result<Option<SecurityProfile>, anyhow::Error> {
        let response: GoPlusResponse = get_not_cached(&format!(
            "{GOPLUS_API}/token_security/{chain_id}?contract_addresses={address}"
        ))
        .await?;
        parse_goplus_response(response, address)
    }
}

#[derive(Deserialize, Debug)]
struct DextoolsResponse {
    data: Option<DextoolsToken>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DextoolsToken {
    #[serde(default)]
    social_info: Option<HashMap<String, Option<String>>>,
}

pub struct DextoolsClient {
    api_key: String,
}

impl DextoolsClient {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }
}

#[async_trait]
impl SocialsProvider for DextoolsClient {
    async fn socials(
        &self,
        chain: &SupportedChain,
        address: &str,
    ) -> Result<Socials, anyhow::Error> {
        let response: DextoolsResponse = get_with_key_cached_1h(
            &format!("{DEXTOOLS_API}/token/{}/{address}", chain.dextools_id),
            &self.api_key,
        )
        .await?;
        let mut info = response
            .data
            .and_then(|token| token.social_info)
            .unwrap_or_default();
        let mut take = |key: &str| info.remove(key).flatten().filter(|s| !s.is_empty());
        Ok(Socials {
            telegram: take("telegram"),
            twitter: take("twitter"),
            website: take("website"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dexscreener_pair_is_normalized() {
        let response: DexScreenerSearchResponse = serde_json::from_value(serde_json::json!({
            "schemaVersion": "1.0.0",
            "pairs": [{
                "chainId": "ethereum",
                "dexId": "uniswap",
                "url": "https://dexscreener.com/ethereum/0xa43fe16908251ee70ef74718545e4fe6c5ccec9f",
                "pairAddress": "0xA43fe16908251ee70EF74718545e4FE6C5cCEc9f",
                "baseToken": {
                    "address": "0x6982508145454Ce325dDbE47a25d4ec3d2311933",
                    "name": "Pepe",
                    "symbol": "PEPE"
                },
                "quoteToken": { "address": "0xC02a", "name": "Wrapped Ether", "symbol": "WETH" },
                "priceNative": "0.000000003",
                "priceUsd": "0.00001234",
                "txns": {
                    "m5": { "buys": 3, "sells": 4 },
                    "h1": { "buys": 30, "sells": 41 },
                    "h6": { "buys": 300, "sells": 410 },
                    "h24": { "buys": 3000, "sells": 4100 }
                },
                "volume": { "h24": 1500000.5, "h6": 1.0, "h1": 1.0, "m5": 1.0 },
                "priceChange": { "m5": -0.5, "h1": 1.2, "h24": 10 },
                "liquidity": { "usd": 25000000.0, "base": 1.0, "quote": 2.0 },
                "fdv": 5100000000.0,
                "marketCap": 5100000000.0,
                "pairCreatedAt": 1681516800000i64
            }]
        }))
        .unwrap();
        let pair = MarketPair::from(response.pairs.unwrap().remove(0));
        assert_eq!(pair.symbol, "PEPE");
        assert_eq!(pair.chain_id, "ethereum");
        assert_eq!(pair.address, "0x6982508145454Ce325dDbE47a25d4ec3d2311933");
        assert_eq!(pair.price_usd.as_deref(), Some("0.00001234"));
        assert_eq!(pair.liquidity_usd, Some(25000000.0));
        assert_eq!(pair.volume_h24, Some(1500000.5));
        assert_eq!(pair.transactions.h6, Some(TxnCount { buys: 300, sells: 410 }));
        assert_eq!(pair.price_change.m5, Some(-0.5));
        assert_eq!(pair.price_change.h6, None);
        assert_eq!(
            pair.pair_created_at.map(|t| t.timestamp()),
            Some(1681516800)
        );
    }

    #[test]
    fn empty_search_has_no_pairs() {
        let response: DexScreenerSearchResponse =
            serde_json::from_value(serde_json::json!({ "schemaVersion": "1.0.0", "pairs": null }))
                .unwrap();
        assert!(response.pairs.unwrap_or_default().is_empty());
    }

    #[test]
    fn goplus_result_is_keyed_by_lowercase_address() {
        let response: GoPlusResponse = serde_json::from_value(serde_json::json!({
            "code": 1,
            "message": "OK",
            "result": {
                "0x6982508145454ce325ddbe47a25d4ec3d2311933": {
                    "buy_tax": "0",
                    "sell_tax": "0.01",
                    "holder_count": "123456",
                    "is_honeypot": "0",
                    "is_mintable": "1",
                    "creator_address": "0x4b0bfdf9e3c8a1c7a1b6a7a6b6b0d3e6e0f0c1d2",
                    "creator_percent": "0.000000",
                    "lp_holders": [{ "address": "0xdead", "is_locked": 1 }]
                }
            }
        }))
        .unwrap();
        let profile = parse_goplus_response(response, "0x6982508145454Ce325dDbE47a25d4ec3d2311933")
            .unwrap()
            .unwrap();
        assert_eq!(profile.is_honeypot, Flag::No);
        assert_eq!(profile.is_mintable, Flag::Yes);
        assert_eq!(profile.is_proxy, Flag::Unknown);
        assert_eq!(profile.lp_locked, Flag::Yes);
        assert_eq!(profile.holder_count.as_deref(), Some("123456"));
        assert_eq!(profile.sell_tax.as_deref(), Some("0.01"));
    }

    #[test]
    fn goplus_error_code_is_an_error() {
        let response: GoPlusResponse = serde_json::from_value(serde_json::json!({
            "code": 4029,
            "message": "too many requests",
            "result": null
        }))
        .unwrap();
        assert!(parse_goplus_response(response, "0xabc").is_err());
    }
}
