//! Upstream oracle client
//!
//! `PriceSource` is the seam: `AlchemyPriceSource` talks to the real
//! provider, the test suite substitutes a deterministic stub. `OracleClient`
//! wraps any source with bounded retry and rate-limited batch fetches.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures_util::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::OracleConfig;
use crate::errors::OracleError;
use crate::models::price::{Network, PriceRecord, Provenance};

#[derive(Debug, Clone)]
pub struct PriceRequest {
    pub token: String,
    pub network: Network,
    pub timestamp: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Current price when `timestamp` is None, historical otherwise.
    /// `Ok(None)` means the provider definitively has nothing.
    async fn get_price(
        &self,
        token: &str,
        network: Network,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Option<PriceRecord>, OracleError>;

    /// Block timestamp of the earliest ERC-20 asset transfer for the
    /// contract, or None when the provider has never seen it move.
    async fn get_token_creation_date(
        &self,
        token: &str,
        network: Network,
    ) -> Result<Option<DateTime<Utc>>, OracleError>;
}

// ---------------------------------------------------------------------------
// Alchemy implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PricesByAddressResponse {
    data: Vec<TokenPriceData>,
}

#[derive(Debug, Deserialize)]
struct TokenPriceData {
    #[serde(default)]
    prices: Vec<TokenPriceEntry>,
}

#[derive(Debug, Deserialize)]
struct TokenPriceEntry {
    value: String,
}

#[derive(Debug, Deserialize)]
struct HistoricalPricesResponse {
    #[serde(default)]
    data: Vec<HistoricalPricePoint>,
}

#[derive(Debug, Deserialize)]
struct HistoricalPricePoint {
    value: String,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TokenMetadataResult {
    symbol: Option<String>,
    name: Option<String>,
    decimals: Option<i32>,
    logo: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssetTransfersResult {
    #[serde(default)]
    transfers: Vec<AssetTransfer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetTransfer {
    block_num: String,
}

#[derive(Debug, Deserialize)]
struct BlockResult {
    timestamp: String,
}

#[derive(Clone)]
pub struct AlchemyPriceSource {
    client: Client,
    api_key: String,
}

impl AlchemyPriceSource {
    pub fn new(api_key: String, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("failed to build http client");
        Self { client, api_key }
    }

    /// Per-network JSON-RPC endpoint.
    fn rpc_url(&self, network: Network) -> String {
        let subdomain = match network {
            Network::Ethereum => "eth-mainnet",
            Network::Polygon => "polygon-mainnet",
            Network::Bsc => "bnb-mainnet",
            Network::Avalanche => "avax-mainnet",
            Network::Arbitrum => "arb-mainnet",
            Network::Optimism => "opt-mainnet",
        };
        format!("https://{}.g.alchemy.com/v2/{}", subdomain, self.api_key)
    }

    /// Network identifier used by the prices API.
    fn price_network_id(network: Network) -> &'static str {
        match network {
            Network::Ethereum => "eth-mainnet",
            Network::Polygon => "polygon-mainnet",
            Network::Bsc => "bnb-mainnet",
            Network::Avalanche => "avax-mainnet",
            Network::Arbitrum => "arb-mainnet",
            Network::Optimism => "opt-mainnet",
        }
    }

    fn prices_url(&self, path: &str) -> String {
        format!(
            "https://api.g.alchemy.com/prices/v1/{}/tokens/{}",
            self.api_key, path
        )
    }

    fn map_request_error(e: reqwest::Error) -> OracleError {
        if e.is_timeout() || e.is_connect() {
            OracleError::Transient(format!("request failed: {}", e))
        } else {
            OracleError::Definitive(format!("request failed: {}", e))
        }
    }

    fn check_status(status: reqwest::StatusCode, body: &str) -> Result<(), OracleError> {
        if status.is_success() {
            return Ok(());
        }
        if status.as_u16() == 429 || status.is_server_error() {
            Err(OracleError::Transient(format!(
                "upstream status {}: {}",
                status, body
            )))
        } else {
            Err(OracleError::Definitive(format!(
                "upstream status {}: {}",
                status, body
            )))
        }
    }

    async fn fetch_current_price(
        &self,
        token: &str,
        network: Network,
    ) -> Result<Option<f64>, OracleError> {
        let body = json!({
            "addresses": [{
                "network": Self::price_network_id(network),
                "address": token,
            }]
        });

        let response = self
            .client
            .post(self.prices_url("by-address"))
            .header("accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let status = response.status();
        let text = response.text().await.map_err(Self::map_request_error)?;
        Self::check_status(status, &text)?;

        let parsed: PricesByAddressResponse = serde_json::from_str(&text)
            .map_err(|e| OracleError::Definitive(format!("malformed price response: {}", e)))?;

        let usd = parsed
            .data
            .first()
            .and_then(|d| d.prices.first())
            .and_then(|p| p.value.parse::<f64>().ok());

        Ok(usd)
    }

    async fn fetch_historical_price(
        &self,
        token: &str,
        network: Network,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<f64>, OracleError> {
        // Ask for a one-day window around the target and keep the closest
        // sample; the provider has hourly granularity at best.
        let start = timestamp - chrono::Duration::hours(12);
        let end = timestamp + chrono::Duration::hours(12);
        let body = json!({
            "network": Self::price_network_id(network),
            "address": token,
            "startTime": start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            "endTime": end.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            "interval": "1h",
        });

        let response = self
            .client
            .post(self.prices_url("historical"))
            .header("accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let status = response.status();
        let text = response.text().await.map_err(Self::map_request_error)?;
        Self::check_status(status, &text)?;

        let parsed: HistoricalPricesResponse = serde_json::from_str(&text)
            .map_err(|e| OracleError::Definitive(format!("malformed history response: {}", e)))?;

        let closest = parsed
            .data
            .iter()
            .filter_map(|p| {
                let ts = DateTime::parse_from_rfc3339(&p.timestamp).ok()?;
                let usd = p.value.parse::<f64>().ok()?;
                let distance = (ts.with_timezone(&Utc) - timestamp).num_seconds().abs();
                Some((distance, usd))
            })
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, usd)| usd);

        Ok(closest)
    }

    async fn rpc_call<T: serde::de::DeserializeOwned>(
        &self,
        network: Network,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>, OracleError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(self.rpc_url(network))
            .json(&body)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let status = response.status();
        let text = response.text().await.map_err(Self::map_request_error)?;
        Self::check_status(status, &text)?;

        let parsed: RpcResponse<T> = serde_json::from_str(&text)
            .map_err(|e| OracleError::Definitive(format!("malformed rpc response: {}", e)))?;

        Ok(parsed.result)
    }

    async fn fetch_token_metadata(
        &self,
        token: &str,
        network: Network,
    ) -> Option<TokenMetadataResult> {
        match self
            .rpc_call::<TokenMetadataResult>(network, "alchemy_getTokenMetadata", json!([token]))
            .await
        {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!("token metadata fetch failed for {}: {}", token, e);
                None
            }
        }
    }
}

fn parse_hex_u64(raw: &str) -> Option<u64> {
    u64::from_str_radix(raw.trim_start_matches("0x"), 16).ok()
}

#[async_trait]
impl PriceSource for AlchemyPriceSource {
    async fn get_price(
        &self,
        token: &str,
        network: Network,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Option<PriceRecord>, OracleError> {
        let usd = match timestamp {
            None => self.fetch_current_price(token, network).await?,
            Some(ts) => self.fetch_historical_price(token, network, ts).await?,
        };

        let usd = match usd {
            Some(value) if value > 0.0 => value,
            _ => return Ok(None),
        };

        let metadata = self.fetch_token_metadata(token, network).await;
        let now = Utc::now();

        Ok(Some(PriceRecord {
            token: token.to_lowercase(),
            network,
            timestamp: timestamp.unwrap_or(now),
            usd,
            last_updated: now,
            symbol: metadata.as_ref().and_then(|m| m.symbol.clone()),
            name: metadata.as_ref().and_then(|m| m.name.clone()),
            decimals: metadata.as_ref().and_then(|m| m.decimals),
            total_supply: None,
            logo_uri: metadata.as_ref().and_then(|m| m.logo.clone()),
            provenance: Provenance::FromApi,
            interpolation: None,
        }))
    }

    async fn get_token_creation_date(
        &self,
        token: &str,
        network: Network,
    ) -> Result<Option<DateTime<Utc>>, OracleError> {
        let params = json!([{
            "contractAddresses": [token],
            "category": ["erc20"],
            "order": "asc",
            "maxCount": "0x1",
            "fromBlock": "0x0",
        }]);

        let transfers: Option<AssetTransfersResult> = self
            .rpc_call(network, "alchemy_getAssetTransfers", params)
            .await?;

        let block_num = match transfers
            .and_then(|t| t.transfers.into_iter().next())
            .map(|t| t.block_num)
        {
            Some(num) => num,
            None => return Ok(None),
        };

        let block: Option<BlockResult> = self
            .rpc_call(
                network,
                "eth_getBlockByNumber",
                json!([block_num, false]),
            )
            .await?;

        let unix_secs = block
            .and_then(|b| parse_hex_u64(&b.timestamp))
            .ok_or_else(|| OracleError::Definitive("block has no timestamp".to_string()))?;

        Ok(Utc.timestamp_opt(unix_secs as i64, 0).single())
    }
}

// ---------------------------------------------------------------------------
// Retry / batch wrapper
// ---------------------------------------------------------------------------

pub struct OracleClient {
    source: Arc<dyn PriceSource>,
    max_retries: u32,
    retry_delay_ms: u64,
    batch_size: usize,
    rate_limit_per_second: u64,
}

impl OracleClient {
    pub fn new(source: Arc<dyn PriceSource>, config: &OracleConfig) -> Self {
        Self {
            source,
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
            batch_size: config.batch_size.max(1),
            rate_limit_per_second: config.rate_limit_per_second.max(1),
        }
    }

    pub async fn get_price(
        &self,
        token: &str,
        network: Network,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Option<PriceRecord>, OracleError> {
        self.source.get_price(token, network, timestamp).await
    }

    /// Up to `max_retries` attempts with `2^attempt * retry_delay_ms`
    /// backoff. A null answer is an answer and is not retried; only
    /// transient errors are.
    pub async fn get_price_with_retry(
        &self,
        token: &str,
        network: Network,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Option<PriceRecord>, OracleError> {
        let mut attempt: u32 = 0;
        loop {
            match self.source.get_price(token, network, timestamp).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt + 1 < self.max_retries => {
                    let delay_ms = 2u64.saturating_pow(attempt) * self.retry_delay_ms;
                    tracing::warn!(
                        token = %token,
                        network = %network,
                        attempt = attempt + 1,
                        delay_ms,
                        "oracle attempt failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn get_token_creation_date(
        &self,
        token: &str,
        network: Network,
    ) -> Result<Option<DateTime<Utc>>, OracleError> {
        self.source.get_token_creation_date(token, network).await
    }

    /// Processes requests in chunks of `batch_size` with all-settled
    /// semantics; one failure does not abort its chunk. The result is
    /// positionally aligned with the input, None for any failure. Chunks are
    /// separated by at least `1000 / rate_limit_per_second` ms.
    pub async fn batch_get_prices(&self, requests: &[PriceRequest]) -> Vec<Option<PriceRecord>> {
        let mut results = Vec::with_capacity(requests.len());
        let pause = Duration::from_millis(1000 / self.rate_limit_per_second);
        let chunk_count = requests.len().div_ceil(self.batch_size);

        for (index, chunk) in requests.chunks(self.batch_size).enumerate() {
            let futures = chunk.iter().map(|request| async {
                self.get_price_with_retry(&request.token, request.network, request.timestamp)
                    .await
                    .ok()
                    .flatten()
            });
            results.extend(join_all(futures).await);

            if index + 1 < chunk_count {
                tokio::time::sleep(pause).await;
            }
        }

        results
    }
}
