//! Node connections through alloy providers, and their error mapping.

use std::time::Duration;

use alloy_network::EthereumWallet;
use alloy_primitives::{Address, Bytes};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport::{RpcError, TransportError};
use alloy_transport_http::Http;
use reqwest::Client;
use tokenlist_shared::{Result, TokenListError};
use tracing::trace;
use url::Url;

/// User-Agent string for RPC requests.
const USER_AGENT: &str = concat!("tokenlist/", env!("CARGO_PKG_VERSION"));

/// Read-only provider for `url`. Calls only, nothing is filled or signed.
pub fn connect(url: &str, timeout_secs: u64) -> Result<DynProvider> {
    let client = rpc_client(url, timeout_secs)?;
    Ok(ProviderBuilder::new()
        .disable_recommended_fillers()
        .connect_client(client)
        .erased())
}

/// Provider that fills nonce, gas and chain id, signs with `signer`, and
/// submits transactions through `eth_sendRawTransaction`.
pub fn connect_with_signer(
    url: &str,
    timeout_secs: u64,
    signer: PrivateKeySigner,
) -> Result<DynProvider> {
    let client = rpc_client(url, timeout_secs)?;
    Ok(ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect_client(client)
        .erased())
}

/// Parse a hex private key, with or without `0x`.
pub fn parse_signer(key: &str) -> Result<PrivateKeySigner> {
    key.trim()
        .parse::<PrivateKeySigner>()
        .map_err(|_| TokenListError::config("wallet key is not a valid hex private key"))
}

fn rpc_client(url: &str, timeout_secs: u64) -> Result<RpcClient> {
    let endpoint = Url::parse(url)
        .map_err(|e| TokenListError::config(format!("invalid provider URL {url:?}: {e}")))?;
    let http = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| TokenListError::Network(format!("failed to build HTTP client: {e}")))?;
    Ok(RpcClient::new(Http::with_client(http, endpoint), false))
}

/// `eth_call` `data` against `to` and return the raw return data.
pub(crate) async fn eth_call(provider: &DynProvider, to: Address, data: Vec<u8>) -> Result<Bytes> {
    trace!(%to, size = data.len(), "eth_call");
    let tx = TransactionRequest::default()
        .to(to)
        .input(Bytes::from(data).into());
    provider.call(tx).await.map_err(|e| rpc_error("eth_call", e))
}

/// Node error objects become [`TokenListError::Rpc`], transport failures
/// [`TokenListError::Network`], unreadable payloads [`TokenListError::Decode`].
pub(crate) fn rpc_error(method: &str, err: TransportError) -> TokenListError {
    match err {
        RpcError::ErrorResp(payload) => TokenListError::Rpc {
            code: payload.code,
            message: payload.message.to_string(),
        },
        RpcError::NullResp => TokenListError::decode(format!("{method}: response has no result")),
        RpcError::DeserError { err, .. } => {
            TokenListError::decode(format!("{method}: malformed response: {err}"))
        }
        other => TokenListError::Network(format!("{method}: {other}")),
    }
}
