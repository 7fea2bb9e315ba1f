//! Paginated token reads from the T2CR through its tokens view contract.

use alloy_primitives::{Address, U256};
use alloy_provider::DynProvider;
use alloy_sol_types::SolCall;
use tokenlist_shared::{Result, TokenListError, TokenRecord};
use tracing::{debug, info, instrument};

use crate::abi::{ITokensView, Token};
use crate::provider::eth_call;

/// Registry status filter passed to the view contract.
///
/// Registered items and items with pending or challenged removal requests are
/// still on the list; absent items and pending registrations are not.
pub const T2CR_FILTER: [bool; 6] = [false, true, false, true, false, true];

/// Reads every token currently on the T2CR.
pub struct T2crTokens {
    provider: DynProvider,
    view: Address,
    registry: Address,
    page_size: u64,
}

impl T2crTokens {
    pub fn new(provider: DynProvider, view: Address, registry: Address, page_size: u64) -> Self {
        Self {
            provider,
            view,
            registry,
            page_size: page_size.max(1),
        }
    }

    /// Fetch every page and map each row into a raw [`TokenRecord`].
    ///
    /// Zero-address padding and duplicates across pages are returned as-is.
    #[instrument(skip_all, fields(registry = %self.registry, chain_id = chain_id))]
    pub async fn fetch_all(&self, chain_id: u64) -> Result<Vec<TokenRecord>> {
        let mut records = Vec::new();
        let mut cursor = 0u64;

        loop {
            debug!(cursor, "fetching token page");
            let call = ITokensView::getTokensCursorCall {
                _t2crAddress: self.registry,
                _cursor: U256::from(cursor),
                _count: U256::from(self.page_size),
                _filter: T2CR_FILTER,
            };
            let raw = eth_call(&self.provider, self.view, call.abi_encode()).await?;
            let page = ITokensView::getTokensCursorCall::abi_decode_returns(&raw)
                .map_err(|e| TokenListError::decode(format!("getTokensCursor: {e}")))?;

            records.extend(page.tokens.into_iter().map(|t| to_record(chain_id, t)));

            if !page.hasMore {
                break;
            }
            cursor += self.page_size;
        }

        info!(count = records.len(), "fetched T2CR tokens");
        Ok(records)
    }
}

fn to_record(chain_id: u64, token: Token) -> TokenRecord {
    // A decimals word that does not fit u8 is treated like a failed read.
    let decimals = u8::try_from(token.decimals).unwrap_or(0);
    TokenRecord {
        chain_id,
        address: token.addr,
        symbol: token.ticker,
        name: token.name,
        decimals: Some(decimals),
        standard: None,
        logo_uri: Some(token.symbolMultihash).filter(|s| !s.is_empty()),
        tags: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::connect;
    use alloy_primitives::{B256, hex};
    use alloy_sol_types::SolValue;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token(byte: u8, ticker: &str, decimals: u64) -> Token {
        Token {
            ID: B256::repeat_byte(byte),
            name: format!("{ticker} Token"),
            ticker: ticker.into(),
            addr: if byte == 0 { Address::ZERO } else { Address::repeat_byte(byte) },
            symbolMultihash: if byte == 0 { String::new() } else { format!("/ipfs/Qm{ticker}") },
            status: 1,
            decimals: U256::from(decimals),
        }
    }

    fn page_call(registry: Address, cursor: u64, count: u64) -> String {
        let call = ITokensView::getTokensCursorCall {
            _t2crAddress: registry,
            _cursor: U256::from(cursor),
            _count: U256::from(count),
            _filter: T2CR_FILTER,
        };
        hex::encode(call.abi_encode())
    }

    async fn mount_page(server: &MockServer, calldata: String, tokens: Vec<Token>, has_more: bool) {
        let result = hex::encode_prefixed((tokens, has_more).abi_encode_params());
        Mock::given(method("POST"))
            .and(body_string_contains(calldata))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": result
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn follows_cursor_until_no_more_pages() {
        let server = MockServer::start().await;
        let view = Address::repeat_byte(0xee);
        let registry = Address::repeat_byte(0xff);

        mount_page(&server, page_call(registry, 0, 2), vec![token(1, "AAA", 18), token(2, "BBB", 6)], true).await;
        mount_page(&server, page_call(registry, 2, 2), vec![token(3, "CCC", 0), token(0, "", 0)], false).await;

        let provider = connect(&server.uri(), 5).unwrap();
        let source = T2crTokens::new(provider, view, registry, 2);
        let records = source.fetch_all(1).await.unwrap();

        assert_eq!(records.len(), 4);
        assert_eq!(records[0].symbol, "AAA");
        assert_eq!(records[0].decimals, Some(18));
        assert_eq!(records[0].logo_uri.as_deref(), Some("/ipfs/QmAAA"));
        assert_eq!(records[2].decimals, Some(0));
        // Padding is left for deduplication to remove.
        assert_eq!(records[3].address, Address::ZERO);
        assert!(records[3].logo_uri.is_none());
    }

    #[test]
    fn oversized_decimals_become_sentinel() {
        let mut t = token(1, "BIG", 0);
        t.decimals = U256::from(1000u64);
        assert_eq!(to_record(1, t).decimals, Some(0));
    }
}
