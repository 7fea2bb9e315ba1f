//! Per-contract reads used to resolve decimals and detect NFT standards.

use alloy_primitives::{Address, FixedBytes, fixed_bytes};
use alloy_provider::DynProvider;
use alloy_sol_types::SolCall;
use tokenlist_shared::{NftStandard, Result, TokenListError};
use tracing::trace;

use crate::abi::{IERC20Metadata, IERC165};
use crate::provider::eth_call;

/// EIP-165 interface id of ERC-721.
pub const ERC721_INTERFACE_ID: FixedBytes<4> = fixed_bytes!("80ac58cd");

/// EIP-165 interface id of ERC-1155.
pub const ERC1155_INTERFACE_ID: FixedBytes<4> = fixed_bytes!("d9b67a26");

/// Interface ids probed, in order, when a token has no usable `decimals()`.
pub const NFT_INTERFACES: [(NftStandard, FixedBytes<4>); 2] = [
    (NftStandard::Erc721, ERC721_INTERFACE_ID),
    (NftStandard::Erc1155, ERC1155_INTERFACE_ID),
];

/// Direct `eth_call` reads against token contracts.
#[derive(Clone)]
pub struct ContractReader {
    provider: DynProvider,
}

impl ContractReader {
    pub fn new(provider: DynProvider) -> Self {
        Self { provider }
    }

    /// Call `decimals()` on `token`. Reverts, empty return data, and values
    /// above 255 are all errors.
    pub async fn decimals(&self, token: Address) -> Result<u8> {
        let raw = eth_call(&self.provider, token, IERC20Metadata::decimalsCall {}.abi_encode())
            .await?;
        let value = IERC20Metadata::decimalsCall::abi_decode_returns(&raw)
            .map_err(|e| TokenListError::decode(format!("decimals() on {token}: {e}")))?;
        trace!(%token, %value, "decimals()");
        u8::try_from(value)
            .map_err(|_| TokenListError::decode(format!("decimals() on {token} out of range: {value}")))
    }

    /// EIP-165 `supportsInterface(id)` on `token`.
    pub async fn supports_interface(&self, token: Address, id: FixedBytes<4>) -> Result<bool> {
        let call = IERC165::supportsInterfaceCall { interfaceId: id };
        let raw = eth_call(&self.provider, token, call.abi_encode()).await?;
        IERC165::supportsInterfaceCall::abi_decode_returns(&raw)
            .map_err(|e| TokenListError::decode(format!("supportsInterface on {token}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::connect;
    use alloy_primitives::{U256, hex};
    use alloy_sol_types::SolValue;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn respond(server: &MockServer, calldata: Vec<u8>, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(body_string_contains(hex::encode(calldata)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn interface_ids_match_eip165_values() {
        assert_eq!(hex::encode(ERC721_INTERFACE_ID), "80ac58cd");
        assert_eq!(hex::encode(ERC1155_INTERFACE_ID), "d9b67a26");
    }

    #[tokio::test]
    async fn reads_decimals() {
        let server = MockServer::start().await;
        let result = hex::encode_prefixed(U256::from(6u64).abi_encode());
        respond(
            &server,
            IERC20Metadata::decimalsCall {}.abi_encode(),
            json!({"jsonrpc": "2.0", "id": 1, "result": result}),
        )
        .await;

        let reader = ContractReader::new(connect(&server.uri(), 5).unwrap());
        assert_eq!(reader.decimals(Address::repeat_byte(1)).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn empty_return_data_is_an_error() {
        let server = MockServer::start().await;
        respond(
            &server,
            IERC20Metadata::decimalsCall {}.abi_encode(),
            json!({"jsonrpc": "2.0", "id": 1, "result": "0x"}),
        )
        .await;

        let reader = ContractReader::new(connect(&server.uri(), 5).unwrap());
        assert!(reader.decimals(Address::repeat_byte(1)).await.is_err());
    }

    #[tokio::test]
    async fn detects_erc721_support() {
        let server = MockServer::start().await;
        let yes = hex::encode_prefixed(true.abi_encode());
        let no = hex::encode_prefixed(false.abi_encode());
        respond(
            &server,
            IERC165::supportsInterfaceCall { interfaceId: ERC721_INTERFACE_ID }.abi_encode(),
            json!({"jsonrpc": "2.0", "id": 1, "result": yes}),
        )
        .await;
        respond(
            &server,
            IERC165::supportsInterfaceCall { interfaceId: ERC1155_INTERFACE_ID }.abi_encode(),
            json!({"jsonrpc": "2.0", "id": 1, "result": no}),
        )
        .await;

        let reader = ContractReader::new(connect(&server.uri(), 5).unwrap());
        let token = Address::repeat_byte(7);
        assert!(reader.supports_interface(token, ERC721_INTERFACE_ID).await.unwrap());
        assert!(!reader.supports_interface(token, ERC1155_INTERFACE_ID).await.unwrap());
    }
}
