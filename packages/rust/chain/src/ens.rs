//! ENS content hash updates pointing a name at the latest published list.

use alloy_primitives::{Address, B256, Bytes, keccak256};
use alloy_provider::{DynProvider, Provider};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::SolCall;
use tokenlist_shared::{Result, TokenListError, ZERO_ADDRESS};
use tracing::{info, instrument};

use crate::abi::{IContentHashResolver, IEnsRegistry};
use crate::provider::{eth_call, rpc_error};

/// EIP-1577 prefix for `ipfs-ns` content of a dag-pb CIDv1: namespace
/// varint `0xe3 0x01`, CID version 1, dag-pb codec.
const IPFS_NS_PREFIX: [u8; 4] = [0xe3, 0x01, 0x01, 0x70];

/// Compute the EIP-137 namehash of `name`.
///
/// Names are lowercased; full UTS-46 normalization is not applied.
pub fn namehash(name: &str) -> B256 {
    let normalized = name.trim().to_lowercase();
    let mut node = B256::ZERO;
    if normalized.is_empty() {
        return node;
    }
    for label in normalized.rsplit('.') {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(node.as_slice());
        buf[32..].copy_from_slice(keccak256(label.as_bytes()).as_slice());
        node = keccak256(buf);
    }
    node
}

/// Encode an IPFS CIDv0 (`Qm...`) as an EIP-1577 content hash.
pub fn ipfs_content_hash(cid: &str) -> Result<Vec<u8>> {
    let multihash = bs58::decode(cid.trim())
        .into_vec()
        .map_err(|e| TokenListError::decode(format!("invalid CID {cid:?}: {e}")))?;
    // sha2-256 multihash: code 0x12, length 0x20, 32-byte digest
    if multihash.len() != 34 || multihash[0] != 0x12 || multihash[1] != 0x20 {
        return Err(TokenListError::decode(format!(
            "{cid:?} is not a CIDv0 sha2-256 multihash"
        )));
    }
    let mut out = Vec::with_capacity(IPFS_NS_PREFIX.len() + multihash.len());
    out.extend_from_slice(&IPFS_NS_PREFIX);
    out.extend_from_slice(&multihash);
    Ok(out)
}

/// Updates a name's resolver record with transactions signed by its manager.
pub struct EnsUpdater {
    provider: DynProvider,
    registry: Address,
    manager: Address,
}

impl EnsUpdater {
    /// `provider` must sign for `manager` (see [`connect_with_signer`](crate::connect_with_signer)).
    pub fn new(provider: DynProvider, registry: Address, manager: Address) -> Self {
        Self {
            provider,
            registry,
            manager,
        }
    }

    /// Look up the resolver contract of `node`.
    pub async fn resolver(&self, node: B256) -> Result<Address> {
        let raw = eth_call(
            &self.provider,
            self.registry,
            IEnsRegistry::resolverCall { node }.abi_encode(),
        )
        .await?;
        IEnsRegistry::resolverCall::abi_decode_returns(&raw)
            .map_err(|e| TokenListError::decode(format!("resolver(): {e}")))
    }

    /// Point `name` at `cid`. Returns the submitted transaction hash.
    #[instrument(skip_all, fields(name = %name, cid = %cid))]
    pub async fn set_content_hash(&self, name: &str, cid: &str) -> Result<B256> {
        let content_hash = ipfs_content_hash(cid)?;
        let node = namehash(name);

        let resolver = self.resolver(node).await?;
        if resolver == ZERO_ADDRESS {
            return Err(TokenListError::validation(format!("{name} has no resolver set")));
        }

        let call = IContentHashResolver::setContenthashCall {
            node,
            hash: content_hash.into(),
        };
        let request = TransactionRequest::default()
            .from(self.manager)
            .to(resolver)
            .input(Bytes::from(call.abi_encode()).into());
        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(|e| rpc_error("eth_sendRawTransaction", e))?;
        let tx = *pending.tx_hash();
        info!(%resolver, manager = %self.manager, %tx, "content hash update submitted");
        Ok(tx)
    }
}
