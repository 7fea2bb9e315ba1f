//! On-chain and indexer adapters.
//!
//! Everything here talks to a JSON-RPC node through an alloy provider
//! ([`connect`], [`connect_with_signer`]) or to the curate subgraph. The
//! adapters decode raw responses into shared domain types and leave every
//! reconciliation decision to the core crate.

pub mod abi;
mod badges;
mod curate;
mod ens;
mod probe;
mod provider;
mod tokens;

pub use badges::{BADGE_FILTER, BADGE_PAGE_SIZE, BadgeReader};
pub use curate::CurateSubgraph;
pub use ens::{EnsUpdater, ipfs_content_hash, namehash};
pub use probe::{ContractReader, ERC721_INTERFACE_ID, ERC1155_INTERFACE_ID, NFT_INTERFACES};
pub use provider::{connect, connect_with_signer, parse_signer};
pub use tokens::{T2CR_FILTER, T2crTokens};
