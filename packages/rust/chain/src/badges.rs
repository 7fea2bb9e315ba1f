//! Badge registry membership reads.

use std::collections::HashSet;

use alloy_primitives::{Address, U256};
use alloy_provider::DynProvider;
use alloy_sol_types::SolCall;
use tokenlist_shared::{Result, TokenListError, ZERO_ADDRESS};
use tracing::{debug, instrument};

use crate::abi::IBadge;
use crate::provider::eth_call;

/// Addresses requested per `queryAddresses` page.
pub const BADGE_PAGE_SIZE: u64 = 200;

/// Same inclusion rule as the T2CR filter; the two caller-specific flags are unused.
pub const BADGE_FILTER: [bool; 8] = [false, true, false, true, false, true, false, false];

/// Reads the addresses holding a badge.
#[derive(Clone)]
pub struct BadgeReader {
    provider: DynProvider,
    page_size: u64,
}

impl BadgeReader {
    pub fn new(provider: DynProvider) -> Self {
        Self {
            provider,
            page_size: BADGE_PAGE_SIZE,
        }
    }

    /// Collect every address on the badge registry at `badge`, oldest first.
    #[instrument(skip_all, fields(badge = %badge))]
    pub async fn addresses_with_badge(&self, badge: Address) -> Result<HashSet<Address>> {
        let mut addresses = HashSet::new();
        let mut cursor = ZERO_ADDRESS;

        loop {
            let call = IBadge::queryAddressesCall {
                _cursor: cursor,
                _count: U256::from(self.page_size),
                _filter: BADGE_FILTER,
                _oldestFirst: true,
            };
            let raw = eth_call(&self.provider, badge, call.abi_encode()).await?;
            let page = IBadge::queryAddressesCall::abi_decode_returns(&raw)
                .map_err(|e| TokenListError::decode(format!("queryAddresses: {e}")))?;

            // Fixed-size result arrays are padded with the zero address.
            let found: Vec<Address> = page
                .values
                .into_iter()
                .filter(|a| *a != ZERO_ADDRESS)
                .collect();
            debug!(%cursor, found = found.len(), has_more = page.hasMore, "badge page");

            let Some(last) = found.last().copied() else {
                break;
            };
            addresses.extend(found);
            if !page.hasMore {
                break;
            }
            cursor = last;
        }

        Ok(addresses)
    }
}
