//! Collapse raw records into one record per `(chainId, address)`.

use std::collections::HashMap;

use tokenlist_shared::{TokenKey, TokenRecord, ZERO_ADDRESS};
use tracing::debug;

/// Remove zero-address padding and duplicate keys.
///
/// The last record seen for a key wins, but it takes the position where the
/// key first appeared so the output order is stable across pages.
pub fn dedup(records: Vec<TokenRecord>) -> Vec<TokenRecord> {
    let input = records.len();
    let mut slots: HashMap<TokenKey, usize> = HashMap::with_capacity(input);
    let mut out: Vec<TokenRecord> = Vec::with_capacity(input);

    for record in records {
        if record.address == ZERO_ADDRESS {
            continue;
        }
        match slots.get(&record.key()) {
            Some(&idx) => out[idx] = record,
            None => {
                slots.insert(record.key(), out.len());
                out.push(record);
            }
        }
    }

    debug!(input, output = out.len(), "deduplicated records");
    out
}
