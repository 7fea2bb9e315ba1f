//! Content ids computed locally, without storing anything.

use sha2::{Digest, Sha256};

/// Largest file stored as a single block by the default chunker.
pub const MAX_SINGLE_BLOCK: usize = 256 * 1024;

/// CIDv0 an IPFS node assigns to `bytes` when adding them with default
/// settings (dag-pb, no raw leaves, 256 KiB chunks).
///
/// `None` for files spanning more than one block.
pub fn cid_v0(bytes: &[u8]) -> Option<String> {
    if bytes.len() > MAX_SINGLE_BLOCK {
        return None;
    }

    // unixfs Data { Type = File, Data = bytes, filesize = len }
    let mut unixfs = vec![0x08, 0x02];
    if !bytes.is_empty() {
        unixfs.push(0x12);
        push_varint(&mut unixfs, bytes.len() as u64);
        unixfs.extend_from_slice(bytes);
    }
    unixfs.push(0x18);
    push_varint(&mut unixfs, bytes.len() as u64);

    // PBNode { Data = unixfs }, no links
    let mut node = vec![0x0a];
    push_varint(&mut node, unixfs.len() as u64);
    node.extend_from_slice(&unixfs);

    let mut multihash = vec![0x12, 0x20];
    multihash.extend_from_slice(&Sha256::digest(&node));
    Some(bs58::encode(multihash).into_string())
}

fn push_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}
