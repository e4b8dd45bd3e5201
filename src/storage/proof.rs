//! Merkle proofs over fixed-size file segments.
//!
//! Leaves and interior nodes are domain separated with a one byte prefix. A
//! level with an odd number of nodes promotes its last node unchanged.

use crate::types::sha256;

pub const SEGMENT_SIZE: usize = 64;

const LEAF_PREFIX: &[u8] = &[0x00];
const NODE_PREFIX: &[u8] = &[0x01];

fn leaf_hash(segment: &[u8]) -> [u8; 32] {
    sha256(&[LEAF_PREFIX, segment])
}

fn node_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    sha256(&[NODE_PREFIX, left.as_slice(), right.as_slice()])
}

pub fn segment_count(len: usize) -> u64 {
    len.div_ceil(SEGMENT_SIZE) as u64
}

fn next_level(level: &[[u8; 32]]) -> Vec<[u8; 32]> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => node_hash(left, right),
            [single] => *single,
            _ => unreachable!("chunks(2) yields one or two nodes"),
        })
        .collect()
}

pub fn merkle_root(data: &[u8]) -> [u8; 32] {
    let mut level: Vec<[u8; 32]> = data.chunks(SEGMENT_SIZE).map(leaf_hash).collect();
    if level.is_empty() {
        return leaf_hash(&[]);
    }
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

/// Returns the segment at `index` and the sibling hashes from leaf to root,
/// or `None` if the file has no such segment.
pub fn build_proof(data: &[u8], index: u64) -> Option<(Vec<u8>, Vec<[u8; 32]>)> {
    let segments: Vec<&[u8]> = data.chunks(SEGMENT_SIZE).collect();
    let mut position = usize::try_from(index).ok()?;
    let segment = segments.get(position)?.to_vec();

    let mut level: Vec<[u8; 32]> = segments.iter().map(|s| leaf_hash(s)).collect();
    let mut hash_set = vec![];
    while level.len() > 1 {
        if let Some(sibling) = level.get(position ^ 1) {
            hash_set.push(*sibling);
        }
        level = next_level(&level);
        position /= 2;
    }
    Some((segment, hash_set))
}

pub fn verify_proof(
    root: &[u8; 32],
    segment: &[u8],
    index: u64,
    segments: u64,
    hash_set: &[[u8; 32]],
) -> bool {
    if index >= segments {
        return false;
    }
    let mut hash = leaf_hash(segment);
    let mut hashes = hash_set.iter();
    let (mut position, mut width) = (index, segments);
    while width > 1 {
        if (position ^ 1) < width {
            let Some(sibling) = hashes.next() else {
                return false;
            };
            hash = if position % 2 == 0 {
                node_hash(&hash, sibling)
            } else {
                node_hash(sibling, &hash)
            };
        }
        position /= 2;
        width = width.div_ceil(2);
    }
    hashes.next().is_none() && hash == *root
}
