// src/card_keys.rs

use std::collections::HashSet;

use rand::Rng;

/// Card keys look like DORA-XXXX-XXXX-XXXX-XXXX.
pub const CARD_KEY_PREFIX: &str = "DORA";

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SEGMENTS: usize = 4;
const SEGMENT_LEN: usize = 4;

/// Generates one card key. 16 symbols over a 36-character alphabet give a
/// keyspace of 36^16, so collisions are negligible but not impossible;
/// callers that need uniqueness go through [`generate_unique_card_keys`].
pub fn generate_card_key() -> String {
    let mut rng = rand::thread_rng();
    let mut key = String::with_capacity(CARD_KEY_PREFIX.len() + SEGMENTS * (SEGMENT_LEN + 1));
    key.push_str(CARD_KEY_PREFIX);
    for _ in 0..SEGMENTS {
        key.push('-');
        for _ in 0..SEGMENT_LEN {
            key.push(CHARSET[rng.gen_range(0..CHARSET.len())] as char);
        }
    }
    key
}

/// Generates `count` distinct keys, none of which appear in `existing`.
/// Rejection sampling: the keyspace dwarfs any practical batch (uploads
/// are capped at 500), so the expected number of draws is ~`count`.
pub fn generate_unique_card_keys(count: usize, existing: &HashSet<String>) -> Vec<String> {
    let mut keys = Vec::with_capacity(count);
    let mut seen: HashSet<String> = HashSet::with_capacity(count);
    while keys.len() < count {
        let key = generate_card_key();
        if existing.contains(&key) || !seen.insert(key.clone()) {
            continue;
        }
        keys.push(key);
    }
    keys
}
