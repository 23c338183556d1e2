//! Key-routing hash.
//!
//! Maps a key to a stable 64-bit routing value. Both sides of the protocol
//! must agree on the algorithm and seed, so these are part of the contract.

use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Fixed seed shared by every party that routes keys.
pub const HASH_SEED: u64 = 0xDEAD_BEEF;

/// Routing hash for `key`. Stateless and stable across processes.
pub fn route_key(key: &[u8]) -> u64 {
    xxh3_64_with_seed(key, HASH_SEED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_key_is_deterministic() {
        assert_eq!(route_key(b"user:42"), route_key(b"user:42"));
    }

    #[test]
    fn test_route_key_differs_across_keys() {
        assert_ne!(route_key(b"user:42"), route_key(b"user:43"));
    }

    #[test]
    fn test_seed_participates_in_the_hash() {
        let unseeded = xxhash_rust::xxh3::xxh3_64(b"user:42");
        assert_ne!(route_key(b"user:42"), unseeded);
    }
}
