//! Blake2b hashing for committee action content.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use dualgov_types::ActionHash;

type Blake2b256 = Blake2b<U32>;

/// Hash an encoded committee action into its `ActionHash`.
///
/// Each part is length-prefixed so that `["ab", "c"]` and `["a", "bc"]`
/// never collide.
pub fn hash_action(parts: &[&[u8]]) -> ActionHash {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    ActionHash::new(output)
}
